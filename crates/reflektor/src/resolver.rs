//! Style resolution.
//!
//! [`compute_style`] is a pure function of a stylesheet and an element
//! context: it selects the matching selectors, orders their declarations by
//! [`Specificity`](crate::Specificity) and then by position in the source,
//! and merges them so that later declarations override earlier ones.

use serde::Serialize;
use tracing::trace;

use crate::context::StyleContext;
use crate::stylesheet::{PropertyKeyPath, Rule, Specificity, Stylesheet, Value};

/// The merged properties for one element.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComputedStyle {
    /// Every applicable property.
    pub all: Rule,
    /// The `!important` subset of [`all`](Self::all).
    pub important: Rule,
}

impl ComputedStyle {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.all.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Pretty JSON dump, for diagnostics.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Computes the style of the element described by `context`.
pub fn compute_style(stylesheet: &Stylesheet, context: &StyleContext) -> ComputedStyle {
    let eval = context.eval_context();
    let trait_name = context.trait_name.as_deref();
    let rules = stylesheet.rules();

    let mut declarations: Vec<(Specificity, usize, &PropertyKeyPath, &Value)> = Vec::new();
    for (selector, _) in rules.iter() {
        if !selector.targets(&context.class, trait_name) {
            continue;
        }
        if !selector
            .condition()
            .map_or(true, |condition| condition.matches(&eval))
        {
            continue;
        }
        trace!(class = %context.class, selector = %selector, "selector matches");
        let priority = selector.priority();
        declarations.extend(
            rules
                .declarations(selector)
                .map(|(key, value, order)| (priority, order, key, value)),
        );
    }
    declarations.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut style = ComputedStyle::default();
    for (_, _, key, value) in declarations {
        style.all.insert(key.clone(), value.clone());
        if value.is_important() {
            style.important.insert(key.clone(), value.clone());
        }
    }
    style
}
