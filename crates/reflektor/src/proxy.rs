//! Per-element styling.
//!
//! The host toolkit exposes its views through [`Styleable`]; each styled view
//! owns a [`StyleProxy`] that keeps the view's trait tag and environment,
//! caches the computed style, and writes properties back to the view.
//!
//! Applying is incremental: a property is only set when its value changed
//! since the last apply, and a property that stops being styled (or no longer
//! computes to a plain value) is restored to the value the view had before it
//! was first styled.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::context::{Environment, StyleContext, TraitCollection};
use crate::engine::StyleEngine;
use crate::error::PluginError;
use crate::plugin::constraint::LayoutConstraint;
use crate::plugin::ComputeContext;
use crate::resolver::ComputedStyle;
use crate::stylesheet::{PropertyKeyPath, ResolvedValue, Rule};

/// A view that can be styled.
pub trait Styleable {
    /// Class identity matched by `.Name` selectors.
    fn identity_tag(&self) -> &str;

    /// Whether `path` names a settable property (or, for `_key` constraint
    /// items, a subview).
    fn has_property(&self, path: &str) -> bool;

    /// Current value of a property, if the view can report it.
    fn property_value(&self, path: &str) -> Option<ResolvedValue>;

    /// Sets a property; `None` resets it to the view's own default.
    fn set_property(&mut self, path: &str, value: Option<ResolvedValue>);
}

#[derive(Debug, Clone)]
pub struct StyleProxy {
    trait_name: Option<String>,
    environment: Environment,
    computed: ComputedStyle,
    auto_apply: bool,
    /// Values applied by the last apply.
    applied: BTreeMap<PropertyKeyPath, ResolvedValue>,
    /// Pre-styling values of every property ever applied.
    originals: BTreeMap<PropertyKeyPath, Option<ResolvedValue>>,
}

impl StyleProxy {
    pub fn new(auto_apply: bool) -> Self {
        Self {
            trait_name: None,
            environment: Environment::default(),
            computed: ComputedStyle::default(),
            auto_apply,
            applied: BTreeMap::new(),
            originals: BTreeMap::new(),
        }
    }

    /// A proxy following the engine's `auto_apply_properties` setting.
    /// A proxy following the engine's auto-apply setting, with the OS color
    /// mode as its appearance.
    pub fn for_engine(engine: &StyleEngine) -> Self {
        let mut proxy = Self::new(engine.config().auto_apply_properties);
        proxy.environment = Environment::new().with_traits(TraitCollection::detected());
        proxy
    }

    pub fn trait_name(&self) -> Option<&str> {
        self.trait_name.as_deref()
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Changes the trait tag and refreshes.
    pub fn set_trait(
        &mut self,
        engine: &StyleEngine,
        element: &mut dyn Styleable,
        trait_name: Option<&str>,
    ) {
        self.trait_name = trait_name.map(str::to_string);
        self.refresh(engine, element);
    }

    /// Changes the environment (size, traits) and refreshes.
    pub fn set_environment(
        &mut self,
        engine: &StyleEngine,
        element: &mut dyn Styleable,
        environment: Environment,
    ) {
        self.environment = environment;
        self.refresh(engine, element);
    }

    /// Recomputes the style; applies it when auto-apply is on.
    pub fn refresh(&mut self, engine: &StyleEngine, element: &mut dyn Styleable) {
        let context = StyleContext {
            class: element.identity_tag().to_string(),
            trait_name: self.trait_name.clone(),
            environment: self.environment.clone(),
        };
        self.computed = engine.compute_style(&context);
        debug!(
            class = %context.class,
            properties = self.computed.all.len(),
            "refreshed computed style"
        );
        if self.auto_apply {
            self.apply_computed_properties(element, false);
        }
    }

    pub fn computed(&self) -> &ComputedStyle {
        &self.computed
    }

    /// Computes one property against the live context. `Ok(None)` if the
    /// property is not styled.
    pub fn property(
        &self,
        key: &str,
        element: Option<&dyn Styleable>,
    ) -> Result<Option<ResolvedValue>, PluginError> {
        let Some(value) = self.computed.get(key) else {
            return Ok(None);
        };
        value.compute(&self.compute_context(element)).map(Some)
    }

    /// Every layout constraint produced by constraint-valued properties.
    pub fn constraints(&self, element: &dyn Styleable) -> Result<Vec<LayoutConstraint>, PluginError> {
        let context = self.compute_context(Some(element));
        let mut constraints = Vec::new();
        for (_, value) in self.computed.all.iter().filter(|(_, v)| v.is_object()) {
            if let ResolvedValue::Constraints(found) = value.compute(&context)? {
                constraints.extend(found);
            }
        }
        Ok(constraints)
    }

    /// Writes the computed properties to `element` and returns how many were
    /// set. With `only_important`, only `!important` properties are written
    /// and nothing is reset.
    ///
    /// Properties the element does not have, constraint values and values a
    /// plugin fails to compute are skipped; if such a property was applied
    /// before, its original value is restored.
    pub fn apply_computed_properties(&mut self, element: &mut dyn Styleable, only_important: bool) -> usize {
        let source: &Rule = if only_important {
            &self.computed.important
        } else {
            &self.computed.all
        };

        let mut updates = Vec::new();
        // Applied earlier but no longer computable as a property value.
        let mut withdrawn = Vec::new();
        {
            let context = self.compute_context(Some(&*element));
            for (key, value) in source {
                if !element.has_property(key.as_str()) {
                    debug!(property = %key, class = element.identity_tag(), "element has no such property");
                    continue;
                }
                match value.compute(&context) {
                    Ok(ResolvedValue::Constraints(_)) => withdrawn.push(key.clone()),
                    Ok(resolved) => {
                        if self.applied.get(key) != Some(&resolved) {
                            updates.push((key.clone(), resolved));
                        }
                    }
                    Err(err) => {
                        warn!(property = %key, error = %err, "failed to compute property");
                        withdrawn.push(key.clone());
                    }
                }
            }
        }
        for key in withdrawn {
            self.restore(element, &key);
        }

        let set = updates.len();
        for (key, resolved) in updates {
            if !self.originals.contains_key(&key) {
                let original = element.property_value(key.as_str());
                self.originals.insert(key.clone(), original);
            }
            element.set_property(key.as_str(), Some(resolved.clone()));
            self.applied.insert(key, resolved);
        }

        if !only_important {
            let stale: Vec<PropertyKeyPath> = self
                .applied
                .keys()
                .filter(|key| !self.computed.all.contains_key(key.as_str()))
                .cloned()
                .collect();
            for key in stale {
                self.restore(element, &key);
            }
        }
        set
    }

    /// Puts back the pre-styling value of `key` if it is currently applied.
    fn restore(&mut self, element: &mut dyn Styleable, key: &PropertyKeyPath) {
        if self.applied.remove(key).is_none() {
            return;
        }
        let original = self.originals.remove(key).flatten();
        element.set_property(key.as_str(), original);
    }

    fn compute_context<'a>(&'a self, element: Option<&'a dyn Styleable>) -> ComputeContext<'a> {
        let context = ComputeContext::new(&self.environment);
        match element {
            Some(element) => context.with_element(element),
            None => context,
        }
    }
}

impl Default for StyleProxy {
    fn default() -> Self {
        Self::new(true)
    }
}
