//! The built-in layout constraint plugin.
//!
//! Claims two value forms:
//!
//! ```text
//! constraint(__self.width == _container.width * 0.5 + 8, 750)
//! constraint-vfl("H:|-[_label]-|")
//! ```
//!
//! In the relation form the left side is `item.attribute`, the right side is
//! `item.attribute [* multiplier] [+|- constant]` or a bare constant, and the
//! optional trailing number is the priority (default 250, "low"). `__self` is
//! the styled element, `_key` names one of its subviews by key path, and
//! `__constant` stands for "no item". Strict relations (`<`, `>`) are treated
//! as their inclusive forms.
//!
//! Computation produces platform-neutral [`LayoutConstraint`] descriptors; the
//! host turns them into real layout constraints.

use std::any::Any;
use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{ComputeContext, PropertyValuePlugin};
use crate::error::PluginError;
use crate::stylesheet::ResolvedValue;

const PLUGIN_NAME: &str = "constraint";
const SELF_KEY: &str = "__self";
const CONSTANT_KEY: &str = "__constant";

/// Default priority when none is given.
pub const DEFAULT_PRIORITY: f32 = 250.0;
/// Highest allowed priority ("required").
pub const REQUIRED_PRIORITY: f32 = 1000.0;

static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(_\w+)\.([A-Za-z]+)$").expect("anchor pattern is valid")
});

static RHS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<anchor>_\w+\.[A-Za-z]+)(?:\*(?P<multiplier>\d+(?:\.\d+)?|\.\d+))?(?:(?P<sign>[+-])(?P<constant>\d+(?:\.\d+)?|\.\d+))?$",
    )
    .expect("right-hand side pattern is valid")
});

static VIEW_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_\w+").expect("view key pattern is valid"));

/// Layout attribute of an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutAttribute {
    Left,
    Right,
    Top,
    Bottom,
    Leading,
    Trailing,
    Width,
    Height,
    CenterX,
    CenterY,
    Baseline,
    FirstBaseline,
    LeftMargin,
    RightMargin,
    TopMargin,
    BottomMargin,
    LeadingMargin,
    TrailingMargin,
    CenterXWithinMargins,
    CenterYWithinMargins,
    NotAnAttribute,
}

impl LayoutAttribute {
    pub fn from_name(name: &str) -> Option<Self> {
        let attribute = match name {
            "left" => LayoutAttribute::Left,
            "right" => LayoutAttribute::Right,
            "top" => LayoutAttribute::Top,
            "bottom" => LayoutAttribute::Bottom,
            "leading" => LayoutAttribute::Leading,
            "trailing" => LayoutAttribute::Trailing,
            "width" => LayoutAttribute::Width,
            "height" => LayoutAttribute::Height,
            "centerX" => LayoutAttribute::CenterX,
            "centerY" => LayoutAttribute::CenterY,
            "baseline" => LayoutAttribute::Baseline,
            "firstBaseline" => LayoutAttribute::FirstBaseline,
            "leftMargin" => LayoutAttribute::LeftMargin,
            "rightMargin" => LayoutAttribute::RightMargin,
            "topMargin" => LayoutAttribute::TopMargin,
            "bottomMargin" => LayoutAttribute::BottomMargin,
            "leadingMargin" => LayoutAttribute::LeadingMargin,
            "trailingMargin" => LayoutAttribute::TrailingMargin,
            "centerXWithinMargins" => LayoutAttribute::CenterXWithinMargins,
            "centerYWithinMargins" => LayoutAttribute::CenterYWithinMargins,
            "notAnAttribute" => LayoutAttribute::NotAnAttribute,
            _ => return None,
        };
        Some(attribute)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutRelation {
    LessThanOrEqual,
    Equal,
    GreaterThanOrEqual,
}

impl LayoutRelation {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "<" | "<=" => Some(LayoutRelation::LessThanOrEqual),
            "=" | "==" => Some(LayoutRelation::Equal),
            ">" | ">=" => Some(LayoutRelation::GreaterThanOrEqual),
            _ => None,
        }
    }
}

/// The view an anchor refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstraintItem {
    /// `__self`
    SelfView,
    /// `_key`: the subview at key path `key`.
    Subview(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstraintAnchor {
    pub item: ConstraintItem,
    pub attribute: LayoutAttribute,
}

/// `first <relation> second * multiplier + constant`
#[derive(Debug, Clone, PartialEq)]
pub struct RelationConstraint {
    pub first: ConstraintAnchor,
    pub relation: LayoutRelation,
    /// `None` when the right side is a bare constant.
    pub second: Option<ConstraintAnchor>,
    pub multiplier: f64,
    pub constant: f64,
    pub priority: f32,
}

/// A visual format string and the view keys available to it.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualFormatConstraint {
    pub format: String,
    /// `__self` followed by the `_key` views the element has.
    pub views: Vec<String>,
}

/// A computed constraint descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutConstraint {
    Relation(RelationConstraint),
    VisualFormat(VisualFormatConstraint),
}

/// Parsed payload of a constraint value.
#[derive(Debug, Clone, PartialEq)]
enum ConstraintSpec {
    Relation(RelationConstraint),
    VisualFormat { format: String, view_keys: Vec<String> },
}

/// Plugin for `constraint(...)` and `constraint-vfl(...)` values.
#[derive(Debug, Default, Clone)]
pub struct ConstraintValuePlugin;

impl ConstraintValuePlugin {
    pub fn new() -> Self {
        Self
    }

    fn error(message: impl Into<String>) -> PluginError {
        PluginError::new(PLUGIN_NAME, message)
    }
}

impl PropertyValuePlugin for ConstraintValuePlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn should_parse_value(&self, raw: &str) -> bool {
        raw.starts_with("constraint(") || raw.starts_with("constraint-vfl(")
    }

    fn parse_value(&self, raw: &str) -> Result<Rc<dyn Any>, PluginError> {
        let spec = if let Some(inner) = call_arguments(raw, "constraint-vfl") {
            parse_visual_format(inner)
        } else if let Some(inner) = call_arguments(raw, "constraint") {
            parse_relation(inner).map(ConstraintSpec::Relation)
        } else {
            Err(format!("'{}' is not a constraint", raw))
        };
        spec.map(|spec| Rc::new(spec) as Rc<dyn Any>)
            .map_err(Self::error)
    }

    fn compute_value(
        &self,
        payload: &dyn Any,
        context: &ComputeContext<'_>,
    ) -> Result<ResolvedValue, PluginError> {
        let spec = payload
            .downcast_ref::<ConstraintSpec>()
            .ok_or_else(|| Self::error("unexpected payload"))?;
        let Some(element) = context.element else {
            return Ok(ResolvedValue::Constraints(Vec::new()));
        };

        let constraints = match spec {
            ConstraintSpec::Relation(template) => {
                let available = |anchor: &ConstraintAnchor| match &anchor.item {
                    ConstraintItem::SelfView => true,
                    ConstraintItem::Subview(key) => element.has_property(key),
                };
                if available(&template.first) && template.second.as_ref().map_or(true, available) {
                    vec![LayoutConstraint::Relation(template.clone())]
                } else {
                    debug!(element = element.identity_tag(), "constraint references a missing subview");
                    Vec::new()
                }
            }
            ConstraintSpec::VisualFormat { format, view_keys } => {
                let views = std::iter::once(SELF_KEY.to_string())
                    .chain(
                        view_keys
                            .iter()
                            .filter(|key| element.has_property(&key[1..]))
                            .cloned(),
                    )
                    .collect();
                vec![LayoutConstraint::VisualFormat(VisualFormatConstraint {
                    format: format.clone(),
                    views,
                })]
            }
        };
        Ok(ResolvedValue::Constraints(constraints))
    }
}

fn call_arguments<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    raw.strip_prefix(name)?.strip_prefix('(')?.strip_suffix(')')
}

fn parse_visual_format(inner: &str) -> Result<ConstraintSpec, String> {
    let inner = inner.trim();
    let format = ['"', '\'']
        .iter()
        .find_map(|q| inner.strip_prefix(*q)?.strip_suffix(*q))
        .ok_or_else(|| "visual format must be a quoted string".to_string())?;

    let mut view_keys: Vec<String> = Vec::new();
    for found in VIEW_KEY_RE.find_iter(format) {
        let key = found.as_str();
        if key != SELF_KEY && !view_keys.iter().any(|k| k == key) {
            view_keys.push(key.to_string());
        }
    }
    Ok(ConstraintSpec::VisualFormat {
        format: format.to_string(),
        view_keys,
    })
}

fn parse_relation(inner: &str) -> Result<RelationConstraint, String> {
    let compact: String = inner.chars().filter(|c| !c.is_whitespace()).collect();

    let (body, priority) = match compact.rsplit_once(',') {
        Some((body, priority)) => {
            let priority: f32 = priority
                .parse()
                .map_err(|_| format!("invalid priority '{}'", priority))?;
            if !(1.0..=REQUIRED_PRIORITY).contains(&priority) {
                return Err(format!("priority {} is outside 1-1000", priority));
            }
            (body, priority)
        }
        None => (compact.as_str(), DEFAULT_PRIORITY),
    };

    let (symbol, position) = ["==", ">=", "<=", "=", ">", "<"]
        .iter()
        .find_map(|symbol| body.find(symbol).map(|pos| (*symbol, pos)))
        .ok_or_else(|| format!("no relation in '{}'", body))?;
    let relation = LayoutRelation::from_symbol(symbol)
        .ok_or_else(|| format!("unknown relation '{}'", symbol))?;
    let lhs = &body[..position];
    let rhs = &body[position + symbol.len()..];
    if rhs.contains(|c: char| matches!(c, '<' | '>' | '=')) {
        return Err(format!("more than one relation in '{}'", body));
    }

    let first = parse_anchor(lhs)?
        .ok_or_else(|| "the left side cannot be '__constant'".to_string())?;

    if let Ok(constant) = rhs.parse::<f64>() {
        if constant.is_finite() {
            return Ok(RelationConstraint {
                first,
                relation,
                second: None,
                multiplier: 1.0,
                constant,
                priority,
            });
        }
    }

    let captures = RHS_RE
        .captures(rhs)
        .ok_or_else(|| format!("invalid right side '{}'", rhs))?;
    let second = match captures.name("anchor") {
        Some(anchor) => parse_anchor(anchor.as_str())?,
        None => None,
    };
    let multiplier = match captures.name("multiplier") {
        Some(m) => parse_number(m.as_str())?,
        None => 1.0,
    };
    let constant = match captures.name("constant") {
        Some(c) => {
            let magnitude = parse_number(c.as_str())?;
            match captures.name("sign").map(|s| s.as_str()) {
                Some("-") => -magnitude,
                _ => magnitude,
            }
        }
        None => 0.0,
    };

    Ok(RelationConstraint {
        first,
        relation,
        second,
        multiplier,
        constant,
        priority,
    })
}

/// `item.attribute`; `None` for `__constant.*`.
fn parse_anchor(text: &str) -> Result<Option<ConstraintAnchor>, String> {
    let captures = ANCHOR_RE
        .captures(text)
        .ok_or_else(|| format!("expected 'item.attribute', found '{}'", text))?;
    let (Some(item), Some(attribute)) = (captures.get(1), captures.get(2)) else {
        return Err(format!("expected 'item.attribute', found '{}'", text));
    };
    let item = match item.as_str() {
        CONSTANT_KEY => return Ok(None),
        SELF_KEY => ConstraintItem::SelfView,
        key => ConstraintItem::Subview(key[1..].to_string()),
    };
    let attribute = LayoutAttribute::from_name(attribute.as_str())
        .ok_or_else(|| format!("unknown layout attribute '{}'", attribute.as_str()))?;
    Ok(Some(ConstraintAnchor { item, attribute }))
}

fn parse_number(text: &str) -> Result<f64, String> {
    text.parse()
        .map_err(|_| format!("invalid number '{}'", text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Environment;
    use crate::proxy::Styleable;

    struct View {
        subviews: Vec<&'static str>,
    }

    impl Styleable for View {
        fn identity_tag(&self) -> &str {
            "View"
        }

        fn has_property(&self, path: &str) -> bool {
            self.subviews.iter().any(|s| *s == path)
        }

        fn property_value(&self, _path: &str) -> Option<ResolvedValue> {
            None
        }

        fn set_property(&mut self, _path: &str, _value: Option<ResolvedValue>) {}
    }

    fn parse(raw: &str) -> ConstraintSpec {
        let payload = ConstraintValuePlugin.parse_value(raw).unwrap();
        payload.downcast_ref::<ConstraintSpec>().unwrap().clone()
    }

    fn relation(raw: &str) -> RelationConstraint {
        match parse(raw) {
            ConstraintSpec::Relation(r) => r,
            other => panic!("Expected relation, got {:?}", other),
        }
    }

    fn compute(raw: &str, element: Option<&View>) -> Vec<LayoutConstraint> {
        let payload = ConstraintValuePlugin.parse_value(raw).unwrap();
        let env = Environment::new();
        let mut ctx = ComputeContext::new(&env);
        if let Some(view) = element {
            ctx = ctx.with_element(view);
        }
        match ConstraintValuePlugin
            .compute_value(payload.as_ref(), &ctx)
            .unwrap()
        {
            ResolvedValue::Constraints(c) => c,
            other => panic!("Expected constraints, got {:?}", other),
        }
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn test_claims_constraint_values() {
        let plugin = ConstraintValuePlugin::new();
        assert!(plugin.should_parse_value("constraint(__self.width == 10)"));
        assert!(plugin.should_parse_value("constraint-vfl(\"H:|[_a]|\")"));
        assert!(!plugin.should_parse_value("constraints"));
        assert!(!plugin.should_parse_value("12px"));
    }

    #[test]
    fn test_full_relation() {
        let r = relation("constraint(__self.width >= _container.width * 0.5 + 8, 750)");
        assert_eq!(
            r.first,
            ConstraintAnchor {
                item: ConstraintItem::SelfView,
                attribute: LayoutAttribute::Width
            }
        );
        assert_eq!(r.relation, LayoutRelation::GreaterThanOrEqual);
        assert_eq!(
            r.second,
            Some(ConstraintAnchor {
                item: ConstraintItem::Subview("container".into()),
                attribute: LayoutAttribute::Width
            })
        );
        assert_eq!(r.multiplier, 0.5);
        assert_eq!(r.constant, 8.0);
        assert_eq!(r.priority, 750.0);
    }

    #[test]
    fn test_defaults() {
        let r = relation("constraint(__self.height == _label.height)");
        assert_eq!(r.relation, LayoutRelation::Equal);
        assert_eq!(r.multiplier, 1.0);
        assert_eq!(r.constant, 0.0);
        assert_eq!(r.priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn test_negative_constant_and_strict_relations() {
        let r = relation("constraint(__self.left < _box.right -12)");
        assert_eq!(r.relation, LayoutRelation::LessThanOrEqual);
        assert_eq!(r.constant, -12.0);

        let r = relation("constraint(__self.top > _box.bottom)");
        assert_eq!(r.relation, LayoutRelation::GreaterThanOrEqual);
    }

    #[test]
    fn test_constant_right_side() {
        let r = relation("constraint(__self.width = 120)");
        assert_eq!(r.second, None);
        assert_eq!(r.constant, 120.0);

        let r = relation("constraint(__self.width <= __constant.notAnAttribute)");
        assert_eq!(r.second, None);
    }

    #[test]
    fn test_visual_format() {
        match parse("constraint-vfl(\"H:|-[_icon]-[_label]-[_icon]-|\")") {
            ConstraintSpec::VisualFormat { format, view_keys } => {
                assert_eq!(format, "H:|-[_icon]-[_label]-[_icon]-|");
                assert_eq!(view_keys, vec!["_icon", "_label"]);
            }
            other => panic!("Expected visual format, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_constraints() {
        let plugin = ConstraintValuePlugin::new();
        for raw in [
            "constraint(__self.width)",
            "constraint(__self.depth == 10)",
            "constraint(self.width == 10)",
            "constraint(__self.width == 10, 5000)",
            "constraint(__self.width == 10 == 11)",
            "constraint(__constant.width == 10)",
            "constraint-vfl(H:|[_a]|)",
        ] {
            let err = plugin.parse_value(raw).unwrap_err();
            assert_eq!(err.plugin, "constraint", "{}", raw);
        }
    }

    // =========================================================================
    // Computation
    // =========================================================================

    #[test]
    fn test_no_element_yields_nothing() {
        assert!(compute("constraint(__self.width == 10)", None).is_empty());
    }

    #[test]
    fn test_missing_subview_is_dropped() {
        let view = View {
            subviews: vec!["label"],
        };
        assert_eq!(
            compute("constraint(__self.width == _label.width)", Some(&view)).len(),
            1
        );
        assert!(compute("constraint(__self.width == _icon.width)", Some(&view)).is_empty());
    }

    #[test]
    fn test_visual_format_views() {
        let view = View {
            subviews: vec!["label"],
        };
        let constraints = compute("constraint-vfl(\"H:|-[_icon]-[_label]-|\")", Some(&view));
        assert_eq!(
            constraints,
            vec![LayoutConstraint::VisualFormat(VisualFormatConstraint {
                format: "H:|-[_icon]-[_label]-|".into(),
                views: vec!["__self".into(), "_label".into()],
            })]
        );
    }
}
