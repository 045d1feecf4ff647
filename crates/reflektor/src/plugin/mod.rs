//! Value plugins.
//!
//! A plugin claims raw declaration values that are not plain literals. At
//! parse time it turns the raw text into a payload; at read time it computes
//! the final value from that payload and the live context (traits, size and
//! the element being styled).
//!
//! Plugins are consulted in registration order and the first one whose
//! [`PropertyValuePlugin::should_parse_value`] accepts the text claims it.
//!
//! ```rust
//! use std::any::Any;
//! use std::rc::Rc;
//! use reflektor::{
//!     ComputeContext, Literal, PluginError, PluginRegistry, PropertyValuePlugin, ResolvedValue,
//! };
//!
//! /// `points(n)`: n points scaled by the display scale.
//! struct Points;
//!
//! impl PropertyValuePlugin for Points {
//!     fn name(&self) -> &str {
//!         "points"
//!     }
//!
//!     fn should_parse_value(&self, raw: &str) -> bool {
//!         raw.starts_with("points(")
//!     }
//!
//!     fn parse_value(&self, raw: &str) -> Result<Rc<dyn Any>, PluginError> {
//!         let inner = raw.trim_start_matches("points(").trim_end_matches(')');
//!         let n: f64 = inner
//!             .trim()
//!             .parse()
//!             .map_err(|_| PluginError::new("points", format!("not a number: {}", inner)))?;
//!         Ok(Rc::new(n))
//!     }
//!
//!     fn compute_value(
//!         &self,
//!         payload: &dyn Any,
//!         context: &ComputeContext<'_>,
//!     ) -> Result<ResolvedValue, PluginError> {
//!         let n = payload
//!             .downcast_ref::<f64>()
//!             .ok_or_else(|| PluginError::new("points", "unexpected payload"))?;
//!         let scale = context.environment.traits.scale;
//!         Ok(ResolvedValue::Literal(Literal::Number(n * scale)))
//!     }
//! }
//!
//! let mut registry = PluginRegistry::new();
//! registry.register(Points);
//! assert!(registry.parse("points(4)").is_some());
//! assert!(registry.parse("4").is_none());
//! ```

pub mod constraint;

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::context::Environment;
use crate::error::PluginError;
use crate::proxy::Styleable;
use crate::stylesheet::{PluginObject, ResolvedValue};

pub use constraint::ConstraintValuePlugin;

/// What a plugin sees when computing a value.
#[derive(Clone, Copy)]
pub struct ComputeContext<'a> {
    pub environment: &'a Environment,
    /// The element being styled, when there is one.
    pub element: Option<&'a dyn Styleable>,
}

impl<'a> ComputeContext<'a> {
    pub fn new(environment: &'a Environment) -> Self {
        Self {
            environment,
            element: None,
        }
    }

    pub fn with_element(mut self, element: &'a dyn Styleable) -> Self {
        self.element = Some(element);
        self
    }
}

impl fmt::Debug for ComputeContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeContext")
            .field("environment", self.environment)
            .field("element", &self.element.map(|e| e.identity_tag()))
            .finish()
    }
}

/// A value plugin.
pub trait PropertyValuePlugin {
    /// Name used in errors and diagnostics.
    fn name(&self) -> &str;

    /// Whether this plugin claims the raw value.
    fn should_parse_value(&self, raw: &str) -> bool;

    /// Parses a claimed value into the payload later passed to
    /// [`compute_value`](Self::compute_value). An error aborts the
    /// stylesheet parse.
    fn parse_value(&self, raw: &str) -> Result<Rc<dyn Any>, PluginError>;

    /// Computes the value to apply.
    fn compute_value(
        &self,
        payload: &dyn Any,
        context: &ComputeContext<'_>,
    ) -> Result<ResolvedValue, PluginError>;
}

/// Registered plugins, in registration order.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Rc<dyn PropertyValuePlugin>>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in [`ConstraintValuePlugin`].
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ConstraintValuePlugin::new());
        registry
    }

    pub fn register<P: PropertyValuePlugin + 'static>(&mut self, plugin: P) {
        self.plugins.push(Rc::new(plugin));
    }

    pub fn register_shared(&mut self, plugin: Rc<dyn PropertyValuePlugin>) {
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Offers a raw value to the plugins. `None` if no plugin claims it.
    pub fn parse(&self, raw: &str) -> Option<Result<PluginObject, PluginError>> {
        let plugin = self.plugins.iter().find(|p| p.should_parse_value(raw))?;
        Some(
            plugin
                .parse_value(raw)
                .map(|payload| PluginObject::new(Rc::clone(plugin), payload)),
        )
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
