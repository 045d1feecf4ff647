//! # Reflektor - Stylesheets for Native Views
//!
//! `reflektor` parses a Less-like stylesheet language and computes, for each
//! styled view, the merged set of properties that applies to it. Views are
//! matched by class identity, by an application-assigned trait tag, and by
//! conditions over the view's size and environment.
//!
//! ## Core Concepts
//!
//! - [`StyleEngine`]: owns the installed [`Stylesheet`], loads and reloads it,
//!   and notifies subscribers
//! - [`Selector`]: `.Class`, `#trait`, with `[condition]` guards and a
//!   `:trait` qualifier
//! - [`compute_style`]: the pure resolution function behind
//!   [`StyleEngine::compute_style`]
//! - [`StyleProxy`] and [`Styleable`]: per-view state and the capability a
//!   host toolkit implements to receive properties
//! - [`PropertyValuePlugin`]: custom value syntaxes computed at read time,
//!   such as the built-in [`ConstraintValuePlugin`]
//!
//! ## Quick Start
//!
//! ```rust
//! use reflektor::{EngineConfig, Literal, StyleContext, StyleEngine};
//!
//! let engine = StyleEngine::new(EngineConfig::default());
//! engine.load_stylesheet(r#"
//!     @global { @accent = #ff9900; }
//!
//!     .Button { tint: @accent; corner-radius: 4; }
//!     .Button[width > 320] { title: "Continue to checkout"; }
//!     .Button:primary { font.weight: bold !important; }
//! "#).unwrap();
//!
//! let context = StyleContext::new("Button")
//!     .with_trait("primary")
//!     .with_size(400.0, 44.0);
//! let style = engine.compute_style(&context);
//!
//! assert_eq!(style.get("cornerRadius").and_then(|v| v.as_literal()), Some(&Literal::Number(4.0)));
//! assert!(style.get("title").is_some());
//! assert!(style.important.contains_key("font.weight"));
//! ```
//!
//! ## Priority
//!
//! Matching selectors are merged in ascending [`Specificity`]: class
//! selectors first, then selectors with more condition terms, then selectors
//! with a `:trait` qualifier, then trait selectors. Among selectors of equal
//! specificity, the declaration written last wins, even when its selector
//! first appeared earlier in the file.

pub mod condition;
pub mod config;
pub mod context;
pub mod engine;
mod error;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod plugin;
pub mod proxy;
pub mod resolver;
pub mod stylesheet;

pub use error::{
    ConfigError, EvalError, LexError, LoadError, ParseError, ParseErrorKind, PluginError, Result,
    StyleError,
};

pub use condition::{Condition, EvalContext, Scalar};
pub use config::{EngineConfig, EntryPoint};
pub use context::{
    detect_color_mode, set_color_mode_detector, ColorMode, Environment, Idiom, Size, SizeClass,
    StyleContext, TraitCollection,
};
pub use engine::{StyleEngine, SubscriptionId};
pub use loader::{FsLoader, Location, MemoryLoader, StylesheetLoader};
pub use parser::{parse_stylesheet, Parser};
pub use plugin::constraint::LayoutConstraint;
pub use plugin::{ComputeContext, ConstraintValuePlugin, PluginRegistry, PropertyValuePlugin};
pub use proxy::{StyleProxy, Styleable};
pub use resolver::{compute_style, ComputedStyle};
pub use stylesheet::{
    Color, Literal, PluginObject, PropertyKeyPath, ResolvedValue, Rule, RuleTable, Selector,
    SelectorKind, Specificity, Stylesheet, Value, ValueFlags, ValueKind,
};
