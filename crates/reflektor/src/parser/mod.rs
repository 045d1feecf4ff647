//! Stylesheet parser.
//!
//! Parsing runs in three stages over one token stream:
//!
//! 1. [`tokenize`](crate::lexer::tokenize) the entry text
//! 2. splice every top-level `@import` in place, recursively, through a
//!    [`StylesheetLoader`]
//! 3. build the rule table: `@global` variables, selector blocks, nested `&`
//!    blocks, declarations, with `@name` references substituted as they are
//!    read
//!
//! # Syntax
//!
//! ```text
//! @import "colors";                       // colors.<current extension>
//!
//! @global {
//!     @accent = #ff9900;
//!     @wide: 600;
//! }
//!
//! .Button, Label {                        // class selectors
//!     tint: @accent;
//!     layer.corner-radius: 4px;           // stored as layer.cornerRadius
//!
//!     & [width > @wide] { font-size: 18; }
//!     &:primary { tint: #fff !important; }
//! }
//!
//! #dark[horizontal == compact] {          // trait selector with a condition
//!     background: rgba(0, 0, 0, 0.8);
//! }
//! ```
//!
//! Any error aborts the whole parse.

mod block;
mod cursor;
mod import;

pub use import::MAX_IMPORTS;

use tracing::debug;

use crate::error::StyleError;
use crate::lexer::{tokenize, Token};
use crate::loader::{Location, StylesheetLoader};
use crate::plugin::PluginRegistry;
use crate::stylesheet::Stylesheet;

use block::StylesheetBuilder;
use import::Importer;

/// Extension assumed for the entry text and for imports without one.
pub const DEFAULT_EXTENSION: &str = "less";

/// Parses stylesheets with a set of value plugins and, optionally, a loader
/// for `@import`.
pub struct Parser<'a> {
    plugins: &'a PluginRegistry,
    loader: Option<(&'a dyn StylesheetLoader, Location)>,
    default_extension: String,
}

impl<'a> Parser<'a> {
    pub fn new(plugins: &'a PluginRegistry) -> Self {
        Self {
            plugins,
            loader: None,
            default_extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Resolves `@import` through `loader`, relative to `location`. Without a
    /// loader every import fails with [`LoadError::NotFound`](crate::LoadError::NotFound).
    pub fn with_loader(mut self, loader: &'a dyn StylesheetLoader, location: Location) -> Self {
        self.loader = Some((loader, location));
        self
    }

    /// Extension given to imports of the entry text that have none.
    pub fn with_default_extension(mut self, extension: impl Into<String>) -> Self {
        self.default_extension = extension.into();
        self
    }

    /// Parses stylesheet text.
    pub fn parse_stylesheet(&self, text: &str) -> Result<Stylesheet, StyleError> {
        let tokens = tokenize(text, None)?;
        let tokens = self.importer().expand(tokens, &self.default_extension)?;
        self.build(tokens)
    }

    /// Loads `name.extension` through the loader and parses it.
    pub fn parse_file(&self, name: &str, extension: &str) -> Result<Stylesheet, StyleError> {
        let tokens = self.importer().load_root(name, extension)?;
        self.build(tokens)
    }

    fn importer(&self) -> Importer<'_> {
        Importer::new(
            self.loader
                .as_ref()
                .map(|(loader, location)| (*loader, location)),
        )
    }

    fn build(&self, tokens: Vec<Token>) -> Result<Stylesheet, StyleError> {
        let mut builder = StylesheetBuilder::new(self.plugins);
        builder.parse(tokens)?;
        let stylesheet = builder.build();
        debug!(
            selectors = stylesheet.rules().len(),
            variables = stylesheet.variables().len(),
            "parsed stylesheet"
        );
        Ok(stylesheet)
    }
}

/// Parses stylesheet text without import support.
pub fn parse_stylesheet(text: &str, plugins: &PluginRegistry) -> Result<Stylesheet, StyleError> {
    Parser::new(plugins).parse_stylesheet(text)
}
