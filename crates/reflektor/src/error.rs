//! Error types.
//!
//! Each stage has its own error enum; [`StyleError`] is the umbrella returned
//! by the engine's load entry points.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::lexer::Span;

/// Tokenizer failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated string starting at {span}")]
    UnterminatedString { span: Span },

    #[error("unterminated comment starting at {span}")]
    UnterminatedComment { span: Span },

    #[error("block opened at {span} is never closed (expected '{delimiter}')")]
    UnterminatedBlock { span: Span, delimiter: char },

    #[error("invalid token '{text}' at {span}")]
    InvalidToken { span: Span, text: String },

    #[error("blocks nested more than {limit} levels deep at {span}")]
    TooDeep { span: Span, limit: usize },
}

/// What went wrong while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("expected {expected}, found {found}")]
    Syntax { expected: String, found: String },

    #[error("undefined variable '@{name}'")]
    UndefinedVariable { name: String },

    #[error("import cycle: {}", .chain.join(" -> "))]
    ImportCycle { chain: Vec<String> },

    #[error("more than {limit} imports expanded")]
    TooManyImports { limit: usize },

    #[error("malformed selector: {message}")]
    MalformedSelector { message: String },

    #[error("malformed condition: {message}")]
    MalformedCondition { message: String },

    #[error("unknown directive '@{name}'")]
    UnknownDirective { name: String },

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

/// A parse failure with the location it was detected at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Option<Span>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Option<Span>) -> Self {
        Self { kind, span }
    }

    pub fn syntax(expected: impl Into<String>, found: impl Into<String>, span: Option<Span>) -> Self {
        Self::new(
            ParseErrorKind::Syntax {
                expected: expected.into(),
                found: found.into(),
            },
            span,
        )
    }

    pub fn malformed_selector(message: impl Into<String>, span: Option<Span>) -> Self {
        Self::new(
            ParseErrorKind::MalformedSelector {
                message: message.into(),
            },
            span,
        )
    }

    pub fn malformed_condition(message: impl Into<String>, span: Option<Span>) -> Self {
        Self::new(
            ParseErrorKind::MalformedCondition {
                message: message.into(),
            },
            span,
        )
    }

    pub fn is_import_cycle(&self) -> bool {
        matches!(self.kind, ParseErrorKind::ImportCycle { .. })
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some(span) => write!(f, "{} at {}", self.kind, span),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ParseErrorKind::Plugin(err) => Some(err),
            _ => None,
        }
    }
}

/// Condition evaluation failures. The resolver treats them as "no match".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("operator '{op}' cannot be applied to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("operator '{op}' cannot be applied to {operand}")]
    InvalidOperand { op: &'static str, operand: &'static str },

    #[error("condition evaluated to {found}, expected a boolean")]
    NotABoolean { found: &'static str },
}

/// Stylesheet source resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("stylesheet '{name}.{extension}' not found in {location}")]
    NotFound {
        name: String,
        extension: String,
        location: String,
    },

    #[error("failed to read {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

/// A value plugin rejected or failed to compute a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{plugin}: {message}")]
pub struct PluginError {
    pub plugin: String,
    pub message: String,
}

impl PluginError {
    pub fn new(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

/// Invalid engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid engine configuration: {message}")]
pub struct ConfigError {
    pub message: String,
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError {
            message: err.to_string(),
        }
    }
}

/// Umbrella error for loading a stylesheet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StyleError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StyleError {
    /// The parse error kind, if this is a parse failure.
    pub fn parse_kind(&self) -> Option<&ParseErrorKind> {
        match self {
            StyleError::Parse(err) => Some(&err.kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StyleError>;
