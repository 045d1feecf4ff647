//! Selector conditions.
//!
//! A condition is the bracketed guard of a selector (`.Card[width > 320]`). It
//! is a small expression language:
//!
//! | precedence | syntax |
//! |---|---|
//! | lowest | `a or b` |
//! | | `a and b` |
//! | | `not a` |
//! | | `a < b`, `<=`, `=`/`==`, `!=`, `>`, `>=` |
//! | | `a + b`, `a - b` |
//! | | `a * b`, `a / b` |
//! | | `-a` |
//! | highest | numbers, `"strings"`, `true`/`false`, identifiers, `( ... )` |
//!
//! Identifiers name context attributes (`width`, `size.height`, `horizontal`,
//! `vertical`, `idiom`, `scale`, `appearance`, `trait`) or environment values;
//! any other identifier is a keyword that compares as text, so
//! `horizontal == compact` reads naturally.
//!
//! Evaluation errors (division by zero, comparing a number with text, a
//! non-boolean result) never propagate to callers of [`Condition::matches`]:
//! the condition simply does not match.

mod eval;
mod expr;
mod op;

use std::fmt;
use std::hash::{Hash, Hasher};

use tracing::debug;

pub use eval::{EvalContext, Scalar};
pub use expr::{Expr, MAX_OPERATORS};
pub use op::{ArithOp, CompareOp};

use crate::error::{EvalError, ParseError, StyleError};
use crate::lexer::{tokenize, Token};

/// A parsed selector condition.
///
/// Equality and hashing use the canonical text form, so two conditions that
/// parse to the same tree are the same condition regardless of spacing or
/// `=`/`==` spelling.
#[derive(Debug, Clone)]
pub struct Condition {
    expr: Expr,
    canonical: String,
}

impl Condition {
    /// Parses a condition from tokens.
    pub fn parse(tokens: &[Token]) -> Result<Self, ParseError> {
        expr::parse_expr(tokens).map(Self::from_expr)
    }

    /// Tokenizes and parses condition source text.
    pub fn parse_str(source: &str) -> Result<Self, StyleError> {
        let tokens = tokenize(source, None)?;
        Ok(Self::parse(&tokens)?)
    }

    pub fn from_expr(expr: Expr) -> Self {
        let canonical = expr.to_string();
        Self { expr, canonical }
    }

    /// Conjunction of two conditions (`self and other`).
    pub fn and(&self, other: &Condition) -> Condition {
        Self::from_expr(Expr::And(
            Box::new(self.expr.clone()),
            Box::new(other.expr.clone()),
        ))
    }

    /// Number of ANDed terms; used for selector priority.
    pub fn terms(&self) -> usize {
        self.expr.conjuncts()
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<bool, EvalError> {
        match self.expr.evaluate(ctx)? {
            Scalar::Bool(b) => Ok(b),
            other => Err(EvalError::NotABoolean {
                found: other.type_name(),
            }),
        }
    }

    /// Evaluates the condition, treating evaluation errors as `false`.
    pub fn matches(&self, ctx: &EvalContext<'_>) -> bool {
        match self.evaluate(ctx) {
            Ok(result) => result,
            Err(err) => {
                debug!(condition = %self.canonical, error = %err, "condition evaluation failed");
                false
            }
        }
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Condition {}

impl Hash for Condition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}
