//! Condition evaluation.

use std::fmt;

use super::expr::Expr;
use super::op::CompareOp;
use crate::context::Environment;
use crate::error::EvalError;

/// A value produced while evaluating a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Scalar {
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Number(_) => "number",
            Scalar::Text(_) => "text",
            Scalar::Bool(_) => "boolean",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => f.write_str(s),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<i32> for Scalar {
    fn from(n: i32) -> Self {
        Scalar::Number(f64::from(n))
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

/// What identifiers in a condition resolve against.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub environment: &'a Environment,
    pub trait_name: Option<&'a str>,
}

impl<'a> EvalContext<'a> {
    pub fn new(environment: &'a Environment, trait_name: Option<&'a str>) -> Self {
        Self {
            environment,
            trait_name,
        }
    }

    /// Resolves an identifier path.
    ///
    /// Built-in attributes win over environment values. Returns `None` for
    /// unknown names, which evaluate as keyword text.
    pub fn lookup(&self, path: &str) -> Option<Scalar> {
        let env = self.environment;
        let traits = &env.traits;
        let value = match path {
            "width" | "size.width" => Scalar::Number(env.size.width),
            "height" | "size.height" => Scalar::Number(env.size.height),
            "horizontal" => Scalar::Text(traits.horizontal.as_str().to_string()),
            "vertical" => Scalar::Text(traits.vertical.as_str().to_string()),
            "idiom" => Scalar::Text(traits.idiom.as_str().to_string()),
            "scale" => Scalar::Number(traits.scale),
            "appearance" => Scalar::Text(traits.appearance.as_str().to_string()),
            "trait" => Scalar::Text(self.trait_name.unwrap_or_default().to_string()),
            _ => return env.values.get(path).cloned(),
        };
        Some(value)
    }
}

impl Expr {
    /// Evaluates the expression to a scalar.
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Scalar, EvalError> {
        match self {
            Expr::Number(n) => Ok(Scalar::Number(*n)),
            Expr::Text(s) => Ok(Scalar::Text(s.clone())),
            Expr::Bool(b) => Ok(Scalar::Bool(*b)),
            Expr::Ident(path) => Ok(ctx
                .lookup(path)
                .unwrap_or_else(|| Scalar::Text(path.clone()))),
            Expr::Negate(inner) => match inner.evaluate(ctx)? {
                Scalar::Number(n) => Ok(Scalar::Number(-n)),
                other => Err(EvalError::InvalidOperand {
                    op: "-",
                    operand: other.type_name(),
                }),
            },
            Expr::Not(inner) => Ok(Scalar::Bool(!expect_bool("not", inner.evaluate(ctx)?)?)),
            Expr::And(left, right) => {
                if !expect_bool("and", left.evaluate(ctx)?)? {
                    return Ok(Scalar::Bool(false));
                }
                Ok(Scalar::Bool(expect_bool("and", right.evaluate(ctx)?)?))
            }
            Expr::Or(left, right) => {
                if expect_bool("or", left.evaluate(ctx)?)? {
                    return Ok(Scalar::Bool(true));
                }
                Ok(Scalar::Bool(expect_bool("or", right.evaluate(ctx)?)?))
            }
            Expr::Compare(op, left, right) => {
                let left = left.evaluate(ctx)?;
                let right = right.evaluate(ctx)?;
                compare(*op, &left, &right).map(Scalar::Bool)
            }
            Expr::Arith(op, left, right) => {
                let left = left.evaluate(ctx)?;
                let right = right.evaluate(ctx)?;
                match (&left, &right) {
                    (Scalar::Number(l), Scalar::Number(r)) => op.apply(*l, *r).map(Scalar::Number),
                    _ => Err(EvalError::TypeMismatch {
                        op: op.as_str(),
                        left: left.type_name(),
                        right: right.type_name(),
                    }),
                }
            }
        }
    }
}

fn expect_bool(op: &'static str, value: Scalar) -> Result<bool, EvalError> {
    match value {
        Scalar::Bool(b) => Ok(b),
        other => Err(EvalError::InvalidOperand {
            op,
            operand: other.type_name(),
        }),
    }
}

fn compare(op: CompareOp, left: &Scalar, right: &Scalar) -> Result<bool, EvalError> {
    match (left, right) {
        // NaN compares false under every operator.
        (Scalar::Number(l), Scalar::Number(r)) => {
            Ok(l.partial_cmp(r).is_some_and(|ordering| op.eval_ordering(ordering)))
        }
        (Scalar::Text(l), Scalar::Text(r)) if !op.is_ordering() => Ok(op.eval_ordering(l.cmp(r))),
        (Scalar::Bool(l), Scalar::Bool(r)) if !op.is_ordering() => Ok(op.eval_ordering(l.cmp(r))),
        _ => Err(EvalError::TypeMismatch {
            op: op.as_str(),
            left: left.type_name(),
            right: right.type_name(),
        }),
    }
}
