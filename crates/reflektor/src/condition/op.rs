//! Operators used in selector conditions.

use std::cmp::Ordering;
use std::fmt;

use crate::error::EvalError;
use crate::lexer::Operator;

/// Comparison operator.
///
/// Ordering operators (`<`, `<=`, `>`, `>=`) only apply to numbers; equality
/// works on every operand type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Lt,
    Lte,
    /// Written `=` or `==`.
    Eq,
    Ne,
    Gt,
    Gte,
}

impl CompareOp {
    /// Maps a lexer operator to a comparison, if it is one.
    pub fn from_operator(op: Operator) -> Option<Self> {
        match op {
            Operator::Lt => Some(CompareOp::Lt),
            Operator::Lte => Some(CompareOp::Lte),
            Operator::Assign | Operator::Eq => Some(CompareOp::Eq),
            Operator::Ne => Some(CompareOp::Ne),
            Operator::Gt => Some(CompareOp::Gt),
            Operator::Gte => Some(CompareOp::Gte),
            _ => None,
        }
    }

    /// Returns `true` for operators that only make sense on ordered values.
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte
        )
    }

    /// Evaluates the comparison given the ordering of its operands.
    pub fn eval_ordering(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Gte => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub fn from_operator(op: Operator) -> Option<Self> {
        match op {
            Operator::Plus => Some(ArithOp::Add),
            Operator::Minus => Some(ArithOp::Sub),
            Operator::Star => Some(ArithOp::Mul),
            Operator::Slash => Some(ArithOp::Div),
            _ => None,
        }
    }

    /// `*` and `/` bind tighter than `+` and `-`.
    pub fn is_multiplicative(self) -> bool {
        matches!(self, ArithOp::Mul | ArithOp::Div)
    }

    pub fn apply(self, left: f64, right: f64) -> Result<f64, EvalError> {
        match self {
            ArithOp::Add => Ok(left + right),
            ArithOp::Sub => Ok(left - right),
            ArithOp::Mul => Ok(left * right),
            ArithOp::Div if right == 0.0 => Err(EvalError::DivisionByZero),
            ArithOp::Div => Ok(left / right),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
