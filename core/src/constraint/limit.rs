use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Bound, ConstraintContext};
use crate::extreme::{Extreme, MathOperator, NumberFormat};

/// One operand of a constraint.
///
/// Literals evaluate to themselves for every bound. A [`Limit::Reference`]
/// names a sibling field and evaluates that field's constraint; a
/// [`Limit::Math`] node evaluates both operands for the same bound and
/// combines them with checked arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Limit {
    /// Signed decimal literal.
    Int(i64),
    /// Decimal literal above `i64::MAX`.
    UInt(u64),
    /// Hexadecimal literal (`0x..`).
    Hex(u64),
    Bool(bool),
    Null,
    Empty,
    /// Name of a sibling field.
    Reference(String),
    Math {
        op: MathOperator,
        left: Box<Limit>,
        right: Box<Limit>,
    },
}

impl Limit {
    pub fn math(op: MathOperator, left: Limit, right: Limit) -> Self {
        Self::Math {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn min(&self, cx: &ConstraintContext<'_>) -> Extreme {
        self.evaluate(Bound::Min, cx)
    }

    pub fn max(&self, cx: &ConstraintContext<'_>) -> Extreme {
        self.evaluate(Bound::Max, cx)
    }

    pub fn default(&self, cx: &ConstraintContext<'_>) -> Extreme {
        self.evaluate(Bound::Default, cx)
    }

    pub(crate) fn evaluate(&self, bound: Bound, cx: &ConstraintContext<'_>) -> Extreme {
        match self {
            Self::Int(v) => Extreme::int(*v, NumberFormat::Decimal),
            Self::UInt(v) => Extreme::uint(*v, NumberFormat::Decimal),
            Self::Hex(v) => Extreme::uint(*v, NumberFormat::Hex),
            Self::Bool(b) => Extreme::uint(u64::from(*b), NumberFormat::Decimal),
            Self::Null => Extreme::null(),
            Self::Empty => Extreme::empty(),
            Self::Reference(name) => cx.resolve(name, bound),
            Self::Math { op, left, right } => {
                let left = left.evaluate(bound, cx);
                let right = right.evaluate(bound, cx);
                left.combine(*op, right)
            }
        }
    }

    /// Collects every referenced field name, including those nested in math.
    pub fn references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Reference(name) => out.push(name),
            Self::Math { left, right, .. } => {
                left.references(out);
                right.references(out);
            }
            _ => {}
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Hex(v) => write!(f, "0x{v:X}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => f.write_str("null"),
            Self::Empty => f.write_str("empty"),
            Self::Reference(name) => f.write_str(name),
            Self::Math { op, left, right } => write!(f, "({left} {op} {right})"),
        }
    }
}
