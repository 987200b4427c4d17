//! The constraint language.
//!
//! A constraint restricts the values (or lengths) a field may take. It is
//! parsed from the text of the specification's constraint column with
//! [`parse_constraint`], rendered back to canonical text by `Display`, and
//! evaluated into [`Extreme`] bounds against a [`ConstraintContext`].
//!
//! # Examples
//!
//! ```
//! use matter_model_core::*;
//!
//! let constraint = parse_constraint("1 to 10");
//! assert_eq!(constraint.to_string(), "1 to 10");
//!
//! let cx = ConstraintContext::new(None, &[]);
//! assert_eq!(constraint.min(&cx).as_i64(), Some(1));
//! assert_eq!(constraint.max(&cx).as_i64(), Some(10));
//! ```

mod limit;
mod parse;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Field;
use crate::extreme::Extreme;

pub use limit::Limit;
pub use parse::parse_constraint;

/// Which bound an accessor computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bound {
    Min,
    Max,
    Default,
}

/// Parsed constraint expression.
///
/// Constraints serialize as their canonical text and deserialize through
/// [`parse_constraint`], so text that does not parse survives as
/// [`Constraint::Generic`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Constraint {
    /// `all` (or `any`): no restriction.
    All,
    /// `desc`: the restriction is described in prose.
    Desc,
    /// Text that is not in the constraint language.
    Generic(String),
    /// A single permitted value.
    Exact(Limit),
    /// `min N`
    Min(Limit),
    /// `max N`
    Max(Limit),
    /// `A to B`
    Range { min: Limit, max: Limit },
    /// `length min N`
    MinLength(Limit),
    /// `length max N`
    MaxLength(Limit),
    /// `length A to B`
    LengthRange { min: Limit, max: Limit },
    /// `C[E]`: a list constrained by `C` whose entries are constrained by `E`.
    List {
        constraint: Box<Constraint>,
        entry: Box<Constraint>,
    },
}

impl Constraint {
    /// Lower bound of the constrained value.
    pub fn min(&self, cx: &ConstraintContext<'_>) -> Extreme {
        self.bound(Bound::Min, cx)
    }

    /// Upper bound of the constrained value.
    pub fn max(&self, cx: &ConstraintContext<'_>) -> Extreme {
        self.bound(Bound::Max, cx)
    }

    /// Value implied when no explicit default is given.
    ///
    /// Exact limits are their own default; minimums and ranges default to
    /// their lower bound.
    pub fn default(&self, cx: &ConstraintContext<'_>) -> Extreme {
        self.bound(Bound::Default, cx)
    }

    pub(crate) fn bound(&self, bound: Bound, cx: &ConstraintContext<'_>) -> Extreme {
        match self {
            Self::All | Self::Desc | Self::Generic(_) => Extreme::undefined(),
            Self::Exact(limit) => limit.evaluate(bound, cx),
            Self::Min(limit) | Self::MinLength(limit) => match bound {
                Bound::Min | Bound::Default => limit.evaluate(Bound::Min, cx),
                Bound::Max => Extreme::undefined(),
            },
            Self::Max(limit) | Self::MaxLength(limit) => match bound {
                Bound::Max => limit.evaluate(Bound::Max, cx),
                Bound::Min | Bound::Default => Extreme::undefined(),
            },
            Self::Range { min, max } | Self::LengthRange { min, max } => match bound {
                Bound::Min | Bound::Default => min.evaluate(Bound::Min, cx),
                Bound::Max => max.evaluate(Bound::Max, cx),
            },
            Self::List { constraint, .. } => constraint.bound(bound, cx),
        }
    }

    /// Returns the entry constraint of a list constraint.
    pub fn entry(&self) -> Option<&Constraint> {
        match self {
            Self::List { entry, .. } => Some(entry),
            _ => None,
        }
    }

    /// Returns `true` for constraints on length rather than value.
    pub fn is_length(&self) -> bool {
        matches!(
            self,
            Self::MinLength(_) | Self::MaxLength(_) | Self::LengthRange { .. }
        )
    }

    /// Names of all fields this constraint refers to.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    /// Names referenced when computing one bound.
    pub(crate) fn bound_references(&self, bound: Bound) -> Vec<&str> {
        let mut out = Vec::new();
        match self {
            Self::All | Self::Desc | Self::Generic(_) => {}
            Self::Exact(limit) => limit.references(&mut out),
            Self::Min(limit) | Self::MinLength(limit) => {
                if bound != Bound::Max {
                    limit.references(&mut out);
                }
            }
            Self::Max(limit) | Self::MaxLength(limit) => {
                if bound == Bound::Max {
                    limit.references(&mut out);
                }
            }
            Self::Range { min, max } | Self::LengthRange { min, max } => match bound {
                Bound::Max => max.references(&mut out),
                Bound::Min | Bound::Default => min.references(&mut out),
            },
            Self::List { constraint, .. } => out = constraint.bound_references(bound),
        }
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::All | Self::Desc | Self::Generic(_) => {}
            Self::Exact(limit)
            | Self::Min(limit)
            | Self::Max(limit)
            | Self::MinLength(limit)
            | Self::MaxLength(limit) => limit.references(out),
            Self::Range { min, max } | Self::LengthRange { min, max } => {
                min.references(out);
                max.references(out);
            }
            Self::List { constraint, entry } => {
                constraint.collect_references(out);
                entry.collect_references(out);
            }
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Desc => f.write_str("desc"),
            Self::Generic(text) => f.write_str(text),
            Self::Exact(limit) => write!(f, "{limit}"),
            Self::Min(limit) => write!(f, "min {limit}"),
            Self::Max(limit) => write!(f, "max {limit}"),
            Self::Range { min, max } => write!(f, "{min} to {max}"),
            Self::MinLength(limit) => write!(f, "length min {limit}"),
            Self::MaxLength(limit) => write!(f, "length max {limit}"),
            Self::LengthRange { min, max } => write!(f, "length {min} to {max}"),
            Self::List { constraint, entry } => write!(f, "{constraint}[{entry}]"),
        }
    }
}

impl From<String> for Constraint {
    fn from(text: String) -> Self {
        parse_constraint(&text)
    }
}

impl From<Constraint> for String {
    fn from(constraint: Constraint) -> Self {
        constraint.to_string()
    }
}

/// Evaluation context for constraint bounds.
///
/// Carries the field being evaluated, the sibling fields references resolve
/// against, and the set of field names already on the evaluation path. The
/// visited set belongs to one evaluation request; a reference that reappears
/// on the path evaluates to an undefined extreme.
#[derive(Debug, Clone, Default)]
pub struct ConstraintContext<'a> {
    pub field: Option<&'a Field>,
    pub fields: &'a [Field],
    visited: HashSet<String>,
}

impl<'a> ConstraintContext<'a> {
    pub fn new(field: Option<&'a Field>, fields: &'a [Field]) -> Self {
        let mut visited = HashSet::new();
        if let Some(field) = field {
            visited.insert(field.name.clone());
        }
        Self {
            field,
            fields,
            visited,
        }
    }

    /// Returns `true` if `name` is already on the evaluation path.
    pub fn is_visited(&self, name: &str) -> bool {
        self.visited.contains(name)
    }

    pub(crate) fn resolve(&self, name: &str, bound: Bound) -> Extreme {
        if self.is_visited(name) {
            tracing::debug!(reference = name, "constraint reference cycle");
            return Extreme::undefined();
        }
        let Some(target) = self.fields.iter().find(|f| f.name == name) else {
            tracing::debug!(reference = name, "unresolved constraint reference");
            return Extreme::undefined();
        };
        let Some(constraint) = target.constraint.as_ref() else {
            return Extreme::undefined();
        };

        let mut visited = self.visited.clone();
        visited.insert(name.to_string());
        let child = ConstraintContext {
            field: Some(target),
            fields: self.fields,
            visited,
        };
        constraint.bound(bound, &child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extreme::{ExtremeValue, NumberFormat};

    fn field(name: &str, constraint: &str) -> Field {
        Field::new(name).with_constraint(parse_constraint(constraint))
    }

    #[test]
    fn test_exact_uses_limit_for_all_bounds() {
        let cx = ConstraintContext::new(None, &[]);
        let c = parse_constraint("5");
        assert_eq!(c.min(&cx).as_i64(), Some(5));
        assert_eq!(c.max(&cx).as_i64(), Some(5));
        assert_eq!(c.default(&cx).as_i64(), Some(5));
    }

    #[test]
    fn test_min_and_max_leave_other_side_undefined() {
        let cx = ConstraintContext::new(None, &[]);
        let min = parse_constraint("min 3");
        assert_eq!(min.min(&cx).as_i64(), Some(3));
        assert!(!min.max(&cx).is_defined());
        assert_eq!(min.default(&cx).as_i64(), Some(3));

        let max = parse_constraint("max 254");
        assert!(!max.min(&cx).is_defined());
        assert_eq!(max.max(&cx).as_i64(), Some(254));
    }

    #[test]
    fn test_range_defaults_to_lower_bound() {
        let cx = ConstraintContext::new(None, &[]);
        let c = parse_constraint("0x10 to 0xFF");
        let min = c.min(&cx);
        assert_eq!(min.value, ExtremeValue::UInt64(0x10));
        assert_eq!(min.format, NumberFormat::Hex);
        assert_eq!(c.default(&cx), min);
    }

    #[test]
    fn test_reference_resolves_sibling_bounds() {
        let fields = vec![
            field("MinLevel", "0 to 10"),
            field("MaxLevel", "MinLevel to 254"),
            field("CurrentLevel", "MinLevel to MaxLevel"),
        ];
        let cx = ConstraintContext::new(Some(&fields[2]), &fields);
        let c = fields[2].constraint.as_ref().unwrap();
        assert_eq!(c.min(&cx).as_i64(), Some(0));
        assert_eq!(c.max(&cx).as_i64(), Some(254));
    }

    #[test]
    fn test_reference_math_uses_same_bound() {
        let fields = vec![field("Base", "10 to 20"), field("Offset", "(Base + 5) to (Base * 2)")];
        let cx = ConstraintContext::new(Some(&fields[1]), &fields);
        let c = fields[1].constraint.as_ref().unwrap();
        assert_eq!(c.min(&cx).as_i64(), Some(15));
        assert_eq!(c.max(&cx).as_i64(), Some(40));
    }

    #[test]
    fn test_reference_cycle_is_undefined() {
        let fields = vec![field("A", "B to 10"), field("B", "A to 10")];
        let cx = ConstraintContext::new(Some(&fields[0]), &fields);
        let c = fields[0].constraint.as_ref().unwrap();
        assert!(!c.min(&cx).is_defined());
        assert_eq!(c.max(&cx).as_i64(), Some(10));
    }

    #[test]
    fn test_missing_reference_is_undefined() {
        let cx = ConstraintContext::new(None, &[]);
        assert!(!parse_constraint("max Missing").max(&cx).is_defined());
    }

    #[test]
    fn test_list_bounds_come_from_outer_constraint() {
        let cx = ConstraintContext::new(None, &[]);
        let c = parse_constraint("max 4[max 32]");
        assert_eq!(c.max(&cx).as_i64(), Some(4));
        assert_eq!(c.entry(), Some(&parse_constraint("max 32")));
    }

    #[test]
    fn test_references_are_collected() {
        let c = parse_constraint("(MinLevel + 1) to MaxLevel");
        assert_eq!(c.references(), vec!["MinLevel", "MaxLevel"]);
    }

    #[test]
    fn test_serde_uses_canonical_text() {
        let c = parse_constraint("length max 32");
        assert!(c.is_length());
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, r#""length max 32""#);
        let back: Constraint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
