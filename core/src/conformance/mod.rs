//! The conformance language.
//!
//! Conformance states whether an element is mandatory, optional, provisional,
//! deprecated or disallowed, possibly depending on which features or other
//! elements are present. [`parse_conformance`] turns conformance column text
//! into a [`Conformance`]; evaluation runs against a flat
//! [`ConformanceContext`] of identifier values.
//!
//! # Examples
//!
//! ```
//! use matter_model_core::*;
//!
//! let conformance = parse_conformance("LT & !BT");
//! let cx = ConformanceContext::new()
//!     .with("LT", ContextValue::Bool(true))
//!     .with("BT", ContextValue::Bool(false));
//! assert_eq!(conformance.eval(&cx), Ok(true));
//! assert_eq!(conformance.classify(&cx), Ok(ConformanceState::Mandatory));
//! ```

mod parse;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Bitmap;

pub use parse::parse_conformance;

/// Boolean expression over identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expression {
    /// A feature, attribute or other element name. With `not` set the
    /// identifier is negated in place.
    Identifier { id: String, not: bool },
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
}

impl Expression {
    pub fn identifier(id: impl Into<String>) -> Self {
        Self::Identifier {
            id: id.into(),
            not: false,
        }
    }

    /// A negated identifier, the form `!ID` parses to.
    pub fn negated(id: impl Into<String>) -> Self {
        Self::Identifier {
            id: id.into(),
            not: true,
        }
    }

    pub fn not(inner: Expression) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    /// Evaluates the expression. `And` and `Or` short-circuit left to right,
    /// so a mismatched value in an operand that is never reached is not an
    /// error.
    pub fn eval(&self, cx: &ConformanceContext) -> Result<bool, EvalError> {
        match self {
            Self::Identifier { id, not } => match cx.get(id) {
                None => Ok(*not),
                Some(ContextValue::Bool(b)) => Ok(*b != *not),
                Some(other) => Err(EvalError::TypeMismatch {
                    identifier: id.clone(),
                    value: other.clone(),
                }),
            },
            Self::Not(inner) => Ok(!inner.eval(cx)?),
            Self::And(left, right) => Ok(left.eval(cx)? && right.eval(cx)?),
            Self::Or(left, right) => Ok(left.eval(cx)? || right.eval(cx)?),
        }
    }

    fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Identifier { id, .. } => out.push(id),
            Self::Not(inner) => inner.collect_identifiers(out),
            Self::And(left, right) | Self::Or(left, right) => {
                left.collect_identifiers(out);
                right.collect_identifiers(out);
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Or(..) => 0,
            Self::And(..) => 1,
            Self::Not(_) | Self::Identifier { .. } => 2,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min_precedence: u8) -> fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier { id, not: false } => f.write_str(id),
            Self::Identifier { id, not: true } => write!(f, "!{id}"),
            Self::Not(inner) => {
                f.write_str("!")?;
                inner.fmt_operand(f, 2)
            }
            Self::And(left, right) => {
                left.fmt_operand(f, 1)?;
                f.write_str(" & ")?;
                right.fmt_operand(f, 2)
            }
            Self::Or(left, right) => {
                left.fmt_operand(f, 0)?;
                f.write_str(" | ")?;
                right.fmt_operand(f, 1)
            }
        }
    }
}

/// How many members of a choice set must be supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChoiceLimit {
    Exactly(u32),
    AtLeast(u32),
}

/// An optional choice set, written `.a`, `.a+`, `.b2` or `.b2+`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub set: String,
    pub limit: ChoiceLimit,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.set)?;
        match self.limit {
            ChoiceLimit::Exactly(1) => Ok(()),
            ChoiceLimit::Exactly(n) => write!(f, "{n}"),
            ChoiceLimit::AtLeast(1) => f.write_str("+"),
            ChoiceLimit::AtLeast(n) => write!(f, "{n}+"),
        }
    }
}

/// Parsed conformance.
///
/// Serializes as canonical text and deserializes through
/// [`parse_conformance`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Conformance {
    /// `M`, or a bare expression that makes the element mandatory when true.
    Mandatory(Option<Expression>),
    /// `O`, `O.a`, `[expr]` or `[expr].a`.
    Optional {
        condition: Option<Expression>,
        choice: Option<Choice>,
    },
    /// `P`
    Provisional,
    /// `D`
    Deprecated,
    /// `X`
    Disallowed,
    /// `desc`: described in prose.
    Described,
    /// `Zigbee`: applies only to the legacy Zigbee encoding.
    Zigbee,
    /// Text outside the conformance language.
    Generic(String),
    /// Comma separated otherwise list; the first member that applies decides.
    Set(Vec<Conformance>),
}

/// Outcome of classifying a conformance against a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConformanceState {
    Mandatory,
    Optional,
    Provisional,
    Deprecated,
    Disallowed,
}

impl Conformance {
    /// Returns `true` when the element is allowed under `cx`.
    ///
    /// Unconditional mandatory, optional, provisional and described markers
    /// are always true. Disallowed, deprecated, Zigbee-only and unparsed
    /// conformance are false. Conditional forms evaluate their condition, and
    /// an otherwise set is true if any member is.
    pub fn eval(&self, cx: &ConformanceContext) -> Result<bool, EvalError> {
        match self {
            Self::Mandatory(None) | Self::Optional { condition: None, .. } => Ok(true),
            Self::Mandatory(Some(expr)) | Self::Optional { condition: Some(expr), .. } => {
                expr.eval(cx)
            }
            Self::Provisional | Self::Described => Ok(true),
            Self::Deprecated | Self::Disallowed | Self::Zigbee | Self::Generic(_) => Ok(false),
            Self::Set(items) => {
                for item in items {
                    if item.eval(cx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Decides the element's state under `cx`.
    ///
    /// Members of an otherwise set are tried in order and the first one that
    /// applies decides. Unconditional markers always apply; conditional ones
    /// apply when their condition holds. When nothing applies the element is
    /// disallowed.
    pub fn classify(&self, cx: &ConformanceContext) -> Result<ConformanceState, EvalError> {
        match self {
            Self::Set(items) => {
                for item in items {
                    if let Some(state) = item.applies(cx)? {
                        return Ok(state);
                    }
                }
                Ok(ConformanceState::Disallowed)
            }
            other => Ok(other.applies(cx)?.unwrap_or(ConformanceState::Disallowed)),
        }
    }

    fn applies(&self, cx: &ConformanceContext) -> Result<Option<ConformanceState>, EvalError> {
        let state = match self {
            Self::Mandatory(None) => ConformanceState::Mandatory,
            Self::Mandatory(Some(expr)) => {
                if !expr.eval(cx)? {
                    return Ok(None);
                }
                ConformanceState::Mandatory
            }
            Self::Optional { condition, .. } => {
                if let Some(expr) = condition {
                    if !expr.eval(cx)? {
                        return Ok(None);
                    }
                }
                ConformanceState::Optional
            }
            Self::Described => ConformanceState::Optional,
            Self::Provisional => ConformanceState::Provisional,
            Self::Deprecated => ConformanceState::Deprecated,
            Self::Disallowed => ConformanceState::Disallowed,
            Self::Zigbee | Self::Generic(_) => return Ok(None),
            Self::Set(_) => return self.classify(cx).map(Some),
        };
        Ok(Some(state))
    }

    fn items(&self) -> &[Conformance] {
        match self {
            Self::Set(items) => items,
            other => std::slice::from_ref(other),
        }
    }

    /// Returns `true` if any member is the `Zigbee` marker.
    pub fn is_zigbee(&self) -> bool {
        self.items().iter().any(|c| matches!(c, Self::Zigbee))
    }

    /// Returns `true` for unconditional `M`.
    pub fn is_mandatory(&self) -> bool {
        matches!(self.items(), [Self::Mandatory(None)])
    }

    /// Returns `true` for unconditional `O` without a choice set.
    pub fn is_optional(&self) -> bool {
        matches!(
            self.items(),
            [Self::Optional {
                condition: None,
                choice: None
            }]
        )
    }

    /// Returns `true` for `X`.
    pub fn is_disallowed(&self) -> bool {
        matches!(self.items(), [Self::Disallowed])
    }

    /// Returns `true` when the first member is `P`.
    pub fn is_provisional(&self) -> bool {
        matches!(self.items().first(), Some(Self::Provisional))
    }

    /// Returns `true` when the first member is `D`.
    pub fn is_deprecated(&self) -> bool {
        matches!(self.items().first(), Some(Self::Deprecated))
    }

    /// Identifiers referenced by any condition, in order of appearance.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for item in self.items() {
            match item {
                Self::Mandatory(Some(expr)) | Self::Optional { condition: Some(expr), .. } => {
                    expr.collect_identifiers(&mut out);
                }
                Self::Set(_) => out.extend(item.identifiers()),
                _ => {}
            }
        }
        out
    }
}

impl fmt::Display for Conformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mandatory(None) => f.write_str("M"),
            Self::Mandatory(Some(expr)) => write!(f, "{expr}"),
            Self::Optional { condition, choice } => {
                match condition {
                    Some(expr) => write!(f, "[{expr}]")?,
                    None => f.write_str("O")?,
                }
                if let Some(choice) = choice {
                    write!(f, "{choice}")?;
                }
                Ok(())
            }
            Self::Provisional => f.write_str("P"),
            Self::Deprecated => f.write_str("D"),
            Self::Disallowed => f.write_str("X"),
            Self::Described => f.write_str("desc"),
            Self::Zigbee => f.write_str("Zigbee"),
            Self::Generic(text) => f.write_str(text),
            Self::Set(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<String> for Conformance {
    fn from(text: String) -> Self {
        parse_conformance(&text)
    }
}

impl From<Conformance> for String {
    fn from(conformance: Conformance) -> Self {
        conformance.to_string()
    }
}

/// Value bound to an identifier in a [`ConformanceContext`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// Conformance evaluation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// An identifier is bound to a non-boolean value.
    #[error("unexpected value for identifier {identifier}: {value:?}")]
    TypeMismatch {
        identifier: String,
        value: ContextValue,
    },
}

/// Flat identifier → value map used to evaluate conformance.
///
/// # Examples
///
/// ```
/// use matter_model_core::*;
///
/// let mut features = Bitmap::new("Feature", DataType::new("map32"));
/// features.bits.push(Bit::new("0", "Lighting").with_code("LT"));
/// features.bits.push(Bit::new("1", "DeadFrontBehavior").with_code("DF"));
///
/// let cx = ConformanceContext::from_features(&features, &["LT"]);
/// assert_eq!(cx.get("LT"), Some(&ContextValue::Bool(true)));
/// assert_eq!(cx.get("DF"), Some(&ContextValue::Bool(false)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConformanceContext {
    values: HashMap<String, ContextValue>,
}

impl ConformanceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, id: impl Into<String>, value: ContextValue) -> Self {
        self.insert(id, value);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, value: ContextValue) {
        self.values.insert(id.into(), value);
    }

    pub fn get(&self, id: &str) -> Option<&ContextValue> {
        self.values.get(id)
    }

    /// Binds every feature bit's code and name to whether it is enabled.
    ///
    /// `enabled` may list codes or names.
    pub fn from_features(features: &Bitmap, enabled: &[&str]) -> Self {
        let mut cx = Self::new();
        for bit in &features.bits {
            let on = enabled
                .iter()
                .any(|e| *e == bit.name || bit.code.as_deref() == Some(*e));
            if let Some(code) = &bit.code {
                cx.insert(code.clone(), ContextValue::Bool(on));
            }
            cx.insert(bit.name.clone(), ContextValue::Bool(on));
        }
        cx
    }
}
