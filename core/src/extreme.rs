//! Computed bounds and their textual rendering.
//!
//! Every constraint accessor (`min`, `max`, `default`) produces an
//! [`Extreme`]. Extremes are combined only through [`Extreme::combine`], which
//! never wraps or truncates: any combination that cannot be represented
//! degrades to [`ExtremeValue::Undefined`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data_type::{BaseDataType, DataType};

/// Display hint attached to an extreme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NumberFormat {
    /// Plain decimal (the default).
    #[default]
    Decimal,
    /// Hexadecimal, padded to the data type width when it is known.
    Hex,
    /// Hex above 255, decimal otherwise.
    Auto,
}

/// The kind and payload of an extreme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ExtremeValue {
    /// No bound could be computed.
    #[default]
    Undefined,
    Int64(i64),
    UInt64(u64),
    /// The wire null sentinel.
    Null,
    /// An empty value (empty list or string).
    Empty,
}

/// Output schema conventions a bound can be rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TargetSchema {
    /// The legacy ZAP XML convention.
    #[default]
    Legacy,
    /// The canonical data-model XML convention.
    DataModel,
}

/// Binary operator of a math limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MathOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl MathOperator {
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '+' => Some(Self::Add),
            '-' => Some(Self::Subtract),
            '*' => Some(Self::Multiply),
            '/' => Some(Self::Divide),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '*',
            Self::Divide => '/',
        }
    }

    fn apply_i64(self, left: i64, right: i64) -> Option<i64> {
        match self {
            Self::Add => left.checked_add(right),
            Self::Subtract => left.checked_sub(right),
            Self::Multiply => left.checked_mul(right),
            Self::Divide => left.checked_div(right),
        }
    }

    fn apply_u64(self, left: u64, right: u64) -> Option<u64> {
        match self {
            Self::Add => left.checked_add(right),
            Self::Subtract => left.checked_sub(right),
            Self::Multiply => left.checked_mul(right),
            Self::Divide => left.checked_div(right),
        }
    }
}

impl fmt::Display for MathOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A computed minimum, maximum or default bound.
///
/// # Examples
///
/// ```
/// use matter_model_core::{DataType, Extreme, MathOperator, NumberFormat, TargetSchema};
///
/// let five = Extreme::int(5, NumberFormat::Decimal);
/// let three = Extreme::uint(3, NumberFormat::Decimal);
/// let sum = five.combine(MathOperator::Add, three);
/// assert_eq!(sum.as_i64(), Some(8));
///
/// let mask = Extreme::uint(0x1F, NumberFormat::Hex);
/// assert_eq!(mask.format_for(TargetSchema::Legacy, Some(&DataType::new("map16"))), "0x001F");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Extreme {
    pub value: ExtremeValue,
    #[serde(default)]
    pub format: NumberFormat,
}

impl Extreme {
    pub const fn undefined() -> Self {
        Self {
            value: ExtremeValue::Undefined,
            format: NumberFormat::Decimal,
        }
    }

    pub const fn int(value: i64, format: NumberFormat) -> Self {
        Self {
            value: ExtremeValue::Int64(value),
            format,
        }
    }

    pub const fn uint(value: u64, format: NumberFormat) -> Self {
        Self {
            value: ExtremeValue::UInt64(value),
            format,
        }
    }

    pub const fn null() -> Self {
        Self {
            value: ExtremeValue::Null,
            format: NumberFormat::Decimal,
        }
    }

    pub const fn empty() -> Self {
        Self {
            value: ExtremeValue::Empty,
            format: NumberFormat::Decimal,
        }
    }

    /// Returns `false` when no bound could be computed.
    pub fn is_defined(&self) -> bool {
        self.value != ExtremeValue::Undefined
    }

    /// Signed view of a numeric extreme, if it fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self.value {
            ExtremeValue::Int64(v) => Some(v),
            ExtremeValue::UInt64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Unsigned view of a numeric extreme, if it is non-negative.
    pub fn as_u64(&self) -> Option<u64> {
        match self.value {
            ExtremeValue::Int64(v) => u64::try_from(v).ok(),
            ExtremeValue::UInt64(v) => Some(v),
            _ => None,
        }
    }

    /// Applies `op` to two extremes.
    ///
    /// The left operand decides the arithmetic domain. A signed left side
    /// accepts an unsigned right side only below 2^63; an unsigned left side
    /// accepts a signed right side only when it is non-negative. Null, Empty
    /// and Undefined operands, overflow and division by zero all produce an
    /// undefined extreme.
    pub fn combine(self, op: MathOperator, other: Extreme) -> Extreme {
        let value = match (self.value, other.value) {
            (ExtremeValue::Int64(l), ExtremeValue::Int64(r)) => {
                op.apply_i64(l, r).map(ExtremeValue::Int64)
            }
            (ExtremeValue::Int64(l), ExtremeValue::UInt64(r)) => i64::try_from(r)
                .ok()
                .and_then(|r| op.apply_i64(l, r))
                .map(ExtremeValue::Int64),
            (ExtremeValue::UInt64(l), ExtremeValue::Int64(r)) => u64::try_from(r)
                .ok()
                .and_then(|r| op.apply_u64(l, r))
                .map(ExtremeValue::UInt64),
            (ExtremeValue::UInt64(l), ExtremeValue::UInt64(r)) => {
                op.apply_u64(l, r).map(ExtremeValue::UInt64)
            }
            _ => None,
        };

        match value {
            Some(value) => Extreme {
                value,
                format: if self.format == other.format {
                    self.format
                } else {
                    NumberFormat::Auto
                },
            },
            None => Extreme::undefined(),
        }
    }

    /// Renders the extreme for the given output schema.
    ///
    /// `data_type` supplies the hex padding width, the null sentinel and the
    /// percent/boolean interpretation. Undefined extremes render as an empty
    /// string.
    pub fn format_for(&self, schema: TargetSchema, data_type: Option<&DataType>) -> String {
        let base = data_type.map(DataType::base_type);
        let size = data_type.map(DataType::size).unwrap_or(0);

        match self.value {
            ExtremeValue::Undefined => String::new(),
            ExtremeValue::Int64(v) => match self.format {
                NumberFormat::Hex => hex_string(v as u64, size),
                NumberFormat::Auto if v > 0xFF => format!("0x{:X}", v as u64),
                NumberFormat::Auto => v.to_string(),
                NumberFormat::Decimal => match base {
                    Some(BaseDataType::PercentHundredths) => {
                        v.checked_mul(100).unwrap_or(v).to_string()
                    }
                    Some(BaseDataType::Boolean) if schema == TargetSchema::DataModel => {
                        (v == 1).to_string()
                    }
                    _ => v.to_string(),
                },
            },
            ExtremeValue::UInt64(v) => {
                if schema == TargetSchema::DataModel && base == Some(BaseDataType::Boolean) {
                    return (v == 1).to_string();
                }
                format_unsigned(v, self.format, base, size)
            }
            ExtremeValue::Null => match schema {
                TargetSchema::DataModel => "null".to_string(),
                TargetSchema::Legacy => data_type
                    .and_then(DataType::null_value)
                    .map(|sentinel| format_unsigned(sentinel, self.format, None, size))
                    .unwrap_or_default(),
            },
            ExtremeValue::Empty => match schema {
                TargetSchema::DataModel => "empty".to_string(),
                TargetSchema::Legacy => String::new(),
            },
        }
    }
}

impl fmt::Display for Extreme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_for(TargetSchema::DataModel, None))
    }
}

fn format_unsigned(value: u64, format: NumberFormat, base: Option<BaseDataType>, size: usize) -> String {
    match format {
        NumberFormat::Hex => hex_string(value, size),
        NumberFormat::Auto if value > 0xFF => format!("0x{value:X}"),
        NumberFormat::Auto => value.to_string(),
        NumberFormat::Decimal => match base {
            Some(BaseDataType::PercentHundredths) => {
                value.checked_mul(100).unwrap_or(value).to_string()
            }
            _ => value.to_string(),
        },
    }
}

fn hex_string(bits: u64, size: usize) -> String {
    match size {
        1 => format!("0x{:02X}", bits as u8),
        2 => format!("0x{:04X}", bits as u16),
        4 => format!("0x{:08X}", bits as u32),
        8 => format!("0x{bits:016X}"),
        _ => format!("0x{bits:X}"),
    }
}
