//! Data types referenced by fields, bitmaps and enums.
//!
//! A [`DataType`] is stored as the name written in the specification table
//! (e.g. `uint16`, `percent100ths`, `ModeBitmap`) plus an array marker. The
//! numeric interpretation ([`BaseDataType`]), byte width and null sentinel
//! are derived from the name on demand so that the JSON projection stays a
//! plain name.

use serde::{Deserialize, Serialize};

/// Primitive interpretation of a data type name.
///
/// Names that are not Matter primitives (struct, enum or bitmap names
/// declared by a cluster) map to [`BaseDataType::Custom`].
///
/// # Examples
///
/// ```
/// use matter_model_core::BaseDataType;
///
/// assert_eq!(BaseDataType::from_name("uint16"), BaseDataType::UInt16);
/// assert_eq!(BaseDataType::from_name("percent100ths"), BaseDataType::PercentHundredths);
/// assert_eq!(BaseDataType::from_name("ModeBitmap"), BaseDataType::Custom);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BaseDataType {
    Boolean,
    UInt8,
    UInt16,
    UInt24,
    UInt32,
    UInt40,
    UInt48,
    UInt56,
    UInt64,
    Int8,
    Int16,
    Int24,
    Int32,
    Int40,
    Int48,
    Int56,
    Int64,
    Map8,
    Map16,
    Map32,
    Map64,
    Enum8,
    Enum16,
    Percent,
    PercentHundredths,
    Temperature,
    EpochSeconds,
    EpochMicroseconds,
    Single,
    Double,
    String,
    OctetString,
    /// A cluster-defined type or an unrecognised name.
    #[default]
    Custom,
}

impl BaseDataType {
    /// Maps a specification type name to its primitive interpretation.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Self::Boolean,
            "uint8" | "int8u" => Self::UInt8,
            "uint16" | "int16u" => Self::UInt16,
            "uint24" | "int24u" => Self::UInt24,
            "uint32" | "int32u" => Self::UInt32,
            "uint40" | "int40u" => Self::UInt40,
            "uint48" | "int48u" => Self::UInt48,
            "uint56" | "int56u" => Self::UInt56,
            "uint64" | "int64u" => Self::UInt64,
            "int8" | "int8s" => Self::Int8,
            "int16" | "int16s" => Self::Int16,
            "int24" | "int24s" => Self::Int24,
            "int32" | "int32s" => Self::Int32,
            "int40" | "int40s" => Self::Int40,
            "int48" | "int48s" => Self::Int48,
            "int56" | "int56s" => Self::Int56,
            "int64" | "int64s" => Self::Int64,
            "map8" | "bitmap8" => Self::Map8,
            "map16" | "bitmap16" => Self::Map16,
            "map32" | "bitmap32" => Self::Map32,
            "map64" | "bitmap64" => Self::Map64,
            "enum8" => Self::Enum8,
            "enum16" => Self::Enum16,
            "percent" => Self::Percent,
            "percent100ths" => Self::PercentHundredths,
            "temperature" => Self::Temperature,
            "epoch-s" | "epoch_s" => Self::EpochSeconds,
            "epoch-us" | "epoch_us" => Self::EpochMicroseconds,
            "single" => Self::Single,
            "double" => Self::Double,
            "string" | "char_string" | "long_char_string" => Self::String,
            "octstr" | "octet_string" | "long_octet_string" => Self::OctetString,
            _ => Self::Custom,
        }
    }

    /// Width of the wire encoding in bytes, or 0 for variable/unknown sizes.
    pub fn size(self) -> usize {
        match self {
            Self::Boolean | Self::UInt8 | Self::Int8 | Self::Map8 | Self::Enum8 | Self::Percent => 1,
            Self::UInt16
            | Self::Int16
            | Self::Map16
            | Self::Enum16
            | Self::PercentHundredths
            | Self::Temperature => 2,
            Self::UInt24 | Self::Int24 => 3,
            Self::UInt32 | Self::Int32 | Self::Map32 | Self::EpochSeconds | Self::Single => 4,
            Self::UInt40 | Self::Int40 => 5,
            Self::UInt48 | Self::Int48 => 6,
            Self::UInt56 | Self::Int56 => 7,
            Self::UInt64 | Self::Int64 | Self::Map64 | Self::EpochMicroseconds | Self::Double => 8,
            Self::String | Self::OctetString | Self::Custom => 0,
        }
    }

    /// Returns `true` for two's-complement integer encodings.
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int24
                | Self::Int32
                | Self::Int40
                | Self::Int48
                | Self::Int56
                | Self::Int64
                | Self::Temperature
        )
    }

    /// The sentinel the wire format uses for a null value of this type.
    ///
    /// Unsigned types reserve their all-ones value; signed types reserve the
    /// most negative value (returned as its two's-complement bit pattern).
    /// Bitmaps, strings and floats have no integer sentinel.
    pub fn null_value(self) -> Option<u64> {
        match self {
            Self::Map8 | Self::Map16 | Self::Map32 | Self::Map64 => None,
            Self::Single | Self::Double | Self::String | Self::OctetString | Self::Custom => None,
            _ => {
                let bits = (self.size() * 8) as u32;
                if self.is_signed() {
                    Some(1u64 << (bits - 1))
                } else if bits == 64 {
                    Some(u64::MAX)
                } else {
                    Some((1u64 << bits) - 1)
                }
            }
        }
    }
}

/// A field's declared data type.
///
/// # Examples
///
/// ```
/// use matter_model_core::{BaseDataType, DataType};
///
/// let dt = DataType::new("uint16");
/// assert_eq!(dt.size(), 2);
/// assert_eq!(dt.null_value(), Some(0xFFFF));
///
/// let list = DataType::list("TargetStruct");
/// assert!(list.is_array);
/// assert_eq!(list.base_type(), BaseDataType::Custom);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataType {
    /// Type name as written in the specification.
    pub name: String,
    /// Whether the field is a list of `name`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_array: bool,
}

impl DataType {
    /// Creates a scalar data type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_array: false,
        }
    }

    /// Creates a list data type whose entries are `name`.
    pub fn list(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_array: true,
        }
    }

    pub fn base_type(&self) -> BaseDataType {
        BaseDataType::from_name(&self.name)
    }

    /// Byte width of one value (entry width for lists).
    pub fn size(&self) -> usize {
        self.base_type().size()
    }

    pub fn null_value(&self) -> Option<u64> {
        self.base_type().null_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_values_follow_width_and_sign() {
        assert_eq!(BaseDataType::UInt8.null_value(), Some(0xFF));
        assert_eq!(BaseDataType::UInt64.null_value(), Some(u64::MAX));
        assert_eq!(BaseDataType::Int8.null_value(), Some(0x80));
        assert_eq!(BaseDataType::Int16.null_value(), Some(0x8000));
        assert_eq!(BaseDataType::Temperature.null_value(), Some(0x8000));
        assert_eq!(BaseDataType::EpochSeconds.null_value(), Some(0xFFFF_FFFF));
        assert_eq!(BaseDataType::Map16.null_value(), None);
        assert_eq!(BaseDataType::Custom.null_value(), None);
    }

    #[test]
    fn test_from_name_is_case_insensitive() {
        assert_eq!(BaseDataType::from_name("UINT8"), BaseDataType::UInt8);
        assert_eq!(BaseDataType::from_name(" bool "), BaseDataType::Boolean);
        assert_eq!(BaseDataType::from_name("epoch-s"), BaseDataType::EpochSeconds);
    }

    #[test]
    fn test_data_type_json_omits_scalar_marker() {
        let json = serde_json::to_string(&DataType::new("uint8")).unwrap();
        assert_eq!(json, r#"{"name":"uint8"}"#);
        let list: DataType = serde_json::from_str(r#"{"name":"uint8","is_array":true}"#).unwrap();
        assert!(list.is_array);
    }
}
