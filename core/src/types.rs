//! Entity graph for Matter clusters.
//!
//! A [`Cluster`] exclusively owns its features, bitmaps, enums, structs,
//! attributes, commands and events. Structs, commands and events own their
//! fields. No entity points back to its owner; lookups go through the
//! [`Reference`](crate::Reference) trait instead.
//!
//! All types derive [`serde`] traits. Constraint and conformance columns
//! serialize as their canonical text, and numeric IDs accept either a JSON
//! number or a hex/decimal string such as `"0x0006"`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Conformance, Constraint, DataType};

/// Parses a hex (`0x..`) or decimal number.
///
/// # Examples
///
/// ```
/// use matter_model_core::parse_hex_or_dec;
///
/// assert_eq!(parse_hex_or_dec("0x0006"), Some(6));
/// assert_eq!(parse_hex_or_dec(" 42 "), Some(42));
/// assert_eq!(parse_hex_or_dec("0xZZ"), None);
/// ```
pub fn parse_hex_or_dec(text: &str) -> Option<u64> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

mod numeric_id {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_u64(*v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Number(v)) => Ok(Some(v)),
            Some(Raw::Text(text)) => super::parse_hex_or_dec(&text)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid numeric id: {text}"))),
        }
    }
}

/// Attribute and field qualities from the quality column.
///
/// | Letter | Meaning |
/// |---|---|
/// | `X` | nullable |
/// | `N` | non-volatile |
/// | `F` | fixed |
/// | `S` | scene |
/// | `P` | reportable |
/// | `C` | changes omitted |
/// | `Q` | quieter reporting |
///
/// # Examples
///
/// ```
/// use matter_model_core::Quality;
///
/// let q = Quality::parse("X N");
/// assert!(q.nullable && q.non_volatile);
/// assert_eq!(q.to_string(), "XN");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Quality {
    pub nullable: bool,
    pub non_volatile: bool,
    pub fixed: bool,
    pub scene: bool,
    pub reportable: bool,
    pub changes_omitted: bool,
    pub quieter_reporting: bool,
}

impl Quality {
    /// Parses quality letters. Whitespace and unknown letters are ignored.
    pub fn parse(text: &str) -> Self {
        let mut quality = Self::default();
        for c in text.chars() {
            match c.to_ascii_uppercase() {
                'X' => quality.nullable = true,
                'N' => quality.non_volatile = true,
                'F' => quality.fixed = true,
                'S' => quality.scene = true,
                'P' => quality.reportable = true,
                'C' => quality.changes_omitted = true,
                'Q' => quality.quieter_reporting = true,
                _ => {}
            }
        }
        quality
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.nullable, 'X'),
            (self.non_volatile, 'N'),
            (self.fixed, 'F'),
            (self.scene, 'S'),
            (self.reportable, 'P'),
            (self.changes_omitted, 'C'),
            (self.quieter_reporting, 'Q'),
        ];
        for (set, letter) in flags {
            if set {
                write!(f, "{letter}")?;
            }
        }
        Ok(())
    }
}

impl From<String> for Quality {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

impl From<Quality> for String {
    fn from(quality: Quality) -> Self {
        quality.to_string()
    }
}

/// Privilege level required for an access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Privilege {
    View,
    Operate,
    Manage,
    Administer,
}

impl Privilege {
    fn from_letter(c: char) -> Option<Self> {
        match c {
            'V' => Some(Self::View),
            'O' => Some(Self::Operate),
            'M' => Some(Self::Manage),
            'A' => Some(Self::Administer),
            _ => None,
        }
    }

    fn letter(self) -> char {
        match self {
            Self::View => 'V',
            Self::Operate => 'O',
            Self::Manage => 'M',
            Self::Administer => 'A',
        }
    }
}

/// Access column of attributes, commands and events.
///
/// # Examples
///
/// ```
/// use matter_model_core::{Access, Privilege};
///
/// let access = Access::parse("RW VM T");
/// assert_eq!(access.read, Some(Privilege::View));
/// assert_eq!(access.write, Some(Privilege::Manage));
/// assert!(access.timed);
///
/// let invoke = Access::parse("A F");
/// assert_eq!(invoke.invoke, Some(Privilege::Administer));
/// assert!(invoke.fabric_scoped);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Access {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<Privilege>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<Privilege>,
    /// Write is optional (`R[W]`).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional_write: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoke: Option<Privilege>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fabric_scoped: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fabric_sensitive: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timed: bool,
}

impl Access {
    /// Parses access text such as `R V`, `RW VM`, `R[W] VO`, `F A` or `T`.
    ///
    /// With both read and write, the first privilege letter applies to read
    /// and the second (or the first again) to write. Without either, the
    /// first privilege applies to invoke.
    pub fn parse(text: &str) -> Self {
        let mut access = Self::default();
        let (mut read, mut write) = (false, false);
        let mut privileges = Vec::new();

        for token in text.split_whitespace() {
            match token {
                "F" => access.fabric_scoped = true,
                "S" => access.fabric_sensitive = true,
                "T" => access.timed = true,
                _ if token.chars().all(|c| matches!(c, 'R' | 'W' | '[' | ']')) => {
                    read |= token.contains('R');
                    write |= token.contains('W');
                    access.optional_write |= token.contains("[W]");
                }
                _ => match token.chars().map(Privilege::from_letter).collect::<Option<Vec<_>>>() {
                    Some(found) => privileges.extend(found),
                    None => tracing::debug!(token, "ignoring unknown access token"),
                },
            }
        }

        let first = privileges.first().copied();
        if read || write {
            if read {
                access.read = first;
            }
            if write {
                access.write = if read {
                    privileges.get(1).copied().or(first)
                } else {
                    first
                };
            }
        } else {
            access.invoke = first;
        }
        access
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        let rw = match (self.read.is_some(), self.write.is_some(), self.optional_write) {
            (true, true, true) => "R[W]",
            (true, true, false) => "RW",
            (true, false, _) => "R",
            (false, true, _) => "W",
            (false, false, _) => "",
        };
        if !rw.is_empty() {
            parts.push(rw.to_string());
        }
        let mut letters = String::new();
        match (self.read, self.write) {
            (Some(r), Some(w)) if r != w => {
                letters.push(r.letter());
                letters.push(w.letter());
            }
            (Some(p), _) | (None, Some(p)) => letters.push(p.letter()),
            (None, None) => {}
        }
        if let Some(p) = self.invoke {
            letters.push(p.letter());
        }
        if !letters.is_empty() {
            parts.push(letters);
        }
        for (set, flag) in [
            (self.fabric_scoped, "F"),
            (self.fabric_sensitive, "S"),
            (self.timed, "T"),
        ] {
            if set {
                parts.push(flag.to_string());
            }
        }
        f.write_str(&parts.join(" "))
    }
}

/// An attribute, struct member, or command/event field.
///
/// # Examples
///
/// ```
/// use matter_model_core::*;
///
/// let field = Field::new("CurrentLevel")
///     .with_id(0x0000)
///     .with_type(DataType::new("uint8"))
///     .with_constraint(parse_constraint("0 to 254"))
///     .with_quality(Quality::parse("X N"));
/// assert!(field.is_nullable());
/// assert_eq!(field.constraint.unwrap().to_string(), "0 to 254");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default, with = "numeric_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
    #[serde(default, skip_serializing_if = "Quality::is_empty")]
    pub quality: Quality,
    /// Default value as written in the default column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Access::is_empty")]
    pub access: Access,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conformance: Option<Conformance>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            data_type: None,
            constraint: None,
            quality: Quality::default(),
            default: None,
            access: Access::default(),
            conformance: None,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn with_conformance(mut self, conformance: Conformance) -> Self {
        self.conformance = Some(conformance);
        self
    }

    pub fn is_nullable(&self) -> bool {
        self.quality.nullable
    }

    /// Numeric value of the default column, if it is a hex or decimal number.
    pub fn default_value(&self) -> Option<u64> {
        self.default.as_deref().and_then(parse_hex_or_dec)
    }
}

/// Errors computing a bit mask from bit-position text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitMaskError {
    #[error("invalid bit position: {0:?}")]
    Invalid(String),
    #[error("bit position {0} exceeds 63")]
    OutOfRange(u32),
    #[error("bit range {from}..{to} is reversed")]
    Reversed { from: u32, to: u32 },
}

/// A bit (or bit range) of a bitmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bit {
    /// Bit position text: `"3"` or a range such as `"1..2"`.
    pub bit: String,
    pub name: String,
    /// Short code, used by features (e.g. `LT`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conformance: Option<Conformance>,
}

impl Bit {
    pub fn new(bit: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bit: bit.into(),
            name: name.into(),
            code: None,
            summary: None,
            conformance: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_conformance(mut self, conformance: Conformance) -> Self {
        self.conformance = Some(conformance);
        self
    }

    /// Computes the mask covered by this bit.
    ///
    /// Two bits are the same bit exactly when their masks are equal.
    ///
    /// # Examples
    ///
    /// ```
    /// use matter_model_core::Bit;
    ///
    /// assert_eq!(Bit::new("3", "A").mask(), Ok(0b1000));
    /// assert_eq!(Bit::new("1..2", "B").mask(), Ok(0b0110));
    /// assert_eq!(Bit::new("1 - 2", "C").mask(), Ok(0b0110));
    /// assert!(Bit::new("64", "D").mask().is_err());
    /// ```
    pub fn mask(&self) -> Result<u64, BitMaskError> {
        let text = self.bit.trim();
        let (from, to) = match text.split_once("..").or_else(|| text.split_once('-')) {
            Some((from, to)) => (parse_position(from)?, parse_position(to)?),
            None => {
                let bit = parse_position(text)?;
                (bit, bit)
            }
        };
        if from > to {
            return Err(BitMaskError::Reversed { from, to });
        }
        Ok((u64::MAX >> (63 - (to - from))) << from)
    }
}

fn parse_position(text: &str) -> Result<u32, BitMaskError> {
    let text = text.trim();
    let position: u32 = text
        .parse()
        .map_err(|_| BitMaskError::Invalid(text.to_string()))?;
    if position > 63 {
        return Err(BitMaskError::OutOfRange(position));
    }
    Ok(position)
}

/// A named bitmap type. A cluster's feature map is also a bitmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitmap {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub data_type: DataType,
    #[serde(default)]
    pub bits: Vec<Bit>,
}

impl Bitmap {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            description: None,
            data_type,
            bits: Vec::new(),
        }
    }

    pub fn with_bit(mut self, bit: Bit) -> Self {
        self.bits.push(bit);
        self
    }

    /// Finds a bit by name or code.
    pub fn find_bit(&self, name: &str) -> Option<&Bit> {
        self.bits
            .iter()
            .find(|b| b.name == name || b.code.as_deref() == Some(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    #[serde(default, with = "numeric_id", skip_serializing_if = "Option::is_none")]
    pub value: Option<u64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conformance: Option<Conformance>,
}

impl EnumValue {
    pub fn new(value: u64, name: impl Into<String>) -> Self {
        Self {
            value: Some(value),
            name: name.into(),
            summary: None,
            conformance: None,
        }
    }
}

/// A named enumeration type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enum {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub data_type: DataType,
    #[serde(default)]
    pub values: Vec<EnumValue>,
}

impl Enum {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            description: None,
            data_type,
            values: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: EnumValue) -> Self {
        self.values.push(value);
        self
    }
}

/// A named struct type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Struct {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fabric_scoped: bool,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Struct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fabric_scoped: false,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }
}

/// Direction a command travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CommandDirection {
    #[default]
    ClientToServer,
    ServerToClient,
}

impl CommandDirection {
    /// Parses direction column text such as `client => server` or `S→C`.
    ///
    /// ```
    /// use matter_model_core::CommandDirection;
    ///
    /// assert_eq!(CommandDirection::parse("client => server"), Some(CommandDirection::ClientToServer));
    /// assert_eq!(CommandDirection::parse("S→C"), Some(CommandDirection::ServerToClient));
    /// assert_eq!(CommandDirection::parse("sideways"), None);
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        let normalized: String = text
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "clientserver" | "cs" => Some(Self::ClientToServer),
            "serverclient" | "sc" => Some(Self::ServerToClient),
            _ => None,
        }
    }
}

/// A cluster command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(default, with = "numeric_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub direction: CommandDirection,
    /// Name of the response command, or `Y`/`N` for status responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Access::is_empty")]
    pub access: Access,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conformance: Option<Conformance>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Command {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            description: None,
            direction: CommandDirection::default(),
            response: None,
            access: Access::default(),
            conformance: None,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }
}

/// Event priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EventPriority {
    Debug,
    #[default]
    Info,
    Critical,
}

impl EventPriority {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// A cluster event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, with = "numeric_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: EventPriority,
    #[serde(default, skip_serializing_if = "Access::is_empty")]
    pub access: Access,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conformance: Option<Conformance>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Event {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            description: None,
            priority: EventPriority::default(),
            access: Access::default(),
            conformance: None,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }
}

/// One row of a cluster's revision history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub number: u32,
    pub description: String,
}

/// A Matter cluster.
///
/// # Examples
///
/// ```
/// use matter_model_core::*;
///
/// let mut cluster = Cluster::new("Level Control").with_id(0x0008);
/// cluster.attributes.push(Field::new("CurrentLevel").with_id(0));
/// cluster.commands.push(Command::new(0, "MoveToLevel"));
///
/// assert_eq!(cluster.find_attribute("CurrentLevel").unwrap().id, Some(0));
/// assert!(cluster.find_command("MoveToLevel").is_some());
///
/// let json = serde_json::to_string(&cluster).unwrap();
/// let back: Cluster = serde_json::from_str(&json).unwrap();
/// assert_eq!(back, cluster);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    #[serde(default, with = "numeric_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revisions: Vec<Revision>,
    /// Name of the cluster this one derives from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pics: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Bitmap>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bitmaps: Vec<Bitmap>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<Enum>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structs: Vec<Struct>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Command>,
}

impl Cluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            revisions: Vec::new(),
            base_cluster: None,
            hierarchy: None,
            role: None,
            scope: None,
            pics: None,
            features: None,
            bitmaps: Vec::new(),
            enums: Vec::new(),
            structs: Vec::new(),
            attributes: Vec::new(),
            events: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base_cluster = Some(base.into());
        self
    }

    pub fn find_attribute(&self, name: &str) -> Option<&Field> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn find_command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }

    pub fn find_event(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.name == name)
    }

    /// Feature codes (falling back to names) in bit order.
    pub fn feature_codes(&self) -> Vec<&str> {
        self.features
            .iter()
            .flat_map(|f| &f.bits)
            .map(|b| b.code.as_deref().unwrap_or(&b.name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_conformance, parse_constraint};

    #[test]
    fn test_bit_mask_ranges() {
        assert_eq!(Bit::new("0", "A").mask(), Ok(1));
        assert_eq!(Bit::new("63", "A").mask(), Ok(1 << 63));
        assert_eq!(Bit::new("0..63", "A").mask(), Ok(u64::MAX));
        assert_eq!(Bit::new("4..7", "A").mask(), Ok(0xF0));
    }

    #[test]
    fn test_bit_mask_errors() {
        assert_eq!(Bit::new("x", "A").mask(), Err(BitMaskError::Invalid("x".into())));
        assert_eq!(Bit::new("70", "A").mask(), Err(BitMaskError::OutOfRange(70)));
        assert_eq!(
            Bit::new("5..2", "A").mask(),
            Err(BitMaskError::Reversed { from: 5, to: 2 })
        );
    }

    #[test]
    fn test_access_parse_forms() {
        let rw = Access::parse("R[W] VO");
        assert_eq!(rw.read, Some(Privilege::View));
        assert_eq!(rw.write, Some(Privilege::Operate));
        assert!(rw.optional_write);
        assert_eq!(rw.to_string(), "R[W] VO");

        let same = Access::parse("RW V");
        assert_eq!(same.write, Some(Privilege::View));
        assert_eq!(same.to_string(), "RW V");

        assert_eq!(Access::parse("R V F S").to_string(), "R V F S");
        assert!(Access::parse("").is_empty());
    }

    #[test]
    fn test_quality_ignores_unknown_letters() {
        let q = Quality::parse("x, p, z");
        assert!(q.nullable);
        assert!(q.reportable);
        assert!(!q.fixed);
    }

    #[test]
    fn test_field_json_uses_text_columns() {
        let field = Field::new("Level")
            .with_id(2)
            .with_constraint(parse_constraint("max 254"))
            .with_conformance(parse_conformance("LT"))
            .with_quality(Quality::parse("X"));
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["constraint"], "max 254");
        assert_eq!(json["conformance"], "LT");
        assert_eq!(json["quality"], "X");
        assert!(json.get("access").is_none());
    }

    #[test]
    fn test_ids_accept_hex_strings() {
        let cluster: Cluster =
            serde_json::from_str(r#"{"id":"0x0300","name":"Color Control","commands":[{"id":"0x4B","name":"MoveColorTemperature"}]}"#)
                .unwrap();
        assert_eq!(cluster.id, Some(0x0300));
        assert_eq!(cluster.commands[0].id, Some(0x4B));

        let bad = serde_json::from_str::<Cluster>(r#"{"id":"zz","name":"X"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_field_default_value() {
        assert_eq!(Field::new("A").with_default("0xFF").default_value(), Some(255));
        assert_eq!(Field::new("A").with_default("null").default_value(), None);
    }

    #[test]
    fn test_event_priority_and_direction() {
        assert_eq!(EventPriority::parse("CRITICAL"), Some(EventPriority::Critical));
        assert_eq!(EventPriority::parse("urgent"), None);
        assert_eq!(CommandDirection::parse("server -> client"), Some(CommandDirection::ServerToClient));
    }

    #[test]
    fn test_feature_codes() {
        let mut cluster = Cluster::new("On/Off");
        cluster.features = Some(
            Bitmap::new("Feature", DataType::new("map32"))
                .with_bit(Bit::new("0", "Lighting").with_code("LT"))
                .with_bit(Bit::new("1", "DeadFront")),
        );
        assert_eq!(cluster.feature_codes(), vec!["LT", "DeadFront"]);
    }
}
