//! Name resolution over an entity's direct children.
//!
//! Resolution is shallow and case-sensitive: an entity only answers for the
//! names of the entities it owns. A miss is `None`, never an error.
//!
//! # Examples
//!
//! ```
//! use matter_model_core::*;
//!
//! let mut cluster = Cluster::new("On/Off");
//! cluster.features = Some(
//!     Bitmap::new("Feature", DataType::new("map32"))
//!         .with_bit(Bit::new("0", "Lighting").with_code("LT")),
//! );
//! cluster.attributes.push(Field::new("OnOff").with_id(0));
//!
//! assert!(matches!(reference(&cluster, "LT"), Some(EntityRef::Bit(_))));
//! assert!(matches!(reference(&cluster, "OnOff"), Some(EntityRef::Field(_))));
//! assert!(reference(&cluster, "onoff").is_none());
//! ```

use crate::{Bit, Bitmap, Cluster, Command, Enum, EnumValue, Event, Field, Struct};

/// A borrowed view of any resolvable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef<'a> {
    Bit(&'a Bit),
    Field(&'a Field),
    Command(&'a Command),
    Event(&'a Event),
    Enum(&'a Enum),
    EnumValue(&'a EnumValue),
    Bitmap(&'a Bitmap),
    Struct(&'a Struct),
}

impl<'a> EntityRef<'a> {
    pub fn name(&self) -> &'a str {
        match *self {
            Self::Bit(b) => &b.name,
            Self::Field(f) => &f.name,
            Self::Command(c) => &c.name,
            Self::Event(e) => &e.name,
            Self::Enum(e) => &e.name,
            Self::EnumValue(v) => &v.name,
            Self::Bitmap(b) => &b.name,
            Self::Struct(s) => &s.name,
        }
    }

    /// Short label for the entity kind, used in diagnostics and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bit(_) => "bit",
            Self::Field(_) => "field",
            Self::Command(_) => "command",
            Self::Event(_) => "event",
            Self::Enum(_) => "enum",
            Self::EnumValue(_) => "enum value",
            Self::Bitmap(_) => "bitmap",
            Self::Struct(_) => "struct",
        }
    }
}

/// Entities that own named children.
pub trait Reference {
    fn reference(&self, name: &str) -> Option<EntityRef<'_>>;
}

/// Resolves `name` among the direct children of `entity`.
pub fn reference<'a, R: Reference + ?Sized>(entity: &'a R, name: &str) -> Option<EntityRef<'a>> {
    entity.reference(name)
}

impl Reference for [Field] {
    fn reference(&self, name: &str) -> Option<EntityRef<'_>> {
        self.iter().find(|f| f.name == name).map(EntityRef::Field)
    }
}

impl Reference for Bitmap {
    /// Matches a bit by name or by code.
    fn reference(&self, name: &str) -> Option<EntityRef<'_>> {
        self.find_bit(name).map(EntityRef::Bit)
    }
}

impl Reference for Enum {
    fn reference(&self, name: &str) -> Option<EntityRef<'_>> {
        self.values
            .iter()
            .find(|v| v.name == name)
            .map(EntityRef::EnumValue)
    }
}

impl Reference for Struct {
    fn reference(&self, name: &str) -> Option<EntityRef<'_>> {
        self.fields.reference(name)
    }
}

impl Reference for Command {
    fn reference(&self, name: &str) -> Option<EntityRef<'_>> {
        self.fields.reference(name)
    }
}

impl Reference for Event {
    fn reference(&self, name: &str) -> Option<EntityRef<'_>> {
        self.fields.reference(name)
    }
}

impl Reference for Cluster {
    /// Searches feature bits, attributes, commands, events, enums, bitmaps
    /// and structs, in that order.
    fn reference(&self, name: &str) -> Option<EntityRef<'_>> {
        if let Some(found) = self.features.as_ref().and_then(|f| f.reference(name)) {
            return Some(found);
        }
        if let Some(found) = self.attributes.reference(name) {
            return Some(found);
        }
        self.commands
            .iter()
            .find(|c| c.name == name)
            .map(EntityRef::Command)
            .or_else(|| self.events.iter().find(|e| e.name == name).map(EntityRef::Event))
            .or_else(|| self.enums.iter().find(|e| e.name == name).map(EntityRef::Enum))
            .or_else(|| self.bitmaps.iter().find(|b| b.name == name).map(EntityRef::Bitmap))
            .or_else(|| self.structs.iter().find(|s| s.name == name).map(EntityRef::Struct))
    }
}
