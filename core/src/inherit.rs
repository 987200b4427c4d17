//! Merging a derived cluster with its base cluster.
//!
//! Derived clusters in the specification only list what they add or change.
//! [`Cluster::inherit`] completes them from the base cluster: entities the
//! derived cluster lacks are deep-cloned from the base, and entities present
//! on both sides have their empty properties filled from the base. Nothing
//! the derived cluster states is overwritten, so inheriting twice from the
//! same base is a no-op.
//!
//! # Example
//!
//! ```
//! use matter_model_core::*;
//!
//! let mut base = Cluster::new("Mode Base");
//! base.description = "Generic mode selection".into();
//! base.attributes.push(Field::new("SupportedModes").with_id(0).with_type(DataType::list("ModeOptionStruct")));
//! base.attributes.push(Field::new("CurrentMode").with_id(1).with_type(DataType::new("uint8")));
//!
//! let mut derived = Cluster::new("Laundry Washer Mode").with_base("Mode Base");
//! derived.attributes.push(Field::new("CurrentMode").with_id(1).with_default("0"));
//!
//! let diagnostics = derived.inherit(&base).unwrap();
//! assert!(diagnostics.is_empty());
//! assert_eq!(derived.description, "Generic mode selection");
//! assert_eq!(derived.attributes.len(), 2);
//! let current = derived.find_attribute("CurrentMode").unwrap();
//! assert_eq!(current.data_type, Some(DataType::new("uint8")));
//! assert_eq!(current.default.as_deref(), Some("0"));
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{
    Bit, BitMaskError, Bitmap, Cluster, Command, Diagnostic, Enum, EnumValue, Event, Field, Struct,
};

/// Errors that abort a merge.
///
/// When [`Cluster::inherit`] fails the derived cluster is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InheritError {
    /// More than one derived entity matches the same base entity.
    #[error("base {kind} {name} matches more than one entity in {cluster}")]
    Ambiguous {
        cluster: String,
        kind: &'static str,
        name: String,
    },
    /// A bit position could not be turned into a mask.
    #[error("cannot match bit {name} of {bitmap}: {source}")]
    BitMask {
        bitmap: String,
        name: String,
        #[source]
        source: BitMaskError,
    },
}

impl Cluster {
    /// Completes this cluster from `base`.
    ///
    /// Runs in a fixed order: features, description, attributes, bitmaps,
    /// enums, structs, events, commands. Features are cloned wholesale when
    /// this cluster declares none, otherwise bits are merged by mask.
    /// Attributes, events, commands and field sets match by ID, falling back
    /// to name when either side lacks an ID. Bitmaps, enums and structs match
    /// by name.
    ///
    /// Duplicate field IDs within one derived field set are reported as
    /// diagnostics and the colliding field takes no part in matching. An
    /// ambiguous match aborts the whole merge and leaves `self` unchanged.
    pub fn inherit(&mut self, base: &Cluster) -> Result<Vec<Diagnostic>, InheritError> {
        tracing::info!(base = %base.name, derived = %self.name, "inheriting cluster");

        let mut merged = self.clone();
        let mut diagnostics = Vec::new();
        let cluster = merged.name.clone();

        if let Some(base_features) = &base.features {
            if let Some(features) = merged.features.as_mut().filter(|f| !f.bits.is_empty()) {
                inherit_bitmap(&cluster, features, base_features)?;
            } else {
                merged.features = Some(base_features.clone());
            }
        }

        if merged.description.is_empty() {
            merged.description = base.description.clone();
        }

        let scope = format!("{cluster} attributes");
        diagnostics.extend(inherit_fields(&cluster, &scope, &mut merged.attributes, &base.attributes)?);

        for base_bitmap in &base.bitmaps {
            match find_unique(&cluster, "bitmap", &base_bitmap.name, &merged.bitmaps, |b| {
                b.name == base_bitmap.name
            })? {
                Some(i) => inherit_bitmap(&cluster, &mut merged.bitmaps[i], base_bitmap)?,
                None => {
                    tracing::debug!(cluster = %cluster, name = %base_bitmap.name, "cloning base bitmap");
                    merged.bitmaps.push(base_bitmap.clone());
                }
            }
        }

        for base_enum in &base.enums {
            match find_unique(&cluster, "enum", &base_enum.name, &merged.enums, |e| {
                e.name == base_enum.name
            })? {
                Some(i) => inherit_enum(&cluster, &mut merged.enums[i], base_enum)?,
                None => {
                    tracing::debug!(cluster = %cluster, name = %base_enum.name, "cloning base enum");
                    merged.enums.push(base_enum.clone());
                }
            }
        }

        for base_struct in &base.structs {
            match find_unique(&cluster, "struct", &base_struct.name, &merged.structs, |s| {
                s.name == base_struct.name
            })? {
                Some(i) => {
                    diagnostics.extend(inherit_struct(&cluster, &mut merged.structs[i], base_struct)?);
                }
                None => {
                    tracing::debug!(cluster = %cluster, name = %base_struct.name, "cloning base struct");
                    merged.structs.push(base_struct.clone());
                }
            }
        }

        for base_event in &base.events {
            match find_unique(&cluster, "event", &base_event.name, &merged.events, |e| {
                same_entity((e.id, e.name.as_str()), (base_event.id, base_event.name.as_str()))
            })? {
                Some(i) => {
                    diagnostics.extend(inherit_event(&cluster, &mut merged.events[i], base_event)?);
                }
                None => merged.events.push(base_event.clone()),
            }
        }

        for base_command in &base.commands {
            match find_unique(&cluster, "command", &base_command.name, &merged.commands, |c| {
                same_entity((c.id, c.name.as_str()), (base_command.id, base_command.name.as_str()))
            })? {
                Some(i) => {
                    diagnostics.extend(inherit_command(&cluster, &mut merged.commands[i], base_command)?);
                }
                None => merged.commands.push(base_command.clone()),
            }
        }

        *self = merged;
        Ok(diagnostics)
    }
}

/// IDs decide when both sides carry one; otherwise names must be equal.
fn same_entity(a: (Option<u64>, &str), b: (Option<u64>, &str)) -> bool {
    match (a.0, b.0) {
        (Some(x), Some(y)) => x == y,
        _ => a.1 == b.1,
    }
}

/// Index of the single candidate accepted by `matches`.
fn find_unique<T>(
    cluster: &str,
    kind: &'static str,
    name: &str,
    candidates: &[T],
    matches: impl Fn(&T) -> bool,
) -> Result<Option<usize>, InheritError> {
    let mut found = candidates.iter().enumerate().filter(|(_, c)| matches(c)).map(|(i, _)| i);
    let first = found.next();
    if first.is_some() && found.next().is_some() {
        return Err(InheritError::Ambiguous {
            cluster: cluster.to_string(),
            kind,
            name: name.to_string(),
        });
    }
    Ok(first)
}

fn fill<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if target.is_none() {
        target.clone_from(source);
    }
}

/// Field-set inheritance shared by attributes, struct fields, and command
/// and event fields.
fn inherit_fields(
    cluster: &str,
    scope: &str,
    derived: &mut Vec<Field>,
    base: &[Field],
) -> Result<Vec<Diagnostic>, InheritError> {
    let mut diagnostics = Vec::new();
    let mut seen = HashSet::new();
    let mut skipped = vec![false; derived.len()];
    for (i, field) in derived.iter().enumerate() {
        if let Some(id) = field.id {
            if !seen.insert(id) {
                tracing::warn!(scope, id, field = %field.name, "duplicate field id");
                diagnostics.push(Diagnostic::DuplicateFieldId {
                    scope: scope.to_string(),
                    id,
                    name: field.name.clone(),
                });
                skipped[i] = true;
            }
        }
    }

    let declared = derived.len();
    for base_field in base {
        let candidates: Vec<usize> = (0..declared)
            .filter(|&i| !skipped[i])
            .filter(|&i| match (derived[i].id, base_field.id) {
                (Some(a), Some(b)) => a == b,
                _ => derived[i].name == base_field.name,
            })
            .collect();
        match candidates.as_slice() {
            [] => derived.push(base_field.clone()),
            [i] => inherit_field(&mut derived[*i], base_field),
            _ => {
                return Err(InheritError::Ambiguous {
                    cluster: cluster.to_string(),
                    kind: "field",
                    name: base_field.name.clone(),
                });
            }
        }
    }
    Ok(diagnostics)
}

fn inherit_field(derived: &mut Field, base: &Field) {
    fill(&mut derived.id, &base.id);
    fill(&mut derived.data_type, &base.data_type);
    fill(&mut derived.constraint, &base.constraint);
    fill(&mut derived.default, &base.default);
    fill(&mut derived.conformance, &base.conformance);
    if derived.quality.is_empty() {
        derived.quality = base.quality;
    }
    if derived.access.is_empty() {
        derived.access = base.access;
    }
}

fn inherit_bitmap(cluster: &str, derived: &mut Bitmap, base: &Bitmap) -> Result<(), InheritError> {
    fill(&mut derived.description, &base.description);

    let mask_of = |bitmap: &Bitmap, bit: &Bit| {
        bit.mask().map_err(|source| InheritError::BitMask {
            bitmap: bitmap.name.clone(),
            name: bit.name.clone(),
            source,
        })
    };
    let masks = derived
        .bits
        .iter()
        .map(|bit| mask_of(derived, bit))
        .collect::<Result<Vec<_>, _>>()?;

    for base_bit in &base.bits {
        let mask = mask_of(base, base_bit)?;
        match find_unique(cluster, "bit", &base_bit.name, &masks, |m| *m == mask)? {
            Some(i) => {
                let bit = &mut derived.bits[i];
                fill(&mut bit.code, &base_bit.code);
                fill(&mut bit.summary, &base_bit.summary);
                fill(&mut bit.conformance, &base_bit.conformance);
            }
            None => derived.bits.push(base_bit.clone()),
        }
    }
    Ok(())
}

fn inherit_enum(cluster: &str, derived: &mut Enum, base: &Enum) -> Result<(), InheritError> {
    fill(&mut derived.description, &base.description);

    let declared = derived.values.len();
    for base_value in &base.values {
        let matched = find_unique(cluster, "enum value", &base_value.name, &derived.values[..declared], |v: &EnumValue| {
            match (v.value, base_value.value) {
                (Some(a), Some(b)) => a == b,
                _ => v.name == base_value.name,
            }
        })?;
        match matched {
            Some(i) => {
                let value = &mut derived.values[i];
                fill(&mut value.value, &base_value.value);
                fill(&mut value.summary, &base_value.summary);
                fill(&mut value.conformance, &base_value.conformance);
            }
            None => derived.values.push(base_value.clone()),
        }
    }
    Ok(())
}

fn inherit_struct(cluster: &str, derived: &mut Struct, base: &Struct) -> Result<Vec<Diagnostic>, InheritError> {
    fill(&mut derived.description, &base.description);
    derived.fabric_scoped |= base.fabric_scoped;
    let scope = format!("{cluster} struct {}", derived.name);
    inherit_fields(cluster, &scope, &mut derived.fields, &base.fields)
}

fn inherit_event(cluster: &str, derived: &mut Event, base: &Event) -> Result<Vec<Diagnostic>, InheritError> {
    fill(&mut derived.description, &base.description);
    fill(&mut derived.conformance, &base.conformance);
    if derived.access.is_empty() {
        derived.access = base.access;
    }
    let scope = format!("{cluster} event {}", derived.name);
    inherit_fields(cluster, &scope, &mut derived.fields, &base.fields)
}

fn inherit_command(
    cluster: &str,
    derived: &mut Command,
    base: &Command,
) -> Result<Vec<Diagnostic>, InheritError> {
    fill(&mut derived.description, &base.description);
    fill(&mut derived.response, &base.response);
    fill(&mut derived.conformance, &base.conformance);
    if derived.access.is_empty() {
        derived.access = base.access;
    }
    let scope = format!("{cluster} command {}", derived.name);
    inherit_fields(cluster, &scope, &mut derived.fields, &base.fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DataType, parse_conformance};

    fn features(bits: &[(&str, &str, &str)]) -> Bitmap {
        bits.iter().fold(Bitmap::new("Feature", DataType::new("map32")), |bm, (bit, name, code)| {
            bm.with_bit(Bit::new(*bit, *name).with_code(*code))
        })
    }

    #[test]
    fn test_features_cloned_when_derived_has_none() {
        let mut base = Cluster::new("Base");
        base.features = Some(features(&[("0", "Lighting", "LT"), ("1", "DeadFront", "DF")]));
        let mut derived = Cluster::new("Derived");
        derived.features = Some(Bitmap::new("Feature", DataType::new("map32")));

        derived.inherit(&base).unwrap();
        assert_eq!(derived.features, base.features);
    }

    #[test]
    fn test_features_merged_by_mask() {
        let mut base = Cluster::new("Base");
        base.features = Some(features(&[("0", "Lighting", "LT"), ("1", "DeadFront", "DF")]));
        let mut derived = Cluster::new("Derived");
        derived.features = Some(Bitmap::new("Feature", DataType::new("map32")).with_bit(Bit::new("0", "Light")));

        derived.inherit(&base).unwrap();
        let bits = &derived.features.as_ref().unwrap().bits;
        assert_eq!(bits.len(), 2);
        assert_eq!(bits[0].name, "Light");
        assert_eq!(bits[0].code.as_deref(), Some("LT"));
        assert_eq!(bits[1].name, "DeadFront");
    }

    #[test]
    fn test_ambiguous_bit_aborts_without_change() {
        let mut base = Cluster::new("Base");
        base.features = Some(features(&[("0", "Lighting", "LT")]));
        let mut derived = Cluster::new("Derived");
        derived.features = Some(
            Bitmap::new("Feature", DataType::new("map32"))
                .with_bit(Bit::new("0", "A"))
                .with_bit(Bit::new("0", "B")),
        );
        derived.description = String::new();
        base.description = "base".into();
        let before = derived.clone();

        let err = derived.inherit(&base).unwrap_err();
        assert!(matches!(err, InheritError::Ambiguous { kind: "bit", .. }));
        assert_eq!(derived, before);
    }

    #[test]
    fn test_invalid_bit_mask_is_an_error() {
        let mut base = Cluster::new("Base");
        base.features = Some(features(&[("99", "Bad", "BD")]));
        let mut derived = Cluster::new("Derived");
        derived.features = Some(features(&[("0", "Lighting", "LT")]));
        assert!(matches!(derived.inherit(&base), Err(InheritError::BitMask { .. })));
    }

    #[test]
    fn test_attribute_match_falls_back_to_name() {
        let mut base = Cluster::new("Base");
        base.attributes.push(Field::new("Mode").with_id(3).with_type(DataType::new("uint8")));
        let mut derived = Cluster::new("Derived");
        derived.attributes.push(Field::new("Mode").with_conformance(parse_conformance("O")));

        derived.inherit(&base).unwrap();
        assert_eq!(derived.attributes.len(), 1);
        assert_eq!(derived.attributes[0].id, Some(3));
        assert_eq!(derived.attributes[0].data_type, Some(DataType::new("uint8")));
    }

    #[test]
    fn test_attribute_ids_take_precedence_over_names() {
        let mut base = Cluster::new("Base");
        base.attributes.push(Field::new("Mode").with_id(3));
        let mut derived = Cluster::new("Derived");
        derived.attributes.push(Field::new("Mode").with_id(4));

        derived.inherit(&base).unwrap();
        assert_eq!(derived.attributes.len(), 2);
    }

    #[test]
    fn test_duplicate_field_id_is_reported_and_skipped() {
        let mut base = Cluster::new("Base");
        base.attributes.push(Field::new("A").with_id(1).with_type(DataType::new("uint8")));
        base.attributes.push(Field::new("B").with_id(2).with_type(DataType::new("uint16")));
        let mut derived = Cluster::new("Derived");
        derived.attributes.push(Field::new("A").with_id(1));
        derived.attributes.push(Field::new("A2").with_id(1));
        derived.attributes.push(Field::new("B").with_id(2));

        let diagnostics = derived.inherit(&base).unwrap();
        assert_eq!(
            diagnostics,
            vec![Diagnostic::DuplicateFieldId {
                scope: "Derived attributes".into(),
                id: 1,
                name: "A2".into()
            }]
        );
        assert_eq!(derived.attributes.len(), 3);
        assert_eq!(derived.attributes[0].data_type, Some(DataType::new("uint8")));
        assert_eq!(derived.attributes[1].data_type, None);
        assert_eq!(derived.attributes[2].data_type, Some(DataType::new("uint16")));
    }

    #[test]
    fn test_commands_match_by_id_then_name() {
        let mut base = Cluster::new("Base");
        base.commands.push(
            Command::new(0, "ChangeToMode").with_field(Field::new("NewMode").with_id(0).with_type(DataType::new("uint8"))),
        );
        let mut unnamed = Command::new(1, "Other").with_field(Field::new("Arg").with_id(0));
        unnamed.id = None;
        base.commands.push(unnamed);

        let mut derived = Cluster::new("Derived");
        derived.commands.push(Command::new(7, "ChangeToMode"));
        let mut no_id = Command::new(0, "Other");
        no_id.id = None;
        derived.commands.push(no_id);

        derived.inherit(&base).unwrap();
        assert_eq!(derived.commands.len(), 3);
        assert!(derived.commands[0].fields.is_empty());
        assert_eq!(derived.commands[1].fields[0].name, "Arg");
        assert_eq!(derived.commands[2].fields[0].name, "NewMode");
    }

    #[test]
    fn test_inherit_is_idempotent() {
        let mut base = Cluster::new("Base");
        base.description = "desc".into();
        base.features = Some(features(&[("0", "Lighting", "LT")]));
        base.attributes.push(Field::new("A").with_id(0).with_type(DataType::new("uint8")));
        base.enums.push(Enum::new("Mode", DataType::new("enum8")).with_value(EnumValue::new(0, "Off")));
        base.structs.push(Struct::new("S").with_field(Field::new("F").with_id(0)));
        base.events.push(Event::new(0, "Changed"));
        base.commands.push(Command::new(0, "Go"));
        let mut untracked = Command::new(0, "NoId");
        untracked.id = None;
        base.commands.push(untracked);
        let mut untracked = Event::new(0, "NoIdEvent");
        untracked.id = None;
        base.events.push(untracked);

        let mut derived = Cluster::new("Derived");
        derived.enums.push(Enum::new("Mode", DataType::new("enum8")).with_value(EnumValue::new(1, "On")));
        derived.inherit(&base).unwrap();
        let once = derived.clone();
        derived.inherit(&base).unwrap();
        assert_eq!(derived, once);
        assert_eq!(derived.enums[0].values.len(), 2);
        assert_eq!(derived.commands.len(), 2);
        assert_eq!(derived.events.len(), 2);
    }
}
