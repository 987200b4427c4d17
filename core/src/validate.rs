//! Cluster and package validation.
//!
//! Validation never fails; it collects [`Diagnostic`]s describing structural
//! problems in a cluster or package so callers can decide how strict to be.
//!
//! # Examples
//!
//! ```
//! use matter_model_core::*;
//!
//! let mut cluster = Cluster::new("On/Off").with_id(0x0006);
//! cluster.attributes.push(Field::new("OnOff").with_id(0));
//! assert!(validate_cluster(&cluster).is_empty());
//!
//! cluster.attributes.push(Field::new("GlobalSceneControl").with_id(0));
//! let diagnostics = validate_cluster(&cluster);
//! assert!(matches!(diagnostics[0], Diagnostic::DuplicateFieldId { id: 0, .. }));
//! ```

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::constraint::Bound;
use crate::{
    BitMaskError, Bitmap, Cluster, CommandDirection, Conformance, Field, ModelPackage, Reference,
};

/// A structural problem found in the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    /// Package version string is empty.
    #[error("package version cannot be empty")]
    EmptyPackageVersion,
    /// Two fields in one field set share an ID.
    #[error("duplicate field id {id:#06x} in {scope}: {name}")]
    DuplicateFieldId { scope: String, id: u64, name: String },
    /// Two commands with the same direction share an ID.
    #[error("duplicate command id {id:#06x} in {cluster}: {name}")]
    DuplicateCommandId { cluster: String, id: u64, name: String },
    #[error("duplicate event id {id:#06x} in {cluster}: {name}")]
    DuplicateEventId { cluster: String, id: u64, name: String },
    /// A bit position does not describe a valid mask.
    #[error("invalid bit {name} in {bitmap}: {error}")]
    InvalidBitMask {
        bitmap: String,
        name: String,
        error: BitMaskError,
    },
    /// A conformance identifier names nothing in scope.
    #[error("unresolved identifier {identifier} in conformance of {entity}")]
    UnresolvedIdentifier { entity: String, identifier: String },
    /// Field constraints reference each other in a loop.
    #[error("constraint reference cycle in {scope}: {}", path.join(" -> "))]
    ConstraintCycle { scope: String, path: Vec<String> },
    /// Two clusters in one package share a name.
    #[error("duplicate cluster in package: {0}")]
    DuplicateCluster(String),
    /// A cluster names a base cluster the package does not contain.
    #[error("unknown base cluster {base} for {cluster}")]
    UnknownBaseCluster { cluster: String, base: String },
    /// Clusters derive from each other in a loop.
    #[error("cluster hierarchy cycle at {0}")]
    HierarchyCycle(String),
}

/// Validates a full model package.
///
/// Checks the version, duplicate cluster names, base cluster references and
/// hierarchy cycles, then validates each cluster.
///
/// # Examples
///
/// ```
/// use matter_model_core::*;
///
/// let mut package = ModelPackage::new("1.3");
/// package.clusters.push(Cluster::new("Mode Base"));
/// package.clusters.push(Cluster::new("Dishwasher Mode").with_base("Mode Base"));
/// assert!(validate_package(&package).is_empty());
///
/// package.clusters.push(Cluster::new("Oven Mode").with_base("Missing"));
/// let diagnostics = validate_package(&package);
/// assert!(matches!(diagnostics[0], Diagnostic::UnknownBaseCluster { .. }));
/// ```
pub fn validate_package(package: &ModelPackage) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if package.version.trim().is_empty() {
        diagnostics.push(Diagnostic::EmptyPackageVersion);
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for cluster in &package.clusters {
        if !seen.insert(cluster.name.as_str()) {
            diagnostics.push(Diagnostic::DuplicateCluster(cluster.name.clone()));
        }
    }

    for cluster in &package.clusters {
        if let Some(base) = &cluster.base_cluster {
            if !seen.contains(base.as_str()) {
                diagnostics.push(Diagnostic::UnknownBaseCluster {
                    cluster: cluster.name.clone(),
                    base: base.clone(),
                });
            }
        }
    }

    diagnostics.extend(
        package
            .hierarchy_cycles()
            .into_iter()
            .map(Diagnostic::HierarchyCycle),
    );

    for cluster in &package.clusters {
        diagnostics.extend(validate_cluster(cluster));
    }
    diagnostics
}

/// Validates one cluster.
///
/// Reports duplicate field, command and event IDs, invalid bit masks,
/// conformance identifiers that resolve to nothing, and constraint
/// reference cycles.
pub fn validate_cluster(cluster: &Cluster) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let name = cluster.name.as_str();

    check_fields(&format!("{name} attributes"), &cluster.attributes, &mut diagnostics);
    for s in &cluster.structs {
        check_fields(&format!("{name} struct {}", s.name), &s.fields, &mut diagnostics);
    }
    for c in &cluster.commands {
        check_fields(&format!("{name} command {}", c.name), &c.fields, &mut diagnostics);
    }
    for e in &cluster.events {
        check_fields(&format!("{name} event {}", e.name), &e.fields, &mut diagnostics);
    }

    let mut commands: HashSet<(u64, CommandDirection)> = HashSet::new();
    for command in &cluster.commands {
        if let Some(id) = command.id {
            if !commands.insert((id, command.direction)) {
                diagnostics.push(Diagnostic::DuplicateCommandId {
                    cluster: name.to_string(),
                    id,
                    name: command.name.clone(),
                });
            }
        }
    }

    let mut events: HashSet<u64> = HashSet::new();
    for event in &cluster.events {
        if let Some(id) = event.id {
            if !events.insert(id) {
                diagnostics.push(Diagnostic::DuplicateEventId {
                    cluster: name.to_string(),
                    id,
                    name: event.name.clone(),
                });
            }
        }
    }

    for bitmap in cluster.features.iter().chain(&cluster.bitmaps) {
        check_bits(bitmap, &mut diagnostics);
    }

    check_conformances(cluster, &mut diagnostics);
    diagnostics
}

fn check_fields(scope: &str, fields: &[Field], diagnostics: &mut Vec<Diagnostic>) {
    let mut seen = HashSet::new();
    for field in fields {
        if let Some(id) = field.id {
            if !seen.insert(id) {
                diagnostics.push(Diagnostic::DuplicateFieldId {
                    scope: scope.to_string(),
                    id,
                    name: field.name.clone(),
                });
            }
        }
    }
    for path in constraint_cycles(fields) {
        diagnostics.push(Diagnostic::ConstraintCycle {
            scope: scope.to_string(),
            path,
        });
    }
}

fn check_bits(bitmap: &Bitmap, diagnostics: &mut Vec<Diagnostic>) {
    for bit in &bitmap.bits {
        if let Err(error) = bit.mask() {
            diagnostics.push(Diagnostic::InvalidBitMask {
                bitmap: bitmap.name.clone(),
                name: bit.name.clone(),
                error,
            });
        }
    }
}

/// Checks that every identifier used in a conformance resolves against the
/// cluster, or against the fields of the entity that owns the conformance.
fn check_conformances(cluster: &Cluster, diagnostics: &mut Vec<Diagnostic>) {
    let mut check = |entity: String, conformance: Option<&Conformance>, siblings: &[Field]| {
        let Some(conformance) = conformance else {
            return;
        };
        for identifier in conformance.identifiers() {
            if cluster.reference(identifier).is_none() && siblings.reference(identifier).is_none() {
                diagnostics.push(Diagnostic::UnresolvedIdentifier {
                    entity: entity.clone(),
                    identifier: identifier.to_string(),
                });
            }
        }
    };

    for bitmap in cluster.features.iter().chain(&cluster.bitmaps) {
        for bit in &bitmap.bits {
            check(format!("{}.{}", bitmap.name, bit.name), bit.conformance.as_ref(), &[]);
        }
    }
    for e in &cluster.enums {
        for value in &e.values {
            check(format!("{}.{}", e.name, value.name), value.conformance.as_ref(), &[]);
        }
    }
    for attribute in &cluster.attributes {
        check(attribute.name.clone(), attribute.conformance.as_ref(), &[]);
    }
    for s in &cluster.structs {
        for field in &s.fields {
            check(format!("{}.{}", s.name, field.name), field.conformance.as_ref(), &s.fields);
        }
    }
    for c in &cluster.commands {
        check(c.name.clone(), c.conformance.as_ref(), &[]);
        for field in &c.fields {
            check(format!("{}.{}", c.name, field.name), field.conformance.as_ref(), &c.fields);
        }
    }
    for e in &cluster.events {
        check(e.name.clone(), e.conformance.as_ref(), &[]);
        for field in &e.fields {
            check(format!("{}.{}", e.name, field.name), field.conformance.as_ref(), &e.fields);
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Finds loops in field-to-field constraint references. Minimum and maximum
/// bounds are followed separately, so `MinLevel to MaxLevel` paired with
/// `MinLevel to 254` is not a loop. Each loop is returned as the path of
/// field names, ending where it started.
fn constraint_cycles(fields: &[Field]) -> Vec<Vec<String>> {
    let mut cycles: Vec<Vec<String>> = Vec::new();
    for bound in [Bound::Min, Bound::Max] {
        let graph: HashMap<&str, Vec<&str>> = fields
            .iter()
            .map(|f| {
                let refs = f
                    .constraint
                    .as_ref()
                    .map(|c| c.bound_references(bound))
                    .unwrap_or_default();
                (f.name.as_str(), refs)
            })
            .collect();

        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        let mut found = Vec::new();
        for field in fields {
            visit(&field.name, &graph, &mut marks, &mut stack, &mut found);
        }
        for path in found {
            if !cycles.contains(&path) {
                cycles.push(path);
            }
        }
    }
    cycles
}

fn visit<'a>(
    name: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
    cycles: &mut Vec<Vec<String>>,
) {
    match marks.get(name) {
        Some(Mark::Done) => return,
        Some(Mark::Visiting) => {
            let start = stack.iter().position(|n| *n == name).unwrap_or(0);
            let mut path: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
            path.push(name.to_string());
            cycles.push(path);
            return;
        }
        None => {}
    }
    let Some(edges) = graph.get(name) else {
        return;
    };

    marks.insert(name, Mark::Visiting);
    stack.push(name);
    for next in edges {
        visit(next, graph, marks, stack, cycles);
    }
    stack.pop();
    marks.insert(name, Mark::Done);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bit, Command, DataType, Event, parse_conformance, parse_constraint};

    #[test]
    fn test_command_ids_may_repeat_across_directions() {
        let mut cluster = Cluster::new("Groups");
        cluster.commands.push(Command::new(0, "AddGroup"));
        let mut response = Command::new(0, "AddGroupResponse");
        response.direction = CommandDirection::ServerToClient;
        cluster.commands.push(response);
        assert!(validate_cluster(&cluster).is_empty());

        cluster.commands.push(Command::new(0, "AddGroupAgain"));
        assert!(matches!(
            validate_cluster(&cluster)[..],
            [Diagnostic::DuplicateCommandId { id: 0, .. }]
        ));
    }

    #[test]
    fn test_duplicate_event_ids() {
        let mut cluster = Cluster::new("Switch");
        cluster.events.push(Event::new(1, "InitialPress"));
        cluster.events.push(Event::new(1, "LongPress"));
        assert!(matches!(
            validate_cluster(&cluster)[..],
            [Diagnostic::DuplicateEventId { id: 1, .. }]
        ));
    }

    #[test]
    fn test_invalid_feature_bits() {
        let mut cluster = Cluster::new("X");
        cluster.features = Some(Bitmap::new("Feature", DataType::new("map32")).with_bit(Bit::new("2..1", "Bad")));
        let diagnostics = validate_cluster(&cluster);
        assert!(matches!(diagnostics[0], Diagnostic::InvalidBitMask { .. }));
    }

    #[test]
    fn test_unresolved_conformance_identifiers() {
        let mut cluster = Cluster::new("On/Off");
        cluster.features = Some(
            Bitmap::new("Feature", DataType::new("map32")).with_bit(Bit::new("0", "Lighting").with_code("LT")),
        );
        cluster.attributes.push(Field::new("GlobalSceneControl").with_conformance(parse_conformance("LT")));
        cluster.attributes.push(Field::new("OnTime").with_conformance(parse_conformance("LT | XX")));
        let diagnostics = validate_cluster(&cluster);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::UnresolvedIdentifier {
                entity: "OnTime".into(),
                identifier: "XX".into()
            }]
        );
    }

    #[test]
    fn test_command_field_conformance_resolves_siblings() {
        let mut cluster = Cluster::new("Door Lock");
        cluster.commands.push(
            Command::new(0x1A, "SetCredential")
                .with_field(Field::new("CredentialType").with_id(0))
                .with_field(Field::new("UserIndex").with_id(1).with_conformance(parse_conformance("CredentialType"))),
        );
        assert!(validate_cluster(&cluster).is_empty());
    }

    #[test]
    fn test_constraint_cycles() {
        let mut cluster = Cluster::new("Level");
        cluster.attributes.push(Field::new("A").with_constraint(parse_constraint("B to 10")));
        cluster.attributes.push(Field::new("B").with_constraint(parse_constraint("max A")));
        cluster.attributes.push(Field::new("C").with_constraint(parse_constraint("max C")));
        cluster.attributes.push(Field::new("D").with_constraint(parse_constraint("max A")));
        let cycles: Vec<_> = validate_cluster(&cluster)
            .into_iter()
            .filter_map(|d| match d {
                Diagnostic::ConstraintCycle { path, .. } => Some(path),
                _ => None,
            })
            .collect();
        assert_eq!(cycles, vec![vec!["A", "B", "A"], vec!["C", "C"]]);
    }

    #[test]
    fn test_mutual_min_max_references_are_not_cycles() {
        let mut cluster = Cluster::new("Level Control");
        cluster.attributes.push(Field::new("MinLevel").with_constraint(parse_constraint("1 to MaxLevel")));
        cluster.attributes.push(Field::new("MaxLevel").with_constraint(parse_constraint("MinLevel to 254")));
        assert!(validate_cluster(&cluster).is_empty());
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::DuplicateFieldId {
            scope: "On/Off attributes".into(),
            id: 0x4000,
            name: "GlobalSceneControl".into(),
        };
        assert_eq!(d.to_string(), "duplicate field id 0x4000 in On/Off attributes: GlobalSceneControl");
    }
}
