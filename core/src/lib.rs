//! Semantic model of Matter clusters.
//!
//! This crate turns the constraint and conformance columns of the Matter
//! specification into typed expressions and ties them to an entity graph:
//!
//! - [`Cluster`]: a cluster with its features, bitmaps, enums, structs,
//!   attributes, commands and events.
//! - [`Constraint`]: value and length restrictions, parsed by
//!   [`parse_constraint`] and evaluated into [`Extreme`] bounds.
//! - [`Conformance`]: applicability rules, parsed by [`parse_conformance`]
//!   and evaluated against a [`ConformanceContext`].
//! - [`ModelPackage`]: a versioned set of clusters.
//!
//! Name lookups go through [`reference`]. Derived clusters are completed from
//! their base with [`Cluster::inherit`] (or [`ModelPackage::apply_inheritance`]
//! for a whole package), and [`validate_cluster`] / [`validate_package`]
//! report structural problems as [`Diagnostic`]s.
//!
//! # Example
//!
//! ```
//! use matter_model_core::*;
//!
//! let mut cluster = Cluster::new("Level Control").with_id(0x0008);
//! cluster.features = Some(
//!     Bitmap::new("Feature", DataType::new("map32"))
//!         .with_bit(Bit::new("1", "Lighting").with_code("LT")),
//! );
//! cluster.attributes.push(
//!     Field::new("MinLevel")
//!         .with_id(0x0002)
//!         .with_type(DataType::new("uint8"))
//!         .with_constraint(parse_constraint("1 to MaxLevel"))
//!         .with_conformance(parse_conformance("LT")),
//! );
//! cluster.attributes.push(
//!     Field::new("MaxLevel")
//!         .with_id(0x0003)
//!         .with_type(DataType::new("uint8"))
//!         .with_constraint(parse_constraint("MinLevel to 254")),
//! );
//! assert!(validate_cluster(&cluster).is_empty());
//!
//! let min_level = &cluster.attributes[0];
//! let cx = ConstraintContext::new(Some(min_level), &cluster.attributes);
//! let max = min_level.constraint.as_ref().unwrap().max(&cx);
//! assert_eq!(max.format_for(TargetSchema::DataModel, min_level.data_type.as_ref()), "254");
//!
//! let features = ConformanceContext::from_features(cluster.features.as_ref().unwrap(), &["LT"]);
//! assert_eq!(min_level.conformance.as_ref().unwrap().eval(&features), Ok(true));
//! ```

mod conformance;
mod constraint;
mod data_type;
mod extreme;
mod inherit;
mod package;
mod resolve;
mod types;
mod validate;

pub use conformance::{
    Choice, ChoiceLimit, Conformance, ConformanceContext, ConformanceState, ContextValue,
    EvalError, Expression, parse_conformance,
};
pub use constraint::{Constraint, ConstraintContext, Limit, parse_constraint};
pub use data_type::{BaseDataType, DataType};
pub use extreme::{Extreme, ExtremeValue, MathOperator, NumberFormat, TargetSchema};
pub use inherit::InheritError;
pub use package::ModelPackage;
pub use resolve::{EntityRef, Reference, reference};
pub use types::*;
pub use validate::{Diagnostic, validate_cluster, validate_package};
