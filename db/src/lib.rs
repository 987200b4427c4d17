//! Loading, configuration and resolution of Matter cluster model packages.
//!
//! This crate reads cluster models from JSON or YAML files, gathers them into
//! a [`ModelPackage`](matter_model_core::ModelPackage), and resolves derived
//! clusters against their bases under a [`ModelConfig`].
//!
//! # Quick start
//!
//! ```no_run
//! use matter_model_db::{ModelConfig, ModelStore};
//!
//! // Load clusters from a directory
//! let mut store = ModelStore::from_dir("model/clusters/").unwrap();
//! if let Some(cluster) = store.get("On/Off") {
//!     println!("On/Off has {} commands", cluster.commands.len());
//! }
//!
//! // Use the builder for fallback chains
//! let mut store = ModelStore::builder()
//!     .from_dir("model/clusters/")
//!     .from_file("model/package.json")
//!     .build()
//!     .unwrap();
//!
//! // Inherit derived clusters and collect diagnostics
//! let config = ModelConfig::load("matter-model.yml").unwrap();
//! for diagnostic in store.resolve(&config).unwrap() {
//!     eprintln!("{diagnostic}");
//! }
//! ```

mod config;
mod error;
mod loader;

pub use config::ModelConfig;
pub use error::{ModelError, Result};
pub use loader::{ModelStore, StoreBuilder, StoreSource, UNVERSIONED};
