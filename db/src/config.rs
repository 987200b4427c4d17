//! Resolution configuration for model packages.
//!
//! Controls which clusters take part in a resolution run, overrides the base
//! cluster of derived clusters, and selects the schema bounds are rendered
//! for.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! target_schema: data-model
//! hierarchy:
//!   Refrigerator Mode: Mode Base
//! exclude:
//!   - Scenes Management
//! strict: true
//! ```

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use matter_model_core::{ModelPackage, TargetSchema};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level resolution configuration.
///
/// Loaded from a YAML file (typically `matter-model.yml` next to the model
/// sources).
///
/// # Examples
///
/// ```no_run
/// use matter_model_db::ModelConfig;
///
/// let config = ModelConfig::load("matter-model.yml").unwrap();
/// if config.is_excluded("Scenes Management") {
///     println!("scenes are skipped");
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Configuration format version (e.g., `"1.0"`).
    pub version: String,
    /// Schema used when rendering constraint bounds.
    #[serde(default)]
    pub target_schema: TargetSchema,
    /// Base cluster overrides, keyed by derived cluster name.
    #[serde(default)]
    pub hierarchy: BTreeMap<String, String>,
    /// Clusters dropped before resolution.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Treat any diagnostic as a failure.
    #[serde(default)]
    pub strict: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            target_schema: TargetSchema::default(),
            hierarchy: BTreeMap::new(),
            exclude: Vec::new(),
            strict: false,
        }
    }
}

impl ModelConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::ModelError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::ModelError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::ModelError::IoError) if the file cannot
    /// be written, or [`YamlError`](crate::ModelError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Returns `true` if `cluster` is in the exclusion list.
    pub fn is_excluded(&self, cluster: &str) -> bool {
        self.exclude.iter().any(|c| c == cluster)
    }

    /// Returns the configured base for `cluster`, if overridden.
    pub fn base_override(&self, cluster: &str) -> Option<&str> {
        self.hierarchy.get(cluster).map(String::as_str)
    }

    /// Drops excluded clusters and applies base cluster overrides.
    ///
    /// # Examples
    ///
    /// ```
    /// use matter_model_core::{Cluster, ModelPackage};
    /// # let yaml = r#"
    /// # version: "1.0"
    /// # hierarchy: { "Oven Mode": "Mode Base" }
    /// # exclude: [Scenes]
    /// # "#;
    /// # let config: matter_model_db::ModelConfig = serde_yaml::from_str(yaml).unwrap();
    /// let mut package = ModelPackage::new("1.3");
    /// package.clusters.push(Cluster::new("Scenes"));
    /// package.clusters.push(Cluster::new("Oven Mode"));
    ///
    /// config.apply_to(&mut package);
    /// assert_eq!(package.cluster_count(), 1);
    /// assert_eq!(package.clusters[0].base_cluster.as_deref(), Some("Mode Base"));
    /// ```
    pub fn apply_to(&self, package: &mut ModelPackage) {
        let before = package.clusters.len();
        package.clusters.retain(|c| !self.is_excluded(&c.name));
        if package.clusters.len() != before {
            tracing::debug!(
                excluded = before - package.clusters.len(),
                "dropped excluded clusters"
            );
        }

        for cluster in &mut package.clusters {
            if let Some(base) = self.base_override(&cluster.name) {
                cluster.base_cluster = Some(base.to_string());
            }
        }
        for derived in self.hierarchy.keys() {
            if package.find_cluster(derived).is_none() {
                tracing::warn!(cluster = %derived, "hierarchy override names an unknown cluster");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matter_model_core::Cluster;

    fn sample_yaml() -> &'static str {
        r#"
version: "1.0"
target_schema: data-model
hierarchy:
  Refrigerator Mode: Mode Base
  Oven Mode: Mode Base
exclude:
  - Scenes Management
strict: true
"#
    }

    fn minimal_yaml() -> &'static str {
        r#"
version: "1.0"
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: ModelConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.target_schema, TargetSchema::DataModel);
        assert_eq!(config.hierarchy.len(), 2);
        assert_eq!(config.exclude, vec!["Scenes Management"]);
        assert!(config.strict);
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: ModelConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        assert_eq!(config.target_schema, TargetSchema::Legacy);
        assert!(config.hierarchy.is_empty());
        assert!(config.exclude.is_empty());
        assert!(!config.strict);
    }

    #[test]
    fn test_is_excluded() {
        let config: ModelConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert!(config.is_excluded("Scenes Management"));
        assert!(!config.is_excluded("On/Off"));
    }

    #[test]
    fn test_base_override() {
        let config: ModelConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.base_override("Oven Mode"), Some("Mode Base"));
        assert_eq!(config.base_override("Mode Base"), None);
    }

    #[test]
    fn test_apply_to_replaces_declared_base() {
        let config: ModelConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let mut package = ModelPackage::new("1.3");
        package
            .clusters
            .push(Cluster::new("Refrigerator Mode").with_base("Something Else"));
        package.clusters.push(Cluster::new("Scenes Management"));
        package.clusters.push(Cluster::new("Mode Base"));
        package
            .clusters
            .push(Cluster::new("Dishwasher Mode").with_base("Mode Base"));

        config.apply_to(&mut package);
        assert_eq!(package.cluster_count(), 3);
        assert!(package.find_cluster("Scenes Management").is_none());
        assert_eq!(package.find_cluster("Mode Base").unwrap().base_cluster, None);
        assert_eq!(
            package
                .find_cluster("Dishwasher Mode")
                .unwrap()
                .base_cluster
                .as_deref(),
            Some("Mode Base")
        );
        assert_eq!(
            package
                .find_cluster("Refrigerator Mode")
                .unwrap()
                .base_cluster
                .as_deref(),
            Some("Mode Base")
        );
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = std::env::temp_dir().join("mm_db_test_config_rt");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yml");

        let original: ModelConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        original.save(&path).unwrap();

        let loaded = ModelConfig::load(&path).unwrap();
        assert_eq!(loaded, original);

        std::fs::remove_dir_all(&dir).ok();
    }
}
