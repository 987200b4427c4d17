//! Model loading with builder pattern and fallback chains.
//!
//! Provides [`ModelStore`] for cluster lookup over a loaded
//! [`ModelPackage`] and [`StoreBuilder`] for trying several sources in order.
//!
//! # Loading patterns
//!
//! ```no_run
//! use matter_model_db::{ModelConfig, ModelStore};
//!
//! // Load from a directory of JSON/YAML cluster files
//! let mut store = ModelStore::from_dir("model/clusters/").unwrap();
//! assert!(store.get("On/Off").is_some());
//!
//! // Load a single package file
//! let store = ModelStore::from_file("model/appclusters.json").unwrap();
//!
//! // Use the builder for a fallback chain
//! let mut store = ModelStore::builder()
//!     .from_dir("model/clusters/")
//!     .from_file("model/appclusters.json")
//!     .build()
//!     .unwrap();
//! let diagnostics = store.resolve(&ModelConfig::default()).unwrap();
//! ```
//!
//! Files are JSON (`.json`) or YAML (`.yaml`, `.yml`). Each file holds either
//! a whole package or a single cluster.

use std::collections::HashMap;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use matter_model_core::{Cluster, Diagnostic, ModelPackage, validate_package};
use serde::Deserialize;

use crate::config::ModelConfig;
use crate::error::{ModelError, Result};

/// Version given to packages assembled from bare cluster files.
pub const UNVERSIONED: &str = "unversioned";

/// Describes where a [`ModelStore`] was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSource {
    /// Loaded from a single package or cluster file.
    File(PathBuf),
    /// Loaded from a directory of model files.
    Directory(PathBuf),
    /// Loaded via a fallback chain of multiple sources.
    Multiple(Vec<StoreSource>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Package(ModelPackage),
    Cluster(Box<Cluster>),
}

#[derive(Clone, Copy)]
enum FileFormat {
    Json,
    Yaml,
}

fn file_format(path: &Path) -> Option<FileFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => Some(FileFormat::Json),
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            Some(FileFormat::Yaml)
        }
        _ => None,
    }
}

fn read_document(path: &Path) -> Result<Document> {
    let format = file_format(path).ok_or_else(|| ModelError::UnsupportedFormat(path.into()))?;
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let document = match format {
        FileFormat::Json => serde_json::from_reader(reader)?,
        FileFormat::Yaml => serde_yaml::from_reader(reader)?,
    };
    Ok(document)
}

/// A loaded model package with lookup of clusters by name.
///
/// When several clusters share a name, lookups return the first one loaded;
/// [`resolve`](Self::resolve) reports the duplicate.
///
/// # Examples
///
/// ```no_run
/// use matter_model_db::ModelStore;
///
/// let store = ModelStore::from_dir("model/clusters/").unwrap();
/// println!("Loaded {} clusters", store.len());
///
/// if let Some(cluster) = store.get("Level Control") {
///     println!("Level Control has {} attributes", cluster.attributes.len());
/// }
///
/// for name in store.cluster_names() {
///     println!("  {}", name);
/// }
/// ```
#[derive(Debug)]
pub struct ModelStore {
    package: ModelPackage,
    index: HashMap<String, usize>,
    source: StoreSource,
}

impl ModelStore {
    /// Returns a new [`StoreBuilder`] for configuring a fallback chain.
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Wraps an in-memory package.
    pub fn from_package(package: ModelPackage, source: StoreSource) -> Self {
        let mut store = Self {
            package,
            index: HashMap::new(),
            source,
        };
        store.reindex();
        store
    }

    /// Loads a single package or cluster file.
    ///
    /// A bare cluster file becomes a one-cluster package versioned
    /// [`UNVERSIONED`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnsupportedFormat`] for unknown extensions,
    /// [`ModelError::IoError`] if the file cannot be read, or a JSON/YAML
    /// error if parsing fails.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let package = match read_document(path)? {
            Document::Package(package) => package,
            Document::Cluster(cluster) => {
                let mut package = ModelPackage::new(UNVERSIONED);
                package.clusters.push(*cluster);
                package
            }
        };
        tracing::debug!(
            path = %path.display(),
            clusters = package.clusters.len(),
            "loaded model file"
        );
        Ok(Self::from_package(package, StoreSource::File(path.to_path_buf())))
    }

    /// Loads every `*.json`, `*.yaml` and `*.yml` file in a directory.
    ///
    /// Files are read in name order. Clusters from all files are gathered into
    /// one package; its version, name and description come from the first
    /// package file that sets them.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::IoError`] if the directory cannot be read or a
    /// file cannot be opened, or a JSON/YAML error if any file is invalid.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.is_file() && file_format(&file_path).is_some() {
                files.push(file_path);
            }
        }
        files.sort();

        let mut package = ModelPackage::new(UNVERSIONED);
        let mut versioned = false;
        for file_path in &files {
            match read_document(file_path)? {
                Document::Package(loaded) => {
                    if !versioned {
                        package.version = loaded.version;
                        versioned = true;
                    }
                    package.name = package.name.or(loaded.name);
                    package.description = package.description.or(loaded.description);
                    package.clusters.extend(loaded.clusters);
                }
                Document::Cluster(cluster) => package.clusters.push(*cluster),
            }
        }
        tracing::debug!(
            path = %path.display(),
            files = files.len(),
            clusters = package.clusters.len(),
            "loaded model directory"
        );

        Ok(Self::from_package(
            package,
            StoreSource::Directory(path.to_path_buf()),
        ))
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, cluster) in self.package.clusters.iter().enumerate() {
            if self.index.contains_key(&cluster.name) {
                tracing::warn!(cluster = %cluster.name, "duplicate cluster name");
                continue;
            }
            self.index.insert(cluster.name.clone(), i);
        }
    }

    /// Looks up a cluster by name.
    pub fn get(&self, name: &str) -> Option<&Cluster> {
        self.index.get(name).map(|&i| &self.package.clusters[i])
    }

    /// Returns `true` if the store holds a cluster named `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns the number of distinct cluster names.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if no clusters are loaded.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns the cluster names in load order.
    pub fn cluster_names(&self) -> impl Iterator<Item = &str> {
        self.package
            .clusters
            .iter()
            .enumerate()
            .filter(|(i, c)| self.index.get(&c.name) == Some(i))
            .map(|(_, c)| c.name.as_str())
    }

    pub fn package(&self) -> &ModelPackage {
        &self.package
    }

    pub fn into_package(self) -> ModelPackage {
        self.package
    }

    /// Returns a reference to the source metadata.
    pub fn source(&self) -> &StoreSource {
        &self.source
    }

    /// Applies `config`, inherits derived clusters and validates the result.
    ///
    /// Returns the diagnostics found along the way, without repeats.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Inherit`] if a merge is ambiguous or meets an
    /// invalid bit mask, and [`ModelError::Validation`] when
    /// [`ModelConfig::strict`] is set and any diagnostic was found.
    pub fn resolve(&mut self, config: &ModelConfig) -> Result<Vec<Diagnostic>> {
        config.apply_to(&mut self.package);
        self.reindex();

        let mut diagnostics = self.package.apply_inheritance()?;
        for diagnostic in validate_package(&self.package) {
            if !diagnostics.contains(&diagnostic) {
                diagnostics.push(diagnostic);
            }
        }
        tracing::info!(
            clusters = self.package.clusters.len(),
            diagnostics = diagnostics.len(),
            "resolved model package"
        );

        if config.strict && !diagnostics.is_empty() {
            return Err(ModelError::Validation(diagnostics));
        }
        Ok(diagnostics)
    }

    /// Writes the package as JSON or YAML, chosen by the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnsupportedFormat`] for unknown extensions, or an
    /// I/O or serialization error.
    pub fn write_package(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let format = file_format(path).ok_or_else(|| ModelError::UnsupportedFormat(path.into()))?;
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        match format {
            FileFormat::Json => serde_json::to_writer_pretty(writer, &self.package)?,
            FileFormat::Yaml => serde_yaml::to_writer(writer, &self.package)?,
        }
        Ok(())
    }
}

/// Builder for constructing a [`ModelStore`] with a fallback chain.
///
/// Sources are tried in the order they are added. The first successful load
/// wins; if all fail, [`ModelError::NoSourcesAvailable`] is returned.
///
/// # Example
///
/// ```no_run
/// use matter_model_db::ModelStore;
///
/// let store = ModelStore::builder()
///     .from_dir("/opt/matter/clusters/")
///     .from_file("/opt/matter/model.yaml")
///     .build()
///     .unwrap();
/// ```
pub struct StoreBuilder {
    sources: Vec<StoreSource>,
}

impl StoreBuilder {
    /// Creates a new builder with no sources.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Adds a directory of model files as a source.
    pub fn from_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(StoreSource::Directory(path.into()));
        self
    }

    /// Adds a single package or cluster file as a source.
    pub fn from_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(StoreSource::File(path.into()));
        self
    }

    /// Attempts to load from configured sources in order.
    ///
    /// Returns the first successfully loaded store. If all sources fail,
    /// returns [`ModelError::NoSourcesAvailable`].
    pub fn build(self) -> Result<ModelStore> {
        if self.sources.is_empty() {
            return Err(ModelError::NoSourcesAvailable);
        }

        let all_sources = self.sources.clone();

        for source in &self.sources {
            let result = match source {
                StoreSource::Directory(path) => ModelStore::from_dir(path),
                StoreSource::File(path) => ModelStore::from_file(path),
                StoreSource::Multiple(_) => continue,
            };

            match result {
                Ok(mut store) => {
                    store.source = StoreSource::Multiple(all_sources);
                    return Ok(store);
                }
                Err(err) => tracing::debug!(?source, error = %err, "model source failed"),
            }
        }

        Err(ModelError::NoSourcesAvailable)
    }
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matter_model_core::Field;
    use std::io::Write;

    fn write_cluster(dir: &Path, file: &str, cluster: &Cluster) {
        let mut f = std::fs::File::create(dir.join(file)).unwrap();
        serde_json::to_writer_pretty(&mut f, cluster).unwrap();
        f.flush().unwrap();
    }

    fn fresh_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_from_dir_mixes_clusters_and_packages() {
        let dir = fresh_dir("mm_db_test_from_dir");
        write_cluster(&dir, "a.json", &Cluster::new("On/Off").with_id(6));

        let mut package = ModelPackage::new("1.3");
        package.clusters.push(Cluster::new("Mode Base"));
        std::fs::write(dir.join("b.yaml"), serde_yaml::to_string(&package).unwrap()).unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let store = ModelStore::from_dir(&dir).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains("On/Off"));
        assert!(store.contains("Mode Base"));
        assert_eq!(store.package().version, "1.3");
        assert_eq!(store.cluster_names().collect::<Vec<_>>(), vec!["On/Off", "Mode Base"]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_from_file_bare_cluster_is_unversioned() {
        let dir = fresh_dir("mm_db_test_from_file");
        write_cluster(&dir, "onoff.json", &Cluster::new("On/Off"));

        let store = ModelStore::from_file(dir.join("onoff.json")).unwrap();
        assert_eq!(store.package().version, UNVERSIONED);
        assert_eq!(store.source(), &StoreSource::File(dir.join("onoff.json")));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_from_file_rejects_unknown_extension() {
        let err = ModelStore::from_file("model.xml").unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let mut package = ModelPackage::new("1.3");
        package.clusters.push(Cluster::new("Scenes").with_id(5));
        package.clusters.push(Cluster::new("Scenes").with_id(0x62));
        let store = ModelStore::from_package(package, StoreSource::Multiple(Vec::new()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("Scenes").unwrap().id, Some(5));
    }

    #[test]
    fn test_resolve_inherits_and_reports() {
        let mut package = ModelPackage::new("1.3");
        let mut base = Cluster::new("Mode Base");
        base.attributes.push(Field::new("SupportedModes").with_id(0));
        package.clusters.push(base);
        package.clusters.push(Cluster::new("Oven Mode"));
        package.clusters.push(Cluster::new("Scenes").with_base("Missing"));

        let mut store = ModelStore::from_package(package, StoreSource::Multiple(Vec::new()));
        let config = ModelConfig {
            hierarchy: [("Oven Mode".to_string(), "Mode Base".to_string())].into(),
            ..ModelConfig::default()
        };
        let diagnostics = store.resolve(&config).unwrap();

        assert_eq!(
            diagnostics,
            vec![Diagnostic::UnknownBaseCluster {
                cluster: "Scenes".into(),
                base: "Missing".into()
            }]
        );
        assert!(store.get("Oven Mode").unwrap().find_attribute("SupportedModes").is_some());
    }

    #[test]
    fn test_resolve_strict_fails_on_diagnostics() {
        let mut package = ModelPackage::new("");
        package.clusters.push(Cluster::new("On/Off"));
        let mut store = ModelStore::from_package(package, StoreSource::Multiple(Vec::new()));
        let config = ModelConfig {
            strict: true,
            ..ModelConfig::default()
        };
        let err = store.resolve(&config).unwrap_err();
        assert!(
            matches!(err, ModelError::Validation(ref d) if d == &vec![Diagnostic::EmptyPackageVersion])
        );
    }

    #[test]
    fn test_builder_falls_back() {
        let dir = fresh_dir("mm_db_test_builder_fallback");
        write_cluster(&dir, "onoff.json", &Cluster::new("On/Off"));

        let store = ModelStore::builder()
            .from_dir("/nonexistent/matter/model")
            .from_dir(&dir)
            .build()
            .unwrap();
        assert!(store.contains("On/Off"));
        assert!(matches!(store.source(), StoreSource::Multiple(s) if s.len() == 2));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_builder_no_sources() {
        let err = ModelStore::builder().build().unwrap_err();
        assert!(matches!(err, ModelError::NoSourcesAvailable));
    }

    #[test]
    fn test_write_package_roundtrip() {
        let dir = fresh_dir("mm_db_test_write");
        let mut package = ModelPackage::new("1.3");
        package.clusters.push(Cluster::new("On/Off").with_id(6));
        let store = ModelStore::from_package(package.clone(), StoreSource::Multiple(Vec::new()));

        for file in ["out.json", "out.yml"] {
            store.write_package(dir.join(file)).unwrap();
            let loaded = ModelStore::from_file(dir.join(file)).unwrap();
            assert_eq!(loaded.package(), &package);
        }

        std::fs::remove_dir_all(&dir).ok();
    }
}
