use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{Cluster, Diagnostic, InheritError};

/// A versioned set of clusters loaded together.
///
/// Clusters name their base cluster through
/// [`Cluster::base_cluster`]; [`apply_inheritance`](Self::apply_inheritance)
/// resolves those links inside the package.
///
/// # Examples
///
/// ```
/// use matter_model_core::*;
///
/// let mut package = ModelPackage::new("1.3");
/// package.name = Some("appclusters".into());
/// package.clusters.push(Cluster::new("Mode Base"));
/// package.clusters.push(Cluster::new("Refrigerator Mode").with_base("Mode Base"));
///
/// assert_eq!(package.cluster_count(), 2);
/// assert!(package.find_cluster("Mode Base").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPackage {
    /// Specification version the clusters were taken from.
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub clusters: Vec<Cluster>,
}

impl ModelPackage {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            name: None,
            description: None,
            clusters: Vec::new(),
        }
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Finds the first cluster with the given name.
    pub fn find_cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.name == name)
    }

    /// Returns one name per base-cluster loop: the smallest name in the loop.
    pub fn hierarchy_cycles(&self) -> Vec<String> {
        self.cycle_members()
            .into_iter()
            .filter_map(|members| members.into_iter().min())
            .collect()
    }

    fn cycle_members(&self) -> Vec<Vec<String>> {
        let bases: HashMap<&str, &str> = self
            .clusters
            .iter()
            .filter_map(|c| c.base_cluster.as_deref().map(|b| (c.name.as_str(), b)))
            .collect();

        let mut seen_members: HashSet<&str> = HashSet::new();
        let mut cycles = Vec::new();
        for cluster in &self.clusters {
            let mut path: Vec<&str> = vec![cluster.name.as_str()];
            let mut current = cluster.name.as_str();
            while let Some(&base) = bases.get(current) {
                if let Some(pos) = path.iter().position(|n| *n == base) {
                    let members = &path[pos..];
                    if members.iter().all(|m| seen_members.insert(*m)) {
                        cycles.push(members.iter().map(|m| m.to_string()).collect());
                    }
                    break;
                }
                path.push(base);
                current = base;
            }
        }
        cycles
    }

    /// Inherits every derived cluster from its base, bases first.
    ///
    /// A cluster whose base is missing, or that sits on a base-cluster loop,
    /// is left as declared and reported. Duplicate-ID diagnostics from the
    /// merges are returned alongside.
    ///
    /// # Examples
    ///
    /// ```
    /// use matter_model_core::*;
    ///
    /// let mut base = Cluster::new("Mode Base");
    /// base.attributes.push(Field::new("SupportedModes").with_id(0));
    /// let middle = Cluster::new("Middle").with_base("Mode Base");
    /// let leaf = Cluster::new("Leaf").with_base("Middle");
    ///
    /// let mut package = ModelPackage::new("1.3");
    /// package.clusters = vec![leaf, middle, base];
    /// let diagnostics = package.apply_inheritance().unwrap();
    /// assert!(diagnostics.is_empty());
    /// assert!(package.find_cluster("Leaf").unwrap().find_attribute("SupportedModes").is_some());
    /// ```
    pub fn apply_inheritance(&mut self) -> Result<Vec<Diagnostic>, InheritError> {
        let mut diagnostics = Vec::new();

        let cyclic: HashSet<String> = self.cycle_members().into_iter().flatten().collect();
        for name in self.hierarchy_cycles() {
            diagnostics.push(Diagnostic::HierarchyCycle(name));
        }

        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, cluster) in self.clusters.iter().enumerate() {
            index.entry(cluster.name.clone()).or_insert(i);
        }

        let depth = |start: usize| {
            let mut depth = 0usize;
            let mut current = start;
            while let Some(base) = self.clusters[current].base_cluster.as_ref() {
                match index.get(base) {
                    Some(&next) if !cyclic.contains(base) => {
                        depth += 1;
                        current = next;
                    }
                    _ => break,
                }
            }
            depth
        };
        let mut order: Vec<(usize, usize)> = (0..self.clusters.len()).map(|i| (depth(i), i)).collect();
        order.sort();

        for (_, i) in order {
            let Some(base_name) = self.clusters[i].base_cluster.clone() else {
                continue;
            };
            if cyclic.contains(&self.clusters[i].name) {
                continue;
            }
            let Some(&base_index) = index.get(&base_name) else {
                tracing::warn!(cluster = %self.clusters[i].name, base = %base_name, "unknown base cluster");
                diagnostics.push(Diagnostic::UnknownBaseCluster {
                    cluster: self.clusters[i].name.clone(),
                    base: base_name,
                });
                continue;
            };
            let base = self.clusters[base_index].clone();
            diagnostics.extend(self.clusters[i].inherit(&base)?);
        }
        Ok(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Field;

    #[test]
    fn test_hierarchy_cycles_reported_once() {
        let mut package = ModelPackage::new("1.3");
        package.clusters.push(Cluster::new("B").with_base("A"));
        package.clusters.push(Cluster::new("A").with_base("B"));
        package.clusters.push(Cluster::new("C").with_base("A"));
        package.clusters.push(Cluster::new("Self").with_base("Self"));
        assert_eq!(package.hierarchy_cycles(), vec!["A".to_string(), "Self".to_string()]);
    }

    #[test]
    fn test_apply_inheritance_skips_cycles_and_unknown_bases() {
        let mut package = ModelPackage::new("1.3");
        let mut a = Cluster::new("A").with_base("B");
        a.attributes.push(Field::new("X").with_id(0));
        package.clusters.push(a);
        package.clusters.push(Cluster::new("B").with_base("A"));
        package.clusters.push(Cluster::new("Orphan").with_base("Missing"));

        let diagnostics = package.apply_inheritance().unwrap();
        assert!(diagnostics.contains(&Diagnostic::HierarchyCycle("A".into())));
        assert!(diagnostics.contains(&Diagnostic::UnknownBaseCluster {
            cluster: "Orphan".into(),
            base: "Missing".into()
        }));
        assert!(package.find_cluster("B").unwrap().attributes.is_empty());
    }

    #[test]
    fn test_package_json_roundtrip() {
        let mut package = ModelPackage::new("1.3");
        package.clusters.push(Cluster::new("On/Off").with_id(6));
        let json = serde_json::to_string(&package).unwrap();
        let back: ModelPackage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, package);
    }
}
