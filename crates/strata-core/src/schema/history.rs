//! Schema history - the registry of versioned models and the migration
//! chain connecting them.

use super::model::SchemaModel;
use std::collections::{HashMap, HashSet};

/// A version-to-successor succession plan.
///
/// The chain is a forest of linear paths: at most one outgoing edge per
/// version and no cycles. Both properties are validated at construction;
/// violating them is a programmer error and panics.
#[derive(Debug, Clone, Default)]
pub struct MigrationChain {
    next: HashMap<String, String>,
}

impl MigrationChain {
    /// An empty chain.
    ///
    /// With an empty chain, [`SchemaHistory`] synthesizes a one-hop chain
    /// from whatever version a store is persisted at straight to the
    /// current version.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a linear chain `v[0] → v[1] → … → v[n-1]`.
    ///
    /// # Panics
    ///
    /// Panics if a version repeats.
    pub fn linear<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let versions: Vec<String> = versions.into_iter().map(Into::into).collect();
        let mut pairs = Vec::new();
        for window in versions.windows(2) {
            pairs.push((window[0].clone(), window[1].clone()));
        }
        Self::from_pairs(pairs)
    }

    /// Build a chain from explicit `(source, next)` pairs.
    ///
    /// # Panics
    ///
    /// Panics if a source version has more than one outgoing edge, or if
    /// the pairs form a cycle.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let mut next = HashMap::new();
        for (from, to) in pairs {
            let from = from.into();
            let to = to.into();
            assert!(
                from != to,
                "migration chain must not map version {from:?} to itself"
            );
            let previous = next.insert(from.clone(), to);
            assert!(
                previous.is_none(),
                "migration chain declares two successors for version {from:?}"
            );
        }

        let chain = Self { next };
        chain.assert_acyclic();
        chain
    }

    /// The immediate successor of `version`, or `None` at a chain end.
    pub fn next_after(&self, version: &str) -> Option<&str> {
        self.next.get(version).map(|s| s.as_str())
    }

    /// Check if the chain has no edges.
    pub fn is_empty(&self) -> bool {
        self.next.is_empty()
    }

    fn assert_acyclic(&self) {
        for start in self.next.keys() {
            let mut seen = HashSet::new();
            let mut current = start.as_str();
            while let Some(next) = self.next.get(current) {
                assert!(
                    seen.insert(current),
                    "migration chain contains a cycle through version {current:?}"
                );
                current = next;
            }
        }
    }
}

/// Registry of every known schema model plus the chain connecting them.
#[derive(Debug, Clone)]
pub struct SchemaHistory {
    models: HashMap<String, SchemaModel>,
    chain: MigrationChain,
    current_version: String,
}

impl SchemaHistory {
    /// Create a schema history.
    ///
    /// # Panics
    ///
    /// Panics if two models share a version identifier or the current
    /// version is not among the registered models (programmer errors).
    pub fn new(
        models: impl IntoIterator<Item = SchemaModel>,
        current_version: impl Into<String>,
        chain: MigrationChain,
    ) -> Self {
        let current_version = current_version.into();
        let mut registry = HashMap::new();
        for model in models {
            let version = model.version.clone();
            let previous = registry.insert(version.clone(), model);
            assert!(
                previous.is_none(),
                "schema history registers version {version:?} twice"
            );
        }
        assert!(
            registry.contains_key(&current_version),
            "current version {current_version:?} is not a registered schema model"
        );

        Self {
            models: registry,
            chain,
            current_version,
        }
    }

    /// The version the stack is currently configured for.
    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// The currently configured model.
    pub fn current_model(&self) -> &SchemaModel {
        &self.models[&self.current_version]
    }

    /// Look up a model by version.
    pub fn model(&self, version: &str) -> Option<&SchemaModel> {
        self.models.get(version)
    }

    /// Check if a version is registered.
    pub fn contains_version(&self, version: &str) -> bool {
        self.models.contains_key(version)
    }

    /// The immediate successor of `version` on the migration path, or
    /// `None` at the chain's end.
    ///
    /// With no explicit chain, a trivial one-hop chain
    /// `{version: current}` is synthesized for any non-current version.
    pub fn next_version_after(&self, version: &str) -> Option<&str> {
        if self.chain.is_empty() {
            if version != self.current_version {
                return Some(&self.current_version);
            }
            return None;
        }
        self.chain.next_after(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(version: &str) -> SchemaModel {
        SchemaModel::new(version)
    }

    #[test]
    fn test_linear_chain() {
        let chain = MigrationChain::linear(["v1", "v2", "v3"]);
        assert_eq!(chain.next_after("v1"), Some("v2"));
        assert_eq!(chain.next_after("v2"), Some("v3"));
        assert_eq!(chain.next_after("v3"), None);
    }

    #[test]
    #[should_panic(expected = "two successors")]
    fn test_chain_rejects_duplicate_source() {
        MigrationChain::from_pairs([("v1", "v2"), ("v1", "v3")]);
    }

    #[test]
    #[should_panic(expected = "cycle")]
    fn test_chain_rejects_cycle() {
        MigrationChain::from_pairs([("v1", "v2"), ("v2", "v1")]);
    }

    #[test]
    fn test_history_chain_resolution() {
        let history = SchemaHistory::new(
            [model("v1"), model("v2"), model("v3")],
            "v3",
            MigrationChain::linear(["v1", "v2", "v3"]),
        );

        assert_eq!(history.next_version_after("v1"), Some("v2"));
        assert_eq!(history.next_version_after("v2"), Some("v3"));
        assert_eq!(history.next_version_after("v3"), None);
        assert_eq!(history.current_version(), "v3");
    }

    #[test]
    fn test_history_synthesizes_one_hop_chain() {
        let history = SchemaHistory::new(
            [model("v1"), model("v2")],
            "v2",
            MigrationChain::empty(),
        );

        assert_eq!(history.next_version_after("v1"), Some("v2"));
        assert_eq!(history.next_version_after("v2"), None);
    }

    #[test]
    #[should_panic(expected = "not a registered schema model")]
    fn test_history_rejects_unknown_current_version() {
        SchemaHistory::new([model("v1")], "v9", MigrationChain::empty());
    }
}
