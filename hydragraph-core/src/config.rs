//! Graph configuration.

use serde::{Deserialize, Serialize};

/// Settings shared by every node of one graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Name reported in log records, usually the wizard's name.
    pub label: String,

    /// Cache flag for definitions that do not set one.
    pub default_cache: bool,
}

impl GraphConfig {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn with_default_cache(mut self, enabled: bool) -> Self {
        self.default_cache = enabled;
        self
    }

    /// Parses a configuration document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            label: "graph".to_string(),
            default_cache: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cache_on() {
        let config = GraphConfig::default();
        assert_eq!(config.label, "graph");
        assert!(config.default_cache);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = GraphConfig::from_json(r#"{ "label": "node-cordon" }"#).unwrap();
        assert_eq!(config, GraphConfig::new("node-cordon"));

        let config = GraphConfig::from_json(r#"{ "default_cache": false }"#).unwrap();
        assert_eq!(config.label, "graph");
        assert!(!config.default_cache);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(GraphConfig::from_json("{ label: }").is_err());
    }
}
