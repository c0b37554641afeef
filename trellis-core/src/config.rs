//! Binder configuration.

use serde::{Deserialize, Serialize};

/// Knobs for how bindings are applied to host nodes.
///
/// Deserializes from partial JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindConfig {
    /// Suffix appended to numeric style values.
    pub length_unit: String,

    /// Events that make a two-way binding read the node's value back.
    pub model_events: Vec<String>,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            length_unit: "px".to_string(),
            model_events: vec!["input".to_string(), "change".to_string()],
        }
    }
}

impl BindConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BindConfig::default();
        assert_eq!(config.length_unit, "px");
        assert_eq!(config.model_events, vec!["input", "change"]);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = BindConfig::from_json(r#"{ "length_unit": "rem" }"#).unwrap();
        assert_eq!(config.length_unit, "rem");
        assert_eq!(config.model_events, BindConfig::default().model_events);
    }
}
