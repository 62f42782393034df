//! User settings

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One pattern or a list of patterns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Patterns {
    One(String),
    Many(Vec<String>),
}

impl Patterns {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Patterns::One(pattern) => vec![pattern.clone()],
            Patterns::Many(patterns) => patterns.clone(),
        }
    }
}

/// Settings sent by the client in `initializationOptions` and
/// `workspace/didChangeConfiguration`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Publish diagnostics
    pub validate: bool,
    /// Answer hover requests
    pub hover: bool,
    /// Answer completion requests
    pub completion: bool,
    /// Schema identifier to the document patterns it applies to
    pub schemas: IndexMap<String, Patterns>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            validate: true,
            hover: true,
            completion: true,
            schemas: IndexMap::new(),
        }
    }
}

impl Settings {
    /// Read settings given either directly or nested under `"yaml"`
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let value = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(mut map) => match map.remove("yaml") {
                Some(nested) => nested,
                None => Value::Object(map),
            },
            other => other,
        };
        serde_json::from_value(value)
    }

    /// Configured associations as (schema identifier, patterns)
    pub fn associations(&self) -> impl Iterator<Item = (&str, Vec<String>)> {
        self.schemas
            .iter()
            .map(|(schema, patterns)| (schema.as_str(), patterns.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_value(Value::Null).expect("settings");
        assert!(settings.validate && settings.hover && settings.completion);
        assert!(settings.schemas.is_empty());
    }

    #[test]
    fn test_nested_under_yaml() {
        let settings = Settings::from_value(json!({
            "yaml": {
                "validate": false,
                "schemas": {
                    "kubernetes": "*.k8s.yaml",
                    "./schemas/app.json": ["app.yaml", "app/*.yaml"]
                }
            }
        }))
        .expect("settings");
        assert!(!settings.validate);
        assert!(settings.hover);
        let associations: Vec<_> = settings.associations().collect();
        assert_eq!(associations[0], ("kubernetes", vec!["*.k8s.yaml".to_string()]));
        assert_eq!(associations[1].1.len(), 2);
    }

    #[test]
    fn test_bare_settings() {
        let settings = Settings::from_value(json!({ "completion": false })).expect("settings");
        assert!(!settings.completion);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(Settings::from_value(json!({ "validate": "yes" })).is_err());
    }
}
