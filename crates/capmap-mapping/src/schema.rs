//! Mapping file schema validation
//!
//! Documents are validated before they are deserialized so that structural
//! problems are reported with the offending path. The loader only sees the
//! [`SchemaValidator`] trait; [`JsonSchemaValidator`] is the default.

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use crate::error::{MappingError, MappingResult};

/// The mapping file schema shipped with this crate
pub const MAPPING_SCHEMA: &str = include_str!("../schema/mapping-schema.json");

/// Validates a mapping document before it is deserialized
pub trait SchemaValidator: Send + Sync {
    /// Returns every violation as `<instance path>: <message>`
    fn validate(&self, document: &Value) -> Result<(), Vec<String>>;
}

/// [`SchemaValidator`] backed by the `jsonschema` crate
pub struct JsonSchemaValidator {
    compiled: JSONSchema,
}

impl JsonSchemaValidator {
    /// Compile the built-in mapping schema
    pub fn new() -> MappingResult<Self> {
        let schema: Value = serde_json::from_str(MAPPING_SCHEMA)
            .map_err(|e| MappingError::SchemaCompile(e.to_string()))?;
        Self::from_schema(&schema)
    }

    /// Compile a custom schema
    pub fn from_schema(schema: &Value) -> MappingResult<Self> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(schema)
            .map_err(|e| MappingError::SchemaCompile(e.to_string()))?;
        Ok(Self { compiled })
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, document: &Value) -> Result<(), Vec<String>> {
        self.compiled.validate(document).map_err(|errors| {
            errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        format!("/: {e}")
                    } else {
                        format!("{path}: {e}")
                    }
                })
                .collect()
        })
    }
}

/// Convert a YAML document into JSON for validation
///
/// JSON objects only have string keys, so non-string YAML keys (`on:`,
/// `1:`) are stringified. Tags are dropped.
pub fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(k, v)| (yaml_key(k), yaml_to_json(v)))
                .collect(),
        ),
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => s,
        Yaml::Bool(b) => b.to_string(),
        Yaml::Number(n) => n.to_string(),
        Yaml::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> JsonSchemaValidator {
        JsonSchemaValidator::new().unwrap()
    }

    #[test]
    fn test_valid_document() {
        let doc = json!({
            "version": "1.0",
            "mappings": [{
                "name": "temperature",
                "match": { "expose_type": "numeric", "property": "temperature" },
                "device_category": "sensor",
                "channels": [{
                    "identifier": "temperature",
                    "category": "temperature",
                    "properties": [{
                        "device_property": "temperature",
                        "panel": { "identifier": "temperature", "data_type": "float" }
                    }]
                }]
            }]
        });
        assert!(validator().validate(&doc).is_ok());
    }

    #[test]
    fn test_missing_version_reports_root() {
        let errors = validator().validate(&json!({ "mappings": [] })).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("/:"));
        assert!(errors[0].contains("version"));
    }

    #[test]
    fn test_errors_carry_instance_path() {
        let doc = json!({
            "version": "1.0",
            "mappings": [{
                "name": "broken",
                "match": {},
                "device_category": "sensor",
                "channels": "not-a-list"
            }]
        });
        let errors = validator().validate(&doc).unwrap_err();
        assert!(errors.iter().any(|e| e.starts_with("/mappings/0/channels:")));
    }

    #[test]
    fn test_yaml_to_json_stringifies_keys() {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str("values:\n  true: ON\n  1: one\nratio: 0.5\n").unwrap();
        assert_eq!(
            yaml_to_json(yaml),
            json!({ "values": { "true": "ON", "1": "one" }, "ratio": 0.5 })
        );
    }
}
