//! Declarative transformer definitions
//!
//! Definitions are what mapping files contain, either in the file-level
//! `transformers:` map or inline on a feature/property binding. An inline
//! definition may omit `type`; the kind is then inferred from the keys that
//! are present.

use capmap_core::Direction;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Linear rescale between two ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleDefinition {
    pub input_range: [f64; 2],
    pub output_range: [f64; 2],
    #[serde(default)]
    pub direction: Direction,
}

/// Lookup tables
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<IndexMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<IndexMap<String, Value>>,
    /// Fills the read table and the inverse write table
    #[serde(default, alias = "values", skip_serializing_if = "Option::is_none")]
    pub bidirectional: Option<IndexMap<String, Value>>,
    #[serde(default)]
    pub direction: Direction,
}

/// Device value pair standing for true/false
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanDefinition {
    pub true_value: Value,
    pub false_value: Value,
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClampDefinition {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundDefinition {
    #[serde(default)]
    pub precision: u8,
    #[serde(default)]
    pub direction: Direction,
}

/// `constant / value`, used for mired and Kelvin conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReciprocalDefinition {
    pub constant: f64,
    /// Device-side domain the input is clamped to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_range: Option<[f64; 2]>,
    #[serde(default)]
    pub direction: Direction,
}

/// Arithmetic expressions over `value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<String>,
    #[serde(default)]
    pub direction: Direction,
}

/// Steps applied in order on read and in reverse on write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainDefinition {
    pub steps: Vec<InlineTransform>,
    #[serde(default)]
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PassthroughDefinition {
    #[serde(default)]
    pub direction: Direction,
}

/// A transformer definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformerDefinition {
    Scale(ScaleDefinition),
    Map(MapDefinition),
    Boolean(BooleanDefinition),
    Clamp(ClampDefinition),
    Round(RoundDefinition),
    Reciprocal(ReciprocalDefinition),
    Formula(FormulaDefinition),
    Chain(ChainDefinition),
    Passthrough(PassthroughDefinition),
}

impl TransformerDefinition {
    pub fn kind(&self) -> &'static str {
        match self {
            TransformerDefinition::Scale(_) => "scale",
            TransformerDefinition::Map(_) => "map",
            TransformerDefinition::Boolean(_) => "boolean",
            TransformerDefinition::Clamp(_) => "clamp",
            TransformerDefinition::Round(_) => "round",
            TransformerDefinition::Reciprocal(_) => "reciprocal",
            TransformerDefinition::Formula(_) => "formula",
            TransformerDefinition::Chain(_) => "chain",
            TransformerDefinition::Passthrough(_) => "passthrough",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            TransformerDefinition::Scale(d) => d.direction,
            TransformerDefinition::Map(d) => d.direction,
            TransformerDefinition::Boolean(d) => d.direction,
            TransformerDefinition::Clamp(d) => d.direction,
            TransformerDefinition::Round(d) => d.direction,
            TransformerDefinition::Reciprocal(d) => d.direction,
            TransformerDefinition::Formula(d) => d.direction,
            TransformerDefinition::Chain(d) => d.direction,
            TransformerDefinition::Passthrough(d) => d.direction,
        }
    }
}

/// A definition whose `type` may be omitted
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InlineTransform(pub TransformerDefinition);

impl InlineTransform {
    pub fn definition(&self) -> &TransformerDefinition {
        &self.0
    }

    pub fn into_inner(self) -> TransformerDefinition {
        self.0
    }
}

impl From<TransformerDefinition> for InlineTransform {
    fn from(definition: TransformerDefinition) -> Self {
        Self(definition)
    }
}

impl<'de> Deserialize<'de> for InlineTransform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = Value::deserialize(deserializer)?;
        if let Value::Object(map) = &mut value {
            if !map.contains_key("type") {
                let kind = infer_kind(map);
                map.insert("type".into(), Value::String(kind.into()));
            }
        }
        TransformerDefinition::deserialize(value)
            .map(InlineTransform)
            .map_err(serde::de::Error::custom)
    }
}

fn infer_kind(map: &serde_json::Map<String, Value>) -> &'static str {
    let has = |key: &str| map.contains_key(key);
    let is_object = |key: &str| map.get(key).is_some_and(Value::is_object);
    let is_string = |key: &str| map.get(key).is_some_and(Value::is_string);

    if has("steps") {
        "chain"
    } else if has("constant") {
        "reciprocal"
    } else if has("input_range") && has("output_range") {
        "scale"
    } else if has("true_value") || has("false_value") {
        "boolean"
    } else if has("values") || has("bidirectional") || is_object("read") || is_object("write") {
        "map"
    } else if is_string("read") || is_string("write") {
        "formula"
    } else if has("min") && has("max") {
        "clamp"
    } else if has("precision") {
        "round"
    } else {
        "passthrough"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline(yaml: &str) -> TransformerDefinition {
        serde_yaml::from_str::<InlineTransform>(yaml)
            .unwrap()
            .into_inner()
    }

    #[test]
    fn test_explicit_type() {
        let def = inline("type: clamp\nmin: 0\nmax: 100\ndirection: read_only\n");
        assert_eq!(def.kind(), "clamp");
        assert_eq!(def.direction(), Direction::ReadOnly);
    }

    #[test]
    fn test_inferred_kinds() {
        assert_eq!(inline("input_range: [0, 254]\noutput_range: [0, 100]").kind(), "scale");
        assert_eq!(inline("true_value: ON\nfalse_value: OFF").kind(), "boolean");
        assert_eq!(inline("values:\n  'ON': true").kind(), "map");
        assert_eq!(inline("read:\n  heat: heating").kind(), "map");
        assert_eq!(inline("read: value / 10\nwrite: value * 10").kind(), "formula");
        assert_eq!(inline("constant: 1000000").kind(), "reciprocal");
        assert_eq!(inline("precision: 1").kind(), "round");
        assert_eq!(inline("{}").kind(), "passthrough");
    }

    #[test]
    fn test_values_alias_fills_bidirectional() {
        match inline("values:\n  OPEN: opened\n  CLOSE: closed") {
            TransformerDefinition::Map(map) => {
                let table = map.bidirectional.unwrap();
                assert_eq!(table.get("OPEN"), Some(&Value::from("opened")));
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_chain_steps_are_inferred() {
        let def = inline(
            "steps:\n  - input_range: [0, 1000]\n    output_range: [0, 100]\n  - precision: 0\n",
        );
        match def {
            TransformerDefinition::Chain(chain) => {
                assert_eq!(chain.steps.len(), 2);
                assert_eq!(chain.steps[1].definition().kind(), "round");
            }
            other => panic!("expected chain, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_parameters_rejected() {
        assert!(serde_yaml::from_str::<InlineTransform>("type: scale\ninput_range: [0]").is_err());
        assert!(serde_yaml::from_str::<InlineTransform>("type: teleport").is_err());
    }
}
