//! Runtime bindings between device state keys and canonical properties

use capmap_core::{ChannelCategory, DataType, Permission, PropertyCategory, StateMap};
use capmap_mapping::PropertyFormat;
use capmap_transform::Transformer;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Live link from a device state key to one canonical property
///
/// Used to translate incoming device state and outgoing commands without
/// re-running the whole conversion.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeBinding {
    /// Device state key
    pub device_property: String,
    /// Key inside a composite value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_key: Option<String>,
    /// Canonical property identifier
    pub identifier: String,
    pub category: PropertyCategory,
    pub channel_identifier: String,
    pub channel_category: ChannelCategory,
    pub data_type: DataType,
    pub permissions: Vec<Permission>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<PropertyFormat>,
    #[serde(skip)]
    pub transformer: Arc<Transformer>,
}

impl RuntimeBinding {
    /// Device value to canonical value
    ///
    /// Composite bindings pick their sub-key out of an object value; a value
    /// without the sub-key is passed to the transformer unchanged.
    pub fn read(&self, raw: &Value) -> Value {
        let value = match &self.sub_key {
            Some(key) => raw.get(key.as_str()).unwrap_or(raw),
            None => raw,
        };
        self.transformer.read(value)
    }

    /// Canonical value to device value
    ///
    /// Composite bindings wrap the result as `{sub_key: value}`.
    pub fn write(&self, value: &Value) -> Value {
        let written = self.transformer.write(value);
        match &self.sub_key {
            Some(key) => {
                let mut object = Map::new();
                object.insert(key.clone(), written);
                Value::Object(object)
            }
            None => written,
        }
    }

    /// Canonical value of this binding in a device state map
    pub fn read_state(&self, state: &StateMap) -> Option<Value> {
        let raw = state.get(&self.device_property).filter(|v| !v.is_null())?;
        let value = match &self.sub_key {
            Some(key) => raw.get(key.as_str()).filter(|v| !v.is_null())?,
            None => raw,
        };
        Some(self.transformer.read(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capmap_transform::{ScaleDefinition, TransformerDefinition};
    use serde_json::json;

    fn binding(sub_key: Option<&str>, transformer: Transformer) -> RuntimeBinding {
        RuntimeBinding {
            device_property: "color".into(),
            sub_key: sub_key.map(String::from),
            identifier: "saturation".into(),
            category: PropertyCategory::Saturation,
            channel_identifier: "light".into(),
            channel_category: ChannelCategory::Light,
            data_type: DataType::Uchar,
            permissions: vec![Permission::ReadWrite],
            name: "Saturation".into(),
            unit: None,
            format: None,
            transformer: Arc::new(transformer),
        }
    }

    #[test]
    fn test_composite_read_and_write() {
        let b = binding(Some("saturation"), Transformer::identity());
        assert_eq!(b.read(&json!({"hue": 120, "saturation": 80})), json!(80));
        assert_eq!(b.write(&json!(55)), json!({"saturation": 55}));

        let mut state = StateMap::new();
        state.insert("color".into(), json!({"hue": 120}));
        assert_eq!(b.read_state(&state), None);
        state.insert("color".into(), json!({"hue": 120, "saturation": 40}));
        assert_eq!(b.read_state(&state), Some(json!(40)));
    }

    #[test]
    fn test_transformer_applied() {
        let definition = TransformerDefinition::Scale(ScaleDefinition {
            input_range: [0.0, 254.0],
            output_range: [0.0, 100.0],
            direction: Default::default(),
        });
        let b = binding(None, Transformer::from_definition(&definition).unwrap());
        assert_eq!(b.read(&json!(254)), json!(100));
        assert_eq!(b.write(&json!(50)), json!(127));
    }
}
