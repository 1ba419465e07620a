//! Virtual properties
//!
//! Channel categories carry required canonical properties. When no device
//! value provides one, a virtual property definition may fill the gap with
//! a fixed value or a value derived from the raw device state.

use capmap_core::{ChannelCategory, DataType, Permission, PropertyCategory, StateMap};
use capmap_mapping::{MappingSet, PropertyFormat, VirtualKind};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

/// A virtual property with its current value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualPropertyValue {
    pub category: PropertyCategory,
    pub data_type: DataType,
    pub permissions: Vec<Permission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<PropertyFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct VirtualPropertyResolver {
    set: Arc<MappingSet>,
}

impl VirtualPropertyResolver {
    pub fn new(set: Arc<MappingSet>) -> Self {
        Self { set }
    }

    /// Virtual properties for required categories the channel lacks
    ///
    /// Definitions for categories already present, or not required, are
    /// skipped. Derived values read `state` by raw device key.
    pub fn get_missing_virtual_properties(
        &self,
        channel_category: ChannelCategory,
        existing: &[PropertyCategory],
        required: &[PropertyCategory],
        state: &StateMap,
    ) -> Vec<VirtualPropertyValue> {
        let mut supplied: Vec<VirtualPropertyValue> = Vec::new();

        for definition in self.set.virtual_properties(channel_category) {
            let category = definition.category;
            if existing.contains(&category)
                || !required.contains(&category)
                || supplied.iter().any(|v| v.category == category)
            {
                continue;
            }

            let value = match &definition.kind {
                VirtualKind::Static { value } => value.clone(),
                VirtualKind::Derived {
                    rule,
                    source_property,
                } => rule.evaluate(source_property.as_deref(), state),
            };
            trace!(
                channel_category = channel_category.as_str(),
                property = category.as_str(),
                value = %value,
                "Supplying virtual property"
            );

            supplied.push(VirtualPropertyValue {
                category,
                data_type: definition.data_type,
                permissions: definition.permissions.clone(),
                format: definition.format.clone(),
                unit: definition.unit.clone(),
                value,
            });
        }

        supplied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capmap_mapping::{LoaderConfig, MappingLoader};
    use serde_json::json;

    fn resolver() -> VirtualPropertyResolver {
        let loader = MappingLoader::new(LoaderConfig::default()).unwrap();
        VirtualPropertyResolver::new(loader.load_all())
    }

    #[test]
    fn test_battery_status_from_state() {
        let resolver = resolver();
        let required = ChannelCategory::Battery.required_properties();

        let mut state = StateMap::new();
        state.insert("battery".into(), json!(15));
        let low = resolver.get_missing_virtual_properties(
            ChannelCategory::Battery,
            &[PropertyCategory::Percentage],
            required,
            &state,
        );
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].category, PropertyCategory::Status);
        assert_eq!(low[0].value, json!("low"));

        state.insert("battery".into(), json!(85));
        let ok = resolver.get_missing_virtual_properties(
            ChannelCategory::Battery,
            &[PropertyCategory::Percentage],
            required,
            &state,
        );
        assert_eq!(ok[0].value, json!("ok"));

        let unknown = resolver.get_missing_virtual_properties(
            ChannelCategory::Battery,
            &[PropertyCategory::Percentage],
            required,
            &StateMap::new(),
        );
        assert_eq!(unknown[0].value, json!("ok"));
    }

    #[test]
    fn test_present_or_unrequired_properties_are_skipped() {
        let resolver = resolver();
        let required = ChannelCategory::Battery.required_properties();
        let none = resolver.get_missing_virtual_properties(
            ChannelCategory::Battery,
            &[PropertyCategory::Percentage, PropertyCategory::Status],
            required,
            &StateMap::new(),
        );
        assert!(none.is_empty());

        let unrequired = resolver.get_missing_virtual_properties(
            ChannelCategory::Battery,
            &[],
            &[],
            &StateMap::new(),
        );
        assert!(unrequired.is_empty());
    }
}
