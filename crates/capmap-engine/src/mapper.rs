//! Device-level mapping
//!
//! [`ExposesMapper`] runs the converters over every expose of a device.
//! Structured exposes are converted first so the flat exposes they already
//! cover are not mapped twice.

use capmap_core::{DeviceInfo, Expose, PropertyCategory, StateMap};
use capmap_mapping::MappingSet;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config_driven::{range_of, ConfigDrivenConverter};
use crate::converter::{ConversionContext, ConverterRegistry};
use crate::model::{
    display_name, MappedChannel, MappedProperty, MappingReport, MappingWarning, PropertyOrigin,
};
use crate::runtime::RuntimeBinding;
use crate::virtual_props::{VirtualPropertyResolver, VirtualPropertyValue};

pub struct ExposesMapper {
    registry: ConverterRegistry,
    virtual_properties: VirtualPropertyResolver,
}

impl ExposesMapper {
    /// Mapper with the rule-driven converter over `set`
    pub fn new(set: Arc<MappingSet>) -> Self {
        let mut registry = ConverterRegistry::new();
        registry.register(Arc::new(ConfigDrivenConverter::new(Arc::clone(&set))));
        Self {
            registry,
            virtual_properties: VirtualPropertyResolver::new(set),
        }
    }

    /// Mapper with a caller-assembled converter registry
    pub fn with_registry(
        registry: ConverterRegistry,
        virtual_properties: VirtualPropertyResolver,
    ) -> Self {
        Self {
            registry,
            virtual_properties,
        }
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    /// Convert a device's exposes into channels
    ///
    /// Exposes no rule matches produce nothing. Mapping the same input twice
    /// gives the same output.
    #[instrument(skip_all, fields(exposes = exposes.len()))]
    pub fn map_exposes(
        &self,
        exposes: &[Expose],
        device_info: Option<&DeviceInfo>,
    ) -> Vec<MappedChannel> {
        self.convert(exposes, device_info).0
    }

    /// Convert a device and fill in values from its current state
    ///
    /// Expose-backed properties read `state` through their transformer,
    /// derived properties are evaluated from their source property, and
    /// missing required properties are supplied by virtual properties when
    /// a definition exists. Whatever is still missing is reported.
    #[instrument(skip_all, fields(exposes = exposes.len()))]
    pub fn map_device(
        &self,
        exposes: &[Expose],
        device_info: Option<&DeviceInfo>,
        state: &StateMap,
    ) -> MappingReport {
        let (mut channels, mut warnings) = self.convert(exposes, device_info);
        let bindings = self.runtime_mappings(exposes, device_info);

        for channel in &mut channels {
            fill_values(channel, &bindings, state);

            let required = channel.category.required_properties();
            let existing: Vec<PropertyCategory> =
                channel.properties.iter().map(|p| p.category).collect();
            let supplied =
                self.virtual_properties
                    .get_missing_virtual_properties(channel.category, &existing, required, state);
            for value in supplied {
                let property = virtual_property(channel, value);
                channel.properties.push(property);
            }

            for property in required {
                if !channel.has_property(*property) {
                    debug!(
                        channel = %channel.identifier,
                        property = property.as_str(),
                        "Required property missing"
                    );
                    warnings.push(MappingWarning::MissingRequiredProperty {
                        channel: channel.identifier.clone(),
                        channel_category: channel.category,
                        property: *property,
                    });
                }
            }
        }

        MappingReport {
            device_category: channels.first().map(|c| c.device_category),
            channels,
            warnings,
        }
    }

    /// Runtime bindings for every expose of a device
    pub fn runtime_mappings(
        &self,
        exposes: &[Expose],
        device_info: Option<&DeviceInfo>,
    ) -> Vec<RuntimeBinding> {
        let ctx = ConversionContext::new(exposes, device_info);
        exposes
            .iter()
            .flat_map(|expose| self.registry.runtime_bindings(expose, &ctx))
            .collect()
    }

    fn convert(
        &self,
        exposes: &[Expose],
        device_info: Option<&DeviceInfo>,
    ) -> (Vec<MappedChannel>, Vec<MappingWarning>) {
        let mut ctx = ConversionContext::new(exposes, device_info);
        let (specific, flat): (Vec<&Expose>, Vec<&Expose>) =
            exposes.iter().partition(|e| e.is_specific());

        let mut channels = Vec::new();
        let mut warnings = self.registry.convert_all(&specific, &mut ctx, &mut channels);
        warnings.extend(self.registry.convert_all(&flat, &mut ctx, &mut channels));

        debug!(channels = channels.len(), warnings = warnings.len(), "Mapped exposes");
        (channels, warnings)
    }
}

/// Populate expose-backed then derived values of a channel
fn fill_values(channel: &mut MappedChannel, bindings: &[RuntimeBinding], state: &StateMap) {
    for property in channel
        .properties
        .iter_mut()
        .filter(|p| matches!(p.origin, PropertyOrigin::Expose))
    {
        property.value = bindings
            .iter()
            .find(|b| {
                b.channel_identifier == channel.identifier
                    && b.category == property.category
                    && b.device_property == property.device_property
            })
            .and_then(|b| b.read_state(state));
    }

    let derived: Vec<(usize, serde_json::Value)> = channel
        .properties
        .iter()
        .enumerate()
        .filter_map(|(index, property)| match &property.origin {
            PropertyOrigin::Derived { source, rule, .. } => {
                let source = channel.property(*source).and_then(|p| p.value.as_ref());
                Some((index, rule.apply(source)))
            }
            _ => None,
        })
        .collect();
    for (index, value) in derived {
        channel.properties[index].value = Some(value);
    }
}

fn virtual_property(channel: &MappedChannel, value: VirtualPropertyValue) -> MappedProperty {
    let identifier = value.category.as_str();
    let (min, max) = range_of(value.format.as_ref());
    MappedProperty {
        identifier: identifier.to_string(),
        category: value.category,
        channel_category: channel.category,
        name: display_name(identifier),
        data_type: value.data_type,
        permissions: value.permissions,
        device_property: format!("__virtual_{identifier}"),
        sub_key: None,
        unit: value.unit,
        format: value.format,
        min,
        max,
        step: None,
        queryable: true,
        origin: PropertyOrigin::Virtual {
            value: value.value.clone(),
        },
        value: Some(value.value),
    }
}
