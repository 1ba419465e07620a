//! Category resolution
//!
//! Turns the string-typed file structures into resolved rules. Category
//! names are looked up in the closed canonical vocabularies; a short alias
//! table is consulted before giving up. In strict mode an unknown name
//! fails the enclosing mapping definition, otherwise it falls back to a
//! generic member with a warning.

use capmap_core::{
    ChannelCategory, DataType, DeviceCategory, Permission, PropertyCategory, UnknownCategory,
};
use capmap_transform::{DerivationRegistry, DerivationRule};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::condition::MatchCondition;
use crate::error::{MappingError, MappingResult};
use crate::file::{
    ChannelConfig, DerivationRef, DerivedPropertyConfig, FeatureConfig, FeatureType,
    MappingDefinitionConfig, PanelPropertyConfig, PropertyConfig, StaticPropertyConfig,
    VirtualPropertyConfig,
};
use crate::resolved::{
    FeatureBinding, ResolvedChannel, ResolvedDerivedProperty, ResolvedFeature, ResolvedMapping,
    ResolvedPanelProperty, ResolvedProperty, ResolvedStaticProperty, Tier, TransformerRef,
    VirtualKind, VirtualPropertyDefinition, DEFAULT_PRIORITY,
};

const DEVICE_ALIASES: &[(&str, DeviceCategory)] = &[
    ("light", DeviceCategory::Lighting),
    ("switch", DeviceCategory::Switcher),
    ("cover", DeviceCategory::WindowCovering),
    ("climate", DeviceCategory::Thermostat),
];

const CHANNEL_ALIASES: &[(&str, ChannelCategory)] = &[
    ("switch", ChannelCategory::Switcher),
    ("cover", ChannelCategory::WindowCovering),
];

const PROPERTY_ALIASES: &[(&str, PropertyCategory)] = &[("switch", PropertyCategory::On)];

const DATA_TYPE_ALIASES: &[(&str, DataType)] = &[
    ("boolean", DataType::Bool),
    ("number", DataType::Float),
    ("text", DataType::String),
];

/// Resolves file definitions against the canonical vocabularies
pub struct CategoryResolver<'a> {
    strict: bool,
    derivations: &'a DerivationRegistry,
    warnings: Vec<String>,
}

impl<'a> CategoryResolver<'a> {
    pub fn new(strict: bool, derivations: &'a DerivationRegistry) -> Self {
        Self {
            strict,
            derivations,
            warnings: Vec::new(),
        }
    }

    /// Warnings collected since the last call
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    fn lookup<T>(&mut self, name: &str, aliases: &[(&str, T)], fallback: T) -> MappingResult<T>
    where
        T: FromStr<Err = UnknownCategory> + Copy + fmt::Display,
    {
        let err = match name.parse::<T>() {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let lowered = name.trim().to_ascii_lowercase();
        if let Some((_, value)) = aliases.iter().find(|(alias, _)| *alias == lowered) {
            return Ok(*value);
        }

        if self.strict {
            return Err(err.into());
        }
        self.warnings.push(format!("{err}, using '{fallback}'"));
        Ok(fallback)
    }

    pub fn device_category(&mut self, name: &str) -> MappingResult<DeviceCategory> {
        self.lookup(name, DEVICE_ALIASES, DeviceCategory::Generic)
    }

    pub fn channel_category(&mut self, name: &str) -> MappingResult<ChannelCategory> {
        self.lookup(name, CHANNEL_ALIASES, ChannelCategory::Generic)
    }

    pub fn property_category(&mut self, name: &str) -> MappingResult<PropertyCategory> {
        self.lookup(name, PROPERTY_ALIASES, PropertyCategory::Measured)
    }

    pub fn data_type(&mut self, name: &str) -> MappingResult<DataType> {
        self.lookup(name, DATA_TYPE_ALIASES, DataType::String)
    }

    pub fn permission(&mut self, name: &str) -> MappingResult<Permission> {
        self.lookup(name, &[], Permission::ReadOnly)
    }

    /// Resolve one mapping definition
    ///
    /// Dropped derived properties are recorded as warnings; any other
    /// failure rejects the whole definition.
    pub fn resolve_mapping(
        &mut self,
        config: &MappingDefinitionConfig,
        tier: Tier,
        source: &str,
    ) -> MappingResult<ResolvedMapping> {
        let device_category = self.device_category(&config.device_category)?;
        let channels = config
            .channels
            .iter()
            .map(|channel| self.resolve_channel(&config.name, channel))
            .collect::<MappingResult<Vec<_>>>()?;

        Ok(ResolvedMapping {
            name: config.name.clone(),
            description: config.description.clone(),
            priority: tier.base_priority() + config.priority.unwrap_or(DEFAULT_PRIORITY),
            tier,
            source: source.to_string(),
            match_condition: MatchCondition::from_config(&config.match_condition),
            device_category,
            channels,
        })
    }

    fn resolve_channel(
        &mut self,
        mapping: &str,
        config: &ChannelConfig,
    ) -> MappingResult<ResolvedChannel> {
        let category = self.channel_category(&config.category)?;

        let features = config
            .features
            .iter()
            .map(|f| self.resolve_feature(f))
            .collect::<MappingResult<Vec<_>>>()?;
        let properties = config
            .properties
            .iter()
            .map(|p| self.resolve_property(p))
            .collect::<MappingResult<Vec<_>>>()?;
        let static_properties = config
            .static_properties
            .iter()
            .map(|p| self.resolve_static(p))
            .collect::<MappingResult<Vec<_>>>()?;

        let mut derived_properties = Vec::with_capacity(config.derived_properties.len());
        for derived in &config.derived_properties {
            if let Some(resolved) = self.resolve_derived(mapping, derived)? {
                derived_properties.push(resolved);
            }
        }

        Ok(ResolvedChannel {
            identifier: config.identifier.clone(),
            name: config.name.clone(),
            category,
            parent_identifier: config.parent_identifier.clone(),
            features,
            properties,
            static_properties,
            derived_properties,
        })
    }

    fn resolve_feature(&mut self, config: &FeatureConfig) -> MappingResult<ResolvedFeature> {
        let binding = match config.feature_type {
            FeatureType::Composite => {
                if config.nested_features.is_empty() {
                    return Err(MappingError::InvalidDefinition(format!(
                        "composite feature '{}' has no nested_features",
                        config.device_feature
                    )));
                }
                let nested = config
                    .nested_features
                    .iter()
                    .map(|f| self.resolve_feature(f))
                    .collect::<MappingResult<Vec<_>>>()?;
                FeatureBinding::Composite { nested }
            }
            FeatureType::Simple => {
                let panel = config.panel.as_ref().ok_or_else(|| {
                    MappingError::InvalidDefinition(format!(
                        "feature '{}' has no panel binding",
                        config.device_feature
                    ))
                })?;
                FeatureBinding::Simple {
                    panel: self.resolve_panel(panel)?,
                    transformer: TransformerRef {
                        name: config.transformer.clone(),
                        inline: config.transform.clone().map(|t| t.into_inner()),
                    },
                }
            }
        };

        Ok(ResolvedFeature {
            device_feature: config.device_feature.clone(),
            direction: config.direction,
            binding,
        })
    }

    fn resolve_property(&mut self, config: &PropertyConfig) -> MappingResult<ResolvedProperty> {
        Ok(ResolvedProperty {
            device_property: config.device_property.clone(),
            direction: config.direction,
            panel: self.resolve_panel(&config.panel)?,
            transformer: TransformerRef {
                name: config.transformer.clone(),
                inline: config.transform.clone().map(|t| t.into_inner()),
            },
        })
    }

    fn resolve_panel(
        &mut self,
        config: &PanelPropertyConfig,
    ) -> MappingResult<ResolvedPanelProperty> {
        Ok(ResolvedPanelProperty {
            category: self.property_category(&config.identifier)?,
            name: config.name.clone(),
            data_type: self.data_type(&config.data_type)?,
            format: config.format.clone(),
            unit: config.unit.clone(),
            settable: config.settable,
            queryable: config.queryable,
        })
    }

    fn resolve_static(
        &mut self,
        config: &StaticPropertyConfig,
    ) -> MappingResult<ResolvedStaticProperty> {
        Ok(ResolvedStaticProperty {
            category: self.property_category(&config.identifier)?,
            name: config.name.clone(),
            data_type: self.data_type(&config.data_type)?,
            value: config.value.clone(),
            format: config.format.clone(),
            unit: config.unit.clone(),
        })
    }

    fn resolve_derived(
        &mut self,
        mapping: &str,
        config: &DerivedPropertyConfig,
    ) -> MappingResult<Option<ResolvedDerivedProperty>> {
        let (derivation_name, rule) = match self.derivation(&config.derivation) {
            Ok(resolved) => resolved,
            Err(reason) => {
                warn!(
                    mapping = %mapping,
                    property = %config.identifier,
                    "{}", reason
                );
                self.warnings.push(format!(
                    "mapping '{mapping}': derived property '{}' dropped: {reason}",
                    config.identifier
                ));
                return Ok(None);
            }
        };

        Ok(Some(ResolvedDerivedProperty {
            category: self.property_category(&config.identifier)?,
            name: config.name.clone(),
            data_type: self.data_type(&config.data_type)?,
            source: self.property_category(&config.source_property)?,
            derivation_name,
            rule,
            format: config.format.clone(),
            unit: config.unit.clone(),
        }))
    }

    fn derivation(
        &self,
        reference: &DerivationRef,
    ) -> Result<(Option<String>, DerivationRule), String> {
        match reference {
            DerivationRef::Named(name) => self
                .derivations
                .get(name)
                .map(|rule| (Some(name.clone()), rule))
                .ok_or_else(|| format!("unknown derivation '{name}'")),
            DerivationRef::Inline(rule) => {
                rule.validate()?;
                Ok((None, rule.clone()))
            }
        }
    }

    /// Resolve one virtual property definition
    pub fn resolve_virtual(
        &mut self,
        config: &VirtualPropertyConfig,
    ) -> MappingResult<VirtualPropertyDefinition> {
        let kind = match (&config.static_value, &config.derivation) {
            (Some(value), None) => VirtualKind::Static {
                value: value.clone(),
            },
            (None, Some(reference)) => {
                let (_, rule) = self.derivation(reference).map_err(|reason| {
                    MappingError::InvalidDefinition(format!(
                        "virtual property '{}': {reason}",
                        config.property_category
                    ))
                })?;
                VirtualKind::Derived {
                    rule,
                    source_property: config.source_property.clone(),
                }
            }
            _ => {
                return Err(MappingError::InvalidDefinition(format!(
                    "virtual property '{}' needs exactly one of static_value or derivation",
                    config.property_category
                )))
            }
        };

        let permissions = config
            .permissions
            .iter()
            .map(|p| self.permission(p))
            .collect::<MappingResult<Vec<_>>>()?;

        Ok(VirtualPropertyDefinition {
            category: self.property_category(&config.property_category)?,
            data_type: self.data_type(&config.data_type)?,
            permissions,
            format: config.format.clone(),
            unit: config.unit.clone(),
            kind,
        })
    }
}
