//! Rule-driven conversion
//!
//! [`ConfigDrivenConverter`] handles every expose a loaded mapping rule
//! matches. Features of structured exposes are looked up by property key or
//! name; flat exposes bind through their property key. Within a channel the
//! first binding producing a canonical property wins.

use capmap_core::value::{as_number, number_value};
use capmap_core::{
    access, DataType, Direction, Expose, Feature, GenericExpose, GenericValue, Permission,
    PropertyCategory,
};
use capmap_mapping::{
    FeatureBinding, MappingSet, MatchQuery, PropertyFormat, ResolvedChannel, ResolvedFeature,
    ResolvedMapping, ResolvedPanelProperty, TransformerRef,
};
use capmap_transform::Transformer;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::converter::{describe, ConversionContext, Converter, Handling};
use crate::error::{ConvertError, ConvertResult};
use crate::model::{
    display_name, permissions, resolve_identifier, MappedChannel, MappedProperty, PropertyOrigin,
};
use crate::runtime::RuntimeBinding;

/// Kind under which the rule-driven converter registers
pub const CONFIG_DRIVEN_KIND: &str = "config_driven";

/// A device-side value matched to a panel binding
struct Bound<'r, 'e> {
    panel: &'r ResolvedPanelProperty,
    transformer: &'r TransformerRef,
    direction: Direction,
    device_property: &'e str,
    sub_key: Option<&'e str>,
    source: Option<&'e GenericExpose>,
    access: u8,
    from_feature: bool,
}

/// Walk a channel's bindings against an expose in declaration order
fn bind<'r, 'e>(channel: &'r ResolvedChannel, expose: &'e Expose) -> Vec<Bound<'r, 'e>> {
    let mut bound = Vec::new();

    for def in &channel.features {
        let Some(feature) = expose
            .features()
            .iter()
            .find(|f| f.is_named(&def.device_feature))
        else {
            continue;
        };
        match &def.binding {
            FeatureBinding::Simple { panel, transformer } => bound.push(Bound {
                panel,
                transformer,
                direction: def.direction,
                device_property: feature.property(),
                sub_key: None,
                source: feature.as_simple(),
                access: feature.access(),
                from_feature: true,
            }),
            FeatureBinding::Composite { nested } => {
                for inner in nested {
                    bind_nested(inner, feature.property(), feature.sub_features(), &mut bound);
                }
            }
        }
    }

    if let Some(key) = expose.property_name() {
        for def in channel.properties.iter().filter(|p| p.device_property == key) {
            bound.push(Bound {
                panel: &def.panel,
                transformer: &def.transformer,
                direction: def.direction,
                device_property: key,
                sub_key: None,
                source: expose.as_generic(),
                access: expose.access(),
                from_feature: false,
            });
        }
    }

    bound
}

fn bind_nested<'r, 'e>(
    def: &'r ResolvedFeature,
    parent_property: &'e str,
    sub_features: &'e [Feature],
    bound: &mut Vec<Bound<'r, 'e>>,
) {
    let Some(sub) = sub_features.iter().find(|f| f.is_named(&def.device_feature)) else {
        return;
    };
    match &def.binding {
        FeatureBinding::Simple { panel, transformer } => bound.push(Bound {
            panel,
            transformer,
            direction: def.direction,
            device_property: parent_property,
            sub_key: Some(sub.property()),
            source: sub.as_simple(),
            access: sub.access(),
            from_feature: true,
        }),
        FeatureBinding::Composite { .. } => {
            debug!(
                feature = %def.device_feature,
                "Composite nested more than one level deep, skipping"
            );
        }
    }
}

/// Format and bounds of a bound property
///
/// Enum and numeric exposes describe their own domain; it is passed through
/// the transformer so it is expressed in canonical units. Otherwise the
/// panel's declared format applies.
fn format_of(
    panel: &ResolvedPanelProperty,
    source: Option<&GenericExpose>,
    transformer: &Transformer,
) -> (Option<PropertyFormat>, Option<f64>, Option<f64>, Option<f64>) {
    if let Some(expose) = source {
        match &expose.value {
            GenericValue::Enum { values }
                if !values.is_empty() && panel.data_type == DataType::Enum =>
            {
                let values = values.iter().map(|v| transformer.read(v)).collect();
                return (Some(PropertyFormat::Values(values)), None, None, None);
            }
            GenericValue::Numeric {
                value_min: Some(min),
                value_max: Some(max),
                value_step,
            } if panel.data_type.is_numeric() => {
                let lo = as_number(&transformer.read(&number_value(*min)));
                let hi = as_number(&transformer.read(&number_value(*max)));
                if let (Some(a), Some(b)) = (lo, hi) {
                    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                    let step = if transformer.is_identity() { *value_step } else { None };
                    return (Some(PropertyFormat::Range([lo, hi])), Some(lo), Some(hi), step);
                }
            }
            _ => {}
        }
    }

    match &panel.format {
        Some(PropertyFormat::Range([lo, hi])) => (panel.format.clone(), Some(*lo), Some(*hi), None),
        other => (other.clone(), None, None, None),
    }
}

/// Bounds carried by a declared format
pub(crate) fn range_of(format: Option<&PropertyFormat>) -> (Option<f64>, Option<f64>) {
    match format {
        Some(PropertyFormat::Range([lo, hi])) => (Some(*lo), Some(*hi)),
        _ => (None, None),
    }
}

/// Converter backed by the loaded mapping rules
#[derive(Debug, Clone)]
pub struct ConfigDrivenConverter {
    set: Arc<MappingSet>,
}

impl ConfigDrivenConverter {
    pub fn new(set: Arc<MappingSet>) -> Self {
        Self { set }
    }

    pub fn mapping_set(&self) -> &Arc<MappingSet> {
        &self.set
    }

    /// Highest-priority rule matching the expose
    pub fn find_mapping(
        &self,
        expose: &Expose,
        ctx: &ConversionContext<'_>,
    ) -> Option<&ResolvedMapping> {
        let features = expose.feature_names();
        let device_properties = ctx.device_properties();
        let query = MatchQuery::new(expose.expose_type())
            .with_property(expose.property_name())
            .with_features(features.as_deref())
            .with_device_properties(&device_properties)
            .with_is_list(ctx.is_list(expose))
            .with_device_info(ctx.device_info);
        self.set.find_matching_mapping(&query)
    }

    fn transformer(&self, reference: &TransformerRef) -> Arc<Transformer> {
        self.set
            .transformers()
            .get_or_create(reference.name.as_deref(), reference.inline.as_ref())
    }

    fn channel_identity(
        &self,
        channel: &ResolvedChannel,
        expose: &Expose,
    ) -> (String, Option<String>) {
        let endpoint = expose.endpoint();
        let identifier = resolve_identifier(&channel.identifier, endpoint);
        let parent = channel.parent_identifier.as_ref().map(|parent| {
            if parent.contains("{endpoint}") {
                resolve_identifier(parent, endpoint)
            } else {
                parent.clone()
            }
        });
        (identifier, parent)
    }

    fn build_channel(
        &self,
        rule: &ResolvedMapping,
        channel: &ResolvedChannel,
        expose: &Expose,
    ) -> Option<MappedChannel> {
        let (identifier, parent_identifier) = self.channel_identity(channel, expose);
        let mut properties: Vec<MappedProperty> = Vec::new();
        let mut seen: HashSet<PropertyCategory> = HashSet::new();

        for bound in bind(channel, expose) {
            if !seen.insert(bound.panel.category) {
                trace!(
                    channel = %identifier,
                    property = bound.panel.identifier(),
                    device_property = bound.device_property,
                    "Property already produced, skipping"
                );
                continue;
            }

            let transformer = self.transformer(bound.transformer);
            let (format, min, max, step) = format_of(bound.panel, bound.source, &transformer);
            let name = bound
                .panel
                .name
                .clone()
                .or_else(|| bound.source.and_then(|s| s.label.clone()))
                .unwrap_or_else(|| display_name(bound.panel.identifier()));

            properties.push(MappedProperty {
                identifier: bound.panel.identifier().to_string(),
                category: bound.panel.category,
                channel_category: channel.category,
                name,
                data_type: bound.panel.data_type,
                permissions: permissions(bound.direction, bound.access, bound.panel.settable),
                device_property: bound.device_property.to_string(),
                sub_key: bound.sub_key.map(String::from),
                unit: bound
                    .panel
                    .unit
                    .clone()
                    .or_else(|| bound.source.and_then(|s| s.unit.clone())),
                format,
                min,
                max,
                step,
                queryable: bound.panel.queryable,
                origin: PropertyOrigin::Expose,
                value: None,
            });
        }

        for fixed in &channel.static_properties {
            if !seen.insert(fixed.category) {
                continue;
            }
            let (min, max) = range_of(fixed.format.as_ref());
            properties.push(MappedProperty {
                identifier: fixed.category.as_str().to_string(),
                category: fixed.category,
                channel_category: channel.category,
                name: fixed.name.clone().unwrap_or_else(|| display_name(fixed.category.as_str())),
                data_type: fixed.data_type,
                permissions: vec![Permission::ReadOnly],
                device_property: format!("__static_{}", fixed.category.as_str()),
                sub_key: None,
                unit: fixed.unit.clone(),
                format: fixed.format.clone(),
                min,
                max,
                step: None,
                queryable: true,
                origin: PropertyOrigin::Static {
                    value: fixed.value.clone(),
                },
                value: Some(fixed.value.clone()),
            });
        }

        for derived in &channel.derived_properties {
            if !seen.contains(&derived.source) {
                trace!(
                    channel = %identifier,
                    property = derived.category.as_str(),
                    source = derived.source.as_str(),
                    "Derivation source not mapped, skipping"
                );
                continue;
            }
            if !seen.insert(derived.category) {
                continue;
            }
            let (min, max) = range_of(derived.format.as_ref());
            properties.push(MappedProperty {
                identifier: derived.category.as_str().to_string(),
                category: derived.category,
                channel_category: channel.category,
                name: derived
                    .name
                    .clone()
                    .unwrap_or_else(|| display_name(derived.category.as_str())),
                data_type: derived.data_type,
                permissions: vec![Permission::ReadOnly],
                device_property: format!("__derived_{}", derived.category.as_str()),
                sub_key: None,
                unit: derived.unit.clone(),
                format: derived.format.clone(),
                min,
                max,
                step: None,
                queryable: true,
                origin: PropertyOrigin::Derived {
                    source: derived.source,
                    name: derived.derivation_name.clone(),
                    rule: derived.rule.clone(),
                },
                value: None,
            });
        }

        if properties.is_empty() {
            trace!(mapping = %rule.name, channel = %identifier, "Channel produced no properties");
            return None;
        }

        Some(MappedChannel {
            identifier,
            name: channel
                .name
                .clone()
                .unwrap_or_else(|| display_name(channel.category.as_str())),
            category: channel.category,
            device_category: rule.device_category,
            parent_identifier,
            endpoint: expose.endpoint().map(String::from),
            properties,
        })
    }

    /// Runtime bindings for every device value the matching rule binds
    ///
    /// Features are bound as published and settable, flat properties as
    /// published only; the declared direction and `settable` narrow that.
    pub fn runtime_mappings(
        &self,
        expose: &Expose,
        ctx: &ConversionContext<'_>,
    ) -> Vec<RuntimeBinding> {
        let Some(rule) = self.find_mapping(expose, ctx) else {
            return Vec::new();
        };

        let mut bindings = Vec::new();
        for channel in &rule.channels {
            let (channel_identifier, _) = self.channel_identity(channel, expose);
            let mut seen = HashSet::new();
            for bound in bind(channel, expose) {
                if !seen.insert(bound.panel.category) {
                    continue;
                }
                let runtime_access = if bound.from_feature {
                    access::STATE | access::SET
                } else {
                    access::STATE
                };
                let transformer = self.transformer(bound.transformer);
                let (format, ..) = format_of(bound.panel, bound.source, &transformer);
                bindings.push(RuntimeBinding {
                    device_property: bound.device_property.to_string(),
                    sub_key: bound.sub_key.map(String::from),
                    identifier: bound.panel.identifier().to_string(),
                    category: bound.panel.category,
                    channel_identifier: channel_identifier.clone(),
                    channel_category: channel.category,
                    data_type: bound.panel.data_type,
                    permissions: permissions(bound.direction, runtime_access, bound.panel.settable),
                    name: bound
                        .panel
                        .name
                        .clone()
                        .unwrap_or_else(|| display_name(bound.panel.identifier())),
                    unit: bound.panel.unit.clone(),
                    format,
                    transformer,
                });
            }
        }
        bindings
    }

    /// Translate a device value to its canonical form
    ///
    /// Values with no binding, or no expose to bind against, pass through.
    pub fn transform_read(
        &self,
        device_property: &str,
        value: &Value,
        expose: Option<&Expose>,
        ctx: &ConversionContext<'_>,
    ) -> Value {
        let Some(expose) = expose else {
            return value.clone();
        };
        self.runtime_mappings(expose, ctx)
            .into_iter()
            .find(|b| b.device_property == device_property)
            .map(|b| b.read(value))
            .unwrap_or_else(|| value.clone())
    }

    /// Translate a canonical value into what the device expects
    ///
    /// The canonical identifier is matched case-insensitively. Values with no
    /// binding pass through.
    pub fn transform_write(
        &self,
        canonical_property: &str,
        value: &Value,
        expose: Option<&Expose>,
        ctx: &ConversionContext<'_>,
    ) -> Value {
        let Some(expose) = expose else {
            return value.clone();
        };
        let identifier = canonical_property.to_lowercase();
        self.runtime_mappings(expose, ctx)
            .into_iter()
            .find(|b| b.identifier == identifier)
            .map(|b| b.write(value))
            .unwrap_or_else(|| value.clone())
    }
}

impl Converter for ConfigDrivenConverter {
    fn kind(&self) -> &str {
        CONFIG_DRIVEN_KIND
    }

    fn can_handle(&self, expose: &Expose, ctx: &ConversionContext<'_>) -> Handling {
        match self.find_mapping(expose, ctx) {
            Some(rule) => Handling::Supported { priority: rule.priority },
            None => Handling::Unsupported,
        }
    }

    fn convert(
        &self,
        expose: &Expose,
        ctx: &ConversionContext<'_>,
    ) -> ConvertResult<Vec<MappedChannel>> {
        let rule = self
            .find_mapping(expose, ctx)
            .ok_or_else(|| ConvertError::NoMatchingMapping {
                expose_type: expose.expose_type().to_string(),
                expose: describe(expose),
            })?;

        debug!(
            expose = %describe(expose),
            mapping = %rule.name,
            tier = %rule.tier,
            "Matched mapping rule"
        );

        Ok(rule
            .channels
            .iter()
            .filter_map(|channel| self.build_channel(rule, channel, expose))
            .collect())
    }

    fn runtime_bindings(
        &self,
        expose: &Expose,
        ctx: &ConversionContext<'_>,
    ) -> Vec<RuntimeBinding> {
        self.runtime_mappings(expose, ctx)
    }
}
