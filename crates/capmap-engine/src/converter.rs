//! Converter dispatch
//!
//! A [`Converter`] turns one expose into channels. The [`ConverterRegistry`]
//! picks the highest-priority converter willing to handle each expose and
//! merges the produced channels by identifier.

use capmap_core::{DeviceInfo, Expose};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::error::ConvertResult;
use crate::model::{MappedChannel, MappingWarning};
use crate::runtime::RuntimeBinding;

/// Whether a converter accepts an expose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handling {
    Supported { priority: i64 },
    Unsupported,
}

/// Everything a converter may consult about the device being mapped
#[derive(Debug)]
pub struct ConversionContext<'a> {
    /// Every expose of the device
    pub exposes: &'a [Expose],
    pub device_info: Option<&'a DeviceInfo>,
    consumed: HashSet<String>,
}

impl<'a> ConversionContext<'a> {
    pub fn new(exposes: &'a [Expose], device_info: Option<&'a DeviceInfo>) -> Self {
        Self {
            exposes,
            device_info,
            consumed: HashSet::new(),
        }
    }

    /// Property keys of every flat expose on the device
    pub fn device_properties(&self) -> Vec<&'a str> {
        self.exposes.iter().filter_map(Expose::property_name).collect()
    }

    /// The device carries more than one expose of this expose's type
    pub fn is_list(&self, expose: &Expose) -> bool {
        let expose_type = expose.expose_type();
        self.exposes
            .iter()
            .filter(|e| e.expose_type() == expose_type)
            .take(2)
            .count()
            > 1
    }

    /// Record a device property key as produced
    pub fn consume(&mut self, device_property: impl Into<String>) {
        self.consumed.insert(device_property.into());
    }

    pub fn is_consumed(&self, device_property: &str) -> bool {
        self.consumed.contains(device_property)
    }
}

/// Turns exposes into canonical channels
pub trait Converter: Send + Sync {
    /// Identifier used to de-duplicate registrations
    fn kind(&self) -> &str;

    fn can_handle(&self, expose: &Expose, ctx: &ConversionContext<'_>) -> Handling;

    fn convert(
        &self,
        expose: &Expose,
        ctx: &ConversionContext<'_>,
    ) -> ConvertResult<Vec<MappedChannel>>;

    /// Device-key bindings for live state; converters without runtime
    /// transformation return none
    fn runtime_bindings(
        &self,
        _expose: &Expose,
        _ctx: &ConversionContext<'_>,
    ) -> Vec<RuntimeBinding> {
        Vec::new()
    }
}

/// Short description of an expose for logs and warnings
pub fn describe(expose: &Expose) -> String {
    let name = expose.property_name().unwrap_or(expose.expose_type());
    match expose.endpoint() {
        Some(endpoint) => format!("{name}@{endpoint}"),
        None => name.to_string(),
    }
}

/// Registered converters, keyed by kind
#[derive(Default)]
pub struct ConverterRegistry {
    converters: IndexMap<String, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter; a converter of the same kind is replaced
    pub fn register(&mut self, converter: Arc<dyn Converter>) {
        let kind = converter.kind().to_string();
        if self.converters.insert(kind.clone(), converter).is_some() {
            warn!(converter = %kind, "Converter replaced by a later registration");
        } else {
            debug!(converter = %kind, "Registered converter");
        }
    }

    pub fn register_all(&mut self, converters: impl IntoIterator<Item = Arc<dyn Converter>>) {
        for converter in converters {
            self.register(converter);
        }
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// Converters accepting the expose, highest priority first
    ///
    /// Equal priorities keep registration order.
    pub fn find_converters(
        &self,
        expose: &Expose,
        ctx: &ConversionContext<'_>,
    ) -> Vec<(Arc<dyn Converter>, i64)> {
        let mut candidates: Vec<_> = self
            .converters
            .values()
            .filter_map(|converter| match converter.can_handle(expose, ctx) {
                Handling::Supported { priority } => Some((Arc::clone(converter), priority)),
                Handling::Unsupported => None,
            })
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1));
        candidates
    }

    /// Convert a batch of exposes into `channels`
    ///
    /// Flat exposes whose property key an earlier conversion already
    /// produced are skipped. A failing converter leaves its expose unmapped
    /// and is reported in the returned warnings.
    pub fn convert_all(
        &self,
        exposes: &[&Expose],
        ctx: &mut ConversionContext<'_>,
        channels: &mut Vec<MappedChannel>,
    ) -> Vec<MappingWarning> {
        let mut warnings = Vec::new();

        for expose in exposes {
            if let Some(key) = expose.property_name() {
                if ctx.is_consumed(key) {
                    debug!(property = key, "Expose already claimed, skipping");
                    continue;
                }
            }

            let Some((converter, priority)) =
                self.find_converters(expose, ctx).into_iter().next()
            else {
                trace!(expose = %describe(expose), "No converter for expose");
                continue;
            };

            match converter.convert(expose, ctx) {
                Ok(produced) => {
                    trace!(
                        expose = %describe(expose),
                        converter = converter.kind(),
                        priority,
                        channels = produced.len(),
                        "Converted expose"
                    );
                    for channel in produced {
                        for property in &channel.properties {
                            ctx.consume(property.device_property.clone());
                        }
                        merge_channel(channels, channel);
                    }
                }
                Err(e) => {
                    warn!(
                        expose = %describe(expose),
                        converter = converter.kind(),
                        error = %e,
                        "Converter failed, expose left unmapped"
                    );
                    warnings.push(MappingWarning::ConverterFailed {
                        converter: converter.kind().to_string(),
                        expose: describe(expose),
                        error: e.to_string(),
                    });
                }
            }
        }

        warnings
    }

    /// Runtime bindings from the converter that would handle the expose
    pub fn runtime_bindings(
        &self,
        expose: &Expose,
        ctx: &ConversionContext<'_>,
    ) -> Vec<RuntimeBinding> {
        self.find_converters(expose, ctx)
            .into_iter()
            .next()
            .map(|(converter, _)| converter.runtime_bindings(expose, ctx))
            .unwrap_or_default()
    }
}

/// Merge a channel into the accumulator by identifier
pub fn merge_channel(channels: &mut Vec<MappedChannel>, channel: MappedChannel) {
    match channels.iter_mut().find(|c| c.identifier == channel.identifier) {
        Some(existing) => existing.merge(channel),
        None => channels.push(channel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;
    use capmap_core::{ChannelCategory, DeviceCategory, GenericExpose, GenericValue};

    struct Fixed {
        kind: &'static str,
        priority: Option<i64>,
        channel: &'static str,
        fail: bool,
    }

    impl Converter for Fixed {
        fn kind(&self) -> &str {
            self.kind
        }

        fn can_handle(&self, _expose: &Expose, _ctx: &ConversionContext<'_>) -> Handling {
            match self.priority {
                Some(priority) => Handling::Supported { priority },
                None => Handling::Unsupported,
            }
        }

        fn convert(
            &self,
            expose: &Expose,
            _ctx: &ConversionContext<'_>,
        ) -> ConvertResult<Vec<MappedChannel>> {
            if self.fail {
                return Err(ConvertError::Unsupported {
                    expose_type: expose.expose_type().into(),
                    expose: describe(expose),
                });
            }
            Ok(vec![MappedChannel {
                identifier: self.channel.into(),
                name: self.channel.into(),
                category: ChannelCategory::Generic,
                device_category: DeviceCategory::Generic,
                parent_identifier: None,
                endpoint: None,
                properties: vec![],
            }])
        }
    }

    fn fixed(
        kind: &'static str,
        priority: Option<i64>,
        channel: &'static str,
    ) -> Arc<dyn Converter> {
        Arc::new(Fixed {
            kind,
            priority,
            channel,
            fail: false,
        })
    }

    fn numeric(name: &str) -> Expose {
        Expose::Generic(GenericExpose::new(
            name,
            GenericValue::Numeric {
                value_min: None,
                value_max: None,
                value_step: None,
            },
        ))
    }

    #[test]
    fn test_find_converters_orders_by_priority() {
        let mut registry = ConverterRegistry::new();
        registry.register_all([
            fixed("low", Some(10), "low"),
            fixed("never", None, "never"),
            fixed("high", Some(90), "high"),
            fixed("also_high", Some(90), "also_high"),
        ]);

        let exposes = [numeric("temperature")];
        let ctx = ConversionContext::new(&exposes, None);
        let kinds: Vec<_> = registry
            .find_converters(&exposes[0], &ctx)
            .iter()
            .map(|(c, _)| c.kind().to_string())
            .collect();
        assert_eq!(kinds, vec!["high", "also_high", "low"]);
    }

    #[test]
    fn test_register_replaces_same_kind() {
        let mut registry = ConverterRegistry::new();
        registry.register(fixed("config", Some(10), "first"));
        registry.register(fixed("config", Some(10), "second"));
        assert_eq!(registry.len(), 1);

        let exposes = [numeric("temperature")];
        let mut ctx = ConversionContext::new(&exposes, None);
        let mut channels = Vec::new();
        let refs: Vec<&Expose> = exposes.iter().collect();
        registry.convert_all(&refs, &mut ctx, &mut channels);
        assert_eq!(channels[0].identifier, "second");
    }

    #[test]
    fn test_failure_is_isolated() {
        let mut registry = ConverterRegistry::new();
        registry.register(Arc::new(Fixed {
            kind: "broken",
            priority: Some(10),
            channel: "broken",
            fail: true,
        }));

        let exposes = [numeric("temperature"), numeric("humidity")];
        let mut ctx = ConversionContext::new(&exposes, None);
        let mut channels = Vec::new();
        let refs: Vec<&Expose> = exposes.iter().collect();
        let warnings = registry.convert_all(&refs, &mut ctx, &mut channels);

        assert!(channels.is_empty());
        assert_eq!(warnings.len(), 2);
        assert!(matches!(
            &warnings[0],
            MappingWarning::ConverterFailed { expose, .. } if expose == "temperature"
        ));
    }

    #[test]
    fn test_context_helpers() {
        let exposes = [numeric("temperature"), numeric("humidity"), numeric("battery")];
        let mut ctx = ConversionContext::new(&exposes, None);
        assert_eq!(ctx.device_properties(), vec!["temperature", "humidity", "battery"]);
        assert!(ctx.is_list(&exposes[0]));

        ctx.consume("battery");
        assert!(ctx.is_consumed("battery"));
        assert!(!ctx.is_consumed("temperature"));
    }
}
