//! Mapping engine facade
//!
//! Owns the rule loader and answers every request against a single
//! snapshot of the loaded rules, so a concurrent reload never mixes two
//! rule sets in one answer.

use capmap_core::{DeviceInfo, Expose, StateMap};
use capmap_mapping::{LoaderConfig, MappingLoader, MappingResult, MappingSet};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::mapper::ExposesMapper;
use crate::model::{MappedChannel, MappingReport};
use crate::runtime::RuntimeBinding;

pub struct MappingEngine {
    loader: MappingLoader,
}

impl MappingEngine {
    /// Create an engine and load every tier
    pub fn new(config: LoaderConfig) -> MappingResult<Self> {
        let engine = Self::from_loader(MappingLoader::new(config)?);
        let set = engine.loader.load_all();
        info!(
            mappings = set.len(),
            generation = set.generation(),
            failures = set.has_failures(),
            "Mapping engine ready"
        );
        Ok(engine)
    }

    /// Wrap an existing loader without loading
    pub fn from_loader(loader: MappingLoader) -> Self {
        Self { loader }
    }

    pub fn loader(&self) -> &MappingLoader {
        &self.loader
    }

    /// Rebuild the rule set and publish it
    pub fn reload(&self) -> Arc<MappingSet> {
        self.loader.reload()
    }

    /// Rule set currently in effect
    pub fn snapshot(&self) -> Arc<MappingSet> {
        self.loader.current()
    }

    /// Mapper bound to the current snapshot
    pub fn mapper(&self) -> ExposesMapper {
        ExposesMapper::new(self.snapshot())
    }

    pub fn map_exposes(
        &self,
        exposes: &[Expose],
        device_info: Option<&DeviceInfo>,
    ) -> Vec<MappedChannel> {
        self.mapper().map_exposes(exposes, device_info)
    }

    pub fn map_device(
        &self,
        exposes: &[Expose],
        device_info: Option<&DeviceInfo>,
        state: &StateMap,
    ) -> MappingReport {
        self.mapper().map_device(exposes, device_info, state)
    }

    pub fn runtime_mappings(
        &self,
        exposes: &[Expose],
        device_info: Option<&DeviceInfo>,
    ) -> Vec<RuntimeBinding> {
        self.mapper().runtime_mappings(exposes, device_info)
    }

    /// Translate a device state value to its canonical form
    ///
    /// Device keys with no binding pass through unchanged.
    #[instrument(skip(self, exposes, device_info, value))]
    pub fn transform_read(
        &self,
        exposes: &[Expose],
        device_info: Option<&DeviceInfo>,
        device_property: &str,
        value: &Value,
    ) -> Value {
        self.runtime_mappings(exposes, device_info)
            .into_iter()
            .find(|b| b.device_property == device_property)
            .map(|b| b.read(value))
            .unwrap_or_else(|| value.clone())
    }

    /// Translate a canonical value to what the device expects
    ///
    /// The canonical identifier is matched case-insensitively; identifiers
    /// with no binding pass through unchanged.
    #[instrument(skip(self, exposes, device_info, value))]
    pub fn transform_write(
        &self,
        exposes: &[Expose],
        device_info: Option<&DeviceInfo>,
        canonical_property: &str,
        value: &Value,
    ) -> Value {
        let identifier = canonical_property.to_lowercase();
        self.runtime_mappings(exposes, device_info)
            .into_iter()
            .find(|b| b.identifier == identifier)
            .map(|b| b.write(value))
            .unwrap_or_else(|| value.clone())
    }
}
