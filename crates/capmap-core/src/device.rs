//! Device identity and live state

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flat map of the device's current state, keyed by device property
pub type StateMap = Map<String, Value>;

/// Identity of the physical device whose exposes are being mapped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, alias = "vendor", skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ieee_address: Option<String>,
}

impl DeviceInfo {
    pub fn new(model: impl Into<String>, manufacturer: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            manufacturer: Some(manufacturer.into()),
            ..Default::default()
        }
    }

    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }
}
