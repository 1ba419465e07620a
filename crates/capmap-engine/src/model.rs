//! Mapping output
//!
//! Channels and properties produced by a conversion are plain data owned by
//! the caller. Every property records where its value comes from.

use capmap_core::{
    access, ChannelCategory, DataType, DeviceCategory, Direction, Permission, PropertyCategory,
};
use capmap_mapping::PropertyFormat;
use capmap_transform::DerivationRule;
use serde::Serialize;
use serde_json::Value;

/// Where a mapped property's value comes from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyOrigin {
    /// A device expose or feature
    Expose,
    /// A fixed value declared by the mapping rule
    Static { value: Value },
    /// Computed from another canonical property of the channel
    Derived {
        source: PropertyCategory,
        /// Registered derivation name, when referenced by name
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        rule: DerivationRule,
    },
    /// Supplied because the channel category requires it
    Virtual { value: Value },
}

/// A canonical property ready to be persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedProperty {
    /// Canonical identifier (the category name)
    pub identifier: String,
    pub category: PropertyCategory,
    pub channel_category: ChannelCategory,
    pub name: String,
    pub data_type: DataType,
    pub permissions: Vec<Permission>,
    /// Device state key the property is bound to
    pub device_property: String,
    /// Key inside a composite device value (`hue` inside `color`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<PropertyFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    pub queryable: bool,
    pub origin: PropertyOrigin,
    /// Current canonical value, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl MappedProperty {
    pub fn can_read(&self) -> bool {
        self.permissions.iter().any(Permission::can_read)
    }

    pub fn can_write(&self) -> bool {
        self.permissions.iter().any(Permission::can_write)
    }
}

/// A canonical channel ready to be persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedChannel {
    pub identifier: String,
    pub name: String,
    pub category: ChannelCategory,
    /// Category of the device according to the rule that created the channel
    pub device_category: DeviceCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub properties: Vec<MappedProperty>,
}

impl MappedChannel {
    pub fn property(&self, category: PropertyCategory) -> Option<&MappedProperty> {
        self.properties.iter().find(|p| p.category == category)
    }

    pub fn has_property(&self, category: PropertyCategory) -> bool {
        self.property(category).is_some()
    }

    /// Append properties whose identifier is not present yet
    pub fn merge(&mut self, other: MappedChannel) {
        for property in other.properties {
            if self.has_property(property.category) {
                tracing::debug!(
                    channel = %self.identifier,
                    property = %property.identifier,
                    "Property already mapped, skipping"
                );
                continue;
            }
            self.properties.push(property);
        }
    }
}

/// Something the caller should know about a mapping pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingWarning {
    /// A required canonical property has no source
    MissingRequiredProperty {
        channel: String,
        channel_category: ChannelCategory,
        property: PropertyCategory,
    },
    /// A converter failed on one expose; the expose is left unmapped
    ConverterFailed {
        converter: String,
        expose: String,
        error: String,
    },
}

/// Result of mapping a whole device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingReport {
    /// Category of the device, taken from the first mapped channel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_category: Option<DeviceCategory>,
    pub channels: Vec<MappedChannel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<MappingWarning>,
}

/// Permissions of a binding
///
/// Explicit directions win. A bidirectional binding follows the access
/// bitmask: readable and settable is `rw`, settable only is `wo`, anything
/// else `ro`. A property that is not settable never receives write
/// permission.
pub fn permissions(direction: Direction, access_bits: u8, settable: bool) -> Vec<Permission> {
    let permission = match direction {
        Direction::ReadOnly => Permission::ReadOnly,
        Direction::WriteOnly => Permission::WriteOnly,
        Direction::Bidirectional => {
            let bits = if access_bits == 0 { access::STATE } else { access_bits };
            let readable = bits & (access::STATE | access::GET) != 0;
            let writable = bits & access::SET != 0;
            match (readable, writable) {
                (true, true) => Permission::ReadWrite,
                (false, true) => Permission::WriteOnly,
                _ => Permission::ReadOnly,
            }
        }
    };

    let permission = match permission {
        Permission::ReadWrite | Permission::WriteOnly if !settable => Permission::ReadOnly,
        other => other,
    };
    vec![permission]
}

/// Expand a channel identifier template for an endpoint
///
/// `{endpoint}` is substituted when present; otherwise `_<endpoint>` is
/// appended. Without an endpoint the placeholder and its separator are
/// removed.
pub fn resolve_identifier(template: &str, endpoint: Option<&str>) -> String {
    const PLACEHOLDER: &str = "{endpoint}";

    match endpoint {
        Some(endpoint) if template.contains(PLACEHOLDER) => template.replace(PLACEHOLDER, endpoint),
        Some(endpoint) => format!("{template}_{endpoint}"),
        None => template
            .replace(&format!("_{PLACEHOLDER}"), "")
            .replace(PLACEHOLDER, ""),
    }
}

/// Human readable name for an identifier (`color_temperature` -> `Color temperature`)
pub fn display_name(identifier: &str) -> String {
    let words = identifier.replace('_', " ");
    let mut chars = words.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
