//! Resolved mapping rules
//!
//! The in-memory form of a mapping rule after every category name has been
//! resolved to its canonical enum and every derivation reference has been
//! bound to a typed rule.

use capmap_core::{
    ChannelCategory, DataType, DeviceCategory, Direction, Permission, PropertyCategory,
};
use capmap_transform::{DerivationRule, TransformerDefinition};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::condition::MatchCondition;
use crate::file::PropertyFormat;

/// Priority tier a mapping file was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Built-in generic definitions
    Generic,
    /// Built-in device-specific definitions
    DeviceSpecific,
    /// User-provided definitions
    User,
}

impl Tier {
    /// Base added to every declared priority in this tier
    pub fn base_priority(&self) -> i64 {
        match self {
            Tier::Generic => 0,
            Tier::DeviceSpecific => 500,
            Tier::User => 1000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Generic => "generic",
            Tier::DeviceSpecific => "device_specific",
            Tier::User => "user",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared priority when a rule omits one
pub const DEFAULT_PRIORITY: i64 = 100;

/// Which transformer a binding uses
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TransformerRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline: Option<TransformerDefinition>,
}

impl TransformerRef {
    pub fn is_none(&self) -> bool {
        self.name.is_none() && self.inline.is_none()
    }
}

/// Canonical side of a binding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPanelProperty {
    pub category: PropertyCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub data_type: DataType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<PropertyFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub settable: bool,
    pub queryable: bool,
}

impl ResolvedPanelProperty {
    /// Canonical property identifier
    pub fn identifier(&self) -> &'static str {
        self.category.as_str()
    }
}

/// What a feature binding produces
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureBinding {
    /// One canonical property
    Simple {
        panel: ResolvedPanelProperty,
        transformer: TransformerRef,
    },
    /// Nested features resolved against the feature's own sub-features
    Composite { nested: Vec<ResolvedFeature> },
}

/// Binding of a feature inside a structured expose
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedFeature {
    pub device_feature: String,
    pub direction: Direction,
    pub binding: FeatureBinding,
}

/// Binding of a flat expose
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedProperty {
    pub device_property: String,
    pub direction: Direction,
    pub panel: ResolvedPanelProperty,
    pub transformer: TransformerRef,
}

/// A property with a fixed value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedStaticProperty {
    pub category: PropertyCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub data_type: DataType,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<PropertyFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// A property computed from another canonical property of the same channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDerivedProperty {
    pub category: PropertyCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub data_type: DataType,
    pub source: PropertyCategory,
    /// Registered name, when the rule was referenced by name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivation_name: Option<String>,
    pub rule: DerivationRule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<PropertyFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedChannel {
    /// May contain an `{endpoint}` placeholder
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub category: ChannelCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_identifier: Option<String>,
    pub features: Vec<ResolvedFeature>,
    pub properties: Vec<ResolvedProperty>,
    pub static_properties: Vec<ResolvedStaticProperty>,
    pub derived_properties: Vec<ResolvedDerivedProperty>,
}

/// A loaded mapping rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMapping {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tier base plus declared priority
    pub priority: i64,
    pub tier: Tier,
    /// File the rule came from
    pub source: String,
    #[serde(rename = "match")]
    pub match_condition: MatchCondition,
    pub device_category: DeviceCategory,
    pub channels: Vec<ResolvedChannel>,
}

impl ResolvedMapping {
    /// Transformer names referenced anywhere in this rule
    pub fn transformer_names(&self) -> Vec<&str> {
        fn collect<'a>(feature: &'a ResolvedFeature, out: &mut Vec<&'a str>) {
            match &feature.binding {
                FeatureBinding::Simple { transformer, .. } => {
                    out.extend(transformer.name.as_deref())
                }
                FeatureBinding::Composite { nested } => {
                    for f in nested {
                        collect(f, out);
                    }
                }
            }
        }

        let mut names = Vec::new();
        for channel in &self.channels {
            for feature in &channel.features {
                collect(feature, &mut names);
            }
            for property in &channel.properties {
                names.extend(property.transformer.name.as_deref());
            }
        }
        names
    }
}

/// How a virtual property obtains its value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VirtualKind {
    Static { value: Value },
    Derived {
        rule: DerivationRule,
        /// Device state key read by the rule
        #[serde(skip_serializing_if = "Option::is_none")]
        source_property: Option<String>,
    },
}

/// A canonical property supplied when a channel lacks it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualPropertyDefinition {
    pub category: PropertyCategory,
    pub data_type: DataType,
    pub permissions: Vec<Permission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<PropertyFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub kind: VirtualKind,
}
