//! Mapping file structure
//!
//! These types mirror the YAML documents on disk. Category and data type
//! names are kept as strings here; [`crate::resolve`] turns them into the
//! closed canonical enums.

use capmap_core::Direction;
use capmap_transform::{DerivationRule, InlineTransform, NamedDerivation};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One mapping file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingFile {
    pub version: String,

    /// Named transformers registered before this file's mappings resolve
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub transformers: IndexMap<String, InlineTransform>,

    /// Named derivations registered before this file's mappings resolve
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub derivations: IndexMap<String, NamedDerivation>,

    #[serde(default)]
    pub mappings: Vec<MappingDefinitionConfig>,

    /// Virtual property definitions keyed by channel category name
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub virtual_properties: IndexMap<String, Vec<VirtualPropertyConfig>>,
}

/// One mapping rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingDefinitionConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Added to the tier base; defaults to 100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(rename = "match")]
    pub match_condition: MatchConfig,
    pub device_category: String,
    pub channels: Vec<ChannelConfig>,
}

/// Match condition as written in a file
///
/// Leaf predicates present in the same object are combined with `all_of`
/// and `any_of` by AND.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<MatchConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<MatchConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expose_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_features: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_property: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_list: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// May contain an `{endpoint}` placeholder
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<FeatureConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_properties: Vec<StaticPropertyConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_properties: Vec<DerivedPropertyConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    #[default]
    Simple,
    Composite,
}

/// Binding of a feature inside a structured expose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(alias = "z2m_feature")]
    pub device_feature: String,
    #[serde(default, rename = "type")]
    pub feature_type: FeatureType,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel: Option<PanelPropertyConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<InlineTransform>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested_features: Vec<FeatureConfig>,
}

/// Binding of a flat expose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyConfig {
    #[serde(alias = "z2m_property")]
    pub device_property: String,
    #[serde(default)]
    pub direction: Direction,
    pub panel: PanelPropertyConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<InlineTransform>,
}

/// Canonical side of a binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelPropertyConfig {
    /// Canonical property category name
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<PropertyFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default = "default_true")]
    pub settable: bool,
    #[serde(default = "default_true")]
    pub queryable: bool,
}

fn default_true() -> bool {
    true
}

/// Enum values or a numeric `[min, max]` range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyFormat {
    Range([f64; 2]),
    Values(Vec<Value>),
}

impl PropertyFormat {
    pub fn range(&self) -> Option<(f64, f64)> {
        match self {
            PropertyFormat::Range([min, max]) => Some((*min, *max)),
            PropertyFormat::Values(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticPropertyConfig {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub data_type: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<PropertyFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Reference to a registered derivation, or an inline rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DerivationRef {
    Named(String),
    Inline(DerivationRule),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedPropertyConfig {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub data_type: String,
    /// Canonical property of the same channel the value is derived from
    pub source_property: String,
    #[serde(alias = "derive")]
    pub derivation: DerivationRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<PropertyFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// A property this engine supplies when a device lacks it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualPropertyConfig {
    pub property_category: String,
    pub data_type: String,
    #[serde(default = "default_permissions")]
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<PropertyFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation: Option<DerivationRef>,
    /// Device state key the derivation reads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_property: Option<String>,
}

fn default_permissions() -> Vec<String> {
    vec!["ro".to_string()]
}
