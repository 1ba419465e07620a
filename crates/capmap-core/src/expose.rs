//! Device capability descriptions ("exposes")
//!
//! Devices describe what they can do as a list of exposes. A *specific*
//! expose (light, switch, cover, ...) bundles a list of features, a *generic*
//! expose is a single flat value (binary, numeric, enum, text, list) and a
//! *composite* groups several sub-features under one device property key.
//!
//! On the wire every expose is one JSON object discriminated by `type`. The
//! tagged model here is converted from and to that flat shape through
//! [`RawExpose`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::access;

/// Errors raised while decoding an expose from its wire shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExposeError {
    #[error("unknown expose type '{0}'")]
    UnknownType(String),

    #[error("{expose_type} expose is missing required field '{field}'")]
    MissingField {
        expose_type: String,
        field: &'static str,
    },
}

/// Kind of a specific (structured) expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecificKind {
    Light,
    Switch,
    Fan,
    Cover,
    Lock,
    Climate,
}

impl SpecificKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecificKind::Light => "light",
            SpecificKind::Switch => "switch",
            SpecificKind::Fan => "fan",
            SpecificKind::Cover => "cover",
            SpecificKind::Lock => "lock",
            SpecificKind::Climate => "climate",
        }
    }
}

impl FromStr for SpecificKind {
    type Err = ExposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(SpecificKind::Light),
            "switch" => Ok(SpecificKind::Switch),
            "fan" => Ok(SpecificKind::Fan),
            "cover" => Ok(SpecificKind::Cover),
            "lock" => Ok(SpecificKind::Lock),
            "climate" => Ok(SpecificKind::Climate),
            other => Err(ExposeError::UnknownType(other.to_string())),
        }
    }
}

impl fmt::Display for SpecificKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value description of a flat expose
#[derive(Debug, Clone, PartialEq)]
pub enum GenericValue {
    Binary {
        value_on: Value,
        value_off: Value,
        value_toggle: Option<Value>,
    },
    Numeric {
        value_min: Option<f64>,
        value_max: Option<f64>,
        value_step: Option<f64>,
    },
    Enum {
        values: Vec<Value>,
    },
    Text,
    List,
}

impl GenericValue {
    /// Wire name of the value type
    pub fn type_name(&self) -> &'static str {
        match self {
            GenericValue::Binary { .. } => "binary",
            GenericValue::Numeric { .. } => "numeric",
            GenericValue::Enum { .. } => "enum",
            GenericValue::Text => "text",
            GenericValue::List => "list",
        }
    }
}

/// A single flat value exposed by a device
#[derive(Debug, Clone, PartialEq)]
pub struct GenericExpose {
    pub name: String,
    /// Key of the value in the device state (defaults to `name`)
    pub property: String,
    pub label: Option<String>,
    pub description: Option<String>,
    /// Zigbee access bitmask (see [`crate::access`])
    pub access: u8,
    pub unit: Option<String>,
    pub endpoint: Option<String>,
    pub value: GenericValue,
}

impl GenericExpose {
    /// Create a flat expose whose property key equals its name
    pub fn new(name: impl Into<String>, value: GenericValue) -> Self {
        let name = name.into();
        Self {
            property: name.clone(),
            name,
            label: None,
            description: None,
            access: access::STATE,
            unit: None,
            endpoint: None,
            value,
        }
    }

    pub fn with_access(mut self, access: u8) -> Self {
        self.access = access;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Enum values as strings, if this is an enum expose
    pub fn enum_values(&self) -> Option<Vec<String>> {
        match &self.value {
            GenericValue::Enum { values } => Some(
                values
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Numeric bounds, if this is a numeric expose
    pub fn numeric_range(&self) -> Option<(Option<f64>, Option<f64>, Option<f64>)> {
        match &self.value {
            GenericValue::Numeric {
                value_min,
                value_max,
                value_step,
            } => Some((*value_min, *value_max, *value_step)),
            _ => None,
        }
    }
}

/// A group of sub-features stored under one device property key
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeFeature {
    pub name: String,
    pub property: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub access: u8,
    pub endpoint: Option<String>,
    pub features: Vec<Feature>,
}

/// A sub-capability bundled inside a specific expose or a composite
#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    Simple(GenericExpose),
    Composite(CompositeFeature),
}

impl Feature {
    pub fn name(&self) -> &str {
        match self {
            Feature::Simple(f) => &f.name,
            Feature::Composite(c) => &c.name,
        }
    }

    pub fn property(&self) -> &str {
        match self {
            Feature::Simple(f) => &f.property,
            Feature::Composite(c) => &c.property,
        }
    }

    pub fn access(&self) -> u8 {
        match self {
            Feature::Simple(f) => f.access,
            Feature::Composite(c) => c.access,
        }
    }

    /// True when either the property key or the name equals `key`
    pub fn is_named(&self, key: &str) -> bool {
        self.property() == key || self.name() == key
    }

    /// Nested features of a composite (empty for simple features)
    pub fn sub_features(&self) -> &[Feature] {
        match self {
            Feature::Simple(_) => &[],
            Feature::Composite(c) => &c.features,
        }
    }

    pub fn as_simple(&self) -> Option<&GenericExpose> {
        match self {
            Feature::Simple(f) => Some(f),
            Feature::Composite(_) => None,
        }
    }
}

/// A structured expose bundling several features
#[derive(Debug, Clone, PartialEq)]
pub struct SpecificExpose {
    pub kind: SpecificKind,
    pub endpoint: Option<String>,
    pub features: Vec<Feature>,
}

/// A device capability as reported by the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawExpose", into = "RawExpose")]
pub enum Expose {
    Specific(SpecificExpose),
    Generic(GenericExpose),
    Composite(CompositeFeature),
}

impl Expose {
    /// Wire type name (`light`, `numeric`, `composite`, ...)
    pub fn expose_type(&self) -> &'static str {
        match self {
            Expose::Specific(s) => s.kind.as_str(),
            Expose::Generic(g) => g.value.type_name(),
            Expose::Composite(_) => "composite",
        }
    }

    /// Device property key of a flat expose; specific exposes have none
    pub fn property_name(&self) -> Option<&str> {
        match self {
            Expose::Specific(_) => None,
            Expose::Generic(g) => Some(&g.property),
            Expose::Composite(c) => Some(&c.property),
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Expose::Specific(s) => s.endpoint.as_deref(),
            Expose::Generic(g) => g.endpoint.as_deref(),
            Expose::Composite(c) => c.endpoint.as_deref(),
        }
    }

    /// Access bitmask; structured exposes report plain STATE
    pub fn access(&self) -> u8 {
        match self {
            Expose::Specific(_) => access::STATE,
            Expose::Generic(g) => g.access,
            Expose::Composite(c) => c.access,
        }
    }

    pub fn is_specific(&self) -> bool {
        matches!(self, Expose::Specific(_))
    }

    /// Features of a structured expose or composite
    pub fn features(&self) -> &[Feature] {
        match self {
            Expose::Specific(s) => &s.features,
            Expose::Generic(_) => &[],
            Expose::Composite(c) => &c.features,
        }
    }

    /// Feature keys used for `has_features` matching (specific exposes only)
    pub fn feature_names(&self) -> Option<Vec<&str>> {
        match self {
            Expose::Specific(s) => Some(s.features.iter().map(|f| f.property()).collect()),
            _ => None,
        }
    }

    /// The expose as a generic leaf, if it is one
    pub fn as_generic(&self) -> Option<&GenericExpose> {
        match self {
            Expose::Generic(g) => Some(g),
            _ => None,
        }
    }
}

/// Flat wire shape of an expose or feature
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawExpose {
    #[serde(rename = "type")]
    pub expose_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_on: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_off: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_toggle: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<RawExpose>>,
}

impl RawExpose {
    fn into_generic(self, value: GenericValue) -> Result<GenericExpose, ExposeError> {
        let name = self
            .name
            .or_else(|| self.property.clone())
            .ok_or_else(|| ExposeError::MissingField {
                expose_type: self.expose_type.clone(),
                field: "name",
            })?;
        Ok(GenericExpose {
            property: self.property.unwrap_or_else(|| name.clone()),
            name,
            label: self.label,
            description: self.description,
            access: self.access.unwrap_or(access::STATE),
            unit: self.unit,
            endpoint: self.endpoint,
            value,
        })
    }

    fn into_composite(self) -> Result<CompositeFeature, ExposeError> {
        let name = self
            .name
            .or_else(|| self.property.clone())
            .ok_or_else(|| ExposeError::MissingField {
                expose_type: "composite".into(),
                field: "name",
            })?;
        let features = self
            .features
            .unwrap_or_default()
            .into_iter()
            .map(Feature::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompositeFeature {
            property: self.property.unwrap_or_else(|| name.clone()),
            name,
            label: self.label,
            description: self.description,
            access: self.access.unwrap_or(access::STATE),
            endpoint: self.endpoint,
            features,
        })
    }

    fn generic_value(&self) -> Result<Option<GenericValue>, ExposeError> {
        let missing = |field| ExposeError::MissingField {
            expose_type: self.expose_type.clone(),
            field,
        };
        let value = match self.expose_type.as_str() {
            "binary" => GenericValue::Binary {
                value_on: self.value_on.clone().ok_or_else(|| missing("value_on"))?,
                value_off: self.value_off.clone().ok_or_else(|| missing("value_off"))?,
                value_toggle: self.value_toggle.clone(),
            },
            "numeric" => GenericValue::Numeric {
                value_min: self.value_min,
                value_max: self.value_max,
                value_step: self.value_step,
            },
            "enum" => GenericValue::Enum {
                values: self.values.clone().unwrap_or_default(),
            },
            "text" => GenericValue::Text,
            "list" => GenericValue::List,
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn from_generic(g: GenericExpose) -> Self {
        let mut raw = RawExpose {
            expose_type: g.value.type_name().to_string(),
            name: Some(g.name),
            property: Some(g.property),
            label: g.label,
            description: g.description,
            access: Some(g.access),
            unit: g.unit,
            endpoint: g.endpoint,
            ..Default::default()
        };
        match g.value {
            GenericValue::Binary {
                value_on,
                value_off,
                value_toggle,
            } => {
                raw.value_on = Some(value_on);
                raw.value_off = Some(value_off);
                raw.value_toggle = value_toggle;
            }
            GenericValue::Numeric {
                value_min,
                value_max,
                value_step,
            } => {
                raw.value_min = value_min;
                raw.value_max = value_max;
                raw.value_step = value_step;
            }
            GenericValue::Enum { values } => raw.values = Some(values),
            GenericValue::Text | GenericValue::List => {}
        }
        raw
    }

    fn from_composite(c: CompositeFeature) -> Self {
        RawExpose {
            expose_type: "composite".into(),
            name: Some(c.name),
            property: Some(c.property),
            label: c.label,
            description: c.description,
            access: Some(c.access),
            endpoint: c.endpoint,
            features: Some(c.features.into_iter().map(RawExpose::from).collect()),
            ..Default::default()
        }
    }
}

impl TryFrom<RawExpose> for Feature {
    type Error = ExposeError;

    fn try_from(raw: RawExpose) -> Result<Self, Self::Error> {
        if raw.expose_type == "composite" {
            return raw.into_composite().map(Feature::Composite);
        }
        match raw.generic_value()? {
            Some(value) => raw.into_generic(value).map(Feature::Simple),
            None => Err(ExposeError::UnknownType(raw.expose_type)),
        }
    }
}

impl From<Feature> for RawExpose {
    fn from(feature: Feature) -> Self {
        match feature {
            Feature::Simple(g) => RawExpose::from_generic(g),
            Feature::Composite(c) => RawExpose::from_composite(c),
        }
    }
}

impl TryFrom<RawExpose> for Expose {
    type Error = ExposeError;

    fn try_from(raw: RawExpose) -> Result<Self, Self::Error> {
        if let Ok(kind) = raw.expose_type.parse::<SpecificKind>() {
            let features = raw
                .features
                .unwrap_or_default()
                .into_iter()
                .map(Feature::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Expose::Specific(SpecificExpose {
                kind,
                endpoint: raw.endpoint,
                features,
            }));
        }
        match Feature::try_from(raw)? {
            Feature::Simple(g) => Ok(Expose::Generic(g)),
            Feature::Composite(c) => Ok(Expose::Composite(c)),
        }
    }
}

impl From<Expose> for RawExpose {
    fn from(expose: Expose) -> Self {
        match expose {
            Expose::Specific(s) => RawExpose {
                expose_type: s.kind.as_str().to_string(),
                endpoint: s.endpoint,
                features: Some(s.features.into_iter().map(RawExpose::from).collect()),
                ..Default::default()
            },
            Expose::Generic(g) => RawExpose::from_generic(g),
            Expose::Composite(c) => RawExpose::from_composite(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_specific_light() {
        let expose: Expose = serde_json::from_value(json!({
            "type": "light",
            "endpoint": "l1",
            "features": [
                {"type": "binary", "name": "state", "property": "state", "access": 7,
                 "value_on": "ON", "value_off": "OFF"},
                {"type": "numeric", "name": "brightness", "property": "brightness", "access": 7,
                 "value_min": 0, "value_max": 254},
                {"type": "composite", "name": "color_hs", "property": "color", "access": 7,
                 "features": [
                    {"type": "numeric", "name": "hue", "property": "hue", "access": 7},
                    {"type": "numeric", "name": "saturation", "property": "saturation", "access": 7}
                 ]}
            ]
        }))
        .unwrap();

        assert!(expose.is_specific());
        assert_eq!(expose.expose_type(), "light");
        assert_eq!(expose.endpoint(), Some("l1"));
        assert_eq!(expose.property_name(), None);
        assert_eq!(
            expose.feature_names(),
            Some(vec!["state", "brightness", "color"])
        );

        let color = &expose.features()[2];
        assert!(color.is_named("color_hs"));
        assert_eq!(color.sub_features().len(), 2);
    }

    #[test]
    fn test_parse_generic_numeric() {
        let expose: Expose = serde_json::from_value(json!({
            "type": "numeric", "name": "battery", "access": 1, "unit": "%",
            "value_min": 0, "value_max": 100
        }))
        .unwrap();

        let generic = expose.as_generic().unwrap();
        assert_eq!(generic.property, "battery");
        assert_eq!(generic.unit.as_deref(), Some("%"));
        assert_eq!(generic.numeric_range(), Some((Some(0.0), Some(100.0), None)));
        assert_eq!(expose.feature_names(), None);
    }

    #[test]
    fn test_access_defaults_to_state() {
        let expose: Expose =
            serde_json::from_value(json!({"type": "text", "name": "action"})).unwrap();
        assert_eq!(expose.access(), access::STATE);
    }

    #[test]
    fn test_binary_requires_values() {
        let err = serde_json::from_value::<Expose>(json!({"type": "binary", "name": "contact"}))
            .unwrap_err();
        assert!(err.to_string().contains("value_on"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = serde_json::from_value::<Expose>(json!({"type": "hologram", "name": "x"}))
            .unwrap_err();
        assert!(err.to_string().contains("unknown expose type 'hologram'"));
    }

    #[test]
    fn test_serialize_back_to_wire_shape() {
        let expose = Expose::Generic(
            GenericExpose::new(
                "system_mode",
                GenericValue::Enum {
                    values: vec![json!("off"), json!("heat")],
                },
            )
            .with_access(access::STATE | access::SET),
        );

        let wire = serde_json::to_value(&expose).unwrap();
        assert_eq!(wire["type"], "enum");
        assert_eq!(wire["property"], "system_mode");
        assert_eq!(wire["access"], 3);
        assert_eq!(wire["values"], json!(["off", "heat"]));
        assert!(wire.get("features").is_none());
    }
}
