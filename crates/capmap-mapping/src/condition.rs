//! Match conditions
//!
//! A mapping rule applies to an expose when its condition tree evaluates
//! true against a [`MatchQuery`] describing the expose and its device.

use capmap_core::DeviceInfo;
use serde::Serialize;

use crate::file::MatchConfig;

/// Leaf predicates; every present predicate must hold
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MatchPredicates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expose_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_features: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_property: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_list: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Stored lowercased
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
}

impl MatchPredicates {
    fn is_empty(&self) -> bool {
        *self == MatchPredicates::default()
    }

    fn matches(&self, query: &MatchQuery<'_>) -> bool {
        if let Some(expose_type) = &self.expose_type {
            if expose_type != query.expose_type {
                return false;
            }
        }

        if let Some(property) = &self.property {
            if query.property != Some(property.as_str()) {
                return false;
            }
        }

        if let Some(required) = &self.has_features {
            match query.features {
                Some(features) => {
                    if !required.iter().all(|f| features.contains(&f.as_str())) {
                        return false;
                    }
                }
                None => return false,
            }
        }

        if let Some(candidates) = &self.any_property {
            if !candidates
                .iter()
                .any(|c| query.device_properties.contains(&c.as_str()))
            {
                return false;
            }
        }

        if let Some(is_list) = self.is_list {
            if is_list != query.is_list {
                return false;
            }
        }

        if let Some(model) = &self.model {
            let device_model = query.device_info.and_then(|d| d.model.as_deref());
            if device_model != Some(model.as_str()) {
                return false;
            }
        }

        if let Some(manufacturer) = &self.manufacturer {
            let matched = query
                .device_info
                .and_then(|d| d.manufacturer.as_deref())
                .is_some_and(|m| m.to_lowercase().contains(manufacturer.as_str()));
            if !matched {
                return false;
            }
        }

        true
    }
}

/// Boolean condition tree of a mapping rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchCondition {
    /// All conditions must hold (AND)
    AllOf(Vec<MatchCondition>),

    /// Any condition must hold (OR)
    AnyOf(Vec<MatchCondition>),

    /// Leaf predicates
    Predicate(MatchPredicates),
}

impl MatchCondition {
    /// Build the condition tree from its file form
    pub fn from_config(config: &MatchConfig) -> Self {
        let leaf = MatchPredicates {
            expose_type: config.expose_type.clone(),
            property: config.property.clone(),
            has_features: config.has_features.clone(),
            any_property: config.any_property.clone(),
            is_list: config.is_list,
            model: config.model.clone(),
            manufacturer: config.manufacturer.as_ref().map(|m| m.to_lowercase()),
        };

        let mut parts = Vec::new();
        if !leaf.is_empty() {
            parts.push(MatchCondition::Predicate(leaf));
        }
        if let Some(all_of) = &config.all_of {
            parts.push(MatchCondition::AllOf(
                all_of.iter().map(MatchCondition::from_config).collect(),
            ));
        }
        if let Some(any_of) = &config.any_of {
            parts.push(MatchCondition::AnyOf(
                any_of.iter().map(MatchCondition::from_config).collect(),
            ));
        }

        match parts.len() {
            0 => MatchCondition::Predicate(MatchPredicates::default()),
            1 => parts.remove(0),
            _ => MatchCondition::AllOf(parts),
        }
    }

    /// Evaluate against a query
    pub fn evaluate(&self, query: &MatchQuery<'_>) -> bool {
        match self {
            MatchCondition::AllOf(conditions) => conditions.iter().all(|c| c.evaluate(query)),
            MatchCondition::AnyOf(conditions) => conditions.iter().any(|c| c.evaluate(query)),
            MatchCondition::Predicate(predicates) => predicates.matches(query),
        }
    }
}

/// Everything a match condition can test
#[derive(Debug, Clone, Copy)]
pub struct MatchQuery<'a> {
    pub expose_type: &'a str,
    pub property: Option<&'a str>,
    /// Feature keys of a structured expose; `None` for flat exposes
    pub features: Option<&'a [&'a str]>,
    /// Property keys of every expose on the device
    pub device_properties: &'a [&'a str],
    /// The device carries more than one expose of this type
    pub is_list: bool,
    pub device_info: Option<&'a DeviceInfo>,
}

impl<'a> MatchQuery<'a> {
    pub fn new(expose_type: &'a str) -> Self {
        Self {
            expose_type,
            property: None,
            features: None,
            device_properties: &[],
            is_list: false,
            device_info: None,
        }
    }

    pub fn with_property(mut self, property: Option<&'a str>) -> Self {
        self.property = property;
        self
    }

    pub fn with_features(mut self, features: Option<&'a [&'a str]>) -> Self {
        self.features = features;
        self
    }

    pub fn with_device_properties(mut self, properties: &'a [&'a str]) -> Self {
        self.device_properties = properties;
        self
    }

    pub fn with_is_list(mut self, is_list: bool) -> Self {
        self.is_list = is_list;
        self
    }

    pub fn with_device_info(mut self, device_info: Option<&'a DeviceInfo>) -> Self {
        self.device_info = device_info;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(yaml: &str) -> MatchCondition {
        let config: MatchConfig = serde_yaml::from_str(yaml).unwrap();
        MatchCondition::from_config(&config)
    }

    #[test]
    fn test_expose_type_and_property() {
        let cond = condition("expose_type: numeric\nproperty: battery\n");
        let query = MatchQuery::new("numeric").with_property(Some("battery"));
        assert!(cond.evaluate(&query));
        assert!(!cond.evaluate(&query.with_property(Some("voltage"))));
        assert!(!cond.evaluate(&query.with_property(None)));
        assert!(!cond.evaluate(&MatchQuery::new("binary").with_property(Some("battery"))));
    }

    #[test]
    fn test_has_features_requires_features() {
        let cond = condition("has_features: [state, brightness]\n");
        let features = ["state", "brightness", "color_temp"];
        let partial = ["state"];

        assert!(cond.evaluate(&MatchQuery::new("light").with_features(Some(&features))));
        assert!(!cond.evaluate(&MatchQuery::new("light").with_features(Some(&partial))));
        assert!(!cond.evaluate(&MatchQuery::new("numeric")));
    }

    #[test]
    fn test_any_property_checks_device() {
        let cond = condition("any_property: [occupancy, presence]\n");
        let device = ["battery", "presence"];
        let other = ["battery", "temperature"];

        assert!(cond.evaluate(&MatchQuery::new("binary").with_device_properties(&device)));
        assert!(!cond.evaluate(&MatchQuery::new("binary").with_device_properties(&other)));
    }

    #[test]
    fn test_is_list() {
        let cond = condition("expose_type: switch\nis_list: true\n");
        assert!(cond.evaluate(&MatchQuery::new("switch").with_is_list(true)));
        assert!(!cond.evaluate(&MatchQuery::new("switch")));
    }

    #[test]
    fn test_model_and_manufacturer() {
        let cond = condition("model: TS0601_thermostat\nmanufacturer: tuya\n");
        let device = DeviceInfo::new("TS0601_thermostat", "TuYa");
        let other = DeviceInfo::new("TS0601_thermostat", "Moes");

        assert!(cond.evaluate(&MatchQuery::new("climate").with_device_info(Some(&device))));
        assert!(!cond.evaluate(&MatchQuery::new("climate").with_device_info(Some(&other))));
        assert!(!cond.evaluate(&MatchQuery::new("climate")));
    }

    #[test]
    fn test_all_of_and_any_of() {
        let cond = condition(
            r#"
all_of:
  - expose_type: binary
  - any_of:
      - property: water_leak
      - property: leak
"#,
        );
        assert!(cond.evaluate(&MatchQuery::new("binary").with_property(Some("leak"))));
        assert!(!cond.evaluate(&MatchQuery::new("binary").with_property(Some("smoke"))));
        assert!(!cond.evaluate(&MatchQuery::new("enum").with_property(Some("leak"))));
    }

    #[test]
    fn test_sibling_predicates_combine_with_all_of() {
        let cond = condition(
            "expose_type: numeric\nany_of:\n  - property: temperature\n  \
             - property: local_temperature\n",
        );
        assert!(matches!(cond, MatchCondition::AllOf(ref parts) if parts.len() == 2));
        assert!(cond.evaluate(&MatchQuery::new("numeric").with_property(Some("temperature"))));
        assert!(!cond.evaluate(&MatchQuery::new("text").with_property(Some("temperature"))));
    }

    #[test]
    fn test_empty_condition_matches_everything() {
        let cond = condition("{}");
        assert!(cond.evaluate(&MatchQuery::new("anything")));
    }
}
