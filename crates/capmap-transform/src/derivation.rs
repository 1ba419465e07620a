//! Derivation rules
//!
//! A derivation computes one canonical value from another device value, e.g.
//! a battery status from the battery percentage. Derivations are total: when
//! the source is absent or unusable they return their configured default.

use capmap_core::value::{as_number, is_truthy};
use capmap_core::StateMap;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{TransformError, TransformResult};

fn default_low_threshold() -> f64 {
    20.0
}

fn default_ok() -> String {
    "ok".to_string()
}

fn default_bright() -> f64 {
    1000.0
}

fn default_moderate() -> f64 {
    100.0
}

fn default_dusky() -> f64 {
    10.0
}

fn default_opened_position() -> f64 {
    100.0
}

/// One band of a threshold derivation; bounds are inclusive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub value: String,
}

/// A typed derivation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DerivationRule {
    /// `percentage <= low_threshold` gives "low", otherwise "ok"
    BatteryStatusFromPercentage {
        #[serde(default = "default_low_threshold")]
        low_threshold: f64,
        #[serde(default = "default_ok")]
        default_status: String,
    },

    /// Lux bands: bright, moderate, dusky, dark
    IlluminanceLevelFromDensity {
        #[serde(default = "default_bright")]
        bright_threshold: f64,
        #[serde(default = "default_moderate")]
        moderate_threshold: f64,
        #[serde(default = "default_dusky")]
        dusky_threshold: f64,
    },

    /// Cover position to closed/opened/stopped
    CoverStatusFromPosition {
        #[serde(default)]
        closed_position: f64,
        #[serde(default = "default_opened_position")]
        opened_position: f64,
    },

    /// First band containing the value wins
    Threshold {
        thresholds: Vec<ThresholdBand>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },

    BooleanMap {
        true_value: String,
        false_value: String,
    },

    /// Position (0..=100) to a closed/opened/partial label
    PositionStatus {
        closed_value: String,
        opened_value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partial_value: Option<String>,
    },
}

impl DerivationRule {
    /// Wire name of the rule type
    pub fn type_name(&self) -> &'static str {
        match self {
            DerivationRule::BatteryStatusFromPercentage { .. } => "battery_status_from_percentage",
            DerivationRule::IlluminanceLevelFromDensity { .. } => "illuminance_level_from_density",
            DerivationRule::CoverStatusFromPosition { .. } => "cover_status_from_position",
            DerivationRule::Threshold { .. } => "threshold",
            DerivationRule::BooleanMap { .. } => "boolean_map",
            DerivationRule::PositionStatus { .. } => "position_status",
        }
    }

    /// Rule with default parameters for a built-in type name
    pub fn builtin(type_name: &str) -> Option<Self> {
        match type_name {
            "battery_status_from_percentage" => Some(DerivationRule::BatteryStatusFromPercentage {
                low_threshold: default_low_threshold(),
                default_status: default_ok(),
            }),
            "illuminance_level_from_density" => Some(DerivationRule::IlluminanceLevelFromDensity {
                bright_threshold: default_bright(),
                moderate_threshold: default_moderate(),
                dusky_threshold: default_dusky(),
            }),
            "cover_status_from_position" => Some(DerivationRule::CoverStatusFromPosition {
                closed_position: 0.0,
                opened_position: default_opened_position(),
            }),
            _ => None,
        }
    }

    /// Check parameters that serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        match self {
            DerivationRule::IlluminanceLevelFromDensity {
                bright_threshold,
                moderate_threshold,
                dusky_threshold,
            } if !(bright_threshold >= moderate_threshold
                && moderate_threshold >= dusky_threshold) =>
            {
                Err("thresholds must satisfy bright >= moderate >= dusky".into())
            }
            DerivationRule::CoverStatusFromPosition {
                closed_position,
                opened_position,
            } if closed_position == opened_position => {
                Err("closed_position and opened_position must differ".into())
            }
            DerivationRule::Threshold {
                thresholds,
                default,
            } if thresholds.is_empty() && default.is_none() => {
                Err("threshold derivation needs at least one band or a default".into())
            }
            _ => Ok(()),
        }
    }

    /// State keys consulted, in order, when the configured source is missing
    pub fn fallback_sources(&self) -> &'static [&'static str] {
        match self {
            DerivationRule::IlluminanceLevelFromDensity { .. } => {
                &["illuminance_lux", "illuminance"]
            }
            _ => &[],
        }
    }

    /// Apply the rule to a source value
    pub fn apply(&self, source: Option<&Value>) -> Value {
        let number = source.and_then(as_number);
        match self {
            DerivationRule::BatteryStatusFromPercentage {
                low_threshold,
                default_status,
            } => match number {
                Some(n) if n <= *low_threshold => Value::from("low"),
                Some(_) => Value::from("ok"),
                None => Value::from(default_status.as_str()),
            },
            DerivationRule::IlluminanceLevelFromDensity {
                bright_threshold,
                moderate_threshold,
                dusky_threshold,
            } => {
                let level = match number {
                    Some(n) if n >= *bright_threshold => "bright",
                    Some(n) if n >= *moderate_threshold => "moderate",
                    Some(n) if n >= *dusky_threshold => "dusky",
                    _ => "dark",
                };
                Value::from(level)
            }
            DerivationRule::CoverStatusFromPosition {
                closed_position,
                opened_position,
            } => {
                let status = match number {
                    Some(n) if n <= *closed_position => "closed",
                    Some(n) if n >= *opened_position => "opened",
                    _ => "stopped",
                };
                Value::from(status)
            }
            DerivationRule::Threshold {
                thresholds,
                default,
            } => {
                let band = number.and_then(|n| {
                    thresholds.iter().find(|band| {
                        band.min.map_or(true, |min| n >= min)
                            && band.max.map_or(true, |max| n <= max)
                    })
                });
                let fallback = || {
                    default.clone().or_else(|| {
                        thresholds
                            .iter()
                            .find(|band| band.min.is_none() && band.max.is_none())
                            .map(|band| band.value.clone())
                    })
                };
                band.map(|band| band.value.clone())
                    .or_else(fallback)
                    .map_or(Value::Null, Value::from)
            }
            DerivationRule::BooleanMap {
                true_value,
                false_value,
            } => {
                let label = if source.is_some_and(is_truthy) {
                    true_value
                } else {
                    false_value
                };
                Value::from(label.as_str())
            }
            DerivationRule::PositionStatus {
                closed_value,
                opened_value,
                partial_value,
            } => {
                let label = match number {
                    Some(n) if n >= 100.0 => opened_value,
                    Some(n) if n > 0.0 => partial_value.as_ref().unwrap_or(closed_value),
                    _ => closed_value,
                };
                Value::from(label.as_str())
            }
        }
    }

    /// Apply the rule against a flat state map
    pub fn evaluate(&self, source_property: Option<&str>, state: &StateMap) -> Value {
        let source = source_property
            .and_then(|key| state.get(key))
            .filter(|v| !v.is_null())
            .or_else(|| {
                self.fallback_sources()
                    .iter()
                    .find_map(|key| state.get(*key).filter(|v| !v.is_null()))
            });
        self.apply(source)
    }
}

/// A named derivation from a mapping file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedDerivation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub rule: DerivationRule,
}

/// Registry of named derivation rules
#[derive(Debug)]
pub struct DerivationRegistry {
    rules: DashMap<String, DerivationRule>,
}

impl DerivationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            rules: DashMap::new(),
        }
    }

    /// Create a registry holding the built-in device derivations under their type names
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for name in [
            "battery_status_from_percentage",
            "illuminance_level_from_density",
            "cover_status_from_position",
        ] {
            if let Some(rule) = DerivationRule::builtin(name) {
                registry.rules.insert(name.to_string(), rule);
            }
        }
        registry
    }

    /// Register a rule, replacing any rule of the same name
    pub fn register(&self, name: impl Into<String>, rule: DerivationRule) -> TransformResult<()> {
        let name = name.into();
        rule.validate()
            .map_err(|reason| TransformError::InvalidDerivation {
                name: name.clone(),
                reason,
            })?;
        debug!(derivation = %name, rule = rule.type_name(), "Registering derivation");
        if self.rules.insert(name.clone(), rule).is_some() {
            warn!(derivation = %name, "Derivation replaced by a later definition");
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<DerivationRule> {
        self.rules.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rules.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for DerivationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
