//! Runtime transformers
//!
//! A [`Transformer`] converts between a device's native value and the
//! canonical value. Both directions are total: out-of-range numbers are
//! clamped or rounded, and input a transformer cannot interpret is returned
//! unchanged.

use capmap_core::value::{as_number, is_truthy, number_value, value_key};
use capmap_core::Direction;
use serde_json::Value;
use std::collections::HashMap;

use crate::definition::TransformerDefinition;
use crate::error::TransformResult;
use crate::formula::Formula;

#[derive(Debug, Clone)]
enum Kind {
    Passthrough,
    Scale {
        input: [f64; 2],
        output: [f64; 2],
    },
    Map {
        read: HashMap<String, Value>,
        write: HashMap<String, Value>,
    },
    Boolean {
        true_value: Value,
        false_value: Value,
        invert: bool,
    },
    Clamp {
        min: f64,
        max: f64,
    },
    Round {
        multiplier: f64,
    },
    Reciprocal {
        constant: f64,
        input: Option<[f64; 2]>,
    },
    Formula {
        read: Option<Formula>,
        write: Option<Formula>,
    },
    Chain(Vec<Transformer>),
}

/// A bidirectional value converter
#[derive(Debug, Clone)]
pub struct Transformer {
    direction: Direction,
    kind: Kind,
}

impl Transformer {
    /// The identity transformer
    pub fn identity() -> Self {
        Self {
            direction: Direction::Bidirectional,
            kind: Kind::Passthrough,
        }
    }

    /// Build a transformer from its definition
    ///
    /// Fails only when a formula cannot be parsed.
    pub fn from_definition(definition: &TransformerDefinition) -> TransformResult<Self> {
        let kind = match definition {
            TransformerDefinition::Scale(d) => Kind::Scale {
                input: d.input_range,
                output: d.output_range,
            },
            TransformerDefinition::Map(d) => {
                let mut read = HashMap::new();
                let mut write = HashMap::new();
                for (key, value) in d.read.iter().flatten() {
                    read.insert(key.clone(), value.clone());
                }
                for (key, value) in d.write.iter().flatten() {
                    write.insert(key.clone(), value.clone());
                }
                for (key, value) in d.bidirectional.iter().flatten() {
                    read.insert(key.clone(), value.clone());
                    write.insert(value_key(value), Value::String(key.clone()));
                }
                Kind::Map { read, write }
            }
            TransformerDefinition::Boolean(d) => Kind::Boolean {
                true_value: d.true_value.clone(),
                false_value: d.false_value.clone(),
                invert: d.invert,
            },
            TransformerDefinition::Clamp(d) => Kind::Clamp {
                min: d.min,
                max: d.max,
            },
            TransformerDefinition::Round(d) => Kind::Round {
                multiplier: 10f64.powi(i32::from(d.precision)),
            },
            TransformerDefinition::Reciprocal(d) => Kind::Reciprocal {
                constant: d.constant,
                input: d.input_range,
            },
            TransformerDefinition::Formula(d) => Kind::Formula {
                read: d.read.as_deref().map(Formula::parse).transpose()?,
                write: d.write.as_deref().map(Formula::parse).transpose()?,
            },
            TransformerDefinition::Chain(d) => Kind::Chain(
                d.steps
                    .iter()
                    .map(|step| Transformer::from_definition(step.definition()))
                    .collect::<TransformResult<Vec<_>>>()?,
            ),
            TransformerDefinition::Passthrough(_) => Kind::Passthrough,
        };

        Ok(Self {
            direction: definition.direction(),
            kind,
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.kind, Kind::Passthrough)
    }

    /// Device value to canonical value
    pub fn read(&self, value: &Value) -> Value {
        if !self.direction.can_read() {
            return value.clone();
        }
        match &self.kind {
            Kind::Passthrough => value.clone(),
            Kind::Scale { input, output } => {
                numeric(value, |n| scale(n, *input, *output).round())
            }
            Kind::Map { read, .. } => lookup(read, value),
            Kind::Boolean {
                true_value,
                false_value,
                invert,
            } => {
                let result = if value == true_value {
                    true
                } else if value == false_value {
                    false
                } else {
                    is_truthy(value)
                };
                Value::Bool(result != *invert)
            }
            Kind::Clamp { min, max } => numeric(value, |n| clamp(n, *min, *max)),
            Kind::Round { multiplier } => numeric(value, |n| (n * multiplier).round() / multiplier),
            Kind::Reciprocal { constant, input } => numeric(value, |n| {
                let n = input.map_or(n, |[lo, hi]| clamp(n, lo, hi));
                (constant / n).round()
            }),
            Kind::Formula { read, .. } => evaluate(read.as_ref(), value),
            Kind::Chain(steps) => steps.iter().fold(value.clone(), |acc, step| step.read(&acc)),
        }
    }

    /// Canonical value to device value
    pub fn write(&self, value: &Value) -> Value {
        if !self.direction.can_write() {
            return value.clone();
        }
        match &self.kind {
            Kind::Passthrough => value.clone(),
            Kind::Scale { input, output } => {
                numeric(value, |n| scale(n, *output, *input).round())
            }
            Kind::Map { write, .. } => lookup(write, value),
            Kind::Boolean {
                true_value,
                false_value,
                invert,
            } => {
                if is_truthy(value) != *invert {
                    true_value.clone()
                } else {
                    false_value.clone()
                }
            }
            Kind::Clamp { min, max } => numeric(value, |n| clamp(n, *min, *max)),
            Kind::Round { multiplier } => numeric(value, |n| (n * multiplier).round() / multiplier),
            Kind::Reciprocal { constant, input } => numeric(value, |n| {
                let n = match input {
                    Some([lo, hi]) => clamp(n, constant / hi, constant / lo),
                    None => n,
                };
                (constant / n).round()
            }),
            Kind::Formula { write, .. } => evaluate(write.as_ref(), value),
            Kind::Chain(steps) => steps
                .iter()
                .rev()
                .fold(value.clone(), |acc, step| step.write(&acc)),
        }
    }
}

impl Default for Transformer {
    fn default() -> Self {
        Self::identity()
    }
}

/// Clamp without panicking on reversed bounds
fn clamp(n: f64, a: f64, b: f64) -> f64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    n.max(lo).min(hi)
}

fn scale(n: f64, from: [f64; 2], to: [f64; 2]) -> f64 {
    if from[0] == from[1] {
        return to[0];
    }
    let n = clamp(n, from[0], from[1]);
    let ratio = (n - from[0]) / (from[1] - from[0]);
    to[0] + ratio * (to[1] - to[0])
}

/// Apply `f` to a numeric input; other input and non-finite output pass through
fn numeric(value: &Value, f: impl FnOnce(f64) -> f64) -> Value {
    match as_number(value).map(f) {
        Some(n) if n.is_finite() => number_value(n),
        _ => value.clone(),
    }
}

fn lookup(table: &HashMap<String, Value>, value: &Value) -> Value {
    table
        .get(&value_key(value))
        .cloned()
        .unwrap_or_else(|| value.clone())
}

fn evaluate(formula: Option<&Formula>, value: &Value) -> Value {
    match formula {
        Some(formula) => numeric(value, |n| formula.eval(n)),
        None => value.clone(),
    }
}
