//! Named transformer registry

use dashmap::DashMap;
use indexmap::IndexMap;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::definition::{InlineTransform, TransformerDefinition};
use crate::error::TransformResult;
use crate::transformer::Transformer;

/// Registry of named transformers
///
/// Built once per mapping set: built-ins first, then the `transformers:`
/// sections of every loaded file in load order. A later definition of the
/// same name replaces the earlier one.
#[derive(Debug)]
pub struct TransformerRegistry {
    transformers: DashMap<String, Arc<Transformer>>,
    identity: Arc<Transformer>,
}

impl TransformerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            transformers: DashMap::new(),
            identity: Arc::new(Transformer::identity()),
        }
    }

    /// Create a registry holding the built-in transformers
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for (name, value) in builtin_definitions() {
            let result = serde_json::from_value::<TransformerDefinition>(value)
                .map_err(|e| e.to_string())
                .and_then(|definition| {
                    registry.register(name, &definition).map_err(|e| e.to_string())
                });
            if let Err(e) = result {
                warn!(transformer = name, error = %e, "Invalid built-in transformer");
            }
        }
        registry
    }

    /// Build and register a named transformer
    pub fn register(
        &self,
        name: impl Into<String>,
        definition: &TransformerDefinition,
    ) -> TransformResult<()> {
        let name = name.into();
        let transformer = Transformer::from_definition(definition)?;
        debug!(transformer = %name, kind = definition.kind(), "Registering transformer");
        if self.transformers.insert(name.clone(), Arc::new(transformer)).is_some() {
            warn!(transformer = %name, "Transformer replaced by a later definition");
        }
        Ok(())
    }

    /// Register a file's `transformers:` section, returning one warning per rejected entry
    #[instrument(skip(self, definitions), fields(count = definitions.len()))]
    pub fn register_all(&self, definitions: &IndexMap<String, InlineTransform>) -> Vec<String> {
        definitions
            .iter()
            .filter_map(|(name, definition)| {
                self.register(name.clone(), definition.definition())
                    .err()
                    .map(|e| format!("transformer '{}' not registered: {}", name, e))
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Transformer>> {
        self.transformers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transformers.contains_key(name)
    }

    /// Resolve a binding's transformer
    ///
    /// A registered name wins; otherwise an ephemeral transformer is built
    /// from the inline definition; otherwise the identity is returned.
    pub fn get_or_create(
        &self,
        name: Option<&str>,
        inline: Option<&TransformerDefinition>,
    ) -> Arc<Transformer> {
        if let Some(name) = name {
            if let Some(transformer) = self.get(name) {
                return transformer;
            }
            warn!(transformer = name, "Unknown transformer, falling back");
        }

        match inline.map(Transformer::from_definition) {
            Some(Ok(transformer)) => Arc::new(transformer),
            Some(Err(e)) => {
                warn!(error = %e, "Invalid inline transformer, using identity");
                Arc::clone(&self.identity)
            }
            None => Arc::clone(&self.identity),
        }
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.transformers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Built-in transformers every registry starts with
fn builtin_definitions() -> Vec<(&'static str, serde_json::Value)> {
    vec![
        (
            "boolean_on_off",
            json!({"type": "boolean", "true_value": "ON", "false_value": "OFF"}),
        ),
        (
            "boolean_lock",
            json!({"type": "boolean", "true_value": "LOCK", "false_value": "UNLOCK"}),
        ),
        (
            "boolean_open_close",
            json!({"type": "boolean", "true_value": "OPEN", "false_value": "CLOSE"}),
        ),
        // contact=true means the magnet is present, i.e. nothing is detected
        (
            "contact_inverted",
            json!({"type": "boolean", "true_value": true, "false_value": false, "invert": true}),
        ),
        (
            "brightness_254",
            json!({"type": "scale", "input_range": [0, 254], "output_range": [0, 100]}),
        ),
        (
            "mired_kelvin",
            json!({"type": "reciprocal", "constant": 1_000_000, "input_range": [50, 1000]}),
        ),
        (
            "cover_state",
            json!({
                "type": "map",
                "bidirectional": {"OPEN": "opened", "CLOSE": "closed", "STOP": "stopped"}
            }),
        ),
        ("round_1", json!({"type": "round", "precision": 1})),
    ]
}
