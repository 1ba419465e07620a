//! Published mapping sets
//!
//! A [`MappingSet`] is built completely by the loader and then published
//! behind an `Arc`; it is never mutated afterwards.

use capmap_core::ChannelCategory;
use capmap_transform::{DerivationRegistry, TransformerRegistry};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

use crate::condition::MatchQuery;
use crate::resolved::{ResolvedMapping, Tier, VirtualPropertyDefinition};

/// Outcome of loading one mapping file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadResult {
    /// File path, or `builtin:<name>` for embedded definitions
    pub source: String,
    pub tier: Tier,
    pub success: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Mapping definitions accepted from this file
    pub mapping_count: usize,
}

impl LoadResult {
    pub(crate) fn failed(source: impl Into<String>, tier: Tier, errors: Vec<String>) -> Self {
        Self {
            source: source.into(),
            tier,
            success: false,
            errors,
            warnings: Vec::new(),
            mapping_count: 0,
        }
    }
}

/// An immutable, priority-sorted rule set with its registries
#[derive(Debug)]
pub struct MappingSet {
    mappings: Vec<ResolvedMapping>,
    transformers: Arc<TransformerRegistry>,
    derivations: Arc<DerivationRegistry>,
    virtual_properties: IndexMap<ChannelCategory, Vec<VirtualPropertyDefinition>>,
    load_results: Vec<LoadResult>,
    generation: u64,
    loaded_at: Option<DateTime<Utc>>,
}

impl MappingSet {
    /// The unloaded set: no rules, built-in registries, generation 0
    pub fn empty() -> Self {
        Self {
            mappings: Vec::new(),
            transformers: Arc::new(TransformerRegistry::with_builtins()),
            derivations: Arc::new(DerivationRegistry::with_builtins()),
            virtual_properties: IndexMap::new(),
            load_results: Vec::new(),
            generation: 0,
            loaded_at: None,
        }
    }

    /// Assemble a set from loaded parts
    ///
    /// Rules are sorted by priority descending, then name ascending; the
    /// sort is stable so load order breaks any remaining tie.
    pub(crate) fn new(
        mut mappings: Vec<ResolvedMapping>,
        transformers: Arc<TransformerRegistry>,
        derivations: Arc<DerivationRegistry>,
        virtual_properties: IndexMap<ChannelCategory, Vec<VirtualPropertyDefinition>>,
        load_results: Vec<LoadResult>,
        generation: u64,
    ) -> Self {
        mappings.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        Self {
            mappings,
            transformers,
            derivations,
            virtual_properties,
            load_results,
            generation,
            loaded_at: Some(Utc::now()),
        }
    }

    /// First rule, in priority order, whose condition holds
    pub fn find_matching_mapping(&self, query: &MatchQuery<'_>) -> Option<&ResolvedMapping> {
        self.mappings.iter().find(|m| m.match_condition.evaluate(query))
    }

    /// All rules in priority order
    pub fn mappings(&self) -> &[ResolvedMapping] {
        &self.mappings
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedMapping> {
        self.mappings.iter().find(|m| m.name == name)
    }

    pub fn transformers(&self) -> &TransformerRegistry {
        &self.transformers
    }

    pub fn derivations(&self) -> &DerivationRegistry {
        &self.derivations
    }

    /// Virtual property definitions registered for a channel category
    pub fn virtual_properties(&self, category: ChannelCategory) -> &[VirtualPropertyDefinition] {
        self.virtual_properties
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn load_results(&self) -> &[LoadResult] {
        &self.load_results
    }

    /// Whether any file failed to load
    pub fn has_failures(&self) -> bool {
        self.load_results.iter().any(|r| !r.success)
    }

    /// 0 while unloaded; incremented by every publish
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loaded(&self) -> bool {
        self.generation > 0
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl Default for MappingSet {
    fn default() -> Self {
        Self::empty()
    }
}
