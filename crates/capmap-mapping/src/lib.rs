//! Declarative mapping rules
//!
//! Loads mapping files from the built-in and user tiers, validates them
//! against the mapping schema, resolves category names to the canonical
//! vocabularies and publishes a priority-sorted [`MappingSet`].

mod condition;
mod config;
mod error;
mod file;
mod loader;
mod resolve;
mod resolved;
mod schema;
mod set;

pub use condition::{MatchCondition, MatchPredicates, MatchQuery};
pub use config::{LoaderConfig, ENV_DEFINITIONS_PATH, ENV_STRICT_CATEGORIES, ENV_USER_MAPPINGS_PATH};
pub use error::{MappingError, MappingResult};
pub use file::{
    ChannelConfig, DerivationRef, DerivedPropertyConfig, FeatureConfig, FeatureType,
    MappingDefinitionConfig, MappingFile, MatchConfig, PanelPropertyConfig, PropertyConfig,
    PropertyFormat, StaticPropertyConfig, VirtualPropertyConfig,
};
pub use loader::MappingLoader;
pub use resolve::CategoryResolver;
pub use resolved::{
    FeatureBinding, ResolvedChannel, ResolvedDerivedProperty, ResolvedFeature, ResolvedMapping,
    ResolvedPanelProperty, ResolvedProperty, ResolvedStaticProperty, Tier, TransformerRef,
    VirtualKind, VirtualPropertyDefinition, DEFAULT_PRIORITY,
};
pub use schema::{yaml_to_json, JsonSchemaValidator, SchemaValidator, MAPPING_SCHEMA};
pub use set::{LoadResult, MappingSet};
