//! Value transformers and derivation rules
//!
//! Transformers convert between a device's native representation of a value
//! and the canonical representation, in both directions. Derivations compute
//! a canonical value a device never reports from one it does.

mod definition;
mod derivation;
mod error;
pub mod formula;
mod registry;
mod transformer;

pub use definition::{
    BooleanDefinition, ChainDefinition, ClampDefinition, FormulaDefinition, InlineTransform,
    MapDefinition, PassthroughDefinition, ReciprocalDefinition, RoundDefinition, ScaleDefinition,
    TransformerDefinition,
};
pub use derivation::{DerivationRegistry, DerivationRule, NamedDerivation, ThresholdBand};
pub use error::{TransformError, TransformResult};
pub use registry::TransformerRegistry;
pub use transformer::Transformer;
