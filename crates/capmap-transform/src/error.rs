//! Error types for transformer and derivation handling

use thiserror::Error;

/// Result type for transformer operations
pub type TransformResult<T> = Result<T, TransformError>;

/// Errors that can occur while building transformers or derivations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// A formula expression could not be parsed
    #[error("invalid formula '{expression}': {reason}")]
    FormulaParse { expression: String, reason: String },

    /// A transformer definition is structurally invalid
    #[error("invalid transformer definition: {0}")]
    InvalidDefinition(String),

    /// A derivation rule is structurally invalid
    #[error("invalid derivation '{name}': {reason}")]
    InvalidDerivation { name: String, reason: String },
}
