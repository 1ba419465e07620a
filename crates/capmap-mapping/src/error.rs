//! Error types for mapping loading

use std::path::PathBuf;
use thiserror::Error;

/// Result type for mapping operations
pub type MappingResult<T> = Result<T, MappingError>;

/// Errors that can occur while loading mapping files
///
/// Only environment-level failures escape a load. Problems inside individual
/// files are recorded in that file's [`crate::LoadResult`] instead.
#[derive(Debug, Error)]
pub enum MappingError {
    /// Failed to read a file
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML
    #[error("failed to parse YAML in {source_name}: {source}")]
    ParseYaml {
        source_name: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A document did not match the mapping file structure
    #[error("invalid mapping file {source_name}: {reason}")]
    InvalidFile { source_name: String, reason: String },

    /// The mapping schema itself could not be compiled
    #[error("failed to compile mapping schema: {0}")]
    SchemaCompile(String),

    /// A configured directory does not exist
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// A category or data type name could not be resolved
    #[error("{0}")]
    UnknownCategory(#[from] capmap_core::UnknownCategory),

    /// A definition inside a mapping could not be resolved
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),
}
