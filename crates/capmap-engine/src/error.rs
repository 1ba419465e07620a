//! Error types for expose conversion

use thiserror::Error;

/// Result type for conversion operations
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Errors a converter can report for a single expose
///
/// These never abort a mapping pass; the mapper turns them into
/// [`crate::MappingWarning::ConverterFailed`] entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// The converter claimed the expose but no rule matches it any more
    #[error("no mapping matches {expose_type} expose '{expose}'")]
    NoMatchingMapping { expose_type: String, expose: String },

    /// The converter cannot handle this kind of expose
    #[error("unsupported {expose_type} expose '{expose}'")]
    Unsupported { expose_type: String, expose: String },
}
