//! Error types for pipeline transformation and encoding.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, EtlError>;

/// Errors that can occur while transforming or persisting tables.
#[derive(Debug, Error)]
pub enum EtlError {
    /// Schema declaration or coercion failed.
    #[error("schema error: {message}")]
    Schema {
        /// Description of the schema failure.
        message: String,
    },

    /// Parquet encoding or decoding failed.
    #[error("parquet error: {message}")]
    Parquet {
        /// Description of the Parquet failure.
        message: String,
    },

    /// A referenced column does not exist in the table.
    #[error("missing column '{column}' in table '{table}'")]
    MissingColumn {
        /// Table the lookup ran against.
        table: String,
        /// Column that was not found.
        column: String,
    },

    /// A storage operation failed.
    #[error(transparent)]
    Storage(#[from] lyra_core::CoreError),

    /// An internal invariant was violated.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}
