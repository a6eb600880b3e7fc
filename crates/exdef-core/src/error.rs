//! Error types for exdef
//!
//! All fallible operations return `Result<T, Error>`.
//! Every variant is an integrity failure of the execution definition (or of a
//! normalization state handed back in); none of them is transient, so callers
//! should not retry.

/// exdef error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The same original local identifier is used by two entities
    #[error("duplicate localId used in execution definition: {0}")]
    DuplicateLocalId(String),

    /// A filter, sort, dimension or total points at an unknown local identifier
    #[error("dangling localId reference. Target: {0}")]
    DanglingReference(String),

    /// A measure depends on itself through master / operand references
    #[error("circular measure dependency detected at '{}': {}", .local_id, .path.join(" -> "))]
    CircularDependency { local_id: String, path: Vec<String> },

    /// A master or operand measure does not exist in the definition
    #[error("measure '{referenced}' referenced by '{referrer}' does not exist in the execution definition")]
    MissingMeasure { referenced: String, referrer: String },

    /// A normalized local identifier has no original counterpart
    #[error("mapping from normalized to real localId does not exist. Normalized: {0}")]
    MissingMapping(String),

    /// The definition cannot be fingerprinted or is otherwise inconsistent
    #[error("Inconsistent execution definition: {0}")]
    Inconsistent(String),

    /// JSON (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Failure reported by an execution backend
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias for exdef operations
pub type Result<T> = std::result::Result<T, Error>;
