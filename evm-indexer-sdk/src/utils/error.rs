//! Error types for indexer operations.
//!
//! This module defines a comprehensive error enumeration using `thiserror`
//! to provide clear, actionable error reporting throughout the SDK.

use thiserror::Error;

/// Custom error type for indexer operations.
///
/// This error type covers all potential failure modes of the SDK, from
/// configuration issues to runtime failures in RPC communication, entity
/// store operations, and log decoding.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Errors encountered during database operations.
    ///
    /// This variant automatically wraps `sqlx::Error` using the `#[from]` attribute,
    /// allowing seamless error propagation with the `?` operator.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Errors during log or call-output decoding.
    ///
    /// Raised when an event argument is missing, has an unexpected type, or a
    /// numeric value does not fit the requested machine integer.
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// Errors interacting with the JSON-RPC endpoint.
    ///
    /// This covers network failures, HTTP errors, or unexpected responses
    /// from the node.
    #[error("RPC error: {0}")]
    RpcError(String),

    /// Errors related to configuration.
    ///
    /// This includes missing environment variables, invalid configuration values,
    /// unreadable ABI files, or a chain id that does not match the endpoint.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Errors from environment variable operations.
    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] std::env::VarError),

    /// A string could not be parsed as a 20-byte address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Generic errors for operations that don't fit other categories.
    #[error("Internal error: {0}")]
    InternalError(String),

    /// Error when a registry exceeds its configured capacity.
    #[error("Registry capacity exceeded: {0}")]
    RegistryCapacityExceeded(String),

    /// Connection error (endpoint unreachable, handshake failure)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Invalid data error
    #[error("Data error: {0}")]
    DataError(String),

    /// A request did not complete within its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// All retry attempts were exhausted on a transient error.
    ///
    /// Contains the number of attempts made and the last error message.
    #[error("Retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted {
        /// Total number of attempts (initial call + retries).
        attempts: u32,
        /// String representation of the last error.
        last_error: String,
    },

    /// Update-by-merge targeted a primary key that does not exist.
    #[error("{kind} '{id}' not found")]
    EntityNotFound {
        /// Entity kind (table).
        kind: String,
        /// Primary key.
        id: String,
    },

    /// Create targeted a primary key that already exists.
    #[error("{kind} '{id}' already exists")]
    EntityExists {
        /// Entity kind (table).
        kind: String,
        /// Primary key.
        id: String,
    },

    /// A handler rejected an event because applying it would break an entity invariant.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// No stored block hash matches the canonical chain.
    ///
    /// The reorg reaches below the retained block history, so the store can
    /// no longer be rewound exactly.
    #[error("Reorg below retained history (cursor at block {block})")]
    ReorgTooDeep {
        /// Block number of the cursor when the reorg was detected.
        block: u64,
    },

    /// The persisted cursor contradicts the store or the chain.
    #[error("Cursor inconsistent: {0}")]
    CursorInconsistent(String),

    /// Invalid query against the read surface (unknown kind or field, bad token).
    #[error("Query error: {0}")]
    QueryError(String),

    /// JSON (de)serialization failure.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Filesystem failure (ABI or network config files).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IndexerError {
    /// Returns `true` for failures local to a single handler invocation.
    ///
    /// The invocation's writes are dropped, the failure is logged, and the
    /// cursor still advances past the log.
    #[must_use]
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            IndexerError::EntityNotFound { .. }
                | IndexerError::EntityExists { .. }
                | IndexerError::ConstraintViolation(_)
                | IndexerError::DecodingError(_)
        )
    }

    /// Returns `true` when the engine must stop instead of retrying next cycle.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, IndexerError::DatabaseError(_))
    }

    pub(crate) fn not_found(kind: &str, id: &str) -> Self {
        IndexerError::EntityNotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn exists(kind: &str, id: &str) -> Self {
        IndexerError::EntityExists {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }
}

/// Type alias for Results using `IndexerError`.
pub type Result<T> = std::result::Result<T, IndexerError>;
