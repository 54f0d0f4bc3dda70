//! Error types for the data access layer.
//!
//! Storage operations fail with [`StorageError`], which groups failures by
//! category: connection handling, uniqueness conflicts, missing records,
//! engine-level failures and upsert reconciliation. The instance container
//! has its own [`ContainerError`] since it is usable without any engine.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// Violation code reported by document stores for a duplicate key.
///
/// Engines that detect a uniqueness conflict should report it with this code
/// so that callers can recognize it without knowing the engine.
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Connection errors
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Uniqueness constraint violations
    #[error(transparent)]
    Constraint(#[from] ConstraintViolation),

    /// Record state errors
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Engine-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Create-or-update reconciliation errors
    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),
}

impl StorageError {
    /// Returns true if this error is a uniqueness constraint violation.
    ///
    /// This is the only error kind that triggers upsert reconciliation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StorageError::Constraint(v) if v.code == DUPLICATE_KEY_CODE)
    }

    /// Returns true if this error reports a missing optional capability.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            StorageError::Backend(BackendError::UnsupportedCapability { .. })
        )
    }
}

/// Errors establishing or releasing a connection.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The engine could not connect or disconnect.
    #[error("connection failed to {engine}: {message}")]
    Failed { engine: String, message: String },

    /// A data operation was issued before `connect`.
    #[error("{engine} is not connected")]
    NotConnected { engine: String },
}

/// A write violated a uniqueness constraint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("duplicate key (code {code}) on index '{index}' over [{}]: {message}", .fields.join(", "))]
pub struct ConstraintViolation {
    /// Store-specific violation code, [`DUPLICATE_KEY_CODE`] for duplicates.
    pub code: i32,
    /// Name of the violated index.
    pub index: String,
    /// Fields covered by the violated index.
    pub fields: Vec<String>,
    /// Engine message.
    pub message: String,
}

impl ConstraintViolation {
    /// Creates a duplicate-key violation for the given index.
    pub fn duplicate_key(
        index: impl Into<String>,
        fields: Vec<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: DUPLICATE_KEY_CODE,
            index: index.into(),
            fields,
            message: message.into(),
        }
    }
}

/// Errors related to record state.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// No record matched.
    #[error("no {collection} record matched {filter}")]
    NotFound { collection: String, filter: String },
}

/// Errors originating from the storage engine.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The requested optional capability is not supported by this engine.
    #[error("capability '{capability}' not supported by {engine}")]
    UnsupportedCapability { engine: String, capability: String },

    /// The engine rejected or could not evaluate a query.
    #[error("query execution failed: {message}")]
    QueryError { message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },

    /// Internal engine error.
    #[error("internal error in {engine}: {message}")]
    Internal {
        engine: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Errors raised while reconciling a uniqueness conflict into an update.
#[derive(Error, Debug)]
pub enum ReconciliationError {
    /// The engine could not report its unique indexes, or reported none.
    #[error("failed to fetch unique indexes: {reason}")]
    UniqueIndexesUnavailable { reason: String },

    /// The record carries none of the unique index fields.
    #[error("record has no values for unique index fields [{}]", .unique_indexes.join(", "))]
    NoIdentityFields { unique_indexes: Vec<String> },
}

/// Errors raised by the instance container.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// A singleton registration found the key already taken.
    #[error("instance already registered: {key}")]
    AlreadyRegistered { key: String },

    /// Neither this container nor any child holds the key.
    #[error("instance not found: {key}")]
    NotFound { key: String },

    /// The instance exists but is not of the requested type.
    #[error("instance {key} is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// A lifecycle hook reported failure.
    #[error("{hook} hook failed for {key}: {message}")]
    LifecycleHook {
        key: String,
        hook: &'static str,
        message: String,
    },

    /// One or more failures while tearing a container down.
    #[error("{}", .failures.join("\n"))]
    Teardown { failures: Vec<String> },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

impl From<regex::Error> for BackendError {
    fn from(err: regex::Error) -> Self {
        BackendError::QueryError {
            message: err.to_string(),
        }
    }
}
