//! Storage engine contract.
//!
//! This module defines the [`StorageEngine`] trait, the narrow interface every
//! concrete backing store implements. The data access layer only ever talks to
//! a store through it.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, StorageError, StorageResult};
use crate::query::QueryFilter;

use super::entity::{DeleteSummary, Entity, Patch};

/// Optional capabilities an engine may support.
///
/// The required operations (connect, find, create, update, delete) are not
/// listed; every engine has them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineCapability {
    /// `indexes()` lists indexed fields.
    IndexListing,
    /// `unique_indexes()` lists uniquely indexed fields.
    UniqueIndexListing,
}

impl std::fmt::Display for EngineCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineCapability::IndexListing => write!(f, "index-listing"),
            EngineCapability::UniqueIndexListing => write!(f, "unique-index-listing"),
        }
    }
}

/// Connection settings shared by engine implementations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Connection string or URL.
    #[serde(default)]
    pub connection_string: String,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with the given connection string.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Default::default()
        }
    }

    /// Sets the connection timeout.
    pub fn with_connect_timeout_ms(mut self, timeout: u64) -> Self {
        self.connect_timeout_ms = timeout;
        self
    }
}

/// A backing store for one entity type.
///
/// # Contract
///
/// - `connect` is idempotent: calling it while connected returns the existing
///   handle. `disconnect` while disconnected is a no-op. Concurrent
///   connect/disconnect calls must be serialized by the caller.
/// - `find` applies the compiled predicate, orders the matches by
///   `filter.sort`, takes the window `skip = (page - 1) * limit`, `limit`,
///   and finally applies the field projection. No filter matches everything.
/// - `create` reports uniqueness conflicts as
///   [`StorageError::Constraint`](crate::error::StorageError::Constraint),
///   distinct from every other write failure.
/// - `update` shallow-merges the patch into every match, persists each one,
///   and returns all updated entities.
/// - `delete` removes every match and returns a summary, not the records.
/// - `indexes` and `unique_indexes` are optional; engines advertise them via
///   [`capabilities`](StorageEngine::capabilities). The defaults fail with
///   `BackendError::UnsupportedCapability`.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use helios_datastore::core::{StorageEngine, EngineCapability};
///
/// struct MyEngine { /* driver handle */ }
///
/// #[async_trait]
/// impl StorageEngine for MyEngine {
///     type Entity = User;
///     type Connection = MyHandle;
///
///     fn name(&self) -> &'static str {
///         "my-engine"
///     }
///
///     fn capabilities(&self) -> Vec<EngineCapability> {
///         vec![EngineCapability::UniqueIndexListing]
///     }
///
///     // ... connect, disconnect, find, create, update, delete
/// }
/// ```
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// The record type stored by this engine.
    type Entity: Entity;

    /// Handle returned by `connect`.
    type Connection: Clone + Debug + Send + Sync;

    /// Returns a human-readable name for this engine.
    fn name(&self) -> &'static str;

    /// Returns the optional capabilities this engine supports.
    fn capabilities(&self) -> Vec<EngineCapability>;

    /// Checks if this engine supports the given capability.
    fn supports(&self, capability: EngineCapability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Establishes the connection, or returns the existing one.
    async fn connect(&self) -> StorageResult<Self::Connection>;

    /// Releases the connection if there is one.
    async fn disconnect(&self) -> StorageResult<()>;

    /// Returns the entities matching `filter`.
    async fn find(&self, filter: Option<&QueryFilter>) -> StorageResult<Vec<Self::Entity>>;

    /// Inserts a new entity.
    async fn create(&self, entity: Self::Entity) -> StorageResult<Self::Entity>;

    /// Applies `patch` to every entity matching `filter`.
    async fn update(
        &self,
        filter: &QueryFilter,
        patch: &Patch,
    ) -> StorageResult<Vec<Self::Entity>>;

    /// Removes every entity matching `filter`.
    async fn delete(&self, filter: Option<&QueryFilter>) -> StorageResult<DeleteSummary>;

    /// Counts the entities matching `filter`, ignoring pagination.
    async fn count(&self, filter: Option<&QueryFilter>) -> StorageResult<u64> {
        let unpaged = filter.map(|f| QueryFilter {
            page: None,
            limit: None,
            fields: None,
            ..f.clone()
        });
        Ok(self.find(unpaged.as_ref()).await?.len() as u64)
    }

    /// Lists every indexed field.
    async fn indexes(&self) -> StorageResult<Vec<String>> {
        Err(unsupported(self.name(), EngineCapability::IndexListing))
    }

    /// Lists every field covered by a uniqueness constraint.
    async fn unique_indexes(&self) -> StorageResult<Vec<String>> {
        Err(unsupported(self.name(), EngineCapability::UniqueIndexListing))
    }
}

/// Builds the error returned for a capability an engine lacks.
pub fn unsupported(engine: &str, capability: EngineCapability) -> StorageError {
    BackendError::UnsupportedCapability {
        engine: engine.to_string(),
        capability: capability.to_string(),
    }
    .into()
}
