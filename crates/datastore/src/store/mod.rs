//! Generic data store over a [`StorageEngine`].
//!
//! [`DataStore`] forwards CRUD calls to its engine and adds
//! [`create_or_update_by_unique_indexes`](DataStore::create_or_update_by_unique_indexes),
//! an idempotent upsert built only from `create`, `find` and `update`.

pub mod compare;

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::core::{DeleteSummary, EngineCapability, Entity, Patch, StorageEngine, unsupported};
use crate::error::{ReconciliationError, StorageResult};
use crate::query::{Condition, QueryFilter};

pub use compare::{compare_numbers, documents_equal, structurally_equal};

/// A data store wrapping a storage engine.
///
/// The engine's optional capabilities are read once, at construction.
///
/// # Example
///
/// ```
/// use helios_datastore::backends::memory::{IndexDefinition, MemoryEngine, MemoryEngineConfig};
/// use helios_datastore::store::DataStore;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct User {
///     email: String,
///     name: String,
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let config = MemoryEngineConfig::new("users")
///     .with_index(IndexDefinition::unique("email_unique", ["email"]));
/// let store = DataStore::new(MemoryEngine::<User>::new(config).unwrap());
/// store.connect().await.unwrap();
///
/// let ada = User { email: "ada@example.com".into(), name: "Ada".into() };
/// store.create_or_update_by_unique_indexes(ada.clone()).await.unwrap();
///
/// let renamed = User { name: "Ada Lovelace".into(), ..ada };
/// let written = store.create_or_update_by_unique_indexes(renamed).await.unwrap();
/// assert_eq!(written[0].name, "Ada Lovelace");
/// # });
/// ```
#[derive(Debug)]
pub struct DataStore<E: StorageEngine> {
    engine: E,
    capabilities: HashSet<EngineCapability>,
}

impl<E: StorageEngine> DataStore<E> {
    /// Wraps an engine, recording which optional capabilities it has.
    pub fn new(engine: E) -> Self {
        let capabilities = engine.capabilities().into_iter().collect();
        Self {
            engine,
            capabilities,
        }
    }

    /// Returns the wrapped engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Checks if the engine supports the given capability.
    pub fn supports(&self, capability: EngineCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Connects the engine. Returns the existing handle if already connected.
    pub async fn connect(&self) -> StorageResult<E::Connection> {
        self.engine.connect().await
    }

    /// Disconnects the engine. A no-op if not connected.
    pub async fn disconnect(&self) -> StorageResult<()> {
        self.engine.disconnect().await
    }

    /// Returns the entities matching `filter`, or all entities.
    pub async fn find(&self, filter: Option<&QueryFilter>) -> StorageResult<Vec<E::Entity>> {
        self.engine.find(filter).await
    }

    /// Returns the first entity matching `filter`.
    pub async fn find_one(&self, filter: &QueryFilter) -> StorageResult<Option<E::Entity>> {
        let first = filter.clone().with_page(1).with_limit(1);
        Ok(self.engine.find(Some(&first)).await?.into_iter().next())
    }

    /// Counts the entities matching `filter`.
    pub async fn count(&self, filter: Option<&QueryFilter>) -> StorageResult<u64> {
        self.engine.count(filter).await
    }

    /// Creates an entity.
    pub async fn create(&self, entity: E::Entity) -> StorageResult<E::Entity> {
        self.engine.create(entity).await
    }

    /// Applies `patch` to every entity matching `filter`.
    pub async fn update(
        &self,
        filter: &QueryFilter,
        patch: &Patch,
    ) -> StorageResult<Vec<E::Entity>> {
        self.engine.update(filter, patch).await
    }

    /// Deletes every entity matching `filter`, or all entities.
    pub async fn delete(&self, filter: Option<&QueryFilter>) -> StorageResult<DeleteSummary> {
        self.engine.delete(filter).await
    }

    /// Lists indexed fields, if the engine supports it.
    pub async fn get_indexes(&self) -> StorageResult<Vec<String>> {
        if !self.supports(EngineCapability::IndexListing) {
            return Err(unsupported(self.engine.name(), EngineCapability::IndexListing));
        }
        self.engine.indexes().await
    }

    /// Lists uniquely indexed fields, if the engine supports it.
    pub async fn get_unique_indexes(&self) -> StorageResult<Vec<String>> {
        if !self.supports(EngineCapability::UniqueIndexListing) {
            return Err(unsupported(
                self.engine.name(),
                EngineCapability::UniqueIndexListing,
            ));
        }
        self.engine.unique_indexes().await
    }

    /// Returns true if writing `data` over `existing` would change it.
    ///
    /// With `fields`, only those fields are compared.
    pub fn needs_update(
        &self,
        existing: &E::Entity,
        data: &E::Entity,
        fields: Option<&[String]>,
    ) -> StorageResult<bool> {
        Ok(!structurally_equal(existing, data, fields)?)
    }

    /// Creates `data`, or updates the records sharing its unique fields.
    ///
    /// The create is attempted first. Only a uniqueness violation leads to
    /// reconciliation; any other failure is returned as is. Reconciliation
    /// fetches the engine's unique index fields, finds the records matching
    /// every unique field present in `data`, and for each match in turn:
    ///
    /// - returns it unchanged if it already equals `data` (no write), or
    /// - runs `update` with the combined unique-field filter and collects
    ///   everything that update returns.
    ///
    /// Because the update is filter-based, each differing match re-applies the
    /// same multi-record update. The first failing `find` or `update` aborts
    /// the loop.
    pub async fn create_or_update_by_unique_indexes(
        &self,
        data: E::Entity,
    ) -> StorageResult<Vec<E::Entity>> {
        let conflict = match self.engine.create(data.clone()).await {
            Ok(created) => return Ok(vec![created]),
            Err(err) if err.is_constraint_violation() => err,
            Err(err) => return Err(err),
        };
        debug!(engine = self.engine.name(), error = %conflict, "create conflicted, reconciling");

        let unique_indexes = match self.get_unique_indexes().await {
            Ok(fields) if !fields.is_empty() => fields,
            Ok(_) => {
                return Err(ReconciliationError::UniqueIndexesUnavailable {
                    reason: "engine reported no unique indexes".to_string(),
                }
                .into());
            }
            Err(err) => {
                warn!(engine = self.engine.name(), error = %err, "unique index lookup failed");
                return Err(ReconciliationError::UniqueIndexesUnavailable {
                    reason: err.to_string(),
                }
                .into());
            }
        };

        let mut conditions = Vec::with_capacity(unique_indexes.len());
        for field in &unique_indexes {
            if let Some(value) = data.field_value(field)? {
                conditions.push(Condition::eq(field.clone(), value));
            }
        }
        if conditions.is_empty() {
            return Err(ReconciliationError::NoIdentityFields { unique_indexes }.into());
        }

        let filter = QueryFilter::from_conditions(conditions);
        let existing = self.engine.find(Some(&filter)).await?;
        debug!(
            engine = self.engine.name(),
            filter = %filter.compile(),
            matches = existing.len(),
            "reconciling against existing records"
        );

        let patch = Patch::from(data.to_document()?);
        let mut results = Vec::with_capacity(existing.len());
        for current in existing {
            if !self.needs_update(&current, &data, None)? {
                debug!(engine = self.engine.name(), "record unchanged, skipping write");
                results.push(current);
                continue;
            }
            let updated = self.engine.update(&filter, &patch).await?;
            results.extend(updated);
        }

        Ok(results)
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::backends::memory::{IndexDefinition, MemoryEngine, MemoryEngineConfig};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Device {
        serial: String,
        owner: Option<String>,
        firmware: u32,
    }

    fn device(serial: &str, firmware: u32) -> Device {
        Device {
            serial: serial.to_string(),
            owner: Some("ops".to_string()),
            firmware,
        }
    }

    async fn store(indexes: Vec<IndexDefinition>) -> DataStore<MemoryEngine<Device>> {
        let mut config = MemoryEngineConfig::new("devices");
        for index in indexes {
            config = config.with_index(index);
        }
        let store = DataStore::new(MemoryEngine::new(config).unwrap());
        store.connect().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_upsert_creates_when_no_conflict() {
        let store = store(vec![IndexDefinition::unique("serial", ["serial"])]).await;
        let written = store
            .create_or_update_by_unique_indexes(device("A1", 1))
            .await
            .unwrap();
        assert_eq!(written, vec![device("A1", 1)]);
    }

    #[tokio::test]
    async fn test_upsert_updates_differing_record() {
        let store = store(vec![IndexDefinition::unique("serial", ["serial"])]).await;
        store.create(device("A1", 1)).await.unwrap();

        let written = store
            .create_or_update_by_unique_indexes(device("A1", 2))
            .await
            .unwrap();
        assert_eq!(written, vec![device("A1", 2)]);
        assert_eq!(store.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_skips_equal_record() {
        let store = store(vec![IndexDefinition::unique("serial", ["serial"])]).await;
        store.create(device("A1", 1)).await.unwrap();

        let written = store
            .create_or_update_by_unique_indexes(device("A1", 1))
            .await
            .unwrap();
        assert_eq!(written, vec![device("A1", 1)]);
    }

    #[tokio::test]
    async fn test_get_indexes_checked_against_capabilities() {
        let store = store(vec![
            IndexDefinition::unique("serial", ["serial"]),
            IndexDefinition::non_unique("firmware", ["firmware"]),
        ])
        .await;
        assert!(store.supports(EngineCapability::IndexListing));
        assert_eq!(store.get_indexes().await.unwrap(), vec!["serial", "firmware"]);
        assert_eq!(store.get_unique_indexes().await.unwrap(), vec!["serial"]);
    }

    #[tokio::test]
    async fn test_duplicates_allowed_without_unique_indexes() {
        let store = store(vec![]).await;
        store.create(device("A1", 1)).await.unwrap();
        let written = store
            .create_or_update_by_unique_indexes(device("A1", 1))
            .await
            .unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(store.count(None).await.unwrap(), 2);
        assert!(store.get_unique_indexes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_needs_update() {
        let store = store(vec![]).await;
        assert!(!store.needs_update(&device("A", 1), &device("A", 1), None).unwrap());
        assert!(store.needs_update(&device("A", 1), &device("A", 2), None).unwrap());
        assert!(!store
            .needs_update(&device("A", 1), &device("A", 2), Some(&["serial".to_string()]))
            .unwrap());
    }

    #[tokio::test]
    async fn test_find_one() {
        let store = store(vec![]).await;
        store.create(device("A1", 1)).await.unwrap();
        store.create(device("A2", 1)).await.unwrap();

        let filter = QueryFilter::new().with_condition(Condition::eq("firmware", 1));
        let first = store.find_one(&filter).await.unwrap();
        assert_eq!(first, Some(device("A1", 1)));

        let none = store
            .find_one(&QueryFilter::new().with_condition(Condition::eq("firmware", 9)))
            .await
            .unwrap();
        assert!(none.is_none());
    }
}
