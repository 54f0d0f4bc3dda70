//! In-memory storage engine.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, info};

use crate::core::{DeleteSummary, Document, EngineCapability, Entity, Patch, StorageEngine};
use crate::error::{BackendError, ConnectionError, ConstraintViolation, StorageResult};
use crate::query::QueryFilter;
use crate::store::documents_equal;

use super::config::{IndexDefinition, MemoryEngineConfig};
use super::matcher::{self, Matcher};

const ENGINE_NAME: &str = "memory";

/// Handle returned by [`MemoryEngine::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConnection {
    /// Increments on every fresh connect.
    pub id: u64,
    /// Collection the engine serves.
    pub collection: String,
}

/// A [`StorageEngine`] keeping documents in process memory.
///
/// Behaves like a document store collection: entities are held in their
/// serialized form, filters are evaluated by the native dialect, and unique
/// indexes reject duplicate writes with a duplicate-key violation.
pub struct MemoryEngine<T> {
    config: MemoryEngineConfig,
    documents: RwLock<Vec<Document>>,
    connection: Mutex<Option<MemoryConnection>>,
    next_connection_id: AtomicU64,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Debug for MemoryEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("config", &self.config)
            .field("documents", &self.documents.read().len())
            .field("connected", &self.connection.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Entity> MemoryEngine<T> {
    /// Creates an engine with the given configuration.
    pub fn new(config: MemoryEngineConfig) -> StorageResult<Self> {
        config.validate().map_err(|e| BackendError::Internal {
            engine: ENGINE_NAME.to_string(),
            message: "invalid configuration".to_string(),
            source: Some(Box::new(e)),
        })?;

        Ok(Self {
            config,
            documents: RwLock::new(Vec::new()),
            connection: Mutex::new(None),
            next_connection_id: AtomicU64::new(1),
            _entity: PhantomData,
        })
    }

    /// Creates an engine with no indexes.
    pub fn in_memory() -> Self {
        Self {
            config: MemoryEngineConfig::default(),
            documents: RwLock::new(Vec::new()),
            connection: Mutex::new(None),
            next_connection_id: AtomicU64::new(1),
            _entity: PhantomData,
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &MemoryEngineConfig {
        &self.config
    }

    /// Returns true if a connection is open.
    pub fn is_connected(&self) -> bool {
        self.connection.lock().is_some()
    }

    fn ensure_connected(&self) -> StorageResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ConnectionError::NotConnected {
                engine: ENGINE_NAME.to_string(),
            }
            .into())
        }
    }

    fn unique_indexes_defs(&self) -> impl Iterator<Item = &IndexDefinition> {
        self.config.indexes.iter().filter(|index| index.unique)
    }

    /// Checks `candidate` against every other document for unique index
    /// conflicts. `skip` excludes the candidate's own slot on updates.
    fn check_unique(
        &self,
        documents: &[Document],
        candidate: &Document,
        skip: Option<usize>,
    ) -> Result<(), ConstraintViolation> {
        for index in self.unique_indexes_defs() {
            // Sparse: documents missing any indexed field are not constrained.
            let complete = index
                .fields
                .iter()
                .all(|field| candidate.get(field).is_some_and(|v| !v.is_null()));
            if !complete {
                continue;
            }

            let conflict = documents
                .iter()
                .enumerate()
                .filter(|(position, _)| Some(*position) != skip)
                .any(|(_, existing)| documents_equal(existing, candidate, Some(&index.fields)));
            if conflict {
                let key = index
                    .fields
                    .iter()
                    .map(|field| {
                        let value = candidate.get(field).unwrap_or(&Value::Null);
                        format!("{}: {}", field, value)
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(ConstraintViolation::duplicate_key(
                    index.name.clone(),
                    index.fields.clone(),
                    format!(
                        "{} collection: duplicate key {{ {} }}",
                        self.config.collection, key
                    ),
                ));
            }
        }
        Ok(())
    }

    fn matching_positions(
        documents: &[Document],
        filter: Option<&QueryFilter>,
    ) -> StorageResult<Vec<usize>> {
        let Some(filter) = filter else {
            return Ok((0..documents.len()).collect());
        };
        let native = filter.compile();
        let matcher = Matcher::new(&native)?;
        let mut positions = Vec::new();
        for (position, document) in documents.iter().enumerate() {
            if matcher.matches(document)? {
                positions.push(position);
            }
        }
        Ok(positions)
    }
}

#[async_trait]
impl<T: Entity> StorageEngine for MemoryEngine<T> {
    type Entity = T;
    type Connection = MemoryConnection;

    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn capabilities(&self) -> Vec<EngineCapability> {
        vec![
            EngineCapability::IndexListing,
            EngineCapability::UniqueIndexListing,
        ]
    }

    async fn connect(&self) -> StorageResult<MemoryConnection> {
        let mut slot = self.connection.lock();
        if let Some(existing) = slot.as_ref() {
            return Ok(existing.clone());
        }

        let connection = MemoryConnection {
            id: self.next_connection_id.fetch_add(1, Ordering::Relaxed),
            collection: self.config.collection.clone(),
        };
        info!(
            engine = ENGINE_NAME,
            collection = %connection.collection,
            connection_id = connection.id,
            "Connected"
        );
        *slot = Some(connection.clone());
        Ok(connection)
    }

    async fn disconnect(&self) -> StorageResult<()> {
        if let Some(connection) = self.connection.lock().take() {
            info!(
                engine = ENGINE_NAME,
                collection = %connection.collection,
                connection_id = connection.id,
                "Disconnected"
            );
        }
        Ok(())
    }

    async fn find(&self, filter: Option<&QueryFilter>) -> StorageResult<Vec<T>> {
        self.ensure_connected()?;

        let mut matched: Vec<Document> = {
            let documents = self.documents.read();
            Self::matching_positions(&documents, filter)?
                .into_iter()
                .map(|position| documents[position].clone())
                .collect()
        };

        if let Some(filter) = filter {
            matcher::sort_documents(&mut matched, &filter.sort);

            let skip = filter.skip().unwrap_or(0) as usize;
            let limit = filter.limit.map_or(usize::MAX, |l| l as usize);
            matched = matched.into_iter().skip(skip).take(limit).collect();

            if let Some(projection) = &filter.fields {
                matched = matched
                    .into_iter()
                    .map(|document| matcher::project(document, projection))
                    .collect();
            }
        }

        debug!(
            engine = ENGINE_NAME,
            collection = %self.config.collection,
            results = matched.len(),
            "find"
        );
        matched.into_iter().map(T::from_document).collect()
    }

    async fn create(&self, entity: T) -> StorageResult<T> {
        self.ensure_connected()?;
        let document = entity.to_document()?;

        let mut documents = self.documents.write();
        self.check_unique(&documents, &document, None)?;
        documents.push(document);

        debug!(engine = ENGINE_NAME, collection = %self.config.collection, "create");
        Ok(entity)
    }

    async fn update(&self, filter: &QueryFilter, patch: &Patch) -> StorageResult<Vec<T>> {
        self.ensure_connected()?;

        let mut documents = self.documents.write();
        let positions = Self::matching_positions(&documents, Some(filter))?;

        // Stage the writes so a conflict leaves the collection untouched.
        let mut staged = documents.clone();
        for &position in &positions {
            let mut updated = staged[position].clone();
            patch.apply_to(&mut updated);
            self.check_unique(&staged, &updated, Some(position))?;
            staged[position] = updated;
        }

        let updated: Vec<Document> = positions.iter().map(|&p| staged[p].clone()).collect();
        *documents = staged;
        drop(documents);

        debug!(
            engine = ENGINE_NAME,
            collection = %self.config.collection,
            updated = updated.len(),
            "update"
        );
        updated.into_iter().map(T::from_document).collect()
    }

    async fn delete(&self, filter: Option<&QueryFilter>) -> StorageResult<DeleteSummary> {
        self.ensure_connected()?;

        let mut documents = self.documents.write();
        let positions = Self::matching_positions(&documents, filter)?;
        let mut position = 0;
        let mut next_match = positions.iter().peekable();
        documents.retain(|_| {
            let remove = next_match.next_if(|&&p| p == position).is_some();
            position += 1;
            !remove
        });

        debug!(
            engine = ENGINE_NAME,
            collection = %self.config.collection,
            deleted = positions.len(),
            "delete"
        );
        Ok(DeleteSummary {
            deleted_count: positions.len() as u64,
        })
    }

    async fn indexes(&self) -> StorageResult<Vec<String>> {
        Ok(self.config.indexed_fields())
    }

    async fn unique_indexes(&self) -> StorageResult<Vec<String>> {
        Ok(self.config.unique_fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::query::{Condition, Operators, Projection, SortKey};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        sku: String,
        #[serde(default)]
        qty: u32,
        #[serde(default)]
        tag: Option<String>,
    }

    fn item(sku: &str, qty: u32) -> Item {
        Item {
            sku: sku.to_string(),
            qty,
            tag: None,
        }
    }

    async fn engine() -> MemoryEngine<Item> {
        let config = MemoryEngineConfig::new("items")
            .with_index(IndexDefinition::unique("sku_unique", ["sku"]));
        let engine = MemoryEngine::new(config).unwrap();
        engine.connect().await.unwrap();
        engine
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let engine = MemoryEngine::<Item>::in_memory();
        let err = engine.find(None).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Connection(ConnectionError::NotConnected { .. })
        ));
        assert!(engine.create(item("a", 1)).await.is_err());
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let engine = MemoryEngine::<Item>::in_memory();
        let first = engine.connect().await.unwrap();
        let second = engine.connect().await.unwrap();
        assert_eq!(first, second);

        engine.disconnect().await.unwrap();
        engine.disconnect().await.unwrap();
        assert!(!engine.is_connected());

        let third = engine.connect().await.unwrap();
        assert_ne!(first.id, third.id);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let err = MemoryEngine::<Item>::new(MemoryEngineConfig::new("")).unwrap_err();
        assert!(err.to_string().contains("invalid configuration"));
    }

    #[tokio::test]
    async fn test_duplicate_create_is_constraint_violation() {
        let engine = engine().await;
        engine.create(item("a", 1)).await.unwrap();
        let err = engine.create(item("a", 2)).await.unwrap_err();
        assert!(err.is_constraint_violation());
        match err {
            StorageError::Constraint(violation) => {
                assert_eq!(violation.index, "sku_unique");
                assert_eq!(violation.fields, vec!["sku"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_update_merges_and_checks_uniqueness() {
        let engine = engine().await;
        engine.create(item("a", 1)).await.unwrap();
        engine.create(item("b", 1)).await.unwrap();

        let by_sku = QueryFilter::new().with_condition(Condition::eq("sku", "a"));
        let updated = engine
            .update(&by_sku, &Patch::new().set("tag", "hot"))
            .await
            .unwrap();
        assert_eq!(updated[0].tag.as_deref(), Some("hot"));
        assert_eq!(updated[0].qty, 1);

        let err = engine
            .update(&by_sku, &Patch::new().set("sku", "b"))
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(engine.count(Some(&by_sku)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_with_no_match_returns_empty() {
        let engine = engine().await;
        let none = QueryFilter::new().with_condition(Condition::eq("sku", "zzz"));
        let updated = engine.update(&none, &Patch::new().set("qty", 9)).await.unwrap();
        assert!(updated.is_empty());
    }

    #[tokio::test]
    async fn test_unique_index_distinguishes_large_integers() {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct Ledger {
            balance: u64,
        }

        let config = MemoryEngineConfig::new("ledgers")
            .with_index(IndexDefinition::unique("balance_unique", ["balance"]));
        let engine = MemoryEngine::<Ledger>::new(config).unwrap();
        engine.connect().await.unwrap();

        engine
            .create(Ledger {
                balance: 9_007_199_254_740_992,
            })
            .await
            .unwrap();
        engine
            .create(Ledger {
                balance: 9_007_199_254_740_993,
            })
            .await
            .unwrap();
        assert_eq!(engine.count(None).await.unwrap(), 2);

        let exact = QueryFilter::new()
            .with_condition(Condition::eq("balance", 9_007_199_254_740_993_u64));
        assert_eq!(engine.count(Some(&exact)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_regex_fails_on_empty_collection() {
        let engine = engine().await;
        let filter = QueryFilter::new()
            .with_condition(Condition::new("sku", Operators::new().regex("(")));
        let err = engine.find(Some(&filter)).await.unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
    }

    #[tokio::test]
    async fn test_delete_counts_matches() {
        let engine = engine().await;
        for (sku, qty) in [("a", 1), ("b", 5), ("c", 9)] {
            engine.create(item(sku, qty)).await.unwrap();
        }
        let small =
            QueryFilter::new().with_condition(Condition::new("qty", Operators::new().lt(6)));
        let summary = engine.delete(Some(&small)).await.unwrap();
        assert_eq!(summary.deleted_count, 2);
        assert_eq!(engine.find(None).await.unwrap(), vec![item("c", 9)]);

        let all = engine.delete(None).await.unwrap();
        assert_eq!(all.deleted_count, 1);
    }

    #[tokio::test]
    async fn test_find_sorts_before_paging() {
        let engine = engine().await;
        for (sku, qty) in [("a", 3), ("b", 1), ("c", 2), ("d", 4)] {
            engine.create(item(sku, qty)).await.unwrap();
        }
        let filter = QueryFilter::new()
            .with_sort(SortKey::descending("qty"))
            .with_page(2)
            .with_limit(2);
        let page = engine.find(Some(&filter)).await.unwrap();
        assert_eq!(page, vec![item("c", 2), item("b", 1)]);
    }

    #[tokio::test]
    async fn test_find_projection() {
        let engine = engine().await;
        engine.create(item("a", 3)).await.unwrap();
        let filter = QueryFilter::new().with_projection(Projection::Include(vec!["sku".into()]));
        let found = engine.find(Some(&filter)).await.unwrap();
        assert_eq!(found, vec![item("a", 0)]);
    }

    #[tokio::test]
    async fn test_index_listing() {
        let engine = engine().await;
        assert_eq!(engine.indexes().await.unwrap(), vec!["sku"]);
        assert_eq!(engine.unique_indexes().await.unwrap(), vec!["sku"]);
        assert!(engine.supports(EngineCapability::UniqueIndexListing));
    }
}
