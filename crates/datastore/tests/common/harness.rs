//! Recording engine wrapper.
//!
//! [`RecordingEngine`] forwards to a real engine while counting calls, and
//! can be scripted to hide capabilities, misreport unique indexes, or fail
//! creates. This lets tests observe exactly which engine operations the
//! upsert algorithm performs.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use helios_datastore::core::{DeleteSummary, EngineCapability, Patch, StorageEngine};
use helios_datastore::error::{BackendError, ConstraintViolation, StorageResult};
use helios_datastore::query::QueryFilter;

/// How `create` behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptedCreate {
    /// Forward to the wrapped engine.
    #[default]
    Passthrough,
    /// Always report a duplicate-key violation.
    Conflict,
    /// Always fail with a non-constraint error.
    Fail,
}

/// Per-operation call counters.
#[derive(Debug, Default)]
pub struct CallCounts {
    create: AtomicUsize,
    find: AtomicUsize,
    update: AtomicUsize,
    unique_indexes: AtomicUsize,
}

impl CallCounts {
    pub fn create(&self) -> usize {
        self.create.load(Ordering::SeqCst)
    }

    pub fn find(&self) -> usize {
        self.find.load(Ordering::SeqCst)
    }

    pub fn update(&self) -> usize {
        self.update.load(Ordering::SeqCst)
    }

    pub fn unique_indexes(&self) -> usize {
        self.unique_indexes.load(Ordering::SeqCst)
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

/// A scripted, call-counting wrapper around another engine.
#[derive(Debug)]
pub struct RecordingEngine<E> {
    inner: E,
    capabilities: Option<Vec<EngineCapability>>,
    unique_indexes: Option<Vec<String>>,
    create_mode: ScriptedCreate,
    calls: CallCounts,
}

impl<E: StorageEngine> RecordingEngine<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            capabilities: None,
            unique_indexes: None,
            create_mode: ScriptedCreate::default(),
            calls: CallCounts::default(),
        }
    }

    /// Advertises no optional capabilities.
    pub fn without_capabilities(mut self) -> Self {
        self.capabilities = Some(Vec::new());
        self
    }

    /// Reports these fields from `unique_indexes` instead of the inner engine's.
    pub fn with_unique_indexes(mut self, fields: &[&str]) -> Self {
        self.unique_indexes = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn with_create(mut self, mode: ScriptedCreate) -> Self {
        self.create_mode = mode;
        self
    }

    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

#[async_trait]
impl<E: StorageEngine> StorageEngine for RecordingEngine<E> {
    type Entity = E::Entity;
    type Connection = E::Connection;

    fn name(&self) -> &'static str {
        "recording"
    }

    fn capabilities(&self) -> Vec<EngineCapability> {
        match &self.capabilities {
            Some(capabilities) => capabilities.clone(),
            None => self.inner.capabilities(),
        }
    }

    async fn connect(&self) -> StorageResult<Self::Connection> {
        self.inner.connect().await
    }

    async fn disconnect(&self) -> StorageResult<()> {
        self.inner.disconnect().await
    }

    async fn find(&self, filter: Option<&QueryFilter>) -> StorageResult<Vec<Self::Entity>> {
        bump(&self.calls.find);
        self.inner.find(filter).await
    }

    async fn create(&self, entity: Self::Entity) -> StorageResult<Self::Entity> {
        bump(&self.calls.create);
        match self.create_mode {
            ScriptedCreate::Passthrough => self.inner.create(entity).await,
            ScriptedCreate::Conflict => Err(ConstraintViolation::duplicate_key(
                "scripted",
                vec![],
                "scripted conflict",
            )
            .into()),
            ScriptedCreate::Fail => Err(BackendError::Internal {
                engine: "recording".to_string(),
                message: "disk full".to_string(),
                source: None,
            }
            .into()),
        }
    }

    async fn update(
        &self,
        filter: &QueryFilter,
        patch: &Patch,
    ) -> StorageResult<Vec<Self::Entity>> {
        bump(&self.calls.update);
        self.inner.update(filter, patch).await
    }

    async fn delete(&self, filter: Option<&QueryFilter>) -> StorageResult<DeleteSummary> {
        self.inner.delete(filter).await
    }

    async fn indexes(&self) -> StorageResult<Vec<String>> {
        self.inner.indexes().await
    }

    async fn unique_indexes(&self) -> StorageResult<Vec<String>> {
        bump(&self.calls.unique_indexes);
        match &self.unique_indexes {
            Some(fields) => Ok(fields.clone()),
            None => self.inner.unique_indexes().await,
        }
    }
}
