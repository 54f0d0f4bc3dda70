//! Configuration for the in-memory engine.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::EngineConfig;

/// An index over one or more fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name, reported in constraint violations.
    pub name: String,

    /// Indexed fields. A unique index constrains the combination.
    pub fields: Vec<String>,

    /// Whether the field combination must be unique.
    #[serde(default)]
    pub unique: bool,
}

impl IndexDefinition {
    /// Creates a unique index.
    pub fn unique<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            unique: true,
        }
    }

    /// Creates a non-unique index.
    pub fn non_unique<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            unique: false,
            ..Self::unique(name, fields)
        }
    }
}

/// Configuration for [`MemoryEngine`](super::MemoryEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEngineConfig {
    /// Collection name, used in logs and errors.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Declared indexes.
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,

    /// Connection settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_collection() -> String {
    "default".to_string()
}

impl Default for MemoryEngineConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            indexes: Vec::new(),
            engine: EngineConfig::new("memory://"),
        }
    }
}

impl MemoryEngineConfig {
    /// Creates a configuration for the named collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// Adds an index.
    pub fn with_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    /// Sets the connection settings.
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection.trim().is_empty() {
            return Err(ConfigError::EmptyCollection);
        }

        let mut names = HashSet::new();
        for index in &self.indexes {
            if index.fields.is_empty() {
                return Err(ConfigError::EmptyIndex(index.name.clone()));
            }
            if !names.insert(index.name.as_str()) {
                return Err(ConfigError::DuplicateIndexName(index.name.clone()));
            }
        }

        Ok(())
    }

    /// Every indexed field, in declaration order, without duplicates.
    pub fn indexed_fields(&self) -> Vec<String> {
        flatten(self.indexes.iter())
    }

    /// Every uniquely indexed field, in declaration order, without duplicates.
    pub fn unique_fields(&self) -> Vec<String> {
        flatten(self.indexes.iter().filter(|i| i.unique))
    }
}

fn flatten<'a>(indexes: impl Iterator<Item = &'a IndexDefinition>) -> Vec<String> {
    let mut seen = HashSet::new();
    indexes
        .flat_map(|index| index.fields.iter())
        .filter(|field| seen.insert(field.as_str()))
        .cloned()
        .collect()
}

/// Invalid engine configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The collection name is blank.
    #[error("collection name must not be empty")]
    EmptyCollection,

    /// An index declares no fields.
    #[error("index '{0}' has no fields")]
    EmptyIndex(String),

    /// Two indexes share a name.
    #[error("duplicate index name: {0}")]
    DuplicateIndexName(String),
}
