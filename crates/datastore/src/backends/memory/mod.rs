//! Reference in-process engine.
//!
//! [`MemoryEngine`] stores entities as serialized documents and evaluates
//! compiled filters itself. It is useful for tests and for embedding the data
//! access layer without an external store.

pub mod config;
pub mod engine;
pub mod matcher;

pub use config::{ConfigError, IndexDefinition, MemoryEngineConfig};
pub use engine::{MemoryConnection, MemoryEngine};
