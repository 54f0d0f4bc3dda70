//! Core storage abstractions.
//!
//! - [`StorageEngine`] - the contract every backing store implements
//! - [`EngineCapability`] - optional engine capabilities
//! - [`Entity`] - records that can be stored, seen through their serde form
//! - [`Patch`] - shallow partial updates
//!
//! # Capabilities
//!
//! Index listing is optional. Check for it before relying on it:
//!
//! ```ignore
//! use helios_datastore::core::{EngineCapability, StorageEngine};
//!
//! fn can_reconcile<E: StorageEngine>(engine: &E) -> bool {
//!     engine.supports(EngineCapability::UniqueIndexListing)
//! }
//! ```

pub mod engine;
pub mod entity;

pub use engine::{EngineCapability, EngineConfig, StorageEngine, unsupported};
pub use entity::{DeleteSummary, Document, Entity, Patch};
