//! # helios-datastore
//!
//! A storage-engine-agnostic data access layer.
//!
//! Applications describe queries with a composable [`QueryFilter`], talk to
//! storage through a generic [`DataStore`], and keep their stores in a
//! hierarchical [`Container`]. The backing store is plugged in by
//! implementing [`StorageEngine`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Container                    │
//! │   singleton / transient, eager / lazy,       │
//! │   lifecycle hooks, parent / child scoping    │
//! └──────────────────────┬───────────────────────┘
//!                        │ holds
//! ┌──────────────────────▼───────────────────────┐
//! │                DataStore<E>                  │
//! │   CRUD + create_or_update_by_unique_indexes  │
//! └──────────────────────┬───────────────────────┘
//!                        │ QueryFilter → NativeFilter
//! ┌──────────────────────▼───────────────────────┐
//! │            StorageEngine (trait)             │
//! │   MemoryEngine, or any external store        │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Idempotent writes
//!
//! [`DataStore::create_or_update_by_unique_indexes`] attempts a create and,
//! when the engine reports a uniqueness violation, reconciles it into an
//! update of the records sharing the entity's unique fields. Records that
//! already match are returned without a write.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `memory` | In-process reference engine (default) |
//!
//! ## Quick Start
//!
//! ```
//! use helios_datastore::backends::memory::{IndexDefinition, MemoryEngine, MemoryEngineConfig};
//! use helios_datastore::container::{Container, Provider, RegisterOptions};
//! use helios_datastore::query::{Condition, QueryFilter};
//! use helios_datastore::store::DataStore;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Account {
//!     email: String,
//!     plan: String,
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let config = MemoryEngineConfig::new("accounts")
//!     .with_index(IndexDefinition::unique("email_unique", ["email"]));
//! let store = DataStore::new(MemoryEngine::<Account>::new(config).unwrap());
//! store.connect().await.unwrap();
//!
//! let container = Container::new();
//! container
//!     .register("accounts", Provider::instance(store), RegisterOptions::new())
//!     .unwrap();
//!
//! let accounts = container
//!     .resolve_as::<DataStore<MemoryEngine<Account>>>("accounts")
//!     .unwrap();
//! accounts
//!     .create_or_update_by_unique_indexes(Account {
//!         email: "ada@example.com".into(),
//!         plan: "pro".into(),
//!     })
//!     .await
//!     .unwrap();
//!
//! let pro = QueryFilter::new().with_condition(Condition::eq("plan", "pro"));
//! assert_eq!(accounts.count(Some(&pro)).await.unwrap(), 1);
//! # });
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod container;
pub mod core;
pub mod error;
pub mod query;
pub mod store;

// Re-export commonly used types at crate root
pub use error::{ContainerError, ContainerResult, StorageError, StorageResult};
pub use query::{Condition, NativeFilter, Operators, Projection, QueryFilter, SortKey};

// Re-export core traits
pub use core::{EngineCapability, Entity, Patch, StorageEngine};

pub use container::{Container, Provider, RegisterOptions};
pub use store::DataStore;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
