//! Entity fixtures.

use std::sync::Once;

use helios_datastore::backends::memory::{IndexDefinition, MemoryEngine, MemoryEngineConfig};
use helios_datastore::core::StorageEngine;
use serde::{Deserialize, Serialize};

/// A user keyed by a unique email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub email: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl User {
    pub fn new(email: &str, name: &str, age: u32) -> Self {
        Self {
            email: Some(email.to_string()),
            name: name.to_string(),
            age,
            tags: Vec::new(),
        }
    }

    pub fn anonymous(name: &str) -> Self {
        Self {
            email: None,
            name: name.to_string(),
            age: 0,
            tags: Vec::new(),
        }
    }
}

/// `count` users named `user-01`, `user-02`, ... aged 1, 2, ...
pub fn numbered_users(count: u32) -> Vec<User> {
    (1..=count)
        .map(|n| User::new(&format!("user{:02}@example.com", n), &format!("user-{:02}", n), n))
        .collect()
}

pub fn users_config() -> MemoryEngineConfig {
    MemoryEngineConfig::new("users")
        .with_index(IndexDefinition::unique("email_unique", ["email"]))
        .with_index(IndexDefinition::non_unique("age_idx", ["age"]))
}

/// An account keyed by a unique number, carrying a balance beyond `f64` precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub number: String,
    pub balance: u64,
}

impl Account {
    pub fn new(number: &str, balance: u64) -> Self {
        Self {
            number: number.to_string(),
            balance,
        }
    }
}

/// Creates and connects a memory engine over accounts keyed by number.
pub async fn connected_accounts_engine() -> MemoryEngine<Account> {
    init_tracing();
    let config = MemoryEngineConfig::new("accounts")
        .with_index(IndexDefinition::unique("number_unique", ["number"]));
    let engine = MemoryEngine::new(config).expect("valid config");
    engine.connect().await.expect("connect");
    engine
}

/// Creates and connects a memory engine over the users collection.
pub async fn connected_users_engine() -> MemoryEngine<User> {
    init_tracing();
    let engine = MemoryEngine::new(users_config()).expect("valid config");
    engine.connect().await.expect("connect");
    engine
}

/// Installs a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
