//! Hierarchical instance container.
//!
//! A [`Container`] maps opaque keys to instances (typically data stores) and
//! governs when they are created and how they are torn down. Containers form
//! a tree: [`resolve`](Container::resolve) and [`destroy`](Container::destroy)
//! walk into child containers, while registration is always local.
//!
//! Containers are plain values owned by the caller; there is no global
//! instance.
//!
//! # Example
//!
//! ```
//! use helios_datastore::container::{Container, Provider, RegisterOptions};
//!
//! let root = Container::new();
//! let child = root.create_child_container();
//! child
//!     .register("audit", Provider::instance(String::from("audit-store")), RegisterOptions::new())
//!     .unwrap();
//!
//! let store = root.resolve_as::<String>("audit").unwrap();
//! assert_eq!(store.as_str(), "audit-store");
//! ```

mod options;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{ContainerError, ContainerResult};

pub use options::{
    Activation, Factory, Hook, HookResult, Instance, LifecycleHooks, Lifetime, Provider,
    RegisterOptions,
};

/// Change notification emitted by a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerEvent {
    /// An instance was registered under the key.
    Registered(String),
    /// The key was unregistered.
    Unregistered(String),
    /// A child container was created.
    ChildCreated,
    /// The container was destroyed.
    Destroyed,
}

/// What a key currently holds.
#[derive(Clone)]
enum Slot {
    /// Materialized at registration.
    Ready(Instance),
    /// Materialized on each resolve.
    Deferred(Provider),
}

#[derive(Clone)]
struct Entry {
    slot: Slot,
    hooks: LifecycleHooks,
}

/// Registrations are kept in registration order.
#[derive(Default)]
struct State {
    entries: Vec<(String, Entry)>,
    children: Vec<Arc<Container>>,
}

impl State {
    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    fn get(&self, key: &str) -> Option<&Entry> {
        self.position(key).map(|i| &self.entries[i].1)
    }
}

/// A registry of named instances with parent/child scoping.
///
/// Hooks and factories run without any lock held, so they may call back into
/// the container.
pub struct Container {
    state: RwLock<State>,
    events: broadcast::Sender<ContainerEvent>,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Container")
            .field("keys", &state.entries.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .field("children", &state.children.len())
            .finish()
    }
}

impl Container {
    /// Creates an empty container.
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            state: RwLock::new(State::default()),
            events,
        })
    }

    /// Registers an instance under `key`.
    ///
    /// A singleton registration fails if the key is taken, leaving the
    /// existing instance in place. The check is repeated when the instance
    /// is stored, so a hook that registers the same key wins. A transient
    /// registration replaces the existing instance in its original position.
    ///
    /// Eager registrations materialize the instance now: `before_create`
    /// runs, the instance is stored, then `after_create` runs. A failing hook
    /// makes the call return [`ContainerError::LifecycleHook`] but the
    /// instance remains registered. Lazy registrations only store the
    /// provider; hooks run on resolve.
    pub fn register(
        &self,
        key: impl Into<String>,
        provider: Provider,
        options: RegisterOptions,
    ) -> ContainerResult<()> {
        let key = key.into();

        if options.lifetime == Lifetime::Singleton && self.contains(&key) {
            return Err(ContainerError::AlreadyRegistered { key });
        }

        let RegisterOptions {
            lifetime,
            activation,
            hooks,
        } = options;

        match activation {
            Activation::Lazy => self.store(&key, lifetime, Slot::Deferred(provider), hooks),
            Activation::Eager => {
                let before = run_hook(&key, "before_create", hooks.before_create.as_ref());
                let instance = provider.materialize();
                let after_create = hooks.after_create.clone();
                self.store(&key, lifetime, Slot::Ready(instance), hooks)?;

                before?;
                run_hook(&key, "after_create", after_create.as_ref())
            }
        }
    }

    fn store(
        &self,
        key: &str,
        lifetime: Lifetime,
        slot: Slot,
        hooks: LifecycleHooks,
    ) -> ContainerResult<()> {
        let entry = Entry { slot, hooks };
        {
            let mut state = self.state.write();
            match state.position(key) {
                Some(_) if lifetime == Lifetime::Singleton => {
                    return Err(ContainerError::AlreadyRegistered {
                        key: key.to_string(),
                    });
                }
                Some(i) => state.entries[i].1 = entry,
                None => state.entries.push((key.to_string(), entry)),
            }
        }
        debug!(key, "Registered instance");
        let _ = self.events.send(ContainerEvent::Registered(key.to_string()));
        Ok(())
    }

    /// Resolves `key`, searching this container first and then each child in
    /// creation order, depth first.
    ///
    /// A lazy registration runs `before_create` and its provider on every
    /// call. If no container holds the key, fails with
    /// [`ContainerError::NotFound`]; if the key was found but produced an
    /// error, the first such error is returned.
    pub fn resolve(&self, key: &str) -> ContainerResult<Instance> {
        let (local, children) = {
            let state = self.state.read();
            (state.get(key).cloned(), state.children.clone())
        };

        if let Some(entry) = local {
            return match entry.slot {
                Slot::Ready(instance) => Ok(instance),
                Slot::Deferred(provider) => {
                    run_hook(key, "before_create", entry.hooks.before_create.as_ref())?;
                    Ok(provider.materialize())
                }
            };
        }

        let mut first_error = None;
        for child in children {
            match child.resolve(key) {
                Ok(instance) => return Ok(instance),
                Err(ContainerError::NotFound { .. }) => {}
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        Err(first_error.unwrap_or_else(|| ContainerError::NotFound {
            key: key.to_string(),
        }))
    }

    /// Resolves `key` and downcasts it to `T`.
    pub fn resolve_as<T: Any + Send + Sync>(&self, key: &str) -> ContainerResult<Arc<T>> {
        self.resolve(key)?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Removes a local registration. Children are not consulted.
    pub fn unregister(&self, key: &str) -> ContainerResult<()> {
        {
            let mut state = self.state.write();
            let Some(i) = state.position(key) else {
                return Err(ContainerError::NotFound {
                    key: key.to_string(),
                });
            };
            state.entries.remove(i);
        }
        debug!(key, "Unregistered instance");
        let _ = self.events.send(ContainerEvent::Unregistered(key.to_string()));
        Ok(())
    }

    /// Tears down this container and all of its children.
    ///
    /// Runs every local `on_destroy` hook in registration order, destroys
    /// every child, then clears all instances and children. Teardown always
    /// runs to completion; the failures collected along the way are returned
    /// together as [`ContainerError::Teardown`].
    pub fn destroy(&self) -> ContainerResult<()> {
        let (hooks, children) = {
            let state = self.state.read();
            let hooks: Vec<(String, Option<Hook>)> = state
                .entries
                .iter()
                .map(|(key, entry)| (key.clone(), entry.hooks.on_destroy.clone()))
                .collect();
            (hooks, state.children.clone())
        };

        let mut failures = Vec::new();
        for (key, hook) in &hooks {
            if let Err(err) = run_hook(key, "on_destroy", hook.as_ref()) {
                failures.push(err.to_string());
            }
        }
        for child in &children {
            match child.destroy() {
                Ok(()) => {}
                Err(ContainerError::Teardown { failures: nested }) => failures.extend(nested),
                Err(err) => failures.push(err.to_string()),
            }
        }

        {
            let mut state = self.state.write();
            state.entries.clear();
            state.children.clear();
        }
        debug!(
            instances = hooks.len(),
            children = children.len(),
            failures = failures.len(),
            "Destroyed container"
        );
        let _ = self.events.send(ContainerEvent::Destroyed);

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ContainerError::Teardown { failures })
        }
    }

    /// Creates a child container owned by this one.
    pub fn create_child_container(&self) -> Arc<Container> {
        let child = Container::new();
        self.state.write().children.push(Arc::clone(&child));
        let _ = self.events.send(ContainerEvent::ChildCreated);
        child
    }

    /// Returns true if `key` is registered locally.
    pub fn contains(&self, key: &str) -> bool {
        self.state.read().position(key).is_some()
    }

    /// Returns the number of local registrations.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Returns true if nothing is registered locally.
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Returns the locally registered keys in registration order.
    pub fn keys(&self) -> Vec<String> {
        self.state.read().entries.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Returns the child containers in creation order.
    pub fn children(&self) -> Vec<Arc<Container>> {
        self.state.read().children.clone()
    }

    /// Subscribes to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ContainerEvent> {
        self.events.subscribe()
    }
}

fn run_hook(key: &str, hook: &'static str, callback: Option<&Hook>) -> ContainerResult<()> {
    let Some(callback) = callback else {
        return Ok(());
    };
    callback().map_err(|message| {
        warn!(key, hook, error = %message, "Lifecycle hook failed");
        ContainerError::LifecycleHook {
            key: key.to_string(),
            hook,
            message,
        }
    })
}
