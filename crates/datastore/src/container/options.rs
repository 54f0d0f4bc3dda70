//! Registration options for the instance container.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A type-erased registered instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Produces an instance on demand.
pub type Factory = Arc<dyn Fn() -> Instance + Send + Sync>;

/// Outcome of a lifecycle hook. The error carries a human-readable reason.
pub type HookResult = Result<(), String>;

/// A lifecycle hook.
pub type Hook = Arc<dyn Fn() -> HookResult + Send + Sync>;

/// What gets registered under a key.
#[derive(Clone)]
pub enum Provider {
    /// A ready-made instance.
    Instance(Instance),
    /// A factory producing the instance.
    Factory(Factory),
}

impl Provider {
    /// Wraps a value as a ready-made instance.
    pub fn instance<T: Any + Send + Sync>(value: T) -> Self {
        Provider::Instance(Arc::new(value))
    }

    /// Wraps an already shared value.
    pub fn shared<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Provider::Instance(value)
    }

    /// Wraps a factory closure.
    pub fn factory<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Provider::Factory(Arc::new(move || Arc::new(factory()) as Instance))
    }

    /// Produces the instance, invoking the factory if there is one.
    pub(crate) fn materialize(&self) -> Instance {
        match self {
            Provider::Instance(instance) => Arc::clone(instance),
            Provider::Factory(factory) => factory(),
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Instance(_) => f.write_str("Provider::Instance"),
            Provider::Factory(_) => f.write_str("Provider::Factory"),
        }
    }
}

/// How many registrations a key may receive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifetime {
    /// One registration per key; a second one is rejected.
    #[default]
    Singleton,
    /// Each registration replaces the previous one.
    Transient,
}

/// When the instance is materialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// At registration, running the create hooks immediately.
    #[default]
    Eager,
    /// On every resolve, running `before_create` each time.
    Lazy,
}

/// Optional hooks around an instance's lifecycle.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    /// Runs before the instance is materialized.
    pub before_create: Option<Hook>,
    /// Runs after an eager instance is stored.
    pub after_create: Option<Hook>,
    /// Runs when the owning container is destroyed.
    pub on_destroy: Option<Hook>,
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("before_create", &self.before_create.is_some())
            .field("after_create", &self.after_create.is_some())
            .field("on_destroy", &self.on_destroy.is_some())
            .finish()
    }
}

/// Options for [`Container::register`](super::Container::register).
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Registration lifetime.
    pub lifetime: Lifetime,
    /// Materialization timing.
    pub activation: Activation,
    /// Lifecycle hooks.
    pub hooks: LifecycleHooks,
}

impl RegisterOptions {
    /// Default options: eager singleton, no hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lifetime.
    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Sets the activation.
    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Shorthand for a transient registration.
    pub fn transient(self) -> Self {
        self.with_lifetime(Lifetime::Transient)
    }

    /// Shorthand for a lazy registration.
    pub fn lazy(self) -> Self {
        self.with_activation(Activation::Lazy)
    }

    /// Sets the `before_create` hook.
    pub fn with_before_create<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> HookResult + Send + Sync + 'static,
    {
        self.hooks.before_create = Some(Arc::new(hook));
        self
    }

    /// Sets the `after_create` hook.
    pub fn with_after_create<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> HookResult + Send + Sync + 'static,
    {
        self.hooks.after_create = Some(Arc::new(hook));
        self
    }

    /// Sets the `on_destroy` hook.
    pub fn with_on_destroy<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> HookResult + Send + Sync + 'static,
    {
        self.hooks.on_destroy = Some(Arc::new(hook));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = RegisterOptions::new();
        assert_eq!(options.lifetime, Lifetime::Singleton);
        assert_eq!(options.activation, Activation::Eager);
        assert!(options.hooks.before_create.is_none());
    }

    #[test]
    fn test_builders() {
        let options = RegisterOptions::new()
            .transient()
            .lazy()
            .with_on_destroy(|| Ok(()));
        assert_eq!(options.lifetime, Lifetime::Transient);
        assert_eq!(options.activation, Activation::Lazy);
        assert!(options.hooks.on_destroy.is_some());
        assert_eq!(
            format!("{:?}", options.hooks),
            "LifecycleHooks { before_create: false, after_create: false, on_destroy: true }"
        );
    }

    #[test]
    fn test_factory_runs_on_each_materialize() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let provider = Provider::factory(move || counter.fetch_add(1, Ordering::SeqCst));
        provider.materialize();
        provider.materialize();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_lifetime_serde() {
        assert_eq!(
            serde_json::to_string(&Lifetime::Transient).unwrap(),
            "\"transient\""
        );
        let activation: Activation = serde_json::from_str("\"lazy\"").unwrap();
        assert_eq!(activation, Activation::Lazy);
    }
}
