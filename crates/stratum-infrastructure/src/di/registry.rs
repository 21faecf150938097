//! Token registry
//!
//! Token → implementation bindings with singleton, transient, and value
//! lifecycles. Lookups that find nothing fail with an error naming the
//! token; the registry never fabricates a default. Duplicate registrations
//! are first-wins: a later registration against a bound token is a logged
//! no-op, and [`clear`](ServiceRegistry::clear) is the only rebind path.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use stratum_domain::error::{Error, Result};

/// Type-erased instance held by the registry
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Type-erased constructor
pub type FactoryFn = Arc<dyn Fn(&ServiceRegistry) -> Result<Instance> + Send + Sync>;

const POISONED: &str = "registry lock poisoned";

/// Binding lifecycle, fixed at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed once on first resolve, cached afterwards
    Singleton,
    /// Constructed fresh on every resolve
    Transient,
    /// A fixed value bound at registration
    Value,
}

#[derive(Clone)]
struct Binding {
    lifecycle: Lifecycle,
    factory: Option<FactoryFn>,
    dependencies: Vec<String>,
    cached: Option<Instance>,
}

/// Token → binding registry
///
/// Written only during the single-threaded bootstrap phase, read during
/// concurrent request handling; the internal lock is never held across a
/// factory call, so factories may resolve their dependencies recursively.
pub struct ServiceRegistry {
    bindings: RwLock<HashMap<String, Binding>>,
}

impl ServiceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            bindings: RwLock::new(HashMap::new()),
        }
    }

    fn bind(&self, token: &str, binding: Binding) -> bool {
        let mut bindings = self.bindings.write().expect(POISONED);
        if bindings.contains_key(token) {
            debug!(token, "token already registered; keeping the first registration");
            return false;
        }
        bindings.insert(token.to_string(), binding);
        true
    }

    pub(crate) fn erase<T, F>(factory: F) -> FactoryFn
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceRegistry) -> Result<T> + Send + Sync + 'static,
    {
        Arc::new(move |registry| Ok(Arc::new(factory(registry)?) as Instance))
    }

    pub(crate) fn bind_erased(
        &self,
        token: &str,
        lifecycle: Lifecycle,
        dependencies: Vec<String>,
        factory: FactoryFn,
    ) -> bool {
        self.bind(
            token,
            Binding {
                lifecycle,
                factory: Some(factory),
                dependencies,
                cached: None,
            },
        )
    }

    /// Register a transient constructor: a new instance on every resolve
    ///
    /// Returns `false` when the token was already bound (first-wins).
    pub fn register<T, F>(&self, token: &str, factory: F) -> bool
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceRegistry) -> Result<T> + Send + Sync + 'static,
    {
        self.bind_erased(token, Lifecycle::Transient, Vec::new(), Self::erase(factory))
    }

    /// Register a singleton constructor: constructed once, cached afterwards
    pub fn register_singleton<T, F>(&self, token: &str, factory: F) -> bool
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceRegistry) -> Result<T> + Send + Sync + 'static,
    {
        self.bind_erased(token, Lifecycle::Singleton, Vec::new(), Self::erase(factory))
    }

    /// Register a singleton with an explicit ordered dependency list
    ///
    /// Every entry in `dependencies` must itself be registered by the time
    /// this token is resolved; a missing entry fails the resolve
    /// immediately, naming both tokens, before anything is constructed.
    pub fn register_with_dependencies<T, F>(
        &self,
        token: &str,
        dependencies: &[&str],
        factory: F,
    ) -> bool
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceRegistry) -> Result<T> + Send + Sync + 'static,
    {
        self.bind_erased(
            token,
            Lifecycle::Singleton,
            dependencies.iter().map(|d| d.to_string()).collect(),
            Self::erase(factory),
        )
    }

    /// Bind a fixed value
    pub fn register_value<T: Send + Sync + 'static>(&self, token: &str, value: T) -> bool {
        self.bind(
            token,
            Binding {
                lifecycle: Lifecycle::Value,
                factory: None,
                dependencies: Vec::new(),
                cached: Some(Arc::new(value) as Instance),
            },
        )
    }

    /// Bind a live instance keyed by its concrete type name
    ///
    /// Used for externally supplied handles (database connections) that
    /// constructors resolve by type during bootstrap.
    pub fn register_instance<T: Send + Sync + 'static>(&self, instance: Arc<T>) -> bool {
        self.bind(
            std::any::type_name::<T>(),
            Binding {
                lifecycle: Lifecycle::Value,
                factory: None,
                dependencies: Vec::new(),
                cached: Some(instance as Instance),
            },
        )
    }

    /// Resolve a live instance by its concrete type name
    pub fn resolve_instance<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolve::<T>(std::any::type_name::<T>())
    }

    /// Resolve a token to its typed instance
    pub fn resolve<T: Send + Sync + 'static>(&self, token: &str) -> Result<Arc<T>> {
        self.resolve_raw(token)?.downcast::<T>().map_err(|_| {
            Error::internal(format!("token '{token}' is bound to a different type"))
                .with_component("registry")
                .with_operation("resolve")
        })
    }

    /// Resolve a token to its type-erased instance
    ///
    /// Fails with `DEPENDENCY_NOT_REGISTERED` when the token is unbound or
    /// any declared dependency is missing; the dependency check runs before
    /// the factory, so nothing is partially constructed.
    pub fn resolve_raw(&self, token: &str) -> Result<Instance> {
        let binding = {
            let bindings = self.bindings.read().expect(POISONED);
            bindings.get(token).cloned()
        }
        .ok_or_else(|| {
            Error::dependency_not_registered(token)
                .with_component("registry")
                .with_operation("resolve")
        })?;

        if let Some(cached) = binding.cached {
            return Ok(cached);
        }

        for dependency in &binding.dependencies {
            if !self.contains(dependency) {
                return Err(Error::missing_dependency(dependency.as_str(), token)
                    .with_component("registry")
                    .with_operation("resolve"));
            }
        }

        let factory = binding.factory.ok_or_else(|| {
            Error::internal(format!("token '{token}' has no factory and no cached value"))
                .with_component("registry")
        })?;

        // No lock is held here; the factory may call back into the registry.
        let instance = factory(self)?;

        if binding.lifecycle == Lifecycle::Singleton {
            let mut bindings = self.bindings.write().expect(POISONED);
            if let Some(entry) = bindings.get_mut(token) {
                if let Some(existing) = &entry.cached {
                    // A racing construction got there first; keep it.
                    return Ok(existing.clone());
                }
                entry.cached = Some(instance.clone());
            }
        }

        Ok(instance)
    }

    /// Whether a token is bound
    pub fn contains(&self, token: &str) -> bool {
        self.bindings.read().expect(POISONED).contains_key(token)
    }

    /// All bound tokens
    pub fn tokens(&self) -> Vec<String> {
        self.bindings.read().expect(POISONED).keys().cloned().collect()
    }

    /// Number of bound tokens
    pub fn len(&self) -> usize {
        self.bindings.read().expect(POISONED).len()
    }

    /// Whether nothing is bound
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard all bindings and cached singletons
    ///
    /// The only reset path; must not be called concurrently with active
    /// resolution.
    pub fn clear(&self) {
        self.bindings.write().expect(POISONED).clear();
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry").field("bindings", &self.len()).finish()
    }
}
