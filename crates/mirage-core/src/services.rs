//! Named service registry.
//!
//! Services are shared singletons registered by name at startup and
//! resolved by handlers and middleware. Each name maps to a factory that
//! runs at most once, on the first resolution; every later resolution
//! returns the same instance.
//!
//! Registering a name that already exists replaces the previous factory
//! and drops any instance it built. Last registration wins. This lets an
//! application override the framework defaults (for example the `cache`
//! service) by registering its own factory after them.
//!
//! # Example
//!
//! ```rust
//! use mirage_core::ServiceRegistry;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! let registry = ServiceRegistry::new();
//! registry.register("db", || Database { url: "postgres://localhost/app".into() });
//!
//! let db = registry.resolve::<Database>("db").unwrap();
//! assert_eq!(db.url, "postgres://localhost/app");
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use thiserror::Error;

use crate::error::ApiError;

/// Names of the services registered at boot.
pub mod names {
    /// Token authenticator.
    pub const SECURITY: &str = "security";
    /// Application cache.
    pub const CACHE: &str = "cache";
    /// Dev code translator.
    pub const TRANSLATOR: &str = "translator";
    /// Access control list.
    pub const ACL: &str = "acl";
    /// Loaded configuration.
    pub const CONFIG: &str = "config";
}

/// Errors raised when resolving a service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// No factory is registered under the name.
    #[error("Service error: '{name}' is not registered")]
    NotRegistered {
        /// Requested name.
        name: String,
    },

    /// The registered instance is not of the requested type.
    #[error("Service error: '{name}' is not a {expected}")]
    TypeMismatch {
        /// Requested name.
        name: String,
        /// Requested type.
        expected: &'static str,
    },
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotRegistered { ref name } | ServiceError::TypeMismatch { ref name, .. } => {
                Self::service(name.clone(), err.to_string())
            }
        }
    }
}

type Instance = Arc<dyn Any + Send + Sync>;
type Factory = Box<dyn Fn() -> Instance + Send + Sync>;

struct Slot {
    factory: Factory,
    instance: OnceLock<Instance>,
}

impl Slot {
    fn get(&self) -> Instance {
        Arc::clone(self.instance.get_or_init(|| (self.factory)()))
    }
}

/// Registry of named singleton services.
///
/// The registry is `Send + Sync` and is shared behind an `Arc` between the
/// dispatcher and every request. Instances are handed out as `Arc<T>`, so
/// `T` must be safe for concurrent use.
#[derive(Default)]
pub struct ServiceRegistry {
    slots: RwLock<HashMap<String, Arc<Slot>>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `name`.
    ///
    /// The factory runs on first resolution. An existing registration with
    /// the same name is replaced.
    pub fn register<T, F>(&self, name: impl Into<String>, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.insert(
            name.into(),
            Box::new(move || Arc::new(factory()) as Instance),
        );
    }

    /// Registers an already built instance under `name`.
    pub fn register_instance<T>(&self, name: impl Into<String>, instance: Arc<T>)
    where
        T: Send + Sync + 'static,
    {
        let instance: Instance = instance;
        self.insert(name.into(), Box::new(move || Arc::clone(&instance)));
    }

    fn insert(&self, name: String, factory: Factory) {
        let slot = Arc::new(Slot {
            factory,
            instance: OnceLock::new(),
        });
        if self.slots.write().insert(name.clone(), slot).is_some() {
            tracing::debug!(service = %name, "service registration replaced");
        }
    }

    /// Resolves the instance registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotRegistered`] for unknown names and
    /// [`ServiceError::TypeMismatch`] when the instance is not a `T`.
    pub fn resolve<T>(&self, name: &str) -> Result<Arc<T>, ServiceError>
    where
        T: Send + Sync + 'static,
    {
        let slot = self
            .slots
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::NotRegistered {
                name: name.to_string(),
            })?;

        // The lock is released before the factory runs, so factories may
        // resolve other services.
        slot.get()
            .downcast::<T>()
            .map_err(|_| ServiceError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.slots.read().contains_key(name)
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("service_count", &self.len())
            .finish()
    }
}
