//! Bean instances are contained in scopes - containers which decide when to reuse or create an
//! instance. Singletons live in the factory itself and prototypes are never stored, while other
//! scopes are registered by name, e.g. [ThreadScope], which ties instances to the calling thread.
//!
//! Note: scope resolution happens at injection time, so a [singleton](SINGLETON) bean depending on
//! a [prototype](PROTOTYPE) one keeps the single instance it received for as long as it lives.

use crate::instance::BeanInstance;
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};

pub type ScopePtr = Box<dyn Scope + Send + Sync>;

/// Name of the scope of shared instances, managed by the factory.
pub const SINGLETON: &str = "singleton";

/// Name of the scope which creates a new instance on each request.
pub const PROTOTYPE: &str = "prototype";

/// Name of the built-in [ThreadScope].
pub const THREAD: &str = "thread";

/// A custom scope containing bean instances. See module documentation for information on scopes.
#[cfg_attr(test, automock)]
pub trait Scope {
    /// Gets an instance of given bean, if available in this scope.
    fn instance(&self, name: &str) -> Option<BeanInstance>;

    /// Stores given instance in the scope. The scope might not support storing instances and ignore
    /// it.
    fn store_instance(&self, name: &str, instance: BeanInstance);

    /// Removes an instance from the scope, returning it if it was present.
    fn remove(&self, name: &str) -> Option<BeanInstance>;
}

/// Scope holding a separate instance of each bean per thread.
#[derive(Default)]
pub struct ThreadScope {
    instances: Mutex<FxHashMap<(ThreadId, String), BeanInstance>>,
}

impl ThreadScope {
    fn key(name: &str) -> (ThreadId, String) {
        (thread::current().id(), name.to_string())
    }
}

impl Scope for ThreadScope {
    fn instance(&self, name: &str) -> Option<BeanInstance> {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&Self::key(name))
            .cloned()
    }

    fn store_instance(&self, name: &str, instance: BeanInstance) {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(Self::key(name), instance);
    }

    fn remove(&self, name: &str) -> Option<BeanInstance> {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&Self::key(name))
    }
}
