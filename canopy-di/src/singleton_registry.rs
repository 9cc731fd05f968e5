//! Storage of shared bean instances, including singletons which are still being created and can
//! hand out early references to break circular dependencies.
//!
//! Each bean name moves through a small state machine: no record, then in creation (optionally
//! with an early reference factory or an already resolved early reference), then published. All
//! transitions happen under a single mutex, so readers never observe a half-updated record.

use crate::disposable::DisposableBeanAdapter;
use crate::error::BeanError;
use crate::instance::BeanInstance;
use fxhash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use tracing::{debug, trace};

pub(crate) type EarlyReferenceFactory =
    Box<dyn FnOnce() -> Result<BeanInstance, BeanError> + Send>;

enum EarlyReference {
    None,
    Factory(EarlyReferenceFactory),
    Resolved(BeanInstance),
}

enum SingletonRecord {
    InCreation(EarlyReference),
    Published(BeanInstance),
}

/// Result of looking up a singleton.
pub(crate) enum SingletonLookup {
    Absent,
    /// In creation, with no early reference available.
    InCreation,
    /// In creation, with an early reference already handed out or just resolved.
    Early(BeanInstance),
    Published(BeanInstance),
}

#[derive(Default)]
struct Records {
    records: FxHashMap<String, SingletonRecord>,
    published: Vec<String>,
}

#[derive(Default)]
struct Dependencies {
    /// bean -> beans which depend on it
    dependents: FxHashMap<String, FxHashSet<String>>,
    /// bean -> beans it depends on
    dependencies: FxHashMap<String, FxHashSet<String>>,
}

#[derive(Default)]
struct LockState {
    owner: Option<ThreadId>,
    depth: usize,
}

/// Reentrant lock serializing singleton creation. The owning thread can enter it again when
/// creating dependencies, while other threads wait for the whole creation to finish.
#[derive(Default)]
pub(crate) struct CreationLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl CreationLock {
    pub(crate) fn lock(&self) -> CreationGuard<'_> {
        let current = thread::current().id();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match state.owner {
                None => {
                    state.owner = Some(current);
                    state.depth = 1;
                    break;
                }
                Some(owner) if owner == current => {
                    state.depth += 1;
                    break;
                }
                Some(_) => {
                    state = self
                        .released
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }

        CreationGuard { lock: self }
    }

    pub(crate) fn is_held_by_current_thread(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .owner
            == Some(thread::current().id())
    }
}

pub(crate) struct CreationGuard<'a> {
    lock: &'a CreationLock,
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        let mut state = self
            .lock
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.owner = None;
            self.lock.released.notify_all();
        }
    }
}

/// Shared registry of singleton instances, their dependency edges and destruction callbacks.
#[derive(Default)]
pub(crate) struct SingletonRegistry {
    records: Mutex<Records>,
    dependencies: Mutex<Dependencies>,
    disposables: Mutex<Vec<DisposableBeanAdapter>>,
    creation_lock: CreationLock,
    destroying: AtomicBool,
}

impl SingletonRegistry {
    fn records(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dependencies(&self) -> MutexGuard<'_, Dependencies> {
        self.dependencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub(crate) fn creation_lock(&self) -> &CreationLock {
        &self.creation_lock
    }

    /// Returns a fully created singleton, without waiting for any creation in progress.
    pub(crate) fn published(&self, name: &str) -> Option<BeanInstance> {
        match self.records().records.get(name) {
            Some(SingletonRecord::Published(instance)) => Some(instance.clone()),
            _ => None,
        }
    }

    /// Looks up a singleton. With `allow_early_reference`, a pending early reference factory is
    /// invoked (at most once) and its result cached. Must be called with the creation lock held,
    /// since records in creation belong to the lock owner.
    pub(crate) fn lookup(
        &self,
        name: &str,
        allow_early_reference: bool,
    ) -> Result<SingletonLookup, BeanError> {
        let factory = {
            let mut records = self.records();
            match records.records.get_mut(name) {
                None => return Ok(SingletonLookup::Absent),
                Some(SingletonRecord::Published(instance)) => {
                    return Ok(SingletonLookup::Published(instance.clone()))
                }
                Some(SingletonRecord::InCreation(EarlyReference::Resolved(instance))) => {
                    return Ok(SingletonLookup::Early(instance.clone()))
                }
                Some(SingletonRecord::InCreation(early_reference)) => {
                    if !allow_early_reference {
                        return Ok(SingletonLookup::InCreation);
                    }

                    match std::mem::replace(early_reference, EarlyReference::None) {
                        EarlyReference::Factory(factory) => factory,
                        _ => return Ok(SingletonLookup::InCreation),
                    }
                }
            }
        };

        trace!(bean = name, "Resolving early reference.");
        let instance = factory()?;

        let mut records = self.records();
        if let Some(SingletonRecord::InCreation(early_reference)) = records.records.get_mut(name) {
            *early_reference = EarlyReference::Resolved(instance.clone());
        }

        Ok(SingletonLookup::Early(instance))
    }

    /// Marks a singleton as being created. Fails if it already is.
    pub(crate) fn begin_creation(&self, name: &str) -> Result<(), BeanError> {
        let mut records = self.records();
        if records.records.contains_key(name) {
            return Err(BeanError::CircularReference {
                name: name.to_string(),
                reason: "Requested bean is currently in creation: Is there an unresolvable circular reference?"
                    .to_string(),
            });
        }

        records.records.insert(
            name.to_string(),
            SingletonRecord::InCreation(EarlyReference::None),
        );
        Ok(())
    }

    pub(crate) fn is_in_creation(&self, name: &str) -> bool {
        matches!(
            self.records().records.get(name),
            Some(SingletonRecord::InCreation(_))
        )
    }

    /// Registers a factory producing the early reference of a singleton in creation.
    pub(crate) fn add_early_reference_factory(&self, name: &str, factory: EarlyReferenceFactory) {
        if let Some(SingletonRecord::InCreation(early_reference)) =
            self.records().records.get_mut(name)
        {
            *early_reference = EarlyReference::Factory(factory);
        }
    }

    /// Returns the early reference of a singleton in creation, if one has been handed out.
    pub(crate) fn resolved_early_reference(&self, name: &str) -> Option<BeanInstance> {
        match self.records().records.get(name) {
            Some(SingletonRecord::InCreation(EarlyReference::Resolved(instance))) => {
                Some(instance.clone())
            }
            _ => None,
        }
    }

    pub(crate) fn publish(&self, name: &str, instance: BeanInstance) {
        let mut records = self.records();
        if !matches!(
            records.records.insert(name.to_string(), SingletonRecord::Published(instance)),
            Some(SingletonRecord::Published(_))
        ) {
            records.published.push(name.to_string());
        }
    }

    /// Removes any trace of a failed creation.
    pub(crate) fn abort_creation(&self, name: &str) {
        let mut records = self.records();
        if matches!(
            records.records.get(name),
            Some(SingletonRecord::InCreation(_))
        ) {
            records.records.remove(name);
        }
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.published(name).is_some()
    }

    /// Names of published singletons, in publication order.
    pub(crate) fn names(&self) -> Vec<String> {
        self.records().published.clone()
    }

    /// Records that `dependent` depends on `name`.
    pub(crate) fn register_dependent(&self, name: &str, dependent: &str) {
        if name == dependent {
            return;
        }

        let mut dependencies = self.dependencies();
        dependencies
            .dependents
            .entry(name.to_string())
            .or_default()
            .insert(dependent.to_string());
        dependencies
            .dependencies
            .entry(dependent.to_string())
            .or_default()
            .insert(name.to_string());
    }

    pub(crate) fn dependents(&self, name: &str) -> Vec<String> {
        let mut dependents: Vec<String> = self
            .dependencies()
            .dependents
            .get(name)
            .map(|dependents| dependents.iter().cloned().collect())
            .unwrap_or_default();
        dependents.sort();
        dependents
    }

    pub(crate) fn dependencies_of(&self, name: &str) -> Vec<String> {
        let mut dependencies: Vec<String> = self
            .dependencies()
            .dependencies
            .get(name)
            .map(|dependencies| dependencies.iter().cloned().collect())
            .unwrap_or_default();
        dependencies.sort();
        dependencies
    }

    pub(crate) fn has_dependents(&self, name: &str) -> bool {
        self.dependencies()
            .dependents
            .get(name)
            .map(|dependents| !dependents.is_empty())
            .unwrap_or(false)
    }

    /// Checks if `dependent` depends on `name`, directly or transitively.
    pub(crate) fn is_dependent(&self, name: &str, dependent: &str) -> bool {
        let dependencies = self.dependencies();
        let mut visited = FxHashSet::default();
        let mut pending = vec![name.to_string()];
        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }

            if let Some(dependents) = dependencies.dependents.get(&current) {
                if dependents.contains(dependent) {
                    return true;
                }
                pending.extend(dependents.iter().cloned());
            }
        }
        false
    }

    pub(crate) fn register_disposable(&self, adapter: DisposableBeanAdapter) {
        self.disposables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(adapter);
    }

    #[inline]
    pub(crate) fn is_destroying(&self) -> bool {
        self.destroying.load(Ordering::Acquire)
    }

    /// Destroys all singletons in reverse registration order.
    pub(crate) fn destroy_singletons(&self) {
        self.destroying.store(true, Ordering::Release);
        debug!("Destroying singletons.");

        let names: Vec<String> = self
            .disposables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|adapter| adapter.name().to_string())
            .collect();

        for name in names.iter().rev() {
            self.destroy_singleton(name);
        }

        {
            let mut records = self.records();
            records.records.clear();
            records.published.clear();
        }

        let mut dependencies = self.dependencies();
        dependencies.dependents.clear();
        dependencies.dependencies.clear();
        drop(dependencies);

        self.destroying.store(false, Ordering::Release);
    }

    /// Destroys a single singleton, after all beans depending on it.
    pub(crate) fn destroy_singleton(&self, name: &str) {
        {
            let mut records = self.records();
            records.records.remove(name);
            records.published.retain(|published| published != name);
        }

        let adapter = {
            let mut disposables = self
                .disposables
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            disposables
                .iter()
                .position(|adapter| adapter.name() == name)
                .map(|index| disposables.remove(index))
        };

        let dependents = {
            let mut dependencies = self.dependencies();
            dependencies.dependents.remove(name).unwrap_or_default()
        };

        let mut dependents: Vec<String> = dependents.into_iter().collect();
        dependents.sort();
        for dependent in dependents {
            self.destroy_singleton(&dependent);
        }

        if let Some(adapter) = adapter {
            adapter.destroy();
        }

        let mut dependencies = self.dependencies();
        for dependents in dependencies.dependents.values_mut() {
            dependents.remove(name);
        }
        dependencies.dependents.retain(|_, dependents| !dependents.is_empty());
        dependencies.dependencies.remove(name);
    }
}
