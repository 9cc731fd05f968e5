//! Per-thread bookkeeping of beans being constructed.

use fxhash::FxHashMap;
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};

#[derive(Default, Debug)]
struct ThreadState {
    prototypes: Vec<String>,
    created: Vec<String>,
}

impl ThreadState {
    fn is_empty(&self) -> bool {
        self.prototypes.is_empty() && self.created.is_empty()
    }
}

/// Tracks prototypes in creation and the stack of beans currently created by each thread. Entries
/// are removed by guards, so a failed construction never leaves stale state behind.
#[derive(Default, Debug)]
pub(crate) struct CreationTracker {
    threads: Mutex<FxHashMap<ThreadId, ThreadState>>,
}

impl CreationTracker {
    fn with_state<R>(&self, f: impl FnOnce(&mut ThreadState) -> R) -> R {
        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        let id = thread::current().id();
        let state = threads.entry(id).or_default();
        let result = f(state);
        if state.is_empty() {
            threads.remove(&id);
        }
        result
    }

    /// Marks a prototype as being created by the current thread. Returns `None` if it already is,
    /// which means the prototype depends on itself.
    pub(crate) fn begin_prototype(&self, name: &str) -> Option<PrototypeGuard<'_>> {
        self.with_state(|state| {
            if state.prototypes.iter().any(|existing| existing == name) {
                None
            } else {
                state.prototypes.push(name.to_string());
                Some(PrototypeGuard {
                    tracker: self,
                    name: name.to_string(),
                })
            }
        })
    }

    pub(crate) fn is_prototype_in_creation(&self, name: &str) -> bool {
        self.with_state(|state| state.prototypes.iter().any(|existing| existing == name))
    }

    /// Pushes a bean onto the stack of beans created by the current thread.
    pub(crate) fn begin_created(&self, name: &str) -> CreatedGuard<'_> {
        self.with_state(|state| state.created.push(name.to_string()));
        CreatedGuard { tracker: self }
    }

    /// Returns the innermost bean being created by the current thread.
    pub(crate) fn currently_created(&self) -> Option<String> {
        self.with_state(|state| state.created.last().cloned())
    }
}

pub(crate) struct PrototypeGuard<'a> {
    tracker: &'a CreationTracker,
    name: String,
}

impl Drop for PrototypeGuard<'_> {
    fn drop(&mut self) {
        let name = &self.name;
        self.tracker.with_state(|state| {
            if let Some(index) = state.prototypes.iter().rposition(|existing| existing == name) {
                state.prototypes.remove(index);
            }
        });
    }
}

pub(crate) struct CreatedGuard<'a> {
    tracker: &'a CreationTracker,
}

impl Drop for CreatedGuard<'_> {
    fn drop(&mut self) {
        self.tracker.with_state(|state| {
            state.created.pop();
        });
    }
}
