//! Disposal capabilities.
//!
//! A [`DisposeAction`] undoes exactly one registration: an effect, a signal
//! subscription, or a binding. Invoking it twice is a no-op.
//!
//! A [`DisposeBag`] collects the disposers owned by one component so they
//! can all be torn down together.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

type DisposeFn = Box<dyn FnOnce() + Send>;

/// A zero-argument capability that undoes one registration.
///
/// Clones share state: disposing any clone disposes all of them. Dropping
/// a `DisposeAction` does not dispose it.
#[derive(Clone)]
pub struct DisposeAction {
    action: Arc<Mutex<Option<DisposeFn>>>,
}

impl DisposeAction {
    /// Wrap a teardown closure.
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            action: Arc::new(Mutex::new(Some(Box::new(action)))),
        }
    }

    /// A capability with nothing to undo.
    pub fn noop() -> Self {
        Self {
            action: Arc::new(Mutex::new(None)),
        }
    }

    /// Run the teardown if it has not run yet.
    pub fn dispose(&self) {
        // Release the lock before running user code; the teardown may
        // dispose other clones of this action.
        let action = self.action.lock().take();
        if let Some(action) = action {
            action();
        }
    }

    /// Check whether there is nothing left to undo.
    pub fn is_disposed(&self) -> bool {
        self.action.lock().is_none()
    }
}

impl fmt::Debug for DisposeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposeAction")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A collection of disposers torn down together.
///
/// Keyed entries replace each other: inserting under an existing key first
/// disposes the previous action. Dropping the bag disposes everything.
#[derive(Default)]
pub struct DisposeBag {
    actions: Mutex<Vec<DisposeAction>>,
    keyed: Mutex<IndexMap<String, DisposeAction>>,
}

impl DisposeBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unkeyed disposer.
    pub fn push(&self, action: DisposeAction) {
        self.actions.lock().push(action);
    }

    /// Add a disposer under `key`, disposing whatever was stored there.
    pub fn insert(&self, key: impl Into<String>, action: DisposeAction) {
        let previous = self.keyed.lock().insert(key.into(), action);
        if let Some(previous) = previous {
            previous.dispose();
        }
    }

    /// Dispose and forget the disposer stored under `key`.
    ///
    /// Returns false if nothing was stored there.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.keyed.lock().shift_remove(key);
        match removed {
            Some(action) => {
                action.dispose();
                true
            }
            None => false,
        }
    }

    /// Check whether a disposer is stored under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.keyed.lock().contains_key(key)
    }

    /// Number of disposers held.
    pub fn len(&self) -> usize {
        self.actions.lock().len() + self.keyed.lock().len()
    }

    /// Check whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispose everything in insertion order and empty the bag.
    pub fn dispose_all(&self) {
        let actions: Vec<_> = self.actions.lock().drain(..).collect();
        let keyed: Vec<_> = self.keyed.lock().drain(..).map(|(_, action)| action).collect();

        for action in actions.into_iter().chain(keyed) {
            action.dispose();
        }
    }
}

impl Drop for DisposeBag {
    fn drop(&mut self) {
        self.dispose_all();
    }
}

impl fmt::Debug for DisposeBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposeBag").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn counting() -> (Arc<AtomicI32>, DisposeAction) {
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        let action = DisposeAction::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (count, action)
    }

    #[test]
    fn dispose_runs_once() {
        let (count, action) = counting();

        assert!(!action.is_disposed());
        action.dispose();
        action.dispose();
        action.clone().dispose();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(action.is_disposed());
    }

    #[test]
    fn dropping_does_not_dispose() {
        let (count, action) = counting();
        drop(action);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn noop_is_already_disposed() {
        let action = DisposeAction::noop();
        assert!(action.is_disposed());
        action.dispose();
    }

    #[test]
    fn bag_disposes_everything_on_drop() {
        let (first, a) = counting();
        let (second, b) = counting();

        {
            let bag = DisposeBag::new();
            bag.push(a);
            bag.insert("title", b);
            assert_eq!(bag.len(), 2);
        }

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn keyed_insert_replaces_previous() {
        let (first, a) = counting();
        let (second, b) = counting();
        let bag = DisposeBag::new();

        bag.insert("text", a);
        bag.insert("text", b);

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
        assert_eq!(bag.len(), 1);

        assert!(bag.remove("text"));
        assert!(!bag.remove("text"));
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert!(bag.is_empty());
    }
}
