//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. This
//! enables automatic dependency tracking: when a signal is read, we can
//! register the running effect as a dependent.
//!
//! # Implementation
//!
//! Each [`Runtime`](super::Runtime) owns one context holding a stack of
//! entries. Running an effect pushes an entry through [`ReactiveContext::enter`]
//! and the returned [`TrackingScope`] pops it again, on every exit path
//! including unwinding.
//!
//! A stack rather than a single slot lets an effect create another effect
//! from inside its body without corrupting its own dependency set.
//!
//! # Threading
//!
//! The stack belongs to the thread that created the context. Reads made on
//! any other thread are never recorded, and opening a scope elsewhere is a
//! bug caught by a debug assertion.

use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::subscriber::{SignalId, SubscriberId};

/// Dependencies collected during a single run.
pub type Dependencies = SmallVec<[SignalId; 4]>;

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    /// The running effect, or `None` for an untracked section.
    subscriber_id: Option<SubscriberId>,
    /// Signals read so far during this run, without duplicates.
    dependencies: Dependencies,
}

/// Per-runtime stack of running effects.
#[derive(Debug)]
pub struct ReactiveContext {
    owner: ThreadId,
    stack: Mutex<Vec<ContextEntry>>,
}

impl ReactiveContext {
    /// Create an empty context owned by the calling thread.
    pub fn new() -> Self {
        Self {
            owner: thread::current().id(),
            stack: Mutex::new(Vec::new()),
        }
    }

    /// The thread whose reads this context records.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Check whether the calling thread owns this context.
    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Enter a new tracking scope for the given subscriber.
    ///
    /// While the scope is alive, any signal read through the owning runtime
    /// on the owner thread registers itself in this entry.
    pub fn enter(&self, subscriber_id: SubscriberId) -> TrackingScope<'_> {
        debug_assert!(
            self.is_owner_thread(),
            "effect {:?} entered a reactive context owned by {:?} from {:?}",
            subscriber_id,
            self.owner,
            thread::current().id()
        );
        self.push(Some(subscriber_id));

        TrackingScope {
            context: self,
            subscriber_id,
            finished: false,
        }
    }

    /// Run `f` with tracking suspended.
    ///
    /// Signals read inside `f` do not become dependencies of the running
    /// effect. Effects created inside `f` still track their own reads.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        if !self.is_owner_thread() {
            // Nothing on this thread is tracked anyway.
            return f();
        }

        self.push(None);
        let _section = UntrackedSection { context: self };
        f()
    }

    fn push(&self, subscriber_id: Option<SubscriberId>) {
        self.stack.lock().push(ContextEntry {
            subscriber_id,
            dependencies: Dependencies::new(),
        });
    }

    /// Check if there is an active tracking scope.
    pub fn is_active(&self) -> bool {
        !self.stack.lock().is_empty()
    }

    /// Number of nested scopes currently open.
    pub fn depth(&self) -> usize {
        self.stack.lock().len()
    }

    /// Get the innermost running subscriber, if any.
    ///
    /// `None` inside an untracked section.
    pub fn current_subscriber(&self) -> Option<SubscriberId> {
        self.stack
            .lock()
            .last()
            .and_then(|entry| entry.subscriber_id)
    }

    /// Record a dependency on the given signal in the innermost scope.
    ///
    /// Recording the same signal twice in one run is a no-op. Reads from
    /// other threads and inside untracked sections are ignored.
    pub fn track_dependency(&self, signal_id: SignalId) {
        if !self.is_owner_thread() {
            return;
        }

        if let Some(entry) = self.stack.lock().last_mut() {
            if entry.subscriber_id.is_some() && !entry.dependencies.contains(&signal_id) {
                entry.dependencies.push(signal_id);
            }
        }
    }

    /// Get the dependencies collected so far in the innermost scope.
    pub fn dependencies(&self) -> Vec<SignalId> {
        self.stack
            .lock()
            .last()
            .map(|entry| entry.dependencies.to_vec())
            .unwrap_or_default()
    }

    fn pop(&self, subscriber_id: Option<SubscriberId>) -> Option<Dependencies> {
        let popped = self.stack.lock().pop();

        // Scopes are strictly nested, so the top entry must be ours.
        if let Some(entry) = &popped {
            debug_assert_eq!(
                entry.subscriber_id, subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                subscriber_id, entry.subscriber_id
            );
        }

        popped.map(|entry| entry.dependencies)
    }
}

/// Guard that pops its context entry when dropped.
pub struct TrackingScope<'a> {
    context: &'a ReactiveContext,
    subscriber_id: SubscriberId,
    finished: bool,
}

impl TrackingScope<'_> {
    /// The subscriber this scope tracks.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    /// Close the scope and return the dependencies observed during it.
    pub fn finish(mut self) -> Dependencies {
        self.finished = true;
        self.context.pop(Some(self.subscriber_id)).unwrap_or_default()
    }
}

impl Drop for TrackingScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.context.pop(Some(self.subscriber_id));
        }
    }
}

struct UntrackedSection<'a> {
    context: &'a ReactiveContext,
}

impl Drop for UntrackedSection<'_> {
    fn drop(&mut self) {
        self.context.pop(None);
    }
}

impl Default for ReactiveContext {
    fn default() -> Self {
        Self::new()
    }
}
