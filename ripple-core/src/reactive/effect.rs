//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency is written, the runtime re-runs the effect before
//!    the write returns.
//!
//! 3. Before re-running, the effect drops its old subscriptions and tracks
//!    new ones during execution. Dependencies are dynamic: a signal that is
//!    no longer read stops triggering the effect.
//!
//! # Cleanup
//!
//! The effect function may return a [`DisposeAction`]. It is invoked before
//! the next run and when the effect is disposed, which is where timers,
//! tasks or nested registrations created by one run get torn down.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::dispose::DisposeAction;
use super::runtime::{Reactive, Runtime, WeakRuntime};
use super::subscriber::SubscriberId;
use crate::error::ReactiveError;

type EffectFn = Box<dyn FnMut() -> Option<DisposeAction> + Send>;

struct EffectInner {
    subscriber_id: SubscriberId,
    runtime: WeakRuntime,
    run: Mutex<EffectFn>,
    /// Cleanup returned by the last run.
    cleanup: Mutex<Option<DisposeAction>>,
    disposed: AtomicBool,
    running: AtomicBool,
    run_count: AtomicUsize,
}

impl EffectInner {
    fn execute(&self) -> Result<(), ReactiveError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(ReactiveError::EffectDisposed(self.subscriber_id));
        }
        let runtime = self.runtime.upgrade().ok_or(ReactiveError::RuntimeDropped)?;

        // An effect that asks to run itself from inside its own body would
        // deadlock on `run`; the outer run already observes current values.
        if self.running.swap(true, Ordering::SeqCst) {
            trace!(effect = self.subscriber_id.raw(), "skipping nested self-run");
            return Ok(());
        }
        let _running = RunningFlag(&self.running);

        let previous = self.cleanup.lock().take();
        if let Some(previous) = previous {
            previous.dispose();
        }

        runtime.clear_dependencies(self.subscriber_id);

        let scope = runtime.context().enter(self.subscriber_id);
        let cleanup = {
            let mut run = self.run.lock();
            (*run)()
        };
        let dependencies = scope.finish();

        // The body may have disposed its own effect.
        if self.disposed.load(Ordering::SeqCst) {
            if let Some(cleanup) = cleanup {
                cleanup.dispose();
            }
            return Ok(());
        }

        runtime.install_dependencies(self.subscriber_id, &dependencies);
        *self.cleanup.lock() = cleanup;
        self.run_count.fetch_add(1, Ordering::SeqCst);

        trace!(
            effect = self.subscriber_id.raw(),
            dependencies = dependencies.len(),
            "effect ran"
        );
        Ok(())
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(runtime) = self.runtime.upgrade() {
            runtime.unregister(self.subscriber_id);
        }

        let cleanup = self.cleanup.lock().take();
        if let Some(cleanup) = cleanup {
            cleanup.dispose();
        }

        debug!(effect = self.subscriber_id.raw(), "effect disposed");
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn schedule(&self) {
        if !self.disposed.load(Ordering::SeqCst) {
            let _ = self.execute();
        }
    }
}

struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// The handle is cheap to clone; clones share state. Dropping every handle
/// does not stop the effect: the runtime keeps it alive until
/// [`Effect::dispose`] (or its [`DisposeAction`]) is invoked.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = Runtime::new();
/// let count = Signal::new(&runtime, 0);
///
/// let effect = Effect::new(&runtime, {
///     let count = count.clone();
///     move || {
///         println!("Count is: {}", count.get());
///         None
///     }
/// });
///
/// count.set(5);  // Prints: "Count is: 5"
/// effect.dispose();
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create and register an effect, running it once immediately.
    pub fn new<F>(runtime: &Runtime, run: F) -> Self
    where
        F: FnMut() -> Option<DisposeAction> + Send + 'static,
    {
        let effect = Self::new_lazy(runtime, run);
        // A freshly created effect is neither disposed nor orphaned.
        let _ = effect.execute();
        effect
    }

    /// Create and register an effect without running it.
    ///
    /// It has no dependencies until the first [`Effect::execute`].
    pub fn new_lazy<F>(runtime: &Runtime, run: F) -> Self
    where
        F: FnMut() -> Option<DisposeAction> + Send + 'static,
    {
        let inner = Arc::new(EffectInner {
            subscriber_id: SubscriberId::new(),
            runtime: runtime.downgrade(),
            run: Mutex::new(Box::new(run)),
            cleanup: Mutex::new(None),
            disposed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });
        runtime.register(inner.clone());

        debug!(effect = inner.subscriber_id.raw(), "effect created");
        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Run the effect function now, re-tracking its dependencies.
    pub fn execute(&self) -> Result<(), ReactiveError> {
        self.inner.execute()
    }

    /// Re-run the effect unless it has been disposed.
    pub fn schedule(&self) {
        self.inner.schedule();
    }

    /// Dispose of the effect.
    ///
    /// Unsubscribes from every signal, runs the last cleanup, and prevents
    /// further runs. Disposing twice is a no-op.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// A capability that disposes this effect.
    pub fn disposer(&self) -> DisposeAction {
        let inner = self.inner.clone();
        DisposeAction::new(move || inner.dispose())
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of completed runs.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of signals read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .runtime
            .upgrade()
            .map_or(0, |runtime| runtime.dependency_count(self.inner.subscriber_id))
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Register an effect and return the capability that disposes it.
///
/// `run` executes once immediately on the calling context and again after
/// every write to a signal it read during its previous run.
pub fn create_effect<F>(runtime: &Runtime, run: F) -> DisposeAction
where
    F: FnMut() -> Option<DisposeAction> + Send + 'static,
{
    Effect::new(runtime, run).disposer()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    fn counter() -> (Arc<AtomicI32>, Arc<AtomicI32>) {
        let count = Arc::new(AtomicI32::new(0));
        (count.clone(), count)
    }

    #[test]
    fn effect_runs_on_creation() {
        let runtime = Runtime::new();
        let (run_count, run_count_clone) = counter();

        let _effect = Effect::new(&runtime, move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
            None
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let runtime = Runtime::new();
        let (run_count, run_count_clone) = counter();

        let effect = Effect::new_lazy(&runtime, move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
            None
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 0);
        assert_eq!(effect.run_count(), 0);

        effect.execute().unwrap();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let runtime = Runtime::new();
        let (run_count, run_count_clone) = counter();

        let effect = Effect::new(&runtime, move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
            None
        });
        assert_eq!(run_count.load(Ordering::SeqCst), 1);

        effect.dispose();
        assert!(effect.is_disposed());
        assert!(!runtime.is_registered(effect.id()));

        effect.schedule();
        assert_eq!(
            effect.execute(),
            Err(ReactiveError::EffectDisposed(effect.id()))
        );
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cleanup_runs_before_rerun_and_on_dispose() {
        let runtime = Runtime::new();
        let (cleanups, cleanups_clone) = counter();

        let effect = Effect::new(&runtime, move || {
            let cleanups = cleanups_clone.clone();
            Some(DisposeAction::new(move || {
                cleanups.fetch_add(1, Ordering::SeqCst);
            }))
        });
        assert_eq!(cleanups.load(Ordering::SeqCst), 0);

        effect.execute().unwrap();
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);

        effect.dispose();
        assert_eq!(cleanups.load(Ordering::SeqCst), 2);

        effect.dispose();
        assert_eq!(cleanups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn disposer_is_idempotent() {
        let runtime = Runtime::new();
        let disposer = create_effect(&runtime, || None);
        assert_eq!(runtime.effect_count(), 1);

        disposer.dispose();
        disposer.dispose();
        assert_eq!(runtime.effect_count(), 0);
    }

    #[test]
    fn effect_clone_shares_state() {
        let runtime = Runtime::new();
        let effect1 = Effect::new(&runtime, || None);
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        assert_eq!(effect2.run_count(), 1);

        effect1.execute().unwrap();
        assert_eq!(effect2.run_count(), 2);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }

    #[test]
    fn effect_reports_dropped_runtime() {
        let runtime = Runtime::new();
        let effect = Effect::new(&runtime, || None);
        drop(runtime);

        assert_eq!(effect.execute(), Err(ReactiveError::RuntimeDropped));
        assert_eq!(effect.dependency_count(), 0);
    }

    #[test]
    fn tracking_stack_is_empty_after_runs() {
        let runtime = Runtime::new();
        let _effect = Effect::new(&runtime, || None);
        assert!(!runtime.is_tracking());
    }
}
