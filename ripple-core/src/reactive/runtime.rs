//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals and
//! effects. It owns the dependency graph and the tracking context, and
//! propagates writes to dependents.
//!
//! # How It Works
//!
//! 1. When an effect is created, it registers with the runtime.
//!
//! 2. While an effect runs, every signal it reads is recorded in the
//!    runtime's [`ReactiveContext`]. When the run finishes, the observed set
//!    replaces the effect's previous subscriptions.
//!
//! 3. When a signal is written, the runtime re-runs every subscribed effect
//!    synchronously, in registration order, before the write returns.
//!
//! # Re-entrant Writes
//!
//! A signal written from inside its own notification cycle does not notify
//! recursively. The new value is stored immediately, and one extra
//! notification round per such write is queued behind the running one.
//! Each round hands the signal's callbacks the value of the write that
//! queued it, so intermediate values are delivered in order. Rounds are
//! capped by [`RuntimeConfig::max_reentrant_rounds`].
//!
//! # Threading
//!
//! Effects run on whichever thread writes the signal, and dependencies are
//! only recorded on the thread that created the runtime. Writes that should
//! re-run effects belong on that thread.
//!
//! # Ownership
//!
//! The runtime holds effects strongly until they are disposed. Signals and
//! effects hold only a [`WeakRuntime`], so nothing in the graph keeps the
//! runtime alive and there is no reference cycle through user closures.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{error, trace};

use super::context::ReactiveContext;
use super::subscriber::{SignalId, SubscriberId};
use crate::config::RuntimeConfig;
use crate::error::ReactiveError;

/// A trait for computations the runtime re-runs when dependencies change.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this reactive value.
    fn subscriber_id(&self) -> SubscriberId;

    /// Re-run the computation after a dependency changed.
    fn schedule(&self);
}

#[derive(Default)]
struct Graph {
    /// Registered computations, owned until unregistered.
    registry: HashMap<SubscriberId, Arc<dyn Reactive>>,
    /// Signal -> subscribers. Ordered by ID, which is registration order.
    signal_subscribers: HashMap<SignalId, BTreeSet<SubscriberId>>,
    /// Subscriber -> signals it read during its last run.
    dependencies: HashMap<SubscriberId, HashSet<SignalId>>,
    /// Signals currently notifying, with the number of queued rounds.
    notifying: HashMap<SignalId, usize>,
}

impl Graph {
    fn clear_dependencies(&mut self, subscriber_id: SubscriberId) {
        let Some(signals) = self.dependencies.remove(&subscriber_id) else {
            return;
        };

        for signal_id in signals {
            if let Some(subscribers) = self.signal_subscribers.get_mut(&signal_id) {
                subscribers.remove(&subscriber_id);
                if subscribers.is_empty() {
                    self.signal_subscribers.remove(&signal_id);
                }
            }
        }
    }
}

struct RuntimeInner {
    config: RuntimeConfig,
    context: ReactiveContext,
    graph: Mutex<Graph>,
}

/// Handle to a reactive graph.
///
/// Cloning the handle shares the graph. All reads, writes and effect
/// registrations for one graph are expected to happen on a single logical
/// execution context.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

/// Non-owning handle held by signals and effects.
#[derive(Clone, Default)]
pub struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

impl WeakRuntime {
    /// Get the runtime back, if it is still alive.
    pub fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(|inner| Runtime { inner })
    }
}

impl Runtime {
    /// Create a runtime with default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                context: ReactiveContext::new(),
                graph: Mutex::new(Graph::default()),
            }),
        }
    }

    /// The configuration this runtime was created with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// The tracking context of this runtime.
    pub fn context(&self) -> &ReactiveContext {
        &self.inner.context
    }

    /// Get a non-owning handle to this runtime.
    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Register a reactive computation. The runtime keeps it alive until
    /// [`Runtime::unregister`] is called.
    pub fn register(&self, reactive: Arc<dyn Reactive>) {
        let id = reactive.subscriber_id();
        self.inner.graph.lock().registry.insert(id, reactive);
    }

    /// Unregister a computation and drop all of its subscriptions.
    pub fn unregister(&self, subscriber_id: SubscriberId) {
        // Take the computation out before releasing the lock so its
        // destructor never runs with the graph locked.
        let removed = {
            let mut graph = self.inner.graph.lock();
            graph.clear_dependencies(subscriber_id);
            graph.registry.remove(&subscriber_id)
        };
        drop(removed);
    }

    /// Check whether a computation is registered.
    pub fn is_registered(&self, subscriber_id: SubscriberId) -> bool {
        self.inner.graph.lock().registry.contains_key(&subscriber_id)
    }

    /// Number of registered computations.
    pub fn effect_count(&self) -> usize {
        self.inner.graph.lock().registry.len()
    }

    /// Record a read of `signal_id` in the innermost tracking scope.
    pub fn track(&self, signal_id: SignalId) {
        self.inner.context.track_dependency(signal_id);
    }

    /// Remove all subscriptions of a computation.
    ///
    /// Called before re-running a computation to drop stale dependencies.
    pub fn clear_dependencies(&self, subscriber_id: SubscriberId) {
        self.inner.graph.lock().clear_dependencies(subscriber_id);
    }

    /// Replace the subscription set of a computation.
    ///
    /// Ignored if the computation is no longer registered, so a disposed
    /// effect can never resubscribe.
    pub fn install_dependencies(&self, subscriber_id: SubscriberId, signals: &[SignalId]) {
        let mut graph = self.inner.graph.lock();
        graph.clear_dependencies(subscriber_id);

        if !graph.registry.contains_key(&subscriber_id) {
            return;
        }

        for signal_id in signals {
            graph
                .signal_subscribers
                .entry(*signal_id)
                .or_default()
                .insert(subscriber_id);
        }
        graph
            .dependencies
            .insert(subscriber_id, signals.iter().copied().collect());
    }

    /// Number of signals a computation currently depends on.
    pub fn dependency_count(&self, subscriber_id: SubscriberId) -> usize {
        self.inner
            .graph
            .lock()
            .dependencies
            .get(&subscriber_id)
            .map_or(0, HashSet::len)
    }

    /// Number of computations currently subscribed to a signal.
    pub fn subscriber_count(&self, signal_id: SignalId) -> usize {
        self.inner
            .graph
            .lock()
            .signal_subscribers
            .get(&signal_id)
            .map_or(0, BTreeSet::len)
    }

    /// Drop every edge pointing at a signal that no longer exists.
    pub(crate) fn forget_signal(&self, signal_id: SignalId) {
        let mut graph = self.inner.graph.lock();
        if let Some(subscribers) = graph.signal_subscribers.remove(&signal_id) {
            for subscriber_id in subscribers {
                if let Some(signals) = graph.dependencies.get_mut(&subscriber_id) {
                    signals.remove(&signal_id);
                }
            }
        }
    }

    /// Run `f` without recording the signals it reads.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.context.untracked(f)
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber(&self) -> Option<SubscriberId> {
        self.inner.context.current_subscriber()
    }

    /// Check if an effect is running.
    pub fn is_tracking(&self) -> bool {
        self.inner.context.is_active()
    }

    fn dependents_of(&self, signal_id: SignalId) -> Vec<Arc<dyn Reactive>> {
        let graph = self.inner.graph.lock();
        graph
            .signal_subscribers
            .get(&signal_id)
            .map(|subscribers| {
                subscribers
                    .iter()
                    .filter_map(|id| graph.registry.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Notify all dependents that a signal changed.
    ///
    /// `dispatch_local` delivers the signal's own callbacks and runs first in
    /// every round. Returns `true` once every round, including queued
    /// re-entrant ones, has been delivered, or `false` if this call only
    /// queued a round behind a cycle already in progress.
    pub(crate) fn notify_signal_change(
        &self,
        signal_id: SignalId,
        dispatch_local: &dyn Fn(),
    ) -> bool {
        {
            let mut graph = self.inner.graph.lock();
            if let Some(queued) = graph.notifying.get_mut(&signal_id) {
                *queued += 1;
                trace!(signal = signal_id.raw(), "queued re-entrant notification");
                return false;
            }
            graph.notifying.insert(signal_id, 0);
        }

        let _cycle = NotifyCycle {
            runtime: self,
            signal_id,
        };
        let limit = self.inner.config.max_reentrant_rounds;
        let mut rounds = 0;

        loop {
            dispatch_local();

            let effects = self.dependents_of(signal_id);
            trace!(
                signal = signal_id.raw(),
                dependents = effects.len(),
                "propagating signal change"
            );
            for effect in effects {
                effect.schedule();
            }

            let mut graph = self.inner.graph.lock();
            let Some(queued) = graph.notifying.get_mut(&signal_id) else {
                break;
            };
            if *queued == 0 {
                break;
            }
            *queued -= 1;
            rounds += 1;

            if rounds > limit {
                drop(graph);
                let err = ReactiveError::ReentrancyLimit {
                    signal: signal_id,
                    rounds: limit,
                };
                error!(error = %err, "dropping queued notifications");
                break;
            }
        }

        true
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let graph = self.inner.graph.lock();
        f.debug_struct("Runtime")
            .field("effects", &graph.registry.len())
            .field("signals", &graph.signal_subscribers.len())
            .field("tracking_depth", &self.inner.context.depth())
            .finish()
    }
}

/// Marks a signal as no longer notifying, also when an effect panics.
struct NotifyCycle<'a> {
    runtime: &'a Runtime,
    signal_id: SignalId,
}

impl Drop for NotifyCycle<'_> {
    fn drop(&mut self) {
        self.runtime
            .inner
            .graph
            .lock()
            .notifying
            .remove(&self.signal_id);
    }
}
