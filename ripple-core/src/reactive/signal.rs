//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while an effect runs, the runtime records the
//!    signal as a dependency of that effect.
//!
//! 2. When a signal is written, its callbacks run and every dependent effect
//!    re-runs, all before the write returns.
//!
//! 3. Writing the same value again still notifies. There is no equality
//!    suppression.
//!
//! 4. A write made while the signal's own notification is running is queued.
//!    Callbacks receive every written value, in write order.
//!
//! # Ownership
//!
//! A signal holds a weak handle to its runtime and no reference to any
//! effect. Once the last clone of a signal is dropped, the runtime forgets
//! every edge pointing at it and open change streams end.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures_util::Stream;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use super::dispose::DisposeAction;
use super::runtime::{Runtime, WeakRuntime};
use super::subscriber::{SignalId, SubscriberId};

type Notifier<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Read/write/subscribe capability shared by reactive cells.
///
/// Components that only need to talk to "some reactive value" take this
/// trait instead of a concrete [`Signal`].
pub trait ReactiveCell<T> {
    /// Current value, registering a dependency when an effect is running.
    fn read(&self) -> T;

    /// Replace the value and notify dependents before returning.
    fn write(&self, value: T);

    /// Invoke `callback` after every write.
    fn subscribe(&self, callback: Box<dyn Fn(&T) + Send + Sync>) -> DisposeAction;
}

struct SignalInner<T> {
    id: SignalId,
    runtime: WeakRuntime,
    value: RwLock<T>,
    /// Plain callbacks keyed by subscription, in subscription order.
    notifiers: Mutex<IndexMap<SubscriberId, Notifier<T>>>,
    /// Written values not yet handed to the callbacks.
    outbox: Mutex<VecDeque<T>>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.forget_signal(self.id);
        }
    }
}

/// A reactive signal holding a value of type T.
///
/// # Type Parameters
///
/// - `T`: The type of value stored in the signal. Must be Clone + Send + Sync.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = Runtime::new();
/// let count = Signal::new(&runtime, 0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal in `runtime` with the given initial value.
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: SignalId::new(),
                runtime: runtime.downgrade(),
                value: RwLock::new(value),
                notifiers: Mutex::new(IndexMap::new()),
                outbox: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called while an effect runs, this also registers the signal as a
    /// dependency of that effect.
    pub fn get(&self) -> T {
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.track(self.inner.id);
        }
        self.get_untracked()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Set a new value and notify subscribers.
    ///
    /// Callbacks run first, then dependent effects in registration order.
    /// Everything has run by the time this returns, except notifications
    /// queued by a write from inside this signal's own notification; those
    /// are delivered, with the value written, once the running round ends.
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value.clone();

        let Some(runtime) = self.inner.runtime.upgrade() else {
            self.dispatch_callbacks(&value);
            return;
        };

        self.inner.outbox.lock().push_back(value);
        let delivered = runtime.notify_signal_change(self.inner.id, &|| self.dispatch_next());
        if delivered {
            // Whatever is left was dropped by the re-entrancy limit.
            self.inner.outbox.lock().clear();
        }
    }

    /// Update the value using a function of the current value.
    ///
    /// Equivalent to an untracked read followed by [`Signal::set`]; it
    /// notifies even if `f` returns an equal value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.inner.value.read();
            f(&*guard)
        };
        self.set(new_value);
    }

    /// Register a callback invoked with the new value after every write.
    ///
    /// Unlike an effect, the callback does not run on registration and does
    /// not track what it reads.
    pub fn on_change<F>(&self, callback: F) -> DisposeAction
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let subscriber_id = SubscriberId::new();
        self.inner
            .notifiers
            .lock()
            .insert(subscriber_id, Arc::new(callback));

        let weak: Weak<SignalInner<T>> = Arc::downgrade(&self.inner);
        DisposeAction::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.notifiers.lock().shift_remove(&subscriber_id);
            }
        })
    }

    /// Stream every value written after this call.
    ///
    /// Dropping the stream unsubscribes. The stream ends when the signal is
    /// dropped.
    pub fn changes(&self) -> Changes<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscription = self.on_change(move |value: &T| {
            // The receiver may already be gone; the subscription is then
            // disposed by `Changes::drop`.
            let _ = sender.send(value.clone());
        });

        Changes {
            receiver,
            subscription,
        }
    }

    /// Number of effects and callbacks currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        let effects = self
            .inner
            .runtime
            .upgrade()
            .map_or(0, |runtime| runtime.subscriber_count(self.inner.id));
        effects + self.inner.notifiers.lock().len()
    }

    fn dispatch_next(&self) {
        let value = self.inner.outbox.lock().pop_front();
        if let Some(value) = value {
            self.dispatch_callbacks(&value);
        }
    }

    fn dispatch_callbacks(&self, value: &T) {
        let notifiers: Vec<Notifier<T>> = self.inner.notifiers.lock().values().cloned().collect();
        for notify in notifiers {
            notify(value);
        }
    }
}

impl<T> ReactiveCell<T> for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn read(&self) -> T {
        self.get()
    }

    fn write(&self, value: T) {
        self.set(value);
    }

    fn subscribe(&self, callback: Box<dyn Fn(&T) + Send + Sync>) -> DisposeAction {
        self.on_change(callback)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Stream of values written to a [`Signal`].
///
/// Created by [`Signal::changes`].
pub struct Changes<T> {
    receiver: mpsc::UnboundedReceiver<T>,
    subscription: DisposeAction,
}

impl<T> Changes<T> {
    /// A capability that ends the subscription without dropping the stream.
    ///
    /// Values already buffered are still yielded, then the stream ends.
    pub fn disposer(&self) -> DisposeAction {
        self.subscription.clone()
    }
}

// No field is structurally pinned.
impl<T> Unpin for Changes<T> {}

impl<T> Stream for Changes<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.receiver.poll_recv(cx)
    }
}

impl<T> Drop for Changes<T> {
    fn drop(&mut self) {
        self.subscription.dispose();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
