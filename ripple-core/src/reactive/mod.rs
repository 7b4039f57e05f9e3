//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, effects, and
//! the runtime that connects them.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while an effect runs, the signal is registered as a dependency of that
//! effect. When the signal's value changes, all dependents re-run.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Its dependency set is recomputed on every run.
//!
//! ## Disposal
//!
//! Every registration hands back a [`DisposeAction`] that undoes it.
//! Disposing twice is harmless.
//!
//! # Implementation Notes
//!
//! Dependency tracking is automatic: each [`Runtime`] owns a
//! [`ReactiveContext`] stack naming the running effect, and signal reads
//! record themselves there. There is no process-wide state, so independent
//! runtimes never observe each other.

mod bind;
mod context;
mod dispose;
mod effect;
mod runtime;
mod signal;
mod subscriber;

pub use bind::{assign, bind};
pub use context::{Dependencies, ReactiveContext, TrackingScope};
pub use dispose::{DisposeAction, DisposeBag};
pub use effect::{create_effect, Effect};
pub use runtime::{Reactive, Runtime, WeakRuntime};
pub use signal::{Changes, ReactiveCell, Signal};
pub use subscriber::{SignalId, SubscriberId};
