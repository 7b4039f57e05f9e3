//! Ripple Core
//!
//! A small reactive runtime with async plumbing on top:
//!
//! - Reactive primitives (signals, effects, bindings) with automatic
//!   dependency tracking
//! - A debounce operator over signal change streams
//! - A cancellable runner that keeps only the newest async task alive
//! - A search binding tying the three together
//!
//! # Architecture
//!
//! - `reactive`: signals, effects and the runtime that connects them
//! - `stream`: stream operators over signal changes
//! - `task`: cancellable derived async work
//! - `search`: debounced query → results binding
//! - `config`: serde-backed settings
//! - `error`: error types
//!
//! # Example
//!
//! ```rust
//! use ripple_core::reactive::{Effect, Runtime, Signal};
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use std::sync::Arc;
//!
//! let runtime = Runtime::new();
//! let count = Signal::new(&runtime, 0);
//! let seen = Arc::new(AtomicI32::new(-1));
//!
//! let effect = {
//!     let count = count.clone();
//!     let seen = seen.clone();
//!     Effect::new(&runtime, move || {
//!         seen.store(count.get(), Ordering::SeqCst);
//!         None
//!     })
//! };
//!
//! count.set(5);
//! assert_eq!(seen.load(Ordering::SeqCst), 5);
//!
//! effect.dispose();
//! count.set(6);
//! assert_eq!(seen.load(Ordering::SeqCst), 5);
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod search;
pub mod stream;
pub mod task;

pub use config::{Config, RuntimeConfig, SearchConfig};
pub use error::{ConfigError, ReactiveError, SearchError};
pub use reactive::{DisposeAction, DisposeBag, Effect, Runtime, Signal};
pub use search::{Item, SearchBinding, SearchProvider};
