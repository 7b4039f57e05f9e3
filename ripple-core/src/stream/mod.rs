//! Stream operators over reactive values.
//!
//! [`Signal::changes`](crate::reactive::Signal::changes) turns writes into a
//! `Stream`; the operators here shape that stream before it drives async
//! work.

mod debounce;

pub use debounce::{debounce, Debounce, DebounceExt};
