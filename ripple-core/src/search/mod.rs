//! Debounced search over a reactive query.
//!
//! [`SearchBinding`] connects a query [`Signal`](crate::reactive::Signal) to
//! a [`SearchProvider`] and publishes results back into a signal. [`Catalog`]
//! is a codec for a podcast directory that providers can build on.

mod binding;
mod catalog;
mod item;
mod provider;

pub use binding::SearchBinding;
pub use catalog::{Catalog, DEFAULT_BASE_URL};
pub use item::Item;
pub use provider::SearchProvider;
