//! The async search capability consumed by a binding.

use std::future::Future;

use futures_util::future::BoxFuture;

use super::item::Item;
use crate::error::SearchError;

/// Anything that can answer a search query asynchronously.
///
/// The returned future runs off the reactive context and may be dropped
/// at any suspension point when the query is superseded.
pub trait SearchProvider: Send + Sync + 'static {
    /// Look up items matching `query`.
    fn search(&self, query: String) -> BoxFuture<'static, Result<Vec<Item>, SearchError>>;
}

impl<F, Fut> SearchProvider for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Item>, SearchError>> + Send + 'static,
{
    fn search(&self, query: String) -> BoxFuture<'static, Result<Vec<Item>, SearchError>> {
        Box::pin(self(query))
    }
}
