//! Search Binding
//!
//! Wires a query signal to an async [`SearchProvider`]:
//!
//! ```text
//! query.set(..) -> changes -> debounce -> DerivedTaskRunner -> results.set(..)
//!                                                            -> on_settled callbacks
//! ```
//!
//! A driver task owns the debounced stream and the runner, and is the only
//! writer of the `results` and `loading` signals. The driver is a local
//! task pinned to the thread that owns the reactive runtime, so callbacks
//! and effect re-runs triggered by a publish happen on that thread. Search
//! work itself runs on ordinary Tokio tasks, possibly on worker threads,
//! and its results are marshalled back to the driver through a channel.
//!
//! Failed searches are swallowed: nothing is published and the results stay
//! at the last successful value.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use super::item::Item;
use super::provider::SearchProvider;
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::reactive::{Changes, DisposeAction, DisposeBag, Runtime, Signal};
use crate::stream::{Debounce, DebounceExt};
use crate::task::{DerivedTaskRunner, TaskOutcome};

/// A live query → results pipeline.
///
/// Dropping the binding disposes it.
pub struct SearchBinding {
    query: Signal<String>,
    results: Signal<Vec<Item>>,
    loading: Signal<bool>,
    driver: Mutex<Option<JoinHandle<()>>>,
    subscriptions: DisposeBag,
    disposed: AtomicBool,
}

impl SearchBinding {
    /// Create the binding's signals in `runtime` and start its driver.
    ///
    /// Must be called inside a [`tokio::task::LocalSet`], on the thread that
    /// created `runtime`. Only writes made after this call are searched; the
    /// initial empty query is not.
    ///
    /// # Panics
    ///
    /// Panics when called outside a `LocalSet`.
    pub fn spawn<P>(runtime: &Runtime, provider: P, config: SearchConfig) -> Self
    where
        P: SearchProvider,
    {
        debug_assert!(
            runtime.context().is_owner_thread(),
            "search binding spawned off its runtime's thread"
        );

        let query = Signal::new(runtime, String::new());
        let results = Signal::new(runtime, Vec::new());
        let loading = Signal::new(runtime, false);

        let changes = query.changes();
        let subscriptions = DisposeBag::new();
        subscriptions.push(changes.disposer());

        let provider = Arc::new(provider);
        let runner = DerivedTaskRunner::new(move |query: String, _token| provider.search(query));

        let driver = SearchDriver {
            settled: changes.debounce(config.debounce()),
            runner,
            results: results.clone(),
            loading: loading.clone(),
            config,
        };
        let handle = tokio::task::spawn_local(driver.run());

        Self {
            query,
            results,
            loading,
            driver: Mutex::new(Some(handle)),
            subscriptions,
            disposed: AtomicBool::new(false),
        }
    }

    /// The query signal. Writing it starts a new search once it settles.
    pub fn query(&self) -> &Signal<String> {
        &self.query
    }

    /// Convenience for `query().set(..)`.
    pub fn set_query(&self, query: impl Into<String>) {
        self.query.set(query.into());
    }

    /// The last successfully published results.
    pub fn results(&self) -> &Signal<Vec<Item>> {
        &self.results
    }

    /// `true` while a search is in flight.
    pub fn loading(&self) -> &Signal<bool> {
        &self.loading
    }

    /// Check whether no search is in flight.
    pub fn is_idle(&self) -> bool {
        !self.loading.get_untracked()
    }

    /// Invoke `callback` with every published result list.
    ///
    /// Called once per search that completes without being superseded,
    /// cancelled or failing, and when a cleared query empties the results.
    pub fn on_settled<F>(&self, callback: F) -> DisposeAction
    where
        F: Fn(&[Item]) + Send + Sync + 'static,
    {
        let dispose = self.results.on_change(move |items: &Vec<Item>| callback(items));
        self.subscriptions.push(dispose.clone());
        dispose
    }

    /// Tear down the driver, its timers and tasks, and every subscription.
    ///
    /// Idempotent. Called on the runtime's thread, no `on_settled` callback
    /// fires after this returns; called from inside one, the remaining
    /// callbacks of that publish still run.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.subscriptions.dispose_all();
        if let Some(handle) = self.driver.lock().take() {
            handle.abort();
        }
        debug!("search binding disposed");
    }

    /// Check whether [`SearchBinding::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for SearchBinding {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for SearchBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchBinding")
            .field("query", &self.query.get_untracked())
            .field("results", &self.results.get_untracked().len())
            .field("loading", &self.loading.get_untracked())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

struct SearchDriver {
    settled: Debounce<Changes<String>>,
    runner: DerivedTaskRunner<String, Vec<Item>, SearchError>,
    results: Signal<Vec<Item>>,
    loading: Signal<bool>,
    config: SearchConfig,
}

impl SearchDriver {
    async fn run(mut self) {
        debug!(debounce_ms = self.config.debounce_ms, "search binding started");

        loop {
            tokio::select! {
                settled = self.settled.next() => match settled {
                    Some(query) => self.handle_query(query),
                    None => break,
                },
                outcome = self.runner.next_outcome() => self.handle_outcome(outcome),
            }
        }

        debug!("search binding stopped");
    }

    fn handle_query(&mut self, query: String) {
        if query.trim().chars().count() < self.config.min_query_len {
            self.runner.cancel();
            self.set_loading(false);
            if self.config.clear_on_empty && !self.results.get_untracked().is_empty() {
                self.results.set(Vec::new());
            }
            return;
        }

        let generation = self.runner.submit(query);
        debug!(generation, "query settled");
        self.set_loading(true);
    }

    fn handle_outcome(&mut self, outcome: TaskOutcome<Vec<Item>, SearchError>) {
        match outcome {
            TaskOutcome::Completed(items) => {
                debug!(count = items.len(), "publishing search results");
                self.set_loading(false);
                self.results.set(items);
            }
            // Already logged by the runner; keep the last results.
            TaskOutcome::Failed(_) => self.set_loading(false),
            TaskOutcome::Superseded => {}
        }
    }

    fn set_loading(&self, loading: bool) {
        if self.loading.get_untracked() != loading {
            self.loading.set(loading);
        }
    }
}
