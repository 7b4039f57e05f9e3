//! Integration tests for the debounced search binding.
//!
//! The binding's driver is a local task, so every test runs inside a
//! `LocalSet`. Most tests use a paused Tokio clock, so timings are exact.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::LocalSet;

use ripple_core::config::SearchConfig;
use ripple_core::error::SearchError;
use ripple_core::reactive::{Effect, Runtime, Signal};
use ripple_core::search::{Item, SearchBinding};

const DEBOUNCE: Duration = Duration::from_millis(50);
const FETCH: Duration = Duration::from_millis(100);

fn config() -> SearchConfig {
    SearchConfig::default().with_debounce(DEBOUNCE)
}

/// A provider answering every query with one item after `FETCH`, recording
/// the queries it was asked.
fn recording_provider(
    fetched: Arc<Mutex<Vec<String>>>,
) -> impl Fn(String) -> futures_util::future::BoxFuture<'static, Result<Vec<Item>, SearchError>>
       + Send
       + Sync
       + 'static {
    move |query: String| {
        fetched.lock().push(query.clone());
        Box::pin(async move {
            tokio::time::sleep(FETCH).await;
            Ok(vec![Item::new(1, query, "creator")])
        })
    }
}

fn settled_log(binding: &SearchBinding) -> Arc<Mutex<Vec<Vec<Item>>>> {
    let settled = Arc::new(Mutex::new(Vec::new()));
    let sink = settled.clone();
    binding.on_settled(move |items| sink.lock().push(items.to_vec()));
    settled
}

async fn wait(duration: Duration) {
    tokio::time::sleep(duration).await;
}

#[tokio::test(start_paused = true)]
async fn single_query_settles_once() {
    LocalSet::new()
        .run_until(async {
            let runtime = Runtime::new();
            let fetched = Arc::new(Mutex::new(Vec::new()));
            let binding = SearchBinding::spawn(&runtime, recording_provider(fetched.clone()), config());
            let settled = settled_log(&binding);

            binding.set_query("x");
            wait(Duration::from_secs(1)).await;

            assert_eq!(*fetched.lock(), vec!["x"]);
            assert_eq!(*settled.lock(), vec![vec![Item::new(1, "x", "creator")]]);
            assert_eq!(binding.results().get_untracked().len(), 1);
            assert!(binding.is_idle());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn typing_within_window_fetches_last_query_only() {
    LocalSet::new()
        .run_until(async {
            let runtime = Runtime::new();
            let fetched = Arc::new(Mutex::new(Vec::new()));
            let binding = SearchBinding::spawn(&runtime, recording_provider(fetched.clone()), config());
            let settled = settled_log(&binding);

            binding.set_query("x");
            wait(DEBOUNCE / 2).await;
            binding.set_query("xy");
            wait(Duration::from_secs(1)).await;

            assert_eq!(*fetched.lock(), vec!["xy"]);
            assert_eq!(settled.lock().len(), 1);
            assert_eq!(settled.lock()[0][0].title, "xy");
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn newer_query_supersedes_in_flight_fetch() {
    LocalSet::new()
        .run_until(async {
            let runtime = Runtime::new();
            let fetched = Arc::new(Mutex::new(Vec::new()));
            let binding = SearchBinding::spawn(&runtime, recording_provider(fetched.clone()), config());
            let settled = settled_log(&binding);

            binding.set_query("slow");
            // Settled and fetching, but not finished.
            wait(DEBOUNCE + FETCH / 2).await;
            assert!(!binding.is_idle());

            binding.set_query("fast");
            wait(Duration::from_secs(1)).await;

            assert_eq!(*fetched.lock(), vec!["slow", "fast"]);
            assert_eq!(settled.lock().len(), 1);
            assert_eq!(settled.lock()[0][0].title, "fast");
            assert!(binding.is_idle());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_publishes_nothing() {
    LocalSet::new()
        .run_until(async {
            let runtime = Runtime::new();
            let provider = |_query: String| async {
                tokio::time::sleep(FETCH).await;
                Err::<Vec<Item>, _>(SearchError::Status(500))
            };
            let binding = SearchBinding::spawn(&runtime, provider, config());
            let settled = settled_log(&binding);

            binding.set_query("x");
            wait(Duration::from_secs(1)).await;

            assert!(settled.lock().is_empty());
            assert!(binding.results().get_untracked().is_empty());
            assert!(binding.is_idle());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn empty_query_clears_results_without_fetching() {
    LocalSet::new()
        .run_until(async {
            let runtime = Runtime::new();
            let fetched = Arc::new(Mutex::new(Vec::new()));
            let binding = SearchBinding::spawn(&runtime, recording_provider(fetched.clone()), config());
            let settled = settled_log(&binding);

            binding.set_query("x");
            wait(Duration::from_secs(1)).await;
            binding.set_query("   ");
            wait(Duration::from_secs(1)).await;

            assert_eq!(*fetched.lock(), vec!["x"]);
            assert_eq!(settled.lock().len(), 2);
            assert!(settled.lock()[1].is_empty());
            assert!(binding.results().get_untracked().is_empty());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn empty_query_cancels_in_flight_fetch() {
    LocalSet::new()
        .run_until(async {
            let runtime = Runtime::new();
            let fetched = Arc::new(Mutex::new(Vec::new()));
            let binding = SearchBinding::spawn(&runtime, recording_provider(fetched.clone()), config());
            let settled = settled_log(&binding);

            binding.set_query("x");
            wait(DEBOUNCE + FETCH / 2).await;
            binding.set_query("");
            wait(Duration::from_secs(1)).await;

            assert_eq!(*fetched.lock(), vec!["x"]);
            assert!(settled.lock().is_empty());
            assert!(binding.is_idle());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn loading_tracks_fetches() {
    LocalSet::new()
        .run_until(async {
            let runtime = Runtime::new();
            let fetched = Arc::new(Mutex::new(Vec::new()));
            let binding = SearchBinding::spawn(&runtime, recording_provider(fetched), config());
            let transitions = Arc::new(Mutex::new(Vec::new()));

            let _spinner = Effect::new(&runtime, {
                let loading = binding.loading().clone();
                let transitions = transitions.clone();
                move || {
                    transitions.lock().push(loading.get());
                    None
                }
            });

            binding.set_query("x");
            wait(Duration::from_secs(1)).await;

            assert_eq!(*transitions.lock(), vec![false, true, false]);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn dispose_stops_everything() {
    LocalSet::new()
        .run_until(async {
            let runtime = Runtime::new();
            let fetched = Arc::new(Mutex::new(Vec::new()));
            let binding = SearchBinding::spawn(&runtime, recording_provider(fetched.clone()), config());
            let settled = settled_log(&binding);

            // One fetch in flight, one query pending in the debounce window.
            binding.set_query("x");
            wait(DEBOUNCE + FETCH / 2).await;
            binding.set_query("xy");

            binding.dispose();
            binding.dispose();
            assert!(binding.is_disposed());

            binding.set_query("xyz");
            wait(Duration::from_secs(1)).await;

            assert_eq!(*fetched.lock(), vec!["x"]);
            assert!(settled.lock().is_empty());
            assert_eq!(binding.query().subscriber_count(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn dropped_binding_cancels_provider_work() {
    LocalSet::new()
        .run_until(async {
            let runtime = Runtime::new();
            let finished = Arc::new(AtomicUsize::new(0));
            let provider = {
                let finished = finished.clone();
                move |query: String| {
                    let finished = finished.clone();
                    async move {
                        tokio::time::sleep(FETCH).await;
                        finished.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, SearchError>(vec![Item::new(1, query, "creator")])
                    }
                }
            };
            let binding = SearchBinding::spawn(&runtime, provider, config());

            binding.set_query("x");
            wait(DEBOUNCE + FETCH / 2).await;
            drop(binding);
            wait(Duration::from_secs(1)).await;

            assert_eq!(finished.load(Ordering::SeqCst), 0);
        })
        .await;
}

/// Searches run on worker threads, but results are published on the thread
/// that owns the runtime, without disturbing effects running there.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn publishes_on_the_runtime_thread() {
    LocalSet::new()
        .run_until(async {
            let owner = std::thread::current().id();
            let runtime = Runtime::new();
            let provider = |query: String| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, SearchError>(vec![Item::new(1, query, "creator")])
            };
            let binding = SearchBinding::spawn(
                &runtime,
                provider,
                SearchConfig::default().with_debounce(Duration::from_millis(5)),
            );

            let view_threads = Arc::new(Mutex::new(Vec::new()));
            let results_view = Effect::new(&runtime, {
                let results = binding.results().clone();
                let threads = view_threads.clone();
                move || {
                    results.get();
                    threads.lock().push(std::thread::current().id());
                    None
                }
            });
            let settled_threads = Arc::new(Mutex::new(Vec::new()));
            binding.on_settled({
                let threads = settled_threads.clone();
                move |_| threads.lock().push(std::thread::current().id())
            });

            binding.set_query("x");
            // Settled, with the fetch in flight on a worker.
            wait(Duration::from_millis(15)).await;

            // A slow effect body holds the runtime thread while the fetch
            // finishes elsewhere.
            let other = Signal::new(&runtime, 0);
            let slow_runs = Arc::new(AtomicUsize::new(0));
            let slow = Effect::new(&runtime, {
                let other = other.clone();
                let runs = slow_runs.clone();
                move || {
                    other.get();
                    std::thread::sleep(Duration::from_millis(40));
                    runs.fetch_add(1, Ordering::SeqCst);
                    None
                }
            });

            for _ in 0..200 {
                if binding.is_idle() && !binding.results().get_untracked().is_empty() {
                    break;
                }
                wait(Duration::from_millis(10)).await;
            }

            assert_eq!(binding.results().get_untracked().len(), 1);
            assert_eq!(*view_threads.lock(), vec![owner, owner]);
            assert_eq!(*settled_threads.lock(), vec![owner]);
            assert_eq!(results_view.dependency_count(), 1);
            assert_eq!(slow.dependency_count(), 1);

            other.set(1);
            assert_eq!(slow_runs.load(Ordering::SeqCst), 2);
        })
        .await;
}
