//! Cancellable Derived Task Runner
//!
//! Runs one asynchronous unit of work per input, with at most one task in
//! flight. Submitting a new input cancels whatever is running.
//!
//! # State Machine
//!
//! ```text
//! Idle --submit(a)--> Running(a) --completion--> Idle
//!                        |
//!                    submit(b): cancel(a)
//!                        v
//!                     Running(b)
//! ```
//!
//! # Marshalling
//!
//! Work runs on `tokio::spawn`, off the reactive context. Results come back
//! through a channel and are classified by [`DerivedTaskRunner::next_outcome`],
//! so whoever owns the runner is the only one who acts on them. A result
//! tagged with an old generation is reported as [`TaskOutcome::Superseded`]
//! and must not be published.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::cancel::CancellationToken;

type WorkFn<I, O, E> =
    Arc<dyn Fn(I, CancellationToken) -> BoxFuture<'static, Result<O, E>> + Send + Sync>;

/// Where the runner is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState<I> {
    /// Nothing in flight.
    Idle,
    /// A task for `input` is in flight.
    Running { generation: u64, input: I },
}

/// A classified task completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<O, E> {
    /// The current task succeeded. Safe to publish.
    Completed(O),
    /// The current task failed. The runner is idle again.
    Failed(E),
    /// A task finished after a newer one started. Discard.
    Superseded,
}

struct Completion<O, E> {
    generation: u64,
    result: Result<O, E>,
}

/// Runs derived async work, keeping at most one task active.
pub struct DerivedTaskRunner<I, O, E> {
    work: WorkFn<I, O, E>,
    generation: u64,
    state: TaskState<I>,
    token: Option<CancellationToken>,
    completions_tx: mpsc::UnboundedSender<Completion<O, E>>,
    completions_rx: mpsc::UnboundedReceiver<Completion<O, E>>,
}

impl<I, O, E> DerivedTaskRunner<I, O, E>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
    E: Display + Send + 'static,
{
    /// Create an idle runner for `work`.
    ///
    /// `work` receives the input and a token that is cancelled when the task
    /// is superseded, cancelled, or the runner is dropped.
    pub fn new<F, Fut>(work: F) -> Self
    where
        F: Fn(I, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
    {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            work: Arc::new(move |input, token| {
                Box::pin(work(input, token)) as BoxFuture<'static, Result<O, E>>
            }),
            generation: 0,
            state: TaskState::Idle,
            token: None,
            completions_tx,
            completions_rx,
        }
    }

    /// Cancel the running task (if any) and start one for `input`.
    ///
    /// Must be called from within a Tokio runtime. Returns the generation of
    /// the new task.
    pub fn submit(&mut self, input: I) -> u64 {
        self.cancel_in_flight();

        self.generation += 1;
        let generation = self.generation;
        let token = CancellationToken::new();
        let work = (self.work)(input.clone(), token.clone());
        let completions = self.completions_tx.clone();
        let task_token = token.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    trace!(generation, "derived task cancelled");
                }
                result = work => {
                    if !task_token.is_cancelled() {
                        // The runner may be gone already.
                        let _ = completions.send(Completion { generation, result });
                    }
                }
            }
        });

        debug!(generation, "derived task submitted");
        self.token = Some(token);
        self.state = TaskState::Running { generation, input };
        generation
    }

    /// Cancel the running task, if any, and return to idle.
    pub fn cancel(&mut self) {
        if self.cancel_in_flight() {
            debug!(generation = self.generation, "derived task cancelled");
        }
        self.state = TaskState::Idle;
    }

    /// Wait for the next completion and classify it.
    ///
    /// Never resolves while nothing is in flight. Cancel-safe: dropping the
    /// future loses no completion.
    pub async fn next_outcome(&mut self) -> TaskOutcome<O, E> {
        let Some(completion) = self.completions_rx.recv().await else {
            // The runner owns a sender, so the channel never closes.
            return futures_util::future::pending().await;
        };

        let is_current = matches!(
            self.state,
            TaskState::Running { generation, .. } if generation == completion.generation
        );
        if !is_current {
            trace!(
                generation = completion.generation,
                current = self.generation,
                "discarding superseded result"
            );
            return TaskOutcome::Superseded;
        }

        self.state = TaskState::Idle;
        self.token = None;

        match completion.result {
            Ok(output) => TaskOutcome::Completed(output),
            Err(err) => {
                warn!(generation = completion.generation, error = %err, "derived task failed");
                TaskOutcome::Failed(err)
            }
        }
    }

    /// Current state.
    pub fn state(&self) -> &TaskState<I> {
        &self.state
    }

    /// Check whether a task is in flight.
    pub fn is_running(&self) -> bool {
        matches!(self.state, TaskState::Running { .. })
    }

    /// Generation of the most recently submitted task (0 before any).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn cancel_in_flight(&mut self) -> bool {
        match self.token.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

impl<I, O, E> Drop for DerivedTaskRunner<I, O, E> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}
