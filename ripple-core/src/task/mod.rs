//! Cancellable derived async work.
//!
//! A [`DerivedTaskRunner`] turns settled values into async tasks, keeping
//! only the newest one alive. Cancellation is cooperative through
//! [`CancellationToken`].

mod cancel;
mod runner;

pub use cancel::CancellationToken;
pub use runner::{DerivedTaskRunner, TaskOutcome, TaskState};
