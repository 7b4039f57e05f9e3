//! Error types.
//!
//! Each concern has its own enum. None of these ever reach a panic: the
//! reactive layer logs them, the search layer swallows transient failures,
//! and configuration errors are returned to the caller.

use thiserror::Error;

use crate::reactive::{SignalId, SubscriberId};

/// Errors raised by the reactive graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A signal kept writing itself from inside its own notification cycle.
    #[error("signal {signal:?} re-entered its own notification more than {rounds} times")]
    ReentrancyLimit { signal: SignalId, rounds: usize },

    /// The effect was disposed and can no longer run.
    #[error("effect {0:?} has been disposed")]
    EffectDisposed(SubscriberId),

    /// The runtime owning this graph has been dropped.
    #[error("reactive runtime has been dropped")]
    RuntimeDropped,
}

/// Failures of a search request.
///
/// All of these are transient from the binding's point of view: the attempt
/// is discarded and the last published results stay in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The request never produced a response.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The directory answered with a non-success status.
    #[error("directory returned status {0}")]
    Status(u16),

    /// The response body could not be decoded.
    #[error("failed to decode search response: {0}")]
    Decode(String),

    /// The directory endpoint is not a usable base URL.
    #[error("invalid directory url: {0}")]
    InvalidUrl(String),
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<url::ParseError> for SearchError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
