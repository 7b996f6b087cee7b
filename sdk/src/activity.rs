//! The ergonomic handle passed to user activity functions, and the typed
//! error they return. Wraps component C's [`CoreActContext`] the same way
//! [`crate::context::WfContext`] wraps the workflow zone's raw handles.

use crate::convert;
use temporal_core::conversions::PayloadConverter;
use temporal_core::worker::activity_task_pump::ActContext as CoreActContext;
pub use temporal_core::worker::activity_task_pump::ActivityInfo;
pub use sdk_core_protos::activity::ActivityCancelReason;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Returned by a user activity function. `Retryable`/`NonRetryable` carry a
/// plain message (the framework wraps it in a `Failure::application` on the
/// way out); `Cancelled` is reported distinctly so the workflow side sees a
/// cancellation rather than an ordinary failure.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("{0}")]
    Retryable(String),
    #[error("{0}")]
    NonRetryable(String),
    #[error("activity cancelled: {0}")]
    Cancelled(String),
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ActivityError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable(message.into())
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self::NonRetryable(message.into())
    }
}

/// Handed to a running activity. Cheap to clone; every clone observes the
/// same cancellation signal and heartbeats through the same channel.
#[derive(Clone)]
pub struct ActContext {
    inner: CoreActContext,
    converter: Arc<dyn PayloadConverter>,
}

impl ActContext {
    pub(crate) fn new(inner: CoreActContext, converter: Arc<dyn PayloadConverter>) -> Self {
        Self { inner, converter }
    }

    pub fn info(&self) -> &ActivityInfo {
        self.inner.info.as_ref()
    }

    pub fn heartbeat<D: Serialize>(&self, details: D) -> Result<(), ActivityError> {
        let payload = convert::encode(&self.converter, &details).map_err(|e| ActivityError::NonRetryable(e.to_string()))?;
        self.inner.heartbeat(vec![payload]);
        Ok(())
    }

    pub fn cancellation_reason(&self) -> Option<ActivityCancelReason> {
        self.inner.cancellation_reason()
    }

    pub async fn cancelled(&mut self) -> ActivityCancelReason {
        self.inner.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_and_non_retryable_constructors_carry_the_message() {
        assert_eq!(ActivityError::retryable("try again").to_string(), "try again");
        assert_eq!(ActivityError::non_retryable("give up").to_string(), "give up");
    }

    #[test]
    fn cancelled_formats_with_a_prefix() {
        assert_eq!(ActivityError::Cancelled("worker shutdown".to_string()).to_string(), "activity cancelled: worker shutdown");
    }
}
