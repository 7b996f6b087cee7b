use crate::payload::Payload;
use std::time::Duration;

/// `timeout.kind` discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    ScheduleToStart,
    ScheduleToClose,
    StartToClose,
    Heartbeat,
}

/// Retry state as last reported by the server for an activity or child
/// workflow failure wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    InProgress,
    RetryPolicyNotSet,
    Timeout,
    MaximumAttemptsReached,
    NonRetryableFailure,
    CancelRequested,
    InternalServerError,
    Unspecified,
}

/// The tagged union of failure kinds a workflow or activity can surface.
/// Modeled as a sum type with exhaustive matching, never a string `kind`
/// field, so callers can't silently mishandle a variant they didn't expect.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureInfo {
    Application {
        r#type: String,
        non_retryable: bool,
        next_retry_delay: Option<Duration>,
        details: Option<Vec<Payload>>,
    },
    Cancelled {
        details: Option<Vec<Payload>>,
    },
    Terminated {
        reason: Option<String>,
        details: Option<Vec<Payload>>,
    },
    Timeout {
        kind: TimeoutKind,
        last_heartbeat_details: Option<Vec<Payload>>,
    },
    Activity {
        scheduled_event_id: i64,
        started_event_id: i64,
        activity_id: String,
        activity_type: String,
        identity: String,
        retry_state: RetryState,
    },
    ChildWorkflowExecution {
        namespace: String,
        workflow_id: String,
        run_id: String,
        workflow_type: String,
        retry_state: RetryState,
    },
    Server {
        non_retryable: bool,
    },
}

/// A recursive failure record. `encodedAttributes` is populated only when
/// the failure converter is run with `encode_common_attributes = true`; it
/// is opaque to everything except the outer codec (component A).
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub message: String,
    pub source: Option<String>,
    pub stack_trace: Option<String>,
    pub encoded_attributes: Option<Payload>,
    pub cause: Option<Box<Failure>>,
    pub info: FailureInfo,
}

impl Failure {
    pub fn application(r#type: impl Into<String>, message: impl Into<String>, non_retryable: bool) -> Self {
        Self {
            message: message.into(),
            source: None,
            stack_trace: None,
            encoded_attributes: None,
            cause: None,
            info: FailureInfo::Application {
                r#type: r#type.into(),
                non_retryable,
                next_retry_delay: None,
                details: None,
            },
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
            stack_trace: None,
            encoded_attributes: None,
            cause: None,
            info: FailureInfo::Cancelled { details: None },
        }
    }

    pub fn wrap_activity(
        self,
        scheduled_event_id: i64,
        started_event_id: i64,
        activity_id: String,
        activity_type: String,
        identity: String,
        retry_state: RetryState,
    ) -> Self {
        Failure {
            message: format!("activity '{activity_type}' failed"),
            source: Some("core".to_string()),
            stack_trace: None,
            encoded_attributes: None,
            cause: Some(Box::new(self)),
            info: FailureInfo::Activity {
                scheduled_event_id,
                started_event_id,
                activity_id,
                activity_type,
                identity,
                retry_state,
            },
        }
    }

    /// Whether the activity/workflow's retry policy should treat this
    /// failure as non-retryable (an explicit flag, or a type-name match
    /// against `nonRetryableErrorTypes`).
    pub fn is_non_retryable(&self, non_retryable_error_types: &[String]) -> bool {
        match &self.info {
            FailureInfo::Application { r#type, non_retryable, .. } => {
                *non_retryable || non_retryable_error_types.iter().any(|t| t == r#type)
            }
            FailureInfo::Server { non_retryable } => *non_retryable,
            _ => false,
        }
    }
}
