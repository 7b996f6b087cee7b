use crate::failure::Failure;
use crate::identifiers::TaskToken;
use crate::payload::{Headers, Payload};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityTaskTimeouts {
    pub schedule_to_close: Option<Duration>,
    pub schedule_to_start: Option<Duration>,
    pub start_to_close: Option<Duration>,
}

/// One activity task delivered by the bridge to the activity task pump (C).
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityTask {
    pub task_token: TaskToken,
    pub activity_id: String,
    pub activity_type: String,
    pub scheduled_event_id: i64,
    pub started_event_id: i64,
    pub attempt: u32,
    pub workflow_id: String,
    pub workflow_run_id: String,
    pub input: Vec<Payload>,
    pub headers: Headers,
    pub timeouts: ActivityTaskTimeouts,
    pub heartbeat_timeout: Option<Duration>,
    pub heartbeat_details: Vec<Payload>,
    pub scheduled_time: SystemTime,
    pub non_retryable_error_types: Vec<String>,
}

/// Cancellation reasons observable to user activity code (§3, §5).
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityCancelReason {
    Unknown,
    GoneFromServer,
    ServerRequest,
    Timeout,
    WorkerShutdown,
    HeartbeatRecordFailure(String),
    Paused,
    Reset,
}

/// The discriminated return of a user activity invocation (§9 redesign
/// flag: explicit return tag rather than a sentinel "complete async"
/// exception in the core).
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityExecutionResult {
    Completed(Option<Payload>),
    Failed(Failure),
    Cancelled(Failure),
    WillCompleteAsync,
}

/// What the pump reports back to the server for one finished activity task.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityTaskCompletion {
    pub task_token: TaskToken,
    pub result: ActivityExecutionResult,
}
