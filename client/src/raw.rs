//! The terminal gRPC-speaking seam of the interceptor chain (§4.G): one
//! method per workflow-service RPC, all typed against the shared data model
//! in `sdk-core-protos` rather than raw protobuf messages (see that crate's
//! module doc for why it plays both roles). Wire transport, TLS and
//! credentials are not implemented here; a concrete `WorkflowServiceClient`
//! is a deployment detail left to whoever wires this workspace to a running
//! server.

use async_trait::async_trait;
use sdk_core_protos::activity::{ActivityExecutionResult, ActivityTask};
use sdk_core_protos::commands::WorkflowCommand;
use sdk_core_protos::failure::Failure;
use sdk_core_protos::identifiers::{RunId, TaskToken, WorkflowExecution};
use sdk_core_protos::payload::{Headers, Payload};
use sdk_core_protos::retry::RetryPolicy;
use sdk_core_protos::schedule::{Schedule, ScheduleBackfill, ScheduleDescription, ScheduleListEntry, ConflictToken};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

pub type Result<T, E = tonic::Status> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq)]
pub struct PolledWorkflowTask {
    pub task_token: TaskToken,
    pub activation: sdk_core_protos::activation::WorkflowActivation,
    pub legacy_query: Option<sdk_core_protos::activation::LegacyQuery>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowTaskCompletion {
    pub task_token: TaskToken,
    pub commands: Vec<WorkflowCommand>,
    pub sticky_queue: Option<String>,
    pub return_new_workflow_task: bool,
    pub force_create_new_workflow_task: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartWorkflowRequest {
    pub workflow_id: String,
    pub workflow_type: String,
    pub task_queue: String,
    pub input: Vec<Payload>,
    pub request_id: String,
    pub execution_timeout: Option<Duration>,
    pub run_timeout: Option<Duration>,
    pub task_timeout: Option<Duration>,
    pub retry_policy: Option<RetryPolicy>,
    pub cron_schedule: Option<String>,
    pub memo: HashMap<String, Payload>,
    pub search_attributes: HashMap<String, Payload>,
    pub headers: Headers,
    pub start_delay: Option<Duration>,
    pub signal_with_start: Option<(String, Vec<Payload>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartWorkflowResponse {
    pub run_id: RunId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryRejectCondition {
    None,
    NotCompletedCleanly,
    NotOpen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescribeWorkflowResponse {
    pub execution: WorkflowExecution,
    pub workflow_type: String,
    pub status: WorkflowExecutionStatus,
    pub start_time: SystemTime,
    pub close_time: Option<SystemTime>,
    pub pending_activities: Vec<PendingActivityInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowExecutionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
    Terminated,
    ContinuedAsNew,
    TimedOut,
}

/// Addresses an activity by its workflow/run/activity id triple rather than
/// by the opaque task token handed to the worker that's currently running
/// it — the shape `AsyncActivityHandle::from_execution` lets a caller build
/// without ever having seen a task token.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityExecutionId {
    pub workflow_id: String,
    pub run_id: Option<String>,
    pub activity_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingActivityInfo {
    pub activity_id: String,
    pub activity_type: String,
    pub attempt: u32,
    pub last_heartbeat_details: Vec<Payload>,
}

/// One page of [`HistoryEvent`](sdk_core_protos::activation::WorkflowActivation)-adjacent
/// terminal-status information, enough for `handle.result()` to classify the
/// run's outcome without the full event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowResultOutcome {
    Success(Option<Payload>),
    Failed(Failure),
    Cancelled(Failure),
    Terminated { reason: Option<String> },
    TimedOut,
    ContinuedAsNew { new_run_id: RunId },
}

#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait WorkflowServiceClient: Send + Sync {
    async fn poll_workflow_task_queue(&self, task_queue: String, sticky: bool) -> Result<PolledWorkflowTask>;
    async fn poll_activity_task_queue(&self, task_queue: String, max_tasks_per_sec: Option<f64>) -> Result<ActivityTask>;
    async fn respond_workflow_task_completed(&self, completion: WorkflowTaskCompletion) -> Result<()>;
    async fn respond_workflow_task_failed(&self, task_token: TaskToken, failure: Failure) -> Result<()>;
    async fn respond_activity_task_completed(&self, task_token: TaskToken, result: ActivityExecutionResult) -> Result<()>;
    async fn record_activity_task_heartbeat(&self, task_token: TaskToken, details: Vec<Payload>) -> Result<bool>;
    async fn record_activity_task_heartbeat_by_id(&self, id: ActivityExecutionId, details: Vec<Payload>) -> Result<bool>;
    async fn respond_activity_task_completed_by_id(&self, id: ActivityExecutionId, result: ActivityExecutionResult) -> Result<()>;
    async fn respond_query_task_completed(&self, task_token: TaskToken, result: Result<Option<Payload>, Failure>) -> Result<()>;
    async fn get_workflow_execution_history(&self, execution: WorkflowExecution, page_token: Vec<u8>) -> Result<(Vec<u8>, Vec<u8>)>;
    async fn get_system_info(&self) -> Result<ServerCapabilities>;

    async fn start_workflow_execution(&self, req: StartWorkflowRequest) -> Result<StartWorkflowResponse>;
    async fn signal_workflow_execution(&self, execution: WorkflowExecution, signal_name: String, input: Vec<Payload>, request_id: String) -> Result<()>;
    async fn query_workflow(&self, execution: WorkflowExecution, query_type: String, input: Vec<Payload>, reject_condition: QueryRejectCondition) -> Result<Result<Option<Payload>, Failure>>;
    async fn update_workflow_execution(&self, execution: WorkflowExecution, name: String, input: Vec<Payload>, request_id: String) -> Result<Result<Option<Payload>, Failure>>;
    async fn request_cancel_workflow_execution(&self, execution: WorkflowExecution, request_id: String) -> Result<()>;
    async fn terminate_workflow_execution(&self, execution: WorkflowExecution, reason: Option<String>, details: Vec<Payload>) -> Result<()>;
    async fn describe_workflow_execution(&self, execution: WorkflowExecution) -> Result<DescribeWorkflowResponse>;
    async fn fetch_terminal_outcome(&self, execution: WorkflowExecution) -> Result<Option<WorkflowResultOutcome>>;

    async fn create_schedule(&self, schedule_id: String, schedule: Schedule, trigger_immediately: bool, backfills: Vec<ScheduleBackfill>) -> Result<()>;
    async fn describe_schedule(&self, schedule_id: String) -> Result<ScheduleDescription>;
    async fn list_schedules(&self, page_token: Vec<u8>) -> Result<(Vec<ScheduleListEntry>, Vec<u8>)>;
    async fn patch_schedule_trigger(&self, schedule_id: String) -> Result<()>;
    async fn patch_schedule_pause(&self, schedule_id: String, note: Option<String>, pause: bool) -> Result<()>;
    async fn patch_schedule_backfill(&self, schedule_id: String, backfills: Vec<ScheduleBackfill>) -> Result<()>;
    async fn update_schedule(&self, schedule_id: String, schedule: Schedule, conflict_token: ConflictToken) -> Result<()>;
    async fn delete_schedule(&self, schedule_id: String) -> Result<()>;
}

/// Cached result of `GetSystemInfo`, consulted by [`crate::retry::RetryClient`]
/// to decide whether build-id-based versioning fields should be attached to
/// outbound requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerCapabilities {
    pub build_id_based_versioning: bool,
    pub signal_and_query_header: bool,
    pub upsert_memo: bool,
}
