//! Component G's typed façade: `WorkflowClientTrait` plus the ergonomic
//! handle types returned by its operations. Every input is a standalone
//! struct so an interceptor can read and rewrite it before it reaches the
//! next link in the chain (§4.G).

use crate::errors::ClientError;
use crate::raw::{DescribeWorkflowResponse, QueryRejectCondition, WorkflowResultOutcome};
use async_trait::async_trait;
use sdk_core_protos::failure::Failure;
use sdk_core_protos::identifiers::{RunId, WorkflowExecution};
use sdk_core_protos::payload::{Headers, Payload};
use sdk_core_protos::retry::RetryPolicy;
use sdk_core_protos::schedule::{ConflictToken, Schedule, ScheduleBackfill, ScheduleDescription, ScheduleListEntry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct StartWorkflowOptions {
    pub id: String,
    pub task_queue: String,
    pub execution_timeout: Option<Duration>,
    pub run_timeout: Option<Duration>,
    pub task_timeout: Option<Duration>,
    pub retry_policy: Option<RetryPolicy>,
    pub id_reuse_policy: WorkflowIdReusePolicy,
    pub id_conflict_policy: WorkflowIdConflictPolicy,
    pub cron_schedule: Option<String>,
    pub memo: HashMap<String, Payload>,
    pub search_attributes: HashMap<String, Payload>,
    pub request_id: Option<String>,
    pub start_delay: Option<Duration>,
    pub signal_with_start: Option<(String, Vec<Payload>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowIdReusePolicy {
    AllowDuplicate,
    AllowDuplicateFailedOnly,
    RejectDuplicate,
    TerminateIfRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowIdConflictPolicy {
    Fail,
    UseExisting,
    TerminateExisting,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartWorkflowInput {
    pub workflow_type: String,
    pub options: StartWorkflowOptions,
    pub input: Vec<Payload>,
    pub headers: Headers,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalWorkflowInput {
    pub execution: WorkflowExecution,
    pub signal_name: String,
    pub input: Vec<Payload>,
    pub headers: Headers,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryWorkflowInput {
    pub execution: WorkflowExecution,
    pub query_type: String,
    pub input: Vec<Payload>,
    pub headers: Headers,
    pub reject_condition: QueryRejectCondition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateWorkflowInput {
    pub execution: WorkflowExecution,
    pub name: String,
    pub input: Vec<Payload>,
    pub headers: Headers,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancelWorkflowInput {
    pub execution: WorkflowExecution,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerminateWorkflowInput {
    pub execution: WorkflowExecution,
    pub reason: Option<String>,
    pub details: Vec<Payload>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescribeWorkflowInput {
    pub execution: WorkflowExecution,
}

/// The typed, ergonomic, interceptor-routed surface over the server RPCs
/// (§4.G). Object-safe so an interceptor chain can be built as
/// `Arc<dyn WorkflowClientTrait>`.
#[async_trait]
pub trait WorkflowClientTrait: Send + Sync {
    async fn start_workflow(&self, input: StartWorkflowInput) -> Result<RunId, ClientError>;
    async fn signal_workflow(&self, input: SignalWorkflowInput) -> Result<(), ClientError>;
    async fn query_workflow(&self, input: QueryWorkflowInput) -> Result<Option<Payload>, ClientError>;
    async fn start_update(&self, input: UpdateWorkflowInput) -> Result<Option<Payload>, ClientError>;
    async fn cancel_workflow(&self, input: CancelWorkflowInput) -> Result<(), ClientError>;
    async fn terminate_workflow(&self, input: TerminateWorkflowInput) -> Result<(), ClientError>;
    async fn describe_workflow(&self, input: DescribeWorkflowInput) -> Result<DescribeWorkflowResponse, ClientError>;
    async fn fetch_result(&self, execution: WorkflowExecution, follow_continue_as_new: bool) -> Result<WorkflowResultOutcome, ClientError>;

    async fn heartbeat_async_activity(&self, id: AsyncActivityId, details: Vec<Payload>) -> Result<(), ClientError>;
    async fn complete_async_activity(&self, id: AsyncActivityId, result: Option<Payload>) -> Result<(), ClientError>;
    async fn fail_async_activity(&self, id: AsyncActivityId, failure: Failure) -> Result<(), ClientError>;
    async fn report_cancellation_async_activity(&self, id: AsyncActivityId, details: Vec<Payload>) -> Result<(), ClientError>;

    async fn create_schedule(&self, schedule_id: String, schedule: Schedule, trigger_immediately: bool, backfills: Vec<ScheduleBackfill>) -> Result<(), ClientError>;
    async fn describe_schedule(&self, schedule_id: String) -> Result<ScheduleDescription, ClientError>;
    async fn list_schedules(&self, page_token: Vec<u8>) -> Result<(Vec<ScheduleListEntry>, Vec<u8>), ClientError>;
    async fn trigger_schedule(&self, schedule_id: String) -> Result<(), ClientError>;
    async fn pause_schedule(&self, schedule_id: String, note: Option<String>) -> Result<(), ClientError>;
    async fn unpause_schedule(&self, schedule_id: String, note: Option<String>) -> Result<(), ClientError>;
    async fn backfill_schedule(&self, schedule_id: String, backfills: Vec<ScheduleBackfill>) -> Result<(), ClientError>;
    async fn apply_schedule_update(&self, schedule_id: String, schedule: Schedule, conflict_token: ConflictToken) -> Result<(), ClientError>;
    async fn delete_schedule(&self, schedule_id: String) -> Result<(), ClientError>;
}

/// Identifies one async-completion activity, either by its execution
/// coordinates or by an opaque task token (§4.G).
#[derive(Debug, Clone, PartialEq)]
pub enum AsyncActivityId {
    Execution { workflow_id: String, run_id: Option<String>, activity_id: String },
    TaskToken(sdk_core_protos::TaskToken),
}

/// An ergonomic reference to a started workflow run, as returned by
/// `startWorkflow`.
#[derive(Clone)]
pub struct WorkflowHandle {
    client: Arc<dyn WorkflowClientTrait>,
    pub workflow_id: String,
    pub run_id: RunId,
}

impl WorkflowHandle {
    pub fn new(client: Arc<dyn WorkflowClientTrait>, workflow_id: String, run_id: RunId) -> Self {
        Self { client, workflow_id, run_id }
    }

    fn execution(&self) -> WorkflowExecution {
        WorkflowExecution { namespace: String::new(), workflow_id: self.workflow_id.clone(), run_id: self.run_id.0.clone() }
    }

    pub async fn result(&self, follow_continue_as_new: bool) -> Result<WorkflowResultOutcome, ClientError> {
        self.client.fetch_result(self.execution(), follow_continue_as_new).await
    }

    pub async fn signal(&self, name: impl Into<String>, input: Vec<Payload>) -> Result<(), ClientError> {
        self.client
            .signal_workflow(SignalWorkflowInput { execution: self.execution(), signal_name: name.into(), input, headers: Headers::new() })
            .await
    }

    pub async fn query(&self, name: impl Into<String>, input: Vec<Payload>) -> Result<Option<Payload>, ClientError> {
        self.client
            .query_workflow(QueryWorkflowInput {
                execution: self.execution(),
                query_type: name.into(),
                input,
                headers: Headers::new(),
                reject_condition: QueryRejectCondition::None,
            })
            .await
    }

    pub async fn start_update(&self, name: impl Into<String>, input: Vec<Payload>) -> Result<UpdateHandle, ClientError> {
        let result = self
            .client
            .start_update(UpdateWorkflowInput { execution: self.execution(), name: name.into(), input, headers: Headers::new() })
            .await?;
        Ok(UpdateHandle { result })
    }

    pub async fn execute_update(&self, name: impl Into<String>, input: Vec<Payload>) -> Result<Option<Payload>, ClientError> {
        self.start_update(name, input).await?.result().await
    }

    pub async fn cancel(&self) -> Result<(), ClientError> {
        self.client.cancel_workflow(CancelWorkflowInput { execution: self.execution() }).await
    }

    pub async fn terminate(&self, reason: Option<String>, details: Vec<Payload>) -> Result<(), ClientError> {
        self.client.terminate_workflow(TerminateWorkflowInput { execution: self.execution(), reason, details }).await
    }

    pub async fn describe(&self) -> Result<DescribeWorkflowResponse, ClientError> {
        self.client.describe_workflow(DescribeWorkflowInput { execution: self.execution() }).await
    }
}

/// An already-resolved update outcome. Real updates may wait server-side
/// before the handle is constructible; this workspace's client resolves
/// `start_update` synchronously against the (non-goal) wire transport seam,
/// so `result()` is immediate.
pub struct UpdateHandle {
    result: Option<Payload>,
}

impl UpdateHandle {
    pub async fn result(&self) -> Result<Option<Payload>, ClientError> {
        Ok(self.result.clone())
    }
}
