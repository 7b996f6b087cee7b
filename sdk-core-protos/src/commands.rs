use crate::failure::Failure;
use crate::identifiers::WorkflowExecution;
use crate::payload::{Headers, Payload};
use crate::retry::RetryPolicy;
use std::collections::HashMap;
use std::time::Duration;

/// Target of a signal/cancel-external command: either a child of this
/// workflow (by workflow id only) or an arbitrary execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalTarget {
    ChildWorkflowId(String),
    Execution(WorkflowExecution),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityOptionsWire {
    pub activity_type: String,
    pub task_queue: Option<String>,
    pub schedule_to_close_timeout: Option<Duration>,
    pub schedule_to_start_timeout: Option<Duration>,
    pub start_to_close_timeout: Option<Duration>,
    pub heartbeat_timeout: Option<Duration>,
    pub retry_policy: Option<RetryPolicy>,
    pub cancellation_type: ActivityCancellationType,
    pub is_local: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityCancellationType {
    TryCancel,
    WaitCancellationCompleted,
    Abandon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChildWorkflowOptionsWire {
    pub workflow_type: String,
    pub workflow_id: String,
    pub task_queue: Option<String>,
    pub retry_policy: Option<RetryPolicy>,
    pub cron_schedule: Option<String>,
    pub memo: HashMap<String, Payload>,
    pub search_attributes: HashMap<String, Payload>,
}

/// One outbound instruction emitted by a workflow task (§3 Data Model).
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowCommand {
    ScheduleActivity {
        seq: u32,
        options: ActivityOptionsWire,
        input: Vec<Payload>,
        headers: Headers,
    },
    RequestCancelActivity {
        seq: u32,
    },
    StartTimer {
        seq: u32,
        duration: Duration,
        summary: Option<String>,
    },
    CancelTimer {
        seq: u32,
    },
    CompleteWorkflow {
        result: Option<Payload>,
    },
    FailWorkflow {
        failure: Failure,
    },
    ContinueAsNew {
        workflow_type: String,
        arguments: Vec<Payload>,
        task_queue: Option<String>,
        headers: Headers,
    },
    CancelWorkflow {
        details: Vec<Payload>,
    },
    StartChildWorkflow {
        seq: u32,
        options: ChildWorkflowOptionsWire,
        input: Vec<Payload>,
        headers: Headers,
    },
    CancelChildWorkflow {
        child_workflow_seq: u32,
    },
    SignalExternalWorkflow {
        seq: u32,
        target: ExternalTarget,
        signal_name: String,
        args: Vec<Payload>,
        headers: Headers,
    },
    CancelExternalWorkflow {
        seq: u32,
        target: ExternalTarget,
    },
    RecordMarker {
        name: String,
        details: HashMap<String, Payload>,
    },
    UpsertSearchAttributes {
        attributes: HashMap<String, Payload>,
    },
    UpsertMemo {
        memo: HashMap<String, Payload>,
    },
    SetPatchMarker {
        patch_id: String,
        deprecated: bool,
    },
    UpdateAccepted {
        update_id: String,
    },
    UpdateCompleted {
        update_id: String,
        result: Option<Payload>,
    },
    UpdateRejected {
        update_id: String,
        failure: Failure,
    },
    RespondToQuery {
        query_id: String,
        result: Result<Option<Payload>, Failure>,
    },
}

impl WorkflowCommand {
    /// True for any command that terminates the workflow run; the state
    /// machine must not accept further commands after one of these.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowCommand::CompleteWorkflow { .. }
                | WorkflowCommand::FailWorkflow { .. }
                | WorkflowCommand::ContinueAsNew { .. }
                | WorkflowCommand::CancelWorkflow { .. }
        )
    }
}
