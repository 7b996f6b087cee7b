use crate::failure::Failure;
use crate::payload::{Headers, Payload};
use crate::Timestamp;
use std::collections::HashMap;
use std::time::Duration;

/// One outcome delivered back to a parked `scheduleActivity`/local-activity
/// continuation.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityResolution {
    Completed(Option<Payload>),
    Failed(Failure),
    Cancelled(Failure),
    /// Local-activity only: server asked the workflow to sleep and retry.
    Backoff(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChildWorkflowStartResolution {
    Started { run_id: String },
    Failed { workflow_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChildWorkflowResolution {
    Completed(Option<Payload>),
    Failed(Failure),
    Cancelled(Failure),
}

/// One job inside an activation's job list (§3 Data Model).
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowActivationJob {
    InitializeWorkflow {
        workflow_type: String,
        workflow_id: String,
        arguments: Vec<Payload>,
        randomness_seed: u64,
        headers: Headers,
    },
    FireTimer {
        seq: u32,
    },
    ResolveActivity {
        seq: u32,
        result: ActivityResolution,
    },
    ResolveChildWorkflowStart {
        seq: u32,
        result: ChildWorkflowStartResolution,
    },
    ResolveChildWorkflowExecution {
        seq: u32,
        result: ChildWorkflowResolution,
    },
    ResolveSignalExternalWorkflow {
        seq: u32,
        failure: Option<Failure>,
    },
    ResolveRequestCancelExternalWorkflow {
        seq: u32,
        failure: Option<Failure>,
    },
    ResolveNexusOperationStart {
        seq: u32,
    },
    ResolveNexusOperation {
        seq: u32,
    },
    SignalWorkflow {
        signal_name: String,
        input: Vec<Payload>,
        headers: Headers,
    },
    QueryWorkflow {
        query_id: String,
        query_type: String,
        arguments: Vec<Payload>,
        headers: Headers,
    },
    CancelWorkflow {
        reason: String,
    },
    DoUpdate {
        id: String,
        name: String,
        input: Vec<Payload>,
        headers: Headers,
        run_validator: bool,
    },
    UpdateRandomSeed {
        randomness_seed: u64,
    },
    NotifyHasPatch {
        patch_id: String,
    },
    RemoveFromCache {
        reason: String,
    },
}

/// `(runId, timestamp, isReplaying, historyLength, historySizeBytes, jobs)`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowActivation {
    pub run_id: String,
    pub timestamp: Timestamp,
    pub is_replaying: bool,
    pub history_length: u32,
    pub history_size_bytes: u64,
    pub jobs: Vec<WorkflowActivationJob>,
}

impl WorkflowActivation {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// A query delivered alongside (but processed independently of) the normal
/// job list, used by the legacy query RPC path.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyQuery {
    pub query_id: String,
    pub query_type: String,
    pub arguments: Vec<Payload>,
    pub headers: HashMap<String, Payload>,
}
