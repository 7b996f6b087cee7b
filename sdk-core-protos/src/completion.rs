use crate::commands::WorkflowCommand;
use crate::failure::Failure;

/// `(runId, status)` — output of the workflow worker for one activation.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowActivationCompletion {
    pub run_id: String,
    pub status: WorkflowActivationCompletionStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowActivationCompletionStatus {
    Success { commands: Vec<WorkflowCommand> },
    Failure { failure: Failure },
}

impl WorkflowActivationCompletion {
    pub fn ok(run_id: impl Into<String>, commands: Vec<WorkflowCommand>) -> Self {
        Self {
            run_id: run_id.into(),
            status: WorkflowActivationCompletionStatus::Success { commands },
        }
    }

    pub fn failed(run_id: impl Into<String>, failure: Failure) -> Self {
        Self {
            run_id: run_id.into(),
            status: WorkflowActivationCompletionStatus::Failure { failure },
        }
    }
}
