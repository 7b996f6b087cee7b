use sdk_core_protos::TaskToken;
use thiserror::Error;

/// Errors surfaced from polling the workflow-activation stream.
#[derive(Error, Debug)]
pub enum PollWfError {
    #[error("worker is shutting down")]
    ShutDown,
    #[error("tonic transport error polling workflow task: {0}")]
    TonicError(#[from] tonic::Status),
    #[error("workflow is no longer cached and a cache miss could not be resolved: {0}")]
    CacheMiss(String),
}

/// Errors surfaced from polling the activity-task stream.
#[derive(Error, Debug)]
pub enum PollActivityError {
    #[error("worker is shutting down")]
    ShutDown,
    #[error("tonic transport error polling activity task: {0}")]
    TonicError(#[from] tonic::Status),
}

#[derive(Error, Debug)]
pub enum CompleteWfError {
    #[error("no such workflow run is cached: {run_id}")]
    NoSuchRun { run_id: String },
    #[error("tonic transport error completing workflow task: {0}")]
    TonicError(#[from] tonic::Status),
    #[error("malformed completion: {0}")]
    MalformedCompletion(String),
}

#[derive(Error, Debug)]
pub enum CompleteActivityError {
    #[error("no such activity task token is outstanding: {0}")]
    NotFound(TaskToken),
    #[error("tonic transport error completing activity task: {0}")]
    TonicError(#[from] tonic::Status),
}

/// A worker-wide fatal condition; once observed, the worker should be torn
/// down rather than continuing to poll.
#[derive(Error, Debug)]
pub enum WorkerFatalError {
    #[error("worker client lost: {0}")]
    ClientLost(String),
    #[error("programmer error: {0}")]
    ProgrammerError(String),
}

/// Classifies a workflow-error-type for the `workflow_failure_errors`
/// configuration knob — which error kinds the worker should turn into a
/// *failed workflow* instead of an endlessly-retried workflow task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowErrorType {
    Nondeterminism,
    InternalFailure,
}
