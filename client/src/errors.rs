use sdk_core_protos::failure::Failure;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Status(#[from] tonic::Status),
    #[error("workflow execution already started: {workflow_id}")]
    WorkflowAlreadyStarted { workflow_id: String },
    #[error("query was rejected: {0:?}")]
    QueryRejected(Failure),
    #[error("update was rejected: {0:?}")]
    UpdateRejected(Failure),
    #[error("async activity was cancelled by the server")]
    AsyncActivityCancelled,
    #[error("schedule update mutator cancelled the update")]
    ScheduleUpdateCancelled,
}
