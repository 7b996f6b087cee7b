use crate::errors::ClientError;
use crate::workflow_client::{AsyncActivityId, WorkflowClientTrait};
use sdk_core_protos::failure::Failure;
use sdk_core_protos::payload::Payload;
use std::sync::Arc;

/// A handle to an activity completing out-of-band, addressed either by
/// execution coordinates or by an opaque task token (§4.G).
pub struct AsyncActivityHandle {
    client: Arc<dyn WorkflowClientTrait>,
    id: AsyncActivityId,
}

impl AsyncActivityHandle {
    pub fn from_execution(client: Arc<dyn WorkflowClientTrait>, workflow_id: String, run_id: Option<String>, activity_id: String) -> Self {
        Self { client, id: AsyncActivityId::Execution { workflow_id, run_id, activity_id } }
    }

    pub fn from_task_token(client: Arc<dyn WorkflowClientTrait>, token: sdk_core_protos::TaskToken) -> Self {
        Self { client, id: AsyncActivityId::TaskToken(token) }
    }

    /// Reports liveness and progress. Returns
    /// [`ClientError::AsyncActivityCancelled`] if the server has requested
    /// cancellation since the last heartbeat.
    pub async fn heartbeat(&self, details: Vec<Payload>) -> Result<(), ClientError> {
        self.client.heartbeat_async_activity(self.id.clone(), details).await
    }

    pub async fn complete(&self, result: Option<Payload>) -> Result<(), ClientError> {
        self.client.complete_async_activity(self.id.clone(), result).await
    }

    pub async fn fail(&self, failure: Failure) -> Result<(), ClientError> {
        self.client.fail_async_activity(self.id.clone(), failure).await
    }

    pub async fn report_cancellation(&self, details: Vec<Payload>) -> Result<(), ClientError> {
        self.client.report_cancellation_async_activity(self.id.clone(), details).await
    }
}
