//! Worker-specific client needs: wraps a [`client::WorkflowServiceClient`]
//! (normally behind a [`client::RetryClient`]) with the bookkeeping a worker
//! needs that a bare RPC surface doesn't give it — namely, remembering which
//! task token a run's next completion must be addressed to, since the
//! bridge-facing [`core_api::Worker`] trait correlates activations by
//! `run_id` alone.

use async_trait::async_trait;
use client::raw::{PolledWorkflowTask, WorkflowServiceClient, WorkflowTaskCompletion as RawWorkflowTaskCompletion};
use core_api::errors::{CompleteActivityError, CompleteWfError, PollActivityError, PollWfError};
use dashmap::DashMap;
use sdk_core_protos::activity::{ActivityTask, ActivityTaskCompletion};
use sdk_core_protos::completion::{WorkflowActivationCompletion, WorkflowActivationCompletionStatus};
use sdk_core_protos::{TaskToken, WorkflowActivation};

type Result<T, E> = std::result::Result<T, E>;

/// Contains everything a worker needs to interact with the server, for one
/// task queue.
pub(crate) struct WorkerClientBag<C> {
    raw: C,
    task_queue: String,
    sticky_queue_name: Option<String>,
    /// `runId -> taskToken` for the outstanding workflow task of that run.
    /// Populated on poll, consumed (removed) on completion.
    outstanding_wf_tokens: DashMap<String, TaskToken>,
}

impl<C: WorkflowServiceClient> WorkerClientBag<C> {
    pub fn new(raw: C, task_queue: String, sticky_queue_name: Option<String>) -> Self {
        Self { raw, task_queue, sticky_queue_name, outstanding_wf_tokens: DashMap::new() }
    }
}

/// This trait contains everything workers need to interact with Temporal; a
/// minimal mocking surface for [`crate::worker::activity_task_pump`] and
/// [`crate::workflow::instance`] tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait WorkerClient: Sync + Send {
    async fn poll_workflow_activation(&self) -> Result<WorkflowActivation, PollWfError>;
    async fn poll_activity_task(&self) -> Result<ActivityTask, PollActivityError>;
    async fn complete_workflow_activation(&self, completion: WorkflowActivationCompletion) -> Result<(), CompleteWfError>;
    async fn complete_activity_task(&self, completion: ActivityTaskCompletion) -> Result<(), CompleteActivityError>;
    async fn record_activity_heartbeat(&self, task_token: TaskToken, details: Vec<sdk_core_protos::Payload>) -> Result<bool, tonic::Status>;
}

#[async_trait]
impl<C: WorkflowServiceClient> WorkerClient for WorkerClientBag<C> {
    async fn poll_workflow_activation(&self) -> Result<WorkflowActivation, PollWfError> {
        let sticky = self.sticky_queue_name.is_some();
        let PolledWorkflowTask { task_token, activation, .. } =
            self.raw.poll_workflow_task_queue(self.task_queue.clone(), sticky).await?;
        self.outstanding_wf_tokens.insert(activation.run_id.clone(), task_token);
        Ok(activation)
    }

    async fn poll_activity_task(&self) -> Result<ActivityTask, PollActivityError> {
        Ok(self.raw.poll_activity_task_queue(self.task_queue.clone(), None).await?)
    }

    async fn complete_workflow_activation(&self, completion: WorkflowActivationCompletion) -> Result<(), CompleteWfError> {
        let (_, task_token) = self
            .outstanding_wf_tokens
            .remove(&completion.run_id)
            .ok_or_else(|| CompleteWfError::NoSuchRun { run_id: completion.run_id.clone() })?;
        match completion.status {
            WorkflowActivationCompletionStatus::Success { commands } => {
                self.raw
                    .respond_workflow_task_completed(RawWorkflowTaskCompletion {
                        task_token,
                        commands,
                        sticky_queue: self.sticky_queue_name.clone(),
                        return_new_workflow_task: false,
                        force_create_new_workflow_task: false,
                    })
                    .await?;
            }
            WorkflowActivationCompletionStatus::Failure { failure } => {
                self.raw.respond_workflow_task_failed(task_token, failure).await?;
            }
        }
        Ok(())
    }

    async fn complete_activity_task(&self, completion: ActivityTaskCompletion) -> Result<(), CompleteActivityError> {
        self.raw.respond_activity_task_completed(completion.task_token, completion.result).await?;
        Ok(())
    }

    async fn record_activity_heartbeat(&self, task_token: TaskToken, details: Vec<sdk_core_protos::Payload>) -> Result<bool, tonic::Status> {
        self.raw.record_activity_task_heartbeat(task_token, details).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client::raw::MockWorkflowServiceClient;
    use sdk_core_protos::activation::WorkflowActivationJob;
    use sdk_core_protos::commands::WorkflowCommand;
    use std::time::SystemTime;

    fn activation(run_id: &str) -> WorkflowActivation {
        WorkflowActivation {
            run_id: run_id.to_string(),
            timestamp: SystemTime::now(),
            is_replaying: false,
            history_length: 1,
            history_size_bytes: 0,
            jobs: vec![WorkflowActivationJob::FireTimer { seq: 1 }],
        }
    }

    #[tokio::test]
    async fn completion_is_routed_to_the_task_token_from_the_matching_poll() {
        let mut mock = MockWorkflowServiceClient::new();
        mock.expect_poll_workflow_task_queue().returning(|_, _| {
            Ok(PolledWorkflowTask { task_token: TaskToken(b"tok-1".to_vec()), activation: activation("run-1"), legacy_query: None })
        });
        mock.expect_respond_workflow_task_completed().withf(|c| c.task_token == TaskToken(b"tok-1".to_vec())).returning(|_| Ok(()));

        let bag = WorkerClientBag::new(mock, "tq".to_string(), None);
        let act = bag.poll_workflow_activation().await.unwrap();
        bag.complete_workflow_activation(WorkflowActivationCompletion::ok(act.run_id, vec![WorkflowCommand::CompleteWorkflow { result: None }]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn completing_an_unknown_run_is_an_error() {
        let mock = MockWorkflowServiceClient::new();
        let bag = WorkerClientBag::new(mock, "tq".to_string(), None);
        let err = bag
            .complete_workflow_activation(WorkflowActivationCompletion::ok("ghost-run", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, CompleteWfError::NoSuchRun { .. }));
    }
}
