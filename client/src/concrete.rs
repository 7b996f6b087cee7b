//! The terminal, gRPC-backed implementation of [`WorkflowClientTrait`]:
//! translates typed inputs into raw RPCs against any `C: WorkflowServiceClient`
//! (normally a [`crate::retry::RetryClient`]).

use crate::errors::ClientError;
use crate::raw::{
    ActivityExecutionId, DescribeWorkflowResponse, StartWorkflowRequest, WorkflowResultOutcome, WorkflowServiceClient,
};
use crate::workflow_client::{
    AsyncActivityId, CancelWorkflowInput, DescribeWorkflowInput, QueryWorkflowInput, SignalWorkflowInput,
    StartWorkflowInput, TerminateWorkflowInput, UpdateWorkflowInput, WorkflowClientTrait,
};
use async_trait::async_trait;
use sdk_core_protos::failure::Failure;
use sdk_core_protos::identifiers::{RunId, WorkflowExecution};
use sdk_core_protos::payload::Payload;
use sdk_core_protos::schedule::{ConflictToken, Schedule, ScheduleBackfill, ScheduleDescription, ScheduleListEntry};
use uuid::Uuid;

pub struct WorkflowClient<C> {
    raw: C,
    namespace: String,
}

impl<C: WorkflowServiceClient> WorkflowClient<C> {
    pub fn new(raw: C, namespace: impl Into<String>) -> Self {
        Self { raw, namespace: namespace.into() }
    }

    fn execution_in_namespace(&self, execution: WorkflowExecution) -> WorkflowExecution {
        WorkflowExecution { namespace: self.namespace.clone(), ..execution }
    }
}

#[async_trait]
impl<C: WorkflowServiceClient> WorkflowClientTrait for WorkflowClient<C> {
    async fn start_workflow(&self, input: StartWorkflowInput) -> Result<RunId, ClientError> {
        let req = StartWorkflowRequest {
            workflow_id: input.options.id,
            workflow_type: input.workflow_type,
            task_queue: input.options.task_queue,
            input: input.input,
            request_id: input.options.request_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            execution_timeout: input.options.execution_timeout,
            run_timeout: input.options.run_timeout,
            task_timeout: input.options.task_timeout,
            retry_policy: input.options.retry_policy,
            cron_schedule: input.options.cron_schedule,
            memo: input.options.memo,
            search_attributes: input.options.search_attributes,
            headers: input.headers,
            start_delay: input.options.start_delay,
            signal_with_start: input.options.signal_with_start,
        };
        Ok(self.raw.start_workflow_execution(req).await?.run_id)
    }

    async fn signal_workflow(&self, input: SignalWorkflowInput) -> Result<(), ClientError> {
        let execution = self.execution_in_namespace(input.execution);
        self.raw
            .signal_workflow_execution(execution, input.signal_name, input.input, Uuid::new_v4().to_string())
            .await?;
        Ok(())
    }

    async fn query_workflow(&self, input: QueryWorkflowInput) -> Result<Option<Payload>, ClientError> {
        let execution = self.execution_in_namespace(input.execution);
        match self.raw.query_workflow(execution, input.query_type, input.input, input.reject_condition).await? {
            Ok(payload) => Ok(payload),
            Err(failure) => Err(ClientError::QueryRejected(failure)),
        }
    }

    async fn start_update(&self, input: UpdateWorkflowInput) -> Result<Option<Payload>, ClientError> {
        let execution = self.execution_in_namespace(input.execution);
        match self
            .raw
            .update_workflow_execution(execution, input.name, input.input, Uuid::new_v4().to_string())
            .await?
        {
            Ok(payload) => Ok(payload),
            Err(failure) => Err(ClientError::UpdateRejected(failure)),
        }
    }

    async fn cancel_workflow(&self, input: CancelWorkflowInput) -> Result<(), ClientError> {
        let execution = self.execution_in_namespace(input.execution);
        self.raw.request_cancel_workflow_execution(execution, Uuid::new_v4().to_string()).await?;
        Ok(())
    }

    async fn terminate_workflow(&self, input: TerminateWorkflowInput) -> Result<(), ClientError> {
        let execution = self.execution_in_namespace(input.execution);
        self.raw.terminate_workflow_execution(execution, input.reason, input.details).await?;
        Ok(())
    }

    async fn describe_workflow(&self, input: DescribeWorkflowInput) -> Result<DescribeWorkflowResponse, ClientError> {
        let execution = self.execution_in_namespace(input.execution);
        Ok(self.raw.describe_workflow_execution(execution).await?)
    }

    async fn fetch_result(&self, execution: WorkflowExecution, follow_continue_as_new: bool) -> Result<WorkflowResultOutcome, ClientError> {
        let mut execution = self.execution_in_namespace(execution);
        loop {
            let outcome = loop {
                if let Some(outcome) = self.raw.fetch_terminal_outcome(execution.clone()).await? {
                    break outcome;
                }
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            };
            match outcome {
                WorkflowResultOutcome::ContinuedAsNew { new_run_id } if follow_continue_as_new => {
                    execution = WorkflowExecution { run_id: new_run_id.0, ..execution };
                }
                other => return Ok(other),
            }
        }
    }

    async fn heartbeat_async_activity(&self, id: AsyncActivityId, details: Vec<Payload>) -> Result<(), ClientError> {
        let still_wanted = match id {
            AsyncActivityId::TaskToken(token) => self.raw.record_activity_task_heartbeat(token, details).await?,
            AsyncActivityId::Execution { workflow_id, run_id, activity_id } => {
                self.raw
                    .record_activity_task_heartbeat_by_id(ActivityExecutionId { workflow_id, run_id, activity_id }, details)
                    .await?
            }
        };
        if !still_wanted {
            return Err(ClientError::AsyncActivityCancelled);
        }
        Ok(())
    }

    async fn complete_async_activity(&self, id: AsyncActivityId, result: Option<Payload>) -> Result<(), ClientError> {
        let outcome = sdk_core_protos::activity::ActivityExecutionResult::Completed(result);
        match id {
            AsyncActivityId::TaskToken(token) => self.raw.respond_activity_task_completed(token, outcome).await?,
            AsyncActivityId::Execution { workflow_id, run_id, activity_id } => {
                self.raw.respond_activity_task_completed_by_id(ActivityExecutionId { workflow_id, run_id, activity_id }, outcome).await?
            }
        };
        Ok(())
    }

    async fn fail_async_activity(&self, id: AsyncActivityId, failure: Failure) -> Result<(), ClientError> {
        let outcome = sdk_core_protos::activity::ActivityExecutionResult::Failed(failure);
        match id {
            AsyncActivityId::TaskToken(token) => self.raw.respond_activity_task_completed(token, outcome).await?,
            AsyncActivityId::Execution { workflow_id, run_id, activity_id } => {
                self.raw.respond_activity_task_completed_by_id(ActivityExecutionId { workflow_id, run_id, activity_id }, outcome).await?
            }
        };
        Ok(())
    }

    async fn report_cancellation_async_activity(&self, id: AsyncActivityId, details: Vec<Payload>) -> Result<(), ClientError> {
        let outcome = sdk_core_protos::activity::ActivityExecutionResult::Cancelled(Failure::cancelled("activity reported its own cancellation"));
        match id {
            AsyncActivityId::TaskToken(token) => self.raw.respond_activity_task_completed(token, outcome).await?,
            AsyncActivityId::Execution { workflow_id, run_id, activity_id } => {
                self.raw.respond_activity_task_completed_by_id(ActivityExecutionId { workflow_id, run_id, activity_id }, outcome).await?
            }
        };
        let _ = details;
        Ok(())
    }

    async fn create_schedule(&self, schedule_id: String, schedule: Schedule, trigger_immediately: bool, backfills: Vec<ScheduleBackfill>) -> Result<(), ClientError> {
        Ok(self.raw.create_schedule(schedule_id, schedule, trigger_immediately, backfills).await?)
    }

    async fn describe_schedule(&self, schedule_id: String) -> Result<ScheduleDescription, ClientError> {
        Ok(self.raw.describe_schedule(schedule_id).await?)
    }

    async fn list_schedules(&self, page_token: Vec<u8>) -> Result<(Vec<ScheduleListEntry>, Vec<u8>), ClientError> {
        Ok(self.raw.list_schedules(page_token).await?)
    }

    async fn trigger_schedule(&self, schedule_id: String) -> Result<(), ClientError> {
        Ok(self.raw.patch_schedule_trigger(schedule_id).await?)
    }

    async fn pause_schedule(&self, schedule_id: String, note: Option<String>) -> Result<(), ClientError> {
        Ok(self.raw.patch_schedule_pause(schedule_id, note, true).await?)
    }

    async fn unpause_schedule(&self, schedule_id: String, note: Option<String>) -> Result<(), ClientError> {
        Ok(self.raw.patch_schedule_pause(schedule_id, note, false).await?)
    }

    async fn backfill_schedule(&self, schedule_id: String, backfills: Vec<ScheduleBackfill>) -> Result<(), ClientError> {
        Ok(self.raw.patch_schedule_backfill(schedule_id, backfills).await?)
    }

    async fn apply_schedule_update(&self, schedule_id: String, schedule: Schedule, conflict_token: ConflictToken) -> Result<(), ClientError> {
        Ok(self.raw.update_schedule(schedule_id, schedule, conflict_token).await?)
    }

    async fn delete_schedule(&self, schedule_id: String) -> Result<(), ClientError> {
        Ok(self.raw.delete_schedule(schedule_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::MockWorkflowServiceClient;
    use sdk_core_protos::identifiers::TaskToken;

    #[tokio::test]
    async fn heartbeat_by_task_token_calls_the_by_token_rpc() {
        let mut mock = MockWorkflowServiceClient::new();
        mock.expect_record_activity_task_heartbeat()
            .withf(|token, _| token == &TaskToken(vec![1, 2, 3]))
            .returning(|_, _| Ok(true));
        let client = WorkflowClient::new(mock, "default");
        client
            .heartbeat_async_activity(AsyncActivityId::TaskToken(TaskToken(vec![1, 2, 3])), vec![])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn heartbeat_by_execution_calls_the_by_id_rpc_instead_of_an_empty_token() {
        let mut mock = MockWorkflowServiceClient::new();
        mock.expect_record_activity_task_heartbeat().times(0);
        mock.expect_record_activity_task_heartbeat_by_id()
            .withf(|id, _| id.workflow_id == "wf-1" && id.activity_id == "act-1")
            .returning(|_, _| Ok(true));
        let client = WorkflowClient::new(mock, "default");
        client
            .heartbeat_async_activity(
                AsyncActivityId::Execution { workflow_id: "wf-1".to_string(), run_id: None, activity_id: "act-1".to_string() },
                vec![],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn complete_by_execution_calls_the_by_id_rpc() {
        let mut mock = MockWorkflowServiceClient::new();
        mock.expect_respond_activity_task_completed().times(0);
        mock.expect_respond_activity_task_completed_by_id()
            .withf(|id, result| {
                id.workflow_id == "wf-1" && matches!(result, sdk_core_protos::activity::ActivityExecutionResult::Completed(None))
            })
            .returning(|_, _| Ok(()));
        let client = WorkflowClient::new(mock, "default");
        client
            .complete_async_activity(
                AsyncActivityId::Execution { workflow_id: "wf-1".to_string(), run_id: None, activity_id: "act-1".to_string() },
                None,
            )
            .await
            .unwrap();
    }
}
