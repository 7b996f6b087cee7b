//! Component G's retry wrapper: classifies transient `tonic::Status` codes
//! and retries with backoff, and caches the server's `GetSystemInfo`
//! capabilities the way the grounding `WorkerClientBag` does
//! (`binary_checksum`/`worker_version_capabilities`/`worker_version_stamp`).

use crate::raw::{Result, ServerCapabilities, WorkflowServiceClient};
use parking_lot::RwLock;
use sdk_core_protos::retry::RetryPolicy;
use std::time::Duration;
use tonic::Code;

/// Which gRPC status codes are worth retrying. Mirrors the classification a
/// real server client applies: overload and transient unavailability are
/// retried, anything that indicates a bad request or a settled outcome is
/// not.
fn is_retryable(status: &tonic::Status) -> bool {
    matches!(
        status.code(),
        Code::Unavailable | Code::ResourceExhausted | Code::Aborted | Code::DeadlineExceeded
    )
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub policy: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            policy: RetryPolicy {
                initial_interval: Some(Duration::from_millis(200)),
                backoff_coefficient: 2.0,
                maximum_interval: Some(Duration::from_secs(10)),
                maximum_attempts: 10,
                non_retryable_error_types: Vec::new(),
            },
        }
    }
}

/// Wraps any [`WorkflowServiceClient`] with retry-on-transient-failure and a
/// cached server-capability set. Generic over the inner client so tests can
/// plug a mock in directly (`RetryClient<MockWorkflowServiceClient>`).
pub struct RetryClient<C> {
    inner: C,
    config: RetryConfig,
    capabilities: RwLock<Option<ServerCapabilities>>,
}

impl<C: WorkflowServiceClient> RetryClient<C> {
    pub fn new(inner: C, config: RetryConfig) -> Self {
        Self { inner, config, capabilities: RwLock::new(None) }
    }

    pub fn get_client(&self) -> &C {
        &self.inner
    }

    /// Runs `op`, retrying transient failures per `self.config`. `op` is
    /// invoked once per attempt; attempt numbers are 1-indexed to match
    /// [`RetryPolicy::backoff_for_attempt`].
    async fn with_retry<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(status) if is_retryable(&status) => {
                    match self.config.policy.backoff_for_attempt(attempt) {
                        Some(delay) => {
                            tracing::debug!(attempt, code = ?status.code(), "retrying workflow service call");
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        None => return Err(status),
                    }
                }
                Err(status) => return Err(status),
            }
        }
    }

    /// Returns the cached capability set, fetching it via `GetSystemInfo` on
    /// first use. Subsequent calls never re-hit the network.
    pub async fn capabilities(&self) -> Result<ServerCapabilities> {
        if let Some(caps) = self.capabilities.read().clone() {
            return Ok(caps);
        }
        let caps = self.with_retry(|| self.inner.get_system_info()).await?;
        *self.capabilities.write() = Some(caps.clone());
        Ok(caps)
    }
}

macro_rules! retrying {
    ($self:ident, $call:expr) => {
        $self.with_retry(|| $call).await
    };
}

#[async_trait::async_trait]
impl<C: WorkflowServiceClient> WorkflowServiceClient for RetryClient<C> {
    async fn poll_workflow_task_queue(&self, task_queue: String, sticky: bool) -> Result<crate::raw::PolledWorkflowTask> {
        // Polls are long-lived server calls; retrying them would mask a slow
        // but otherwise healthy poller, so they pass through untouched.
        self.inner.poll_workflow_task_queue(task_queue, sticky).await
    }
    async fn poll_activity_task_queue(&self, task_queue: String, max_tasks_per_sec: Option<f64>) -> Result<sdk_core_protos::activity::ActivityTask> {
        self.inner.poll_activity_task_queue(task_queue, max_tasks_per_sec).await
    }
    async fn respond_workflow_task_completed(&self, completion: crate::raw::WorkflowTaskCompletion) -> Result<()> {
        retrying!(self, self.inner.respond_workflow_task_completed(completion.clone()))
    }
    async fn respond_workflow_task_failed(&self, task_token: sdk_core_protos::TaskToken, failure: sdk_core_protos::Failure) -> Result<()> {
        retrying!(self, self.inner.respond_workflow_task_failed(task_token.clone(), failure.clone()))
    }
    async fn respond_activity_task_completed(&self, task_token: sdk_core_protos::TaskToken, result: sdk_core_protos::ActivityExecutionResult) -> Result<()> {
        retrying!(self, self.inner.respond_activity_task_completed(task_token.clone(), result.clone()))
    }
    async fn record_activity_task_heartbeat(&self, task_token: sdk_core_protos::TaskToken, details: Vec<sdk_core_protos::Payload>) -> Result<bool> {
        retrying!(self, self.inner.record_activity_task_heartbeat(task_token.clone(), details.clone()))
    }
    async fn record_activity_task_heartbeat_by_id(&self, id: crate::raw::ActivityExecutionId, details: Vec<sdk_core_protos::Payload>) -> Result<bool> {
        retrying!(self, self.inner.record_activity_task_heartbeat_by_id(id.clone(), details.clone()))
    }
    async fn respond_activity_task_completed_by_id(&self, id: crate::raw::ActivityExecutionId, result: sdk_core_protos::ActivityExecutionResult) -> Result<()> {
        retrying!(self, self.inner.respond_activity_task_completed_by_id(id.clone(), result.clone()))
    }
    async fn respond_query_task_completed(&self, task_token: sdk_core_protos::TaskToken, result: Result<Option<sdk_core_protos::Payload>, sdk_core_protos::Failure>) -> Result<()> {
        retrying!(self, self.inner.respond_query_task_completed(task_token.clone(), result.clone()))
    }
    async fn get_workflow_execution_history(&self, execution: sdk_core_protos::WorkflowExecution, page_token: Vec<u8>) -> Result<(Vec<u8>, Vec<u8>)> {
        retrying!(self, self.inner.get_workflow_execution_history(execution.clone(), page_token.clone()))
    }
    async fn get_system_info(&self) -> Result<ServerCapabilities> {
        retrying!(self, self.inner.get_system_info())
    }
    async fn start_workflow_execution(&self, req: crate::raw::StartWorkflowRequest) -> Result<crate::raw::StartWorkflowResponse> {
        retrying!(self, self.inner.start_workflow_execution(req.clone()))
    }
    async fn signal_workflow_execution(&self, execution: sdk_core_protos::WorkflowExecution, signal_name: String, input: Vec<sdk_core_protos::Payload>, request_id: String) -> Result<()> {
        retrying!(self, self.inner.signal_workflow_execution(execution.clone(), signal_name.clone(), input.clone(), request_id.clone()))
    }
    async fn query_workflow(&self, execution: sdk_core_protos::WorkflowExecution, query_type: String, input: Vec<sdk_core_protos::Payload>, reject_condition: crate::raw::QueryRejectCondition) -> Result<Result<Option<sdk_core_protos::Payload>, sdk_core_protos::Failure>> {
        retrying!(self, self.inner.query_workflow(execution.clone(), query_type.clone(), input.clone(), reject_condition))
    }
    async fn update_workflow_execution(&self, execution: sdk_core_protos::WorkflowExecution, name: String, input: Vec<sdk_core_protos::Payload>, request_id: String) -> Result<Result<Option<sdk_core_protos::Payload>, sdk_core_protos::Failure>> {
        retrying!(self, self.inner.update_workflow_execution(execution.clone(), name.clone(), input.clone(), request_id.clone()))
    }
    async fn request_cancel_workflow_execution(&self, execution: sdk_core_protos::WorkflowExecution, request_id: String) -> Result<()> {
        retrying!(self, self.inner.request_cancel_workflow_execution(execution.clone(), request_id.clone()))
    }
    async fn terminate_workflow_execution(&self, execution: sdk_core_protos::WorkflowExecution, reason: Option<String>, details: Vec<sdk_core_protos::Payload>) -> Result<()> {
        retrying!(self, self.inner.terminate_workflow_execution(execution.clone(), reason.clone(), details.clone()))
    }
    async fn describe_workflow_execution(&self, execution: sdk_core_protos::WorkflowExecution) -> Result<crate::raw::DescribeWorkflowResponse> {
        retrying!(self, self.inner.describe_workflow_execution(execution.clone()))
    }
    async fn fetch_terminal_outcome(&self, execution: sdk_core_protos::WorkflowExecution) -> Result<Option<crate::raw::WorkflowResultOutcome>> {
        retrying!(self, self.inner.fetch_terminal_outcome(execution.clone()))
    }
    async fn create_schedule(&self, schedule_id: String, schedule: sdk_core_protos::schedule::Schedule, trigger_immediately: bool, backfills: Vec<sdk_core_protos::schedule::ScheduleBackfill>) -> Result<()> {
        retrying!(self, self.inner.create_schedule(schedule_id.clone(), schedule.clone(), trigger_immediately, backfills.clone()))
    }
    async fn describe_schedule(&self, schedule_id: String) -> Result<sdk_core_protos::schedule::ScheduleDescription> {
        retrying!(self, self.inner.describe_schedule(schedule_id.clone()))
    }
    async fn list_schedules(&self, page_token: Vec<u8>) -> Result<(Vec<sdk_core_protos::schedule::ScheduleListEntry>, Vec<u8>)> {
        retrying!(self, self.inner.list_schedules(page_token.clone()))
    }
    async fn patch_schedule_trigger(&self, schedule_id: String) -> Result<()> {
        retrying!(self, self.inner.patch_schedule_trigger(schedule_id.clone()))
    }
    async fn patch_schedule_pause(&self, schedule_id: String, note: Option<String>, pause: bool) -> Result<()> {
        retrying!(self, self.inner.patch_schedule_pause(schedule_id.clone(), note.clone(), pause))
    }
    async fn patch_schedule_backfill(&self, schedule_id: String, backfills: Vec<sdk_core_protos::schedule::ScheduleBackfill>) -> Result<()> {
        retrying!(self, self.inner.patch_schedule_backfill(schedule_id.clone(), backfills.clone()))
    }
    async fn update_schedule(&self, schedule_id: String, schedule: sdk_core_protos::schedule::Schedule, conflict_token: sdk_core_protos::schedule::ConflictToken) -> Result<()> {
        retrying!(self, self.inner.update_schedule(schedule_id.clone(), schedule.clone(), conflict_token.clone()))
    }
    async fn delete_schedule(&self, schedule_id: String) -> Result<()> {
        retrying!(self, self.inner.delete_schedule(schedule_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::MockWorkflowServiceClient;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn unavailable_is_retried_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut mock = MockWorkflowServiceClient::new();
        let calls2 = calls.clone();
        mock.expect_get_system_info().returning(move || {
            let n = calls2.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(tonic::Status::unavailable("retry me"))
            } else {
                Ok(ServerCapabilities::default())
            }
        });
        let client = RetryClient::new(
            mock,
            RetryConfig { policy: RetryPolicy { initial_interval: Some(Duration::from_millis(1)), ..RetryConfig::default().policy } },
        );
        let caps = client.capabilities().await.unwrap();
        assert_eq!(caps, ServerCapabilities::default());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let mut mock = MockWorkflowServiceClient::new();
        mock.expect_get_system_info().times(1).returning(|| Err(tonic::Status::not_found("gone")));
        let client = RetryClient::new(mock, RetryConfig::default());
        let err = client.capabilities().await.unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }
}
