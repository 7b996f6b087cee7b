//! The interceptor chain (§4.G): every outbound operation passes through an
//! ordered list of interceptors before reaching the terminal gRPC-speaking
//! implementation. Built as nested function-composition — each link wraps
//! the next `Arc<dyn WorkflowClientTrait>` and is itself one, so
//! `build_chain` folds a `Vec` of interceptors around a terminal client.

use crate::errors::ClientError;
use crate::raw::DescribeWorkflowResponse;
use crate::workflow_client::{
    AsyncActivityId, CancelWorkflowInput, DescribeWorkflowInput, QueryWorkflowInput, SignalWorkflowInput,
    StartWorkflowInput, TerminateWorkflowInput, UpdateWorkflowInput, WorkflowClientTrait,
};
use async_trait::async_trait;
use sdk_core_protos::failure::Failure;
use sdk_core_protos::identifiers::{RunId, WorkflowExecution};
use sdk_core_protos::payload::Payload;
use sdk_core_protos::schedule::{ConflictToken, Schedule, ScheduleBackfill, ScheduleDescription, ScheduleListEntry};
use std::sync::Arc;

/// Each hook defaults to forwarding to `next` untouched; an interceptor
/// overrides only the hooks it cares about (§4.G: "implements a subset of
/// hooks").
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn start_workflow(&self, input: StartWorkflowInput, next: &dyn WorkflowClientTrait) -> Result<RunId, ClientError> {
        next.start_workflow(input).await
    }
    async fn signal_workflow(&self, input: SignalWorkflowInput, next: &dyn WorkflowClientTrait) -> Result<(), ClientError> {
        next.signal_workflow(input).await
    }
    async fn query_workflow(&self, input: QueryWorkflowInput, next: &dyn WorkflowClientTrait) -> Result<Option<Payload>, ClientError> {
        next.query_workflow(input).await
    }
    async fn start_update(&self, input: UpdateWorkflowInput, next: &dyn WorkflowClientTrait) -> Result<Option<Payload>, ClientError> {
        next.start_update(input).await
    }
    async fn cancel_workflow(&self, input: CancelWorkflowInput, next: &dyn WorkflowClientTrait) -> Result<(), ClientError> {
        next.cancel_workflow(input).await
    }
    async fn terminate_workflow(&self, input: TerminateWorkflowInput, next: &dyn WorkflowClientTrait) -> Result<(), ClientError> {
        next.terminate_workflow(input).await
    }
    async fn describe_workflow(&self, input: DescribeWorkflowInput, next: &dyn WorkflowClientTrait) -> Result<DescribeWorkflowResponse, ClientError> {
        next.describe_workflow(input).await
    }
    async fn heartbeat_async_activity(&self, id: AsyncActivityId, details: Vec<Payload>, next: &dyn WorkflowClientTrait) -> Result<(), ClientError> {
        next.heartbeat_async_activity(id, details).await
    }
    async fn complete_async_activity(&self, id: AsyncActivityId, result: Option<Payload>, next: &dyn WorkflowClientTrait) -> Result<(), ClientError> {
        next.complete_async_activity(id, result).await
    }
    async fn fail_async_activity(&self, id: AsyncActivityId, failure: Failure, next: &dyn WorkflowClientTrait) -> Result<(), ClientError> {
        next.fail_async_activity(id, failure).await
    }
    async fn report_cancellation_async_activity(&self, id: AsyncActivityId, details: Vec<Payload>, next: &dyn WorkflowClientTrait) -> Result<(), ClientError> {
        next.report_cancellation_async_activity(id, details).await
    }
    async fn create_schedule(&self, schedule_id: String, schedule: Schedule, trigger_immediately: bool, backfills: Vec<ScheduleBackfill>, next: &dyn WorkflowClientTrait) -> Result<(), ClientError> {
        next.create_schedule(schedule_id, schedule, trigger_immediately, backfills).await
    }
    async fn list_schedules(&self, page_token: Vec<u8>, next: &dyn WorkflowClientTrait) -> Result<(Vec<ScheduleListEntry>, Vec<u8>), ClientError> {
        next.list_schedules(page_token).await
    }
    async fn backfill_schedule(&self, schedule_id: String, backfills: Vec<ScheduleBackfill>, next: &dyn WorkflowClientTrait) -> Result<(), ClientError> {
        next.backfill_schedule(schedule_id, backfills).await
    }
    async fn delete_schedule(&self, schedule_id: String, next: &dyn WorkflowClientTrait) -> Result<(), ClientError> {
        next.delete_schedule(schedule_id).await
    }
    async fn describe_schedule(&self, schedule_id: String, next: &dyn WorkflowClientTrait) -> Result<ScheduleDescription, ClientError> {
        next.describe_schedule(schedule_id).await
    }
    async fn pause_schedule(&self, schedule_id: String, note: Option<String>, next: &dyn WorkflowClientTrait) -> Result<(), ClientError> {
        next.pause_schedule(schedule_id, note).await
    }
    async fn unpause_schedule(&self, schedule_id: String, note: Option<String>, next: &dyn WorkflowClientTrait) -> Result<(), ClientError> {
        next.unpause_schedule(schedule_id, note).await
    }
    async fn trigger_schedule(&self, schedule_id: String, next: &dyn WorkflowClientTrait) -> Result<(), ClientError> {
        next.trigger_schedule(schedule_id).await
    }
    async fn apply_schedule_update(&self, schedule_id: String, schedule: Schedule, conflict_token: ConflictToken, next: &dyn WorkflowClientTrait) -> Result<(), ClientError> {
        next.apply_schedule_update(schedule_id, schedule, conflict_token).await
    }
}

/// One link in the chain: an interceptor paired with everything after it.
struct ChainLink {
    interceptor: Arc<dyn Interceptor>,
    next: Arc<dyn WorkflowClientTrait>,
}

#[async_trait]
impl WorkflowClientTrait for ChainLink {
    async fn start_workflow(&self, input: StartWorkflowInput) -> Result<RunId, ClientError> {
        self.interceptor.start_workflow(input, self.next.as_ref()).await
    }
    async fn signal_workflow(&self, input: SignalWorkflowInput) -> Result<(), ClientError> {
        self.interceptor.signal_workflow(input, self.next.as_ref()).await
    }
    async fn query_workflow(&self, input: QueryWorkflowInput) -> Result<Option<Payload>, ClientError> {
        self.interceptor.query_workflow(input, self.next.as_ref()).await
    }
    async fn start_update(&self, input: UpdateWorkflowInput) -> Result<Option<Payload>, ClientError> {
        self.interceptor.start_update(input, self.next.as_ref()).await
    }
    async fn cancel_workflow(&self, input: CancelWorkflowInput) -> Result<(), ClientError> {
        self.interceptor.cancel_workflow(input, self.next.as_ref()).await
    }
    async fn terminate_workflow(&self, input: TerminateWorkflowInput) -> Result<(), ClientError> {
        self.interceptor.terminate_workflow(input, self.next.as_ref()).await
    }
    async fn describe_workflow(&self, input: DescribeWorkflowInput) -> Result<DescribeWorkflowResponse, ClientError> {
        self.interceptor.describe_workflow(input, self.next.as_ref()).await
    }
    async fn fetch_result(&self, execution: WorkflowExecution, follow_continue_as_new: bool) -> Result<crate::raw::WorkflowResultOutcome, ClientError> {
        // Not every deployment will want result-polling intercepted; pass
        // through directly rather than adding a hook nobody asked for.
        self.next.fetch_result(execution, follow_continue_as_new).await
    }
    async fn heartbeat_async_activity(&self, id: AsyncActivityId, details: Vec<Payload>) -> Result<(), ClientError> {
        self.interceptor.heartbeat_async_activity(id, details, self.next.as_ref()).await
    }
    async fn complete_async_activity(&self, id: AsyncActivityId, result: Option<Payload>) -> Result<(), ClientError> {
        self.interceptor.complete_async_activity(id, result, self.next.as_ref()).await
    }
    async fn fail_async_activity(&self, id: AsyncActivityId, failure: Failure) -> Result<(), ClientError> {
        self.interceptor.fail_async_activity(id, failure, self.next.as_ref()).await
    }
    async fn report_cancellation_async_activity(&self, id: AsyncActivityId, details: Vec<Payload>) -> Result<(), ClientError> {
        self.interceptor.report_cancellation_async_activity(id, details, self.next.as_ref()).await
    }
    async fn create_schedule(&self, schedule_id: String, schedule: Schedule, trigger_immediately: bool, backfills: Vec<ScheduleBackfill>) -> Result<(), ClientError> {
        self.interceptor.create_schedule(schedule_id, schedule, trigger_immediately, backfills, self.next.as_ref()).await
    }
    async fn describe_schedule(&self, schedule_id: String) -> Result<ScheduleDescription, ClientError> {
        self.interceptor.describe_schedule(schedule_id, self.next.as_ref()).await
    }
    async fn list_schedules(&self, page_token: Vec<u8>) -> Result<(Vec<ScheduleListEntry>, Vec<u8>), ClientError> {
        self.interceptor.list_schedules(page_token, self.next.as_ref()).await
    }
    async fn trigger_schedule(&self, schedule_id: String) -> Result<(), ClientError> {
        self.interceptor.trigger_schedule(schedule_id, self.next.as_ref()).await
    }
    async fn pause_schedule(&self, schedule_id: String, note: Option<String>) -> Result<(), ClientError> {
        self.interceptor.pause_schedule(schedule_id, note, self.next.as_ref()).await
    }
    async fn unpause_schedule(&self, schedule_id: String, note: Option<String>) -> Result<(), ClientError> {
        self.interceptor.unpause_schedule(schedule_id, note, self.next.as_ref()).await
    }
    async fn backfill_schedule(&self, schedule_id: String, backfills: Vec<ScheduleBackfill>) -> Result<(), ClientError> {
        self.interceptor.backfill_schedule(schedule_id, backfills, self.next.as_ref()).await
    }
    async fn apply_schedule_update(&self, schedule_id: String, schedule: Schedule, conflict_token: ConflictToken) -> Result<(), ClientError> {
        self.interceptor.apply_schedule_update(schedule_id, schedule, conflict_token, self.next.as_ref()).await
    }
    async fn delete_schedule(&self, schedule_id: String) -> Result<(), ClientError> {
        self.interceptor.delete_schedule(schedule_id, self.next.as_ref()).await
    }
}

/// Wraps `terminal` with `interceptors`, outermost first: `interceptors[0]`
/// sees every call before `interceptors[1]`, and so on down to `terminal`.
pub fn build_chain(interceptors: Vec<Arc<dyn Interceptor>>, terminal: Arc<dyn WorkflowClientTrait>) -> Arc<dyn WorkflowClientTrait> {
    interceptors
        .into_iter()
        .rev()
        .fold(terminal, |next, interceptor| Arc::new(ChainLink { interceptor, next }) as Arc<dyn WorkflowClientTrait>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow_client::{StartWorkflowOptions, WorkflowIdConflictPolicy, WorkflowIdReusePolicy};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct RecordingTerminal {
        seen_id: Mutex<Option<String>>,
    }

    #[async_trait]
    impl WorkflowClientTrait for RecordingTerminal {
        async fn start_workflow(&self, input: StartWorkflowInput) -> Result<RunId, ClientError> {
            *self.seen_id.lock() = Some(input.options.id);
            Ok(RunId("run-1".to_string()))
        }
        async fn signal_workflow(&self, _: SignalWorkflowInput) -> Result<(), ClientError> { Ok(()) }
        async fn query_workflow(&self, _: QueryWorkflowInput) -> Result<Option<Payload>, ClientError> { Ok(None) }
        async fn start_update(&self, _: UpdateWorkflowInput) -> Result<Option<Payload>, ClientError> { Ok(None) }
        async fn cancel_workflow(&self, _: CancelWorkflowInput) -> Result<(), ClientError> { Ok(()) }
        async fn terminate_workflow(&self, _: TerminateWorkflowInput) -> Result<(), ClientError> { Ok(()) }
        async fn describe_workflow(&self, _: DescribeWorkflowInput) -> Result<DescribeWorkflowResponse, ClientError> { unimplemented!() }
        async fn fetch_result(&self, _: WorkflowExecution, _: bool) -> Result<crate::raw::WorkflowResultOutcome, ClientError> { unimplemented!() }
        async fn heartbeat_async_activity(&self, _: AsyncActivityId, _: Vec<Payload>) -> Result<(), ClientError> { Ok(()) }
        async fn complete_async_activity(&self, _: AsyncActivityId, _: Option<Payload>) -> Result<(), ClientError> { Ok(()) }
        async fn fail_async_activity(&self, _: AsyncActivityId, _: Failure) -> Result<(), ClientError> { Ok(()) }
        async fn report_cancellation_async_activity(&self, _: AsyncActivityId, _: Vec<Payload>) -> Result<(), ClientError> { Ok(()) }
        async fn create_schedule(&self, _: String, _: Schedule, _: bool, _: Vec<ScheduleBackfill>) -> Result<(), ClientError> { Ok(()) }
        async fn describe_schedule(&self, _: String) -> Result<ScheduleDescription, ClientError> { unimplemented!() }
        async fn list_schedules(&self, _: Vec<u8>) -> Result<(Vec<ScheduleListEntry>, Vec<u8>), ClientError> { Ok((vec![], vec![])) }
        async fn trigger_schedule(&self, _: String) -> Result<(), ClientError> { Ok(()) }
        async fn pause_schedule(&self, _: String, _: Option<String>) -> Result<(), ClientError> { Ok(()) }
        async fn unpause_schedule(&self, _: String, _: Option<String>) -> Result<(), ClientError> { Ok(()) }
        async fn backfill_schedule(&self, _: String, _: Vec<ScheduleBackfill>) -> Result<(), ClientError> { Ok(()) }
        async fn apply_schedule_update(&self, _: String, _: Schedule, _: ConflictToken) -> Result<(), ClientError> { Ok(()) }
        async fn delete_schedule(&self, _: String) -> Result<(), ClientError> { Ok(()) }
    }

    struct PrefixingInterceptor;

    #[async_trait]
    impl Interceptor for PrefixingInterceptor {
        async fn start_workflow(&self, mut input: StartWorkflowInput, next: &dyn WorkflowClientTrait) -> Result<RunId, ClientError> {
            input.options.id = format!("prefixed-{}", input.options.id);
            next.start_workflow(input).await
        }
    }

    fn opts(id: &str) -> StartWorkflowOptions {
        StartWorkflowOptions {
            id: id.to_string(),
            task_queue: "tq".to_string(),
            execution_timeout: None,
            run_timeout: None,
            task_timeout: None,
            retry_policy: None,
            id_reuse_policy: WorkflowIdReusePolicy::AllowDuplicate,
            id_conflict_policy: WorkflowIdConflictPolicy::Fail,
            cron_schedule: None,
            memo: Default::default(),
            search_attributes: Default::default(),
            request_id: None,
            start_delay: None,
            signal_with_start: None,
        }
    }

    #[tokio::test]
    async fn interceptor_rewrites_input_before_terminal_sees_it() {
        let terminal = Arc::new(RecordingTerminal { seen_id: Mutex::new(None) });
        let chain = build_chain(vec![Arc::new(PrefixingInterceptor)], terminal.clone());
        chain
            .start_workflow(StartWorkflowInput {
                workflow_type: "MyWf".to_string(),
                options: opts("abc"),
                input: vec![],
                headers: Default::default(),
            })
            .await
            .unwrap();
        assert_eq!(terminal.seen_id.lock().as_deref(), Some("prefixed-abc"));
    }
}
