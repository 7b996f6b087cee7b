//! The ergonomic handle passed to user workflow code. Wraps [`WfHandles`]
//! (the raw, untyped seam the core state machine exposes) with typed
//! encode/decode and a surface shaped like the rest of the Temporal Rust
//! SDK ecosystem's `WfContext` (see the retrieved `saga` example:
//! `ctx.activity(opts).await`).

use crate::convert;
use temporal_core::conversions::PayloadConverter;
use temporal_core::workflow::{ConditionOutcome, WfHandles, WorkflowInfo, WorkflowMachinesError};
use sdk_core_protos::activation::{ActivityResolution, ChildWorkflowResolution, ChildWorkflowStartResolution};
use sdk_core_protos::commands::{ActivityCancellationType, ActivityOptionsWire, ChildWorkflowOptionsWire, ExternalTarget};
use sdk_core_protos::failure::Failure;
use sdk_core_protos::identifiers::WorkflowExecution;
use sdk_core_protos::payload::{Headers, Payload};
use sdk_core_protos::retry::RetryPolicy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WfError {
    #[error(transparent)]
    Machines(#[from] WorkflowMachinesError),
    #[error(transparent)]
    Convert(#[from] temporal_core::conversions::ConversionError),
    #[error("remote execution failed: {0:?}")]
    Remote(Failure),
    #[error("child workflow `{0}` failed to start: a workflow with that id is already running")]
    ChildWorkflowStartFailed(String),
    #[error("operation was cancelled: {0}")]
    Cancelled(String),
}

impl WfError {
    /// How this error should be reported back to the server when it
    /// escapes a workflow's main routine or an update handler.
    pub fn into_failure(self) -> Failure {
        match self {
            WfError::Remote(f) => f,
            WfError::Cancelled(msg) => Failure::cancelled(msg),
            other => Failure::application("WorkflowError", other.to_string(), false),
        }
    }
}

/// Ergonomic subset of [`ActivityOptionsWire`]; `activity_type` and
/// `is_local` are supplied by the call site rather than the options struct.
#[derive(Debug, Clone)]
pub struct ActivityOptions {
    pub task_queue: Option<String>,
    pub schedule_to_close_timeout: Option<Duration>,
    pub schedule_to_start_timeout: Option<Duration>,
    pub start_to_close_timeout: Option<Duration>,
    pub heartbeat_timeout: Option<Duration>,
    pub retry_policy: Option<RetryPolicy>,
    pub cancellation_type: ActivityCancellationType,
    pub is_local: bool,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            task_queue: None,
            schedule_to_close_timeout: None,
            schedule_to_start_timeout: None,
            start_to_close_timeout: Some(Duration::from_secs(10)),
            heartbeat_timeout: None,
            retry_policy: None,
            cancellation_type: ActivityCancellationType::TryCancel,
            is_local: false,
        }
    }
}

impl ActivityOptions {
    fn into_wire(self, activity_type: String) -> ActivityOptionsWire {
        ActivityOptionsWire {
            activity_type,
            task_queue: self.task_queue,
            schedule_to_close_timeout: self.schedule_to_close_timeout,
            schedule_to_start_timeout: self.schedule_to_start_timeout,
            start_to_close_timeout: self.start_to_close_timeout,
            heartbeat_timeout: self.heartbeat_timeout,
            retry_policy: self.retry_policy,
            cancellation_type: self.cancellation_type,
            is_local: self.is_local,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChildWorkflowOptions {
    pub task_queue: Option<String>,
    pub retry_policy: Option<RetryPolicy>,
    pub cron_schedule: Option<String>,
    pub memo: HashMap<String, Payload>,
    pub search_attributes: HashMap<String, Payload>,
}

impl ChildWorkflowOptions {
    fn into_wire(self, workflow_type: String, workflow_id: String) -> ChildWorkflowOptionsWire {
        ChildWorkflowOptionsWire {
            workflow_type,
            workflow_id,
            task_queue: self.task_queue,
            retry_policy: self.retry_policy,
            cron_schedule: self.cron_schedule,
            memo: self.memo,
            search_attributes: self.search_attributes,
        }
    }
}

/// Who a signal or cancel-external command targets.
#[derive(Debug, Clone)]
pub enum ExternalWorkflowTarget {
    ChildWorkflowId(String),
    Execution { namespace: String, workflow_id: String, run_id: String },
}

impl ExternalWorkflowTarget {
    pub fn child(workflow_id: impl Into<String>) -> Self {
        Self::ChildWorkflowId(workflow_id.into())
    }

    pub fn execution(namespace: impl Into<String>, workflow_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self::Execution { namespace: namespace.into(), workflow_id: workflow_id.into(), run_id: run_id.into() }
    }

    fn into_wire(self) -> ExternalTarget {
        match self {
            Self::ChildWorkflowId(id) => ExternalTarget::ChildWorkflowId(id),
            Self::Execution { namespace, workflow_id, run_id } => {
                ExternalTarget::Execution(WorkflowExecution { namespace, workflow_id, run_id })
            }
        }
    }
}

/// A started child workflow, parked on its execution result. Dropping this
/// without awaiting `result()` abandons no state — the child keeps running
/// independently, exactly as an unawaited `scheduleActivity` continuation
/// would.
pub struct ChildWorkflowHandle<R> {
    workflow_id: String,
    run_id: String,
    exec_rx: tokio::sync::oneshot::Receiver<ChildWorkflowResolution>,
    converter: Arc<dyn PayloadConverter>,
    _marker: PhantomData<R>,
}

impl<R: DeserializeOwned> ChildWorkflowHandle<R> {
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub async fn result(self) -> Result<R, WfError> {
        let resolution = self
            .exec_rx
            .await
            .map_err(|_| WfError::Cancelled("child workflow execution channel dropped during eviction".to_string()))?;
        match resolution {
            ChildWorkflowResolution::Completed(p) => Ok(convert::decode_opt(&self.converter, p)?),
            ChildWorkflowResolution::Failed(f) | ChildWorkflowResolution::Cancelled(f) => Err(WfError::Remote(f)),
        }
    }
}

/// Handed to a workflow's main routine and every signal/query/update
/// handler. Cloning is cheap (every field is `Rc`-backed or an `Arc`); all
/// clones observe and mutate the same run.
#[derive(Clone)]
pub struct WfContext {
    handles: WfHandles,
    converter: Arc<dyn PayloadConverter>,
}

impl WfContext {
    pub(crate) fn new(handles: WfHandles, converter: Arc<dyn PayloadConverter>) -> Self {
        Self { handles, converter }
    }

    pub fn info(&self) -> WorkflowInfo {
        self.handles.info.borrow().clone()
    }

    fn headers(&self) -> Headers {
        self.handles.info.borrow().headers.clone()
    }

    /// Schedules an activity and awaits its resolution. Local-activity
    /// backoffs are handled transparently: the workflow sleeps for the
    /// returned duration and re-schedules, just as a non-local activity's
    /// retries happen entirely server-side.
    pub async fn activity<A, R>(&self, activity_type: impl Into<String>, opts: ActivityOptions, input: A) -> Result<R, WfError>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let activity_type = activity_type.into();
        let payload = convert::encode(&self.converter, &input)?;
        let is_local = opts.is_local;
        let wire = opts.into_wire(activity_type);
        loop {
            let (_seq, rx) = self.handles.machines.borrow_mut().schedule_activity(wire.clone(), vec![payload.clone()], self.headers())?;
            let resolution = rx
                .await
                .map_err(|_| WfError::Cancelled("activity resolution channel dropped during eviction".to_string()))?;
            match resolution {
                ActivityResolution::Completed(p) => return Ok(convert::decode_opt(&self.converter, p)?),
                ActivityResolution::Failed(f) | ActivityResolution::Cancelled(f) => return Err(WfError::Remote(f)),
                ActivityResolution::Backoff(delay) => {
                    if !is_local {
                        return Err(WfError::Remote(Failure::application(
                            "UnexpectedBackoff",
                            "server sent a local-activity backoff resolution for a non-local activity",
                            true,
                        )));
                    }
                    self.timer(delay).await;
                }
            }
        }
    }

    pub async fn start_child_workflow<A, R>(
        &self,
        workflow_type: impl Into<String>,
        workflow_id: impl Into<String>,
        opts: ChildWorkflowOptions,
        input: A,
    ) -> Result<ChildWorkflowHandle<R>, WfError>
    where
        A: Serialize,
    {
        let workflow_id = workflow_id.into();
        let payload = convert::encode(&self.converter, &input)?;
        let wire = opts.into_wire(workflow_type.into(), workflow_id.clone());
        let (_seq, start_rx, exec_rx) = self.handles.machines.borrow_mut().start_child_workflow(wire, vec![payload], self.headers())?;
        let start = start_rx
            .await
            .map_err(|_| WfError::Cancelled("child workflow start channel dropped during eviction".to_string()))?;
        match start {
            ChildWorkflowStartResolution::Started { run_id } => {
                Ok(ChildWorkflowHandle { workflow_id, run_id, exec_rx, converter: self.converter.clone(), _marker: PhantomData })
            }
            ChildWorkflowStartResolution::Failed { workflow_id } => Err(WfError::ChildWorkflowStartFailed(workflow_id)),
        }
    }

    pub async fn signal_external_workflow<A: Serialize>(
        &self,
        target: ExternalWorkflowTarget,
        signal_name: impl Into<String>,
        input: A,
    ) -> Result<(), WfError> {
        let payload = convert::encode(&self.converter, &input)?;
        let (_seq, rx) = self
            .handles
            .machines
            .borrow_mut()
            .signal_external_workflow(target.into_wire(), signal_name.into(), vec![payload], self.headers())?;
        match rx.await.ok().flatten() {
            Some(f) => Err(WfError::Remote(f)),
            None => Ok(()),
        }
    }

    pub async fn cancel_external_workflow(&self, target: ExternalWorkflowTarget) -> Result<(), WfError> {
        let (_seq, rx) = self.handles.machines.borrow_mut().cancel_external_workflow(target.into_wire())?;
        match rx.await.ok().flatten() {
            Some(f) => Err(WfError::Remote(f)),
            None => Ok(()),
        }
    }

    /// Parks until `duration` elapses. A zero duration still yields one
    /// scheduler tick (the underlying state machine normalizes it to a
    /// one-millisecond timer so history always carries the event).
    pub async fn timer(&self, duration: Duration) {
        self.timer_with_summary(duration, None).await
    }

    pub async fn timer_with_summary(&self, duration: Duration, summary: Option<String>) {
        let parked = self.handles.machines.borrow_mut().start_timer(duration, summary);
        if let Ok((_, rx)) = parked {
            let _ = rx.await;
        }
    }

    /// Re-evaluates `predicate` after every activation job that mutates
    /// workflow state, resolving once it returns `true`. Resolves to
    /// `false` immediately if the run is evicted before that happens.
    pub async fn wait_condition(&self, predicate: impl Fn() -> bool + 'static) -> bool {
        let parked = self.handles.machines.borrow_mut().wait_condition(predicate);
        let Ok((_, rx)) = parked else { return false };
        matches!(rx.await, Ok(ConditionOutcome::Met))
    }

    pub fn record_marker(&self, name: impl Into<String>, details: HashMap<String, Payload>) -> Result<(), WfError> {
        Ok(self.handles.machines.borrow_mut().record_marker(name.into(), details)?)
    }

    pub fn upsert_search_attributes(&self, attributes: HashMap<String, Payload>) -> Result<(), WfError> {
        Ok(self.handles.machines.borrow_mut().upsert_search_attributes(attributes)?)
    }

    pub fn upsert_memo(&self, memo: HashMap<String, Payload>) -> Result<(), WfError> {
        Ok(self.handles.machines.borrow_mut().upsert_memo(memo)?)
    }

    /// Deterministic feature-flag check (§4.E patch markers): `true` on
    /// first encounter of a non-replay tick (the new code path), and on
    /// replay only if history already carries this patch's marker.
    pub fn has_change(&self, patch_id: &str) -> Result<bool, WfError> {
        Ok(self.handles.machines.borrow_mut().has_change(patch_id, false)?)
    }

    pub fn has_change_deprecated(&self, patch_id: &str) -> Result<bool, WfError> {
        Ok(self.handles.machines.borrow_mut().has_change(patch_id, true)?)
    }

    /// Ends the current run and atomically starts a new one under the same
    /// workflow id. Call this, then return `Ok(())` (or any value — the
    /// main routine's own completion is a no-op once this has run).
    pub fn continue_as_new<A: Serialize>(&self, workflow_type: impl Into<String>, task_queue: Option<String>, arguments: Vec<A>) -> Result<(), WfError> {
        let payloads = arguments.iter().map(|a| convert::encode(&self.converter, a)).collect::<Result<Vec<_>, _>>()?;
        Ok(self.handles.machines.borrow_mut().continue_as_new(workflow_type.into(), payloads, task_queue, self.headers())?)
    }

    /// Deterministically seeded pseudorandom number, reproducible across
    /// replay. Never use `rand::thread_rng()` in workflow code instead.
    pub fn random_u64(&self) -> Result<u64, WfError> {
        Ok(self.handles.machines.borrow_mut().next_random_u64()?)
    }

    /// Issues a terminal cancel-workflow command; the main routine should
    /// return immediately afterwards.
    pub fn cancel_workflow(&self, details: Vec<Payload>) -> Result<(), WfError> {
        Ok(self.handles.machines.borrow_mut().cancel_workflow(details)?)
    }

    pub fn cancellation_reason(&self) -> Option<String> {
        self.handles.machines.borrow().cancellation_reason().map(|s| s.to_string())
    }

    /// Resolves once the run has been asked to cancel, carrying the
    /// server-supplied reason. Resolves immediately if cancellation was
    /// already requested before this call.
    pub async fn cancelled(&self) -> String {
        let rx = self.handles.machines.borrow_mut().on_cancellation();
        rx.await.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use temporal_core::conversions::CompositePayloadConverter;
    use temporal_core::workflow::{WfInfoSeed, WorkflowMachines, WorkflowTaskExecutor};
    use std::cell::RefCell;
    use std::future::Future;
    use std::rc::Rc;

    fn test_context() -> WfContext {
        let info = WfInfoSeed::default().into_info("Greet".to_string(), "run-1".to_string());
        let handles = WfHandles {
            machines: Rc::new(RefCell::new(WorkflowMachines::new(1))),
            executor: Rc::new(WorkflowTaskExecutor::new()),
            info: Rc::new(RefCell::new(info)),
        };
        WfContext::new(handles, Arc::new(CompositePayloadConverter::default()))
    }

    #[test]
    fn info_reflects_the_seeded_workflow() {
        let ctx = test_context();
        assert_eq!(ctx.info().workflow_type, "Greet");
        assert_eq!(ctx.info().run_id, "run-1");
    }

    #[test]
    fn cloning_a_context_shares_the_same_underlying_machines() {
        let ctx = test_context();
        let clone = ctx.clone();
        ctx.record_marker("m1".to_string(), HashMap::new()).unwrap();
        // Both handles see the same outgoing command queue.
        let drained = clone.handles.machines.borrow_mut().drain_commands();
        assert_eq!(drained.len(), 1);
    }

    #[tokio::test]
    async fn activity_surfaces_a_remote_failure() {
        let ctx = test_context();
        let fut = ctx.activity::<(), ()>("DoThing", ActivityOptions::default(), ());
        tokio::pin!(fut);
        // Poll once so the command is queued, then resolve it through the
        // same path `temporal_core::worker::mod` would on a `ResolveActivity` job.
        futures_util::future::poll_fn(|cx| {
            let _ = fut.as_mut().poll(cx);
            std::task::Poll::Ready(())
        })
        .await;
        ctx.handles.machines.borrow_mut().resolve_activity(0, ActivityResolution::Failed(Failure::application("Boom", "bad", true)));
        let err = fut.await.unwrap_err();
        assert!(matches!(err, WfError::Remote(_)));
    }

    #[test]
    fn external_workflow_target_child_round_trips_into_the_wire_shape() {
        let target = ExternalWorkflowTarget::child("wf-1");
        assert!(matches!(target.into_wire(), ExternalTarget::ChildWorkflowId(id) if id == "wf-1"));
    }
}
