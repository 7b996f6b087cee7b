//! The top-level entry point application code links against: register
//! workflow and activity functions under a type name, then hand the whole
//! thing to [`Worker::run`] and let it poll until shutdown.

use crate::activity::{ActContext, ActivityError};
use crate::context::{WfContext, WfError};
use crate::convert;
use temporal_core::conversions::{CompositePayloadConverter, IdentityCodec, PayloadCodec, PayloadConverter};
use temporal_core::worker::activity_task_pump::{ActContext as CoreActContext, ActivityFn, ActivityRegistry};
use temporal_core::worker::cache::WorkflowInstanceFactory;
use temporal_core::worker::CoreWorker;
use temporal_core::workflow::{WfHandles, WorkflowHandlers};
use core_api::worker::WorkerConfig;
use futures_util::future::{BoxFuture, LocalBoxFuture};
use sdk_core_protos::activity::ActivityExecutionResult;
use sdk_core_protos::failure::Failure;
use sdk_core_protos::payload::{Headers, Payload};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;

type WfFactory = Box<dyn Fn() -> temporal_core::workflow::WorkflowRegistration>;

type SignalHandlerFactory = Box<dyn Fn() -> Box<dyn FnMut(WfHandles, Vec<Payload>, Headers)>>;
type QueryHandlerFactory = Box<dyn Fn() -> Box<dyn Fn(WfHandles, Vec<Payload>, Headers) -> Result<Option<Payload>, Failure>>>;
type UpdateValidatorFactory = Box<dyn Fn() -> Box<dyn Fn(WfHandles, Vec<Payload>, Headers) -> Result<(), Failure>>>;
type UpdateHandlerFactory = Box<dyn Fn() -> Box<dyn FnMut(WfHandles, Vec<Payload>, Headers) -> LocalBoxFuture<'static, Result<Option<Payload>, Failure>>>>;

/// One workflow type's signal/query/update registrations, shared (via the
/// `Rc<RefCell<_>>` wrapper callers actually hold) between [`Worker::register_wf`]'s
/// factory and every later `register_signal`/`register_query`/`register_update`
/// call for the same type — registration order relative to `register_wf`
/// doesn't matter, since every factory reads this shared spec fresh on each
/// run rather than capturing a snapshot at `register_wf` time.
#[derive(Default)]
struct HandlerSpecs {
    signals: Vec<(String, SignalHandlerFactory)>,
    queries: Vec<(String, QueryHandlerFactory)>,
    update_validators: Vec<(String, UpdateValidatorFactory)>,
    updates: Vec<(String, UpdateHandlerFactory)>,
}

impl HandlerSpecs {
    fn build(&self) -> WorkflowHandlers {
        let mut handlers = WorkflowHandlers::default();
        for (name, factory) in &self.signals {
            handlers.signals.insert(name.clone(), factory());
        }
        for (name, factory) in &self.queries {
            handlers.queries.insert(name.clone(), factory());
        }
        for (name, factory) in &self.update_validators {
            handlers.update_validators.insert(name.clone(), factory());
        }
        for (name, factory) in &self.updates {
            handlers.update_handlers.insert(name.clone(), factory());
        }
        handlers
    }
}

/// Looks up the per-workflow-type factory built by [`Worker::register_wf`].
/// A fresh [`temporal_core::workflow::WorkflowRegistration`] is built on every call so
/// each run gets its own boxed main routine closure.
struct Registry {
    workflows: HashMap<String, WfFactory>,
}

impl WorkflowInstanceFactory for Registry {
    fn registration_for(&self, workflow_type: &str) -> Option<temporal_core::workflow::WorkflowRegistration> {
        self.workflows.get(workflow_type).map(|f| f())
    }
}

/// Hosts registered workflows and activities against one task queue.
/// Building one directly calls into component B (the gRPC-backed
/// [`CoreWorker`]); nothing is polled until [`Worker::run`] is awaited.
pub struct Worker<C: client::raw::WorkflowServiceClient + 'static> {
    core: Arc<CoreWorker<C>>,
    activities: ActivityRegistry,
    workflows: HashMap<String, WfFactory>,
    handler_specs: HashMap<String, Rc<RefCell<HandlerSpecs>>>,
    converter: Arc<dyn PayloadConverter>,
    codec: Arc<dyn PayloadCodec>,
}

impl<C: client::raw::WorkflowServiceClient + 'static> Worker<C> {
    pub fn new(raw: C, config: WorkerConfig) -> Self {
        Self {
            core: Arc::new(CoreWorker::new(raw, config)),
            activities: HashMap::new(),
            workflows: HashMap::new(),
            handler_specs: HashMap::new(),
            converter: Arc::new(CompositePayloadConverter::default()),
            codec: Arc::new(IdentityCodec),
        }
    }

    /// The shared signal/query/update spec for `workflow_type`, created on
    /// first use. `register_wf` and `register_signal`/`register_query`/
    /// `register_update` can run in either order and still end up pointing
    /// at the same spec.
    fn handler_specs_for(&mut self, workflow_type: String) -> Rc<RefCell<HandlerSpecs>> {
        self.handler_specs.entry(workflow_type).or_insert_with(|| Rc::new(RefCell::new(HandlerSpecs::default()))).clone()
    }

    /// Overrides the default JSON-plain payload converter, e.g. to add a
    /// custom proto-backed `LangValue` encoder ahead of it in the chain.
    pub fn with_payload_converter(mut self, converter: Arc<dyn PayloadConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Overrides the default (identity, no-op) outer codec, e.g. to install
    /// compression or encryption.
    pub fn with_payload_codec(mut self, codec: Arc<dyn PayloadCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Registers a workflow's main routine under `workflow_type`. `f` runs
    /// once per run, on this worker's single-threaded workflow executor; it
    /// must not require `Send` (it closes over `WfContext`, which is not).
    pub fn register_wf<F, Fut, A, R>(&mut self, workflow_type: impl Into<String>, f: F)
    where
        F: Fn(WfContext, A) -> Fut + 'static,
        Fut: Future<Output = Result<R, crate::context::WfError>> + 'static,
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
    {
        let workflow_type = workflow_type.into();
        let specs = self.handler_specs_for(workflow_type.clone());
        let converter = self.converter.clone();
        let f = Rc::new(f);
        let factory: WfFactory = Box::new(move || {
            let f = f.clone();
            let converter = converter.clone();
            let main: Box<dyn FnOnce(temporal_core::workflow::WfHandles, Vec<Payload>) -> LocalBoxFuture<'static, Result<Option<Payload>, Failure>>> =
                Box::new(move |handles, args| {
                    Box::pin(async move {
                        let input: A = convert::decode_first(&converter, &args)
                            .map_err(|e| Failure::application("DecodeError", e.to_string(), true))?;
                        let ctx = WfContext::new(handles, converter.clone());
                        match f(ctx, input).await {
                            Ok(result) => convert::encode(&converter, &result)
                                .map(Some)
                                .map_err(|e| Failure::application("EncodeError", e.to_string(), true)),
                            Err(e) => Err(e.into_failure()),
                        }
                    })
                });
            temporal_core::workflow::WorkflowRegistration { main, handlers: specs.borrow().build() }
        });
        self.workflows.insert(workflow_type, factory);
    }

    /// Registers a signal handler under `signal_name` for `workflow_type`.
    /// Unlike the main routine, `handler` is `Fn`, not `FnOnce`: it runs once
    /// per delivered signal for the life of the run, so any state it needs
    /// to keep between deliveries has to live in interior-mutable state it
    /// closes over (the same way a `WfContext`-holding workflow struct
    /// would), not in a captured `mut` binding.
    pub fn register_signal<A>(&mut self, workflow_type: impl Into<String>, signal_name: impl Into<String>, handler: impl Fn(WfContext, A) + 'static)
    where
        A: DeserializeOwned + 'static,
    {
        let signal_name = signal_name.into();
        let converter = self.converter.clone();
        let handler = Rc::new(handler);
        let specs = self.handler_specs_for(workflow_type.into());
        specs.borrow_mut().signals.push((
            signal_name,
            Box::new(move || {
                let handler = handler.clone();
                let converter = converter.clone();
                Box::new(move |handles: WfHandles, payloads: Vec<Payload>, _headers: Headers| match convert::decode_first(&converter, &payloads) {
                    Ok(input) => handler(WfContext::new(handles, converter.clone()), input),
                    Err(e) => tracing::warn!(error = %e, "dropping signal with an undecodable payload"),
                }) as Box<dyn FnMut(WfHandles, Vec<Payload>, Headers)>
            }),
        ));
    }

    /// Registers a query handler under `query_type` for `workflow_type`.
    /// Queries run frozen (§ state-machine Freeze invariant): `handler` must
    /// not try to schedule work through the `WfContext` it's handed, only
    /// read state through it.
    pub fn register_query<A, R>(&mut self, workflow_type: impl Into<String>, query_type: impl Into<String>, handler: impl Fn(WfContext, A) -> Result<R, WfError> + 'static)
    where
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
    {
        let query_type = query_type.into();
        let converter = self.converter.clone();
        let handler = Rc::new(handler);
        let specs = self.handler_specs_for(workflow_type.into());
        specs.borrow_mut().queries.push((
            query_type,
            Box::new(move || {
                let handler = handler.clone();
                let converter = converter.clone();
                Box::new(move |handles: WfHandles, payloads: Vec<Payload>, _headers: Headers| -> Result<Option<Payload>, Failure> {
                    let input: A = convert::decode_first(&converter, &payloads).map_err(|e| Failure::application("DecodeError", e.to_string(), true))?;
                    let ctx = WfContext::new(handles, converter.clone());
                    match handler(ctx, input) {
                        Ok(result) => convert::encode(&converter, &result).map(Some).map_err(|e| Failure::application("EncodeError", e.to_string(), true)),
                        Err(e) => Err(e.into_failure()),
                    }
                }) as Box<dyn Fn(WfHandles, Vec<Payload>, Headers) -> Result<Option<Payload>, Failure>>
            }),
        ));
    }

    /// Registers an update's validator for `update_name` on `workflow_type`.
    /// Runs frozen, before the update is accepted, exactly like a query
    /// handler; an update with no registered validator is always accepted.
    pub fn register_update_validator<A>(&mut self, workflow_type: impl Into<String>, update_name: impl Into<String>, validator: impl Fn(WfContext, A) -> Result<(), WfError> + 'static)
    where
        A: DeserializeOwned + 'static,
    {
        let update_name = update_name.into();
        let converter = self.converter.clone();
        let validator = Rc::new(validator);
        let specs = self.handler_specs_for(workflow_type.into());
        specs.borrow_mut().update_validators.push((
            update_name,
            Box::new(move || {
                let validator = validator.clone();
                let converter = converter.clone();
                Box::new(move |handles: WfHandles, payloads: Vec<Payload>, _headers: Headers| -> Result<(), Failure> {
                    let input: A = convert::decode_first(&converter, &payloads).map_err(|e| Failure::application("DecodeError", e.to_string(), true))?;
                    let ctx = WfContext::new(handles, converter.clone());
                    validator(ctx, input).map_err(WfError::into_failure)
                }) as Box<dyn Fn(WfHandles, Vec<Payload>, Headers) -> Result<(), Failure>>
            }),
        ));
    }

    /// Registers an update's handler for `update_name` on `workflow_type`.
    /// Runs after acceptance, unfrozen, so it can schedule activities/timers
    /// like the main routine can.
    pub fn register_update<A, R, Fut>(&mut self, workflow_type: impl Into<String>, update_name: impl Into<String>, handler: impl Fn(WfContext, A) -> Fut + 'static)
    where
        Fut: Future<Output = Result<R, WfError>> + 'static,
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
    {
        let update_name = update_name.into();
        let converter = self.converter.clone();
        let handler = Rc::new(handler);
        let specs = self.handler_specs_for(workflow_type.into());
        specs.borrow_mut().updates.push((
            update_name,
            Box::new(move || {
                let handler = handler.clone();
                let converter = converter.clone();
                Box::new(move |handles: WfHandles, payloads: Vec<Payload>, _headers: Headers| -> LocalBoxFuture<'static, Result<Option<Payload>, Failure>> {
                    let handler = handler.clone();
                    let converter = converter.clone();
                    Box::pin(async move {
                        let input: A = convert::decode_first(&converter, &payloads).map_err(|e| Failure::application("DecodeError", e.to_string(), true))?;
                        let ctx = WfContext::new(handles, converter.clone());
                        match handler(ctx, input).await {
                            Ok(result) => convert::encode(&converter, &result).map(Some).map_err(|e| Failure::application("EncodeError", e.to_string(), true)),
                            Err(e) => Err(e.into_failure()),
                        }
                    })
                }) as Box<dyn FnMut(WfHandles, Vec<Payload>, Headers) -> LocalBoxFuture<'static, Result<Option<Payload>, Failure>>>
            }),
        ));
    }

    /// Registers an activity function under `activity_type`. Unlike
    /// workflow code, activities run on the ambient `tokio` runtime with no
    /// determinism requirement, so `f` must be `Send + Sync`.
    pub fn register_activity<F, Fut, A, R>(&mut self, activity_type: impl Into<String>, f: F)
    where
        F: Fn(ActContext, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ActivityError>> + Send + 'static,
        A: DeserializeOwned + Send + 'static,
        R: Serialize + 'static,
    {
        let converter = self.converter.clone();
        let f = Arc::new(f);
        let activity: Arc<dyn ActivityFn> = Arc::new(move |core_ctx: CoreActContext, input: Vec<Payload>, _headers: Headers| {
            let f = f.clone();
            let converter = converter.clone();
            Box::pin(async move {
                let input: A = match convert::decode_first(&converter, &input) {
                    Ok(v) => v,
                    Err(e) => return ActivityExecutionResult::Failed(Failure::application("DecodeError", e.to_string(), true)),
                };
                let ctx = ActContext::new(core_ctx, converter.clone());
                match f(ctx, input).await {
                    Ok(result) => match convert::encode(&converter, &result) {
                        Ok(p) => ActivityExecutionResult::Completed(Some(p)),
                        Err(e) => ActivityExecutionResult::Failed(Failure::application("EncodeError", e.to_string(), true)),
                    },
                    Err(ActivityError::Retryable(msg)) => ActivityExecutionResult::Failed(Failure::application("ActivityError", msg, false)),
                    Err(ActivityError::NonRetryable(msg)) => ActivityExecutionResult::Failed(Failure::application("ActivityError", msg, true)),
                    Err(ActivityError::Cancelled(msg)) => ActivityExecutionResult::Cancelled(Failure::cancelled(msg)),
                    Err(ActivityError::Other(e)) => ActivityExecutionResult::Failed(Failure::application("ActivityError", e.to_string(), false)),
                }
            }) as BoxFuture<'static, ActivityExecutionResult>
        });
        self.activities.insert(activity_type.into(), activity);
    }

    /// Polls and executes registered workflows and activities until the
    /// worker is shut down. The returned future is pinned to this thread
    /// (the workflow zone is built on `Rc`/`RefCell`) — await it directly,
    /// never hand it to `tokio::spawn`.
    pub async fn run(self) {
        let registry = Arc::new(Registry { workflows: self.workflows });
        self.core.run(self.activities, self.codec, registry).await
    }

    pub fn initiate_shutdown(&self) {
        use core_api::worker::Worker as _;
        self.core.initiate_shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::WfContext;
    use client::raw::MockWorkflowServiceClient;
    use temporal_core::workflow::{WfInfoSeed, WorkflowMachines, WorkflowTaskExecutor};
    use core_api::worker::{SlotSupplierOptions, TunerHolder};
    use std::time::Duration;

    fn test_config() -> WorkerConfig {
        WorkerConfig {
            namespace: "ns".to_string(),
            task_queue: "tq".to_string(),
            worker_build_id: "unversioned".to_string(),
            client_identity_override: None,
            max_cached_workflows: 10,
            tuner: TunerHolder { workflow_slots: SlotSupplierOptions::default(), activity_slots: SlotSupplierOptions::default(), local_activity_slots: SlotSupplierOptions::default() },
            max_concurrent_wft_polls: 1,
            max_concurrent_at_polls: 1,
            nonsticky_to_sticky_poll_ratio: 0.5,
            no_remote_activities: false,
            sticky_queue_schedule_to_start_timeout: Duration::from_secs(10),
            max_heartbeat_throttle_interval: Duration::from_secs(60),
            default_heartbeat_throttle_interval: Duration::from_secs(30),
            max_worker_activities_per_second: None,
            max_task_queue_activities_per_second: None,
            graceful_shutdown_period: Duration::ZERO,
            use_worker_versioning: false,
            workflow_failure_errors: Default::default(),
            workflow_types_to_failure_errors: Default::default(),
        }
    }

    fn test_handles() -> temporal_core::workflow::WfHandles {
        let info = WfInfoSeed::default().into_info("Greet".to_string(), "run-1".to_string());
        temporal_core::workflow::WfHandles {
            machines: Rc::new(std::cell::RefCell::new(WorkflowMachines::new(1))),
            executor: Rc::new(WorkflowTaskExecutor::new()),
            info: Rc::new(RefCell::new(info)),
        }
    }

    #[tokio::test]
    async fn register_wf_builds_a_registration_that_round_trips_through_json() {
        let mut worker = Worker::new(MockWorkflowServiceClient::new(), test_config());
        worker.register_wf("Greet", |_ctx: WfContext, name: String| async move { Ok(format!("hello {name}")) });

        let factory = worker.workflows.get("Greet").expect("just registered");
        let registration = factory();
        let input = convert::encode(&worker.converter, &"world".to_string()).unwrap();
        let result = (registration.main)(test_handles(), vec![input]).await.unwrap();
        let decoded: String = convert::decode(&worker.converter, &result.unwrap()).unwrap();
        assert_eq!(decoded, "hello world");
    }

    #[tokio::test]
    async fn register_wf_maps_a_wf_error_into_an_application_failure() {
        let mut worker = Worker::new(MockWorkflowServiceClient::new(), test_config());
        worker.register_wf("Fails", |_ctx: WfContext, ()| async move {
            Err::<(), _>(crate::context::WfError::Cancelled("nope".to_string()))
        });

        let registration = worker.workflows.get("Fails").expect("just registered")();
        let err = (registration.main)(test_handles(), vec![]).await.unwrap_err();
        assert!(matches!(err.info, sdk_core_protos::failure::FailureInfo::Cancelled { .. }));
    }

    // `ActContext` can only be constructed inside `core`'s activity task
    // pump (its channel fields are private even to this crate), so
    // `register_activity`'s closure is exercised end to end only by running
    // a real worker; here we check the registration side effect and leave
    // the JSON round trip it shares with workflows covered by
    // `convert::tests`.
    #[test]
    fn register_activity_inserts_under_the_given_activity_type() {
        let mut worker = Worker::new(MockWorkflowServiceClient::new(), test_config());
        worker.register_activity("Double", |_ctx, n: i64| async move { Ok(n * 2) });
        assert!(worker.activities.contains_key("Double"));
        assert!(!worker.activities.contains_key("Triple"));
    }

    #[test]
    fn register_signal_before_register_wf_still_reaches_the_built_registration() {
        let mut worker = Worker::new(MockWorkflowServiceClient::new(), test_config());
        let received = Rc::new(RefCell::new(None));
        let received_clone = received.clone();
        worker.register_signal("Greet", "SetName", move |_ctx: WfContext, name: String| {
            *received_clone.borrow_mut() = Some(name);
        });
        worker.register_wf("Greet", |_ctx: WfContext, ()| async move { Ok(()) });

        let mut registration = worker.workflows.get("Greet").expect("just registered")();
        let mut handler = registration.handlers.signals.remove("SetName").expect("signal registered");
        let payload = convert::encode(&worker.converter, &"ferris".to_string()).unwrap();
        handler(test_handles(), vec![payload], HashMap::new());
        assert_eq!(received.borrow().as_deref(), Some("ferris"));
    }

    #[test]
    fn register_query_reads_without_touching_the_outgoing_command_queue() {
        let mut worker = Worker::new(MockWorkflowServiceClient::new(), test_config());
        worker.register_wf("Greet", |_ctx: WfContext, ()| async move { Ok(()) });
        worker.register_query("Greet", "CurrentName", |_ctx: WfContext, ()| Ok("ferris".to_string()));

        let registration = worker.workflows.get("Greet").expect("just registered")();
        let handler = registration.handlers.queries.get("CurrentName").expect("query registered");
        let result = handler(test_handles(), vec![], HashMap::new()).unwrap();
        let decoded: String = convert::decode_opt(&worker.converter, result).unwrap();
        assert_eq!(decoded, "ferris");
    }

    #[test]
    fn register_update_validator_rejects_before_the_handler_runs() {
        let mut worker = Worker::new(MockWorkflowServiceClient::new(), test_config());
        worker.register_wf("Greet", |_ctx: WfContext, ()| async move { Ok(()) });
        worker.register_update_validator("Greet", "Rename", |_ctx: WfContext, name: String| {
            if name.is_empty() {
                Err(WfError::Cancelled("name must not be empty".to_string()))
            } else {
                Ok(())
            }
        });

        let registration = worker.workflows.get("Greet").expect("just registered")();
        let validator = registration.handlers.update_validators.get("Rename").expect("validator registered");
        let empty = convert::encode(&worker.converter, &String::new()).unwrap();
        assert!(validator(test_handles(), vec![empty], HashMap::new()).is_err());
        let ferris = convert::encode(&worker.converter, &"ferris".to_string()).unwrap();
        assert!(validator(test_handles(), vec![ferris], HashMap::new()).is_ok());
    }

    #[tokio::test]
    async fn register_update_builds_a_handler_that_round_trips_through_json() {
        let mut worker = Worker::new(MockWorkflowServiceClient::new(), test_config());
        worker.register_wf("Greet", |_ctx: WfContext, ()| async move { Ok(()) });
        worker.register_update("Greet", "Rename", |_ctx: WfContext, name: String| async move { Ok(format!("renamed to {name}")) });

        let mut registration = worker.workflows.get("Greet").expect("just registered")();
        let mut handler = registration.handlers.update_handlers.remove("Rename").unwrap();
        let payload = convert::encode(&worker.converter, &"ferris".to_string()).unwrap();
        let result = handler(test_handles(), vec![payload], HashMap::new()).await.unwrap();
        let decoded: String = convert::decode(&worker.converter, &result.unwrap()).unwrap();
        assert_eq!(decoded, "renamed to ferris");
    }
}
