//! Component F: the glue between the server-delivered activation stream and
//! the state machine (E) plus the user's workflow code running on the task
//! executor (D).

use crate::workflow::machines::WorkflowMachines;
use crate::workflow::task_executor::WorkflowTaskExecutor;
use futures_util::future::LocalBoxFuture;
use sdk_core_protos::activation::{WorkflowActivation, WorkflowActivationJob};
use sdk_core_protos::failure::Failure;
use sdk_core_protos::identifiers::WorkflowExecution;
use sdk_core_protos::payload::{Headers, Payload};
use sdk_core_protos::retry::RetryPolicy;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

/// Handles shared with every piece of user workflow code (the main routine,
/// signal/query/update handlers): a reference to the state machine, the
/// executor that runs this workflow's tasks, and the run's observable info
/// (kept current by [`WorkflowInstance::apply_job`] so a long-lived
/// `WfContext` in the `sdk` crate always reads the latest values).
#[derive(Clone)]
pub struct WfHandles {
    pub machines: Rc<RefCell<WorkflowMachines>>,
    pub executor: Rc<WorkflowTaskExecutor>,
    pub info: Rc<RefCell<WorkflowInfo>>,
}

type MainFn = Box<dyn FnOnce(WfHandles, Vec<Payload>) -> LocalBoxFuture<'static, Result<Option<Payload>, Failure>>>;
type SignalHandler = Box<dyn FnMut(WfHandles, Vec<Payload>, Headers)>;
type QueryHandler = Box<dyn Fn(WfHandles, Vec<Payload>, Headers) -> Result<Option<Payload>, Failure>>;
type UpdateValidator = Box<dyn Fn(WfHandles, Vec<Payload>, Headers) -> Result<(), Failure>>;
type UpdateHandler = Box<dyn FnMut(WfHandles, Vec<Payload>, Headers) -> LocalBoxFuture<'static, Result<Option<Payload>, Failure>>>;

/// Named signal/query/update handlers for one workflow type, supplied by the
/// `sdk` crate's registration. Queries and update validators run "frozen"
/// (read-only): they cannot append commands or draw randomness.
#[derive(Default)]
pub struct WorkflowHandlers {
    pub signals: HashMap<String, SignalHandler>,
    pub queries: HashMap<String, QueryHandler>,
    pub update_validators: HashMap<String, UpdateValidator>,
    pub update_handlers: HashMap<String, UpdateHandler>,
    /// Fallback for signal names with no registered handler. If absent,
    /// unmatched signals are buffered (they simply never drain in the
    /// current single-registration model, but the buffer keeps them from
    /// being silently dropped).
    pub dynamic_signal_handler: Option<SignalHandler>,
}

/// Everything the `sdk` crate's workflow registration supplies for one
/// workflow type.
pub struct WorkflowRegistration {
    pub main: MainFn,
    pub handlers: WorkflowHandlers,
}

/// The handful of fields the cache's caller knows about a run before its
/// `InitializeWorkflow` job has been applied (everything else in
/// [`WorkflowInfo`] is filled in, or overwritten, from that job).
#[derive(Debug, Clone, Default)]
pub struct WfInfoSeed {
    pub task_queue: String,
    pub attempt: u32,
    pub start_time: Option<std::time::SystemTime>,
    pub parent: Option<WorkflowExecution>,
    pub retry_policy: Option<RetryPolicy>,
    pub cron_schedule: Option<String>,
    pub execution_timeout: Option<Duration>,
    pub run_timeout: Option<Duration>,
    pub task_timeout: Option<Duration>,
    pub continued_run_id: Option<String>,
}

impl WfInfoSeed {
    pub fn into_info(self, workflow_type: String, run_id: String) -> WorkflowInfo {
        WorkflowInfo {
            workflow_type,
            workflow_id: String::new(),
            run_id,
            task_queue: self.task_queue,
            attempt: self.attempt,
            start_time: self.start_time.unwrap_or_else(std::time::SystemTime::now),
            parent: self.parent,
            retry_policy: self.retry_policy,
            cron_schedule: self.cron_schedule,
            execution_timeout: self.execution_timeout,
            run_timeout: self.run_timeout,
            task_timeout: self.task_timeout,
            headers: Headers::new(),
            last_result: None,
            last_failure: None,
            continued_run_id: self.continued_run_id,
        }
    }
}

/// Everything about a run that is observable but not part of replay state
/// (§4.F "Observable workflow info").
#[derive(Debug, Clone)]
pub struct WorkflowInfo {
    pub workflow_type: String,
    pub workflow_id: String,
    pub run_id: String,
    pub task_queue: String,
    pub attempt: u32,
    pub start_time: std::time::SystemTime,
    pub parent: Option<WorkflowExecution>,
    pub retry_policy: Option<RetryPolicy>,
    pub cron_schedule: Option<String>,
    pub execution_timeout: Option<Duration>,
    pub run_timeout: Option<Duration>,
    pub task_timeout: Option<Duration>,
    pub headers: Headers,
    pub last_result: Option<Payload>,
    pub last_failure: Option<Failure>,
    pub continued_run_id: Option<String>,
}

/// One running (or cached, parked between activations) workflow instance.
/// Owns the state machine and the task executor that drives this run's
/// coroutine; everything here lives on whichever thread first calls
/// [`Self::apply_activation`], per D's pinned-thread rule.
pub struct WorkflowInstance {
    handles: WfHandles,
    main: Option<MainFn>,
    handlers: WorkflowHandlers,
    buffered_signals: VecDeque<(String, Vec<Payload>, Headers)>,
    evicted: bool,
}

impl WorkflowInstance {
    pub fn new(info: WorkflowInfo, registration: WorkflowRegistration) -> Self {
        Self {
            handles: WfHandles {
                machines: Rc::new(RefCell::new(WorkflowMachines::new(0))),
                executor: Rc::new(WorkflowTaskExecutor::new()),
                info: Rc::new(RefCell::new(info)),
            },
            main: Some(registration.main),
            handlers: registration.handlers,
            buffered_signals: VecDeque::new(),
            evicted: false,
        }
    }

    pub fn info(&self) -> WorkflowInfo {
        self.handles.info.borrow().clone()
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted
    }

    pub fn is_finished(&self) -> bool {
        self.handles.machines.borrow().is_finished()
    }

    /// Applies one activation: every job in order, then drives the task
    /// executor and wait-condition predicates to a fixpoint, per §4.E
    /// Replay semantics steps 2-3. Returns the commands to be sent back as
    /// the workflow task completion (empty if evicted mid-activation).
    pub fn apply_activation(&mut self, activation: WorkflowActivation) -> Vec<sdk_core_protos::commands::WorkflowCommand> {
        self.handles.machines.borrow_mut().is_replaying = activation.is_replaying;

        for job in activation.jobs {
            if self.evicted {
                break;
            }
            self.apply_job(job);
        }

        if !self.evicted {
            self.drive_to_fixpoint();
        }

        if self.evicted {
            Vec::new()
        } else {
            self.handles.machines.borrow_mut().drain_commands()
        }
    }

    fn drive_to_fixpoint(&self) {
        loop {
            self.handles.executor.run();
            let resolved_any = self.handles.machines.borrow_mut().poll_conditions();
            if !resolved_any {
                break;
            }
        }
    }

    fn apply_job(&mut self, job: WorkflowActivationJob) {
        match job {
            WorkflowActivationJob::InitializeWorkflow { workflow_type, workflow_id, arguments, randomness_seed, headers } => {
                {
                    let mut info = self.handles.info.borrow_mut();
                    info.workflow_type = workflow_type;
                    info.workflow_id = workflow_id;
                    info.headers = headers;
                }
                self.handles.machines.borrow_mut().reseed(randomness_seed);
                if let Some(main) = self.main.take() {
                    let handles = self.handles.clone();
                    self.handles.executor.spawn(async move {
                        let result = main(handles.clone(), arguments).await;
                        let mut m = handles.machines.borrow_mut();
                        let _ = match result {
                            Ok(payload) => m.complete_workflow(payload),
                            Err(failure) => m.fail_workflow(failure),
                        };
                    });
                }
            }
            WorkflowActivationJob::FireTimer { seq } => self.handles.machines.borrow_mut().resolve_timer(seq),
            WorkflowActivationJob::ResolveActivity { seq, result } => self.handles.machines.borrow_mut().resolve_activity(seq, result),
            WorkflowActivationJob::ResolveChildWorkflowStart { seq, result } => {
                self.handles.machines.borrow_mut().resolve_child_workflow_start(seq, result)
            }
            WorkflowActivationJob::ResolveChildWorkflowExecution { seq, result } => {
                self.handles.machines.borrow_mut().resolve_child_workflow_execution(seq, result)
            }
            WorkflowActivationJob::ResolveSignalExternalWorkflow { seq, failure } => {
                self.handles.machines.borrow_mut().resolve_signal_external(seq, failure)
            }
            WorkflowActivationJob::ResolveRequestCancelExternalWorkflow { seq, failure } => {
                self.handles.machines.borrow_mut().resolve_cancel_external(seq, failure)
            }
            WorkflowActivationJob::ResolveNexusOperationStart { seq } => self.handles.machines.borrow_mut().resolve_nexus_operation_start(seq),
            WorkflowActivationJob::ResolveNexusOperation { seq } => self.handles.machines.borrow_mut().resolve_nexus_operation(seq),
            WorkflowActivationJob::SignalWorkflow { signal_name, input, headers } => self.dispatch_signal(signal_name, input, headers),
            WorkflowActivationJob::QueryWorkflow { query_id, query_type, arguments, headers } => {
                self.dispatch_query(query_id, query_type, arguments, headers)
            }
            WorkflowActivationJob::CancelWorkflow { reason } => self.handles.machines.borrow_mut().request_cancellation(reason),
            WorkflowActivationJob::DoUpdate { id, name, input, headers, run_validator } => self.dispatch_update(id, name, input, headers, run_validator),
            WorkflowActivationJob::UpdateRandomSeed { randomness_seed } => self.handles.machines.borrow_mut().reseed(randomness_seed),
            WorkflowActivationJob::NotifyHasPatch { patch_id } => self.handles.machines.borrow_mut().notify_has_patch(patch_id),
            WorkflowActivationJob::RemoveFromCache { .. } => self.teardown(),
        }
    }

    fn dispatch_signal(&mut self, signal_name: String, input: Vec<Payload>, headers: Headers) {
        if let Some(handler) = self.handlers.signals.get_mut(&signal_name) {
            handler(self.handles.clone(), input, headers);
        } else if let Some(handler) = self.handlers.dynamic_signal_handler.as_mut() {
            handler(self.handles.clone(), input, headers);
        } else {
            self.buffered_signals.push_back((signal_name, input, headers));
        }
    }

    /// Freezes the machines for the duration of `f`, then unfreezes them.
    /// The flag is flipped through two short-lived borrows rather than one
    /// held across `f` itself, since `f` is handed `handles.clone()` and a
    /// real handler re-borrows the same `RefCell` to do any read at all —
    /// holding the `RefMut` across the call would make every such read
    /// panic with `BorrowMutError` before it ever reached the frozen check.
    fn run_frozen<R>(handles: &WfHandles, f: impl FnOnce() -> R) -> R {
        handles.machines.borrow_mut().set_frozen(true);
        let r = f();
        handles.machines.borrow_mut().set_frozen(false);
        r
    }

    fn dispatch_query(&mut self, query_id: String, query_type: String, arguments: Vec<Payload>, headers: Headers) {
        let handles = self.handles.clone();
        let result = match self.handlers.queries.get(&query_type) {
            Some(handler) => Self::run_frozen(&handles, || handler(handles.clone(), arguments, headers)),
            None => Err(Failure::application("QueryNotRegistered", format!("unknown query type `{query_type}`"), true)),
        };
        let _ = self.handles.machines.borrow_mut().respond_to_query(query_id, result);
    }

    fn dispatch_update(&mut self, id: String, name: String, input: Vec<Payload>, headers: Headers, run_validator: bool) {
        let handles = self.handles.clone();
        if run_validator {
            let validation = match self.handlers.update_validators.get(&name) {
                Some(v) => Self::run_frozen(&handles, || v(handles.clone(), input.clone(), headers.clone())),
                None => Ok(()),
            };
            if let Err(failure) = validation {
                let _ = self.handles.machines.borrow_mut().update_rejected(id, failure);
                return;
            }
        }
        let _ = self.handles.machines.borrow_mut().update_accepted(id.clone());
        self.handles.machines.borrow_mut().update_started();

        let Some(handler) = self.handlers.update_handlers.get_mut(&name) else {
            let _ = self.handles.machines.borrow_mut().update_completed(id, None);
            return;
        };
        let fut = handler(handles.clone(), input, headers);
        self.handles.executor.spawn(async move {
            let result = fut.await;
            let mut m = handles.machines.borrow_mut();
            let _ = match result {
                Ok(payload) => m.update_completed(id, payload),
                Err(failure) => m.update_rejected(id, failure),
            };
        });
    }

    /// Cache eviction teardown (§4.F): forcibly cancels every outstanding
    /// continuation and marks the instance dead. The worker cache is
    /// expected to drop this instance once it sees `is_evicted()`.
    fn teardown(&mut self) {
        self.handles.machines.borrow_mut().cancel_all_pending();
        self.evicted = true;
    }

    /// Called by the worker cache when it displaces or force-evicts an
    /// instance without ever delivering it a `RemoveFromCache` job (LRU
    /// overflow, worker shutdown). Runs the same teardown before dropping.
    pub fn cancel_for_eviction(mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdk_core_protos::Timestamp;

    fn test_info() -> WorkflowInfo {
        WorkflowInfo {
            workflow_type: "Test".to_string(),
            workflow_id: "wf-1".to_string(),
            run_id: "run-1".to_string(),
            task_queue: "tq".to_string(),
            attempt: 1,
            start_time: std::time::SystemTime::now(),
            parent: None,
            retry_policy: None,
            cron_schedule: None,
            execution_timeout: None,
            run_timeout: None,
            task_timeout: None,
            headers: HashMap::new(),
            last_result: None,
            last_failure: None,
            continued_run_id: None,
        }
    }

    fn activation_with(jobs: Vec<WorkflowActivationJob>, is_replaying: bool) -> WorkflowActivation {
        WorkflowActivation { run_id: "run-1".to_string(), timestamp: Timestamp::now(), is_replaying, history_length: 0, history_size_bytes: 0, jobs }
    }

    #[test]
    fn initialize_and_immediately_complete() {
        let main: MainFn = Box::new(|_handles, args| Box::pin(async move { Ok(args.into_iter().next()) }));
        let mut inst = WorkflowInstance::new(test_info(), WorkflowRegistration { main, handlers: WorkflowHandlers::default() });
        let input = vec![Payload::new(b"hi".to_vec(), "binary/plain")];
        let act = activation_with(
            vec![WorkflowActivationJob::InitializeWorkflow {
                workflow_type: "Test".to_string(),
                workflow_id: "wf-1".to_string(),
                arguments: input.clone(),
                randomness_seed: 7,
                headers: HashMap::new(),
            }],
            false,
        );
        let cmds = inst.apply_activation(act);
        assert!(inst.is_finished());
        assert_eq!(cmds.len(), 1);
        match &cmds[0] {
            sdk_core_protos::commands::WorkflowCommand::CompleteWorkflow { result } => assert_eq!(result, &Some(input[0].clone())),
            other => panic!("expected CompleteWorkflow, got {other:?}"),
        }
    }

    #[test]
    fn signal_dispatch_invokes_handler() {
        let received: Rc<RefCell<Vec<Vec<Payload>>>> = Rc::new(RefCell::new(Vec::new()));
        let received2 = received.clone();
        let main: MainFn = Box::new(|handles, _args| {
            Box::pin(async move {
                let (_seq, rx) = handles.machines.borrow_mut().start_timer(Duration::from_secs(3600), None).unwrap();
                let _ = rx.await;
                Ok(None)
            })
        });
        let mut handlers = WorkflowHandlers::default();
        handlers.signals.insert(
            "ping".to_string(),
            Box::new(move |_handles, input, _headers| {
                received2.borrow_mut().push(input);
            }),
        );
        let mut inst = WorkflowInstance::new(test_info(), WorkflowRegistration { main, handlers });
        inst.apply_activation(activation_with(
            vec![WorkflowActivationJob::InitializeWorkflow {
                workflow_type: "Test".to_string(),
                workflow_id: "wf-1".to_string(),
                arguments: vec![],
                randomness_seed: 1,
                headers: HashMap::new(),
            }],
            false,
        ));
        inst.apply_activation(activation_with(
            vec![WorkflowActivationJob::SignalWorkflow { signal_name: "ping".to_string(), input: vec![], headers: HashMap::new() }],
            false,
        ));
        assert_eq!(received.borrow().len(), 1);
    }

    #[test]
    fn remove_from_cache_evicts_and_cancels_pending() {
        let main: MainFn = Box::new(|handles, _args| {
            Box::pin(async move {
                let (_seq, rx) = handles.machines.borrow_mut().start_timer(Duration::from_secs(3600), None).unwrap();
                let _ = rx.await;
                Ok(None)
            })
        });
        let mut inst = WorkflowInstance::new(test_info(), WorkflowRegistration { main, handlers: WorkflowHandlers::default() });
        inst.apply_activation(activation_with(
            vec![WorkflowActivationJob::InitializeWorkflow {
                workflow_type: "Test".to_string(),
                workflow_id: "wf-1".to_string(),
                arguments: vec![],
                randomness_seed: 1,
                headers: HashMap::new(),
            }],
            false,
        ));
        assert!(!inst.is_evicted());
        inst.apply_activation(activation_with(vec![WorkflowActivationJob::RemoveFromCache { reason: "lru".to_string() }], false));
        assert!(inst.is_evicted());
    }
}
