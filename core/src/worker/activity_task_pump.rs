//! Component C: runs user activity functions on a standard parallel
//! executor (ordinary `tokio` tasks — unlike the workflow zone, activity
//! execution has no determinism requirement) with back-pressure, heartbeat
//! throttling, cancellation propagation, and completion reporting.

use crate::conversions::PayloadCodec;
use crate::worker::bridge_queue::BridgeClientQueue;
use crate::worker::client::WorkerClient;
use futures_util::future::BoxFuture;
use sdk_core_protos::activity::{ActivityCancelReason, ActivityExecutionResult, ActivityTask, ActivityTaskCompletion};
use sdk_core_protos::failure::Failure;
use sdk_core_protos::payload::{Headers, Payload};
use sdk_core_protos::{RunId, TaskToken};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;

/// What a registered activity function sees (§4.C "activity execution
/// context").
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityInfo {
    pub task_token: TaskToken,
    pub activity_id: String,
    pub activity_type: String,
    pub workflow_id: String,
    pub workflow_run_id: RunId,
    pub attempt: u32,
    pub heartbeat_details: Vec<Payload>,
    pub scheduled_time: SystemTime,
}

/// Handed to a running activity. Cloning shares the same cancellation
/// signal and heartbeat channel, so activities may fan work out internally
/// and still observe one cancellation.
#[derive(Clone)]
pub struct ActContext {
    pub info: Arc<ActivityInfo>,
    cancel_rx: watch::Receiver<Option<ActivityCancelReason>>,
    heartbeat_tx: mpsc::UnboundedSender<Vec<Payload>>,
}

impl ActContext {
    pub fn heartbeat(&self, details: Vec<Payload>) {
        let _ = self.heartbeat_tx.send(details);
    }

    pub fn cancellation_reason(&self) -> Option<ActivityCancelReason> {
        self.cancel_rx.borrow().clone()
    }

    /// Resolves once the activity has been cancelled, for user code that
    /// wants to `select!` against cancellation instead of polling.
    pub async fn cancelled(&mut self) -> ActivityCancelReason {
        loop {
            if let Some(reason) = self.cancel_rx.borrow().clone() {
                return reason;
            }
            if self.cancel_rx.changed().await.is_err() {
                return ActivityCancelReason::WorkerShutdown;
            }
        }
    }
}

pub trait ActivityFn: Send + Sync {
    fn call(&self, ctx: ActContext, input: Vec<Payload>, headers: Headers) -> BoxFuture<'static, ActivityExecutionResult>;
}

impl<F, Fut> ActivityFn for F
where
    F: Fn(ActContext, Vec<Payload>, Headers) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = ActivityExecutionResult> + Send + 'static,
{
    fn call(&self, ctx: ActContext, input: Vec<Payload>, headers: Headers) -> BoxFuture<'static, ActivityExecutionResult> {
        Box::pin(self(ctx, input, headers))
    }
}

pub type ActivityRegistry = HashMap<String, Arc<dyn ActivityFn>>;

#[derive(Debug, Clone)]
pub struct ActivityTaskPumpConfig {
    pub max_concurrent: usize,
    pub default_heartbeat_throttle_interval: Duration,
    pub max_heartbeat_throttle_interval: Duration,
    pub graceful_shutdown_period: Duration,
}

impl Default for ActivityTaskPumpConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 200,
            default_heartbeat_throttle_interval: Duration::from_secs(30),
            max_heartbeat_throttle_interval: Duration::from_secs(60),
            graceful_shutdown_period: Duration::ZERO,
        }
    }
}

/// `heartbeatTimeout * 0.8`, bounded by `maxHeartbeatThrottleInterval`, or
/// the pump's default when the activity set no heartbeat timeout.
fn throttle_interval(config: &ActivityTaskPumpConfig, heartbeat_timeout: Option<Duration>) -> Duration {
    let wanted = heartbeat_timeout
        .map(|t| t.mul_f64(0.8))
        .unwrap_or(config.default_heartbeat_throttle_interval);
    wanted.min(config.max_heartbeat_throttle_interval)
}

pub struct ActivityTaskPump {
    registry: Arc<ActivityRegistry>,
    codec: Arc<dyn PayloadCodec>,
    bridge: Arc<BridgeClientQueue>,
    config: ActivityTaskPumpConfig,
    permits: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl ActivityTaskPump {
    pub fn new(registry: ActivityRegistry, codec: Arc<dyn PayloadCodec>, bridge: Arc<BridgeClientQueue>, config: ActivityTaskPumpConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registry: Arc::new(registry),
            codec,
            bridge,
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            config,
            shutdown,
        }
    }

    /// Polls `worker` for activity tasks until shutdown is signalled,
    /// dispatching each onto its own `tokio` task. `joined` collects the
    /// per-task handles so `initiate_shutdown` can wait on them.
    pub async fn run(self: Arc<Self>, worker: Arc<dyn WorkerClient>) {
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            let permit = match self.permits.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => { drop(permit); break; }
                polled = worker.poll_activity_task() => {
                    match polled {
                        Ok(task) => {
                            let this = self.clone();
                            let worker = worker.clone();
                            tasks.spawn(async move {
                                this.dispatch(task, worker).await;
                                drop(permit);
                            });
                        }
                        Err(_) => { drop(permit); break; }
                    }
                }
            }
        }
        self.await_grace_period(&mut tasks).await;
    }

    async fn await_grace_period(&self, tasks: &mut JoinSet<()>) {
        if self.config.graceful_shutdown_period.is_zero() {
            tasks.shutdown().await;
            return;
        }
        let deadline = tokio::time::sleep(self.config.graceful_shutdown_period);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                joined = tasks.join_next() => { if joined.is_none() { return; } }
            }
        }
        tasks.shutdown().await;
    }

    pub fn initiate_shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    async fn dispatch(&self, task: ActivityTask, worker: Arc<dyn WorkerClient>) {
        let input = match self.codec.decode(task.input).await {
            Ok(p) => p,
            Err(e) => {
                self.report(
                    &worker,
                    task.task_token,
                    ActivityExecutionResult::Failed(Failure::application("DecodeError", e.to_string(), true)),
                )
                .await;
                return;
            }
        };

        let Some(activity) = self.registry.get(&task.activity_type).cloned() else {
            self.report(
                &worker,
                task.task_token,
                ActivityExecutionResult::Failed(Failure::application(
                    "NotFoundError",
                    format!("no activity registered for type '{}'", task.activity_type),
                    true,
                )),
            )
            .await;
            return;
        };

        let info = Arc::new(ActivityInfo {
            task_token: task.task_token.clone(),
            activity_id: task.activity_id,
            activity_type: task.activity_type,
            workflow_id: task.workflow_id,
            workflow_run_id: RunId(task.workflow_run_id),
            attempt: task.attempt,
            heartbeat_details: task.heartbeat_details,
            scheduled_time: task.scheduled_time,
        });

        let (cancel_tx, cancel_rx) = watch::channel(None);
        let (heartbeat_tx, heartbeat_rx) = mpsc::unbounded_channel();
        let ctx = ActContext { info: info.clone(), cancel_rx, heartbeat_tx };

        let throttle = throttle_interval(&self.config, task.heartbeat_timeout);
        let heartbeat_pump = self.spawn_heartbeat_pump(info.clone(), worker.clone(), heartbeat_rx, throttle, cancel_tx.clone());

        let mut shutdown_rx = self.shutdown.subscribe();
        let watch_shutdown = async move {
            loop {
                if shutdown_rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
                let _ = cancel_tx.send(Some(ActivityCancelReason::WorkerShutdown));
            }
        };

        let result = tokio::select! {
            result = activity.call(ctx, input, task.headers) => result,
            _ = watch_shutdown => unreachable!("watch_shutdown never resolves"),
        };
        heartbeat_pump.abort();

        let result = self.classify_non_retryable(result, &task.non_retryable_error_types);
        if !matches!(result, ActivityExecutionResult::WillCompleteAsync) {
            self.report(&worker, info.task_token.clone(), result).await;
        }
    }

    fn classify_non_retryable(&self, result: ActivityExecutionResult, non_retryable_error_types: &[String]) -> ActivityExecutionResult {
        match result {
            ActivityExecutionResult::Failed(mut f) => {
                if f.is_non_retryable(non_retryable_error_types) {
                    if let sdk_core_protos::failure::FailureInfo::Application { non_retryable, .. } = &mut f.info {
                        *non_retryable = true;
                    }
                }
                ActivityExecutionResult::Failed(f)
            }
            other => other,
        }
    }

    /// Batches heartbeat details at `throttle` and enqueues the RPC through
    /// B. Lives on its own task so a slow or silent activity body never
    /// blocks heartbeat delivery.
    fn spawn_heartbeat_pump(
        &self,
        info: Arc<ActivityInfo>,
        worker: Arc<dyn WorkerClient>,
        mut heartbeat_rx: mpsc::UnboundedReceiver<Vec<Payload>>,
        throttle: Duration,
        cancel_tx: watch::Sender<Option<ActivityCancelReason>>,
    ) -> tokio::task::JoinHandle<()> {
        let bridge = self.bridge.clone();
        tokio::spawn(async move {
            let mut pending: Option<Vec<Payload>> = None;
            let mut interval = tokio::time::interval(throttle);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    details = heartbeat_rx.recv() => {
                        match details {
                            Some(d) => pending = Some(d),
                            None => break,
                        }
                    }
                    _ = interval.tick() => {
                        if let Some(details) = pending.take() {
                            let worker = worker.clone();
                            let token = info.task_token.clone();
                            let cancel_tx = cancel_tx.clone();
                            let _ = bridge.submit(
                                Box::pin(async move {
                                    if let Ok(still_wanted) = worker.record_activity_heartbeat(token, details).await {
                                        if !still_wanted {
                                            let _ = cancel_tx.send(Some(ActivityCancelReason::ServerRequest));
                                        }
                                    }
                                }),
                                || {},
                            );
                        }
                    }
                }
            }
        })
    }

    async fn report(&self, worker: &Arc<dyn WorkerClient>, task_token: TaskToken, result: ActivityExecutionResult) {
        let worker = worker.clone();
        let _ = self.bridge.submit(
            Box::pin(async move {
                let _ = worker.complete_activity_task(ActivityTaskCompletion { task_token, result }).await;
            }),
            || {},
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversions::IdentityCodec;
    use crate::worker::client::MockWorkerClient;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn task(activity_type: &str) -> ActivityTask {
        ActivityTask {
            task_token: TaskToken(b"tok".to_vec()),
            activity_id: "a1".to_string(),
            activity_type: activity_type.to_string(),
            scheduled_event_id: 1,
            started_event_id: 2,
            attempt: 1,
            workflow_id: "wf1".to_string(),
            workflow_run_id: "run1".to_string(),
            input: vec![],
            headers: Headers::new(),
            timeouts: sdk_core_protos::activity::ActivityTaskTimeouts { schedule_to_close: None, schedule_to_start: None, start_to_close: None },
            heartbeat_timeout: Some(Duration::from_secs(10)),
            heartbeat_details: vec![],
            scheduled_time: SystemTime::now(),
            non_retryable_error_types: vec![],
        }
    }

    #[tokio::test]
    async fn unknown_activity_type_completes_not_found() {
        let mut worker = MockWorkerClient::new();
        worker.expect_complete_activity_task().returning(|c| {
            match c.result {
                ActivityExecutionResult::Failed(f) => assert!(matches!(f.info, sdk_core_protos::failure::FailureInfo::Application { ref r#type, .. } if r#type == "NotFoundError")),
                other => panic!("unexpected result: {other:?}"),
            }
            Ok(())
        });
        let bridge = Arc::new(BridgeClientQueue::new());
        let pump = Arc::new(ActivityTaskPump::new(HashMap::new(), Arc::new(IdentityCodec), bridge.clone(), ActivityTaskPumpConfig::default()));
        pump.dispatch(task("DoesNotExist"), Arc::new(worker)).await;
        bridge.shutdown();
    }

    #[tokio::test]
    async fn registered_activity_runs_and_completes() {
        let mut worker = MockWorkerClient::new();
        worker.expect_complete_activity_task().returning(|c| {
            assert_eq!(c.result, ActivityExecutionResult::Completed(None));
            Ok(())
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let mut registry: ActivityRegistry = HashMap::new();
        registry.insert(
            "Echo".to_string(),
            Arc::new(move |_ctx: ActContext, _input: Vec<Payload>, _headers: Headers| {
                calls2.fetch_add(1, Ordering::SeqCst);
                async { ActivityExecutionResult::Completed(None) }
            }),
        );
        let bridge = Arc::new(BridgeClientQueue::new());
        let pump = Arc::new(ActivityTaskPump::new(registry, Arc::new(IdentityCodec), bridge.clone(), ActivityTaskPumpConfig::default()));
        pump.dispatch(task("Echo"), Arc::new(worker)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        bridge.shutdown();
    }

    #[test]
    fn throttle_interval_is_bounded_by_max() {
        let config = ActivityTaskPumpConfig { max_heartbeat_throttle_interval: Duration::from_secs(5), ..Default::default() };
        assert_eq!(throttle_interval(&config, Some(Duration::from_secs(100))), Duration::from_secs(5));
        assert_eq!(throttle_interval(&config, Some(Duration::from_secs(1))), Duration::from_millis(800));
    }
}
