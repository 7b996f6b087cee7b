//! Ties components B, C, F/cache and the client adaptation together into one
//! hosted worker. [`CoreWorker`] has two usage modes, matching the two ways
//! the retrieved `temporalio-bridge`/`temporal-sdk-core` split is actually
//! consumed upstream:
//!
//! - As a [`core_api::Worker`] trait object: `poll_*`/`complete_*` forward
//!   straight to the underlying client, and whoever holds the handle (a
//!   language binding, or a test) is responsible for running user code.
//! - Via [`CoreWorker::run`]: the worker hosts the activity pump and the
//!   workflow cache itself, executing registered Rust functions directly —
//!   the mode this workspace's own `sdk` crate uses.
//!
//! A single worker is only ever driven one way at a time: `run()` polls the
//! same underlying queues the trait methods would, so using both
//! concurrently double-polls.

pub mod activity_task_pump;
pub mod bridge_queue;
pub mod cache;
pub(crate) mod client;

use crate::conversions::PayloadCodec;
use crate::workflow::WfInfoSeed;
use activity_task_pump::{ActivityRegistry, ActivityTaskPump, ActivityTaskPumpConfig};
use async_trait::async_trait;
use bridge_queue::BridgeClientQueue;
use cache::{WorkflowCache, WorkflowInstanceFactory};
use client::{WorkerClient, WorkerClientBag};
use core_api::errors::{CompleteActivityError, CompleteWfError, PollActivityError, PollWfError};
use core_api::worker::WorkerConfig;
use sdk_core_protos::activation::WorkflowActivation;
use sdk_core_protos::activity::{ActivityTask, ActivityTaskCompletion};
use sdk_core_protos::completion::WorkflowActivationCompletion;
use sdk_core_protos::{Payload, TaskToken};
use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::rc::Rc;
use std::sync::Arc;

pub struct CoreWorker<C: ::client::raw::WorkflowServiceClient + 'static> {
    client: Arc<WorkerClientBag<C>>,
    bridge: Arc<BridgeClientQueue>,
    config: WorkerConfig,
}

impl<C: ::client::raw::WorkflowServiceClient + 'static> CoreWorker<C> {
    pub fn new(raw: C, config: WorkerConfig) -> Self {
        let sticky = Some(format!("{}-sticky", config.task_queue));
        Self {
            client: Arc::new(WorkerClientBag::new(raw, config.task_queue.clone(), sticky)),
            bridge: Arc::new(BridgeClientQueue::new()),
            config,
        }
    }

    /// Hosts registered activities (and, via `factory`, workflows) until
    /// shutdown. The workflow loop touches [`crate::workflow::WorkflowInstance`],
    /// which is pinned to a single thread (it's built on `Rc`/`RefCell`, per
    /// D's single-threaded-zone rule), so it runs inside a [`tokio::task::LocalSet`]
    /// rather than being handed to `tokio::spawn`; the activity pump has no
    /// such constraint and schedules its tasks onto the ambient runtime as
    /// usual. Returns once both have wound down.
    pub async fn run(self: Arc<Self>, activities: ActivityRegistry, codec: Arc<dyn PayloadCodec>, workflow_factory: Arc<dyn WorkflowInstanceFactory>) {
        let pump_config = ActivityTaskPumpConfig {
            max_concurrent: self.activity_slot_count(),
            default_heartbeat_throttle_interval: self.config.default_heartbeat_throttle_interval,
            max_heartbeat_throttle_interval: self.config.max_heartbeat_throttle_interval,
            graceful_shutdown_period: self.config.graceful_shutdown_period,
        };
        let pump = Arc::new(ActivityTaskPump::new(activities, codec, self.bridge.clone(), pump_config));
        let cache_capacity = NonZeroUsize::new(self.config.max_cached_workflows.max(1)).expect("max(1) is never zero");

        let bridge = self.bridge.clone();
        let bridge_task = tokio::spawn(async move { bridge.run().await });

        let wf_client = self.client.clone();
        let pump_client = self.client.clone() as Arc<dyn WorkerClient>;
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let cache = Rc::new(RefCell::new(WorkflowCache::new(cache_capacity)));
                tokio::select! {
                    _ = Self::run_workflow_loop(wf_client, cache, workflow_factory) => {}
                    _ = pump.run(pump_client) => {}
                }
            })
            .await;

        self.bridge.shutdown();
        let _ = bridge_task.await;
    }

    fn activity_slot_count(&self) -> usize {
        match &self.config.tuner.activity_slots {
            core_api::worker::SlotSupplierOptions::FixedSize { slots } => *slots,
            core_api::worker::SlotSupplierOptions::ResourceBased { maximum_slots, .. } => *maximum_slots,
        }
    }

    async fn run_workflow_loop(client: Arc<WorkerClientBag<C>>, cache: Rc<RefCell<WorkflowCache>>, factory: Arc<dyn WorkflowInstanceFactory>) {
        loop {
            let activation = match client.poll_workflow_activation().await {
                Ok(a) => a,
                Err(_) => break,
            };
            let workflow_type = workflow_type_of(&activation);
            let run_id = activation.run_id.clone();
            let result = cache.borrow_mut().apply_activation(activation, &workflow_type, WfInfoSeed::default, factory.as_ref());
            let completion = match result {
                Ok(commands) => WorkflowActivationCompletion::ok(run_id, commands),
                Err(e) => WorkflowActivationCompletion::failed(run_id, sdk_core_protos::failure::Failure::application("UnknownWorkflowType", e.to_string(), true)),
            };
            if client.complete_workflow_activation(completion).await.is_err() {
                break;
            }
        }
    }
}

/// `InitializeWorkflow` carries the workflow type; every other job applies
/// against an already-cached instance, so this only needs to look at jobs
/// that could start a fresh run.
fn workflow_type_of(activation: &WorkflowActivation) -> String {
    activation
        .jobs
        .iter()
        .find_map(|j| match j {
            sdk_core_protos::activation::WorkflowActivationJob::InitializeWorkflow { workflow_type, .. } => Some(workflow_type.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

#[async_trait]
impl<C: ::client::raw::WorkflowServiceClient + 'static> core_api::worker::Worker for CoreWorker<C> {
    async fn poll_workflow_activation(&self) -> Result<WorkflowActivation, PollWfError> {
        self.client.poll_workflow_activation().await
    }

    async fn poll_activity_task(&self) -> Result<ActivityTask, PollActivityError> {
        self.client.poll_activity_task().await
    }

    async fn complete_workflow_activation(&self, completion: WorkflowActivationCompletion) -> Result<(), CompleteWfError> {
        self.client.complete_workflow_activation(completion).await
    }

    async fn complete_activity_task(&self, completion: ActivityTaskCompletion) -> Result<(), CompleteActivityError> {
        self.client.complete_activity_task(completion).await
    }

    fn record_activity_heartbeat(&self, task_token: TaskToken, details: Vec<Payload>) {
        let client = self.client.clone();
        tokio::spawn(async move {
            let _ = client.record_activity_heartbeat(task_token, details).await;
        });
    }

    fn request_workflow_eviction(&self, _run_id: &str) {
        // Eviction is driven by `RemoveFromCache` jobs the server schedules
        // into the activation stream; this worker has no separate push
        // channel to the cache from outside that stream.
    }

    fn initiate_shutdown(&self) {
        self.bridge.shutdown();
    }

    async fn finalize_shutdown(&self) {}
}
