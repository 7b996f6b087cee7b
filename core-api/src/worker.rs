use crate::errors::{CompleteActivityError, CompleteWfError, PollActivityError, PollWfError};
use async_trait::async_trait;
use derive_builder::Builder;
use sdk_core_protos::{ActivityTask, ActivityTaskCompletion, WorkflowActivation, WorkflowActivationCompletion};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::errors::WorkflowErrorType;

/// Capacity knobs for one of the three slot pools a worker manages
/// (workflow tasks, activities, local activities).
#[derive(Debug, Clone, PartialEq)]
pub enum SlotSupplierOptions {
    FixedSize { slots: usize },
    ResourceBased { minimum_slots: usize, maximum_slots: usize, ramp_throttle: Duration },
}

impl Default for SlotSupplierOptions {
    fn default() -> Self {
        Self::FixedSize { slots: 100 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TunerHolder {
    pub workflow_slots: SlotSupplierOptions,
    pub activity_slots: SlotSupplierOptions,
    pub local_activity_slots: SlotSupplierOptions,
}

/// Configuration for hosting one worker against one task queue. Grounded on
/// the `WorkerConfigBuilder` usage pattern in the retrieved bridge worker
/// code (`temporalio-bridge/src/worker.rs`).
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct WorkerConfig {
    pub namespace: String,
    pub task_queue: String,
    #[builder(default = "\"unversioned\".to_string()")]
    pub worker_build_id: String,
    #[builder(default)]
    pub client_identity_override: Option<String>,
    #[builder(default = "1000")]
    pub max_cached_workflows: usize,
    #[builder(default)]
    pub tuner: TunerHolder,
    #[builder(default = "5")]
    pub max_concurrent_wft_polls: usize,
    #[builder(default = "5")]
    pub max_concurrent_at_polls: usize,
    #[builder(default = "0.5")]
    pub nonsticky_to_sticky_poll_ratio: f32,
    #[builder(default = "false")]
    pub no_remote_activities: bool,
    #[builder(default = "Duration::from_secs(10)")]
    pub sticky_queue_schedule_to_start_timeout: Duration,
    #[builder(default = "Duration::from_secs(60)")]
    pub max_heartbeat_throttle_interval: Duration,
    #[builder(default = "Duration::from_secs(30)")]
    pub default_heartbeat_throttle_interval: Duration,
    #[builder(default)]
    pub max_worker_activities_per_second: Option<f64>,
    #[builder(default)]
    pub max_task_queue_activities_per_second: Option<f64>,
    #[builder(default = "Duration::from_secs(0)")]
    pub graceful_shutdown_period: Duration,
    #[builder(default = "false")]
    pub use_worker_versioning: bool,
    #[builder(default)]
    pub workflow_failure_errors: HashSet<WorkflowErrorType>,
    #[builder(default)]
    pub workflow_types_to_failure_errors: HashMap<String, HashSet<WorkflowErrorType>>,
}

impl WorkerConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.namespace.as_ref().map(|s| s.is_empty()).unwrap_or(true) {
            return Err("namespace must not be empty".to_string());
        }
        if self.task_queue.as_ref().map(|s| s.is_empty()).unwrap_or(true) {
            return Err("task_queue must not be empty".to_string());
        }
        Ok(())
    }
}

/// Minimal mocking surface for a hosted worker, as consumed by a bridge
/// layer (e.g. a language binding) or by the `sdk` crate's `Worker` wrapper.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn poll_workflow_activation(&self) -> Result<WorkflowActivation, PollWfError>;
    async fn poll_activity_task(&self) -> Result<ActivityTask, PollActivityError>;
    async fn complete_workflow_activation(
        &self,
        completion: WorkflowActivationCompletion,
    ) -> Result<(), CompleteWfError>;
    async fn complete_activity_task(
        &self,
        completion: ActivityTaskCompletion,
    ) -> Result<(), CompleteActivityError>;
    fn record_activity_heartbeat(&self, task_token: sdk_core_protos::TaskToken, details: Vec<sdk_core_protos::Payload>);
    fn request_workflow_eviction(&self, run_id: &str);
    fn initiate_shutdown(&self);
    async fn finalize_shutdown(&self);
}

/// Injected metrics collaborator (see SPEC_FULL §12); no-op by default so
/// the core never depends on a concrete metrics registry.
pub trait MetricsSink: Send + Sync {
    fn wf_completed(&self) {}
    fn wf_failed(&self) {}
    fn wf_canceled(&self) {}
    fn wf_continued_as_new(&self) {}
    fn wf_task_replay_latency(&self, _d: Duration) {}
    fn wf_e2e_latency(&self, _d: Duration) {}
    fn sticky_cache_miss(&self) {}
    fn sticky_cache_hit(&self) {}
    fn act_heartbeat_sent(&self) {}
}

#[derive(Default)]
pub struct NoopMetrics;
impl MetricsSink for NoopMetrics {}
