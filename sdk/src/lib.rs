//! The ergonomic, user-facing layer on top of `core`: typed `WfContext`/
//! `ActContext` handles, `Worker::register_wf`/`register_activity`, and the
//! poll loop that drives them. Contains no replay logic of its own — every
//! call here is a thin typed wrapper around a `core` primitive.

mod activity;
mod context;
mod convert;
mod worker;

pub use activity::{ActContext, ActivityCancelReason, ActivityError, ActivityInfo};
pub use context::{
    ActivityOptions, ChildWorkflowHandle, ChildWorkflowOptions, ExternalWorkflowTarget, WfContext, WfError,
};
pub use worker::Worker;

pub use temporal_core::workflow::WorkflowInfo;
pub use core_api::worker::{SlotSupplierOptions, TunerHolder, WorkerConfig, WorkerConfigBuilder};
pub use sdk_core_protos::commands::ActivityCancellationType;
pub use sdk_core_protos::failure::Failure;
pub use sdk_core_protos::retry::RetryPolicy;
