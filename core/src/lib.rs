//! The worker runtime: the data-conversion pipeline (A), the workflow-zone
//! scheduler and replay-safe state machine (D/E), the per-run instance host
//! and cache (F), the activity task pump (C), the outbound RPC queue (B),
//! and the client adaptation that bridges a [`client::WorkflowServiceClient`]
//! into what a worker needs (G-adjacent).

pub mod conversions;
pub mod worker;
pub mod workflow;

pub use worker::CoreWorker;
