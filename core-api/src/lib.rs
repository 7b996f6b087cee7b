//! Trait surface and configuration shared between the worker runtime
//! (`core`) and anything that hosts it (a language bridge, or this
//! workspace's own `sdk` crate). Contains no I/O of its own.

pub mod errors;
pub mod worker;

pub use worker::{MetricsSink, NoopMetrics, TunerHolder, Worker, WorkerConfig, WorkerConfigBuilder};
