//! Component G: typed, ergonomic façades over the server RPC surface
//! (`WorkflowClientTrait` and its handles), an interceptor chain, and the
//! `RetryClient` wrapper that gives the raw gRPC seam backoff-on-transient
//! and cached server capability negotiation.

pub mod activity_handle;
pub mod concrete;
pub mod errors;
pub mod interceptor;
pub mod raw;
pub mod retry;
pub mod schedule_client;
pub mod workflow_client;

pub use activity_handle::AsyncActivityHandle;
pub use concrete::WorkflowClient;
pub use errors::ClientError;
pub use interceptor::{build_chain, Interceptor};
pub use raw::WorkflowServiceClient;
pub use retry::{RetryClient, RetryConfig};
pub use schedule_client::{create_schedule, CreateScheduleOptions, ScheduleHandle, ScheduleListStream};
pub use workflow_client::{AsyncActivityId, UpdateHandle, WorkflowClientTrait, WorkflowHandle};
