//! Hand-written stand-ins for the protobuf message types that would
//! otherwise be generated from the server's and the SDK-bridge's `.proto`
//! files. The shapes here follow the data model the rest of the workspace
//! is specified against; generating them from real `.proto` sources is out
//! of scope (see the protobuf-codegen non-goal).

pub mod activation;
pub mod activity;
pub mod commands;
pub mod completion;
pub mod failure;
pub mod identifiers;
pub mod payload;
pub mod retry;
pub mod schedule;

pub use activation::{WorkflowActivation, WorkflowActivationJob};
pub use activity::{ActivityCancelReason, ActivityExecutionResult, ActivityTask, ActivityTaskCompletion};
pub use commands::WorkflowCommand;
pub use completion::{WorkflowActivationCompletion, WorkflowActivationCompletionStatus};
pub use failure::{Failure, FailureInfo};
pub use identifiers::{RunId, TaskToken, WorkflowExecution};
pub use payload::Payload;
pub use retry::RetryPolicy;

/// A point in time as seen by the workflow zone. Always derived from the
/// activation timestamp, never from the wall clock, so it stays
/// replay-deterministic.
pub type Timestamp = std::time::SystemTime;
