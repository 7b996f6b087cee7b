//! Components D, E, F: the single-threaded workflow-zone scheduler, the
//! replay-safe state machine it drives, and the per-run instance host that
//! ties a registered workflow's handlers to both.

pub mod instance;
pub mod machines;
pub mod task_executor;

pub use instance::{WfHandles, WfInfoSeed, WorkflowHandlers, WorkflowInfo, WorkflowInstance, WorkflowRegistration};
pub use machines::{CommandId, ConditionOutcome, WorkflowMachines, WorkflowMachinesError};
pub use task_executor::{TaskHandle, WorkflowTaskExecutor};
