use crate::payload::Payload;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleStartWorkflowAction {
    pub workflow_type: String,
    pub workflow_id: String,
    pub task_queue: String,
    pub input: Vec<Payload>,
    pub memo: HashMap<String, Payload>,
    pub search_attributes: HashMap<String, Payload>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleAction {
    StartWorkflow(ScheduleStartWorkflowAction),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalendarSpec {
    pub second: String,
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month: String,
    pub day_of_week: String,
    pub year: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntervalSpec {
    pub every: Duration,
    pub offset: Duration,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScheduleSpec {
    pub calendars: Vec<CalendarSpec>,
    pub intervals: Vec<IntervalSpec>,
    pub cron: Vec<String>,
    pub skip: Vec<CalendarSpec>,
    pub start_at: Option<SystemTime>,
    pub end_at: Option<SystemTime>,
    pub jitter: Option<Duration>,
    pub time_zone: Option<String>,
}

impl Default for IntervalSpec {
    fn default() -> Self {
        Self { every: Duration::from_secs(60), offset: Duration::ZERO }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapPolicy {
    Skip,
    BufferOne,
    BufferAll,
    CancelOther,
    TerminateOther,
    AllowAll,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulePolicy {
    pub overlap: OverlapPolicy,
    pub catchup_window: Option<Duration>,
    pub pause_on_failure: bool,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self { overlap: OverlapPolicy::Skip, catchup_window: None, pause_on_failure: false }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScheduleState {
    pub note: Option<String>,
    pub paused: bool,
    pub limited_actions: bool,
    pub remaining_actions: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub action: ScheduleAction,
    pub spec: ScheduleSpec,
    pub policy: SchedulePolicy,
    pub state: ScheduleState,
}

/// A single manual-trigger-outside-spec execution request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleBackfill {
    pub start_at: SystemTime,
    pub end_at: SystemTime,
    pub overlap: Option<OverlapPolicy>,
}

/// Opaque optimistic-concurrency token returned by `describe`/`list` and
/// required by `update`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConflictToken(pub Vec<u8>);

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleDescription {
    pub schedule: Schedule,
    pub conflict_token: ConflictToken,
    pub num_actions: u64,
    pub running_workflows: Vec<crate::identifiers::WorkflowExecution>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleListEntry {
    pub schedule_id: String,
    pub spec: ScheduleSpec,
    pub workflow_type: String,
    pub paused: bool,
    pub note: Option<String>,
}
