use crate::errors::ClientError;
use crate::workflow_client::WorkflowClientTrait;
use sdk_core_protos::schedule::{Schedule, ScheduleBackfill, ScheduleDescription, ScheduleListEntry};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CreateScheduleOptions {
    pub trigger_immediately: bool,
    pub backfills: Vec<ScheduleBackfill>,
}

pub async fn create_schedule(
    client: &Arc<dyn WorkflowClientTrait>,
    schedule_id: impl Into<String>,
    schedule: Schedule,
    options: CreateScheduleOptions,
) -> Result<ScheduleHandle, ClientError> {
    let schedule_id = schedule_id.into();
    client
        .create_schedule(schedule_id.clone(), schedule, options.trigger_immediately, options.backfills)
        .await?;
    Ok(ScheduleHandle { client: client.clone(), schedule_id })
}

/// Handle to a single schedule (§4.G "Schedule operations").
pub struct ScheduleHandle {
    client: Arc<dyn WorkflowClientTrait>,
    pub schedule_id: String,
}

impl ScheduleHandle {
    pub async fn describe(&self) -> Result<ScheduleDescription, ClientError> {
        self.client.describe_schedule(self.schedule_id.clone()).await
    }

    /// Reads the current schedule via `describe`, passes it through
    /// `mutator`, and applies the result with optimistic concurrency using
    /// the conflict token `describe` returned. `mutator` returning `None`
    /// cancels the update.
    pub async fn update(&self, mutator: impl FnOnce(Schedule) -> Option<Schedule>) -> Result<(), ClientError> {
        let current = self.describe().await?;
        match mutator(current.schedule) {
            Some(updated) => self.client.apply_schedule_update(self.schedule_id.clone(), updated, current.conflict_token).await,
            None => Err(ClientError::ScheduleUpdateCancelled),
        }
    }

    pub async fn trigger(&self) -> Result<(), ClientError> {
        self.client.trigger_schedule(self.schedule_id.clone()).await
    }

    pub async fn pause(&self, note: Option<String>) -> Result<(), ClientError> {
        self.client.pause_schedule(self.schedule_id.clone(), note).await
    }

    pub async fn unpause(&self, note: Option<String>) -> Result<(), ClientError> {
        self.client.unpause_schedule(self.schedule_id.clone(), note).await
    }

    pub async fn backfill(&self, backfills: Vec<ScheduleBackfill>) -> Result<(), ClientError> {
        self.client.backfill_schedule(self.schedule_id.clone(), backfills).await
    }

    pub async fn delete(&self) -> Result<(), ClientError> {
        self.client.delete_schedule(self.schedule_id.clone()).await
    }
}

/// A lazily-paginated sequence of schedule-list entries (§4.G
/// `listSchedules`). Each call to `next_page` issues one RPC.
pub struct ScheduleListStream {
    client: Arc<dyn WorkflowClientTrait>,
    page_token: Vec<u8>,
    done: bool,
}

impl ScheduleListStream {
    pub fn new(client: Arc<dyn WorkflowClientTrait>) -> Self {
        Self { client, page_token: Vec::new(), done: false }
    }

    pub async fn next_page(&mut self) -> Result<Vec<ScheduleListEntry>, ClientError> {
        if self.done {
            return Ok(Vec::new());
        }
        let (entries, next_token) = self.client.list_schedules(std::mem::take(&mut self.page_token)).await?;
        if next_token.is_empty() {
            self.done = true;
        } else {
            self.page_token = next_token;
        }
        Ok(entries)
    }
}
