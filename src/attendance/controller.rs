use std::sync::Arc;

use chrono::Utc;
use log::info;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    db::models::{ActivityContent, ActivityPatch, ActivityRecord, ActivityType},
    storage::AttendanceStore,
};

use super::{AttendanceError, AttendanceState, Transition};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "activity")]
pub enum ToggleOutcome {
    Started(ActivityRecord),
    Finished(ActivityRecord),
}

impl ToggleOutcome {
    pub fn record(&self) -> &ActivityRecord {
        match self {
            ToggleOutcome::Started(record) | ToggleOutcome::Finished(record) => record,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, ToggleOutcome::Started(_))
    }
}

/// Per-member `NoActivity <-> Running` state machine over work activities.
///
/// Every transition re-reads the member's latest activity right before
/// writing, and all writes through one toggle (and its clones) are
/// serialized, so a single process never opens two sessions for a member.
/// Failed writes leave nothing behind: the next read sees the prior state.
#[derive(Clone)]
pub struct AttendanceToggle<S> {
    store: S,
    write_lock: Arc<Mutex<()>>,
}

impl<S: AttendanceStore + Clone> AttendanceToggle<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn state_of(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> Result<AttendanceState, AttendanceError> {
        let latest = self.store.get_latest_activity(group_id, member_id).await?;
        Ok(AttendanceState::from_latest(latest.as_ref()))
    }

    /// Start work when idle, finish the open session otherwise.
    pub async fn toggle(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> Result<ToggleOutcome, AttendanceError> {
        let _guard = self.write_lock.lock().await;
        let latest = self.store.get_latest_activity(group_id, member_id).await?;

        match AttendanceState::from_latest(latest.as_ref()).toggle() {
            Transition::Start => self
                .begin(group_id, member_id)
                .await
                .map(ToggleOutcome::Started),
            Transition::Finish { .. } => {
                let open = latest.ok_or_else(|| AttendanceError::NotRunning(member_id.into()))?;
                self.finish(group_id, open, None)
                    .await
                    .map(ToggleOutcome::Finished)
            }
        }
    }

    pub async fn start(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> Result<ActivityRecord, AttendanceError> {
        let _guard = self.write_lock.lock().await;
        let latest = self.store.get_latest_activity(group_id, member_id).await?;
        if AttendanceState::from_latest(latest.as_ref()).is_running() {
            return Err(AttendanceError::AlreadyRunning(member_id.to_string()));
        }
        self.begin(group_id, member_id).await
    }

    pub async fn end(
        &self,
        group_id: &str,
        member_id: &str,
        memo: Option<String>,
    ) -> Result<ActivityRecord, AttendanceError> {
        let _guard = self.write_lock.lock().await;
        match self.store.get_latest_activity(group_id, member_id).await? {
            Some(open) if open.is_running() => self.finish(group_id, open, memo).await,
            _ => Err(AttendanceError::NotRunning(member_id.to_string())),
        }
    }

    async fn begin(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> Result<ActivityRecord, AttendanceError> {
        let content = ActivityContent::started(Utc::now());
        let id = self
            .store
            .create_activity(group_id, member_id, content.clone())
            .await?;

        info!("Member {member_id} started work (activity {id})");

        Ok(ActivityRecord {
            id,
            activity_type: ActivityType::Work,
            content,
            member_id: member_id.to_string(),
        })
    }

    async fn finish(
        &self,
        group_id: &str,
        mut open: ActivityRecord,
        memo: Option<String>,
    ) -> Result<ActivityRecord, AttendanceError> {
        let patch = ActivityPatch::finish(Utc::now(), memo);
        self.store
            .patch_activity(group_id, &open.id, patch.clone())
            .await?;

        patch.apply_to(&mut open.content);
        info!(
            "Member {} finished work (activity {})",
            open.member_id, open.id
        );
        Ok(open)
    }
}
