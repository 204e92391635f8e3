use anyhow::{Context, Result};
use uuid::Uuid;

use super::AttendanceStore;
use crate::db::{
    models::{ActivityContent, ActivityPatch, ActivityRecord, ActivityType, MemberIdentity},
    Database,
};

impl AttendanceStore for Database {
    async fn lookup_member(&self, group_id: &str, payload: &str) -> Result<Option<MemberIdentity>> {
        let member_id = payload.trim();
        if member_id.is_empty() {
            return Ok(None);
        }
        self.get_member(group_id, member_id)
            .await
            .with_context(|| format!("failed to look up member for payload {member_id:?}"))
    }

    async fn get_latest_activity(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> Result<Option<ActivityRecord>> {
        self.latest_activity(group_id, member_id, ActivityType::Work)
            .await
            .with_context(|| format!("failed to read latest activity of {member_id}"))
    }

    async fn create_activity(
        &self,
        group_id: &str,
        member_id: &str,
        content: ActivityContent,
    ) -> Result<String> {
        let record = ActivityRecord {
            id: Uuid::new_v4().to_string(),
            activity_type: ActivityType::Work,
            content,
            member_id: member_id.to_string(),
        };
        self.insert_activity(group_id, &record)
            .await
            .with_context(|| format!("failed to create activity for {member_id}"))?;
        Ok(record.id)
    }

    async fn patch_activity(
        &self,
        group_id: &str,
        activity_id: &str,
        patch: ActivityPatch,
    ) -> Result<()> {
        self.update_activity(group_id, activity_id, patch)
            .await
            .with_context(|| format!("failed to patch activity {activity_id}"))
    }
}
