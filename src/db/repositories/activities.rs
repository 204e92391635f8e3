use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{
        format_datetime, parse_activity_status, parse_activity_type, parse_datetime,
        parse_optional_datetime,
    },
    models::{ActivityContent, ActivityPatch, ActivityRecord, ActivityStatus, ActivityType},
};

const ACTIVITY_COLUMNS: &str = "id, member_id, type, start_time, end_time, status, memo";

fn row_to_activity(row: &Row) -> Result<ActivityRecord> {
    let activity_type: String = row.get("type")?;
    let start_time: String = row.get("start_time")?;
    let end_time: Option<String> = row.get("end_time")?;
    let status: String = row.get("status")?;

    Ok(ActivityRecord {
        id: row.get("id")?,
        activity_type: parse_activity_type(&activity_type)?,
        content: ActivityContent {
            start_time: parse_datetime(&start_time, "start_time")?,
            end_time: parse_optional_datetime(end_time, "end_time")?,
            status: parse_activity_status(&status)?,
            memo: row.get("memo")?,
        },
        member_id: row.get("member_id")?,
    })
}

impl Database {
    pub async fn insert_activity(&self, group_id: &str, record: &ActivityRecord) -> Result<()> {
        let group_id = group_id.to_string();
        let record = record.clone();
        self.execute(move |conn| {
            let now = format_datetime(&Utc::now());
            conn.execute(
                "INSERT INTO activities (id, group_id, member_id, type, start_time, end_time, status, memo, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.id,
                    group_id,
                    record.member_id,
                    record.activity_type.as_str(),
                    format_datetime(&record.content.start_time),
                    record.content.end_time.as_ref().map(format_datetime),
                    record.content.status.as_str(),
                    record.content.memo,
                    now,
                    now,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Most recent activity of `activity_type` for a member, by start time.
    pub async fn latest_activity(
        &self,
        group_id: &str,
        member_id: &str,
        activity_type: ActivityType,
    ) -> Result<Option<ActivityRecord>> {
        let group_id = group_id.to_string();
        let member_id = member_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ACTIVITY_COLUMNS} FROM activities
                 WHERE group_id = ?1 AND member_id = ?2 AND type = ?3
                 ORDER BY start_time DESC, rowid DESC
                 LIMIT 1"
            ))?;
            let record = stmt
                .query_row(
                    params![group_id, member_id, activity_type.as_str()],
                    |row| Ok(row_to_activity(row)),
                )
                .optional()?
                .transpose()?;
            Ok(record)
        })
        .await
    }

    pub async fn get_activity(
        &self,
        group_id: &str,
        activity_id: &str,
    ) -> Result<Option<ActivityRecord>> {
        let group_id = group_id.to_string();
        let activity_id = activity_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE group_id = ?1 AND id = ?2"
            ))?;
            let record = stmt
                .query_row(params![group_id, activity_id], |row| {
                    Ok(row_to_activity(row))
                })
                .optional()?
                .transpose()?;
            Ok(record)
        })
        .await
    }

    /// Merge `patch` into an existing activity. Only the fields present in the
    /// patch are written.
    pub async fn update_activity(
        &self,
        group_id: &str,
        activity_id: &str,
        patch: ActivityPatch,
    ) -> Result<()> {
        if patch.is_empty() {
            bail!("No fields to update");
        }

        let group_id = group_id.to_string();
        let activity_id = activity_id.to_string();
        self.execute(move |conn| {
            let mut updates = Vec::new();
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(end_time) = patch.end_time {
                updates.push("end_time = ?");
                params_vec.push(Box::new(format_datetime(&end_time)));
            }
            if let Some(status) = patch.status {
                updates.push("status = ?");
                params_vec.push(Box::new(status.as_str()));
            }
            if let Some(memo) = patch.memo {
                updates.push("memo = ?");
                params_vec.push(Box::new(memo));
            }

            updates.push("updated_at = ?");
            params_vec.push(Box::new(format_datetime(&Utc::now())));

            let query = format!(
                "UPDATE activities SET {} WHERE group_id = ? AND id = ?",
                updates.join(", ")
            );
            params_vec.push(Box::new(group_id));
            params_vec.push(Box::new(activity_id));

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();

            let rows_affected = conn.execute(&query, params_refs.as_slice())?;
            if rows_affected == 0 {
                return Err(anyhow!("Activity not found"));
            }
            Ok(())
        })
        .await
    }

    /// Memo edits are allowed on finished sessions too.
    pub async fn update_activity_memo(
        &self,
        group_id: &str,
        activity_id: &str,
        memo: String,
    ) -> Result<ActivityRecord> {
        self.update_activity(group_id, activity_id, ActivityPatch::memo(memo))
            .await?;
        self.get_activity(group_id, activity_id)
            .await?
            .ok_or_else(|| anyhow!("Activity not found"))
    }

    /// Newest first.
    pub async fn list_activities_for_member(
        &self,
        group_id: &str,
        member_id: &str,
        limit: usize,
    ) -> Result<Vec<ActivityRecord>> {
        let group_id = group_id.to_string();
        let member_id = member_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ACTIVITY_COLUMNS} FROM activities
                 WHERE group_id = ?1 AND member_id = ?2
                 ORDER BY start_time DESC, rowid DESC
                 LIMIT ?3"
            ))?;

            let mut rows = stmt.query(params![group_id, member_id, limit])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_activity(row)?);
            }
            Ok(records)
        })
        .await
    }

    /// Everyone currently clocked in, oldest session first.
    pub async fn list_running_activities(&self, group_id: &str) -> Result<Vec<ActivityRecord>> {
        let group_id = group_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ACTIVITY_COLUMNS} FROM activities
                 WHERE group_id = ?1 AND status = ?2
                 ORDER BY start_time ASC"
            ))?;

            let mut rows = stmt.query(params![group_id, ActivityStatus::Running.as_str()])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_activity(row)?);
            }
            Ok(records)
        })
        .await
    }
}
