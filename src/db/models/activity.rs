//! Activity data models.
//!
//! An activity record is one continuous work session of a member. The
//! attendance toggle creates it in `Running` and later merges
//! `{ status: Done, end_time }` into the same record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    #[default]
    Work,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Work => "work",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ActivityStatus {
    Running,
    Done,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Running => "running",
            ActivityStatus::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityContent {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: ActivityStatus,
    pub memo: String,
}

impl ActivityContent {
    /// Content of a freshly opened work session.
    pub fn started(now: DateTime<Utc>) -> Self {
        Self {
            start_time: now,
            end_time: None,
            status: ActivityStatus::Running,
            memo: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub content: ActivityContent,
    pub member_id: String,
}

impl ActivityRecord {
    pub fn is_running(&self) -> bool {
        self.content.status == ActivityStatus::Running
    }
}

/// Partial content merged into an existing record. `None` fields are left
/// untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPatch {
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<ActivityStatus>,
    pub memo: Option<String>,
}

impl ActivityPatch {
    pub fn finish(now: DateTime<Utc>, memo: Option<String>) -> Self {
        Self {
            end_time: Some(now),
            status: Some(ActivityStatus::Done),
            memo,
        }
    }

    pub fn memo(memo: impl Into<String>) -> Self {
        Self {
            memo: Some(memo.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end_time.is_none() && self.status.is_none() && self.memo.is_none()
    }

    pub fn apply_to(&self, content: &mut ActivityContent) {
        if let Some(end_time) = self.end_time {
            content.end_time = Some(end_time);
        }
        if let Some(status) = self.status {
            content.status = status;
        }
        if let Some(memo) = &self.memo {
            content.memo = memo.clone();
        }
    }
}
