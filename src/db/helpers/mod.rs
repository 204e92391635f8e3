use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::db::models::{ActivityStatus, ActivityType, MemberRole};

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_activity_status(value: &str) -> Result<ActivityStatus> {
    match value {
        "running" => Ok(ActivityStatus::Running),
        "done" => Ok(ActivityStatus::Done),
        other => Err(anyhow!("unknown activity status {other}")),
    }
}

pub fn parse_activity_type(value: &str) -> Result<ActivityType> {
    match value {
        "work" => Ok(ActivityType::Work),
        other => Err(anyhow!("unknown activity type {other}")),
    }
}

pub fn parse_role(value: &str) -> Result<MemberRole> {
    match value {
        "admin" => Ok(MemberRole::Admin),
        "member" => Ok(MemberRole::Member),
        other => Err(anyhow!("unknown member role {other}")),
    }
}
