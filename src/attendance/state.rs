use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::models::ActivityRecord;

/// Attendance state of one member, derived from their latest work activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum AttendanceState {
    NoActivity,
    Running {
        activity_id: String,
        started_at: DateTime<Utc>,
    },
}

/// What the toggle must write to move out of the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Start,
    Finish { activity_id: String },
}

impl AttendanceState {
    pub fn from_latest(latest: Option<&ActivityRecord>) -> Self {
        match latest {
            Some(record) if record.is_running() => AttendanceState::Running {
                activity_id: record.id.clone(),
                started_at: record.content.start_time,
            },
            _ => AttendanceState::NoActivity,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, AttendanceState::Running { .. })
    }

    pub fn toggle(&self) -> Transition {
        match self {
            AttendanceState::NoActivity => Transition::Start,
            AttendanceState::Running { activity_id, .. } => Transition::Finish {
                activity_id: activity_id.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ActivityContent, ActivityPatch, ActivityType};

    fn record(running: bool) -> ActivityRecord {
        let now = Utc::now();
        let mut content = ActivityContent::started(now);
        if !running {
            ActivityPatch::finish(now, None).apply_to(&mut content);
        }
        ActivityRecord {
            id: "act-7".into(),
            activity_type: ActivityType::Work,
            content,
            member_id: "member-42".into(),
        }
    }

    #[test]
    fn missing_or_finished_record_means_no_activity() {
        assert_eq!(AttendanceState::from_latest(None), AttendanceState::NoActivity);
        assert_eq!(
            AttendanceState::from_latest(Some(&record(false))),
            AttendanceState::NoActivity
        );
        assert_eq!(AttendanceState::NoActivity.toggle(), Transition::Start);
    }

    #[test]
    fn running_record_toggles_to_finish_of_same_id() {
        let state = AttendanceState::from_latest(Some(&record(true)));
        assert!(state.is_running());
        assert_eq!(
            state.toggle(),
            Transition::Finish {
                activity_id: "act-7".into()
            }
        );
    }
}
