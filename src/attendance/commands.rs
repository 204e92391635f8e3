//! Operator-initiated attendance actions.
//!
//! Scanner-driven toggles bypass this layer; these entry points back the
//! explicit "start" / "end" buttons and the CLI, so they check who is asking.

use serde::{Deserialize, Serialize};

use crate::{
    db::models::{ActivityRecord, MemberIdentity, MemberRole},
    storage::AttendanceStore,
};

use super::{AttendanceError, AttendanceToggle, ToggleOutcome};

/// Whoever is driving the UI right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operator {
    pub member_id: String,
    pub role: MemberRole,
}

impl Operator {
    /// The unattended kiosk console; acts with admin rights.
    pub fn kiosk() -> Self {
        Self {
            member_id: "kiosk".into(),
            role: MemberRole::Admin,
        }
    }

    pub fn from_member(member: &MemberIdentity) -> Self {
        Self {
            member_id: member.id.clone(),
            role: member.data.role,
        }
    }

    pub fn may_act_on(&self, member_id: &str) -> bool {
        self.role == MemberRole::Admin || self.member_id == member_id
    }
}

async fn authorize<S: AttendanceStore + Clone>(
    toggle: &AttendanceToggle<S>,
    operator: &Operator,
    group_id: &str,
    member_id: &str,
) -> Result<MemberIdentity, AttendanceError> {
    if !operator.may_act_on(member_id) {
        return Err(AttendanceError::Forbidden {
            operator: operator.member_id.clone(),
            member: member_id.to_string(),
        });
    }

    toggle
        .store()
        .lookup_member(group_id, member_id)
        .await?
        .ok_or_else(|| AttendanceError::MemberNotFound(member_id.to_string()))
}

pub async fn start_work<S: AttendanceStore + Clone>(
    toggle: &AttendanceToggle<S>,
    operator: &Operator,
    group_id: &str,
    member_id: &str,
) -> Result<ActivityRecord, AttendanceError> {
    authorize(toggle, operator, group_id, member_id).await?;
    toggle.start(group_id, member_id).await
}

pub async fn end_work<S: AttendanceStore + Clone>(
    toggle: &AttendanceToggle<S>,
    operator: &Operator,
    group_id: &str,
    member_id: &str,
    memo: Option<String>,
) -> Result<ActivityRecord, AttendanceError> {
    authorize(toggle, operator, group_id, member_id).await?;
    toggle.end(group_id, member_id, memo).await
}

pub async fn toggle_work<S: AttendanceStore + Clone>(
    toggle: &AttendanceToggle<S>,
    operator: &Operator,
    group_id: &str,
    member_id: &str,
) -> Result<ToggleOutcome, AttendanceError> {
    authorize(toggle, operator, group_id, member_id).await?;
    toggle.toggle(group_id, member_id).await
}
