//! Member data models.
//!
//! A member lives under `group/{group_id}/member/{id}`; the QR code printed on
//! a member card carries the member id as its payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum MemberRole {
    Admin,
    #[default]
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub name: String,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn new(name: impl Into<String>, role: MemberRole, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            role,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A member record together with its document id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberIdentity {
    pub id: String,
    pub data: Member,
}
