use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A group whose members clock in and out together (a lab, a club, a shift).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
