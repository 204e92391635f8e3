use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("member {0} already has a running work session")]
    AlreadyRunning(String),
    #[error("member {0} has no running work session")]
    NotRunning(String),
    #[error("operator {operator} may not act on member {member}")]
    Forbidden { operator: String, member: String },
    #[error("member {0} not found")]
    MemberNotFound(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
