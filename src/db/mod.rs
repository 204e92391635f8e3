mod connection;
pub mod helpers;
mod migrations;
pub mod models;
pub mod repositories;

pub use connection::Database;
pub use models::{
    ActivityContent, ActivityPatch, ActivityRecord, ActivityStatus, ActivityType, Group, Member,
    MemberIdentity, MemberRole,
};
