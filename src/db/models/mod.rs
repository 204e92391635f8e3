pub mod activity;
pub mod group;
pub mod member;

pub use activity::{ActivityContent, ActivityPatch, ActivityRecord, ActivityStatus, ActivityType};
pub use group::Group;
pub use member::{Member, MemberIdentity, MemberRole};
