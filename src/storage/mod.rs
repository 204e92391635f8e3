//! Storage seam used by the attendance core.
//!
//! The scanner and the attendance toggle only ever talk to an
//! [`AttendanceStore`]; every call is scoped to one group. [`Database`] is the
//! SQLite adapter, tests use an in-memory mock.
//!
//! [`Database`]: crate::db::Database

mod sqlite;
#[cfg(test)]
pub(crate) mod testing;

use std::{future::Future, sync::Arc};

use anyhow::Result;

use crate::db::models::{ActivityContent, ActivityPatch, ActivityRecord, MemberIdentity};

pub trait AttendanceStore: Send + Sync + 'static {
    /// Resolve a scanned payload to a member of the group. `Ok(None)` means the
    /// payload definitely does not belong to anyone.
    fn lookup_member(
        &self,
        group_id: &str,
        payload: &str,
    ) -> impl Future<Output = Result<Option<MemberIdentity>>> + Send;

    /// Latest work activity of the member, running or not.
    fn get_latest_activity(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> impl Future<Output = Result<Option<ActivityRecord>>> + Send;

    /// Append a new work activity and return its id.
    fn create_activity(
        &self,
        group_id: &str,
        member_id: &str,
        content: ActivityContent,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Merge `patch` into an existing activity.
    fn patch_activity(
        &self,
        group_id: &str,
        activity_id: &str,
        patch: ActivityPatch,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl<S: AttendanceStore> AttendanceStore for Arc<S> {
    fn lookup_member(
        &self,
        group_id: &str,
        payload: &str,
    ) -> impl Future<Output = Result<Option<MemberIdentity>>> + Send {
        (**self).lookup_member(group_id, payload)
    }

    fn get_latest_activity(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> impl Future<Output = Result<Option<ActivityRecord>>> + Send {
        (**self).get_latest_activity(group_id, member_id)
    }

    fn create_activity(
        &self,
        group_id: &str,
        member_id: &str,
        content: ActivityContent,
    ) -> impl Future<Output = Result<String>> + Send {
        (**self).create_activity(group_id, member_id, content)
    }

    fn patch_activity(
        &self,
        group_id: &str,
        activity_id: &str,
        patch: ActivityPatch,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).patch_activity(group_id, activity_id, patch)
    }
}
