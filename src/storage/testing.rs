//! In-memory [`AttendanceStore`] that records every call.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use anyhow::{anyhow, bail, Result};
use chrono::Utc;

use super::AttendanceStore;
use crate::db::models::{
    ActivityContent, ActivityPatch, ActivityRecord, ActivityType, Member, MemberIdentity,
    MemberRole,
};

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    LookupMember(String),
    GetLatestActivity(String),
    CreateActivity {
        member_id: String,
        content: ActivityContent,
    },
    PatchActivity {
        activity_id: String,
        patch: ActivityPatch,
    },
}

#[derive(Default)]
struct MockState {
    members: HashMap<String, MemberIdentity>,
    activities: Vec<ActivityRecord>,
    calls: Vec<StoreCall>,
    fail_lookups: bool,
    fail_writes: bool,
    next_id: u32,
}

#[derive(Default)]
pub struct MockStore {
    state: Mutex<MockState>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn with_member(self, id: &str, name: &str) -> Self {
        self.with_member_role(id, name, MemberRole::Member)
    }

    pub fn with_member_role(self, id: &str, name: &str, role: MemberRole) -> Self {
        let identity = MemberIdentity {
            id: id.to_string(),
            data: Member::new(name, role, Utc::now()),
        };
        self.state().members.insert(id.to_string(), identity);
        self
    }

    pub fn with_activity(self, record: ActivityRecord) -> Self {
        self.state().activities.push(record);
        self
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.state().fail_lookups = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    pub fn lookups_for(&self, payload: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, StoreCall::LookupMember(p) if p == payload))
            .count()
    }

    pub fn creates(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, StoreCall::CreateActivity { .. }))
            .collect()
    }

    pub fn patches(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, StoreCall::PatchActivity { .. }))
            .collect()
    }

    pub fn activities(&self) -> Vec<ActivityRecord> {
        self.state().activities.clone()
    }

    pub fn running_count(&self, member_id: &str) -> usize {
        self.state()
            .activities
            .iter()
            .filter(|record| record.member_id == member_id && record.is_running())
            .count()
    }
}

impl AttendanceStore for MockStore {
    async fn lookup_member(
        &self,
        _group_id: &str,
        payload: &str,
    ) -> Result<Option<MemberIdentity>> {
        let mut state = self.state();
        state.calls.push(StoreCall::LookupMember(payload.to_string()));
        if state.fail_lookups {
            bail!("lookup unavailable");
        }
        Ok(state.members.get(payload).cloned())
    }

    async fn get_latest_activity(
        &self,
        _group_id: &str,
        member_id: &str,
    ) -> Result<Option<ActivityRecord>> {
        let mut state = self.state();
        state
            .calls
            .push(StoreCall::GetLatestActivity(member_id.to_string()));
        Ok(state
            .activities
            .iter()
            .rev()
            .find(|record| record.member_id == member_id)
            .cloned())
    }

    async fn create_activity(
        &self,
        _group_id: &str,
        member_id: &str,
        content: ActivityContent,
    ) -> Result<String> {
        let mut state = self.state();
        state.calls.push(StoreCall::CreateActivity {
            member_id: member_id.to_string(),
            content: content.clone(),
        });
        if state.fail_writes {
            bail!("write rejected");
        }
        state.next_id += 1;
        let id = format!("act-new-{}", state.next_id);
        state.activities.push(ActivityRecord {
            id: id.clone(),
            activity_type: ActivityType::Work,
            content,
            member_id: member_id.to_string(),
        });
        Ok(id)
    }

    async fn patch_activity(
        &self,
        _group_id: &str,
        activity_id: &str,
        patch: ActivityPatch,
    ) -> Result<()> {
        let mut state = self.state();
        state.calls.push(StoreCall::PatchActivity {
            activity_id: activity_id.to_string(),
            patch: patch.clone(),
        });
        if state.fail_writes {
            bail!("write rejected");
        }
        let record = state
            .activities
            .iter_mut()
            .find(|record| record.id == activity_id)
            .ok_or_else(|| anyhow!("activity {activity_id} not found"))?;
        patch.apply_to(&mut record.content);
        Ok(())
    }
}
