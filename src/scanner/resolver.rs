use std::collections::{HashMap, HashSet};

use anyhow::Result;

use crate::{db::models::MemberIdentity, storage::AttendanceStore};

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Known(MemberIdentity),
    /// First sighting of a payload nobody owns; it is now memoized.
    Unknown,
    /// Payload already proven unknown this session; no lookup was made.
    Suppressed,
}

/// Payload -> member resolution for one scanning session.
///
/// Holds the Unknown-Payload Set, which only grows until the session ends,
/// and a read-through identity cache that is dropped for a member whenever
/// that member is toggled.
pub struct Resolver<S> {
    store: S,
    group_id: String,
    unknown: HashSet<String>,
    cache: HashMap<String, MemberIdentity>,
}

impl<S: AttendanceStore> Resolver<S> {
    pub fn new(store: S, group_id: impl Into<String>) -> Self {
        Self {
            store,
            group_id: group_id.into(),
            unknown: HashSet::new(),
            cache: HashMap::new(),
        }
    }

    /// A lookup error is returned as-is and the payload is not memoized, so
    /// a flaky connection never blacklists a valid card.
    pub async fn resolve(&mut self, payload: &str) -> Result<Resolution> {
        if self.unknown.contains(payload) {
            return Ok(Resolution::Suppressed);
        }
        if let Some(identity) = self.cache.get(payload) {
            return Ok(Resolution::Known(identity.clone()));
        }

        match self.store.lookup_member(&self.group_id, payload).await? {
            Some(identity) => {
                self.cache.insert(payload.to_string(), identity.clone());
                Ok(Resolution::Known(identity))
            }
            None => {
                self.unknown.insert(payload.to_string());
                Ok(Resolution::Unknown)
            }
        }
    }

    pub fn invalidate(&mut self, member_id: &str) {
        self.cache.retain(|_, identity| identity.id != member_id);
    }

    #[cfg(test)]
    fn is_unknown(&self, payload: &str) -> bool {
        self.unknown.contains(payload)
    }

    #[cfg(test)]
    fn unknown_count(&self) -> usize {
        self.unknown.len()
    }
}
