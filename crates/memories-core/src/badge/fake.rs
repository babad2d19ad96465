//! In-memory [`BadgeStore`] for unit tests.

use super::{BadgeId, BadgeStore, PostLikes, StoreError};
use crate::model::{GroupId, PostId};
use chrono::{DateTime, Utc};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct FakeGroup {
    pub created_at: DateTime<Utc>,
    pub like_count: u64,
    pub post_times: Vec<DateTime<Utc>>,
}

impl FakeGroup {
    pub fn created(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            like_count: 0,
            post_times: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub groups: BTreeMap<GroupId, FakeGroup>,
    pub posts: BTreeMap<PostId, PostLikes>,
    pub grants: RefCell<BTreeMap<(GroupId, BadgeId), DateTime<Utc>>>,
    /// Groups whose reads fail with a backend error.
    pub broken: BTreeSet<GroupId>,
    pub fail_inserts: bool,
    pub fail_listing: bool,
    pub calls: Cell<usize>,
}

impl FakeStore {
    pub fn with_group(mut self, id: i64, group: FakeGroup) -> Self {
        self.groups.insert(GroupId::new(id), group);
        self
    }

    pub fn with_post(mut self, id: i64, group_id: i64, like_count: u64) -> Self {
        self.posts.insert(
            PostId::new(id),
            PostLikes {
                group_id: GroupId::new(group_id),
                like_count,
            },
        );
        self
    }

    pub fn granted(&self, group_id: i64, badge: BadgeId) -> bool {
        self.grants
            .borrow()
            .contains_key(&(GroupId::new(group_id), badge))
    }

    pub fn grant_count(&self) -> usize {
        self.grants.borrow().len()
    }

    fn touch(&self, group_id: GroupId) -> Result<(), StoreError> {
        self.calls.set(self.calls.get() + 1);
        if self.broken.contains(&group_id) {
            return Err(StoreError::Backend("injected failure".into()));
        }
        Ok(())
    }

    fn group(&self, group_id: GroupId) -> Result<&FakeGroup, StoreError> {
        self.touch(group_id)?;
        self.groups.get(&group_id).ok_or(StoreError::NotFound {
            entity: "group",
            id: group_id.get(),
        })
    }
}

impl BadgeStore for FakeStore {
    fn count_posts(&self, group_id: GroupId) -> Result<u64, StoreError> {
        self.touch(group_id)?;
        Ok(self
            .groups
            .get(&group_id)
            .map_or(0, |g| u64::try_from(g.post_times.len()).unwrap_or(u64::MAX)))
    }

    fn post_times_between(
        &self,
        group_id: GroupId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        self.touch(group_id)?;
        let mut times: Vec<_> = self
            .groups
            .get(&group_id)
            .map(|g| {
                g.post_times
                    .iter()
                    .copied()
                    .filter(|t| *t >= from && *t <= to)
                    .collect()
            })
            .unwrap_or_default();
        times.sort();
        Ok(times)
    }

    fn group_created_at(&self, group_id: GroupId) -> Result<DateTime<Utc>, StoreError> {
        Ok(self.group(group_id)?.created_at)
    }

    fn group_like_count(&self, group_id: GroupId) -> Result<u64, StoreError> {
        Ok(self.group(group_id)?.like_count)
    }

    fn post_likes(&self, post_id: PostId) -> Result<PostLikes, StoreError> {
        self.calls.set(self.calls.get() + 1);
        self.posts.get(&post_id).copied().ok_or(StoreError::NotFound {
            entity: "post",
            id: post_id.get(),
        })
    }

    fn has_grant(&self, group_id: GroupId, badge: BadgeId) -> Result<bool, StoreError> {
        self.touch(group_id)?;
        Ok(self.grants.borrow().contains_key(&(group_id, badge)))
    }

    fn insert_grant(
        &self,
        group_id: GroupId,
        badge: BadgeId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.group(group_id)?;
        if self.fail_inserts {
            return Err(StoreError::Backend("insert rejected".into()));
        }
        let mut grants = self.grants.borrow_mut();
        if grants.contains_key(&(group_id, badge)) {
            return Err(StoreError::DuplicateGrant { group_id, badge });
        }
        grants.insert((group_id, badge), at);
        Ok(())
    }

    fn list_group_ids(&self) -> Result<Vec<GroupId>, StoreError> {
        if self.fail_listing {
            return Err(StoreError::Backend("listing failed".into()));
        }
        Ok(self.groups.keys().copied().collect())
    }
}
