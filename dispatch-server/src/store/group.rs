//! Group order store

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{GroupOrder, GroupOrderStatus};

/// Versioned group order store
///
/// Structural mutations (membership, status) must happen under the
/// coordinator's per-group lock; the store only guarantees per-entry
/// atomicity and version bumps.
#[derive(Debug, Default)]
pub struct GroupStore {
    groups: DashMap<String, GroupOrder>,
}

impl GroupStore {
    pub fn new() -> Self {
        Self {
            groups: DashMap::new(),
        }
    }

    /// Insert a newly formed group.
    ///
    /// Pre: no group with this id exists (ids are generated, so a clash
    /// is a bug, not contention).
    pub fn insert_new(&self, group: GroupOrder) -> AppResult<()> {
        use dashmap::mapref::entry::Entry;
        match self.groups.entry(group.id.clone()) {
            Entry::Occupied(_) => Err(AppError::already_exists(format!("group {}", group.id))),
            Entry::Vacant(v) => {
                v.insert(group);
                Ok(())
            }
        }
    }

    /// Fetch a snapshot of a group
    pub fn get(&self, id: &str) -> Option<GroupOrder> {
        self.groups.get(id).map(|g| g.clone())
    }

    /// Apply a mutation and bump the version.
    ///
    /// Pre: the group exists; the caller holds the group lock for
    /// structural changes. Post: version incremented by exactly one.
    pub fn update(
        &self,
        id: &str,
        f: impl FnOnce(&mut GroupOrder) -> AppResult<()>,
    ) -> AppResult<GroupOrder> {
        let mut entry = self
            .groups
            .get_mut(id)
            .ok_or_else(|| AppError::new(ErrorCode::GroupNotFound))?;
        let group = entry.value_mut();
        f(group)?;
        group.version += 1;
        Ok(group.clone())
    }

    /// All forming groups (late-join scan)
    pub fn forming(&self) -> Vec<GroupOrder> {
        self.groups
            .iter()
            .filter(|g| g.status == GroupOrderStatus::Forming)
            .map(|g| g.clone())
            .collect()
    }

    /// Forming groups whose formation deadline has passed (sweep scan)
    pub fn forming_past_deadline(&self, now: DateTime<Utc>) -> Vec<GroupOrder> {
        self.groups
            .iter()
            .filter(|g| g.status == GroupOrderStatus::Forming && g.formation_deadline <= now)
            .map(|g| g.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use shared::geo::GeoPoint;

    fn sample_group(id: &str, restaurant: &str, deadline_in_secs: i64) -> GroupOrder {
        let now = Utc::now();
        GroupOrder {
            id: id.to_string(),
            restaurant_id: restaurant.to_string(),
            member_order_ids: vec!["o-1".into()],
            centroid: GeoPoint::new(40.41, -3.70),
            formation_deadline: now + Duration::seconds(deadline_in_secs),
            status: GroupOrderStatus::Forming,
            assigned_partner_id: None,
            created_at: now,
            version: 0,
        }
    }

    #[test]
    fn test_forming_excludes_finalized() {
        let store = GroupStore::new();
        store.insert_new(sample_group("g-1", "r-1", 60)).unwrap();
        let mut finalized = sample_group("g-2", "r-1", 60);
        finalized.status = GroupOrderStatus::Finalized;
        store.insert_new(finalized).unwrap();

        let forming = store.forming();
        assert_eq!(forming.len(), 1);
        assert_eq!(forming[0].id, "g-1");
    }

    #[test]
    fn test_forming_past_deadline() {
        let store = GroupStore::new();
        store.insert_new(sample_group("g-1", "r-1", -5)).unwrap();
        store.insert_new(sample_group("g-2", "r-1", 300)).unwrap();

        let due = store.forming_past_deadline(Utc::now());
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "g-1");
    }

    #[test]
    fn test_update_bumps_version() {
        let store = GroupStore::new();
        store.insert_new(sample_group("g-1", "r-1", 60)).unwrap();
        let updated = store
            .update("g-1", |g| {
                g.member_order_ids.push("o-2".into());
                Ok(())
            })
            .unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.member_count(), 2);
    }
}
