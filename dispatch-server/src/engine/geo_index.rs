//! Spatial index for merge candidates and available partners
//!
//! One index instance serves one entity family: the engine holds an
//! order index (unclaimed mergeable orders by delivery address) and a
//! partner index (offerable partners by last reported location).
//! Entries carry the time they became eligible so radius queries can
//! break distance ties by seniority.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use shared::geo::GeoPoint;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct IndexEntry {
    point: GeoPoint,
    since: DateTime<Utc>,
}

/// An id returned by a radius query, with its distance from the center
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyHit {
    pub id: String,
    pub distance_km: f64,
    pub since: DateTime<Utc>,
}

/// In-memory point index guarded by a `parking_lot::RwLock`.
///
/// Queries take the read lock and scan; insert/remove take the write
/// lock briefly. Lock order: index operations happen before or after
/// cluster/group lock sections, never inside them.
#[derive(Debug, Default)]
pub struct GeoIndex {
    entries: RwLock<HashMap<String, IndexEntry>>,
}

impl GeoIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or refresh an entry. Re-inserting moves the point but
    /// keeps the original `since` so seniority is preserved.
    pub fn insert(&self, id: impl Into<String>, point: GeoPoint, since: DateTime<Utc>) {
        let id = id.into();
        let mut entries = self.entries.write();
        let since = entries.get(&id).map(|e| e.since).unwrap_or(since);
        entries.insert(id, IndexEntry { point, since });
    }

    /// Remove an entry; returns whether it was present.
    pub fn remove(&self, id: &str) -> bool {
        self.entries.write().remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All entries within `radius_km` of `center`, closest first;
    /// equal distances break toward the earliest `since`.
    pub fn query(&self, center: GeoPoint, radius_km: f64) -> Vec<NearbyHit> {
        let entries = self.entries.read();
        let mut hits: Vec<NearbyHit> = entries
            .iter()
            .filter_map(|(id, entry)| {
                let distance_km = center.distance_km(&entry.point);
                (distance_km <= radius_km).then(|| NearbyHit {
                    id: id.clone(),
                    distance_km,
                    since: entry.since,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.since.cmp(&b.since))
        });
        hits
    }

    /// Snapshot of all indexed ids (sweep scans)
    pub fn ids(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Drop every entry (startup rebuild)
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
