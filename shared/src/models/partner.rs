//! Delivery partner availability record (read model)

use crate::geo::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A delivery partner availability snapshot from the external directory
///
/// The engine treats this as read-only with a documented freshness bound:
/// a stale record is a tolerated risk, not a correctness violation,
/// because availability is re-checked via an atomic reserve at offer time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerRecord {
    /// Partner unique ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Last reported location
    pub current_location: GeoPoint,
    /// Remaining delivery capacity
    pub capacity: u32,
    /// Whether the partner is currently on a delivery
    pub busy: bool,
    /// When the partner last became available (idle-duration fairness)
    pub available_since: DateTime<Utc>,
    /// When this snapshot was last refreshed
    pub updated_at: DateTime<Utc>,
}

impl PartnerRecord {
    /// Whether this partner can be offered a delivery right now
    pub fn is_offerable(&self) -> bool {
        !self.busy && self.capacity > 0
    }
}
