//! Consolidated group order model

use crate::geo::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Group order lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupOrderStatus {
    /// Accepting compatible members until deadline or size cap
    Forming,
    /// Membership frozen, awaiting partner assignment
    Finalized,
    /// A partner accepted the delivery
    Assigned,
    /// Partner picked up and is delivering
    InTransit,
    /// All member orders delivered (terminal)
    Completed,
    /// Assignment failed or group abandoned; members re-queued (terminal)
    Disbanded,
}

impl GroupOrderStatus {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, GroupOrderStatus::Completed | GroupOrderStatus::Disbanded)
    }

    /// Membership is mutable only while forming
    pub const fn accepts_members(&self) -> bool {
        matches!(self, GroupOrderStatus::Forming)
    }

    /// Valid forward transitions; DISBANDED is reachable until the group
    /// is in transit.
    pub const fn can_transition_to(&self, next: GroupOrderStatus) -> bool {
        if matches!(next, GroupOrderStatus::Disbanded) {
            return matches!(
                self,
                GroupOrderStatus::Forming
                    | GroupOrderStatus::Finalized
                    | GroupOrderStatus::Assigned
            );
        }
        matches!(
            (self, next),
            (GroupOrderStatus::Forming, GroupOrderStatus::Finalized)
                | (GroupOrderStatus::Finalized, GroupOrderStatus::Assigned)
                | (GroupOrderStatus::Assigned, GroupOrderStatus::InTransit)
                | (GroupOrderStatus::InTransit, GroupOrderStatus::Completed)
        )
    }

    /// Status name as emitted in events
    pub const fn as_str(&self) -> &'static str {
        match self {
            GroupOrderStatus::Forming => "FORMING",
            GroupOrderStatus::Finalized => "FINALIZED",
            GroupOrderStatus::Assigned => "ASSIGNED",
            GroupOrderStatus::InTransit => "IN_TRANSIT",
            GroupOrderStatus::Completed => "COMPLETED",
            GroupOrderStatus::Disbanded => "DISBANDED",
        }
    }
}

impl std::fmt::Display for GroupOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A consolidated delivery unit
///
/// Owns its membership list exclusively: member ids are appended by the
/// consolidation coordinator under the group lock and never removed
/// (cancelled members stay in the set for size accounting; only a full
/// disband releases them). All members share a pairwise-overlapping
/// delivery radius and a common or co-located restaurant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupOrder {
    /// Group unique ID
    pub id: String,
    /// Restaurant (cluster key) the group is anchored to
    pub restaurant_id: String,
    /// Member order ids, in admission order (append-only while FORMING)
    pub member_order_ids: Vec<String>,
    /// Centroid of member delivery addresses, refreshed on admission
    pub centroid: GeoPoint,
    /// Deadline by which the group must finalize
    pub formation_deadline: DateTime<Utc>,
    /// Current lifecycle status
    pub status: GroupOrderStatus,
    /// Partner serving this group, once assigned (exactly one per group)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_partner_id: Option<String>,
    /// When the group was formed
    pub created_at: DateTime<Utc>,
    /// Monotonic version for optimistic concurrency and event dedup
    pub version: u64,
}

impl GroupOrder {
    /// Number of members, cancelled ones included
    pub fn member_count(&self) -> usize {
        self.member_order_ids.len()
    }
}
