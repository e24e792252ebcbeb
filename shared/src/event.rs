//! Domain events - immutable facts emitted after accepted transitions
//!
//! Every accepted status transition emits exactly one event on the engine's
//! broadcast channel. Delivery to the notification collaborator is
//! at-least-once: consumers must deduplicate by
//! `(entity_id, new_status, version)`.

use serde::{Deserialize, Serialize};

/// A domain event for the notification collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEvent {
    /// Event unique ID
    pub event_id: String,
    /// Entity the event is about (order, group, or assignment id)
    pub entity_id: String,
    /// Status the entity transitioned into
    pub new_status: String,
    /// Entity version after the transition (dedup component)
    pub version: u64,
    /// Server timestamp (Unix milliseconds)
    pub timestamp: i64,
    /// Event type and payload
    pub kind: DispatchEventKind,
}

impl DispatchEvent {
    /// At-least-once deduplication key
    pub fn dedup_key(&self) -> (String, String, u64) {
        (self.entity_id.clone(), self.new_status.clone(), self.version)
    }
}

/// Event type enumeration with payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchEventKind {
    /// An order moved to a new lifecycle status
    OrderStatusChanged {
        order_id: String,
        previous: String,
        current: String,
    },

    /// A forming group froze its membership
    GroupFinalized {
        group_order_id: String,
        member_count: usize,
        /// Courier minutes saved versus individual dispatch
        estimated_minutes_saved: i64,
    },

    /// An offer was extended to a partner (awaiting their reply)
    PartnerOffered {
        assignment_id: String,
        partner_id: String,
        subject: String,
        attempt: u32,
    },

    /// A partner accepted and the delivery is under way
    DeliveryAssigned {
        assignment_id: String,
        partner_id: String,
        subject: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        estimated_delivery_time: Option<i64>,
    },

    /// A group moved to a new lifecycle status
    GroupStatusChanged {
        group_order_id: String,
        previous: String,
        current: String,
    },

    /// A group failed assignment or was abandoned; members re-queued
    GroupDisbanded {
        group_order_id: String,
        member_order_ids: Vec<String>,
        reason: String,
    },
}

impl DispatchEventKind {
    /// Event type name, matching the serialized tag
    pub const fn name(&self) -> &'static str {
        match self {
            DispatchEventKind::OrderStatusChanged { .. } => "ORDER_STATUS_CHANGED",
            DispatchEventKind::GroupFinalized { .. } => "GROUP_FINALIZED",
            DispatchEventKind::PartnerOffered { .. } => "PARTNER_OFFERED",
            DispatchEventKind::DeliveryAssigned { .. } => "DELIVERY_ASSIGNED",
            DispatchEventKind::GroupStatusChanged { .. } => "GROUP_STATUS_CHANGED",
            DispatchEventKind::GroupDisbanded { .. } => "GROUP_DISBANDED",
        }
    }
}

impl std::fmt::Display for DispatchEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = DispatchEvent {
            event_id: "e-1".into(),
            entity_id: "g-1".into(),
            new_status: "FINALIZED".into(),
            version: 2,
            timestamp: 1_700_000_000_000,
            kind: DispatchEventKind::GroupFinalized {
                group_order_id: "g-1".into(),
                member_count: 3,
                estimated_minutes_saved: 24,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"GROUP_FINALIZED\""));
        assert!(json.contains("\"member_count\":3"));

        let back: DispatchEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dedup_key(), ("g-1".into(), "FINALIZED".into(), 2));
    }

    #[test]
    fn test_kind_name_matches_tag() {
        let kind = DispatchEventKind::OrderStatusChanged {
            order_id: "o-1".into(),
            previous: "PENDING".into(),
            current: "CONFIRMED".into(),
        };
        assert_eq!(kind.name(), "ORDER_STATUS_CHANGED");
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains(kind.name()));
    }
}
