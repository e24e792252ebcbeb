//! Delivery assignment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a delivery assignment is for: a consolidated group, or a single
/// order dispatched individually. The single-order path is logically a
/// size-1 group and reuses the same assignment machinery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchSubject {
    /// A finalized group order
    Group { group_order_id: String },
    /// A standalone order (no compatible siblings, or post-disband requeue)
    Order { order_id: String },
}

impl DispatchSubject {
    /// Stable key for in-flight dedup and offer lookup
    pub fn key(&self) -> String {
        match self {
            DispatchSubject::Group { group_order_id } => format!("group:{}", group_order_id),
            DispatchSubject::Order { order_id } => format!("order:{}", order_id),
        }
    }
}

impl std::fmt::Display for DispatchSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Delivery assignment lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    /// Offer extended to a partner, awaiting reply
    Offered,
    /// Partner accepted the offer
    Accepted,
    /// Partner declined (terminal for this offer)
    Rejected,
    /// Delivery under way
    InProgress,
    /// Delivery finished (terminal)
    Completed,
    /// Offer timed out or delivery failed (terminal)
    Failed,
}

impl AssignmentStatus {
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            AssignmentStatus::Rejected | AssignmentStatus::Completed | AssignmentStatus::Failed
        )
    }

    pub const fn can_transition_to(&self, next: AssignmentStatus) -> bool {
        matches!(
            (self, next),
            (AssignmentStatus::Offered, AssignmentStatus::Accepted)
                | (AssignmentStatus::Offered, AssignmentStatus::Rejected)
                | (AssignmentStatus::Offered, AssignmentStatus::Failed)
                | (AssignmentStatus::Accepted, AssignmentStatus::InProgress)
                | (AssignmentStatus::InProgress, AssignmentStatus::Completed)
                | (AssignmentStatus::InProgress, AssignmentStatus::Failed)
        )
    }

    /// Status name as emitted in events
    pub const fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Offered => "OFFERED",
            AssignmentStatus::Accepted => "ACCEPTED",
            AssignmentStatus::Rejected => "REJECTED",
            AssignmentStatus::InProgress => "IN_PROGRESS",
            AssignmentStatus::Completed => "COMPLETED",
            AssignmentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One partner offer for one dispatch subject
///
/// Created by the assignment scheduler; a new record is created per
/// attempt, so `attempt` counts against the retry budget. Terminal on
/// COMPLETED, or on REJECTED/FAILED after which the scheduler either
/// retries with the next partner or disbands the group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAssignment {
    /// Assignment unique ID
    pub id: String,
    /// What is being delivered
    pub subject: DispatchSubject,
    /// Partner the offer was extended to
    pub partner_id: String,
    /// Current status
    pub status: AssignmentStatus,
    /// Attempt number, 1-based, counted against the retry budget
    pub attempt: u32,
    /// When the offer was extended
    pub offered_at: DateTime<Utc>,
    /// When the partner accepted, if they did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    /// Estimated delivery time computed at acceptance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    /// Monotonic version for optimistic concurrency and event dedup
    pub version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_key() {
        let g = DispatchSubject::Group {
            group_order_id: "g-1".into(),
        };
        let o = DispatchSubject::Order {
            order_id: "o-1".into(),
        };
        assert_eq!(g.key(), "group:g-1");
        assert_eq!(o.key(), "order:o-1");
    }

    #[test]
    fn test_assignment_transitions() {
        assert!(AssignmentStatus::Offered.can_transition_to(AssignmentStatus::Accepted));
        assert!(AssignmentStatus::Offered.can_transition_to(AssignmentStatus::Rejected));
        assert!(AssignmentStatus::Offered.can_transition_to(AssignmentStatus::Failed));
        assert!(AssignmentStatus::Accepted.can_transition_to(AssignmentStatus::InProgress));
        assert!(AssignmentStatus::InProgress.can_transition_to(AssignmentStatus::Completed));
        assert!(!AssignmentStatus::Rejected.can_transition_to(AssignmentStatus::Accepted));
        assert!(!AssignmentStatus::Completed.can_transition_to(AssignmentStatus::Failed));
    }
}
