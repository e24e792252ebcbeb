//! Customer order model and status state machine

use crate::geo::GeoPoint;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order lifecycle status
///
/// PENDING through READY are restaurant-driven per order. PICKED_UP,
/// IN_TRANSIT and DELIVERED are delivery-driven: once an order belongs to
/// a group they are applied to all members together by the lifecycle
/// state machine, never set independently.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order placed, waiting for restaurant confirmation
    Pending,
    /// Order confirmed by restaurant
    Confirmed,
    /// Order is being prepared
    Preparing,
    /// Order is ready for pickup
    Ready,
    /// Order picked up by delivery partner
    PickedUp,
    /// Order is out for delivery
    InTransit,
    /// Order delivered successfully (terminal)
    Delivered,
    /// Order cancelled (terminal)
    Cancelled,
}

impl OrderStatus {
    /// Terminal states accept no further transitions
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Whether the order may still be cancelled by its owner
    pub const fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Whether the order is still eligible for group membership
    pub const fn is_mergeable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Delivery-stage statuses are driven by the group, not per order
    pub const fn is_delivery_stage(&self) -> bool {
        matches!(
            self,
            OrderStatus::PickedUp | OrderStatus::InTransit | OrderStatus::Delivered
        )
    }

    /// Valid forward transitions
    ///
    /// CANCELLED is reachable from any non-terminal state. Everything
    /// else steps strictly forward through the lifecycle.
    pub const fn can_transition_to(&self, next: OrderStatus) -> bool {
        if matches!(next, OrderStatus::Cancelled) {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Confirmed)
                | (OrderStatus::Confirmed, OrderStatus::Preparing)
                | (OrderStatus::Preparing, OrderStatus::Ready)
                | (OrderStatus::Ready, OrderStatus::PickedUp)
                | (OrderStatus::PickedUp, OrderStatus::InTransit)
                | (OrderStatus::InTransit, OrderStatus::Delivered)
        )
    }

    /// Status name as emitted in events
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::InTransit => "IN_TRANSIT",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A line item on an order
///
/// Prices are pass-through data from checkout; the engine does no pricing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    /// Product name snapshot
    pub name: String,
    /// Quantity ordered
    pub quantity: i32,
    /// Unit price at checkout time
    pub unit_price: Decimal,
}

/// A customer order
///
/// Created at checkout (external); consumed and mutated by the engine
/// only while `status` is PENDING or CONFIRMED. An order belongs to at
/// most one active group at a time: `group_order_id` is a lookup-only
/// back-reference written exclusively by the consolidation coordinator
/// via an atomic claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Order unique ID
    pub id: String,
    /// Customer who placed the order
    pub user_id: String,
    /// Restaurant fulfilling the order
    pub restaurant_id: String,
    /// Delivery destination
    pub delivery_address: GeoPoint,
    /// Line items
    pub items: Vec<OrderItem>,
    /// Order total at checkout
    pub total_amount: Decimal,
    /// Delivery fee, if quoted at checkout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_fee: Option<Decimal>,
    /// Free-text instructions for the courier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    /// When the order was placed
    pub order_time: DateTime<Utc>,
    /// Current lifecycle status
    pub status: OrderStatus,
    /// Back-reference to the owning group, if claimed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_order_id: Option<String>,
    /// Partner delivering this order, once an offer is accepted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_partner_id: Option<String>,
    /// Customer-facing tracking ID
    pub tracking_id: String,
    /// Estimated delivery time, set on assignment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    /// Monotonic version for optimistic concurrency and event dedup
    pub version: u64,
}

impl Order {
    /// Whether this order can still join a group: mergeable status and
    /// not yet claimed.
    pub fn is_merge_candidate(&self) -> bool {
        self.status.is_mergeable() && self.group_order_id.is_none()
    }
}
