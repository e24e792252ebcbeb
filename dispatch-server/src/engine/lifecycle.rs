//! Lifecycle state machine - guarded transitions plus event emission
//!
//! All status changes for orders, groups, and assignments funnel through
//! here so that (a) illegal transitions are rejected in one place and
//! (b) every accepted transition can emit exactly one event carrying the
//! post-transition version.

use crate::store::{AssignmentStore, GroupStore, OrderStore};
use chrono::Utc;
use shared::error::{AppError, AppResult};
use shared::event::{DispatchEvent, DispatchEventKind};
use shared::models::{
    AssignmentStatus, DeliveryAssignment, GroupOrder, GroupOrderStatus, Order, OrderStatus,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

pub struct LifecycleStateMachine {
    orders: Arc<OrderStore>,
    groups: Arc<GroupStore>,
    assignments: Arc<AssignmentStore>,
    event_tx: broadcast::Sender<DispatchEvent>,
}

impl LifecycleStateMachine {
    pub fn new(
        orders: Arc<OrderStore>,
        groups: Arc<GroupStore>,
        assignments: Arc<AssignmentStore>,
        event_tx: broadcast::Sender<DispatchEvent>,
    ) -> Self {
        Self {
            orders,
            groups,
            assignments,
            event_tx,
        }
    }

    /// Subscribe to the event stream (at-least-once; dedup downstream)
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.event_tx.subscribe()
    }

    /// Transition an order and emit `OrderStatusChanged`.
    pub fn transition_order(&self, order_id: &str, next: OrderStatus) -> AppResult<Order> {
        let mut previous = OrderStatus::Pending;
        let order = self.orders.update(order_id, |o| {
            if !o.status.can_transition_to(next) {
                return Err(AppError::invalid_transition(
                    format!("order {}", o.id),
                    o.status.as_str(),
                    next.as_str(),
                ));
            }
            previous = o.status;
            o.status = next;
            Ok(())
        })?;
        self.emit(
            &order.id,
            next.as_str(),
            order.version,
            DispatchEventKind::OrderStatusChanged {
                order_id: order.id.clone(),
                previous: previous.as_str().to_string(),
                current: next.as_str().to_string(),
            },
        );
        Ok(order)
    }

    /// Transition a group; emits the supplied kind, or the generic
    /// `GroupStatusChanged` when the caller has nothing richer to say.
    pub fn transition_group(
        &self,
        group_id: &str,
        next: GroupOrderStatus,
        kind: Option<DispatchEventKind>,
    ) -> AppResult<GroupOrder> {
        let mut previous = GroupOrderStatus::Forming;
        let group = self.groups.update(group_id, |g| {
            if !g.status.can_transition_to(next) {
                return Err(AppError::invalid_transition(
                    format!("group {}", g.id),
                    g.status.as_str(),
                    next.as_str(),
                ));
            }
            previous = g.status;
            g.status = next;
            Ok(())
        })?;
        let kind = kind.unwrap_or_else(|| DispatchEventKind::GroupStatusChanged {
            group_order_id: group.id.clone(),
            previous: previous.as_str().to_string(),
            current: next.as_str().to_string(),
        });
        self.emit(&group.id, next.as_str(), group.version, kind);
        Ok(group)
    }

    /// Transition an assignment; emits only when a kind is supplied.
    pub fn transition_assignment(
        &self,
        assignment_id: &str,
        next: AssignmentStatus,
        kind: Option<DispatchEventKind>,
    ) -> AppResult<DeliveryAssignment> {
        let assignment = self.assignments.update(assignment_id, |a| {
            if !a.status.can_transition_to(next) {
                return Err(AppError::invalid_transition(
                    format!("assignment {}", a.id),
                    a.status.as_str(),
                    next.as_str(),
                ));
            }
            a.status = next;
            if next == AssignmentStatus::Accepted {
                a.accepted_at = Some(Utc::now());
            }
            Ok(())
        })?;
        if let Some(kind) = kind {
            self.emit(&assignment.id, next.as_str(), assignment.version, kind);
        }
        Ok(assignment)
    }

    /// Advance every active (non-terminal) member of a group in lockstep.
    ///
    /// Cancelled members stay in the member set but are skipped here.
    pub fn advance_group_members(
        &self,
        group: &GroupOrder,
        next: OrderStatus,
    ) -> AppResult<Vec<Order>> {
        let mut advanced = Vec::with_capacity(group.member_order_ids.len());
        for member_id in &group.member_order_ids {
            let Some(member) = self.orders.get(member_id) else {
                continue;
            };
            if member.status.is_terminal() {
                continue;
            }
            advanced.push(self.transition_order(member_id, next)?);
        }
        Ok(advanced)
    }

    /// Emit a bare event for a transition performed elsewhere
    pub fn emit(&self, entity_id: &str, new_status: &str, version: u64, kind: DispatchEventKind) {
        let event = DispatchEvent {
            event_id: Uuid::new_v4().to_string(),
            entity_id: entity_id.to_string(),
            new_status: new_status.to_string(),
            version,
            timestamp: Utc::now().timestamp_millis(),
            kind,
        };
        // No receivers is fine: the notification pump may not be up yet.
        let _ = self.event_tx.send(event);
    }
}
