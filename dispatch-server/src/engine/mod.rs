//! Dispatch engine
//!
//! The facade wires the matcher, coordinator, scheduler and lifecycle
//! machine over the shared stores and indices, and is the only surface
//! the API layer talks to. All methods take `&self`; the engine is
//! created once per process behind an `Arc`.

mod coordinator;
mod geo_index;
mod lifecycle;
mod matcher;
mod scheduler;
mod sweep;

pub use coordinator::{CancelOutcome, ConsolidationCoordinator, MergeOutcome};
pub use geo_index::{GeoIndex, NearbyHit};
pub use lifecycle::LifecycleStateMachine;
pub use matcher::EligibilityMatcher;
pub use scheduler::{AssignmentScheduler, DispatchOutcome, OfferReply};
pub use sweep::sweeper_loop;

use crate::core::Config;
use crate::directory::{PartnerDirectory, RestaurantDirectory};
use crate::store::{AssignmentStore, GroupStore, OrderStore};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::event::DispatchEvent;
use shared::geo::GeoPoint;
use shared::models::{
    AssignmentStatus, DispatchSubject, GroupOrder, GroupOrderStatus, Order, OrderItem, OrderStatus,
    PartnerRecord, RestaurantRecord,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Event channel depth; laggards are logged, not blocked on
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Inbound order submission
///
/// `id` is the caller's idempotency handle: resubmitting with the same
/// id returns the existing order unchanged.
#[derive(Debug, Clone)]
pub struct SubmitOrder {
    pub id: Option<String>,
    pub user_id: String,
    pub restaurant_id: String,
    pub delivery_address: GeoPoint,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub delivery_fee: Option<Decimal>,
    pub special_instructions: Option<String>,
}

/// Group read model for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct GroupView {
    #[serde(flatten)]
    pub group: GroupOrder,
    pub members: Vec<Order>,
}

pub struct DispatchEngine {
    config: Arc<Config>,
    orders: Arc<OrderStore>,
    groups: Arc<GroupStore>,
    assignments: Arc<AssignmentStore>,
    order_index: Arc<GeoIndex>,
    lifecycle: Arc<LifecycleStateMachine>,
    coordinator: Arc<ConsolidationCoordinator>,
    scheduler: Arc<AssignmentScheduler>,
    restaurants: Arc<dyn RestaurantDirectory>,
    partners: Arc<dyn PartnerDirectory>,
}

impl DispatchEngine {
    pub fn new(
        config: Arc<Config>,
        restaurants: Arc<dyn RestaurantDirectory>,
        partners: Arc<dyn PartnerDirectory>,
    ) -> Arc<Self> {
        let orders = Arc::new(OrderStore::new());
        let groups = Arc::new(GroupStore::new());
        let assignments = Arc::new(AssignmentStore::new());
        let order_index = Arc::new(GeoIndex::new());
        let partner_index = Arc::new(GeoIndex::new());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let lifecycle = Arc::new(LifecycleStateMachine::new(
            orders.clone(),
            groups.clone(),
            assignments.clone(),
            event_tx,
        ));
        let coordinator = Arc::new(ConsolidationCoordinator::new(
            config.clone(),
            orders.clone(),
            groups.clone(),
            order_index.clone(),
            lifecycle.clone(),
            restaurants.clone(),
        ));
        let scheduler = Arc::new(AssignmentScheduler::new(
            config.clone(),
            orders.clone(),
            groups.clone(),
            assignments.clone(),
            partner_index,
            partners.clone(),
            lifecycle.clone(),
            coordinator.clone(),
        ));
        Arc::new(Self {
            config,
            orders,
            groups,
            assignments,
            order_index,
            lifecycle,
            coordinator,
            scheduler,
            restaurants,
            partners,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to the domain event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<DispatchEvent> {
        self.lifecycle.subscribe()
    }

    /// Accept an order and run consolidation.
    ///
    /// Returns the order snapshot after the merge decision; resubmitting
    /// a known id returns the existing snapshot untouched.
    pub async fn submit_order(&self, submit: SubmitOrder) -> AppResult<Order> {
        submit.delivery_address.validate()?;
        if submit.items.is_empty() {
            return Err(AppError::new(ErrorCode::OrderEmpty));
        }
        let restaurant = self.restaurants.get(&submit.restaurant_id).await?;
        if !restaurant.accepts_orders() {
            return Err(AppError::with_message(
                ErrorCode::RestaurantClosed,
                format!("restaurant {} is not taking orders", restaurant.id),
            ));
        }

        let id = submit.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        if submit.id.is_some() {
            if let Some(existing) = self.orders.get(&id) {
                tracing::debug!(order_id = %id, "Duplicate submission; returning existing order");
                return Ok(existing);
            }
        }

        let order = Order {
            id: id.clone(),
            user_id: submit.user_id,
            restaurant_id: submit.restaurant_id,
            delivery_address: submit.delivery_address,
            items: submit.items,
            total_amount: submit.total_amount,
            delivery_fee: submit.delivery_fee,
            special_instructions: submit.special_instructions,
            order_time: Utc::now(),
            status: OrderStatus::Pending,
            group_order_id: None,
            delivery_partner_id: None,
            tracking_id: Uuid::new_v4().simple().to_string(),
            estimated_delivery_time: None,
            version: 0,
        };
        self.orders.insert_new(order.clone())?;
        self.coordinator.try_merge(&order).await?;
        // Re-read: the merge decision may have claimed the order.
        self.orders
            .get(&id)
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))
    }

    pub fn get_order(&self, order_id: &str) -> AppResult<Order> {
        self.orders
            .get(order_id)
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))
    }

    /// Customer-facing lookup by tracking id
    pub fn track_order(&self, tracking_id: &str) -> AppResult<Order> {
        self.orders
            .all()
            .into_iter()
            .find(|o| o.tracking_id == tracking_id)
            .ok_or_else(|| AppError::not_found(format!("tracking id {tracking_id}")))
    }

    /// Cancel an order; disbanding side effects include failing the
    /// group's live assignment, if any.
    pub async fn cancel_order(&self, order_id: &str) -> AppResult<Order> {
        let outcome = self.coordinator.cancel(order_id).await?;
        if let Some(group_id) = &outcome.disbanded_group_id {
            self.fail_active_assignment(&DispatchSubject::Group {
                group_order_id: group_id.clone(),
            })
            .await?;
        } else if outcome.order.group_order_id.is_none() {
            // A lone order may have a live assignment from a solo dispatch.
            self.fail_active_assignment(&DispatchSubject::Order {
                order_id: order_id.to_string(),
            })
            .await?;
        }
        Ok(outcome.order)
    }

    pub fn group_status(&self, group_id: &str) -> AppResult<GroupView> {
        let group = self
            .groups
            .get(group_id)
            .ok_or_else(|| AppError::new(ErrorCode::GroupNotFound))?;
        let members = group
            .member_order_ids
            .iter()
            .filter_map(|id| self.orders.get(id))
            .collect();
        Ok(GroupView { group, members })
    }

    /// Restaurant-driven progress: CONFIRMED, PREPARING, READY per order.
    pub fn update_order_status(&self, order_id: &str, next: OrderStatus) -> AppResult<Order> {
        if !matches!(
            next,
            OrderStatus::Confirmed | OrderStatus::Preparing | OrderStatus::Ready
        ) {
            return Err(AppError::invalid_request(format!(
                "status {next} is not restaurant-assignable"
            )));
        }
        self.lifecycle.transition_order(order_id, next)
    }

    /// A partner's answer to the offer extended for a subject
    pub fn on_partner_offer(
        &self,
        partner_id: &str,
        subject: &DispatchSubject,
        accepted: bool,
    ) -> AppResult<()> {
        self.scheduler.resolve_offer(subject, partner_id, accepted)
    }

    /// Partner picked the group's orders up; everyone moves together.
    pub async fn mark_group_picked_up(&self, group_id: &str) -> AppResult<GroupView> {
        let lock = self.coordinator.group_lock(group_id);
        let _guard = lock.lock().await;
        let group = self
            .groups
            .get(group_id)
            .ok_or_else(|| AppError::new(ErrorCode::GroupNotFound))?;
        if group.status != GroupOrderStatus::Assigned {
            return Err(AppError::invalid_transition(
                format!("group {group_id}"),
                group.status.as_str(),
                GroupOrderStatus::InTransit.as_str(),
            ));
        }
        let members = self.coordinator.active_members(&group);
        if let Some(not_ready) = members.iter().find(|o| o.status != OrderStatus::Ready) {
            return Err(AppError::state_conflict(
                ErrorCode::InvalidTransition,
                format!(
                    "order {} is {}, all members must be READY for pickup",
                    not_ready.id, not_ready.status
                ),
            ));
        }
        self.lifecycle
            .advance_group_members(&group, OrderStatus::PickedUp)?;
        self.lifecycle
            .transition_group(group_id, GroupOrderStatus::InTransit, None)?;
        self.group_status(group_id)
    }

    /// The consolidated route is under way.
    pub async fn mark_group_in_transit(&self, group_id: &str) -> AppResult<GroupView> {
        let lock = self.coordinator.group_lock(group_id);
        let _guard = lock.lock().await;
        let group = self
            .groups
            .get(group_id)
            .ok_or_else(|| AppError::new(ErrorCode::GroupNotFound))?;
        if group.status != GroupOrderStatus::InTransit {
            return Err(AppError::invalid_transition(
                format!("group {group_id}"),
                group.status.as_str(),
                GroupOrderStatus::InTransit.as_str(),
            ));
        }
        self.lifecycle
            .advance_group_members(&group, OrderStatus::InTransit)?;
        self.group_status(group_id)
    }

    /// All drop-offs done: members delivered, group completed,
    /// assignment completed, partner freed.
    pub async fn mark_group_delivered(&self, group_id: &str) -> AppResult<GroupView> {
        let lock = self.coordinator.group_lock(group_id);
        let _guard = lock.lock().await;
        let group = self
            .groups
            .get(group_id)
            .ok_or_else(|| AppError::new(ErrorCode::GroupNotFound))?;
        if group.status != GroupOrderStatus::InTransit {
            return Err(AppError::invalid_transition(
                format!("group {group_id}"),
                group.status.as_str(),
                GroupOrderStatus::Completed.as_str(),
            ));
        }
        self.lifecycle
            .advance_group_members(&group, OrderStatus::Delivered)?;
        self.lifecycle
            .transition_group(group_id, GroupOrderStatus::Completed, None)?;

        let subject = DispatchSubject::Group {
            group_order_id: group_id.to_string(),
        };
        if let Some(assignment) = self.assignments.active_for(&subject) {
            self.lifecycle
                .transition_assignment(&assignment.id, AssignmentStatus::Completed, None)?;
            self.free_partner(&assignment.partner_id).await?;
        }
        self.group_status(group_id)
    }

    /// Delivery-stage progress for a lone (ungrouped) order.
    pub async fn mark_order_delivery_progress(
        &self,
        order_id: &str,
        next: OrderStatus,
    ) -> AppResult<Order> {
        if !next.is_delivery_stage() {
            return Err(AppError::invalid_request(format!(
                "status {next} is not a delivery stage"
            )));
        }
        let order = self.get_order(order_id)?;
        if let Some(group_id) = &order.group_order_id {
            return Err(AppError::invalid_request(format!(
                "order {order_id} belongs to group {group_id}; drive the group instead"
            )));
        }
        if order.delivery_partner_id.is_none() {
            return Err(AppError::state_conflict(
                ErrorCode::InvalidTransition,
                format!("order {order_id} has no delivery partner yet"),
            ));
        }
        let order = self.lifecycle.transition_order(order_id, next)?;
        if next == OrderStatus::Delivered {
            let subject = DispatchSubject::Order {
                order_id: order_id.to_string(),
            };
            if let Some(assignment) = self.assignments.active_for(&subject) {
                self.lifecycle
                    .transition_assignment(&assignment.id, AssignmentStatus::Completed, None)?;
                self.free_partner(&assignment.partner_id).await?;
            }
        }
        Ok(order)
    }

    pub async fn upsert_restaurant(&self, record: RestaurantRecord) -> AppResult<()> {
        self.restaurants.upsert(record).await
    }

    pub async fn upsert_partner(&self, record: PartnerRecord) -> AppResult<()> {
        self.partners.upsert(record.clone()).await?;
        self.scheduler.index_partner(&record);
        Ok(())
    }

    pub async fn update_partner_location(
        &self,
        partner_id: &str,
        location: GeoPoint,
    ) -> AppResult<PartnerRecord> {
        let record = self.partners.update_location(partner_id, location).await?;
        self.scheduler.index_partner(&record);
        Ok(record)
    }

    pub fn get_assignment(&self, assignment_id: &str) -> AppResult<shared::models::DeliveryAssignment> {
        self.assignments
            .get(assignment_id)
            .ok_or_else(|| AppError::new(ErrorCode::AssignmentNotFound))
    }

    /// Store sizes (orders, groups, assignments) for the health endpoint
    pub fn store_sizes(&self) -> (usize, usize, usize) {
        (self.orders.len(), self.groups.len(), self.assignments.len())
    }

    /// Rebuild both spatial indices from the stores and the partner
    /// directory. Run once at startup; in-flight locks start empty and
    /// sweeps re-drive anything overdue.
    pub async fn rebuild(&self) -> AppResult<()> {
        self.order_index.clear();
        for order in self.orders.all() {
            if order.is_merge_candidate() {
                self.order_index
                    .insert(order.id.clone(), order.delivery_address, order.order_time);
            }
        }
        for partner in self.partners.snapshot().await? {
            self.scheduler.index_partner(&partner);
        }
        tracing::info!(
            indexed_orders = self.order_index.len(),
            "Rebuilt spatial indices"
        );
        Ok(())
    }

    /// Run one round of the three sweeps against `now`.
    ///
    /// Dispatches are spawned; the returned handles let tests await
    /// completion, the periodic sweeper just drops them.
    pub fn run_sweeps(self: &Arc<Self>, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        // Formation deadlines: finalize and dispatch.
        for group in self.groups.forming_past_deadline(now) {
            let engine = self.clone();
            handles.push(tokio::spawn(async move {
                match engine.coordinator.finalize(&group.id).await {
                    Ok(Some(finalized)) => {
                        engine
                            .dispatch_subject(DispatchSubject::Group {
                                group_order_id: finalized.id,
                            })
                            .await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(group_id = %group.id, error = %e, "Finalize sweep failed");
                    }
                }
            }));
        }

        // Solo dispatch: unmerged orders whose formation window elapsed
        // with no group, no partner, and no dispatch in flight.
        for order in self.orders.all() {
            if order.group_order_id.is_some()
                || order.delivery_partner_id.is_some()
                || order.status.is_terminal()
                || order.status.is_delivery_stage()
            {
                continue;
            }
            if order.order_time + self.config.formation_deadline() > now {
                continue;
            }
            let subject = DispatchSubject::Order {
                order_id: order.id.clone(),
            };
            if self.scheduler.is_in_flight(&subject)
                || self.assignments.active_for(&subject).is_some()
            {
                continue;
            }
            self.order_index.remove(&order.id);
            let engine = self.clone();
            handles.push(tokio::spawn(async move {
                engine.dispatch_subject(subject).await;
            }));
        }

        // Crash recovery for offers with no live waiter.
        let engine = self.clone();
        handles.push(tokio::spawn(async move {
            engine.scheduler.fail_stale_offers(now).await;
        }));

        handles
    }

    /// Spawn a dispatch loop for a subject.
    pub fn spawn_dispatch(self: &Arc<Self>, subject: DispatchSubject) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            engine.dispatch_subject(subject).await;
        })
    }

    /// Drive a dispatch to its outcome; a disband falls back to solo
    /// dispatch of the released members, inline.
    async fn dispatch_subject(&self, subject: DispatchSubject) {
        match self.scheduler.dispatch(subject.clone()).await {
            Ok(DispatchOutcome::Disbanded { requeued }) => {
                for order_id in requeued {
                    let solo = DispatchSubject::Order { order_id };
                    if let Err(e) = self.scheduler.dispatch(solo.clone()).await {
                        tracing::error!(subject = %solo.key(), error = %e, "Solo fallback failed");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(subject = %subject.key(), error = %e, "Dispatch failed");
            }
        }
    }

    /// Fail the live assignment for a subject, if any, freeing the partner.
    async fn fail_active_assignment(&self, subject: &DispatchSubject) -> AppResult<()> {
        let Some(assignment) = self.assignments.active_for(subject) else {
            return Ok(());
        };
        self.lifecycle
            .transition_assignment(&assignment.id, AssignmentStatus::Failed, None)?;
        self.free_partner(&assignment.partner_id).await
    }

    async fn free_partner(&self, partner_id: &str) -> AppResult<()> {
        match self.partners.release(partner_id).await {
            Ok(partner) => {
                self.scheduler.index_partner(&partner);
                Ok(())
            }
            Err(e) if e.code == ErrorCode::PartnerNotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
