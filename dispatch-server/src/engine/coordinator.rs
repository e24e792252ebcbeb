//! Consolidation coordinator - group formation, joins, disbands
//!
//! Formation for one restaurant is serialized by a per-restaurant
//! cluster mutex; structural group changes are serialized by a per-group
//! mutex. Candidate admission is arbitrated by the order-claim
//! compare-and-set, so a racing formation on another restaurant's
//! cluster can never steal a member twice. Index maintenance happens
//! strictly outside both lock kinds.

use crate::core::Config;
use crate::directory::RestaurantDirectory;
use crate::engine::geo_index::GeoIndex;
use crate::engine::lifecycle::LifecycleStateMachine;
use crate::engine::matcher::EligibilityMatcher;
use crate::store::{GroupStore, OrderStore};
use chrono::Utc;
use dashmap::DashMap;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::event::DispatchEventKind;
use shared::geo;
use shared::models::{GroupOrder, GroupOrderStatus, Order, OrderStatus};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Courier minutes saved per order merged away from a solo trip
const SAVED_MINUTES_PER_MERGED_ORDER: i64 = 12;

/// Result of running consolidation for a newly submitted order
#[derive(Debug, Clone)]
pub enum MergeOutcome {
    /// A new group was formed with the trigger and at least one candidate
    Formed { group: GroupOrder },
    /// The trigger joined an already forming group
    Joined { group: GroupOrder },
    /// No compatible partner; the order waits in the index
    Individual,
}

/// Result of cancelling an order
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub order: Order,
    /// Set when the cancellation emptied a group and disbanded it
    pub disbanded_group_id: Option<String>,
}

pub struct ConsolidationCoordinator {
    config: Arc<Config>,
    orders: Arc<OrderStore>,
    groups: Arc<GroupStore>,
    order_index: Arc<GeoIndex>,
    lifecycle: Arc<LifecycleStateMachine>,
    restaurants: Arc<dyn RestaurantDirectory>,
    matcher: EligibilityMatcher,
    cluster_locks: DashMap<String, Arc<Mutex<()>>>,
    group_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ConsolidationCoordinator {
    pub fn new(
        config: Arc<Config>,
        orders: Arc<OrderStore>,
        groups: Arc<GroupStore>,
        order_index: Arc<GeoIndex>,
        lifecycle: Arc<LifecycleStateMachine>,
        restaurants: Arc<dyn RestaurantDirectory>,
    ) -> Self {
        let matcher = EligibilityMatcher::new(config.clone());
        Self {
            config,
            orders,
            groups,
            order_index,
            lifecycle,
            restaurants,
            matcher,
            cluster_locks: DashMap::new(),
            group_locks: DashMap::new(),
        }
    }

    fn cluster_lock(&self, restaurant_id: &str) -> Arc<Mutex<()>> {
        self.cluster_locks
            .entry(restaurant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub(crate) fn group_lock(&self, group_id: &str) -> Arc<Mutex<()>> {
        self.group_locks
            .entry(group_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Members of a group that are still in play (not cancelled or
    /// otherwise terminal)
    pub fn active_members(&self, group: &GroupOrder) -> Vec<Order> {
        group
            .member_order_ids
            .iter()
            .filter_map(|id| self.orders.get(id))
            .filter(|o| !o.status.is_terminal())
            .collect()
    }

    /// Run consolidation for a freshly submitted order.
    ///
    /// The trigger is deliberately NOT in the index while we look: it
    /// only enters the index on the `Individual` outcome, after the
    /// cluster lock is released.
    pub async fn try_merge(&self, trigger: &Order) -> AppResult<MergeOutcome> {
        // Snapshot before taking any lock; staleness is tolerated, the
        // claim CAS is the authority.
        let restaurants = self.restaurants.snapshot().await?;
        let lock = self.cluster_lock(&trigger.restaurant_id);
        let guard = lock.lock().await;

        // Late join: a compatible forming group beats forming a new one,
        // even when the trigger's own candidates are all claimed.
        for group in self.groups.forming() {
            if !self.matcher.restaurants_compatible(
                &trigger.restaurant_id,
                &group.restaurant_id,
                &restaurants,
            ) {
                continue;
            }
            // Membership is append-only: cancelled members keep counting
            // against the cap. The scan check is advisory; the closure
            // below re-checks under the entry lock.
            if group.member_count() >= self.config.max_group_size {
                continue;
            }
            let members = self.active_members(&group);
            if !self.matcher.pairwise_compatible(trigger, &members) {
                continue;
            }
            self.orders.try_claim(&trigger.id, &group.id)?;
            let max_members = self.config.max_group_size;
            let updated = self.groups.update(&group.id, |g| {
                if !g.status.accepts_members() {
                    return Err(AppError::state_conflict(
                        ErrorCode::GroupSealed,
                        format!("group {} no longer accepts members", g.id),
                    ));
                }
                if g.member_order_ids.len() >= max_members {
                    return Err(AppError::state_conflict(
                        ErrorCode::GroupFull,
                        format!("group {} is at its size cap", g.id),
                    ));
                }
                g.member_order_ids.push(trigger.id.clone());
                Ok(())
            });
            match updated {
                Ok(group) => {
                    let group = self.refresh_centroid(&group.id)?;
                    drop(guard);
                    tracing::info!(
                        order_id = %trigger.id,
                        group_id = %group.id,
                        members = group.member_count(),
                        "Order joined forming group"
                    );
                    return Ok(MergeOutcome::Joined { group });
                }
                Err(e) => {
                    // Sealed or filled between scan and update: undo the
                    // claim and keep looking.
                    self.orders.release_claim(&trigger.id, &group.id);
                    if e.code != ErrorCode::GroupSealed && e.code != ErrorCode::GroupFull {
                        return Err(e);
                    }
                }
            }
        }

        let candidates =
            self.matcher
                .find_candidates(trigger, &self.order_index, &self.orders, &restaurants);
        if candidates.is_empty() {
            drop(guard);
            self.order_index
                .insert(trigger.id.clone(), trigger.delivery_address, trigger.order_time);
            tracing::debug!(order_id = %trigger.id, "No merge partner; order queued individually");
            return Ok(MergeOutcome::Individual);
        }

        let group_id = Uuid::new_v4().to_string();
        self.orders.try_claim(&trigger.id, &group_id)?;

        let mut claimed: Vec<Order> = Vec::new();
        for candidate in &candidates {
            match self.orders.try_claim(&candidate.id, &group_id) {
                Ok(order) => claimed.push(order),
                // Lost to a concurrent formation; not an error.
                Err(e) if e.code == ErrorCode::CandidateClaimed => continue,
                Err(e) => {
                    self.release_all(&group_id, trigger, &claimed);
                    return Err(e);
                }
            }
        }

        if claimed.is_empty() {
            self.orders.release_claim(&trigger.id, &group_id);
            drop(guard);
            self.order_index
                .insert(trigger.id.clone(), trigger.delivery_address, trigger.order_time);
            return Ok(MergeOutcome::Individual);
        }

        let now = Utc::now();
        let mut member_ids = vec![trigger.id.clone()];
        member_ids.extend(claimed.iter().map(|o| o.id.clone()));
        let points: Vec<_> = std::iter::once(trigger.delivery_address)
            .chain(claimed.iter().map(|o| o.delivery_address))
            .collect();
        let centroid = geo::centroid(&points)
            .ok_or_else(|| AppError::internal("centroid of empty member set"))?;

        let group = GroupOrder {
            id: group_id.clone(),
            restaurant_id: trigger.restaurant_id.clone(),
            member_order_ids: member_ids,
            centroid,
            formation_deadline: now + self.config.formation_deadline(),
            status: GroupOrderStatus::Forming,
            assigned_partner_id: None,
            created_at: now,
            version: 0,
        };
        self.groups.insert_new(group.clone())?;
        drop(guard);

        // Claimed candidates leave the index; the trigger never entered it.
        for order in &claimed {
            self.order_index.remove(&order.id);
        }
        tracing::info!(
            group_id = %group_id,
            restaurant_id = %trigger.restaurant_id,
            members = group.member_count(),
            "Formed consolidation group"
        );
        Ok(MergeOutcome::Formed { group })
    }

    /// Seal a forming group once its formation deadline has passed.
    ///
    /// Idempotent: a group already past `Forming` is left alone. A group
    /// whose members all cancelled is disbanded instead.
    pub async fn finalize(&self, group_id: &str) -> AppResult<Option<GroupOrder>> {
        let lock = self.group_lock(group_id);
        let _guard = lock.lock().await;

        let group = self
            .groups
            .get(group_id)
            .ok_or_else(|| AppError::new(ErrorCode::GroupNotFound))?;
        if group.status != GroupOrderStatus::Forming {
            return Ok(None);
        }

        let members = self.active_members(&group);
        if members.is_empty() {
            self.disband_locked(&group, "all members cancelled before finalization")?;
            return Ok(None);
        }

        let group = self.refresh_centroid(group_id)?;
        let saved = (members.len() as i64 - 1) * SAVED_MINUTES_PER_MERGED_ORDER;
        let group = self.lifecycle.transition_group(
            group_id,
            GroupOrderStatus::Finalized,
            Some(DispatchEventKind::GroupFinalized {
                group_order_id: group.id.clone(),
                member_count: members.len(),
                estimated_minutes_saved: saved,
            }),
        )?;
        tracing::info!(
            group_id = %group_id,
            members = members.len(),
            minutes_saved = saved,
            "Group finalized"
        );
        Ok(Some(group))
    }

    /// Disband a group and release its members' claims.
    ///
    /// Returns the ids of members still eligible for a solo dispatch.
    pub async fn disband(&self, group_id: &str, reason: &str) -> AppResult<Vec<String>> {
        let lock = self.group_lock(group_id);
        let _guard = lock.lock().await;
        let group = self
            .groups
            .get(group_id)
            .ok_or_else(|| AppError::new(ErrorCode::GroupNotFound))?;
        if group.status == GroupOrderStatus::Disbanded {
            return Ok(Vec::new());
        }
        self.disband_locked(&group, reason)
    }

    /// Cancel an order, group-aware.
    ///
    /// A grouped member stays in the member set (membership is
    /// append-only) but stops counting as active; cancelling the last
    /// active member disbands the group.
    pub async fn cancel(&self, order_id: &str) -> AppResult<CancelOutcome> {
        let order = self
            .orders
            .get(order_id)
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
        if order.status == OrderStatus::Cancelled {
            return Err(AppError::new(ErrorCode::OrderAlreadyCancelled));
        }
        if order.status == OrderStatus::Delivered {
            return Err(AppError::new(ErrorCode::OrderAlreadyDelivered));
        }
        if !order.status.can_cancel() {
            return Err(AppError::with_message(
                ErrorCode::OrderNotCancellable,
                format!("order {} is already {}", order.id, order.status),
            ));
        }

        let Some(group_id) = order.group_order_id.clone() else {
            let order = self
                .lifecycle
                .transition_order(order_id, OrderStatus::Cancelled)?;
            self.order_index.remove(order_id);
            return Ok(CancelOutcome {
                order,
                disbanded_group_id: None,
            });
        };

        let lock = self.group_lock(&group_id);
        let _guard = lock.lock().await;
        let order = self
            .lifecycle
            .transition_order(order_id, OrderStatus::Cancelled)?;

        let group = self
            .groups
            .get(&group_id)
            .ok_or_else(|| AppError::new(ErrorCode::GroupNotFound))?;
        let mut disbanded_group_id = None;
        if !group.status.is_terminal() {
            if self.active_members(&group).is_empty() {
                self.disband_locked(&group, "all members cancelled")?;
                disbanded_group_id = Some(group_id);
            } else if group.status == GroupOrderStatus::Forming {
                self.refresh_centroid(&group_id)?;
            }
        }
        Ok(CancelOutcome {
            order,
            disbanded_group_id,
        })
    }

    /// Pre: the caller holds the group lock and the group is not yet
    /// disbanded.
    fn disband_locked(&self, group: &GroupOrder, reason: &str) -> AppResult<Vec<String>> {
        self.lifecycle.transition_group(
            &group.id,
            GroupOrderStatus::Disbanded,
            Some(DispatchEventKind::GroupDisbanded {
                group_order_id: group.id.clone(),
                member_order_ids: group.member_order_ids.clone(),
                reason: reason.to_string(),
            }),
        )?;
        let mut requeue = Vec::new();
        for member_id in &group.member_order_ids {
            self.orders.release_claim(member_id, &group.id);
            if let Some(member) = self.orders.get(member_id) {
                if !member.status.is_terminal() {
                    requeue.push(member.id);
                }
            }
        }
        tracing::warn!(
            group_id = %group.id,
            reason = %reason,
            requeued = requeue.len(),
            "Group disbanded"
        );
        Ok(requeue)
    }

    /// Recompute the centroid over active members.
    fn refresh_centroid(&self, group_id: &str) -> AppResult<GroupOrder> {
        let group = self
            .groups
            .get(group_id)
            .ok_or_else(|| AppError::new(ErrorCode::GroupNotFound))?;
        let points: Vec<_> = self
            .active_members(&group)
            .iter()
            .map(|o| o.delivery_address)
            .collect();
        let Some(centroid) = geo::centroid(&points) else {
            return Ok(group);
        };
        self.groups.update(group_id, |g| {
            g.centroid = centroid;
            Ok(())
        })
    }

    fn release_all(&self, group_id: &str, trigger: &Order, claimed: &[Order]) {
        self.orders.release_claim(&trigger.id, group_id);
        for order in claimed {
            self.orders.release_claim(&order.id, group_id);
        }
    }
}
