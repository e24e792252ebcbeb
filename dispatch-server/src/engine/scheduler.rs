//! Assignment scheduler - partner offers, acceptance, retry, disband
//!
//! A dispatch drives one subject (a finalized group or a lone order)
//! through up to `offer_retry_budget` offers. The subject is
//! guarded by an in-flight set so concurrent triggers (API, sweeps)
//! collapse into one loop. Offers wait on a oneshot that the offer
//! resolution endpoint completes; silence past the offer timeout counts
//! as a rejection that also costs the partner its reservation.

use crate::core::Config;
use crate::directory::PartnerDirectory;
use crate::engine::coordinator::ConsolidationCoordinator;
use crate::engine::geo_index::GeoIndex;
use crate::engine::lifecycle::LifecycleStateMachine;
use crate::store::{AssignmentStore, GroupStore, OrderStore};
use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, DashSet};
use shared::error::{AppError, AppResult, ErrorCode};
use shared::event::DispatchEventKind;
use shared::geo::GeoPoint;
use shared::models::{
    AssignmentStatus, DeliveryAssignment, DispatchSubject, GroupOrderStatus, PartnerRecord,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Courier travel budget for the first drop-off
const BASE_DELIVERY_MINUTES: i64 = 30;
/// Extra budget per additional stop on a consolidated route
const PER_EXTRA_STOP_MINUTES: i64 = 8;

/// Terminal result of one dispatch loop
#[derive(Debug)]
pub enum DispatchOutcome {
    /// A partner accepted; the assignment is live
    Assigned { assignment: DeliveryAssignment },
    /// Attempts exhausted on a group; members released for solo dispatch
    Disbanded { requeued: Vec<String> },
    /// Attempts exhausted on a lone order; a later sweep retries it
    Abandoned,
    /// Another dispatch loop already owns this subject
    AlreadyInFlight,
}

/// A partner's answer to an offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferReply {
    Accepted,
    Rejected,
}

struct PendingOffer {
    assignment_id: String,
    partner_id: String,
    tx: oneshot::Sender<OfferReply>,
}

/// Removes the subject from the in-flight set when the loop ends,
/// normally or by panic.
struct InFlightGuard<'a> {
    set: &'a DashSet<String>,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

pub struct AssignmentScheduler {
    config: Arc<Config>,
    orders: Arc<OrderStore>,
    groups: Arc<GroupStore>,
    assignments: Arc<AssignmentStore>,
    partner_index: Arc<GeoIndex>,
    partners: Arc<dyn PartnerDirectory>,
    lifecycle: Arc<LifecycleStateMachine>,
    coordinator: Arc<ConsolidationCoordinator>,
    /// Outstanding offers keyed by subject key (one per subject)
    pending_offers: DashMap<String, PendingOffer>,
    /// Subjects with a dispatch loop running
    in_flight: DashSet<String>,
}

impl AssignmentScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        orders: Arc<OrderStore>,
        groups: Arc<GroupStore>,
        assignments: Arc<AssignmentStore>,
        partner_index: Arc<GeoIndex>,
        partners: Arc<dyn PartnerDirectory>,
        lifecycle: Arc<LifecycleStateMachine>,
        coordinator: Arc<ConsolidationCoordinator>,
    ) -> Self {
        Self {
            config,
            orders,
            groups,
            assignments,
            partner_index,
            partners,
            lifecycle,
            coordinator,
            pending_offers: DashMap::new(),
            in_flight: DashSet::new(),
        }
    }

    /// Route duration budget for a route with `stops` drop-offs
    pub fn estimated_route_duration(stops: usize) -> Duration {
        Duration::minutes(BASE_DELIVERY_MINUTES + PER_EXTRA_STOP_MINUTES * (stops as i64 - 1).max(0))
    }

    /// Run the offer loop for a subject until acceptance or exhaustion.
    pub async fn dispatch(&self, subject: DispatchSubject) -> AppResult<DispatchOutcome> {
        let key = subject.key();
        if !self.in_flight.insert(key.clone()) {
            return Ok(DispatchOutcome::AlreadyInFlight);
        }
        let _guard = InFlightGuard {
            set: &self.in_flight,
            key: key.clone(),
        };

        let (center, fallback, stops) = self.resolve_route(&subject)?;
        if stops == 0 {
            // Every member cancelled between finalize and dispatch.
            return self.exhaust(&subject, "all members cancelled before dispatch").await;
        }

        // Partners that reject or time out are deprioritized for the
        // rest of this loop; "next candidate" means someone new.
        let mut declined: HashSet<String> = HashSet::new();
        for attempt in 1..=self.config.offer_retry_budget {
            let Some((partner, assignment, rx)) = self
                .offer_once(&subject, &key, center, fallback, attempt, &declined)
                .await?
            else {
                tracing::warn!(subject = %key, attempt, "No offerable partner in range");
                break;
            };

            match tokio::time::timeout(self.config.offer_timeout_std(), rx).await {
                Ok(Ok(OfferReply::Accepted)) => {
                    let assignment = self.complete_acceptance(&subject, &assignment, &partner, stops)?;
                    return Ok(DispatchOutcome::Assigned { assignment });
                }
                Ok(Ok(OfferReply::Rejected)) => {
                    tracing::info!(
                        subject = %key,
                        partner_id = %partner.id,
                        attempt,
                        "Offer rejected"
                    );
                    declined.insert(partner.id.clone());
                    self.retire_offer(&assignment.id, AssignmentStatus::Rejected, &partner.id)
                        .await?;
                }
                Ok(Err(_)) | Err(_) => {
                    // Timed out (or the resolver side vanished): same cost
                    // as a rejection.
                    self.pending_offers.remove(&key);
                    tracing::info!(
                        subject = %key,
                        partner_id = %partner.id,
                        attempt,
                        "Offer timed out"
                    );
                    declined.insert(partner.id.clone());
                    self.retire_offer(&assignment.id, AssignmentStatus::Failed, &partner.id)
                        .await?;
                }
            }
        }

        self.exhaust(&subject, "assignment attempts exhausted").await
    }

    /// Answer the outstanding offer for a subject. The partner must be
    /// the one the offer was extended to.
    pub fn resolve_offer(
        &self,
        subject: &DispatchSubject,
        partner_id: &str,
        accepted: bool,
    ) -> AppResult<()> {
        let key = subject.key();
        let removed = self
            .pending_offers
            .remove_if(&key, |_, pending| pending.partner_id == partner_id);
        let Some((_, pending)) = removed else {
            return Err(AppError::state_conflict(
                ErrorCode::OfferNotPending,
                format!("no offer pending on {key} for partner {partner_id}"),
            ));
        };
        let reply = if accepted {
            OfferReply::Accepted
        } else {
            OfferReply::Rejected
        };
        // A send error means the dispatch loop already timed out.
        let _ = pending.tx.send(reply);
        Ok(())
    }

    /// Fail `OFFERED` assignments with no live offer entry (crash
    /// recovery) and free their partners. Returns how many were retired.
    pub async fn fail_stale_offers(&self, now: DateTime<Utc>) -> usize {
        let stale = self.assignments.stale_offered(now, self.config.offer_timeout());
        let mut retired = 0;
        for assignment in stale {
            let live = self
                .pending_offers
                .iter()
                .any(|e| e.value().assignment_id == assignment.id);
            if live {
                continue;
            }
            if let Err(e) = self
                .retire_offer(&assignment.id, AssignmentStatus::Failed, &assignment.partner_id)
                .await
            {
                tracing::error!(
                    assignment_id = %assignment.id,
                    error = %e,
                    "Failed to retire stale offer"
                );
                continue;
            }
            tracing::warn!(assignment_id = %assignment.id, "Retired stale offer");
            retired += 1;
        }
        retired
    }

    /// Whether a dispatch loop currently owns this subject
    pub fn is_in_flight(&self, subject: &DispatchSubject) -> bool {
        self.in_flight.contains(&subject.key())
    }

    /// Put an offerable partner (back) into the spatial index.
    pub fn index_partner(&self, partner: &PartnerRecord) {
        if partner.is_offerable() {
            self.partner_index.insert(
                partner.id.clone(),
                partner.current_location,
                partner.available_since,
            );
        } else {
            self.partner_index.remove(&partner.id);
        }
    }

    /// Drop-off center, fallback center, and stop count for a subject
    fn resolve_route(
        &self,
        subject: &DispatchSubject,
    ) -> AppResult<(GeoPoint, Option<GeoPoint>, usize)> {
        match subject {
            DispatchSubject::Group { group_order_id } => {
                let group = self
                    .groups
                    .get(group_order_id)
                    .ok_or_else(|| AppError::new(ErrorCode::GroupNotFound))?;
                match group.status {
                    GroupOrderStatus::Finalized => {}
                    GroupOrderStatus::Disbanded => {
                        return Err(AppError::state_conflict(
                            ErrorCode::GroupDisbanded,
                            format!("group {} was disbanded", group.id),
                        ));
                    }
                    other => {
                        return Err(AppError::invalid_transition(
                            format!("group {}", group.id),
                            other.as_str(),
                            GroupOrderStatus::Assigned.as_str(),
                        ));
                    }
                }
                let members = self.coordinator.active_members(&group);
                let fallback = members.first().map(|o| o.delivery_address);
                Ok((group.centroid, fallback, members.len()))
            }
            DispatchSubject::Order { order_id } => {
                let order = self
                    .orders
                    .get(order_id)
                    .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
                if order.status.is_terminal() {
                    return Err(AppError::state_conflict(
                        ErrorCode::InvalidTransition,
                        format!("order {} is already {}", order.id, order.status),
                    ));
                }
                if order.group_order_id.is_some() {
                    return Err(AppError::invalid_request(format!(
                        "order {} is grouped; dispatch its group instead",
                        order.id
                    )));
                }
                Ok((order.delivery_address, None, 1))
            }
        }
    }

    /// Reserve the nearest offerable partner and extend one offer.
    async fn offer_once(
        &self,
        subject: &DispatchSubject,
        key: &str,
        center: GeoPoint,
        fallback: Option<GeoPoint>,
        attempt: u32,
        declined: &HashSet<String>,
    ) -> AppResult<Option<(PartnerRecord, DeliveryAssignment, oneshot::Receiver<OfferReply>)>> {
        let mut hits = self
            .partner_index
            .query(center, self.config.partner_search_radius_km);
        if hits.is_empty() {
            if let Some(fallback) = fallback {
                hits = self
                    .partner_index
                    .query(fallback, self.config.partner_search_radius_km);
            }
        }
        // Partners that already declined this dispatch sort last: they
        // are only re-offered when nobody fresh is in range.
        hits.sort_by_key(|hit| declined.contains(&hit.id));

        for hit in hits {
            // Reservation is the authority; a lost race just moves on to
            // the next candidate without consuming the attempt.
            match self.partners.reserve(&hit.id).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) if e.code == ErrorCode::PartnerNotFound => {
                    self.partner_index.remove(&hit.id);
                    continue;
                }
                Err(e) => return Err(e),
            }
            self.partner_index.remove(&hit.id);
            let partner = self.partners.get(&hit.id).await?;

            // A snapshot older than the staleness bound is not trusted:
            // the partner stays out of the index until it pings again.
            let max_snapshot_age = Duration::seconds(self.config.directory_staleness_secs as i64);
            if Utc::now() - partner.updated_at > max_snapshot_age {
                tracing::debug!(partner_id = %partner.id, "Partner snapshot stale; skipped");
                self.partners.release(&partner.id).await?;
                continue;
            }

            let assignment = DeliveryAssignment {
                id: Uuid::new_v4().to_string(),
                subject: subject.clone(),
                partner_id: partner.id.clone(),
                status: AssignmentStatus::Offered,
                attempt,
                offered_at: Utc::now(),
                accepted_at: None,
                estimated_delivery_time: None,
                version: 0,
            };
            self.assignments.insert_new(assignment.clone())?;

            let (tx, rx) = oneshot::channel();
            self.pending_offers.insert(
                key.to_string(),
                PendingOffer {
                    assignment_id: assignment.id.clone(),
                    partner_id: partner.id.clone(),
                    tx,
                },
            );
            self.lifecycle.emit(
                &assignment.id,
                AssignmentStatus::Offered.as_str(),
                assignment.version,
                DispatchEventKind::PartnerOffered {
                    assignment_id: assignment.id.clone(),
                    partner_id: partner.id.clone(),
                    subject: key.to_string(),
                    attempt,
                },
            );
            tracing::info!(
                subject = %key,
                partner_id = %partner.id,
                assignment_id = %assignment.id,
                attempt,
                "Offer extended"
            );
            return Ok(Some((partner, assignment, rx)));
        }
        Ok(None)
    }

    /// Acceptance bookkeeping: assignment, subject, members, ETA.
    fn complete_acceptance(
        &self,
        subject: &DispatchSubject,
        assignment: &DeliveryAssignment,
        partner: &PartnerRecord,
        stops: usize,
    ) -> AppResult<DeliveryAssignment> {
        self.lifecycle
            .transition_assignment(&assignment.id, AssignmentStatus::Accepted, None)?;
        let eta = Utc::now() + Self::estimated_route_duration(stops);
        self.assignments.update(&assignment.id, |a| {
            a.estimated_delivery_time = Some(eta);
            Ok(())
        })?;
        // Acceptance puts the delivery in progress immediately; pickup
        // and drop-off are tracked on the subject, not the assignment.
        let assignment =
            self.lifecycle
                .transition_assignment(&assignment.id, AssignmentStatus::InProgress, None)?;

        match subject {
            DispatchSubject::Group { group_order_id } => {
                self.groups.update(group_order_id, |g| {
                    g.assigned_partner_id = Some(partner.id.clone());
                    Ok(())
                })?;
                let group = self.lifecycle.transition_group(
                    group_order_id,
                    GroupOrderStatus::Assigned,
                    Some(DispatchEventKind::DeliveryAssigned {
                        assignment_id: assignment.id.clone(),
                        partner_id: partner.id.clone(),
                        subject: subject.key(),
                        estimated_delivery_time: Some(eta.timestamp_millis()),
                    }),
                )?;
                for member in self.coordinator.active_members(&group) {
                    self.orders.update(&member.id, |o| {
                        o.delivery_partner_id = Some(partner.id.clone());
                        o.estimated_delivery_time = Some(eta);
                        Ok(())
                    })?;
                }
            }
            DispatchSubject::Order { order_id } => {
                let order = self.orders.update(order_id, |o| {
                    o.delivery_partner_id = Some(partner.id.clone());
                    o.estimated_delivery_time = Some(eta);
                    Ok(())
                })?;
                self.lifecycle.emit(
                    order_id,
                    "ASSIGNED",
                    order.version,
                    DispatchEventKind::DeliveryAssigned {
                        assignment_id: assignment.id.clone(),
                        partner_id: partner.id.clone(),
                        subject: subject.key(),
                        estimated_delivery_time: Some(eta.timestamp_millis()),
                    },
                );
            }
        }
        tracing::info!(
            subject = %subject.key(),
            partner_id = %partner.id,
            assignment_id = %assignment.id,
            "Delivery assigned"
        );
        Ok(assignment)
    }

    /// Close out a declined or expired offer and free the partner.
    async fn retire_offer(
        &self,
        assignment_id: &str,
        status: AssignmentStatus,
        partner_id: &str,
    ) -> AppResult<()> {
        self.lifecycle
            .transition_assignment(assignment_id, status, None)?;
        match self.partners.release(partner_id).await {
            Ok(partner) => self.index_partner(&partner),
            Err(e) if e.code == ErrorCode::PartnerNotFound => {}
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Exhaustion path: groups disband and release members; lone orders
    /// wait for a sweep retry.
    async fn exhaust(&self, subject: &DispatchSubject, reason: &str) -> AppResult<DispatchOutcome> {
        match subject {
            DispatchSubject::Group { group_order_id } => {
                let requeued = self.coordinator.disband(group_order_id, reason).await?;
                Ok(DispatchOutcome::Disbanded { requeued })
            }
            DispatchSubject::Order { order_id } => {
                tracing::warn!(order_id = %order_id, reason = %reason, "Solo dispatch abandoned");
                Ok(DispatchOutcome::Abandoned)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryPartnerDirectory;
    use rust_decimal::Decimal;
    use shared::models::{Order, OrderItem, OrderStatus};
    use tokio::sync::broadcast;

    struct Fixture {
        scheduler: Arc<AssignmentScheduler>,
        orders: Arc<OrderStore>,
        partners: Arc<InMemoryPartnerDirectory>,
    }

    fn fixture() -> Fixture {
        let config = Arc::new(Config::for_tests());
        let orders = Arc::new(OrderStore::new());
        let groups = Arc::new(GroupStore::new());
        let assignments = Arc::new(AssignmentStore::new());
        let (tx, _rx) = broadcast::channel(256);
        let lifecycle = Arc::new(LifecycleStateMachine::new(
            orders.clone(),
            groups.clone(),
            assignments.clone(),
            tx,
        ));
        let coordinator = Arc::new(ConsolidationCoordinator::new(
            config.clone(),
            orders.clone(),
            groups.clone(),
            Arc::new(GeoIndex::new()),
            lifecycle.clone(),
            Arc::new(crate::directory::InMemoryRestaurantDirectory::new()),
        ));
        let partners = Arc::new(InMemoryPartnerDirectory::new());
        let scheduler = Arc::new(AssignmentScheduler::new(
            config,
            orders.clone(),
            groups,
            assignments,
            Arc::new(GeoIndex::new()),
            partners.clone(),
            lifecycle,
            coordinator,
        ));
        Fixture {
            scheduler,
            orders,
            partners,
        }
    }

    fn sample_order(id: &str) -> Order {
        Order {
            id: id.to_string(),
            user_id: "u-1".into(),
            restaurant_id: "r-1".into(),
            delivery_address: GeoPoint::new(40.4168, -3.7038),
            items: vec![OrderItem {
                name: "Croquetas".into(),
                quantity: 6,
                unit_price: Decimal::new(150, 2),
            }],
            total_amount: Decimal::new(900, 2),
            delivery_fee: None,
            special_instructions: None,
            order_time: Utc::now(),
            status: OrderStatus::Confirmed,
            group_order_id: None,
            delivery_partner_id: None,
            tracking_id: format!("t-{id}"),
            estimated_delivery_time: None,
            version: 0,
        }
    }

    async fn seed_partner(f: &Fixture, id: &str) {
        let partner = PartnerRecord {
            id: id.to_string(),
            name: format!("Partner {id}"),
            current_location: GeoPoint::new(40.4170, -3.7040),
            capacity: 4,
            busy: false,
            available_since: Utc::now(),
            updated_at: Utc::now(),
        };
        f.partners.upsert(partner.clone()).await.unwrap();
        f.scheduler.index_partner(&partner);
    }

    /// Yield until the dispatch loop has an offer on the table.
    async fn wait_for_offer(scheduler: &AssignmentScheduler, key: &str) -> String {
        for _ in 0..1000 {
            if let Some(entry) = scheduler.pending_offers.get(key) {
                return entry.assignment_id.clone();
            }
            tokio::task::yield_now().await;
        }
        panic!("no offer appeared for {key}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_offer_assigns_delivery() {
        let f = fixture();
        f.orders.insert_new(sample_order("o-1")).unwrap();
        seed_partner(&f, "p-1").await;

        let scheduler = f.scheduler.clone();
        let subject = DispatchSubject::Order {
            order_id: "o-1".into(),
        };
        let handle = {
            let subject = subject.clone();
            tokio::spawn(async move { scheduler.dispatch(subject).await })
        };

        wait_for_offer(&f.scheduler, &subject.key()).await;
        f.scheduler.resolve_offer(&subject, "p-1", true).unwrap();

        let outcome = handle.await.unwrap().unwrap();
        let DispatchOutcome::Assigned { assignment } = outcome else {
            panic!("expected assignment");
        };
        assert_eq!(assignment.status, AssignmentStatus::InProgress);
        assert!(assignment.estimated_delivery_time.is_some());

        let order = f.orders.get("o-1").unwrap();
        assert_eq!(order.delivery_partner_id.as_deref(), Some("p-1"));
        assert!(order.estimated_delivery_time.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_moves_to_next_partner() {
        let f = fixture();
        f.orders.insert_new(sample_order("o-1")).unwrap();
        seed_partner(&f, "p-1").await;
        seed_partner(&f, "p-2").await;

        let scheduler = f.scheduler.clone();
        let subject = DispatchSubject::Order {
            order_id: "o-1".into(),
        };
        let handle = {
            let subject = subject.clone();
            tokio::spawn(async move { scheduler.dispatch(subject).await })
        };

        let first = wait_for_offer(&f.scheduler, &subject.key()).await;
        let first_partner = f.scheduler.assignments.get(&first).unwrap().partner_id;
        f.scheduler
            .resolve_offer(&subject, &first_partner, false)
            .unwrap();

        let second = wait_for_offer(&f.scheduler, &subject.key()).await;
        assert_ne!(first, second);
        let second_partner = f.scheduler.assignments.get(&second).unwrap().partner_id;
        assert_ne!(first_partner, second_partner);
        f.scheduler
            .resolve_offer(&subject, &second_partner, true)
            .unwrap();

        let outcome = handle.await.unwrap().unwrap();
        assert!(matches!(outcome, DispatchOutcome::Assigned { .. }));
        // The rejecting partner is offerable again
        let rejected = f.partners.get(&first_partner).await.unwrap();
        assert!(!rejected.busy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_partner_abandons_solo_dispatch() {
        let f = fixture();
        f.orders.insert_new(sample_order("o-1")).unwrap();

        let outcome = f
            .scheduler
            .dispatch(DispatchSubject::Order {
                order_id: "o-1".into(),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::Abandoned));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_partner_times_out_and_attempt_is_consumed() {
        let f = fixture();
        f.orders.insert_new(sample_order("o-1")).unwrap();
        seed_partner(&f, "p-1").await;

        // No resolver: paused time auto-advances through each 45s offer
        // window until every attempt has failed.
        let outcome = f
            .scheduler
            .dispatch(DispatchSubject::Order {
                order_id: "o-1".into(),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::Abandoned));

        // Partner freed after the failed offers
        let partner = f.partners.get("p-1").await.unwrap();
        assert!(!partner.busy);
    }

    #[tokio::test]
    async fn test_stale_partner_snapshot_is_not_offered() {
        let f = fixture();
        f.orders.insert_new(sample_order("o-1")).unwrap();
        // Last ping three hours ago, past the one-hour test bound.
        let stale_since = Utc::now() - Duration::hours(3);
        let partner = PartnerRecord {
            id: "p-stale".into(),
            name: "Partner p-stale".into(),
            current_location: GeoPoint::new(40.4170, -3.7040),
            capacity: 4,
            busy: false,
            available_since: stale_since,
            updated_at: stale_since,
        };
        f.partners.upsert(partner.clone()).await.unwrap();
        f.scheduler.index_partner(&partner);

        let outcome = f
            .scheduler
            .dispatch(DispatchSubject::Order {
                order_id: "o-1".into(),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::Abandoned));
        // No offer went out; the partner left the index until it pings.
        assert!(f.scheduler.assignments.is_empty());
        assert!(!f.scheduler.partner_index.contains("p-stale"));
        assert!(!f.partners.get("p-stale").await.unwrap().busy);
    }

    #[tokio::test]
    async fn test_resolve_offer_requires_matching_partner() {
        let f = fixture();
        f.orders.insert_new(sample_order("o-1")).unwrap();
        seed_partner(&f, "p-1").await;

        let scheduler = f.scheduler.clone();
        let subject = DispatchSubject::Order {
            order_id: "o-1".into(),
        };
        let handle = {
            let subject = subject.clone();
            tokio::spawn(async move { scheduler.dispatch(subject).await })
        };

        wait_for_offer(&f.scheduler, &subject.key()).await;
        let err = f
            .scheduler
            .resolve_offer(&subject, "p-other", true)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OfferNotPending);

        // The real partner can still accept
        f.scheduler.resolve_offer(&subject, "p-1", true).unwrap();
        let outcome = handle.await.unwrap().unwrap();
        assert!(matches!(outcome, DispatchOutcome::Assigned { .. }));
    }
}
