//! End-to-end engine scenarios
//!
//! Each test drives the engine the way the HTTP layer does: submit
//! orders, advance the clock past the formation window, answer partner
//! offers, and walk the delivery milestones. Time is paused; sweeps run
//! with a synthetic `now` and offer timeouts auto-advance.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::broadcast;

use dispatch_server::core::Config;
use dispatch_server::directory::{
    InMemoryPartnerDirectory, InMemoryRestaurantDirectory, PartnerDirectory, RestaurantDirectory,
};
use dispatch_server::engine::{DispatchEngine, SubmitOrder};
use shared::event::{DispatchEvent, DispatchEventKind};
use shared::geo::GeoPoint;
use shared::models::{
    DispatchSubject, GroupOrderStatus, OrderItem, OrderStatus, PartnerRecord, RestaurantRecord,
};

struct Harness {
    engine: Arc<DispatchEngine>,
    partners: Arc<InMemoryPartnerDirectory>,
    events: broadcast::Receiver<DispatchEvent>,
}

async fn harness() -> Harness {
    let config = Arc::new(Config::for_tests());
    let restaurants = Arc::new(InMemoryRestaurantDirectory::new());
    let partners = Arc::new(InMemoryPartnerDirectory::new());
    restaurants
        .upsert(RestaurantRecord {
            id: "r-1".into(),
            name: "Casa Mingo".into(),
            location: GeoPoint::new(40.4150, -3.7030),
            is_open: true,
            accepts_online_orders: true,
        })
        .await
        .unwrap();
    let engine = DispatchEngine::new(
        config,
        restaurants.clone() as Arc<dyn RestaurantDirectory>,
        partners.clone() as Arc<dyn PartnerDirectory>,
    );
    let events = engine.subscribe_events();
    Harness {
        engine,
        partners,
        events,
    }
}

fn order(id: &str, lat: f64, lng: f64) -> SubmitOrder {
    SubmitOrder {
        id: Some(id.into()),
        user_id: format!("u-{id}"),
        restaurant_id: "r-1".into(),
        delivery_address: GeoPoint::new(lat, lng),
        items: vec![OrderItem {
            name: "Ramen".into(),
            quantity: 1,
            unit_price: Decimal::new(1250, 2),
        }],
        total_amount: Decimal::new(1250, 2),
        delivery_fee: None,
        special_instructions: None,
    }
}

fn partner(id: &str, lat: f64, lng: f64) -> PartnerRecord {
    let now = Utc::now();
    PartnerRecord {
        id: id.into(),
        name: format!("Partner {id}"),
        current_location: GeoPoint::new(lat, lng),
        capacity: 1,
        busy: false,
        available_since: now,
        updated_at: now,
    }
}

/// Skip events until one of the wanted kind arrives
async fn next_event(rx: &mut broadcast::Receiver<DispatchEvent>, want: &str) -> DispatchEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(600), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event stream closed");
        if event.kind.name() == want {
            return event;
        }
    }
}

fn past_deadline() -> chrono::DateTime<Utc> {
    Utc::now() + chrono::Duration::seconds(181)
}

#[tokio::test(start_paused = true)]
async fn three_orders_merge_and_deliver_together() {
    let mut h = harness().await;
    h.engine
        .upsert_partner(partner("p-1", 40.4160, -3.7040))
        .await
        .unwrap();

    h.engine
        .submit_order(order("o-1", 40.4160, -3.7040))
        .await
        .unwrap();
    h.engine
        .submit_order(order("o-2", 40.4165, -3.7045))
        .await
        .unwrap();
    let o3 = h
        .engine
        .submit_order(order("o-3", 40.4158, -3.7035))
        .await
        .unwrap();

    let group_id = o3.group_order_id.clone().expect("third order joins the group");
    let view = h.engine.group_status(&group_id).unwrap();
    assert_eq!(view.members.len(), 3);
    assert_eq!(view.group.status, GroupOrderStatus::Forming);

    let handles = h.engine.run_sweeps(past_deadline());
    let offered = next_event(&mut h.events, "PARTNER_OFFERED").await;
    let DispatchEventKind::PartnerOffered { partner_id, .. } = offered.kind else {
        unreachable!()
    };
    assert_eq!(partner_id, "p-1");
    let subject = DispatchSubject::Group {
        group_order_id: group_id.clone(),
    };
    h.engine.on_partner_offer(&partner_id, &subject, true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }

    let view = h.engine.group_status(&group_id).unwrap();
    assert_eq!(view.group.status, GroupOrderStatus::Assigned);
    assert_eq!(view.group.assigned_partner_id.as_deref(), Some("p-1"));
    for member in &view.members {
        assert_eq!(member.delivery_partner_id.as_deref(), Some("p-1"));
        assert!(member.estimated_delivery_time.is_some());
    }

    // Walk the delivery milestones to completion.
    for member in &view.members {
        h.engine
            .update_order_status(&member.id, OrderStatus::Confirmed)
            .unwrap();
        h.engine
            .update_order_status(&member.id, OrderStatus::Preparing)
            .unwrap();
        h.engine
            .update_order_status(&member.id, OrderStatus::Ready)
            .unwrap();
    }
    let view = h.engine.mark_group_picked_up(&group_id).await.unwrap();
    assert_eq!(view.group.status, GroupOrderStatus::InTransit);
    h.engine.mark_group_in_transit(&group_id).await.unwrap();
    let view = h.engine.mark_group_delivered(&group_id).await.unwrap();
    assert_eq!(view.group.status, GroupOrderStatus::Completed);
    assert!(view
        .members
        .iter()
        .all(|m| m.status == OrderStatus::Delivered));
    assert!(!h.partners.get("p-1").await.unwrap().busy);
}

#[tokio::test(start_paused = true)]
async fn cancelling_one_member_after_finalize_keeps_the_rest_moving() {
    let mut h = harness().await;
    h.engine
        .upsert_partner(partner("p-1", 40.4160, -3.7040))
        .await
        .unwrap();

    h.engine
        .submit_order(order("o-1", 40.4160, -3.7040))
        .await
        .unwrap();
    h.engine
        .submit_order(order("o-2", 40.4165, -3.7045))
        .await
        .unwrap();
    let o3 = h
        .engine
        .submit_order(order("o-3", 40.4158, -3.7035))
        .await
        .unwrap();
    let group_id = o3.group_order_id.clone().unwrap();

    let handles = h.engine.run_sweeps(past_deadline());
    let offered = next_event(&mut h.events, "PARTNER_OFFERED").await;
    let DispatchEventKind::PartnerOffered { partner_id, .. } = offered.kind else {
        unreachable!()
    };
    // Membership is frozen now; a member cancelled here drops out of
    // the delivery but keeps its seat in the group.
    h.engine.cancel_order("o-3").await.unwrap();
    let subject = DispatchSubject::Group {
        group_order_id: group_id.clone(),
    };
    h.engine.on_partner_offer(&partner_id, &subject, true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }

    let view = h.engine.group_status(&group_id).unwrap();
    assert_eq!(view.group.status, GroupOrderStatus::Assigned);
    assert_eq!(view.group.member_count(), 3);
    let cancelled = h.engine.get_order("o-3").unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(cancelled.delivery_partner_id.is_none());

    for id in ["o-1", "o-2"] {
        h.engine.update_order_status(id, OrderStatus::Confirmed).unwrap();
        h.engine.update_order_status(id, OrderStatus::Preparing).unwrap();
        h.engine.update_order_status(id, OrderStatus::Ready).unwrap();
    }
    h.engine.mark_group_picked_up(&group_id).await.unwrap();
    h.engine.mark_group_in_transit(&group_id).await.unwrap();
    let view = h.engine.mark_group_delivered(&group_id).await.unwrap();
    assert_eq!(view.group.status, GroupOrderStatus::Completed);
    for id in ["o-1", "o-2"] {
        assert_eq!(h.engine.get_order(id).unwrap().status, OrderStatus::Delivered);
    }
    // The cancelled member never advanced.
    assert_eq!(
        h.engine.get_order("o-3").unwrap().status,
        OrderStatus::Cancelled
    );
}

#[tokio::test(start_paused = true)]
async fn lone_order_dispatches_solo_without_a_group() {
    let mut h = harness().await;
    h.engine
        .upsert_partner(partner("p-1", 40.4160, -3.7040))
        .await
        .unwrap();

    let submitted = h
        .engine
        .submit_order(order("o-1", 40.4160, -3.7040))
        .await
        .unwrap();
    assert!(submitted.group_order_id.is_none());
    let (_, groups, _) = h.engine.store_sizes();
    assert_eq!(groups, 0);

    let handles = h.engine.run_sweeps(past_deadline());
    let offered = next_event(&mut h.events, "PARTNER_OFFERED").await;
    let DispatchEventKind::PartnerOffered { partner_id, .. } = offered.kind else {
        unreachable!()
    };
    let subject = DispatchSubject::Order {
        order_id: "o-1".into(),
    };
    h.engine.on_partner_offer(&partner_id, &subject, true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }

    let delivered_to = h.engine.get_order("o-1").unwrap();
    assert_eq!(delivered_to.delivery_partner_id.as_deref(), Some("p-1"));
    assert!(delivered_to.group_order_id.is_none());
    // Solo dispatch never creates a group order.
    let (_, groups, _) = h.engine.store_sizes();
    assert_eq!(groups, 0);
}

#[tokio::test]
async fn cancelling_every_member_disbands_the_group() {
    let h = harness().await;

    h.engine
        .submit_order(order("o-1", 40.4160, -3.7040))
        .await
        .unwrap();
    let o2 = h
        .engine
        .submit_order(order("o-2", 40.4165, -3.7045))
        .await
        .unwrap();
    let group_id = o2.group_order_id.clone().expect("second order forms a group");

    let cancelled = h.engine.cancel_order("o-1").await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    let view = h.engine.group_status(&group_id).unwrap();
    // A cancelled member stays in the set; the group keeps forming.
    assert_eq!(view.group.member_count(), 2);
    assert_eq!(view.group.status, GroupOrderStatus::Forming);

    h.engine.cancel_order("o-2").await.unwrap();
    let view = h.engine.group_status(&group_id).unwrap();
    assert_eq!(view.group.status, GroupOrderStatus::Disbanded);
}

#[tokio::test(start_paused = true)]
async fn rejected_offer_moves_to_the_next_partner() {
    let mut h = harness().await;
    h.engine
        .upsert_partner(partner("p-near", 40.4160, -3.7040))
        .await
        .unwrap();
    h.engine
        .upsert_partner(partner("p-far", 40.4300, -3.7100))
        .await
        .unwrap();

    h.engine
        .submit_order(order("o-1", 40.4160, -3.7040))
        .await
        .unwrap();
    let o2 = h
        .engine
        .submit_order(order("o-2", 40.4165, -3.7045))
        .await
        .unwrap();
    let group_id = o2.group_order_id.clone().unwrap();
    let subject = DispatchSubject::Group {
        group_order_id: group_id.clone(),
    };

    let handles = h.engine.run_sweeps(past_deadline());

    let first = next_event(&mut h.events, "PARTNER_OFFERED").await;
    let DispatchEventKind::PartnerOffered { partner_id, .. } = first.kind else {
        unreachable!()
    };
    assert_eq!(partner_id, "p-near");
    h.engine.on_partner_offer("p-near", &subject, false).unwrap();

    let second = next_event(&mut h.events, "PARTNER_OFFERED").await;
    let DispatchEventKind::PartnerOffered {
        partner_id,
        assignment_id,
        attempt,
        ..
    } = second.kind
    else {
        unreachable!()
    };
    assert_eq!(partner_id, "p-far");
    assert_eq!(attempt, 2);
    h.engine.on_partner_offer("p-far", &subject, true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }

    let view = h.engine.group_status(&group_id).unwrap();
    assert_eq!(view.group.status, GroupOrderStatus::Assigned);
    assert_eq!(view.group.assigned_partner_id.as_deref(), Some("p-far"));
    let assignment = h.engine.get_assignment(&assignment_id).unwrap();
    assert_eq!(assignment.attempt, 2);
    // The rejecting partner is free again.
    assert!(!h.partners.get("p-near").await.unwrap().busy);
    assert!(h.partners.get("p-far").await.unwrap().busy);
}

#[tokio::test(start_paused = true)]
async fn silent_partner_consumes_the_retry_budget() {
    let mut h = harness().await;
    h.engine
        .upsert_partner(partner("p-1", 40.4160, -3.7040))
        .await
        .unwrap();

    h.engine
        .submit_order(order("o-1", 40.4160, -3.7040))
        .await
        .unwrap();

    let handles = h.engine.run_sweeps(past_deadline());
    for handle in handles {
        handle.await.unwrap();
    }

    // Three offers went out, none answered; the dispatch was abandoned.
    let mut offered = 0;
    while let Ok(event) = h.events.try_recv() {
        if event.kind.name() == "PARTNER_OFFERED" {
            offered += 1;
        }
    }
    assert_eq!(offered, 3);

    let abandoned = h.engine.get_order("o-1").unwrap();
    assert_eq!(abandoned.status, OrderStatus::Pending);
    assert!(abandoned.delivery_partner_id.is_none());
    assert!(!h.partners.get("p-1").await.unwrap().busy);
}

#[tokio::test(start_paused = true)]
async fn exhausted_group_dispatch_disbands_and_requeues_members() {
    let mut h = harness().await;
    // No partners registered at all.

    h.engine
        .submit_order(order("o-1", 40.4160, -3.7040))
        .await
        .unwrap();
    let o2 = h
        .engine
        .submit_order(order("o-2", 40.4165, -3.7045))
        .await
        .unwrap();
    let group_id = o2.group_order_id.clone().unwrap();

    let handles = h.engine.run_sweeps(past_deadline());
    for handle in handles {
        handle.await.unwrap();
    }

    let disbanded = next_event(&mut h.events, "GROUP_DISBANDED").await;
    let DispatchEventKind::GroupDisbanded {
        member_order_ids, ..
    } = disbanded.kind
    else {
        unreachable!()
    };
    assert_eq!(member_order_ids.len(), 2);

    let view = h.engine.group_status(&group_id).unwrap();
    assert_eq!(view.group.status, GroupOrderStatus::Disbanded);
    for id in ["o-1", "o-2"] {
        let requeued = h.engine.get_order(id).unwrap();
        assert!(requeued.group_order_id.is_none());
        assert_eq!(requeued.status, OrderStatus::Pending);
    }
}

#[tokio::test]
async fn resubmitting_the_same_id_is_idempotent() {
    let h = harness().await;

    let first = h
        .engine
        .submit_order(order("o-1", 40.4160, -3.7040))
        .await
        .unwrap();
    let second = h
        .engine
        .submit_order(order("o-1", 40.4160, -3.7040))
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.tracking_id, second.tracking_id);
    let (orders, _, _) = h.engine.store_sizes();
    assert_eq!(orders, 1);
}

#[tokio::test]
async fn distant_addresses_never_share_a_group() {
    let h = harness().await;

    h.engine
        .submit_order(order("o-1", 40.4160, -3.7040))
        .await
        .unwrap();
    // ~3.3 km north of o-1, outside the 2 km pairwise radius.
    let far = h
        .engine
        .submit_order(order("o-2", 40.4460, -3.7040))
        .await
        .unwrap();
    assert!(far.group_order_id.is_none());
    let (_, groups, _) = h.engine.store_sizes();
    assert_eq!(groups, 0);
}

#[tokio::test(start_paused = true)]
async fn rebuild_restores_the_indices_from_the_stores() {
    let mut h = harness().await;
    // Registered with the directory only, so the geo index has never
    // seen this partner. Startup recovery has to find it.
    h.partners
        .upsert(partner("p-1", 40.4160, -3.7040))
        .await
        .unwrap();

    h.engine
        .submit_order(order("o-1", 40.4160, -3.7040))
        .await
        .unwrap();
    h.engine.rebuild().await.unwrap();

    // The order index survived the rebuild: a compatible order still
    // finds o-1 and forms a group.
    let o2 = h
        .engine
        .submit_order(order("o-2", 40.4165, -3.7045))
        .await
        .unwrap();
    let group_id = o2.group_order_id.clone().expect("o-1 stays mergeable");

    let handles = h.engine.run_sweeps(past_deadline());
    let offered = next_event(&mut h.events, "PARTNER_OFFERED").await;
    let DispatchEventKind::PartnerOffered { partner_id, .. } = offered.kind else {
        unreachable!()
    };
    assert_eq!(partner_id, "p-1");
    let subject = DispatchSubject::Group {
        group_order_id: group_id.clone(),
    };
    h.engine.on_partner_offer("p-1", &subject, true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }

    let view = h.engine.group_status(&group_id).unwrap();
    assert_eq!(view.group.assigned_partner_id.as_deref(), Some("p-1"));
}

#[tokio::test]
async fn tracking_id_lookup_finds_the_order() {
    let h = harness().await;
    let submitted = h
        .engine
        .submit_order(order("o-1", 40.4160, -3.7040))
        .await
        .unwrap();
    let tracked = h.engine.track_order(&submitted.tracking_id).unwrap();
    assert_eq!(tracked.id, "o-1");
}
