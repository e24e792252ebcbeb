//! Eligibility matcher - pure candidate selection
//!
//! Selection is advisory: the matcher reads snapshots and proposes a
//! candidate set, but admission is only decided by the coordinator's
//! claim compare-and-set. A candidate that looks eligible here may
//! legitimately fail to claim a moment later.

use crate::core::Config;
use crate::engine::geo_index::GeoIndex;
use crate::store::OrderStore;
use shared::models::{Order, RestaurantRecord};
use std::collections::HashMap;
use std::sync::Arc;

/// Candidate selection against the order index
#[derive(Debug, Clone)]
pub struct EligibilityMatcher {
    config: Arc<Config>,
}

impl EligibilityMatcher {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Candidates compatible with `trigger`, closest first, capped at
    /// one below the group size limit (the trigger takes the last slot).
    ///
    /// Compatibility is pairwise across the whole proposed set:
    /// - same restaurant, or open restaurants within the proximity bound
    /// - every address pair within the merge radius
    /// - every order-time pair within the merge window
    /// - still mergeable and unclaimed at snapshot time
    pub fn find_candidates(
        &self,
        trigger: &Order,
        index: &GeoIndex,
        orders: &OrderStore,
        restaurants: &HashMap<String, RestaurantRecord>,
    ) -> Vec<Order> {
        let limit = self.config.max_group_size.saturating_sub(1);
        if limit == 0 {
            return Vec::new();
        }

        let hits = index.query(trigger.delivery_address, self.config.merge_radius_km);
        let mut set: Vec<Order> = vec![trigger.clone()];
        for hit in hits {
            if set.len() > limit {
                break;
            }
            if hit.id == trigger.id {
                continue;
            }
            let Some(candidate) = orders.get(&hit.id) else {
                continue;
            };
            if !candidate.is_merge_candidate() {
                continue;
            }
            if !self.restaurants_compatible(
                &trigger.restaurant_id,
                &candidate.restaurant_id,
                restaurants,
            ) {
                continue;
            }
            if self.pairwise_compatible(&candidate, &set) {
                set.push(candidate);
            }
        }
        set.remove(0);
        set
    }

    /// Whether two restaurants may share a group: both open for orders,
    /// and either the same or within the proximity bound. A restaurant
    /// missing from the snapshot is treated as closed.
    pub fn restaurants_compatible(
        &self,
        trigger_restaurant: &str,
        candidate_restaurant: &str,
        restaurants: &HashMap<String, RestaurantRecord>,
    ) -> bool {
        let (Some(a), Some(b)) = (
            restaurants.get(trigger_restaurant),
            restaurants.get(candidate_restaurant),
        ) else {
            return false;
        };
        if !a.accepts_orders() || !b.accepts_orders() {
            return false;
        }
        trigger_restaurant == candidate_restaurant
            || a.location.distance_km(&b.location) <= self.config.restaurant_proximity_km
    }

    /// Pairwise check of `candidate` against every member of `others`.
    /// Used both for fresh selection and for late joins into a forming
    /// group.
    pub fn pairwise_compatible(&self, candidate: &Order, others: &[Order]) -> bool {
        let window = self.config.merge_window();
        others.iter().all(|other| {
            candidate
                .delivery_address
                .distance_km(&other.delivery_address)
                <= self.config.merge_radius_km
                && (candidate.order_time - other.order_time).abs() <= window
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use shared::geo::GeoPoint;
    use shared::models::{OrderItem, OrderStatus};

    fn order(id: &str, restaurant: &str, address: GeoPoint, age_secs: i64) -> Order {
        Order {
            id: id.to_string(),
            user_id: format!("u-{id}"),
            restaurant_id: restaurant.to_string(),
            delivery_address: address,
            items: vec![OrderItem {
                name: "Bocadillo".into(),
                quantity: 1,
                unit_price: Decimal::new(650, 2),
            }],
            total_amount: Decimal::new(650, 2),
            delivery_fee: None,
            special_instructions: None,
            order_time: Utc::now() - Duration::seconds(age_secs),
            status: OrderStatus::Pending,
            group_order_id: None,
            delivery_partner_id: None,
            tracking_id: format!("t-{id}"),
            estimated_delivery_time: None,
            version: 0,
        }
    }

    fn restaurant(id: &str, location: GeoPoint, open: bool) -> RestaurantRecord {
        RestaurantRecord {
            id: id.to_string(),
            name: format!("Restaurant {id}"),
            location,
            is_open: open,
            accepts_online_orders: true,
        }
    }

    fn setup() -> (
        EligibilityMatcher,
        GeoIndex,
        OrderStore,
        HashMap<String, RestaurantRecord>,
    ) {
        let config = Arc::new(Config::for_tests());
        let mut restaurants = HashMap::new();
        // r-1 and r-2 share a block; r-far is across town
        restaurants.insert("r-1".into(), restaurant("r-1", GeoPoint::new(40.4150, -3.7030), true));
        restaurants.insert("r-2".into(), restaurant("r-2", GeoPoint::new(40.4152, -3.7032), true));
        restaurants.insert("r-far".into(), restaurant("r-far", GeoPoint::new(40.4700, -3.6800), true));
        (
            EligibilityMatcher::new(config),
            GeoIndex::new(),
            OrderStore::new(),
            restaurants,
        )
    }

    fn seed(index: &GeoIndex, store: &OrderStore, o: Order) {
        index.insert(o.id.clone(), o.delivery_address, o.order_time);
        store.insert_new(o).unwrap();
    }

    #[test]
    fn test_nearby_same_restaurant_selected() {
        let (matcher, index, store, restaurants) = setup();
        let trigger = order("o-t", "r-1", GeoPoint::new(40.4168, -3.7038), 0);
        seed(&index, &store, order("o-1", "r-1", GeoPoint::new(40.4180, -3.7038), 60));
        seed(&index, &store, order("o-2", "r-far", GeoPoint::new(40.4180, -3.7038), 60));

        let candidates = matcher.find_candidates(&trigger, &index, &store, &restaurants);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "o-1");
    }

    #[test]
    fn test_colocated_restaurants_may_cogroup() {
        let (matcher, index, store, restaurants) = setup();
        let trigger = order("o-t", "r-1", GeoPoint::new(40.4168, -3.7038), 0);
        seed(&index, &store, order("o-1", "r-2", GeoPoint::new(40.4180, -3.7038), 60));

        let candidates = matcher.find_candidates(&trigger, &index, &store, &restaurants);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_closed_restaurant_excluded() {
        let (matcher, index, store, mut restaurants) = setup();
        if let Some(r) = restaurants.get_mut("r-1") {
            r.is_open = false;
        }
        let trigger = order("o-t", "r-1", GeoPoint::new(40.4168, -3.7038), 0);
        seed(&index, &store, order("o-1", "r-1", GeoPoint::new(40.4180, -3.7038), 60));

        assert!(matcher.find_candidates(&trigger, &index, &store, &restaurants).is_empty());
    }

    #[test]
    fn test_pairwise_radius_rejects_chain() {
        let (matcher, index, store, restaurants) = setup();
        // A and B are each within 2km of the trigger but ~3km apart:
        // only the closer one may join.
        let trigger = order("o-t", "r-1", GeoPoint::new(40.4168, -3.7038), 0);
        seed(&index, &store, order("o-a", "r-1", GeoPoint::new(40.4300, -3.7038), 60));
        seed(&index, &store, order("o-b", "r-1", GeoPoint::new(40.4040, -3.7038), 60));

        let candidates = matcher.find_candidates(&trigger, &index, &store, &restaurants);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_merge_window_excludes_old_orders() {
        let (matcher, index, store, restaurants) = setup();
        let trigger = order("o-t", "r-1", GeoPoint::new(40.4168, -3.7038), 0);
        seed(&index, &store, order("o-old", "r-1", GeoPoint::new(40.4180, -3.7038), 700));

        assert!(matcher.find_candidates(&trigger, &index, &store, &restaurants).is_empty());
    }

    #[test]
    fn test_capped_below_group_limit() {
        let (matcher, index, store, restaurants) = setup();
        let trigger = order("o-t", "r-1", GeoPoint::new(40.4168, -3.7038), 0);
        for i in 0..5 {
            seed(
                &index,
                &store,
                order(&format!("o-{i}"), "r-1", GeoPoint::new(40.4170, -3.7038), 60),
            );
        }

        let candidates = matcher.find_candidates(&trigger, &index, &store, &restaurants);
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn test_claimed_candidate_skipped() {
        let (matcher, index, store, restaurants) = setup();
        let trigger = order("o-t", "r-1", GeoPoint::new(40.4168, -3.7038), 0);
        seed(&index, &store, order("o-1", "r-1", GeoPoint::new(40.4180, -3.7038), 60));
        store.try_claim("o-1", "g-existing").unwrap();

        assert!(matcher.find_candidates(&trigger, &index, &store, &restaurants).is_empty());
    }
}
