//! Order store - claim CAS lives here

use dashmap::DashMap;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::Order;

/// Versioned order store
///
/// The group-membership claim is an atomic compare-and-set on
/// `group_order_id` performed under the entry lock: a candidate can be
/// claimed exactly once, and the claim is immediately visible to every
/// concurrent matcher/coordinator call.
#[derive(Debug, Default)]
pub struct OrderStore {
    orders: DashMap<String, Order>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
        }
    }

    /// Insert a new order.
    ///
    /// Pre: no order with this id exists. Post: the order is visible to
    /// all readers at its initial version.
    pub fn insert_new(&self, order: Order) -> AppResult<()> {
        use dashmap::mapref::entry::Entry;
        match self.orders.entry(order.id.clone()) {
            Entry::Occupied(_) => Err(AppError::already_exists(format!("order {}", order.id))),
            Entry::Vacant(v) => {
                v.insert(order);
                Ok(())
            }
        }
    }

    /// Fetch a snapshot of an order
    pub fn get(&self, id: &str) -> Option<Order> {
        self.orders.get(id).map(|o| o.clone())
    }

    /// Whether an order exists
    pub fn contains(&self, id: &str) -> bool {
        self.orders.contains_key(id)
    }

    /// Apply a mutation and bump the version.
    ///
    /// Pre: the order exists and `f` upholds its own invariants.
    /// Post: version incremented by exactly one; returns the updated
    /// snapshot. No version bump if `f` fails.
    pub fn update(
        &self,
        id: &str,
        f: impl FnOnce(&mut Order) -> AppResult<()>,
    ) -> AppResult<Order> {
        let mut entry = self
            .orders
            .get_mut(id)
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
        let order = entry.value_mut();
        f(order)?;
        order.version += 1;
        Ok(order.clone())
    }

    /// Atomically claim an order for a group (compare-and-set).
    ///
    /// Pre: none (races are expected). Post: on success the order's
    /// `group_order_id` is `group_id` and no concurrent claim can succeed;
    /// on `CandidateClaimed` the order was no longer an eligible candidate
    /// and is unchanged.
    pub fn try_claim(&self, order_id: &str, group_id: &str) -> AppResult<Order> {
        let mut entry = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
        let order = entry.value_mut();
        if !order.status.is_mergeable() || order.group_order_id.is_some() {
            return Err(AppError::state_conflict(
                ErrorCode::CandidateClaimed,
                format!("order {} is no longer an eligible candidate", order_id),
            ));
        }
        order.group_order_id = Some(group_id.to_string());
        order.version += 1;
        Ok(order.clone())
    }

    /// Release a claim after a disband.
    ///
    /// Pre: the order was claimed by `group_id` (a mismatched or missing
    /// claim is a no-op: the order may have been re-claimed legitimately).
    /// Post: the order is unclaimed and re-eligible if its status allows.
    pub fn release_claim(&self, order_id: &str, group_id: &str) {
        if let Some(mut entry) = self.orders.get_mut(order_id) {
            let order = entry.value_mut();
            if order.group_order_id.as_deref() == Some(group_id) {
                order.group_order_id = None;
                order.version += 1;
            }
        }
    }

    /// Snapshot of all orders (sweep scans)
    pub fn all(&self) -> Vec<Order> {
        self.orders.iter().map(|o| o.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
