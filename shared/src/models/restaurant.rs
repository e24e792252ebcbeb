//! Restaurant directory record (read model)

use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};

/// A restaurant snapshot from the external directory
///
/// A closed restaurant removes its orders from merge eligibility; the
/// engine never mutates this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestaurantRecord {
    /// Restaurant unique ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Restaurant location
    pub location: GeoPoint,
    /// Whether the restaurant is currently open
    pub is_open: bool,
    /// Whether the restaurant accepts online orders at all
    pub accepts_online_orders: bool,
}

impl RestaurantRecord {
    /// Whether orders for this restaurant may be accepted and merged
    pub fn accepts_orders(&self) -> bool {
        self.is_open && self.accepts_online_orders
    }
}
