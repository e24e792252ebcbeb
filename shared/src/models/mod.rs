//! Domain models for the dispatch engine
//!
//! Orders and group orders are the mutable core entities; partner and
//! restaurant records are read-only snapshots from the external
//! directories. Every mutable entity carries a monotonically increasing
//! `version` used for optimistic concurrency and event deduplication.

mod delivery;
mod group_order;
mod order;
mod partner;
mod restaurant;

pub use delivery::{AssignmentStatus, DeliveryAssignment, DispatchSubject};
pub use group_order::{GroupOrder, GroupOrderStatus};
pub use order::{Order, OrderItem, OrderStatus};
pub use partner::PartnerRecord;
pub use restaurant::RestaurantRecord;
