//! External collaborator seams
//!
//! The engine talks to the restaurant registry, the partner registry,
//! and the notification channel through traits so deployments can swap
//! the in-memory implementations for remote ones. The in-memory
//! implementations are authoritative in a single-node deployment.

mod notify;
mod partner;
mod restaurant;

pub use notify::{LoggingSink, NotificationSink, pump_events};
pub use partner::{InMemoryPartnerDirectory, PartnerDirectory};
pub use restaurant::{InMemoryRestaurantDirectory, RestaurantDirectory};
