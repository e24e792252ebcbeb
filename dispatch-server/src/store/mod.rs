//! In-memory entity stores
//!
//! Explicit data-access functions with precise pre/post-conditions replace
//! derived queries: every mutation goes through a named method that states
//! what it requires and what it guarantees. Each store bumps the entity's
//! `version` on every successful mutation; versions are the dedup component
//! of emitted events and the optimistic-concurrency check for consumers.
//!
//! Maps are `DashMap`s: single-entry operations (including the order-claim
//! compare-and-set) are atomic under the entry lock. Mutation closures
//! must never touch the same map again, or they deadlock.

mod assignment;
mod group;
mod order;

pub use assignment::AssignmentStore;
pub use group::GroupStore;
pub use order::OrderStore;
