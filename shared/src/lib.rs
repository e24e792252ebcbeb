//! Shared types for the dispatch engine
//!
//! Common types used across crates: domain models, status enums,
//! geo primitives, error types, response structures, and domain events.

pub mod error;
pub mod event;
pub mod geo;
pub mod models;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};

// Error re-exports (for convenient access)
pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Event re-exports
pub use event::{DispatchEvent, DispatchEventKind};

// Geo re-exports
pub use geo::GeoPoint;
