//! Unified error system for the dispatch engine
//!
//! This module provides a comprehensive error handling system with:
//! - [`ErrorCode`]: Standardized error codes for all error types
//! - [`ErrorCategory`]: Classification of errors by domain
//! - [`AppError`]: Rich error type with codes, messages, and details
//! - [`ApiResponse`]: Unified API response format
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 4xxx: Order errors
//! - 5xxx: Group errors
//! - 6xxx: Assignment errors
//! - 7xxx: Directory errors
//! - 9xxx: System errors
//!
//! # Contention vs. failure
//!
//! Codes where [`ErrorCode::is_retryable`] returns `true` are expected
//! contention (a candidate claimed concurrently, a stale directory read),
//! not system failures. Callers retry from a fresh read instead of
//! surfacing them.
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ApiResponse};
//!
//! // Create a simple error
//! let err = AppError::new(ErrorCode::NotFound);
//!
//! // Create an error with custom message
//! let err = AppError::with_message(ErrorCode::ValidationFailed, "Latitude out of range");
//!
//! // Create an error with details
//! let err = AppError::validation("Malformed coordinates")
//!     .with_detail("field", "delivery_address");
//!
//! // Convert to API response
//! let response = ApiResponse::<()>::error(&err);
//! ```

mod category;
mod codes;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};
