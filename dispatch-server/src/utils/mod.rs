//! Utility module
//!
//! - [`AppError`] / [`AppResult`] - application error types (from shared::error)
//! - [`ApiResponse`] - API response envelope (from shared::error)
//! - logging setup

pub mod logger;

pub use logger::{init_logger, init_logger_with_level};
pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
