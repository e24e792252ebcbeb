//! Unified error codes for the dispatch engine
//!
//! This module defines all error codes used across the engine and its API.
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Order errors
//! - 5xxx: Group errors
//! - 6xxx: Assignment errors
//! - 7xxx: Directory errors
//! - 9xxx: System errors

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Malformed geo-coordinates
    InvalidCoordinates = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order is already a member of a group
    OrderAlreadyGrouped = 4002,
    /// Order cannot be cancelled in its current state
    OrderNotCancellable = 4003,
    /// Order has already been cancelled
    OrderAlreadyCancelled = 4004,
    /// Order has already been delivered
    OrderAlreadyDelivered = 4005,
    /// Requested status transition is invalid
    InvalidTransition = 4006,
    /// Order has no items
    OrderEmpty = 4007,

    // ==================== 5xxx: Group ====================
    /// Group order not found
    GroupNotFound = 5001,
    /// Group membership is frozen (finalized or later)
    GroupSealed = 5002,
    /// Candidate was claimed by another group concurrently
    CandidateClaimed = 5003,
    /// Group has reached its size cap
    GroupFull = 5004,
    /// Group has been disbanded
    GroupDisbanded = 5005,

    // ==================== 6xxx: Assignment ====================
    /// Delivery assignment not found
    AssignmentNotFound = 6001,
    /// No partner accepted within the retry budget
    AssignmentExhausted = 6002,
    /// Partner is unavailable or could not be reserved
    PartnerUnavailable = 6003,
    /// No offer is pending for this partner/subject pair
    OfferNotPending = 6004,

    // ==================== 7xxx: Directory ====================
    /// Restaurant/partner directory unreachable
    DirectoryUnavailable = 7001,
    /// Restaurant not found in directory
    RestaurantNotFound = 7002,
    /// Restaurant is closed or not accepting online orders
    RestaurantClosed = 7003,
    /// Partner not found in directory
    PartnerNotFound = 7004,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Server is shutting down
    ShuttingDown = 9002,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Whether the caller is expected to retry after observing this code
    ///
    /// Contention codes (claim races, sealed groups) retry from a fresh
    /// read; directory codes retry with backoff. Everything else is a
    /// terminal rejection for the request that produced it.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::CandidateClaimed
                | ErrorCode::GroupSealed
                | ErrorCode::GroupFull
                | ErrorCode::DirectoryUnavailable
        )
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidCoordinates => "Malformed geo-coordinates",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderAlreadyGrouped => "Order already belongs to a group",
            ErrorCode::OrderNotCancellable => "Order cannot be cancelled in its current state",
            ErrorCode::OrderAlreadyCancelled => "Order has already been cancelled",
            ErrorCode::OrderAlreadyDelivered => "Order has already been delivered",
            ErrorCode::InvalidTransition => "Invalid status transition",
            ErrorCode::OrderEmpty => "Order has no items",

            // Group
            ErrorCode::GroupNotFound => "Group order not found",
            ErrorCode::GroupSealed => "Group membership is frozen",
            ErrorCode::CandidateClaimed => "Candidate was claimed concurrently",
            ErrorCode::GroupFull => "Group has reached its size cap",
            ErrorCode::GroupDisbanded => "Group has been disbanded",

            // Assignment
            ErrorCode::AssignmentNotFound => "Delivery assignment not found",
            ErrorCode::AssignmentExhausted => "No partner accepted within the retry budget",
            ErrorCode::PartnerUnavailable => "Partner is unavailable",
            ErrorCode::OfferNotPending => "No pending offer for this partner",

            // Directory
            ErrorCode::DirectoryUnavailable => "Directory is unreachable",
            ErrorCode::RestaurantNotFound => "Restaurant not found",
            ErrorCode::RestaurantClosed => "Restaurant is not accepting orders",
            ErrorCode::PartnerNotFound => "Partner not found",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::ShuttingDown => "Server is shutting down",
        }
    }

    /// Get the HTTP status code for this error
    pub const fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::Success => StatusCode::OK,

            ErrorCode::ValidationFailed
            | ErrorCode::InvalidRequest
            | ErrorCode::InvalidCoordinates
            | ErrorCode::RequiredField
            | ErrorCode::ValueOutOfRange
            | ErrorCode::OrderEmpty => StatusCode::BAD_REQUEST,

            ErrorCode::NotFound
            | ErrorCode::OrderNotFound
            | ErrorCode::GroupNotFound
            | ErrorCode::AssignmentNotFound
            | ErrorCode::RestaurantNotFound
            | ErrorCode::PartnerNotFound => StatusCode::NOT_FOUND,

            ErrorCode::AlreadyExists
            | ErrorCode::OrderAlreadyGrouped
            | ErrorCode::OrderAlreadyCancelled
            | ErrorCode::OrderAlreadyDelivered
            | ErrorCode::GroupSealed
            | ErrorCode::CandidateClaimed
            | ErrorCode::GroupFull
            | ErrorCode::GroupDisbanded
            | ErrorCode::InvalidTransition
            | ErrorCode::OfferNotPending => StatusCode::CONFLICT,

            ErrorCode::OrderNotCancellable | ErrorCode::RestaurantClosed => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            ErrorCode::AssignmentExhausted | ErrorCode::PartnerUnavailable => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            ErrorCode::DirectoryUnavailable
            | ErrorCode::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::Unknown | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidCoordinates),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderAlreadyGrouped),
            4003 => Ok(ErrorCode::OrderNotCancellable),
            4004 => Ok(ErrorCode::OrderAlreadyCancelled),
            4005 => Ok(ErrorCode::OrderAlreadyDelivered),
            4006 => Ok(ErrorCode::InvalidTransition),
            4007 => Ok(ErrorCode::OrderEmpty),

            // Group
            5001 => Ok(ErrorCode::GroupNotFound),
            5002 => Ok(ErrorCode::GroupSealed),
            5003 => Ok(ErrorCode::CandidateClaimed),
            5004 => Ok(ErrorCode::GroupFull),
            5005 => Ok(ErrorCode::GroupDisbanded),

            // Assignment
            6001 => Ok(ErrorCode::AssignmentNotFound),
            6002 => Ok(ErrorCode::AssignmentExhausted),
            6003 => Ok(ErrorCode::PartnerUnavailable),
            6004 => Ok(ErrorCode::OfferNotPending),

            // Directory
            7001 => Ok(ErrorCode::DirectoryUnavailable),
            7002 => Ok(ErrorCode::RestaurantNotFound),
            7003 => Ok(ErrorCode::RestaurantClosed),
            7004 => Ok(ErrorCode::PartnerNotFound),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::ShuttingDown),

            other => Err(InvalidErrorCode(other)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.message())
    }
}
