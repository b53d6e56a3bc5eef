//! Error codes returned by the realtime endpoints
//!
//! Error codes are organized by category:
//! - 1xxx: Authentication errors
//! - 4xxx: Order errors
//! - 6xxx: Realtime channel errors
//! - 9xxx: System errors

use serde::Serialize;
use std::fmt;

/// Unified error code enum
///
/// Represented as u16 values on the wire so browser clients can switch on
/// plain numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,
    /// Tracking token does not match the order
    TrackingTokenInvalid = 1008,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,

    // ==================== 6xxx: Realtime ====================
    /// Topic key is empty after normalization
    TopicKeyInvalid = 6001,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            ErrorCode::NotAuthenticated => "Caller is not authenticated",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",
            ErrorCode::TrackingTokenInvalid => "Tracking token is invalid",

            ErrorCode::OrderNotFound => "Order not found",

            ErrorCode::TopicKeyInvalid => "Subscription key is empty",

            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
