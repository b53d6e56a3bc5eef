//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::OrderNotFound => StatusCode::NOT_FOUND,

            Self::NotAuthenticated
            | Self::TokenExpired
            | Self::TokenInvalid
            | Self::TrackingTokenInvalid => StatusCode::UNAUTHORIZED,

            Self::TopicKeyInvalid => StatusCode::BAD_REQUEST,

            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
