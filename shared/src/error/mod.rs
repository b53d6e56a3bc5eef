//! Error system for the realtime endpoints
//!
//! - [`ErrorCode`]: Standardized error codes
//! - [`ErrorCategory`]: Classification of errors by domain
//! - [`AppError`]: Error type with code and message
//! - [`ErrorResponse`]: JSON body of a rejected handshake
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ErrorResponse};
//!
//! let err = AppError::with_message(ErrorCode::TopicKeyInvalid, "session code is empty");
//! let body = ErrorResponse::from(&err);
//! assert_eq!(body.code.code(), 6001);
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::ErrorCode;
pub use types::{AppError, ErrorResponse};
