//! Authentication for merchant-facing sockets

pub mod merchant_auth;

pub use merchant_auth::{MerchantClaims, bearer_token, verify_token};
