//! Error category classification

use super::codes::ErrorCode;

/// Error category derived from the leading digit of the error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Authentication errors (1xxx)
    Auth,
    /// Order errors (4xxx)
    Order,
    /// Realtime channel errors (6xxx)
    Realtime,
    /// System errors (9xxx) and anything unassigned
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            1000..2000 => Self::Auth,
            4000..5000 => Self::Order,
            6000..7000 => Self::Realtime,
            _ => Self::System,
        }
    }
}

impl ErrorCode {
    /// Get the category for this error code
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}
