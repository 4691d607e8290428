//! Error types for growbox-core.
//!
//! Every failure in this crate is non-fatal by contract: pollers log it and
//! try again on the next tick, synchronized resources raise their error flag
//! and keep the last good value, and dispatchers log it without rolling back.
//!
//! ## Where errors surface
//!
//! | Error | Raised by | Effect on local state |
//! |-------|-----------|-----------------------|
//! | [`Error::Api`] | HTTP client | None; resource error flag raised |
//! | [`Error::Parse`] | Payload violating an invariant | None; treated as a fetch failure |
//! | [`Error::InvalidValue`] | Command validation | None; rejected before any write |
//! | [`Error::NoData`] | `{"error": ...}` bodies | None; treated as a fetch failure |
//! | [`Error::Backend`] | Non-HTTP backends and unexpected bodies | None |
//! | [`Error::InvalidConfig`] | Poller and client setup | Setup refused |

use thiserror::Error;

#[cfg(feature = "http-client")]
use crate::client::ApiError;

/// Errors that can occur while talking to the growbox backend.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// HTTP transport or status failure.
    #[cfg(feature = "http-client")]
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A payload broke a domain invariant.
    #[error("Invalid payload: {0}")]
    Parse(#[from] growbox_types::ParseError),

    /// A command value outside its setting's domain.
    #[error("Invalid value for {setting}: {reason}")]
    InvalidValue {
        /// Logical setting the value was meant for.
        setting: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The backend answered with an `{"error": ...}` body.
    #[error("No data: {0}")]
    NoData(String),

    /// Failure reported by a non-HTTP backend or an unexpected response body.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an invalid-value error.
    pub fn invalid_value(setting: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            setting: setting.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Result type alias using growbox-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use growbox_types::ParseError;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_value("pump-on-threshold", "101 is outside 0..=100");
        assert_eq!(
            err.to_string(),
            "Invalid value for pump-on-threshold: 101 is outside 0..=100"
        );

        let err = Error::NoData("No data".to_string());
        assert_eq!(err.to_string(), "No data: No data");

        let err = Error::invalid_config("interval must be > 0");
        assert!(err.to_string().contains("interval must be > 0"));
    }

    #[test]
    fn test_parse_error_conversion() {
        let err: Error = ParseError::InvalidStatus(3).into();
        assert!(matches!(err, Error::Parse(ParseError::InvalidStatus(3))));
        assert!(err.to_string().contains("expected 0 or 1"));
    }
}
