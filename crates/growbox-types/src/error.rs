//! Error types for building growbox domain values.

use thiserror::Error;

/// Errors raised when a value would break a domain invariant.
///
/// This error type is transport-agnostic; HTTP and synchronization failures
/// belong in growbox-core.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Device status outside `{0, 1}`.
    #[error("Invalid device status {0}: expected 0 or 1")]
    InvalidStatus(i64),

    /// Device name not one of the known actuators.
    #[error("Unknown device '{0}'")]
    UnknownDevice(String),

    /// Logical setting identifier not present in the mapping table.
    #[error("Unknown setting '{0}'")]
    UnknownSetting(String),

    /// Lower bound above upper bound (thresholds, alert bands, date ranges).
    #[error("Invalid range for {what}: {low} > {high}")]
    InvertedRange {
        /// What the range describes.
        what: String,
        /// The offending lower bound.
        low: String,
        /// The offending upper bound.
        high: String,
    },

    /// Catch-all for malformed values.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl ParseError {
    /// Create an inverted-range error from any displayable bounds.
    pub fn inverted(
        what: impl Into<String>,
        low: impl std::fmt::Display,
        high: impl std::fmt::Display,
    ) -> Self {
        Self::InvertedRange {
            what: what.into(),
            low: low.to_string(),
            high: high.to_string(),
        }
    }
}

/// Result type alias using growbox-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
