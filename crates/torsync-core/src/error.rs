//! Error types for the torrent domain model.

use thiserror::Error;

/// Primary error type for domain model parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Info hash was not a 40 or 64 character hex string.
    #[error("invalid info hash")]
    InvalidInfoHash {
        /// Offending value.
        value: String,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Status code did not match the enumeration contract.
    #[error("unknown torrent status code")]
    UnknownStatusCode {
        /// Offending code.
        code: i16,
    },
}

/// Convenience alias for domain model results.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_error_messages_are_constant() {
        let hash = CoreError::InvalidInfoHash {
            value: "xyz".into(),
            reason: "length",
        };
        assert_eq!(hash.to_string(), "invalid info hash");
        assert_eq!(
            CoreError::UnknownStatusCode { code: 99 }.to_string(),
            "unknown torrent status code"
        );
    }
}
