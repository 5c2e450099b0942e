//! Error types for configuration loading.

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment key was absent or blank.
    #[error("missing required configuration key")]
    MissingKey {
        /// Name of the missing key.
        name: &'static str,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Key that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// The `.env` file exists but could not be parsed.
    #[error("failed to load dotenv file")]
    DotEnv {
        /// Source dotenv error.
        source: dotenvy::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, value: &str, reason: &'static str) -> Self {
        Self::InvalidField {
            field,
            value: Some(value.to_string()),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_constant() {
        let missing = ConfigError::MissingKey { name: "BOT_TOKEN" };
        assert_eq!(missing.to_string(), "missing required configuration key");

        let invalid = ConfigError::invalid("ADMIN_CHAT_ID", "abc", "not_an_integer");
        assert_eq!(invalid.to_string(), "invalid configuration field");
        assert!(matches!(
            invalid,
            ConfigError::InvalidField {
                field: "ADMIN_CHAT_ID",
                reason: "not_an_integer",
                ..
            }
        ));
    }
}
