//! Error types for the store boundary.
//!
//! Everything above the connector speaks `anyhow`; these enums exist so the
//! safety guard and the retry loop can be matched on by callers and tests.

use thiserror::Error;

/// Configuration problems detected before any work starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required connection parameter is absent.
    #[error("missing configuration: {key} is not set")]
    Missing { key: &'static str },

    /// The relational target identifies itself as production-like.
    #[error("blocked environment: relational target '{target}' is on the disallow-list")]
    BlockedEnvironment { target: String },

    /// The relational target does not self-identify as non-production and
    /// the explicit opt-in flag was not given.
    #[error(
        "unconfirmed relational target '{target}': set FORCE_CONNECTION=1 if this is not production"
    )]
    UnconfirmedTarget { target: String },

    #[error("invalid connection string for {key}: {reason}")]
    InvalidUrl { key: &'static str, reason: String },
}

/// Failures surfaced by the `StoreConnector` query primitives.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0} store is not connected")]
    NotConnected(&'static str),

    #[error("relational store error: {0}")]
    Relational(#[from] sqlx::Error),

    #[error("document store error: {0}")]
    Document(#[from] mongodb::error::Error),

    /// All retry attempts failed; carries the last underlying error.
    #[error("{operation} failed after {attempts} attempts")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// True when the failure came from the safety policy or missing config.
    pub fn is_config(&self) -> bool {
        matches!(self, StoreError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_retries_report_the_cause_once() {
        let err = StoreError::RetriesExhausted {
            operation: "relational query".to_string(),
            attempts: 3,
            source: Box::new(StoreError::NotConnected("relational")),
        };
        assert_eq!(err.to_string(), "relational query failed after 3 attempts");

        let chain = format!("{:#}", anyhow::Error::from(err));
        assert_eq!(chain.matches("relational store is not connected").count(), 1);
    }
}
