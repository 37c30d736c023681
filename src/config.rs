//! Session configuration with documented defaults.

use std::time::Duration;

use crate::error::SessionError;

/// Public hosted template dataset used when no URL is configured.
pub const DEFAULT_STORE_URL: &str =
    "https://spikeinterface-template-database.s3.us-east-2.amazonaws.com/test_templates";

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Tunable parameters of a browsing session.
///
/// All values are plain data; validation happens once in
/// [`TemplateSession::connect`](crate::session::TemplateSession::connect).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the remote store.
    pub store_url: String,

    /// Number of consecutive unit indices requested per batch.
    pub batch_size: usize,

    /// Upper bound of the unit index space. `None` takes the extent the
    /// store declares for the templates array.
    pub total_units: Option<usize>,

    /// Fraction of the best channel's peak-to-peak amplitude a channel must
    /// reach to count as active. Must lie in (0, 1].
    pub active_channel_threshold: f32,

    /// Bound on concurrent in-flight template fetches, independent of
    /// `batch_size`.
    pub max_in_flight: usize,

    /// How many times a transient connection failure is retried before a row
    /// is marked errored. Metadata and geometry fetches are never retried.
    pub retry_attempts: u32,

    /// Delay before the first retry; doubles on each further attempt.
    pub retry_base_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_url: DEFAULT_STORE_URL.to_string(),
            batch_size: 15,
            total_units: Some(100),
            active_channel_threshold: 0.5,
            max_in_flight: 8,
            retry_attempts: 2,
            retry_base_delay: Duration::from_millis(250),
        }
    }
}

impl SessionConfig {
    /// Check the parameters a session cannot run with.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.batch_size == 0 {
            return Err(SessionError::Config("batch_size must be at least 1".into()));
        }
        if self.max_in_flight == 0 {
            return Err(SessionError::Config(
                "max_in_flight must be at least 1".into(),
            ));
        }
        if !(self.active_channel_threshold > 0.0 && self.active_channel_threshold <= 1.0) {
            return Err(SessionError::Config(format!(
                "active_channel_threshold {} is outside (0, 1]",
                self.active_channel_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = SessionConfig {
            batch_size: 0,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn nan_threshold_is_rejected() {
        let config = SessionConfig {
            active_channel_threshold: f32::NAN,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
