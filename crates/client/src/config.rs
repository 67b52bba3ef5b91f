//! Client configuration.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors loading a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
	/// The TOML text could not be parsed into a configuration.
	#[error("invalid client config: {0}")]
	Toml(#[from] toml::de::Error),
}

/// Configuration for a [`Client`](crate::Client).
///
/// ```toml
/// interest_lifetime_ms = 4000
/// default_timeout_ms = 10000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
	/// Lifetime requested for each expressed interest.
	pub interest_lifetime_ms: u64,
	/// Deadline applied by [`Client::get`](crate::Client::get). Zero waits forever.
	pub default_timeout_ms: u64,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			interest_lifetime_ms: 4_000,
			default_timeout_ms: 10_000,
		}
	}
}

impl ClientConfig {
	/// Parses a configuration from TOML, filling omitted fields with defaults.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::Toml`] on malformed input or unknown fields.
	pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(text)?)
	}

	/// Set the interest lifetime.
	#[must_use]
	pub fn interest_lifetime(mut self, lifetime: Duration) -> Self {
		self.interest_lifetime_ms = duration_ms(lifetime);
		self
	}

	/// Set the default request deadline. [`Duration::ZERO`] disables it.
	#[must_use]
	pub fn default_timeout(mut self, timeout: Duration) -> Self {
		self.default_timeout_ms = duration_ms(timeout);
		self
	}

	pub(crate) fn interest_lifetime_duration(&self) -> Duration {
		Duration::from_millis(self.interest_lifetime_ms)
	}

	pub(crate) fn default_timeout_duration(&self) -> Duration {
		Duration::from_millis(self.default_timeout_ms)
	}
}

fn duration_ms(d: Duration) -> u64 {
	u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn toml_overrides_defaults() {
		let config = ClientConfig::from_toml_str("default_timeout_ms = 50").expect("config");
		assert_eq!(config.default_timeout_ms, 50);
		assert_eq!(config.interest_lifetime_ms, ClientConfig::default().interest_lifetime_ms);
	}

	#[test]
	fn unknown_fields_are_rejected() {
		assert!(ClientConfig::from_toml_str("retries = 3").is_err());
	}

	#[test]
	fn builder_sets_durations() {
		let config = ClientConfig::default()
			.interest_lifetime(Duration::from_millis(250))
			.default_timeout(Duration::ZERO);
		assert_eq!(config.interest_lifetime_duration(), Duration::from_millis(250));
		assert_eq!(config.default_timeout_duration(), Duration::ZERO);
	}
}
