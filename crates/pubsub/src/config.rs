use std::time::Duration;

use ndnkit_primitives::Name;
use serde::Deserialize;

use crate::Result;

/// Naming and timing of announcements.
///
/// ```toml
/// announcement_component = "_announce"
/// list_component = "_list"
/// discovery_timeout_ms = 2000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PubSubConfig {
	/// Component appended to a topic to form its announcement prefix.
	pub announcement_component: String,
	/// Component appended to the announcement prefix for snapshot queries.
	pub list_component: String,
	/// How long each snapshot round waits for one more host to answer before
	/// the snapshot is considered complete.
	///
	/// Zero waits forever, as `default_timeout_ms` does on the client: rounds
	/// then end only on an answer or when the subscription closes, so
	/// existing publishers are still reported but discovery never completes.
	pub discovery_timeout_ms: u64,
}

impl Default for PubSubConfig {
	fn default() -> Self {
		Self {
			announcement_component: "_announce".into(),
			list_component: "_list".into(),
			discovery_timeout_ms: 2_000,
		}
	}
}

impl PubSubConfig {
	/// Parses a configuration from TOML, filling omitted fields with defaults.
	///
	/// # Errors
	///
	/// Returns [`Error::Config`](crate::Error::Config) on malformed input or
	/// unknown fields.
	pub fn from_toml_str(text: &str) -> Result<Self> {
		Ok(toml::from_str(text)?)
	}

	/// Set the snapshot round timeout. [`Duration::ZERO`] disables it.
	#[must_use]
	pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
		self.discovery_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
		self
	}

	/// Returns the snapshot round deadline, or `None` when disabled.
	pub(crate) fn discovery_timeout_duration(&self) -> Option<Duration> {
		(self.discovery_timeout_ms > 0).then(|| Duration::from_millis(self.discovery_timeout_ms))
	}

	/// Returns `<topic>/<announcement_component>`.
	pub fn announcement_prefix(&self, topic: &Name) -> Name {
		topic.append(self.announcement_component.as_str())
	}

	/// Returns the name snapshot queries are sent to.
	pub fn list_name(&self, topic: &Name) -> Name {
		self.announcement_prefix(topic).append(self.list_component.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn names_derive_from_topic() {
		let config = PubSubConfig::default();
		let topic: Name = "/subscriber".parse().expect("name");
		assert_eq!(config.announcement_prefix(&topic).to_string(), "/subscriber/_announce");
		assert_eq!(config.list_name(&topic).to_string(), "/subscriber/_announce/_list");
	}

	#[test]
	fn toml_overrides_defaults() {
		let config = PubSubConfig::from_toml_str("discovery_timeout_ms = 50\nlist_component = \"all\"").expect("config");
		assert_eq!(config.discovery_timeout_duration(), Some(Duration::from_millis(50)));
		assert_eq!(config.list_component, "all");
		assert_eq!(config.announcement_component, "_announce");
		assert!(PubSubConfig::from_toml_str("topic = \"/x\"").is_err());
	}

	#[test]
	fn zero_timeout_means_no_deadline() {
		let config = PubSubConfig::from_toml_str("discovery_timeout_ms = 0").expect("config");
		assert_eq!(config.discovery_timeout_duration(), None);
		assert_eq!(PubSubConfig::default().discovery_timeout(Duration::ZERO), config);
	}
}
