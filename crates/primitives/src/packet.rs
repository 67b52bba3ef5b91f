use std::time::Duration;

use bytes::Bytes;

use crate::{Component, Name};

/// A request for the data object under a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
	name: Name,
	lifetime: Option<Duration>,
	exclude: Vec<Component>,
}

impl Interest {
	/// Creates an interest for `name` with the face's default lifetime.
	pub fn new(name: Name) -> Self {
		Self {
			name,
			lifetime: None,
			exclude: Vec::new(),
		}
	}

	/// Sets how long the network should keep this interest pending.
	#[must_use]
	pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
		self.lifetime = Some(lifetime);
		self
	}

	/// Refuses data whose component right after the interest name is one of `exclude`.
	#[must_use]
	pub fn with_exclude(mut self, exclude: impl IntoIterator<Item = Component>) -> Self {
		self.exclude = exclude.into_iter().collect();
		self
	}

	/// Returns the requested name.
	pub fn name(&self) -> &Name {
		&self.name
	}

	/// Returns the requested lifetime, if any.
	pub fn lifetime(&self) -> Option<Duration> {
		self.lifetime
	}

	/// Returns the excluded components.
	pub fn exclude(&self) -> &[Component] {
		&self.exclude
	}

	/// Returns true if `data` satisfies this interest.
	pub fn matches(&self, data: &Data) -> bool {
		if !self.name.is_prefix_of(data.name()) {
			return false;
		}
		data.name().get(self.name.len()).is_none_or(|next| !self.exclude.contains(next))
	}
}

/// Signature attached to a [`Data`] packet by a signing provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
	/// Name of the certificate that produced the signature.
	pub certificate: Name,
	/// Opaque signature bytes.
	pub value: Bytes,
}

/// A named data object answering an interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
	name: Name,
	content: Bytes,
	signature: Option<Signature>,
}

impl Data {
	/// Creates an unsigned data packet.
	pub fn new(name: Name, content: impl Into<Bytes>) -> Self {
		Self {
			name,
			content: content.into(),
			signature: None,
		}
	}

	/// Returns the data name.
	pub fn name(&self) -> &Name {
		&self.name
	}

	/// Returns the payload.
	pub fn content(&self) -> &Bytes {
		&self.content
	}

	/// Returns the signature, if the packet was signed.
	pub fn signature(&self) -> Option<&Signature> {
		self.signature.as_ref()
	}

	/// Replaces the signature.
	pub fn set_signature(&mut self, signature: Signature) {
		self.signature = Some(signature);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn interest_matches_data_under_its_name() {
		let interest = Interest::new("/test/async".parse().expect("name")).with_lifetime(Duration::from_secs(1));
		assert_eq!(interest.lifetime(), Some(Duration::from_secs(1)));
		assert!(interest.matches(&Data::new("/test/async".parse().expect("name"), "...")));
		assert!(interest.matches(&Data::new("/test/async/v1".parse().expect("name"), "...")));
		assert!(!interest.matches(&Data::new("/test".parse().expect("name"), "...")));
	}

	#[test]
	fn exclude_applies_to_the_next_component() {
		let interest = Interest::new("/t".parse().expect("name")).with_exclude([Component::from("1")]);
		assert_eq!(interest.exclude(), &[Component::from("1")]);
		assert!(!interest.matches(&Data::new("/t/1/x".parse().expect("name"), "")));
		assert!(interest.matches(&Data::new("/t/2".parse().expect("name"), "")));
		assert!(interest.matches(&Data::new("/t".parse().expect("name"), "")));
	}
}
