use std::fmt;

use crate::Component;

/// Opaque identity of one publisher instance within a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublisherId(pub u64);

impl PublisherId {
	/// Encodes this identity as a name component.
	pub fn to_component(self) -> Component {
		Component::from_number(self.0)
	}

	/// Decodes an identity from a decimal name component.
	pub fn from_component(component: &Component) -> Option<Self> {
		component.to_number().map(Self)
	}
}

impl From<u64> for PublisherId {
	fn from(value: u64) -> Self {
		Self(value)
	}
}

impl fmt::Display for PublisherId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}
