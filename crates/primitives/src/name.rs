use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use thiserror::Error;

/// Errors produced while parsing a name from its URI form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
	/// A `%` escape was truncated or contained non-hex digits.
	#[error("invalid percent escape in name component {0:?}")]
	InvalidEscape(String),
}

/// One opaque path component of a [`Name`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Component(Bytes);

impl Component {
	/// Creates a component from raw bytes.
	pub fn new(value: impl Into<Bytes>) -> Self {
		Self(value.into())
	}

	/// Creates a component holding the decimal text of `value`.
	pub fn from_number(value: u64) -> Self {
		Self(Bytes::from(value.to_string()))
	}

	/// Returns the raw bytes of this component.
	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}

	/// Parses this component as a canonical decimal number.
	///
	/// Signs and leading zeros are rejected, so each number has exactly one
	/// component form.
	pub fn to_number(&self) -> Option<u64> {
		let digits = &self.0[..];
		if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) || (digits.len() > 1 && digits[0] == b'0') {
			return None;
		}
		std::str::from_utf8(digits).ok()?.parse().ok()
	}

	fn is_all_periods(raw: &[u8]) -> bool {
		raw.iter().all(|&b| b == b'.')
	}

	fn parse_escaped(segment: &str) -> Result<Self, NameError> {
		let raw = segment.as_bytes();
		// `...` is the empty component; every longer run of periods loses three.
		if raw.len() >= 3 && Self::is_all_periods(raw) {
			return Ok(Self(Bytes::copy_from_slice(&raw[3..])));
		}
		let mut out = Vec::with_capacity(raw.len());
		let mut i = 0;
		while i < raw.len() {
			if raw[i] == b'%' {
				let hex = raw
					.get(i + 1..i + 3)
					.filter(|h| h.iter().all(u8::is_ascii_hexdigit))
					.and_then(|h| std::str::from_utf8(h).ok())
					.and_then(|h| u8::from_str_radix(h, 16).ok())
					.ok_or_else(|| NameError::InvalidEscape(segment.to_string()))?;
				out.push(hex);
				i += 3;
			} else {
				out.push(raw[i]);
				i += 1;
			}
		}
		Ok(Self(Bytes::from(out)))
	}
}

impl From<&str> for Component {
	fn from(value: &str) -> Self {
		Self(Bytes::copy_from_slice(value.as_bytes()))
	}
}

impl From<String> for Component {
	fn from(value: String) -> Self {
		Self(Bytes::from(value))
	}
}

impl From<Vec<u8>> for Component {
	fn from(value: Vec<u8>) -> Self {
		Self(Bytes::from(value))
	}
}

impl From<Bytes> for Component {
	fn from(value: Bytes) -> Self {
		Self(value)
	}
}

impl fmt::Display for Component {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if Self::is_all_periods(&self.0) {
			return write!(f, "...{}", ".".repeat(self.0.len()));
		}
		for &b in self.0.iter() {
			if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
				write!(f, "{}", b as char)?;
			} else {
				write!(f, "%{b:02X}")?;
			}
		}
		Ok(())
	}
}

/// Hierarchical name addressing a data object.
///
/// Names are ordered sequences of opaque components. `/a/b` is a prefix of
/// `/a/b/c`; every name has the empty name `/` as a prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name {
	components: Vec<Component>,
}

impl Name {
	/// Creates the empty name `/`.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the number of components.
	pub fn len(&self) -> usize {
		self.components.len()
	}

	/// Returns true for the empty name.
	pub fn is_empty(&self) -> bool {
		self.components.is_empty()
	}

	/// Returns the component at `index`.
	pub fn get(&self, index: usize) -> Option<&Component> {
		self.components.get(index)
	}

	/// Iterates over components in order.
	pub fn components(&self) -> impl Iterator<Item = &Component> {
		self.components.iter()
	}

	/// Returns a copy of this name with `component` appended.
	#[must_use]
	pub fn append(&self, component: impl Into<Component>) -> Self {
		let mut next = self.clone();
		next.push(component);
		next
	}

	/// Returns a copy of this name with the decimal text of `value` appended.
	#[must_use]
	pub fn append_number(&self, value: u64) -> Self {
		self.append(Component::from_number(value))
	}

	/// Appends `component` in place.
	pub fn push(&mut self, component: impl Into<Component>) {
		self.components.push(component.into());
	}

	/// Returns the first `len` components as a new name.
	#[must_use]
	pub fn prefix(&self, len: usize) -> Self {
		Self {
			components: self.components[..len.min(self.components.len())].to_vec(),
		}
	}

	/// Returns true if `self` is a prefix of `other` (or equal to it).
	pub fn is_prefix_of(&self, other: &Name) -> bool {
		self.len() <= other.len() && self.components.iter().zip(other.components.iter()).all(|(a, b)| a == b)
	}
}

impl<C: Into<Component>> FromIterator<C> for Name {
	fn from_iter<T: IntoIterator<Item = C>>(iter: T) -> Self {
		Self {
			components: iter.into_iter().map(Into::into).collect(),
		}
	}
}

impl FromStr for Name {
	type Err = NameError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.strip_prefix("ndn:").unwrap_or(s);
		let components = s
			.split('/')
			.filter(|segment| !segment.is_empty())
			.map(Component::parse_escaped)
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Self { components })
	}
}

impl fmt::Display for Name {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.components.is_empty() {
			return f.write_str("/");
		}
		for component in &self.components {
			write!(f, "/{component}")?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn name(s: &str) -> Name {
		s.parse().expect("valid name")
	}

	#[test]
	fn parses_and_displays_uri_form() {
		let n = name("/test/sync");
		assert_eq!(n.len(), 2);
		assert_eq!(n.get(0), Some(&Component::from("test")));
		assert_eq!(n.to_string(), "/test/sync");
		assert_eq!(name("ndn:/a//b/").to_string(), "/a/b");
		assert_eq!(Name::new().to_string(), "/");
	}

	#[test]
	fn escapes_opaque_bytes() {
		let n = Name::new().append(vec![0u8, b'a', b' ']);
		assert_eq!(n.to_string(), "/%00a%20");
		assert_eq!(name("/%00a%20"), n);
		assert_eq!(
			"/bad%2".parse::<Name>(),
			Err(NameError::InvalidEscape("bad%2".to_string()))
		);
	}

	#[test]
	fn prefix_ordering() {
		let topic = name("/subscriber");
		let child = topic.append("_announce").append_number(42);
		assert!(topic.is_prefix_of(&child));
		assert!(child.is_prefix_of(&child));
		assert!(!child.is_prefix_of(&topic));
		assert!(Name::new().is_prefix_of(&topic));
		assert!(!name("/subscribe").is_prefix_of(&topic));
		assert_eq!(child.prefix(1), topic);
		assert_eq!(child.prefix(10), child);
	}

	#[test]
	fn numeric_components() {
		let n = Name::new().append_number(99);
		assert_eq!(n.get(0).and_then(Component::to_number), Some(99));
		assert_eq!(Component::from("x9").to_number(), None);
		assert_eq!(Component::from("0").to_number(), Some(0));
		for rejected in ["+42", "042", "-1", "", "4 2"] {
			assert_eq!(Component::from(rejected).to_number(), None, "{rejected:?}");
		}
	}

	#[test]
	fn escapes_need_two_hex_digits() {
		for bad in ["/%+5", "/%-1", "/% 5", "/%g0"] {
			assert!(bad.parse::<Name>().is_err(), "{bad}");
		}
		assert_eq!(name("/%2b").get(0), Some(&Component::from("+")));
	}

	#[test]
	fn empty_and_period_components_round_trip() {
		let n = Name::new().append("a").append("").append("b");
		assert_eq!(n.to_string(), "/a/.../b");
		assert_eq!(name(&n.to_string()), n);
		assert_eq!(name("/a/.../b").len(), 3);

		let dots = Name::new().append(".").append("..").append("...");
		assert_eq!(dots.to_string(), "/..../...../......");
		assert_eq!(name(&dots.to_string()), dots);
	}
}
