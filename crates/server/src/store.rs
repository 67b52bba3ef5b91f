//! Keyed storage of content blobs.

use std::collections::HashMap;

use bytes::Bytes;
use ndnkit_face::{Face, FaceError};
use ndnkit_primitives::{Data, Name};
use parking_lot::RwLock;

/// Storage of content by exact name. No eviction.
pub trait ContentStore: Send + Sync {
	/// Stores `content` under `name`, replacing what was there.
	fn put(&self, name: Name, content: Bytes);

	/// Returns true if something is stored under `name`.
	fn has(&self, name: &Name) -> bool;

	/// Returns the content stored under `name`.
	fn get(&self, name: &Name) -> Option<Bytes>;

	/// Puts the content stored under `name` on `face` as data. Does nothing if
	/// there is none.
	///
	/// # Errors
	///
	/// Returns the face's error if it cannot send.
	fn push(&self, face: &dyn Face, name: &Name) -> Result<(), FaceError> {
		match self.get(name) {
			Some(content) => face.put_data(Data::new(name.clone(), content)),
			None => {
				tracing::trace!(name = %name, "server.store.miss");
				Ok(())
			}
		}
	}

	/// Removes everything.
	fn clear(&self);
}

/// [`ContentStore`] in a hash map.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
	entries: RwLock<HashMap<Name, Bytes>>,
}

impl InMemoryContentStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the number of stored names.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns true if nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}

impl ContentStore for InMemoryContentStore {
	fn put(&self, name: Name, content: Bytes) {
		tracing::trace!(name = %name, len = content.len(), "server.store.put");
		self.entries.write().insert(name, content);
	}

	fn has(&self, name: &Name) -> bool {
		self.entries.read().contains_key(name)
	}

	fn get(&self, name: &Name) -> Option<Bytes> {
		self.entries.read().get(name).cloned()
	}

	fn clear(&self) {
		self.entries.write().clear();
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use ndnkit_face::{LocalFace, NackReason, ResponseSink};
	use ndnkit_primitives::Interest;
	use parking_lot::Mutex;
	use pretty_assertions::assert_eq;

	use super::*;

	fn name(s: &str) -> Name {
		s.parse().expect("name")
	}

	struct Capture(Arc<Mutex<Option<Data>>>);

	impl ResponseSink for Capture {
		fn on_data(self: Box<Self>, data: Data) {
			*self.0.lock() = Some(data);
		}

		fn on_nack(self: Box<Self>, _interest: Interest, _reason: NackReason) {}
	}

	#[test]
	fn put_get_has_clear() {
		let store = InMemoryContentStore::new();
		assert!(!store.has(&name("/a")));
		assert_eq!(store.get(&name("/a")), None);

		store.put(name("/a"), Bytes::from_static(b"1"));
		store.put(name("/a"), Bytes::from_static(b"2"));
		assert!(store.has(&name("/a")));
		assert_eq!(store.get(&name("/a")), Some(Bytes::from_static(b"2")));
		assert_eq!(store.len(), 1);

		store.clear();
		assert!(store.is_empty());
	}

	#[test]
	fn push_answers_pending_interest() {
		let face = LocalFace::new();
		let store = InMemoryContentStore::new();
		store.put(name("/a/b"), Bytes::from_static(b"payload"));
		let received = Arc::new(Mutex::new(None));
		face.express_interest(Interest::new(name("/a/b")), Box::new(Capture(Arc::clone(&received))))
			.expect("express");

		store.push(&face, &name("/a/b")).expect("push");

		let data = received.lock().take().expect("answered");
		assert_eq!(data.content().as_ref(), b"payload");
	}

	#[test]
	fn push_of_missing_name_sends_nothing() {
		let face = LocalFace::new();
		let store = InMemoryContentStore::new();
		store.push(&face, &name("/missing")).expect("push");
		assert!(face.sent_data().is_empty());
	}
}
