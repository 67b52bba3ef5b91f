use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use ndnkit_face::{Face, InterestHandler, RegistrationId};
use ndnkit_primitives::{Data, Interest, Name};
use parking_lot::Mutex;

use crate::{ContentStore, Error, Pipeline, Result};

struct Shared {
	store: Arc<dyn ContentStore>,
	pipeline: Pipeline<Data>,
}

/// Answers interests under a prefix with stored content.
///
/// Content is kept unprocessed in the store; each answer is built from it and
/// passed through the pipeline on the way out, so a [`SigningStage`](crate::SigningStage)
/// signs every packet actually sent.
pub struct Server {
	face: Arc<dyn Face>,
	prefix: Name,
	shared: Arc<Shared>,
	registration: Mutex<Option<RegistrationId>>,
}

impl fmt::Debug for Server {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Server")
			.field("prefix", &self.prefix)
			.field("pipeline", &self.shared.pipeline)
			.field("open", &self.is_open())
			.finish_non_exhaustive()
	}
}

impl Server {
	/// Creates a closed server for `prefix` backed by `store`, with an empty pipeline.
	pub fn new(face: Arc<dyn Face>, prefix: Name, store: Arc<dyn ContentStore>) -> Self {
		Self::with_pipeline(face, prefix, store, Pipeline::new())
	}

	/// Creates a closed server whose answers go through `pipeline`.
	pub fn with_pipeline(face: Arc<dyn Face>, prefix: Name, store: Arc<dyn ContentStore>, pipeline: Pipeline<Data>) -> Self {
		Self {
			face,
			prefix,
			shared: Arc::new(Shared { store, pipeline }),
			registration: Mutex::new(None),
		}
	}

	/// Returns the served prefix.
	pub fn prefix(&self) -> &Name {
		&self.prefix
	}

	/// Registers the prefix on the face.
	///
	/// # Errors
	///
	/// Returns [`Error::AlreadyOpen`] if open, or the face's error.
	pub fn open(&self) -> Result<()> {
		let mut registration = self.registration.lock();
		if registration.is_some() {
			return Err(Error::AlreadyOpen(self.prefix.clone()));
		}
		let handler = Responder {
			shared: Arc::clone(&self.shared),
		};
		let id = self.face.register_prefix(self.prefix.clone(), Arc::new(handler))?;
		*registration = Some(id);
		tracing::debug!(prefix = %self.prefix, registration = id.0, "server.open");
		Ok(())
	}

	/// Returns true while registered.
	pub fn is_open(&self) -> bool {
		self.registration.lock().is_some()
	}

	/// Stores `content` for `name`; later interests for exactly `name` get it.
	///
	/// # Errors
	///
	/// Returns [`Error::OutsidePrefix`] if `name` is not under the served prefix.
	pub fn serve(&self, name: Name, content: impl Into<Bytes>) -> Result<()> {
		if !self.prefix.is_prefix_of(&name) {
			return Err(Error::OutsidePrefix {
				prefix: self.prefix.clone(),
				name,
			});
		}
		self.shared.store.put(name, content.into());
		Ok(())
	}

	/// Unregisters the prefix. Returns false if not open.
	pub fn close(&self) -> bool {
		let Some(id) = self.registration.lock().take() else {
			return false;
		};
		self.face.unregister_prefix(id);
		tracing::debug!(prefix = %self.prefix, "server.close");
		true
	}
}

impl Drop for Server {
	fn drop(&mut self) {
		self.close();
	}
}

struct Responder {
	shared: Arc<Shared>,
}

impl InterestHandler for Responder {
	fn on_interest(&self, _prefix: &Name, interest: &Interest, face: &dyn Face) {
		let name = interest.name();
		let Some(content) = self.shared.store.get(name) else {
			tracing::trace!(name = %name, "server.miss");
			return;
		};
		let data = match self.shared.pipeline.process(Data::new(name.clone(), content)) {
			Ok(data) => data,
			Err(err) => {
				tracing::warn!(name = %name, error = %err, "server.process.failed");
				return;
			}
		};
		if let Err(err) = face.put_data(data) {
			tracing::warn!(name = %name, error = %err, "server.put.failed");
		}
	}
}

#[cfg(test)]
mod tests {
	use ndnkit_face::{LocalFace, NackReason, ResponseSink};
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::signing::tests::FakeSigner;
	use crate::{InMemoryContentStore, SigningStage};

	fn name(s: &str) -> Name {
		s.parse().expect("name")
	}

	#[derive(Clone, Default)]
	struct Capture(Arc<Mutex<Vec<Data>>>);

	impl ResponseSink for Capture {
		fn on_data(self: Box<Self>, data: Data) {
			self.0.lock().push(data);
		}

		fn on_nack(self: Box<Self>, _interest: Interest, _reason: NackReason) {}
	}

	fn request(face: &LocalFace, target: &str) -> Capture {
		let capture = Capture::default();
		face.express_interest(Interest::new(name(target)), Box::new(capture.clone()))
			.expect("express");
		capture
	}

	#[test]
	fn served_content_answers_interests_signed() {
		let face = Arc::new(LocalFace::new());
		let signer = Arc::new(FakeSigner::with_certificate("/key/1"));
		let pipeline = Pipeline::new().with_stage(SigningStage::with_default_certificate(signer).expect("stage"));
		let server = Server::with_pipeline(Arc::clone(&face) as Arc<dyn Face>, name("/app"), Arc::new(InMemoryContentStore::new()), pipeline);
		server.open().expect("open");
		server.serve(name("/app/item/1"), "one").expect("serve");

		let capture = request(&face, "/app/item/1");

		let answers = capture.0.lock();
		assert_eq!(answers.len(), 1);
		assert_eq!(answers[0].content().as_ref(), b"one");
		assert_eq!(answers[0].signature().map(|s| s.certificate.to_string()), Some("/key/1".to_string()));
	}

	#[test]
	fn unknown_names_stay_unanswered() {
		let face = Arc::new(LocalFace::new());
		let server = Server::new(Arc::clone(&face) as Arc<dyn Face>, name("/app"), Arc::new(InMemoryContentStore::new()));
		server.open().expect("open");

		let capture = request(&face, "/app/missing");

		assert!(capture.0.lock().is_empty());
		assert_eq!(face.pending_interests(), 1);
	}

	#[test]
	fn failing_pipeline_sends_nothing() {
		let face = Arc::new(LocalFace::new());
		let signer = Arc::new(FakeSigner::default());
		let pipeline = Pipeline::new().with_stage(SigningStage::new(signer, name("/key/none")));
		let server = Server::with_pipeline(Arc::clone(&face) as Arc<dyn Face>, name("/app"), Arc::new(InMemoryContentStore::new()), pipeline);
		server.open().expect("open");
		server.serve(name("/app/x"), "x").expect("serve");

		let capture = request(&face, "/app/x");

		assert!(capture.0.lock().is_empty());
		assert!(face.sent_data().is_empty());
	}

	#[test]
	fn serve_rejects_foreign_names() {
		let face = Arc::new(LocalFace::new());
		let server = Server::new(face, name("/app"), Arc::new(InMemoryContentStore::new()));
		assert!(matches!(server.serve(name("/other/x"), "x"), Err(Error::OutsidePrefix { .. })));
	}

	#[test]
	fn open_close_lifecycle() {
		let face = Arc::new(LocalFace::new());
		let server = Server::new(Arc::clone(&face) as Arc<dyn Face>, name("/app"), Arc::new(InMemoryContentStore::new()));
		server.open().expect("open");
		assert!(matches!(server.open(), Err(Error::AlreadyOpen(_))));
		assert_eq!(face.registrations(), 1);

		assert!(server.close());
		assert!(!server.close());
		assert_eq!(face.registrations(), 0);
		server.open().expect("reopen");
		drop(server);
		assert_eq!(face.registrations(), 0);
	}
}
