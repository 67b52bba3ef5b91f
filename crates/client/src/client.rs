//! The request/response client.

use std::sync::Arc;
use std::time::Duration;

use ndnkit_face::Face;
use ndnkit_primitives::{Data, Interest, Name};

use crate::config::ClientConfig;
use crate::pending::{self, PendingData, PendingTable};
use crate::{Error, NetworkCause, Result};

/// Issues named requests over a face and tracks them until completion.
///
/// Instances are independent: each owns its pending-request table, and
/// dropping a client cancels whatever it still has outstanding. Share a client
/// behind an `Arc`.
pub struct Client {
	config: ClientConfig,
	table: Arc<PendingTable>,
}

impl std::fmt::Debug for Client {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Client")
			.field("config", &self.config)
			.field("pending", &self.table.len())
			.finish()
	}
}

impl Default for Client {
	fn default() -> Self {
		Self::new(ClientConfig::default())
	}
}

impl Client {
	/// Create a client with the given configuration.
	pub fn new(config: ClientConfig) -> Self {
		Self {
			config,
			table: Arc::new(PendingTable::default()),
		}
	}

	/// Get the client configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Number of requests still awaiting completion.
	pub fn pending_count(&self) -> usize {
		self.table.len()
	}

	/// Request `name` and return immediately with a handle to the outcome.
	///
	/// Exactly one interest is expressed; nothing is retried. The request is
	/// tracked before the interest leaves, so a face answering inline is fine.
	/// If the face refuses the interest the handle is already complete with
	/// [`Error::Network`].
	pub fn get_async(&self, face: &dyn Face, name: Name) -> PendingData {
		self.express(face, Interest::new(name))
	}

	/// Like [`get_async`](Self::get_async) for a prepared interest.
	///
	/// An interest without a lifetime gets the configured one.
	pub fn express(&self, face: &dyn Face, mut interest: Interest) -> PendingData {
		if interest.lifetime().is_none() {
			interest = interest.with_lifetime(self.config.interest_lifetime_duration());
		}
		let name = interest.name().clone();
		let (handle, sink) = pending::register(&self.table, name.clone());
		tracing::trace!(request = handle.id().0, name = %name, "client.request");
		if let Err(err) = face.express_interest(interest, Box::new(sink)) {
			tracing::debug!(request = handle.id().0, name = %name, error = %err, "client.request.refused");
			self.table.complete(
				handle.id(),
				Err(Error::Network {
					name,
					cause: NetworkCause::Face(err),
				}),
			);
		}
		handle
	}

	/// Request `name` and block the calling thread until it completes.
	///
	/// There is no deadline; use [`PendingData::wait_timeout`] for one. Must
	/// not be called from an async task.
	///
	/// # Errors
	///
	/// Returns [`Error::Network`] if the request fails in the network.
	pub fn get_sync(&self, face: &dyn Face, name: Name) -> Result<Data> {
		self.get_async(face, name).wait()
	}

	/// Request `name` and await it under the configured default timeout.
	///
	/// # Errors
	///
	/// Returns [`Error::Timeout`] when the default timeout elapses, or the
	/// network failure the request completed with.
	pub async fn get(&self, face: &dyn Face, name: Name) -> Result<Data> {
		let timeout = self.config.default_timeout_duration();
		let handle = self.get_async(face, name);
		if timeout == Duration::ZERO {
			handle.await
		} else {
			handle.get_timeout(timeout).await
		}
	}

	/// Request `name` and await it for at most `timeout`.
	///
	/// # Errors
	///
	/// Returns [`Error::Timeout`] when `timeout` elapses, or the network
	/// failure the request completed with.
	pub async fn get_timeout(&self, face: &dyn Face, name: Name, timeout: Duration) -> Result<Data> {
		self.get_async(face, name).get_timeout(timeout).await
	}

	/// Fail every outstanding request with [`Error::Cancelled`].
	///
	/// Returns how many requests were cancelled. The client stays usable.
	pub fn shutdown(&self) -> usize {
		let cancelled = self.table.cancel_all();
		if cancelled > 0 {
			tracing::debug!(cancelled, "client.shutdown");
		}
		cancelled
	}
}

impl Drop for Client {
	fn drop(&mut self) {
		self.shutdown();
	}
}
