//! Pending-request table and the single-assignment handles it completes.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use ndnkit_face::{NackReason, ResponseSink};
use ndnkit_primitives::{Data, Interest, Name};
use parking_lot::{Condvar, Mutex};

use crate::{Error, NetworkCause, Result};

/// Client-local correlation id of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

#[derive(Default)]
struct SlotState {
	filled: bool,
	outcome: Option<Result<Data>>,
	waker: Option<Waker>,
}

/// Single-assignment result slot shared by a table entry and its handle.
#[derive(Default)]
struct Slot {
	state: Mutex<SlotState>,
	ready: Condvar,
}

impl Slot {
	/// Stores `outcome` unless the slot was already filled.
	fn fill(&self, outcome: Result<Data>) -> bool {
		let waker = {
			let mut state = self.state.lock();
			if state.filled {
				return false;
			}
			state.filled = true;
			state.outcome = Some(outcome);
			state.waker.take()
		};
		self.ready.notify_all();
		if let Some(waker) = waker {
			waker.wake();
		}
		true
	}

	fn is_filled(&self) -> bool {
		self.state.lock().filled
	}

	/// Blocks until filled or until `deadline` passes.
	fn wait_until(&self, deadline: Option<Instant>) -> Option<Result<Data>> {
		let mut state = self.state.lock();
		while !state.filled {
			match deadline {
				Some(deadline) => {
					if self.ready.wait_until(&mut state, deadline).timed_out() {
						break;
					}
				}
				None => self.ready.wait(&mut state),
			}
		}
		state.outcome.take()
	}

	fn poll(&self, cx: &mut Context<'_>) -> Poll<Option<Result<Data>>> {
		let mut state = self.state.lock();
		if state.filled {
			return Poll::Ready(state.outcome.take());
		}
		match &state.waker {
			Some(waker) if waker.will_wake(cx.waker()) => {}
			_ => state.waker = Some(cx.waker().clone()),
		}
		Poll::Pending
	}
}

struct PendingEntry {
	name: Name,
	created: Instant,
	slot: Arc<Slot>,
}

/// Outstanding requests of one client, keyed by [`RequestId`].
///
/// Completing an entry removes it under the lock and fills its slot after the
/// lock is released, so each entry is completed at most once and a completion
/// racing a removal is decided by whoever removes first.
#[derive(Default)]
pub(crate) struct PendingTable {
	next_id: AtomicU64,
	entries: Mutex<HashMap<RequestId, PendingEntry>>,
}

impl PendingTable {
	fn register(&self, name: Name) -> (RequestId, Arc<Slot>) {
		let id = RequestId(self.next_id.fetch_add(1, Ordering::AcqRel));
		let slot = Arc::new(Slot::default());
		self.entries.lock().insert(
			id,
			PendingEntry {
				name,
				created: Instant::now(),
				slot: Arc::clone(&slot),
			},
		);
		(id, slot)
	}

	/// Completes the entry for `id`. Returns false if it was already gone.
	pub(crate) fn complete(&self, id: RequestId, outcome: Result<Data>) -> bool {
		let entry = self.entries.lock().remove(&id);
		let Some(entry) = entry else {
			tracing::trace!(request = id.0, "client.complete.stale");
			return false;
		};
		tracing::trace!(
			request = id.0,
			name = %entry.name,
			ok = outcome.is_ok(),
			elapsed_us = entry.created.elapsed().as_micros() as u64,
			"client.complete"
		);
		entry.slot.fill(outcome)
	}

	/// Drops the entry for `id` without completing it.
	fn remove(&self, id: RequestId) -> bool {
		self.entries.lock().remove(&id).is_some()
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Fails every outstanding entry with [`Error::Cancelled`].
	pub(crate) fn cancel_all(&self) -> usize {
		let drained: Vec<PendingEntry> = self.entries.lock().drain().map(|(_, entry)| entry).collect();
		let count = drained.len();
		for entry in drained {
			entry.slot.fill(Err(Error::Cancelled { name: entry.name }));
		}
		count
	}
}

/// Creates a table entry for `name` and returns its handle and response sink.
pub(crate) fn register(table: &Arc<PendingTable>, name: Name) -> (PendingData, PendingSink) {
	let (id, slot) = table.register(name.clone());
	let handle = PendingData {
		id,
		name: name.clone(),
		slot,
		table: Arc::downgrade(table),
	};
	let sink = PendingSink {
		id,
		name,
		table: Arc::downgrade(table),
	};
	(handle, sink)
}

/// Face-side end of one request.
pub(crate) struct PendingSink {
	id: RequestId,
	name: Name,
	table: Weak<PendingTable>,
}

impl PendingSink {
	fn complete(&self, outcome: Result<Data>) {
		match self.table.upgrade() {
			Some(table) => {
				table.complete(self.id, outcome);
			}
			None => tracing::trace!(request = self.id.0, "client.complete.orphaned"),
		}
	}
}

impl ResponseSink for PendingSink {
	fn on_data(self: Box<Self>, data: Data) {
		let outcome = if self.name.is_prefix_of(data.name()) {
			Ok(data)
		} else {
			tracing::warn!(request = self.id.0, name = %self.name, response = %data.name(), "client.response.mismatch");
			Err(Error::Network {
				name: self.name.clone(),
				cause: NetworkCause::Mismatch(data.name().clone()),
			})
		};
		self.complete(outcome);
	}

	fn on_nack(self: Box<Self>, interest: Interest, reason: NackReason) {
		tracing::debug!(request = self.id.0, name = %interest.name(), %reason, "client.nack");
		self.complete(Err(Error::Network {
			name: self.name.clone(),
			cause: NetworkCause::Nack(reason),
		}));
	}
}

/// Handle to one in-flight request.
///
/// Completes exactly once. Await it as a future, block on it with
/// [`wait`](Self::wait) / [`wait_timeout`](Self::wait_timeout), or bound the
/// async wait with [`get_timeout`](Self::get_timeout). An expired deadline
/// removes the request from the client, so a late answer is discarded.
/// Dropping the handle does the same.
pub struct PendingData {
	id: RequestId,
	name: Name,
	slot: Arc<Slot>,
	table: Weak<PendingTable>,
}

impl std::fmt::Debug for PendingData {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PendingData")
			.field("id", &self.id)
			.field("name", &self.name)
			.field("done", &self.slot.is_filled())
			.finish()
	}
}

impl PendingData {
	/// Returns the correlation id of this request.
	pub fn id(&self) -> RequestId {
		self.id
	}

	/// Returns the requested name.
	pub fn name(&self) -> &Name {
		&self.name
	}

	/// Returns true once the request has completed.
	pub fn is_done(&self) -> bool {
		self.slot.is_filled()
	}

	/// Blocks the calling thread until the request completes.
	///
	/// Must not be called from an async task; await the handle instead.
	///
	/// # Errors
	///
	/// Returns the error the request completed with.
	pub fn wait(self) -> Result<Data> {
		match self.slot.wait_until(None) {
			Some(outcome) => outcome,
			None => Err(self.cancelled()),
		}
	}

	/// Blocks the calling thread until the request completes or `timeout` elapses.
	///
	/// # Errors
	///
	/// Returns [`Error::Timeout`] when the deadline elapses first, otherwise the
	/// error the request completed with.
	pub fn wait_timeout(self, timeout: Duration) -> Result<Data> {
		if let Some(outcome) = self.slot.wait_until(Some(Instant::now() + timeout)) {
			return outcome;
		}
		match self.expire(timeout) {
			Some(err) => Err(err),
			// Whoever removed the entry fills the slot right after.
			None => self.slot.wait_until(None).unwrap_or_else(|| Err(self.cancelled())),
		}
	}

	/// Awaits completion for at most `timeout`.
	///
	/// # Errors
	///
	/// Returns [`Error::Timeout`] when the deadline elapses first, otherwise the
	/// error the request completed with.
	pub async fn get_timeout(mut self, timeout: Duration) -> Result<Data> {
		if let Ok(outcome) = tokio::time::timeout(timeout, &mut self).await {
			return outcome;
		}
		match self.expire(timeout) {
			Some(err) => Err(err),
			None => self.await,
		}
	}

	/// Cancels the request. Returns false if it had already completed.
	pub fn cancel(self) -> bool {
		let removed = self.table.upgrade().is_some_and(|table| table.remove(self.id));
		if removed {
			self.slot.fill(Err(self.cancelled()));
			tracing::debug!(request = self.id.0, name = %self.name, "client.cancel");
		}
		removed
	}

	/// Removes the entry after a missed deadline and returns the timeout.
	///
	/// Returns `None` if a completion removed the entry first; the slot is then
	/// about to be filled.
	fn expire(&self, after: Duration) -> Option<Error> {
		let removed = self.table.upgrade().is_some_and(|table| table.remove(self.id));
		if !removed {
			return None;
		}
		tracing::debug!(request = self.id.0, name = %self.name, ?after, "client.timeout");
		Some(Error::Timeout {
			name: self.name.clone(),
			after,
		})
	}

	fn cancelled(&self) -> Error {
		Error::Cancelled { name: self.name.clone() }
	}
}

impl Future for PendingData {
	type Output = Result<Data>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let this = self.get_mut();
		this.slot.poll(cx).map(|outcome| outcome.unwrap_or_else(|| Err(this.cancelled())))
	}
}

impl Drop for PendingData {
	fn drop(&mut self) {
		let Some(table) = self.table.upgrade() else {
			return;
		};
		if table.remove(self.id) {
			tracing::trace!(request = self.id.0, name = %self.name, "client.abandon");
		}
	}
}
