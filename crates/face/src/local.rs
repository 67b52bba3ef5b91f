//! In-process face that loops interests back to local registrations.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use ndnkit_primitives::{Data, Interest, Name};
use parking_lot::Mutex;

use crate::{Face, FaceError, InterestHandler, NackReason, RegistrationId, ResponseSink};

/// When a [`LocalFace`] runs sinks and handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
	/// Deliver on the thread that caused the event, before the call returns.
	#[default]
	Immediate,
	/// Queue deliveries until [`LocalFace::process_events`] is called.
	Queued,
}

enum Primed {
	Data(Data),
	Nack { name: Name, reason: NackReason },
}

impl Primed {
	fn answers(&self, interest: &Interest) -> bool {
		match self {
			Self::Data(data) => interest.matches(data),
			Self::Nack { name, .. } => name == interest.name(),
		}
	}
}

struct Registration {
	id: RegistrationId,
	prefix: Name,
	handler: Arc<dyn InterestHandler>,
}

/// Lifetime given to interests that do not request one.
pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_secs(4);

struct PendingInterest {
	interest: Interest,
	sink: Box<dyn ResponseSink>,
	expires: Instant,
}

enum Delivery {
	Data {
		sink: Box<dyn ResponseSink>,
		data: Data,
	},
	Nack {
		sink: Box<dyn ResponseSink>,
		interest: Interest,
		reason: NackReason,
	},
	Interest {
		handler: Arc<dyn InterestHandler>,
		prefix: Name,
		interest: Interest,
	},
}

#[derive(Default)]
struct FaceState {
	next_registration: u64,
	registrations: Vec<Registration>,
	pending: Vec<PendingInterest>,
	primed: VecDeque<Primed>,
	sent_interests: Vec<Interest>,
	sent_data: Vec<Data>,
}

impl FaceState {
	/// Takes the pending interests whose lifetime has run out.
	///
	/// Their sinks must be dropped after the lock is released.
	fn take_expired(&mut self, now: Instant) -> Vec<PendingInterest> {
		if self.pending.iter().all(|p| p.expires > now) {
			return Vec::new();
		}
		let (expired, live) = std::mem::take(&mut self.pending).into_iter().partition(|p| p.expires <= now);
		self.pending = live;
		expired
	}
}

fn log_expired(expired: &[PendingInterest]) {
	for p in expired {
		tracing::trace!(name = %p.interest.name(), "face.interest.expired");
	}
}

/// In-process face.
///
/// Interests are answered, in order of preference, by a primed response
/// ([`respond_with`](Self::respond_with), [`nack_with`](Self::nack_with)) or by
/// data put on the face while the interest is pending, typically by a handler
/// registered under a matching prefix. Every matching registration sees every
/// interest. Unanswered interests stay pending until their lifetime runs out
/// ([`DEFAULT_INTEREST_LIFETIME`] if they request none) or the face is closed;
/// an expired interest's sink is dropped without a call.
///
/// Sinks and handlers never run while the face's internal locks are held, so
/// they may call back into the face.
pub struct LocalFace {
	mode: DeliveryMode,
	closed: AtomicBool,
	state: Mutex<FaceState>,
	queue: Mutex<VecDeque<Delivery>>,
}

impl fmt::Debug for LocalFace {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.lock();
		f.debug_struct("LocalFace")
			.field("mode", &self.mode)
			.field("closed", &self.closed.load(Ordering::Acquire))
			.field("registrations", &state.registrations.len())
			.field("pending", &state.pending.len())
			.finish_non_exhaustive()
	}
}

impl Default for LocalFace {
	fn default() -> Self {
		Self::new()
	}
}

impl LocalFace {
	/// Creates a face delivering immediately.
	pub fn new() -> Self {
		Self::with_mode(DeliveryMode::Immediate)
	}

	/// Creates a face with the given delivery mode.
	pub fn with_mode(mode: DeliveryMode) -> Self {
		Self {
			mode,
			closed: AtomicBool::new(false),
			state: Mutex::new(FaceState::default()),
			queue: Mutex::new(VecDeque::new()),
		}
	}

	/// Primes `data` as the answer to the next interest it matches.
	pub fn respond_with(&self, data: Data) {
		self.state.lock().primed.push_back(Primed::Data(data));
	}

	/// Primes a negative acknowledgement for the next interest for `name`.
	pub fn nack_with(&self, name: Name, reason: NackReason) {
		self.state.lock().primed.push_back(Primed::Nack { name, reason });
	}

	/// Runs queued deliveries, including any they cause, and returns how many ran.
	pub fn process_events(&self) -> usize {
		let mut delivered = 0;
		loop {
			let next = self.queue.lock().pop_front();
			let Some(delivery) = next else {
				break;
			};
			self.deliver(delivery);
			delivered += 1;
		}
		delivered
	}

	/// Closes the face, dropping pending interests, registrations and queued deliveries.
	pub fn close(&self) {
		if self.closed.swap(true, Ordering::AcqRel) {
			return;
		}
		let (pending, registrations) = {
			let mut state = self.state.lock();
			(std::mem::take(&mut state.pending), std::mem::take(&mut state.registrations))
		};
		let queued = std::mem::take(&mut *self.queue.lock());
		tracing::debug!(
			pending = pending.len(),
			registrations = registrations.len(),
			queued = queued.len(),
			"face.close"
		);
	}

	/// Returns true once [`close`](Self::close) was called.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	/// Returns every interest expressed on this face.
	pub fn sent_interests(&self) -> Vec<Interest> {
		self.state.lock().sent_interests.clone()
	}

	/// Returns every data packet put on this face.
	pub fn sent_data(&self) -> Vec<Data> {
		self.state.lock().sent_data.clone()
	}

	/// Returns the number of unexpired interests awaiting data.
	pub fn pending_interests(&self) -> usize {
		let (expired, live) = {
			let mut state = self.state.lock();
			let expired = state.take_expired(Instant::now());
			(expired, state.pending.len())
		};
		log_expired(&expired);
		live
	}

	/// Returns the number of active prefix registrations.
	pub fn registrations(&self) -> usize {
		self.state.lock().registrations.len()
	}

	fn dispatch(&self, deliveries: Vec<Delivery>) {
		match self.mode {
			DeliveryMode::Immediate => {
				for delivery in deliveries {
					self.deliver(delivery);
				}
			}
			DeliveryMode::Queued => self.queue.lock().extend(deliveries),
		}
	}

	fn deliver(&self, delivery: Delivery) {
		match delivery {
			Delivery::Data { sink, data } => {
				tracing::trace!(name = %data.name(), "face.deliver.data");
				sink.on_data(data);
			}
			Delivery::Nack { sink, interest, reason } => {
				tracing::trace!(name = %interest.name(), %reason, "face.deliver.nack");
				sink.on_nack(interest, reason);
			}
			Delivery::Interest { handler, prefix, interest } => {
				tracing::trace!(prefix = %prefix, name = %interest.name(), "face.deliver.interest");
				handler.on_interest(&prefix, &interest, self);
			}
		}
	}
}

impl Face for LocalFace {
	fn express_interest(&self, interest: Interest, sink: Box<dyn ResponseSink>) -> Result<(), FaceError> {
		if self.is_closed() {
			return Err(FaceError::Closed);
		}
		let now = Instant::now();
		let (deliveries, expired) = {
			let mut state = self.state.lock();
			let expired = state.take_expired(now);
			state.sent_interests.push(interest.clone());
			let primed = state.primed.iter().position(|p| p.answers(&interest)).and_then(|pos| state.primed.remove(pos));
			let deliveries = match primed {
				Some(Primed::Data(data)) => vec![Delivery::Data { sink, data }],
				Some(Primed::Nack { reason, .. }) => vec![Delivery::Nack { sink, interest, reason }],
				None => {
					let handlers: Vec<Delivery> = state
						.registrations
						.iter()
						.filter(|r| r.prefix.is_prefix_of(interest.name()))
						.map(|r| Delivery::Interest {
							handler: Arc::clone(&r.handler),
							prefix: r.prefix.clone(),
							interest: interest.clone(),
						})
						.collect();
					let expires = now + interest.lifetime().unwrap_or(DEFAULT_INTEREST_LIFETIME);
					state.pending.push(PendingInterest { interest, sink, expires });
					handlers
				}
			};
			(deliveries, expired)
		};
		log_expired(&expired);
		drop(expired);
		self.dispatch(deliveries);
		Ok(())
	}

	fn register_prefix(&self, prefix: Name, handler: Arc<dyn InterestHandler>) -> Result<RegistrationId, FaceError> {
		if self.is_closed() {
			return Err(FaceError::Closed);
		}
		let mut state = self.state.lock();
		state.next_registration += 1;
		let id = RegistrationId(state.next_registration);
		tracing::debug!(registration = id.0, prefix = %prefix, "face.register");
		state.registrations.push(Registration { id, prefix, handler });
		Ok(id)
	}

	fn unregister_prefix(&self, id: RegistrationId) -> bool {
		let removed = {
			let mut state = self.state.lock();
			let before = state.registrations.len();
			state.registrations.retain(|r| r.id != id);
			before != state.registrations.len()
		};
		tracing::debug!(registration = id.0, removed, "face.unregister");
		removed
	}

	fn put_data(&self, data: Data) -> Result<(), FaceError> {
		if self.is_closed() {
			return Err(FaceError::Closed);
		}
		let (deliveries, expired) = {
			let mut state = self.state.lock();
			let expired = state.take_expired(Instant::now());
			state.sent_data.push(data.clone());
			let (hit, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending)
				.into_iter()
				.partition(|p| p.interest.matches(&data));
			state.pending = keep;
			let deliveries: Vec<Delivery> = hit
				.into_iter()
				.map(|p| Delivery::Data {
					sink: p.sink,
					data: data.clone(),
				})
				.collect();
			(deliveries, expired)
		};
		log_expired(&expired);
		drop(expired);
		if deliveries.is_empty() {
			tracing::trace!(name = %data.name(), "face.data.unsolicited");
		}
		self.dispatch(deliveries);
		Ok(())
	}
}

#[cfg(test)]
mod tests;
