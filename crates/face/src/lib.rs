//! Network face abstraction.
//!
//! A [`Face`] is the only way this workspace touches the network. It expresses
//! interests and reports the outcome to a [`ResponseSink`] on whatever context
//! the face processes packets, dispatches incoming interests to registered
//! [`InterestHandler`]s, and sends data.
//!
//! Retransmission, routing and wire encoding are the face's concern.
//! [`LocalFace`] is an in-process implementation that loops interests back to
//! handlers registered on the same face.

#![warn(missing_docs)]

use std::fmt;
use std::sync::Arc;

use ndnkit_primitives::{Data, Interest, Name};
use thiserror::Error;

mod local;

pub use local::{DEFAULT_INTEREST_LIFETIME, DeliveryMode, LocalFace};

/// Errors reported synchronously by a face.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum FaceError {
	/// The face was closed and accepts no more traffic.
	#[error("face closed")]
	Closed,
}

/// Reason carried by a negative acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackReason {
	/// No route towards a producer of the name.
	NoRoute,
	/// The interest was dropped because of congestion.
	Congestion,
	/// The interest looped back as a duplicate.
	Duplicate,
}

impl fmt::Display for NackReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::NoRoute => "no route",
			Self::Congestion => "congestion",
			Self::Duplicate => "duplicate",
		})
	}
}

/// Handle returned by [`Face::register_prefix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(pub u64);

/// Receiver of the outcome of one expressed interest.
///
/// A face consumes the sink with exactly one call, or drops it without a call
/// if the interest is never answered.
pub trait ResponseSink: Send {
	/// Data satisfying the interest arrived.
	fn on_data(self: Box<Self>, data: Data);

	/// The network negatively acknowledged the interest.
	fn on_nack(self: Box<Self>, interest: Interest, reason: NackReason);
}

/// Handler for interests arriving under a registered prefix.
pub trait InterestHandler: Send + Sync {
	/// Called once per interest whose name falls under `prefix`.
	fn on_interest(&self, prefix: &Name, interest: &Interest, face: &dyn Face);
}

impl<F> InterestHandler for F
where
	F: Fn(&Name, &Interest, &dyn Face) + Send + Sync,
{
	fn on_interest(&self, prefix: &Name, interest: &Interest, face: &dyn Face) {
		self(prefix, interest, face)
	}
}

/// The network primitive.
pub trait Face: Send + Sync {
	/// Sends `interest`; the outcome is reported to `sink` asynchronously.
	///
	/// # Errors
	///
	/// Returns an error if the face refuses the interest outright. The sink is
	/// dropped without a call in that case.
	fn express_interest(&self, interest: Interest, sink: Box<dyn ResponseSink>) -> Result<(), FaceError>;

	/// Routes interests under `prefix` to `handler` until unregistered.
	///
	/// # Errors
	///
	/// Returns an error if the face cannot accept the registration.
	fn register_prefix(&self, prefix: Name, handler: Arc<dyn InterestHandler>) -> Result<RegistrationId, FaceError>;

	/// Removes a registration. Returns false if it was not registered.
	fn unregister_prefix(&self, id: RegistrationId) -> bool;

	/// Sends `data`, satisfying any pending interests it matches.
	///
	/// # Errors
	///
	/// Returns an error if the face cannot send.
	fn put_data(&self, data: Data) -> Result<(), FaceError>;
}
