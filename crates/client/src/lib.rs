//! Future-based request/response client over a [`Face`](ndnkit_face::Face).
//!
//! Expressing an interest is fire-and-forget; [`Client`] turns it into a
//! [`PendingData`] handle that completes exactly once, with the answering data,
//! a network failure, a timeout, or a cancellation.
//!
//! Each client owns its own pending-request table. Requests are correlated by a
//! client-local [`RequestId`], so two concurrent requests for the same name are
//! tracked and completed independently.

#![warn(missing_docs)]

mod client;
mod config;
mod pending;

use std::time::Duration;

use ndnkit_face::{FaceError, NackReason};
use ndnkit_primitives::Name;

pub use client::Client;
pub use config::{ClientConfig, ConfigError};
pub use pending::{PendingData, RequestId};

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure of a single request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The network could not deliver the request or its answer.
	#[error("network failure for {name}: {cause}")]
	Network {
		/// The requested name.
		name: Name,
		/// What the network reported.
		cause: NetworkCause,
	},
	/// No answer arrived before the deadline.
	#[error("request for {name} timed out after {after:?}")]
	Timeout {
		/// The requested name.
		name: Name,
		/// The deadline that elapsed.
		after: Duration,
	},
	/// The request was cancelled before an answer arrived.
	#[error("request for {name} was cancelled")]
	Cancelled {
		/// The requested name.
		name: Name,
	},
}

impl Error {
	/// Returns the name of the failed request.
	pub fn name(&self) -> &Name {
		match self {
			Self::Network { name, .. } | Self::Timeout { name, .. } | Self::Cancelled { name } => name,
		}
	}

	/// Returns true for [`Error::Timeout`].
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout { .. })
	}
}

/// Underlying cause of an [`Error::Network`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkCause {
	/// The network negatively acknowledged the interest.
	#[error("negative acknowledgement: {0}")]
	Nack(NackReason),
	/// The face refused the interest.
	#[error("{0}")]
	Face(#[from] FaceError),
	/// The face answered with data outside the requested name.
	#[error("unexpected response {0}")]
	Mismatch(Name),
}
