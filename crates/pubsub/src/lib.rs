//! Publisher discovery and subscriptions on top of [`ndnkit_client`].
//!
//! Publishers announce themselves under `<topic>/_announce`. An
//! [`AnnouncementService`] reports them in two ways: a one-shot snapshot of the
//! publishers already known ([`AnnouncementEvent::Existing`]) and a standing
//! registration for publishers announcing later ([`AnnouncementEvent::New`]).
//! Passing clones of one [`AnnouncementSink`] to both composes them into one
//! gap-free, duplicate-free stream.
//!
//! A [`Subscriber`] wires both into its known-publishers set and tracks which
//! partitions the application wants to fetch from them.

#![warn(missing_docs)]

mod announcement;
mod config;
mod ndn;
mod spawn;
mod subscriber;

use ndnkit_face::FaceError;
use ndnkit_primitives::Name;

pub use announcement::{AnnouncementEvent, AnnouncementService, AnnouncementSink, Subscription, SubscriptionKind};
pub use config::PubSubConfig;
pub use ndn::NdnAnnouncementService;
pub use subscriber::{DiscoveryStatus, Subscriber};

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// An operation is not valid in the subscriber's current state.
	#[error("subscriber for {topic} is {state}")]
	Lifecycle {
		/// Topic of the subscriber.
		topic: Name,
		/// State the subscriber was in.
		state: &'static str,
	},
	/// The face refused a registration or an interest.
	#[error(transparent)]
	Face(#[from] FaceError),
	/// The configuration could not be parsed.
	#[error("invalid pub/sub config: {0}")]
	Config(#[from] toml::de::Error),
	/// No async runtime was available for background discovery.
	#[error("failed to start discovery runtime: {0}")]
	Runtime(#[from] std::io::Error),
}
