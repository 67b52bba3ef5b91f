//! Announcement events, sinks and subscriptions.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use ndnkit_face::{Face, RegistrationId};
use ndnkit_primitives::{Name, PublisherId};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{PubSubConfig, Result};

/// Something an [`AnnouncementService`] observed about a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnouncementEvent {
	/// A publisher listed by the snapshot query.
	Existing(PublisherId),
	/// A publisher that announced itself after observation began.
	New(PublisherId),
	/// The snapshot query finished; `found` publishers were listed.
	DiscoveryComplete {
		/// Number of publishers in the snapshot.
		found: usize,
	},
	/// The snapshot query failed in the network.
	DiscoveryFailed(ndnkit_client::Error),
}

impl AnnouncementEvent {
	/// Returns the publisher this event reports, if any.
	pub fn publisher(&self) -> Option<PublisherId> {
		match self {
			Self::Existing(id) | Self::New(id) => Some(*id),
			Self::DiscoveryComplete { .. } | Self::DiscoveryFailed(_) => None,
		}
	}
}

struct SinkInner {
	delivered: Mutex<HashSet<PublisherId>>,
	handler: Box<dyn Fn(AnnouncementEvent) + Send + Sync>,
}

/// Delivery target for announcement events.
///
/// Clones share one ledger of delivered publishers: each publisher reaches the
/// handler at most once across all clones, whichever stream reports it first.
/// Give clones of one sink to both a snapshot and an observation of the same
/// topic to get each publisher exactly once.
#[derive(Clone)]
pub struct AnnouncementSink {
	inner: Arc<SinkInner>,
}

impl fmt::Debug for AnnouncementSink {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AnnouncementSink")
			.field("delivered", &self.inner.delivered.lock().len())
			.finish_non_exhaustive()
	}
}

impl AnnouncementSink {
	/// Creates a sink calling `handler` for each event that passes deduplication.
	pub fn new(handler: impl Fn(AnnouncementEvent) + Send + Sync + 'static) -> Self {
		Self {
			inner: Arc::new(SinkInner {
				delivered: Mutex::new(HashSet::new()),
				handler: Box::new(handler),
			}),
		}
	}

	/// Hands `event` to the handler unless it reports an already delivered publisher.
	///
	/// Returns true if the handler was called.
	pub fn deliver(&self, event: AnnouncementEvent) -> bool {
		if let Some(id) = event.publisher() {
			if !self.inner.delivered.lock().insert(id) {
				tracing::trace!(publisher = %id, "pubsub.sink.duplicate");
				return false;
			}
		}
		(self.inner.handler)(event);
		true
	}

	/// Returns true if `id` has been delivered through this sink.
	pub fn has_delivered(&self, id: PublisherId) -> bool {
		self.inner.delivered.lock().contains(&id)
	}
}

/// Which half of the announcement protocol a [`Subscription`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
	/// Snapshot of already known publishers.
	Existing,
	/// Standing observation of newly announced publishers.
	New,
}

/// Open registration with an [`AnnouncementService`].
///
/// Closing (or dropping) it stops further deliveries and releases its prefix
/// registration. Deliveries already running on the face's context may still
/// finish.
pub struct Subscription {
	topic: Name,
	kind: SubscriptionKind,
	cancel: CancellationToken,
	registration: Mutex<Option<(Arc<dyn Face>, RegistrationId)>>,
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription")
			.field("topic", &self.topic)
			.field("kind", &self.kind)
			.field("closed", &self.is_closed())
			.finish_non_exhaustive()
	}
}

impl Subscription {
	/// Creates an open subscription owning nothing but its cancellation token.
	pub fn new(topic: Name, kind: SubscriptionKind) -> Self {
		Self {
			topic,
			kind,
			cancel: CancellationToken::new(),
			registration: Mutex::new(None),
		}
	}

	/// Makes closing this subscription also unregister `id` from `face`.
	#[must_use]
	pub fn with_registration(mut self, face: Arc<dyn Face>, id: RegistrationId) -> Self {
		*self.registration.get_mut() = Some((face, id));
		self
	}

	/// Token cancelled when the subscription closes; delivery paths check it.
	pub fn token(&self) -> CancellationToken {
		self.cancel.clone()
	}

	/// Returns the subscribed topic.
	pub fn topic(&self) -> &Name {
		&self.topic
	}

	/// Returns which stream this subscription feeds.
	pub fn kind(&self) -> SubscriptionKind {
		self.kind
	}

	/// Returns true once closed.
	pub fn is_closed(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Stops deliveries and releases the registration. Safe to call repeatedly.
	pub fn close(&self) {
		self.cancel.cancel();
		let registration = self.registration.lock().take();
		if let Some((face, id)) = registration {
			face.unregister_prefix(id);
			tracing::debug!(topic = %self.topic, kind = ?self.kind, "pubsub.subscription.close");
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.close();
	}
}

/// Discovery of the publishers announcing under a topic.
pub trait AnnouncementService: Send + Sync {
	/// Queries the publishers already announced under `topic`.
	///
	/// Each listed publisher is delivered as [`AnnouncementEvent::Existing`],
	/// followed by one [`AnnouncementEvent::DiscoveryComplete`] (also when none
	/// were found) or one [`AnnouncementEvent::DiscoveryFailed`]. Returns
	/// without waiting for the answer.
	///
	/// # Errors
	///
	/// Returns an error if the query cannot be started.
	fn discover_existing_announcements(&self, sink: AnnouncementSink, topic: &Name, config: &PubSubConfig) -> Result<Subscription>;

	/// Delivers [`AnnouncementEvent::New`] for each publisher announcing under
	/// `topic` from now until the returned subscription is closed.
	///
	/// # Errors
	///
	/// Returns an error if the observation cannot be registered.
	fn observe_new_announcements(&self, sink: AnnouncementSink, topic: &Name, config: &PubSubConfig) -> Result<Subscription>;
}
