//! Topic subscriber tracking publishers and partitions of interest.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use ndnkit_client::{Client, PendingData};
use ndnkit_face::Face;
use ndnkit_primitives::{Name, PublisherId};
use parking_lot::Mutex;

use crate::announcement::{AnnouncementEvent, AnnouncementService, AnnouncementSink, Subscription};
use crate::{Error, PubSubConfig, Result};

/// Progress of the snapshot query started by [`Subscriber::open`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DiscoveryStatus {
	/// Not started or still in flight.
	#[default]
	Pending,
	/// The snapshot listed `found` publishers.
	Complete {
		/// Number of publishers in the snapshot.
		found: usize,
	},
	/// The snapshot query failed.
	Failed(ndnkit_client::Error),
}

#[derive(Default)]
struct SubscriberState {
	known: HashSet<PublisherId>,
	partitions: BTreeSet<u64>,
	discovery: DiscoveryStatus,
}

impl SubscriberState {
	fn apply(&mut self, event: AnnouncementEvent) {
		match event {
			AnnouncementEvent::Existing(id) | AnnouncementEvent::New(id) => {
				self.known.insert(id);
			}
			AnnouncementEvent::DiscoveryComplete { found } => self.discovery = DiscoveryStatus::Complete { found },
			AnnouncementEvent::DiscoveryFailed(err) => self.discovery = DiscoveryStatus::Failed(err),
		}
	}
}

enum Lifecycle {
	Idle,
	Open { existing: Subscription, new: Subscription },
	Closed,
}

impl Lifecycle {
	fn label(&self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Open { .. } => "open",
			Self::Closed => "closed",
		}
	}
}

/// Subscriber to one topic.
///
/// Once [opened](Self::open) it learns every publisher on the topic, both those
/// already announced and those announcing later, into a set that only grows.
/// Independently it keeps the set of partitions the application wants to read;
/// [`tracked`](Self::tracked) pairs the two.
///
/// A subscriber opens at most once: `Idle → Open → Closed`.
pub struct Subscriber {
	topic: Name,
	face: Arc<dyn Face>,
	announcements: Arc<dyn AnnouncementService>,
	client: Arc<Client>,
	config: PubSubConfig,
	shared: Arc<Mutex<SubscriberState>>,
	lifecycle: Mutex<Lifecycle>,
}

impl fmt::Debug for Subscriber {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.lifecycle.lock().label();
		let shared = self.shared.lock();
		f.debug_struct("Subscriber")
			.field("topic", &self.topic)
			.field("state", &state)
			.field("known", &shared.known.len())
			.field("partitions", &shared.partitions)
			.finish_non_exhaustive()
	}
}

impl Subscriber {
	/// Creates an idle subscriber to `topic`.
	pub fn new(face: Arc<dyn Face>, topic: Name, announcements: Arc<dyn AnnouncementService>, client: Arc<Client>) -> Self {
		Self {
			topic,
			face,
			announcements,
			client,
			config: PubSubConfig::default(),
			shared: Arc::new(Mutex::new(SubscriberState::default())),
			lifecycle: Mutex::new(Lifecycle::Idle),
		}
	}

	/// Set the announcement naming and timing.
	#[must_use]
	pub fn with_config(mut self, config: PubSubConfig) -> Self {
		self.config = config;
		self
	}

	/// Returns the subscribed topic.
	pub fn topic(&self) -> &Name {
		&self.topic
	}

	/// Starts learning publishers.
	///
	/// Both the standing observation and the snapshot query are registered
	/// before this returns; their events may arrive on other threads at any
	/// point afterwards.
	///
	/// # Errors
	///
	/// Returns [`Error::Lifecycle`] if already open or closed, or the error of
	/// the announcement service. A failed open leaves the subscriber idle.
	pub fn open(&self) -> Result<()> {
		let mut lifecycle = self.lifecycle.lock();
		if !matches!(*lifecycle, Lifecycle::Idle) {
			return Err(Error::Lifecycle {
				topic: self.topic.clone(),
				state: lifecycle.label(),
			});
		}

		let shared = Arc::clone(&self.shared);
		let sink = AnnouncementSink::new(move |event| shared.lock().apply(event));

		// Observe first so nothing announced while the snapshot is in flight is missed.
		let new = self.announcements.observe_new_announcements(sink.clone(), &self.topic, &self.config)?;
		let existing = self.announcements.discover_existing_announcements(sink, &self.topic, &self.config)?;
		*lifecycle = Lifecycle::Open { existing, new };
		tracing::debug!(topic = %self.topic, "pubsub.subscriber.open");
		Ok(())
	}

	/// Stops learning publishers. The known publishers are kept.
	///
	/// Does nothing unless open.
	pub fn close(&self) {
		let previous = {
			let mut lifecycle = self.lifecycle.lock();
			if !matches!(*lifecycle, Lifecycle::Open { .. }) {
				return;
			}
			std::mem::replace(&mut *lifecycle, Lifecycle::Closed)
		};
		if let Lifecycle::Open { existing, new } = previous {
			existing.close();
			new.close();
		}
		tracing::debug!(topic = %self.topic, known = self.shared.lock().known.len(), "pubsub.subscriber.close");
	}

	/// Returns true while open.
	pub fn is_open(&self) -> bool {
		matches!(*self.lifecycle.lock(), Lifecycle::Open { .. })
	}

	/// Returns a snapshot of the publishers learned so far.
	pub fn known_publishers(&self) -> HashSet<PublisherId> {
		self.shared.lock().known.clone()
	}

	/// Adds a partition of interest. Returns false if it was already present.
	pub fn add(&self, partition: u64) -> bool {
		let added = self.shared.lock().partitions.insert(partition);
		tracing::trace!(topic = %self.topic, partition, added, "pubsub.subscriber.add");
		added
	}

	/// Removes a partition of interest. Returns false if it was not present.
	pub fn remove(&self, partition: u64) -> bool {
		let removed = self.shared.lock().partitions.remove(&partition);
		tracing::trace!(topic = %self.topic, partition, removed, "pubsub.subscriber.remove");
		removed
	}

	/// Returns the partitions of interest in ascending order.
	pub fn partitions(&self) -> Vec<u64> {
		self.shared.lock().partitions.iter().copied().collect()
	}

	/// Returns every (publisher, partition) pair worth fetching, sorted.
	pub fn tracked(&self) -> Vec<(PublisherId, u64)> {
		let shared = self.shared.lock();
		let mut publishers: Vec<_> = shared.known.iter().copied().collect();
		publishers.sort_unstable();
		publishers
			.into_iter()
			.flat_map(|publisher| shared.partitions.iter().map(move |&partition| (publisher, partition)))
			.collect()
	}

	/// Requests `<topic>/<publisher>/<partition>`.
	pub fn fetch(&self, publisher: PublisherId, partition: u64) -> PendingData {
		let name = self.topic.append(publisher.to_component()).append_number(partition);
		self.client.get_async(self.face.as_ref(), name)
	}

	/// Returns the progress of the snapshot query.
	pub fn discovery_status(&self) -> DiscoveryStatus {
		self.shared.lock().discovery.clone()
	}
}

impl Drop for Subscriber {
	fn drop(&mut self) {
		self.close();
	}
}
