//! Announcement protocol carried over a [`Face`].
//!
//! A publisher enters a topic by expressing an interest for
//! `<topic>/_announce/<id>`; observers registered under the announcement prefix
//! see it. Each announcing host also answers `<topic>/_announce/_list` with the
//! publishers it currently hosts, encoded as concatenated big-endian `u64`s.
//!
//! A snapshot is gathered in rounds: every query excludes the ids already
//! collected, so only a host with unreported publishers answers. The first
//! round left unanswered within the discovery timeout ends the snapshot.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};
use ndnkit_client::{Client, PendingData};
use ndnkit_face::{Face, InterestHandler, NackReason, RegistrationId, ResponseSink};
use ndnkit_primitives::{Component, Data, Interest, Name, PublisherId};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::announcement::{AnnouncementEvent, AnnouncementService, AnnouncementSink, Subscription, SubscriptionKind};
use crate::{PubSubConfig, Result, spawn};

const ID_LEN: usize = size_of::<u64>();

struct AnnouncedTopic {
	ids: Arc<Mutex<BTreeSet<PublisherId>>>,
	registration: RegistrationId,
}

/// [`AnnouncementService`] speaking the announcement protocol over a face.
///
/// Also acts as the announcing side for publishers hosted by this process; see
/// [`announce_entrance`](Self::announce_entrance).
pub struct NdnAnnouncementService {
	face: Arc<dyn Face>,
	client: Arc<Client>,
	announced: Mutex<HashMap<Name, AnnouncedTopic>>,
}

impl fmt::Debug for NdnAnnouncementService {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NdnAnnouncementService")
			.field("topics", &self.announced.lock().len())
			.finish_non_exhaustive()
	}
}

impl NdnAnnouncementService {
	/// Creates a service sending through `face`; snapshot queries go through `client`.
	pub fn new(face: Arc<dyn Face>, client: Arc<Client>) -> Self {
		Self {
			face,
			client,
			announced: Mutex::new(HashMap::new()),
		}
	}

	/// Announces publisher `id` under `topic`.
	///
	/// Observers currently registered see it as new; snapshot queries list it
	/// until [`announce_exit`](Self::announce_exit).
	///
	/// # Errors
	///
	/// Returns an error if the face refuses the list registration or the
	/// announcement interest.
	pub fn announce_entrance(&self, topic: &Name, id: PublisherId, config: &PubSubConfig) -> Result<()> {
		{
			let mut announced = self.announced.lock();
			match announced.get(topic) {
				Some(entry) => {
					entry.ids.lock().insert(id);
				}
				None => {
					let ids = Arc::new(Mutex::new(BTreeSet::from([id])));
					let list_name = config.list_name(topic);
					let responder = ListResponder {
						list_name: list_name.clone(),
						ids: Arc::clone(&ids),
					};
					let registration = self.face.register_prefix(list_name, Arc::new(responder))?;
					announced.insert(topic.clone(), AnnouncedTopic { ids, registration });
				}
			}
		}

		let name = config.announcement_prefix(topic).append(id.to_component());
		tracing::debug!(topic = %topic, publisher = %id, "pubsub.announce.entrance");
		self.face.express_interest(Interest::new(name), Box::new(AnnounceAck))?;
		Ok(())
	}

	/// Withdraws publisher `id` from snapshot answers for `topic`.
	///
	/// Returns false if it was not announced. The list registration is released
	/// with the last publisher of a topic.
	pub fn announce_exit(&self, topic: &Name, id: PublisherId) -> bool {
		let mut announced = self.announced.lock();
		let Some(entry) = announced.get(topic) else {
			return false;
		};
		let (removed, now_empty) = {
			let mut ids = entry.ids.lock();
			(ids.remove(&id), ids.is_empty())
		};
		if now_empty {
			if let Some(entry) = announced.remove(topic) {
				self.face.unregister_prefix(entry.registration);
			}
		}
		tracing::debug!(topic = %topic, publisher = %id, removed, "pubsub.announce.exit");
		removed
	}

	/// Returns the publishers this service currently announces under `topic`.
	pub fn announced(&self, topic: &Name) -> Vec<PublisherId> {
		self.announced
			.lock()
			.get(topic)
			.map(|entry| entry.ids.lock().iter().copied().collect())
			.unwrap_or_default()
	}
}

impl Drop for NdnAnnouncementService {
	fn drop(&mut self) {
		for (_, entry) in self.announced.get_mut().drain() {
			self.face.unregister_prefix(entry.registration);
		}
	}
}

impl AnnouncementService for NdnAnnouncementService {
	fn discover_existing_announcements(&self, sink: AnnouncementSink, topic: &Name, config: &PubSubConfig) -> Result<Subscription> {
		let subscription = Subscription::new(topic.clone(), SubscriptionKind::Existing);
		let snapshot = Snapshot {
			face: Arc::clone(&self.face),
			client: Arc::clone(&self.client),
			sink,
			cancel: subscription.token(),
			topic: topic.clone(),
			list_name: config.list_name(topic),
			timeout: config.discovery_timeout_duration(),
			seen: BTreeSet::new(),
		};
		// The first round leaves before this returns.
		let first = snapshot.query();

		tracing::debug!(topic = %topic, timeout = ?snapshot.timeout, "pubsub.discover.start");
		spawn::spawn("pubsub.discover", snapshot.run(first))?;
		Ok(subscription)
	}

	fn observe_new_announcements(&self, sink: AnnouncementSink, topic: &Name, config: &PubSubConfig) -> Result<Subscription> {
		let subscription = Subscription::new(topic.clone(), SubscriptionKind::New);
		let observer = AnnouncementObserver {
			sink,
			cancel: subscription.token(),
			list_component: Component::from(config.list_component.as_str()),
		};
		let prefix = config.announcement_prefix(topic);
		let registration = self.face.register_prefix(prefix, Arc::new(observer))?;
		tracing::debug!(topic = %topic, registration = registration.0, "pubsub.observe.start");
		Ok(subscription.with_registration(Arc::clone(&self.face), registration))
	}
}

/// One snapshot query in progress.
struct Snapshot {
	face: Arc<dyn Face>,
	client: Arc<Client>,
	sink: AnnouncementSink,
	cancel: CancellationToken,
	topic: Name,
	list_name: Name,
	timeout: Option<Duration>,
	seen: BTreeSet<PublisherId>,
}

impl Snapshot {
	fn query(&self) -> PendingData {
		let interest = Interest::new(self.list_name.clone()).with_exclude(self.seen.iter().map(|id| id.to_component()));
		self.client.express(self.face.as_ref(), interest)
	}

	async fn round(&self, pending: PendingData) -> Option<ndnkit_client::Result<Data>> {
		let answer = async {
			match self.timeout {
				Some(timeout) => pending.get_timeout(timeout).await,
				None => pending.await,
			}
		};
		tokio::select! {
			() = self.cancel.cancelled() => None,
			outcome = answer => Some(outcome),
		}
	}

	async fn run(mut self, first: PendingData) {
		let mut pending = first;
		loop {
			let Some(outcome) = self.round(pending).await else {
				tracing::debug!(topic = %self.topic, "pubsub.discover.cancelled");
				return;
			};
			let data = match outcome {
				Ok(data) => data,
				// Nobody with unreported publishers answered.
				Err(err) if err.is_timeout() => break,
				Err(err) => {
					tracing::warn!(topic = %self.topic, error = %err, "pubsub.discover.failed");
					if !self.cancel.is_cancelled() {
						self.sink.deliver(AnnouncementEvent::DiscoveryFailed(err));
					}
					return;
				}
			};

			let fresh: Vec<PublisherId> = decode_ids(data.content().clone())
				.into_iter()
				.filter(|id| self.seen.insert(*id))
				.collect();
			tracing::trace!(topic = %self.topic, fresh = fresh.len(), "pubsub.discover.round");
			if fresh.is_empty() {
				// A host ignoring the exclusion would be asked forever.
				tracing::warn!(topic = %self.topic, "pubsub.discover.stale_answer");
				break;
			}
			for id in fresh {
				if self.cancel.is_cancelled() {
					return;
				}
				self.sink.deliver(AnnouncementEvent::Existing(id));
			}
			pending = self.query();
		}

		let found = self.seen.len();
		tracing::debug!(topic = %self.topic, found, "pubsub.discover.complete");
		if !self.cancel.is_cancelled() {
			self.sink.deliver(AnnouncementEvent::DiscoveryComplete { found });
		}
	}
}

fn decode_ids(mut content: bytes::Bytes) -> Vec<PublisherId> {
	if content.len() % ID_LEN != 0 {
		tracing::warn!(len = content.len(), "pubsub.discover.trailing_bytes");
	}
	let mut ids = Vec::with_capacity(content.len() / ID_LEN);
	while content.remaining() >= ID_LEN {
		ids.push(PublisherId(content.get_u64()));
	}
	ids
}

fn encode_ids<'a>(ids: impl ExactSizeIterator<Item = &'a PublisherId>) -> BytesMut {
	let mut out = BytesMut::with_capacity(ids.len() * ID_LEN);
	for id in ids {
		out.put_u64(id.0);
	}
	out
}

/// Answers snapshot queries for one topic with the hosted ids not excluded.
///
/// Stays silent when every hosted id is excluded.
struct ListResponder {
	list_name: Name,
	ids: Arc<Mutex<BTreeSet<PublisherId>>>,
}

impl InterestHandler for ListResponder {
	fn on_interest(&self, _prefix: &Name, interest: &Interest, face: &dyn Face) {
		if interest.name() != &self.list_name {
			return;
		}
		let excluded: BTreeSet<PublisherId> = interest.exclude().iter().filter_map(PublisherId::from_component).collect();
		let content = {
			let ids = self.ids.lock();
			let unreported: Vec<&PublisherId> = ids.difference(&excluded).collect();
			if unreported.is_empty() {
				return;
			}
			encode_ids(unreported.into_iter()).freeze()
		};
		tracing::trace!(name = %self.list_name, len = content.len(), "pubsub.list.answer");
		if let Err(err) = face.put_data(Data::new(self.list_name.clone(), content)) {
			tracing::warn!(name = %self.list_name, error = %err, "pubsub.list.answer_failed");
		}
	}
}

/// Turns announcement interests into [`AnnouncementEvent::New`].
struct AnnouncementObserver {
	sink: AnnouncementSink,
	cancel: CancellationToken,
	list_component: Component,
}

impl InterestHandler for AnnouncementObserver {
	fn on_interest(&self, prefix: &Name, interest: &Interest, _face: &dyn Face) {
		if self.cancel.is_cancelled() {
			return;
		}
		let name = interest.name();
		if name.len() != prefix.len() + 1 {
			tracing::trace!(name = %name, "pubsub.observe.ignored");
			return;
		}
		let Some(component) = name.get(prefix.len()) else {
			return;
		};
		if component == &self.list_component {
			return;
		}
		match PublisherId::from_component(component) {
			Some(id) => {
				tracing::debug!(prefix = %prefix, publisher = %id, "pubsub.observe.new");
				self.sink.deliver(AnnouncementEvent::New(id));
			}
			None => tracing::warn!(name = %name, "pubsub.observe.malformed"),
		}
	}
}

/// Sink for our own announcement interests, which nobody is obliged to answer.
struct AnnounceAck;

impl ResponseSink for AnnounceAck {
	fn on_data(self: Box<Self>, data: Data) {
		tracing::trace!(name = %data.name(), "pubsub.announce.acked");
	}

	fn on_nack(self: Box<Self>, interest: Interest, reason: NackReason) {
		tracing::debug!(name = %interest.name(), %reason, "pubsub.announce.nacked");
	}
}
