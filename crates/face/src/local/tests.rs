use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
	Data(Data),
	Nack(Name, NackReason),
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<Outcome>>>);

impl Recorder {
	fn sink(&self) -> Box<dyn ResponseSink> {
		Box::new(self.clone())
	}

	fn outcomes(&self) -> Vec<Outcome> {
		self.0.lock().clone()
	}
}

impl ResponseSink for Recorder {
	fn on_data(self: Box<Self>, data: Data) {
		self.0.lock().push(Outcome::Data(data));
	}

	fn on_nack(self: Box<Self>, interest: Interest, reason: NackReason) {
		self.0.lock().push(Outcome::Nack(interest.name().clone(), reason));
	}
}

fn name(s: &str) -> Name {
	s.parse().expect("valid name")
}

#[test]
fn primed_response_is_delivered_inline() {
	let face = LocalFace::new();
	let data = Data::new(name("/test/sync"), "...");
	face.respond_with(data.clone());

	let recorder = Recorder::default();
	face.express_interest(Interest::new(name("/test/sync")), recorder.sink())
		.expect("express");

	assert_eq!(recorder.outcomes(), vec![Outcome::Data(data)]);
	assert_eq!(face.pending_interests(), 0);
	assert_eq!(face.sent_interests().len(), 1);
}

#[test]
fn primed_response_is_consumed_once() {
	let face = LocalFace::new();
	face.respond_with(Data::new(name("/a"), "x"));

	let first = Recorder::default();
	let second = Recorder::default();
	face.express_interest(Interest::new(name("/a")), first.sink()).expect("express");
	face.express_interest(Interest::new(name("/a")), second.sink()).expect("express");

	assert_eq!(first.outcomes().len(), 1);
	assert!(second.outcomes().is_empty());
	assert_eq!(face.pending_interests(), 1);
}

#[test]
fn queued_mode_defers_until_processed() {
	let face = LocalFace::with_mode(DeliveryMode::Queued);
	face.respond_with(Data::new(name("/test/async"), "..."));

	let recorder = Recorder::default();
	face.express_interest(Interest::new(name("/test/async")), recorder.sink())
		.expect("express");
	assert!(recorder.outcomes().is_empty());

	assert_eq!(face.process_events(), 1);
	assert_eq!(recorder.outcomes().len(), 1);
	assert_eq!(face.process_events(), 0);
}

#[test]
fn registered_handler_answers_pending_interest() {
	let face = LocalFace::new();
	let handler = |_prefix: &Name, interest: &Interest, face: &dyn Face| {
		let reply = Data::new(interest.name().append("v1"), Bytes::from_static(b"hello"));
		face.put_data(reply).expect("put");
	};
	face.register_prefix(name("/app"), Arc::new(handler)).expect("register");

	let recorder = Recorder::default();
	face.express_interest(Interest::new(name("/app/item")), recorder.sink())
		.expect("express");

	match recorder.outcomes().as_slice() {
		[Outcome::Data(data)] => {
			assert_eq!(data.name(), &name("/app/item/v1"));
			assert_eq!(data.content(), &Bytes::from_static(b"hello"));
		}
		other => panic!("unexpected outcomes: {other:?}"),
	}
	assert_eq!(face.pending_interests(), 0);
}

#[test]
fn unregistered_prefix_sees_no_interests() {
	let face = LocalFace::new();
	let seen = Arc::new(Mutex::new(0usize));
	let counter = Arc::clone(&seen);
	let id = face
		.register_prefix(
			name("/app"),
			Arc::new(move |_: &Name, _: &Interest, _: &dyn Face| *counter.lock() += 1),
		)
		.expect("register");

	face.express_interest(Interest::new(name("/app/1")), Recorder::default().sink())
		.expect("express");
	assert!(face.unregister_prefix(id));
	assert!(!face.unregister_prefix(id));
	face.express_interest(Interest::new(name("/app/2")), Recorder::default().sink())
		.expect("express");

	assert_eq!(*seen.lock(), 1);
	assert_eq!(face.registrations(), 0);
}

#[test]
fn primed_nack_is_reported() {
	let face = LocalFace::new();
	face.nack_with(name("/missing"), NackReason::NoRoute);

	let recorder = Recorder::default();
	face.express_interest(Interest::new(name("/missing")), recorder.sink())
		.expect("express");

	assert_eq!(recorder.outcomes(), vec![Outcome::Nack(name("/missing"), NackReason::NoRoute)]);
}

#[test]
fn unsolicited_data_is_recorded_only() {
	let face = LocalFace::new();
	face.put_data(Data::new(name("/nobody/asked"), "x")).expect("put");
	assert_eq!(face.sent_data().len(), 1);
	assert_eq!(face.pending_interests(), 0);
}

#[test]
fn closed_face_refuses_traffic() {
	let face = LocalFace::new();
	face.express_interest(Interest::new(name("/pending")), Recorder::default().sink())
		.expect("express");
	face.close();

	assert!(face.is_closed());
	assert_eq!(face.pending_interests(), 0);
	assert_eq!(
		face.express_interest(Interest::new(name("/x")), Recorder::default().sink()),
		Err(FaceError::Closed)
	);
	assert_eq!(face.put_data(Data::new(name("/x"), "x")), Err(FaceError::Closed));
}

#[test]
fn expired_interests_are_dropped_unanswered() {
	let face = LocalFace::new();
	let recorder = Recorder::default();
	for i in 0..5 {
		let interest = Interest::new(name("/short").append_number(i)).with_lifetime(Duration::from_millis(10));
		face.express_interest(interest, recorder.sink()).expect("express");
	}
	face.express_interest(Interest::new(name("/long")), recorder.sink())
		.expect("express");
	assert_eq!(face.pending_interests(), 6);

	thread::sleep(Duration::from_millis(50));

	assert_eq!(face.pending_interests(), 1);
	face.put_data(Data::new(name("/short/0"), "late")).expect("put");
	assert!(recorder.outcomes().is_empty());
	assert_eq!(face.sent_data().len(), 1);
}

#[test]
fn expiry_is_pruned_by_new_traffic() {
	let face = LocalFace::with_mode(DeliveryMode::Queued);
	let interest = Interest::new(name("/a")).with_lifetime(Duration::from_millis(5));
	face.express_interest(interest, Recorder::default().sink()).expect("express");
	thread::sleep(Duration::from_millis(20));

	face.express_interest(Interest::new(name("/b")), Recorder::default().sink())
		.expect("express");

	assert_eq!(face.pending_interests(), 1);
}
