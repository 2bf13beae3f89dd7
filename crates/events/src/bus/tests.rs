use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use super::*;

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(50);

fn bus() -> EventBus {
	EventBus::new(Dispatcher::new().expect("dispatcher should start"))
}

fn counting_handler(count: &Arc<AtomicUsize>) -> Handler {
	let count = Arc::clone(count);
	Handler::new(move |_| {
		count.fetch_add(1, Ordering::SeqCst);
	})
}

fn wait_for(count: &AtomicUsize, expected: usize) -> bool {
	let deadline = Instant::now() + WAIT;
	while Instant::now() < deadline {
		if count.load(Ordering::SeqCst) >= expected {
			return true;
		}
		thread::sleep(Duration::from_millis(2));
	}
	false
}

#[test]
fn handler_receives_published_event() {
	let bus = bus();
	let ty = EventType::root("test.opened");
	let (tx, rx) = mpsc::channel();
	let tx = Mutex::new(tx);
	bus.register(
		&ty,
		&Handler::new(move |event| {
			let path = event.payload::<String>().cloned();
			tx.lock().send(path).expect("test is waiting");
		}),
	);

	bus.publish(Event::with_payload(ty.clone(), String::from("a.txt")));

	assert_eq!(rx.recv_timeout(WAIT).expect("handler should run"), Some(String::from("a.txt")));
}

#[test]
fn super_type_handlers_see_sub_type_events_but_not_the_reverse() {
	let bus = bus();
	let parent = EventType::root("test.module");
	let child = EventType::child("test.module.loaded", &parent);
	let on_parent = Arc::new(AtomicUsize::new(0));
	let on_child = Arc::new(AtomicUsize::new(0));
	bus.register(&parent, &counting_handler(&on_parent));
	bus.register(&child, &counting_handler(&on_child));

	bus.publish(child.clone());
	assert!(wait_for(&on_parent, 1));
	assert!(wait_for(&on_child, 1));

	bus.publish(parent.clone());
	assert!(wait_for(&on_parent, 2));
	thread::sleep(QUIET);
	assert_eq!(on_child.load(Ordering::SeqCst), 1);
}

#[test]
fn registering_twice_is_a_no_op() {
	let bus = bus();
	let ty = EventType::root("test.dup");
	let count = Arc::new(AtomicUsize::new(0));
	let handler = counting_handler(&count);

	assert!(bus.register(&ty, &handler));
	assert!(!bus.register(&ty, &handler));
	assert_eq!(bus.handler_count(&ty), 1);

	bus.publish(ty.clone());
	assert!(wait_for(&count, 1));
	thread::sleep(QUIET);
	assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn unregistered_handler_is_not_called() {
	let bus = bus();
	let ty = EventType::root("test.unregister");
	let removed = Arc::new(AtomicUsize::new(0));
	let kept = Arc::new(AtomicUsize::new(0));
	let removed_handler = counting_handler(&removed);
	bus.register(&ty, &removed_handler);
	bus.register(&ty, &counting_handler(&kept));

	assert!(bus.unregister(&ty, &removed_handler));
	assert!(!bus.unregister(&ty, &removed_handler));
	assert_eq!(bus.handler_count(&ty), 1);

	bus.publish(ty.clone());
	assert!(wait_for(&kept, 1));
	thread::sleep(QUIET);
	assert_eq!(removed.load(Ordering::SeqCst), 0);
}

#[test]
fn unregistering_last_handler_drops_the_type() {
	let bus = bus();
	let ty = EventType::root("test.last");
	let handler = Handler::new(|_| {});
	bus.register(&ty, &handler);
	bus.unregister(&ty, &handler);
	assert_eq!(bus.handler_count(&ty), 0);
	assert!(bus.inner.handlers.read().is_empty());
}

#[test]
fn identical_closures_are_distinct_handlers() {
	let bus = bus();
	let ty = EventType::root("test.identity");
	assert!(bus.register(&ty, &Handler::new(|_| {})));
	assert!(bus.register(&ty, &Handler::new(|_| {})));
	assert_eq!(bus.handler_count(&ty), 2);
}

#[test]
fn every_handler_runs_once_per_event() {
	let bus = bus();
	let ty = EventType::root("test.fanout");
	let counts: Vec<_> = (0..16).map(|_| Arc::new(AtomicUsize::new(0))).collect();
	for count in &counts {
		bus.register(&ty, &counting_handler(count));
	}

	for _ in 0..10 {
		bus.publish(ty.clone());
	}

	for count in &counts {
		assert!(wait_for(count, 10));
	}
	thread::sleep(QUIET);
	for count in &counts {
		assert_eq!(count.load(Ordering::SeqCst), 10);
	}
}

#[test]
fn publishing_without_handlers_does_nothing() {
	let bus = bus();
	bus.publish(EventType::root("test.nobody"));
	thread::sleep(QUIET);
}

#[test]
fn consumable_event_is_redelivered_until_consumed() {
	let bus = bus();
	let ty = EventType::root("test.request").consumable();
	let deliveries = Arc::new(AtomicUsize::new(0));
	let seen = Arc::clone(&deliveries);
	bus.register(
		&ty,
		&Handler::new(move |event| {
			if seen.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
				assert!(event.consume());
			}
		}),
	);

	bus.publish(ty.clone());

	assert!(wait_for(&deliveries, 3));
	thread::sleep(QUIET);
	assert_eq!(deliveries.load(Ordering::SeqCst), 3);
}

#[test]
fn consumed_event_reaches_every_handler_of_the_round() {
	let bus = bus();
	let ty = EventType::root("test.claim").consumable();
	let count = Arc::new(AtomicUsize::new(0));
	for _ in 0..4 {
		let count = Arc::clone(&count);
		bus.register(
			&ty,
			&Handler::new(move |event| {
				event.consume();
				count.fetch_add(1, Ordering::SeqCst);
			}),
		);
	}

	bus.publish(ty.clone());

	assert!(wait_for(&count, 4));
	thread::sleep(QUIET);
	assert_eq!(count.load(Ordering::SeqCst), 4);
}

#[test]
fn unconsumed_event_waits_for_a_late_handler() {
	let bus = bus();
	let ty = EventType::root("test.late").consumable();
	bus.publish(ty.clone());
	thread::sleep(Duration::from_millis(20));

	let (tx, rx) = mpsc::channel();
	let tx = Mutex::new(tx);
	bus.register(
		&ty,
		&Handler::new(move |event| {
			if event.consume() {
				tx.lock().send(()).expect("test is waiting");
			}
		}),
	);

	rx.recv_timeout(WAIT).expect("late handler should claim the event");
}

#[test]
fn redelivery_delay_spaces_out_rounds() {
	let dispatcher = Dispatcher::new().expect("dispatcher should start");
	let bus = EventBus::with_config(
		dispatcher,
		EventBusConfig {
			redelivery_delay: Duration::from_millis(40),
		},
	);
	let ty = EventType::root("test.spaced").consumable();
	let times = Arc::new(Mutex::new(Vec::new()));
	let seen = Arc::clone(&times);
	bus.register(
		&ty,
		&Handler::new(move |event| {
			let mut times = seen.lock();
			times.push(Instant::now());
			if times.len() == 2 {
				event.consume();
			}
		}),
	);

	bus.publish(ty.clone());

	let deadline = Instant::now() + WAIT;
	while times.lock().len() < 2 && Instant::now() < deadline {
		thread::sleep(Duration::from_millis(2));
	}
	let times = times.lock();
	assert_eq!(times.len(), 2);
	assert!(times[1] - times[0] >= Duration::from_millis(40));
}

#[test]
fn plain_events_are_not_redelivered() {
	let bus = bus();
	let ty = EventType::root("test.plain");
	let count = Arc::new(AtomicUsize::new(0));
	bus.register(&ty, &counting_handler(&count));

	bus.publish(ty.clone());

	assert!(wait_for(&count, 1));
	thread::sleep(QUIET);
	assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn panicking_handler_does_not_block_the_round() {
	let bus = bus();
	let ty = EventType::root("test.panicky").consumable();
	let rounds = Arc::new(AtomicUsize::new(0));
	bus.register(&ty, &Handler::new(|_| panic!("handler failed")));
	let seen = Arc::clone(&rounds);
	bus.register(
		&ty,
		&Handler::new(move |event| {
			if seen.fetch_add(1, Ordering::SeqCst) == 1 {
				event.consume();
			}
		}),
	);

	bus.publish(ty.clone());

	assert!(wait_for(&rounds, 2));
	thread::sleep(QUIET);
	assert_eq!(rounds.load(Ordering::SeqCst), 2);
}
