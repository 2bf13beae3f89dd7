use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use rstest::rstest;

use super::*;
use crate::{FailureKind, TaskFailure};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RecordingSink {
	failures: Mutex<Vec<TaskFailure>>,
}

impl FailureSink for RecordingSink {
	fn report(&self, failure: &TaskFailure) {
		self.failures.lock().push(failure.clone());
	}
}

fn recording_dispatcher() -> (Dispatcher, Arc<RecordingSink>) {
	let sink = Arc::new(RecordingSink::default());
	let dispatcher = Dispatcher::builder()
		.failure_sink(Arc::clone(&sink) as Arc<dyn FailureSink>)
		.build()
		.expect("dispatcher should start");
	(dispatcher, sink)
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
	let deadline = Instant::now() + WAIT;
	while Instant::now() < deadline {
		if cond() {
			return true;
		}
		thread::sleep(Duration::from_millis(2));
	}
	cond()
}

#[rstest]
#[case::ui(Domain::UiAffine)]
#[case::engine(Domain::EngineAffine)]
#[case::scheduled(Domain::Scheduled)]
fn serialized_domains_run_in_submission_order(#[case] domain: Domain) {
	let dispatcher = Dispatcher::new().expect("dispatcher should start");
	let log = Arc::new(Mutex::new(Vec::new()));
	let (done_tx, done_rx) = mpsc::channel();

	for i in 0..200 {
		let log = Arc::clone(&log);
		dispatcher.submit(domain, move || log.lock().push(i));
	}
	dispatcher.submit(domain, move || done_tx.send(()).expect("test is waiting"));

	done_rx.recv_timeout(WAIT).expect("queue should drain");
	assert_eq!(*log.lock(), (0..200).collect::<Vec<_>>());
}

#[rstest]
#[case::ui(Domain::UiAffine)]
#[case::engine(Domain::EngineAffine)]
#[case::scheduled(Domain::Scheduled)]
fn serialized_domains_never_overlap(#[case] domain: Domain) {
	let dispatcher = Dispatcher::new().expect("dispatcher should start");
	let active = Arc::new(AtomicUsize::new(0));
	let overlaps = Arc::new(AtomicUsize::new(0));
	let (done_tx, done_rx) = mpsc::channel();

	for _ in 0..20 {
		let active = Arc::clone(&active);
		let overlaps = Arc::clone(&overlaps);
		dispatcher.submit(domain, move || {
			if active.fetch_add(1, Ordering::SeqCst) != 0 {
				overlaps.fetch_add(1, Ordering::SeqCst);
			}
			thread::sleep(Duration::from_millis(1));
			active.fetch_sub(1, Ordering::SeqCst);
		});
	}
	dispatcher.submit(domain, move || done_tx.send(()).expect("test is waiting"));

	done_rx.recv_timeout(WAIT).expect("queue should drain");
	assert_eq!(overlaps.load(Ordering::SeqCst), 0);
}

#[test]
fn background_tasks_run_concurrently() {
	const N: usize = 8;
	let dispatcher = Dispatcher::new().expect("dispatcher should start");
	let running = Arc::new(AtomicUsize::new(0));
	let (tx, rx) = mpsc::channel();

	for _ in 0..N {
		let running = Arc::clone(&running);
		let tx = tx.clone();
		dispatcher.submit(Domain::Background, move || {
			running.fetch_add(1, Ordering::SeqCst);
			// Every task blocks until all of them are in flight at once.
			let deadline = Instant::now() + WAIT;
			while running.load(Ordering::SeqCst) < N && Instant::now() < deadline {
				thread::sleep(Duration::from_millis(1));
			}
			tx.send(running.load(Ordering::SeqCst) >= N).expect("test is waiting");
		});
	}

	for _ in 0..N {
		assert!(rx.recv_timeout(WAIT * 2).expect("task should finish"));
	}
}

#[rstest]
#[case::background(Domain::Background)]
#[case::ui(Domain::UiAffine)]
#[case::engine(Domain::EngineAffine)]
#[case::scheduled(Domain::Scheduled)]
fn panicking_task_is_reported_and_domain_keeps_going(#[case] domain: Domain) {
	let (dispatcher, sink) = recording_dispatcher();
	let (tx, rx) = mpsc::channel();

	dispatcher.submit(domain, || panic!("boom"));
	// Background is unordered, so only chain the follow-up on serialized domains.
	if domain == Domain::Background {
		assert!(wait_until(|| !sink.failures.lock().is_empty()));
	}
	dispatcher.submit(domain, move || tx.send("after").expect("test is waiting"));

	assert_eq!(rx.recv_timeout(WAIT).expect("domain should survive"), "after");
	assert!(wait_until(|| sink.failures.lock().len() == 1));
	assert_eq!(
		sink.failures.lock()[0],
		TaskFailure {
			domain,
			kind: FailureKind::Panicked,
			message: "boom".to_string(),
		}
	);
}

#[test]
fn fallible_task_error_is_reported() {
	let (dispatcher, sink) = recording_dispatcher();
	dispatcher.submit_fallible(Domain::EngineAffine, || Err::<(), _>("no context"));
	dispatcher.submit_fallible(Domain::EngineAffine, || Ok::<(), String>(()));

	assert!(wait_until(|| {
		dispatcher.stats()[Domain::EngineAffine as usize].pending() == 0
	}));
	let failures = sink.failures.lock().clone();
	assert_eq!(failures.len(), 1);
	assert_eq!(failures[0].kind, FailureKind::Returned);
	assert_eq!(failures[0].message, "no context");
}

#[test]
fn scheduled_task_waits_for_its_delay() {
	let dispatcher = Dispatcher::new().expect("dispatcher should start");
	let (tx, rx) = mpsc::channel();
	let start = Instant::now();

	dispatcher.schedule(move || tx.send(Instant::now()).expect("test is waiting"), Duration::from_millis(50));

	let ran_at = rx.recv_timeout(WAIT).expect("timer should fire");
	assert!(ran_at.duration_since(start) >= Duration::from_millis(50));
}

#[test]
fn earlier_deadline_runs_first_regardless_of_submission() {
	let dispatcher = Dispatcher::new().expect("dispatcher should start");
	let log = Arc::new(Mutex::new(Vec::new()));
	let (tx, rx) = mpsc::channel();

	let late = Arc::clone(&log);
	dispatcher.schedule(
		move || {
			late.lock().push("late");
			tx.send(()).expect("test is waiting");
		},
		Duration::from_millis(80),
	);
	let early = Arc::clone(&log);
	dispatcher.schedule(move || early.lock().push("early"), Duration::from_millis(10));

	rx.recv_timeout(WAIT).expect("timer should fire");
	assert_eq!(*log.lock(), vec!["early", "late"]);
}

#[test]
fn fixed_rate_task_repeats_and_survives_panics() {
	let (dispatcher, sink) = recording_dispatcher();
	let runs = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&runs);

	dispatcher.schedule_at_fixed_rate(
		move || {
			if counter.fetch_add(1, Ordering::SeqCst) == 1 {
				panic!("second run fails");
			}
		},
		Duration::ZERO,
		Duration::from_millis(5),
	);

	assert!(wait_until(|| runs.load(Ordering::SeqCst) >= 4));
	assert_eq!(sink.failures.lock().len(), 1);
}

#[test]
#[should_panic(expected = "fixed-rate period must be > 0")]
fn fixed_rate_rejects_zero_period() {
	let dispatcher = Dispatcher::new().expect("dispatcher should start");
	dispatcher.schedule_at_fixed_rate(|| {}, Duration::ZERO, Duration::ZERO);
}

#[test]
fn unbounded_delay_does_not_stop_the_timer() {
	let dispatcher = Dispatcher::new().expect("dispatcher should start");
	let (tx, rx) = mpsc::channel();

	dispatcher.schedule(|| {}, Duration::MAX);
	dispatcher.schedule(move || tx.send(()).expect("test is waiting"), Duration::from_millis(10));

	rx.recv_timeout(WAIT).expect("later timer should still fire");
	assert!(wait_until(|| dispatcher.stats()[Domain::Scheduled as usize].completed == 1));
}

#[test]
fn unbounded_period_does_not_stop_the_timer() {
	let dispatcher = Dispatcher::new().expect("dispatcher should start");
	let runs = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&runs);
	let (tx, rx) = mpsc::channel();

	dispatcher.schedule_at_fixed_rate(
		move || {
			counter.fetch_add(1, Ordering::SeqCst);
		},
		Duration::ZERO,
		Duration::MAX,
	);
	assert!(wait_until(|| runs.load(Ordering::SeqCst) == 1));
	dispatcher.schedule(move || tx.send(()).expect("test is waiting"), Duration::from_millis(10));

	rx.recv_timeout(WAIT).expect("later timer should still fire");
	assert_eq!(runs.load(Ordering::SeqCst), 1);
	assert!(wait_until(|| dispatcher.stats()[Domain::Scheduled as usize].completed == 2));
	assert_eq!(dispatcher.stats()[Domain::Scheduled as usize].dropped, 0);
}

#[test]
fn affine_domains_run_on_their_own_named_threads() {
	let dispatcher = Dispatcher::builder()
		.config(DispatcherConfig {
			thread_prefix: "affinity".to_string(),
			..DispatcherConfig::default()
		})
		.build()
		.expect("dispatcher should start");
	let (tx, rx) = mpsc::channel();

	for domain in [Domain::UiAffine, Domain::EngineAffine, Domain::Scheduled] {
		let tx = tx.clone();
		dispatcher.submit(domain, move || {
			let name = thread::current().name().map(str::to_string);
			tx.send((domain, name)).expect("test is waiting");
		});
	}

	let mut seen: Vec<_> = (0..3).map(|_| rx.recv_timeout(WAIT).expect("task should run")).collect();
	seen.sort();
	assert_eq!(
		seen,
		vec![
			(Domain::UiAffine, Some("affinity-ui".to_string())),
			(Domain::EngineAffine, Some("affinity-engine".to_string())),
			(Domain::Scheduled, Some("affinity-timer".to_string())),
		]
	);
}

#[test]
fn hosted_ui_pump_runs_on_the_host_thread() {
	let dispatcher = Dispatcher::builder().host_ui().build().expect("dispatcher should start");
	let mut pump = dispatcher.take_hosted_pump(Domain::UiAffine).expect("ui is hosted");
	assert!(dispatcher.take_hosted_pump(Domain::UiAffine).is_none());
	assert!(dispatcher.take_hosted_pump(Domain::EngineAffine).is_none());

	let seen = Arc::new(Mutex::new(Vec::new()));
	for i in 0..3 {
		let seen = Arc::clone(&seen);
		dispatcher.submit(Domain::UiAffine, move || seen.lock().push((i, thread::current().id())));
	}

	assert_eq!(pump.run_pending(), 3);
	let host = thread::current().id();
	assert_eq!(*seen.lock(), vec![(0, host), (1, host), (2, host)]);
}

#[test]
fn stats_count_outcomes_per_domain() {
	let (dispatcher, _sink) = recording_dispatcher();
	dispatcher.submit(Domain::UiAffine, || {});
	dispatcher.submit(Domain::UiAffine, || panic!("counted"));
	dispatcher.submit(Domain::Background, || {});

	assert!(wait_until(|| dispatcher.stats().iter().all(|s| s.pending() == 0)));
	let stats = dispatcher.stats();
	let ui = stats[Domain::UiAffine as usize];
	assert_eq!((ui.submitted, ui.completed, ui.failed), (2, 1, 1));
	let bg = stats[Domain::Background as usize];
	assert_eq!((bg.submitted, bg.completed, bg.failed), (1, 1, 0));
}

#[test]
fn dispatcher_can_be_released_from_its_own_background_task() {
	let dispatcher = Dispatcher::new().expect("dispatcher should start");
	let (tx, rx) = mpsc::channel();
	let owned = dispatcher.clone();
	drop(dispatcher);

	let handle = owned.clone();
	owned.submit(Domain::Background, move || {
		drop(handle);
		tx.send(()).expect("test is waiting");
	});
	drop(owned);

	rx.recv_timeout(WAIT).expect("task should run");
}
