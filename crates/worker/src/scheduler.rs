use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};

use crate::sink::Monitor;
use crate::{Domain, Job};

/// Deadline used when `Instant` arithmetic would overflow.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

pub(crate) type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

pub(crate) enum ScheduleCmd {
	Once { delay: Duration, job: Job },
	FixedRate { delay: Duration, period: Duration, task: RepeatingTask },
}

enum TimerJob {
	Once(Job),
	Repeating { task: RepeatingTask, period: Duration },
}

struct Timer {
	deadline: Instant,
	seq: u64,
	job: TimerJob,
}

impl PartialEq for Timer {
	fn eq(&self, other: &Self) -> bool {
		self.deadline == other.deadline && self.seq == other.seq
	}
}

impl Eq for Timer {}

impl PartialOrd for Timer {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Timer {
	fn cmp(&self, other: &Self) -> Ordering {
		self.deadline.cmp(&other.deadline).then(self.seq.cmp(&other.seq))
	}
}

/// Single-threaded timer backing [`Domain::Scheduled`].
///
/// Timers are ordered by deadline, then by submission sequence, and every callback
/// runs inline on the timer thread, so callbacks never overlap.
pub(crate) struct Scheduler {
	tx: mpsc::UnboundedSender<ScheduleCmd>,
	monitor: Arc<Monitor>,
}

impl Scheduler {
	pub(crate) fn start(thread_name: String, monitor: Arc<Monitor>) -> std::io::Result<Self> {
		let (tx, rx) = mpsc::unbounded_channel();
		let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
		let loop_monitor = Arc::clone(&monitor);
		tracing::trace!(domain = Domain::Scheduled.as_str(), thread = %thread_name, "dispatcher.spawn_timer");
		std::thread::Builder::new()
			.name(thread_name)
			.spawn(move || runtime.block_on(timer_loop(rx, loop_monitor)))?;
		Ok(Self { tx, monitor })
	}

	pub(crate) fn schedule(&self, cmd: ScheduleCmd) {
		self.monitor.submitted(Domain::Scheduled);
		if self.tx.send(cmd).is_err() {
			self.monitor.dropped(Domain::Scheduled);
			tracing::debug!(domain = Domain::Scheduled.as_str(), "dispatcher.timer_closed");
		}
	}
}

async fn timer_loop(mut rx: mpsc::UnboundedReceiver<ScheduleCmd>, monitor: Arc<Monitor>) {
	let mut timers: BinaryHeap<Reverse<Timer>> = BinaryHeap::new();
	let mut seq: u64 = 0;

	loop {
		let next_deadline = timers.peek().map(|Reverse(timer)| timer.deadline);
		tokio::select! {
			biased;
			cmd = rx.recv() => {
				let Some(cmd) = cmd else {
					break;
				};
				seq = seq.wrapping_add(1);
				let now = Instant::now();
				let timer = match cmd {
					ScheduleCmd::Once { delay, job } => Timer {
						deadline: saturating_deadline(now, delay),
						seq,
						job: TimerJob::Once(job),
					},
					ScheduleCmd::FixedRate { delay, period, task } => Timer {
						deadline: saturating_deadline(now, delay),
						seq,
						job: TimerJob::Repeating { task, period },
					},
				};
				timers.push(Reverse(timer));
			}
			() = sleep_until_opt(next_deadline) => {
				fire_due(&mut timers, &mut seq, &monitor);
			}
		}
	}

	tracing::debug!(pending = timers.len(), "dispatcher.timer_finished");
}

async fn sleep_until_opt(deadline: Option<Instant>) {
	match deadline {
		Some(deadline) => sleep_until(deadline).await,
		None => std::future::pending().await,
	}
}

fn fire_due(timers: &mut BinaryHeap<Reverse<Timer>>, seq: &mut u64, monitor: &Monitor) {
	let now = Instant::now();
	while timers.peek().is_some_and(|Reverse(timer)| timer.deadline <= now) {
		let Some(Reverse(timer)) = timers.pop() else {
			break;
		};
		match timer.job {
			TimerJob::Once(job) => monitor.run(Domain::Scheduled, job),
			TimerJob::Repeating { mut task, period } => {
				monitor.run(Domain::Scheduled, || {
					task();
					Ok(())
				});
				// Fixed rate: the next run is anchored on the previous deadline, not on now.
				*seq = seq.wrapping_add(1);
				monitor.submitted(Domain::Scheduled);
				timers.push(Reverse(Timer {
					deadline: saturating_deadline(timer.deadline, period),
					seq: *seq,
					job: TimerJob::Repeating { task, period },
				}));
			}
		}
	}
}

fn saturating_deadline(base: Instant, offset: Duration) -> Instant {
	base.checked_add(offset)
		.or_else(|| base.checked_add(FAR_FUTURE))
		.unwrap_or(base)
}
