use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc;

use crate::sink::{Monitor, TracingSink};
use crate::{Domain, Job, job};

/// Producer side of a serialized, FIFO, single-consumer task queue.
///
/// Cheap to clone. Tasks pushed from one thread run in push order; tasks pushed
/// from different threads run in the order the queue received them.
#[derive(Clone)]
pub struct TaskQueue {
	domain: Domain,
	tx: mpsc::UnboundedSender<Job>,
	monitor: Arc<Monitor>,
}

/// Consumer side of a [`TaskQueue`], bound to whichever thread drives it.
pub struct TaskPump {
	domain: Domain,
	rx: mpsc::UnboundedReceiver<Job>,
	monitor: Arc<Monitor>,
}

/// Creates a connected queue/pump pair sharing the given monitor.
pub(crate) fn channel(domain: Domain, monitor: Arc<Monitor>) -> (TaskQueue, TaskPump) {
	let (tx, rx) = mpsc::unbounded_channel();
	(
		TaskQueue {
			domain,
			tx,
			monitor: Arc::clone(&monitor),
		},
		TaskPump { domain, rx, monitor },
	)
}

impl TaskQueue {
	/// Creates a standalone queue whose failures are logged through `tracing`.
	pub fn pair(domain: Domain) -> (TaskQueue, TaskPump) {
		channel(domain, Arc::new(Monitor::new(Arc::new(TracingSink))))
	}

	/// Domain this queue feeds.
	pub fn domain(&self) -> Domain {
		self.domain
	}

	/// Appends a task. Never blocks.
	pub fn submit<F>(&self, task: F)
	where
		F: FnOnce() + Send + 'static,
	{
		self.push(job(task));
	}

	/// Returns `true` once the pump has been dropped.
	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}

	pub(crate) fn push(&self, job: Job) {
		self.monitor.submitted(self.domain);
		if self.tx.send(job).is_err() {
			self.monitor.dropped(self.domain);
			tracing::debug!(domain = self.domain.as_str(), "dispatcher.queue_closed");
		}
	}
}

impl TaskPump {
	/// Domain this pump drains.
	pub fn domain(&self) -> Domain {
		self.domain
	}

	/// Runs tasks on the calling thread until every producer is gone.
	///
	/// # Panics
	///
	/// Panics if called from within an async runtime context.
	pub fn run(mut self) {
		while let Some(job) = self.rx.blocking_recv() {
			self.monitor.run(self.domain, job);
		}
		tracing::debug!(domain = self.domain.as_str(), "dispatcher.pump_finished");
	}

	/// Runs the tasks queued at the time of the call and returns how many ran.
	///
	/// Tasks enqueued by those tasks wait for the next call, so a host event loop can
	/// interleave draining with its own work.
	pub fn run_pending(&mut self) -> usize {
		let budget = self.rx.len();
		let mut ran = 0;
		while ran < budget {
			let Ok(job) = self.rx.try_recv() else {
				break;
			};
			self.monitor.run(self.domain, job);
			ran += 1;
		}
		ran
	}

	/// Drives this pump on a dedicated named OS thread.
	pub(crate) fn spawn(self, name: String) -> std::io::Result<JoinHandle<()>> {
		tracing::trace!(domain = self.domain.as_str(), thread = %name, "dispatcher.spawn_pump");
		std::thread::Builder::new().name(name).spawn(move || self.run())
	}
}
