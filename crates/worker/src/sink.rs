use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::Domain;
use crate::panic::panic_message;
use crate::stats::{DomainCounters, DomainStats};

/// How a task failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
	/// The task panicked.
	Panicked,
	/// A fallible task returned an error.
	Returned,
}

/// Report for one failed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
	pub domain: Domain,
	pub kind: FailureKind,
	pub message: String,
}

/// Receives every swallowed task failure.
///
/// Failures never reach the submitter. The sink is the only place they surface, so
/// every dispatcher carries exactly one.
pub trait FailureSink: Send + Sync + 'static {
	fn report(&self, failure: &TaskFailure);
}

/// Default sink: logs failures through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl FailureSink for TracingSink {
	fn report(&self, failure: &TaskFailure) {
		tracing::error!(
			domain = failure.domain.as_str(),
			kind = ?failure.kind,
			message = %failure.message,
			"dispatcher.task_failed"
		);
	}
}

/// Shared bookkeeping for all domains of one dispatcher.
pub(crate) struct Monitor {
	sink: Arc<dyn FailureSink>,
	counters: [DomainCounters; 4],
}

impl Monitor {
	pub(crate) fn new(sink: Arc<dyn FailureSink>) -> Self {
		Self {
			sink,
			counters: Default::default(),
		}
	}

	pub(crate) fn submitted(&self, domain: Domain) {
		self.counters[domain.index()].submitted();
	}

	pub(crate) fn dropped(&self, domain: Domain) {
		self.counters[domain.index()].dropped();
	}

	/// Runs one task at the worker boundary, swallowing and reporting any failure.
	pub(crate) fn run<F>(&self, domain: Domain, task: F)
	where
		F: FnOnce() -> Result<(), String>,
	{
		let failure = match catch_unwind(AssertUnwindSafe(task)) {
			Ok(Ok(())) => None,
			Ok(Err(message)) => Some(TaskFailure {
				domain,
				kind: FailureKind::Returned,
				message,
			}),
			Err(payload) => Some(TaskFailure {
				domain,
				kind: FailureKind::Panicked,
				message: panic_message(&*payload),
			}),
		};

		let counters = &self.counters[domain.index()];
		match failure {
			None => counters.completed(),
			Some(failure) => {
				counters.failed();
				// A panicking sink must not take the worker down with it.
				let sink = &self.sink;
				if catch_unwind(AssertUnwindSafe(|| sink.report(&failure))).is_err() {
					tracing::error!(domain = domain.as_str(), "dispatcher.sink_panicked");
				}
			}
		}
	}

	pub(crate) fn snapshots(&self) -> Vec<DomainStats> {
		Domain::ALL
			.iter()
			.map(|&domain| self.counters[domain.index()].snapshot(domain))
			.collect()
	}
}
