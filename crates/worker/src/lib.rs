//! Execution domains for the editor core.
//!
//! Every callback in the editor runs on one of four logical threads:
//!
//! * [`Domain::Background`]: unordered, many concurrent workers.
//! * [`Domain::UiAffine`]: strict FIFO on the UI thread.
//! * [`Domain::EngineAffine`]: strict FIFO on the 3D engine thread.
//! * [`Domain::Scheduled`]: strict FIFO timer thread for delayed and periodic work.
//!
//! [`Dispatcher`] owns all four. Submission is fire-and-forget: there is no result,
//! no cancellation, and a failing task (panic or returned error) is reported to the
//! dispatcher's [`FailureSink`] without stopping the domain.

mod dispatcher;
mod domain;
mod panic;
mod pool;
mod queue;
mod scheduler;
mod sink;
mod stats;

pub use dispatcher::{Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use domain::Domain;
pub use queue::{TaskPump, TaskQueue};
pub use sink::{FailureKind, FailureSink, TaskFailure, TracingSink};
pub use stats::DomainStats;

/// Boxed unit of work as stored by every domain.
pub(crate) type Job = Box<dyn FnOnce() -> Result<(), String> + Send + 'static>;

pub(crate) fn job<F>(task: F) -> Job
where
	F: FnOnce() + Send + 'static,
{
	Box::new(move || {
		task();
		Ok(())
	})
}
