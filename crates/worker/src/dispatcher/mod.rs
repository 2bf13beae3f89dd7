use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::pool::BackgroundPool;
use crate::queue::{self, TaskPump, TaskQueue};
use crate::scheduler::{ScheduleCmd, Scheduler};
use crate::sink::{FailureSink, Monitor, TracingSink};
use crate::{Domain, DomainStats, Job, job};

#[cfg(test)]
mod tests;

/// Sizing and naming for the dispatcher's threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
	/// Upper bound on concurrently running background tasks.
	pub background_threads: usize,
	/// Idle time after which a background thread is retired.
	pub keep_alive: Duration,
	/// Prefix for every thread the dispatcher names.
	pub thread_prefix: String,
}

impl Default for DispatcherConfig {
	fn default() -> Self {
		Self {
			background_threads: 512,
			keep_alive: Duration::from_secs(10),
			thread_prefix: "atelier".to_string(),
		}
	}
}

/// Builder for a [`Dispatcher`].
pub struct DispatcherBuilder {
	config: DispatcherConfig,
	sink: Arc<dyn FailureSink>,
	host_ui: bool,
	host_engine: bool,
}

impl Default for DispatcherBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl DispatcherBuilder {
	pub fn new() -> Self {
		Self {
			config: DispatcherConfig::default(),
			sink: Arc::new(TracingSink),
			host_ui: false,
			host_engine: false,
		}
	}

	#[must_use]
	pub fn config(mut self, config: DispatcherConfig) -> Self {
		self.config = config;
		self
	}

	/// Replaces the default [`TracingSink`].
	#[must_use]
	pub fn failure_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
		self.sink = sink;
		self
	}

	/// Leaves the UI queue undriven; the host takes its pump with
	/// [`Dispatcher::take_hosted_pump`] and runs it on the toolkit thread.
	#[must_use]
	pub fn host_ui(mut self) -> Self {
		self.host_ui = true;
		self
	}

	/// Leaves the engine queue undriven; see [`Self::host_ui`].
	#[must_use]
	pub fn host_engine(mut self) -> Self {
		self.host_engine = true;
		self
	}

	/// Starts every domain.
	pub fn build(self) -> std::io::Result<Dispatcher> {
		let Self {
			config,
			sink,
			host_ui,
			host_engine,
		} = self;
		let monitor = Arc::new(Monitor::new(sink));
		let prefix = &config.thread_prefix;

		let background = BackgroundPool::new(
			format!("{prefix}-bg"),
			config.background_threads,
			config.keep_alive,
			Arc::clone(&monitor),
		)?;

		let mut hosted = Vec::new();
		let (ui, ui_pump) = queue::channel(Domain::UiAffine, Arc::clone(&monitor));
		if host_ui {
			hosted.push(ui_pump);
		} else {
			ui_pump.spawn(format!("{prefix}-ui"))?;
		}

		let (engine, engine_pump) = queue::channel(Domain::EngineAffine, Arc::clone(&monitor));
		if host_engine {
			hosted.push(engine_pump);
		} else {
			engine_pump.spawn(format!("{prefix}-engine"))?;
		}

		let scheduler = Scheduler::start(format!("{prefix}-timer"), Arc::clone(&monitor))?;

		tracing::debug!(
			background_threads = config.background_threads,
			host_ui,
			host_engine,
			"dispatcher.started"
		);

		Ok(Dispatcher {
			inner: Arc::new(DispatcherInner {
				background,
				ui,
				engine,
				scheduler,
				hosted: Mutex::new(hosted),
				monitor,
			}),
		})
	}
}

struct DispatcherInner {
	background: BackgroundPool,
	ui: TaskQueue,
	engine: TaskQueue,
	scheduler: Scheduler,
	hosted: Mutex<Vec<TaskPump>>,
	monitor: Arc<Monitor>,
}

/// Process-wide task dispatcher over the four execution [`Domain`]s.
///
/// Cheap to clone; all clones share the same domains. The domains stay alive until
/// the last clone is dropped, which may happen on any thread, including one of the
/// dispatcher's own.
#[derive(Clone)]
pub struct Dispatcher {
	inner: Arc<DispatcherInner>,
}

impl Dispatcher {
	/// Starts a dispatcher with default configuration and a [`TracingSink`].
	pub fn new() -> std::io::Result<Self> {
		DispatcherBuilder::new().build()
	}

	pub fn builder() -> DispatcherBuilder {
		DispatcherBuilder::new()
	}

	/// Enqueues `task` on `domain`.
	///
	/// Serialized domains run it strictly after everything previously submitted to
	/// the same domain. [`Domain::Scheduled`] treats this as a zero delay schedule.
	pub fn submit<F>(&self, domain: Domain, task: F)
	where
		F: FnOnce() + Send + 'static,
	{
		self.dispatch(domain, job(task));
	}

	/// Like [`Self::submit`], but an `Err` return is reported as a task failure.
	pub fn submit_fallible<F, E>(&self, domain: Domain, task: F)
	where
		F: FnOnce() -> Result<(), E> + Send + 'static,
		E: Display,
	{
		self.dispatch(domain, Box::new(move || task().map_err(|err| err.to_string())));
	}

	/// Runs `task` on [`Domain::Scheduled`] once `delay` has elapsed.
	pub fn schedule<F>(&self, task: F, delay: Duration)
	where
		F: FnOnce() + Send + 'static,
	{
		self.inner.scheduler.schedule(ScheduleCmd::Once { delay, job: job(task) });
	}

	/// Runs `task` on [`Domain::Scheduled`] after `delay`, then every `period`.
	///
	/// Runs are anchored on the initial deadline: a run that starts late is followed
	/// by back-to-back catch-up runs. The schedule survives a panicking run.
	///
	/// # Panics
	///
	/// Panics if `period` is zero.
	pub fn schedule_at_fixed_rate<F>(&self, task: F, delay: Duration, period: Duration)
	where
		F: FnMut() + Send + 'static,
	{
		assert!(!period.is_zero(), "fixed-rate period must be > 0");
		self.inner.scheduler.schedule(ScheduleCmd::FixedRate {
			delay,
			period,
			task: Box::new(task),
		});
	}

	/// Hands out the pump of a domain configured as hosted, once.
	pub fn take_hosted_pump(&self, domain: Domain) -> Option<TaskPump> {
		let mut hosted = self.inner.hosted.lock();
		let index = hosted.iter().position(|pump| pump.domain() == domain)?;
		Some(hosted.swap_remove(index))
	}

	/// Per-domain counters, in [`Domain::ALL`] order.
	pub fn stats(&self) -> Vec<DomainStats> {
		self.inner.monitor.snapshots()
	}

	fn dispatch(&self, domain: Domain, job: Job) {
		match domain {
			Domain::Background => self.inner.background.spawn(job),
			Domain::UiAffine => self.inner.ui.push(job),
			Domain::EngineAffine => self.inner.engine.push(job),
			Domain::Scheduled => self.inner.scheduler.schedule(ScheduleCmd::Once {
				delay: Duration::ZERO,
				job,
			}),
		}
	}
}

impl std::fmt::Debug for Dispatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Dispatcher").field("stats", &self.stats()).finish()
	}
}
