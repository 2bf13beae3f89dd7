use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Handle, Runtime};

use crate::sink::Monitor;
use crate::{Domain, Job};

/// Elastic pool backing [`Domain::Background`].
///
/// Tasks run on the blocking pool of a private multi-threaded tokio runtime, which
/// grows on demand up to `max_threads` and retires idle threads after `keep_alive`.
pub(crate) struct BackgroundPool {
	runtime: Option<Runtime>,
	handle: Handle,
	monitor: Arc<Monitor>,
}

impl BackgroundPool {
	pub(crate) fn new(thread_name: String, max_threads: usize, keep_alive: Duration, monitor: Arc<Monitor>) -> std::io::Result<Self> {
		let runtime = tokio::runtime::Builder::new_multi_thread()
			.worker_threads(1)
			.max_blocking_threads(max_threads.max(1))
			.thread_keep_alive(keep_alive)
			.thread_name(thread_name)
			.enable_time()
			.build()?;
		let handle = runtime.handle().clone();
		Ok(Self {
			runtime: Some(runtime),
			handle,
			monitor,
		})
	}

	pub(crate) fn spawn(&self, job: Job) {
		self.monitor.submitted(Domain::Background);
		tracing::trace!(domain = Domain::Background.as_str(), "dispatcher.spawn_background");
		let monitor = Arc::clone(&self.monitor);
		drop(self.handle.spawn_blocking(move || monitor.run(Domain::Background, job)));
	}
}

impl Drop for BackgroundPool {
	fn drop(&mut self) {
		// The last dispatcher handle may be released by one of the pool's own tasks,
		// where a blocking shutdown would wait on itself.
		if let Some(runtime) = self.runtime.take() {
			runtime.shutdown_background();
		}
	}
}
