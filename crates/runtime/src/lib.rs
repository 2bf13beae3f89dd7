//! Composition root for the editor core.
//!
//! A [`Runtime`] owns exactly one [`Dispatcher`], one [`EventBus`] and one
//! [`ModuleRegistry`], wired together and handed to every subsystem by reference.
//! Nothing here is a process global; the host constructs the runtime once at startup.

mod config;
mod error;
pub mod lifecycle;
mod logging;

use std::sync::Arc;

use atelier_events::{EventBus, JoinRegistration};
use atelier_modules::{AssetSink, ModuleRegistry, Scope};
use atelier_worker::{Dispatcher, DispatcherBuilder, Domain, FailureSink, TaskPump};

pub use config::{DispatcherSection, EventsSection, LoggingConfig, ModulesConfig, RuntimeConfig};
pub use error::{ConfigError, Result, RuntimeError};
pub use logging::{LOG_ENV, init_tracing};

/// Builder for a [`Runtime`].
pub struct RuntimeBuilder {
	config: RuntimeConfig,
	dispatcher: DispatcherBuilder,
	assets: Option<Arc<dyn AssetSink>>,
}

impl RuntimeBuilder {
	/// Routes task failures to `sink` instead of the log.
	#[must_use]
	pub fn failure_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
		self.dispatcher = self.dispatcher.failure_sink(sink);
		self
	}

	/// The host drives the UI queue; take it with [`Runtime::take_hosted_pump`].
	#[must_use]
	pub fn host_ui(mut self) -> Self {
		self.dispatcher = self.dispatcher.host_ui();
		self
	}

	/// The host drives the engine queue; take it with [`Runtime::take_hosted_pump`].
	#[must_use]
	pub fn host_engine(mut self) -> Self {
		self.dispatcher = self.dispatcher.host_engine();
		self
	}

	#[must_use]
	pub fn asset_sink(mut self, sink: Arc<dyn AssetSink>) -> Self {
		self.assets = Some(sink);
		self
	}

	/// Starts every domain, wires the startup join and begins loading the configured
	/// modules in the background.
	pub fn start(self) -> Result<Runtime> {
		let Self {
			config,
			dispatcher,
			assets,
		} = self;

		let dispatcher = dispatcher.config(config.dispatcher.to_config()).build()?;
		let events = EventBus::with_config(dispatcher.clone(), config.events.to_config());
		let mut modules = ModuleRegistry::builder(dispatcher.clone())
			.event_bus(events.clone())
			.filter(config.modules.scan_filter()?);
		if let Some(assets) = assets {
			modules = modules.asset_sink(assets);
		}
		let modules = modules.build();
		let editor_ready = lifecycle::wire_editor_ready(&events);

		let runtime = Runtime {
			dispatcher,
			events,
			modules,
			editor_ready,
		};
		runtime.apply_module_roots(&config.modules)?;
		tracing::info!("runtime.started");
		Ok(runtime)
	}
}

/// The editor core's dispatcher, event bus and module registry.
pub struct Runtime {
	dispatcher: Dispatcher,
	events: EventBus,
	modules: ModuleRegistry,
	editor_ready: JoinRegistration,
}

impl Runtime {
	pub fn builder(config: RuntimeConfig) -> RuntimeBuilder {
		RuntimeBuilder {
			config,
			dispatcher: Dispatcher::builder(),
			assets: None,
		}
	}

	pub fn start(config: RuntimeConfig) -> Result<Self> {
		Self::builder(config).start()
	}

	pub fn dispatcher(&self) -> &Dispatcher {
		&self.dispatcher
	}

	pub fn events(&self) -> &EventBus {
		&self.events
	}

	pub fn modules(&self) -> &ModuleRegistry {
		&self.modules
	}

	/// Join that publishes [`lifecycle::editor_ready`].
	pub fn editor_ready(&self) -> &JoinRegistration {
		&self.editor_ready
	}

	pub fn take_hosted_pump(&self, domain: Domain) -> Option<TaskPump> {
		self.dispatcher.take_hosted_pump(domain)
	}

	/// Reloads every scope from `config` on the background domain.
	///
	/// [`Scope::Core`] is always reloaded, with no roots if none are configured, so
	/// the startup join can complete. Other scopes are reloaded when configured or
	/// already populated. A configured `plugins_dir` is loaded once Core is installed,
	/// followed by [`lifecycle::plugins_preloaded`]. Fails only on invalid exclusion
	/// patterns; scan failures are logged and keep the installed modules.
	pub fn apply_module_roots(&self, config: &ModulesConfig) -> Result<()> {
		self.modules.set_filter(config.scan_filter()?);

		let custom = config.roots(Scope::Custom);
		if !custom.is_empty() || self.modules.current(Scope::Custom).generation() != 0 {
			self.modules.reload(Scope::Custom, custom.to_vec());
		}

		let modules = self.modules.clone();
		let events = self.events.clone();
		let config = config.clone();
		self.dispatcher.submit(Domain::Background, move || {
			load_dependent_scopes(&modules, &events, &config);
		});
		Ok(())
	}
}

/// Reloads scopes whose loaders are parented on another scope after that scope:
/// local classes after local libraries, plugins after core.
fn load_dependent_scopes(modules: &ModuleRegistry, events: &EventBus, config: &ModulesConfig) {
	for scope in [Scope::Core, Scope::LocalLibraries, Scope::LocalClasses] {
		let roots = config.roots(scope);
		let wanted = scope == Scope::Core || !roots.is_empty() || modules.current(scope).generation() != 0;
		if wanted && let Err(error) = modules.reload_now(scope, roots.to_vec()) {
			tracing::warn!(scope = %scope, error = %error, "modules.reload_failed");
		}
	}

	let Some(dir) = &config.plugins_dir else {
		return;
	};
	match modules.reload_plugins_now(dir) {
		Ok(_) => events.publish(lifecycle::plugins_preloaded().clone()),
		Err(error) => tracing::warn!(dir = %dir.display(), error = %error, "modules.plugins_failed"),
	}
}

impl std::fmt::Debug for Runtime {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Runtime")
			.field("dispatcher", &self.dispatcher)
			.field("events", &self.events)
			.field("modules", &self.modules)
			.finish_non_exhaustive()
	}
}
