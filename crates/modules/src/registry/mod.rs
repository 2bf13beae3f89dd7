//! Scope-partitioned, hot-swappable module registry.
//!
//! Every [`Scope`] holds its installed [`ScopeGeneration`] (loader and scanner built
//! from the same roots) behind an [`ArcSwap`]. Queries load the current generation
//! without locking, so they observe either the old or the new pair, never a mixture.
//! Reloads build the next generation off to the side and install it with a single
//! compare-and-swap; a reload that loses the race is discarded.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use atelier_events::{Event, EventBus};
use atelier_worker::{Dispatcher, Domain};
use parking_lot::{Mutex, RwLock};

use crate::class::ClassInfo;
use crate::events::{ScopeReloaded, scope_reloaded};
use crate::{ModuleLoader, ModuleScanner, PluginHost, PluginSet, Result, ScanFilter, Scope, ScopeSet};


/// External consumer of loader resources, driven on [`Domain::EngineAffine`].
pub trait AssetSink: Send + Sync + 'static {
	fn attach(&self, loader: &ModuleLoader);
	fn detach(&self, loader: &ModuleLoader);
}

/// A loader and the scanner built from the same roots.
#[derive(Debug)]
pub struct ScopeGeneration {
	scope: Scope,
	loader: ModuleLoader,
	scanner: Arc<ModuleScanner>,
}

impl ScopeGeneration {
	/// Generation `0`: no roots, empty answers.
	pub fn empty(scope: Scope) -> Self {
		Self {
			scope,
			loader: ModuleLoader::empty(),
			scanner: Arc::new(ModuleScanner::empty()),
		}
	}

	/// Scans `roots` and defines their classes in a loader parented on `parent`.
	///
	/// Roots already owned by the parent chain are excluded.
	pub(crate) fn build(
		scope: Scope,
		generation: u64,
		roots: Vec<PathBuf>,
		parent: Option<ModuleLoader>,
		filter: &ScanFilter,
	) -> Result<Self> {
		let filter = match &parent {
			Some(parent) => filter.clone().exclude_roots(parent.chain_roots()),
			None => filter.clone(),
		};
		let mut scanner = ModuleScanner::new(roots.clone(), filter);
		scanner.scan()?;
		let loader = ModuleLoader::new(generation, roots, parent, scanner.classes().iter().cloned());
		Ok(Self {
			scope,
			loader,
			scanner: Arc::new(scanner),
		})
	}

	pub fn scope(&self) -> Scope {
		self.scope
	}

	pub fn generation(&self) -> u64 {
		self.loader.generation()
	}

	pub fn loader(&self) -> &ModuleLoader {
		&self.loader
	}

	pub fn scanner(&self) -> &Arc<ModuleScanner> {
		&self.scanner
	}
}

/// Result of a completed reload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
	/// The new generation is installed and visible to queries.
	Installed { generation: u64 },
	/// Another reload of the scope installed first; this generation was discarded.
	Superseded { generation: u64 },
}

struct ScopeSlot {
	current: ArcSwap<ScopeGeneration>,
	/// Orders the swap with the asset hand-over, never held across a scan.
	install: Mutex<()>,
}

impl ScopeSlot {
	fn new(scope: Scope) -> Self {
		Self {
			current: ArcSwap::from_pointee(ScopeGeneration::empty(scope)),
			install: Mutex::new(()),
		}
	}
}

struct RegistryInner {
	dispatcher: Dispatcher,
	bus: Option<EventBus>,
	assets: Option<Arc<dyn AssetSink>>,
	filter: RwLock<ScanFilter>,
	slots: [ScopeSlot; 5],
	plugins: Mutex<Option<Arc<dyn PluginHost>>>,
	generations: AtomicU64,
}

/// Builder for a [`ModuleRegistry`].
pub struct ModuleRegistryBuilder {
	dispatcher: Dispatcher,
	bus: Option<EventBus>,
	assets: Option<Arc<dyn AssetSink>>,
	filter: ScanFilter,
}

impl ModuleRegistryBuilder {
	/// Publishes [`scope_reloaded`] events on `bus` after each install.
	#[must_use]
	pub fn event_bus(mut self, bus: EventBus) -> Self {
		self.bus = Some(bus);
		self
	}

	#[must_use]
	pub fn asset_sink(mut self, sink: Arc<dyn AssetSink>) -> Self {
		self.assets = Some(sink);
		self
	}

	#[must_use]
	pub fn filter(mut self, filter: ScanFilter) -> Self {
		self.filter = filter;
		self
	}

	pub fn build(self) -> ModuleRegistry {
		ModuleRegistry {
			inner: Arc::new(RegistryInner {
				dispatcher: self.dispatcher,
				bus: self.bus,
				assets: self.assets,
				filter: RwLock::new(self.filter),
				slots: Scope::ALL.map(ScopeSlot::new),
				plugins: Mutex::new(None),
				generations: AtomicU64::new(0),
			}),
		}
	}
}

/// Registry of the module generations installed per [`Scope`].
///
/// Cheap to clone. Reloading one scope never blocks queries on any scope.
#[derive(Clone)]
pub struct ModuleRegistry {
	inner: Arc<RegistryInner>,
}

impl ModuleRegistry {
	pub fn new(dispatcher: Dispatcher) -> Self {
		Self::builder(dispatcher).build()
	}

	pub fn builder(dispatcher: Dispatcher) -> ModuleRegistryBuilder {
		ModuleRegistryBuilder {
			dispatcher,
			bus: None,
			assets: None,
			filter: ScanFilter::default(),
		}
	}

	/// Replaces the exclusions used by subsequent reloads.
	pub fn set_filter(&self, filter: ScanFilter) {
		*self.inner.filter.write() = filter;
	}

	pub fn filter(&self) -> ScanFilter {
		self.inner.filter.read().clone()
	}

	/// Rebuilds `scope` from `roots` on [`Domain::Background`].
	///
	/// Failures are logged and leave the installed generation in place.
	///
	/// Dependent loaders keep the parent they were built with: after reloading
	/// [`Scope::Core`] or [`Scope::LocalLibraries`], reload [`Scope::Plugins`] or
	/// [`Scope::LocalClasses`] as well so they resolve against the new parent.
	pub fn reload(&self, scope: Scope, roots: Vec<PathBuf>) {
		let registry = self.clone();
		self.inner.dispatcher.submit(Domain::Background, move || {
			if let Err(error) = registry.reload_now(scope, roots) {
				tracing::warn!(scope = %scope, error = %error, "modules.reload_failed");
			}
		});
	}

	/// Rebuilds `scope` from `roots` on the calling thread.
	///
	/// On success the previous loader is detached, the asset sink (if any) is handed
	/// over on [`Domain::EngineAffine`] (detach old, then attach new), and a
	/// [`scope_reloaded`] event is published.
	pub fn reload_now(&self, scope: Scope, roots: Vec<PathBuf>) -> Result<ReloadOutcome> {
		let slot = self.slot(scope);
		let current = slot.current.load_full();
		let parent = scope.depends_on().map(|dep| self.slot(dep).current.load().loader().clone());
		let generation = self.next_generation();
		let filter = self.filter();

		let next = Arc::new(ScopeGeneration::build(scope, generation, roots, parent, &filter)?);

		{
			let _install = slot.install.lock();
			let prev = slot.current.compare_and_swap(&current, Arc::clone(&next));
			if !Arc::ptr_eq(&prev, &current) {
				tracing::debug!(scope = %scope, generation, "modules.reload_superseded");
				return Ok(ReloadOutcome::Superseded { generation });
			}
			current.loader().detach();
			self.hand_over_assets(vec![current.loader().clone()], vec![next.loader().clone()]);
		}

		tracing::info!(
			scope = %scope,
			generation,
			classes = next.scanner().classes().len(),
			resources = next.scanner().resources().len(),
			"modules.reloaded"
		);
		if let Some(bus) = &self.inner.bus {
			bus.publish(Event::with_payload(
				scope_reloaded(scope).clone(),
				ScopeReloaded { scope, generation },
			));
		}
		Ok(ReloadOutcome::Installed { generation })
	}

	/// Loads one plugin per subdirectory of `dir` and installs the set as the plugin
	/// host.
	pub fn reload_plugins_now(&self, dir: &Path) -> Result<Arc<PluginSet>> {
		let set = Arc::new(PluginSet::load(self, dir)?);
		tracing::info!(dir = %dir.display(), plugins = set.len(), "modules.plugins_loaded");
		self.set_plugin_host(Some(Arc::clone(&set) as Arc<dyn PluginHost>));
		Ok(set)
	}

	/// Replaces the host queried for [`Scope::Plugins`]. The previous host's loaders
	/// are detached.
	pub fn set_plugin_host(&self, host: Option<Arc<dyn PluginHost>>) {
		let mut plugins = self.inner.plugins.lock();
		let old = plugins.as_ref().map(|old| old.loaders()).unwrap_or_default();
		let new = host.as_ref().map(|host| host.loaders()).unwrap_or_default();
		for loader in &old {
			loader.detach();
		}
		self.hand_over_assets(old, new);
		*plugins = host;
	}

	/// The generation installed for `scope`.
	pub fn current(&self, scope: Scope) -> Arc<ScopeGeneration> {
		self.slot(scope).current.load_full()
	}

	/// Classes implementing `interface` across `scopes`, in scope order.
	///
	/// [`Scope::Plugins`] also queries every scanner of the plugin host. Duplicates
	/// across scopes are kept.
	pub fn find_implementations(&self, interface: &str, scopes: impl Into<ScopeSet>) -> Vec<Arc<ClassInfo>> {
		let mut found = Vec::new();
		self.for_each_scanner(scopes.into(), |scanner| found.extend(scanner.find_implementations(interface)));
		found
	}

	/// Resource names across `scopes`, in scope order.
	pub fn list_resources(&self, scopes: impl Into<ScopeSet>) -> Vec<String> {
		let mut found = Vec::new();
		self.for_each_scanner(scopes.into(), |scanner| found.extend(scanner.resources().iter().cloned()));
		found
	}

	pub fn dispatcher(&self) -> &Dispatcher {
		&self.inner.dispatcher
	}

	pub(crate) fn next_generation(&self) -> u64 {
		self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1
	}

	fn slot(&self, scope: Scope) -> &ScopeSlot {
		&self.inner.slots[scope.index()]
	}

	fn for_each_scanner(&self, scopes: ScopeSet, mut f: impl FnMut(&ModuleScanner)) {
		for scope in scopes.scopes() {
			f(self.slot(scope).current.load().scanner());
			if scope == Scope::Plugins {
				let host = self.inner.plugins.lock().clone();
				for scanner in host.map(|host| host.scanners()).unwrap_or_default() {
					f(&scanner);
				}
			}
		}
	}

	fn hand_over_assets(&self, old: Vec<ModuleLoader>, new: Vec<ModuleLoader>) {
		let Some(assets) = &self.inner.assets else {
			return;
		};
		let assets = Arc::clone(assets);
		self.inner.dispatcher.submit(Domain::EngineAffine, move || {
			for loader in old.iter().filter(|loader| loader.generation() != 0) {
				assets.detach(loader);
			}
			for loader in &new {
				assets.attach(loader);
			}
		});
	}
}

impl std::fmt::Debug for ModuleRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let generations: Vec<_> = Scope::ALL
			.into_iter()
			.map(|scope| (scope, self.slot(scope).current.load().generation()))
			.collect();
		f.debug_struct("ModuleRegistry").field("generations", &generations).finish()
	}
}
