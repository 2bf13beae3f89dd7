use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::registry::ScopeGeneration;
use crate::{ModuleError, ModuleLoader, ModuleRegistry, ModuleScanner, Result, Scope};

/// Source of per-plugin scanners for queries on [`Scope::Plugins`].
pub trait PluginHost: Send + Sync + 'static {
	/// One scanner per loaded plugin.
	fn scanners(&self) -> Vec<Arc<ModuleScanner>>;

	/// Loaders to detach from the asset sink when the host is replaced.
	fn loaders(&self) -> Vec<ModuleLoader> {
		Vec::new()
	}
}

/// A plugin loaded from its own directory.
#[derive(Debug)]
pub struct Plugin {
	name: String,
	generation: ScopeGeneration,
}

impl Plugin {
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn loader(&self) -> &ModuleLoader {
		self.generation.loader()
	}

	pub fn scanner(&self) -> &Arc<ModuleScanner> {
		self.generation.scanner()
	}
}

/// Plugin host with one plugin per subdirectory of a plugins directory.
///
/// Each plugin gets its own loader, parented on the [`Scope::Core`] loader installed
/// when the set was loaded.
#[derive(Debug, Default)]
pub struct PluginSet {
	plugins: Vec<Plugin>,
}

impl PluginSet {
	/// Scans every subdirectory of `dir`, in name order. Any failing plugin fails the
	/// whole set.
	pub fn load(registry: &ModuleRegistry, dir: &Path) -> Result<Self> {
		let io_error = |error: std::io::Error| ModuleError::Io {
			path: dir.to_path_buf(),
			error,
		};
		let mut dirs: Vec<PathBuf> = Vec::new();
		for entry in std::fs::read_dir(dir).map_err(io_error)? {
			let entry = entry.map_err(io_error)?;
			if entry.file_type().map_err(io_error)?.is_dir() {
				dirs.push(entry.path());
			}
		}
		dirs.sort();

		let core = registry.current(Scope::Core).loader().clone();
		let filter = registry.filter();
		let mut plugins = Vec::with_capacity(dirs.len());
		for path in dirs {
			if filter.excludes(&path) {
				continue;
			}
			let name = path
				.file_name()
				.map(|name| name.to_string_lossy().into_owned())
				.unwrap_or_default();
			let generation = ScopeGeneration::build(
				Scope::Plugins,
				registry.next_generation(),
				vec![path],
				Some(core.clone()),
				&filter,
			)?;
			tracing::debug!(plugin = %name, classes = generation.scanner().classes().len(), "modules.plugin_loaded");
			plugins.push(Plugin { name, generation });
		}
		Ok(Self { plugins })
	}

	pub fn plugins(&self) -> &[Plugin] {
		&self.plugins
	}

	pub fn get(&self, name: &str) -> Option<&Plugin> {
		self.plugins.iter().find(|plugin| plugin.name == name)
	}

	pub fn len(&self) -> usize {
		self.plugins.len()
	}

	pub fn is_empty(&self) -> bool {
		self.plugins.is_empty()
	}
}

impl PluginHost for PluginSet {
	fn scanners(&self) -> Vec<Arc<ModuleScanner>> {
		self.plugins.iter().map(|plugin| Arc::clone(plugin.scanner())).collect()
	}

	fn loaders(&self) -> Vec<ModuleLoader> {
		self.plugins.iter().map(|plugin| plugin.loader().clone()).collect()
	}
}
