//! TOML runtime configuration.
//!
//! ```toml
//! [dispatcher]
//! background_threads = 64
//! keep_alive_ms = 10000
//! thread_prefix = "atelier"
//!
//! [events]
//! redelivery_delay_ms = 0
//!
//! [modules]
//! exclude = ["*.bak"]
//! core = ["/usr/share/atelier/modules"]
//! local_libraries = ["~/atelier/libs"]
//! plugins_dir = "~/atelier/plugins"
//!
//! [logging]
//! filter = "info,atelier_modules=debug"
//! log_dir = "/tmp/atelier-logs"
//! ```
//!
//! Every section and key is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use atelier_events::EventBusConfig;
use atelier_modules::{ModuleError, ScanFilter, Scope};
use atelier_worker::DispatcherConfig;
use serde::Deserialize;

use crate::ConfigError;

const CONFIG_DIR: &str = "atelier";
const CONFIG_FILE: &str = "runtime.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
	pub dispatcher: DispatcherSection,
	pub events: EventsSection,
	pub modules: ModulesConfig,
	pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherSection {
	pub background_threads: usize,
	pub keep_alive_ms: u64,
	pub thread_prefix: String,
}

impl Default for DispatcherSection {
	fn default() -> Self {
		let defaults = DispatcherConfig::default();
		Self {
			background_threads: defaults.background_threads,
			keep_alive_ms: u64::try_from(defaults.keep_alive.as_millis()).unwrap_or(u64::MAX),
			thread_prefix: defaults.thread_prefix,
		}
	}
}

impl DispatcherSection {
	pub fn to_config(&self) -> DispatcherConfig {
		DispatcherConfig {
			background_threads: self.background_threads.max(1),
			keep_alive: Duration::from_millis(self.keep_alive_ms),
			thread_prefix: self.thread_prefix.clone(),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsSection {
	pub redelivery_delay_ms: u64,
}

impl EventsSection {
	pub fn to_config(&self) -> EventBusConfig {
		EventBusConfig {
			redelivery_delay: Duration::from_millis(self.redelivery_delay_ms),
		}
	}
}

/// Module roots per scope, plus extra scan exclusions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModulesConfig {
	/// Patterns added to the default exclusions.
	pub exclude: Vec<String>,
	pub core: Vec<PathBuf>,
	pub custom: Vec<PathBuf>,
	pub local_libraries: Vec<PathBuf>,
	pub local_classes: Vec<PathBuf>,
	/// Directory holding one subdirectory per plugin.
	pub plugins_dir: Option<PathBuf>,
}

impl ModulesConfig {
	pub fn scan_filter(&self) -> Result<ScanFilter, ModuleError> {
		ScanFilter::with_defaults(self.exclude.iter().cloned())
	}

	/// Configured roots for `scope`. [`Scope::Plugins`] is configured through
	/// `plugins_dir` instead and has none.
	pub fn roots(&self, scope: Scope) -> &[PathBuf] {
		match scope {
			Scope::Core => &self.core,
			Scope::Custom => &self.custom,
			Scope::Plugins => &[],
			Scope::LocalLibraries => &self.local_libraries,
			Scope::LocalClasses => &self.local_classes,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
	/// `EnvFilter` directives, overridden by `ATELIER_LOG`.
	pub filter: String,
	/// Log to `atelier.<pid>.log` in this directory instead of stderr.
	pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			filter: String::from("info"),
			log_dir: None,
		}
	}
}

impl RuntimeConfig {
	/// `<config dir>/atelier/runtime.toml`, if the platform has a config dir.
	pub fn default_path() -> Option<PathBuf> {
		dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
	}

	pub fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
		toml::from_str(text).map_err(|error| ConfigError::Parse {
			path: path.to_path_buf(),
			error,
		})
	}

	/// Reads `path`; a missing file yields the defaults.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		match std::fs::read_to_string(path) {
			Ok(text) => Self::parse(path, &text),
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
				tracing::debug!(path = %path.display(), "config.missing_using_defaults");
				Ok(Self::default())
			}
			Err(error) => Err(ConfigError::Io {
				path: path.to_path_buf(),
				error,
			}),
		}
	}

	/// Loads [`Self::default_path`], or the defaults when there is none.
	pub fn load_default() -> Result<Self, ConfigError> {
		match Self::default_path() {
			Some(path) => Self::load(&path),
			None => Ok(Self::default()),
		}
	}
}
