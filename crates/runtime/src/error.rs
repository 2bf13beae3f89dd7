use std::path::PathBuf;

use atelier_modules::ModuleError;
use thiserror::Error;

/// Errors loading the runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		path: PathBuf,
		error: std::io::Error,
	},

	/// The file is not valid TOML for [`RuntimeConfig`](crate::RuntimeConfig).
	#[error("invalid configuration {path}: {error}")]
	Parse {
		path: PathBuf,
		error: toml::de::Error,
	},

	/// The logging filter directive does not parse.
	#[error("invalid log filter {filter:?}: {error}")]
	Filter {
		filter: String,
		error: tracing_subscriber::filter::ParseError,
	},
}

/// Errors starting a [`Runtime`](crate::Runtime).
#[derive(Debug, Error)]
pub enum RuntimeError {
	#[error("failed to start dispatcher threads: {0}")]
	Spawn(#[from] std::io::Error),

	#[error(transparent)]
	Modules(#[from] ModuleError),

	#[error(transparent)]
	Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
