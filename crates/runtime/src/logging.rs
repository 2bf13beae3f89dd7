use std::fs::OpenOptions;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::{ConfigError, LoggingConfig};

/// Environment variable overriding [`LoggingConfig::filter`].
pub const LOG_ENV: &str = "ATELIER_LOG";

/// Installs the global tracing subscriber.
///
/// Returns the log file path when logging to `log_dir`. Returns `Ok(None)` as well
/// when a subscriber was already installed; repeated calls are harmless.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<PathBuf>, ConfigError> {
	let filter = match EnvFilter::try_from_env(LOG_ENV) {
		Ok(filter) => filter,
		Err(_) => EnvFilter::try_new(&config.filter).map_err(|error| ConfigError::Filter {
			filter: config.filter.clone(),
			error,
		})?,
	};

	if let Some(log_dir) = &config.log_dir {
		std::fs::create_dir_all(log_dir).map_err(|error| ConfigError::Io {
			path: log_dir.clone(),
			error,
		})?;
		let log_path = log_dir.join(format!("atelier.{}.log", std::process::id()));
		let file = OpenOptions::new()
			.create(true)
			.append(true)
			.open(&log_path)
			.map_err(|error| ConfigError::Io {
				path: log_path.clone(),
				error,
			})?;

		let file_layer = tracing_subscriber::fmt::layer()
			.with_writer(file)
			.with_ansi(false)
			.with_thread_names(true)
			.with_target(true);

		let installed = tracing_subscriber::registry().with(filter).with(file_layer).try_init().is_ok();
		return Ok(announce(installed, Some(log_path)));
	}

	let stderr_layer = tracing_subscriber::fmt::layer()
		.with_writer(std::io::stderr)
		.with_thread_names(true);
	let installed = tracing_subscriber::registry().with(filter).with(stderr_layer).try_init().is_ok();
	Ok(announce(installed, None))
}

fn announce(installed: bool, log_path: Option<PathBuf>) -> Option<PathBuf> {
	if !installed {
		tracing::debug!("runtime.tracing_already_installed");
		return None;
	}
	tracing::info!(path = ?log_path, "runtime.tracing_initialized");
	log_path
}
