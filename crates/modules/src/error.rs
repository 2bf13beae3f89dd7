//! Error types for module scanning and class resolution.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or querying a module generation.
#[derive(Debug, Error)]
pub enum ModuleError {
	/// A root or manifest could not be read.
	#[error("I/O error reading {path}: {error}")]
	Io {
		path: PathBuf,
		error: std::io::Error,
	},

	/// Directory traversal of a root failed.
	#[error("failed to walk {root}: {error}")]
	Walk {
		root: PathBuf,
		error: ignore::Error,
	},

	/// A module manifest is not valid TOML or misses required fields.
	#[error("invalid module manifest {path}: {error}")]
	Manifest {
		path: PathBuf,
		error: toml::de::Error,
	},

	/// An exclusion pattern is not a valid glob.
	#[error("invalid exclusion pattern {pattern:?}: {error}")]
	Pattern {
		pattern: String,
		error: globset::Error,
	},

	/// `scan()` was called on a scanner that already ran.
	#[error("scanner already ran")]
	AlreadyScanned,

	/// No loader in the chain defines the class.
	#[error("unknown class: {0}")]
	UnknownClass(String),

	/// The class is defined but no factory for it is linked into the binary.
	#[error("no factory linked for class {0}")]
	NoFactory(String),

	/// The loader was replaced by a reload and accepts no new instantiations.
	#[error("loader generation {0} is detached")]
	Detached(u64),
}

pub type Result<T> = std::result::Result<T, ModuleError>;
