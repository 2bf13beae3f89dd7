//! `module.toml` manifests describing the classes a module tree defines.

use std::path::Path;

use serde::Deserialize;

use crate::{ModuleError, Result};

const MANIFEST_NAME: &str = "module.toml";
const MANIFEST_SUFFIX: &str = ".module.toml";

/// Parsed module manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleManifest {
	pub name: String,
	#[serde(default, rename = "class")]
	pub classes: Vec<ClassEntry>,
}

/// One `[[class]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassEntry {
	pub name: String,
	#[serde(default)]
	pub implements: Vec<String>,
}

impl ModuleManifest {
	pub fn parse(path: &Path, text: &str) -> Result<Self> {
		toml::from_str(text).map_err(|error| ModuleError::Manifest {
			path: path.to_path_buf(),
			error,
		})
	}

	pub fn read(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path).map_err(|error| ModuleError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::parse(path, &text)
	}
}

/// Whether a file name denotes a module manifest.
pub fn is_manifest_name(file_name: &str) -> bool {
	file_name == MANIFEST_NAME || (file_name.ends_with(MANIFEST_SUFFIX) && file_name.len() > MANIFEST_SUFFIX.len())
}
