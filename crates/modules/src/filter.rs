use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::{ModuleError, Result};

/// Name patterns excluded from every scan unless overridden.
pub const DEFAULT_EXCLUDES: &[&str] = &[
	// debug symbols
	"*.pdb",
	"*.dSYM",
	"*.debug",
	"*.dwp",
	// native artifacts
	"*.so",
	"*.so.*",
	"*.dylib",
	"*.dll",
	"*.a",
	"*.lib",
];

/// Exclusions applied while scanning module roots.
///
/// Patterns match single file or directory names; an excluded directory is not
/// descended into. Excluded roots are skipped entirely, whether given as a root or
/// reached while walking another one.
#[derive(Debug, Clone)]
pub struct ScanFilter {
	patterns: Vec<String>,
	globs: GlobSet,
	excluded_roots: Vec<PathBuf>,
}

impl ScanFilter {
	pub fn new<I, S>(patterns: I) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
		let mut builder = GlobSetBuilder::new();
		for pattern in &patterns {
			let glob = Glob::new(pattern).map_err(|error| ModuleError::Pattern {
				pattern: pattern.clone(),
				error,
			})?;
			builder.add(glob);
		}
		let globs = builder.build().map_err(|error| ModuleError::Pattern {
			pattern: patterns.join(","),
			error,
		})?;
		Ok(Self {
			patterns,
			globs,
			excluded_roots: Vec::new(),
		})
	}

	/// A filter that excludes nothing.
	pub fn none() -> Self {
		Self {
			patterns: Vec::new(),
			globs: GlobSet::empty(),
			excluded_roots: Vec::new(),
		}
	}

	/// [`DEFAULT_EXCLUDES`] followed by `extra`.
	pub fn with_defaults<I, S>(extra: I) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self::new(
			DEFAULT_EXCLUDES
				.iter()
				.map(|pattern| (*pattern).to_owned())
				.chain(extra.into_iter().map(Into::into)),
		)
	}

	#[must_use]
	pub fn exclude_root(mut self, root: impl Into<PathBuf>) -> Self {
		let root = root.into();
		if !self.excluded_roots.contains(&root) {
			self.excluded_roots.push(root);
		}
		self
	}

	#[must_use]
	pub fn exclude_roots<I>(self, roots: I) -> Self
	where
		I: IntoIterator,
		I::Item: Into<PathBuf>,
	{
		roots.into_iter().fold(self, |filter, root| filter.exclude_root(root))
	}

	pub fn patterns(&self) -> &[String] {
		&self.patterns
	}

	pub fn excluded_roots(&self) -> &[PathBuf] {
		&self.excluded_roots
	}

	pub fn excludes_name(&self, name: &str) -> bool {
		self.globs.is_match(name)
	}

	/// Whether `path` is an excluded root or lies inside one.
	pub fn excludes_root(&self, path: &Path) -> bool {
		self.excluded_roots.iter().any(|root| path.starts_with(root))
	}

	pub(crate) fn excludes(&self, path: &Path) -> bool {
		let by_name = path
			.file_name()
			.and_then(|name| name.to_str())
			.is_some_and(|name| self.excludes_name(name));
		by_name || self.excludes_root(path)
	}
}

impl Default for ScanFilter {
	fn default() -> Self {
		Self::with_defaults(std::iter::empty::<String>()).unwrap_or_else(|err| {
			tracing::error!(error = %err, "modules.default_filter_invalid");
			Self::none()
		})
	}
}
