use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;

use crate::class::ClassInfo;
use crate::filter::ScanFilter;
use crate::manifest::{ModuleManifest, is_manifest_name};
use crate::{ModuleError, Result};

/// One-shot inventory of the resources and classes under a set of module roots.
///
/// A root is either a directory, walked recursively in file name order, or a single
/// file. Every file that survives the [`ScanFilter`] is a resource named by its
/// `/`-separated path relative to its root; module manifests among them define the
/// scanner's classes.
#[derive(Debug)]
pub struct ModuleScanner {
	roots: Vec<PathBuf>,
	filter: ScanFilter,
	scanned: bool,
	resources: Vec<String>,
	classes: Vec<Arc<ClassInfo>>,
}

impl ModuleScanner {
	pub fn new(roots: Vec<PathBuf>, filter: ScanFilter) -> Self {
		Self {
			roots,
			filter,
			scanned: false,
			resources: Vec::new(),
			classes: Vec::new(),
		}
	}

	/// Scanner with no roots that is already scanned; every query is empty.
	pub fn empty() -> Self {
		Self {
			scanned: true,
			..Self::new(Vec::new(), ScanFilter::none())
		}
	}

	/// Walks every root. On error nothing is recorded and the scanner stays
	/// unscanned.
	pub fn scan(&mut self) -> Result<()> {
		if self.scanned {
			return Err(ModuleError::AlreadyScanned);
		}
		let mut found = Found::default();
		for root in &self.roots {
			if self.filter.excludes(root) {
				tracing::debug!(root = %root.display(), "modules.root_excluded");
				continue;
			}
			scan_root(root, &self.filter, &mut found)?;
		}
		self.resources = found.resources;
		self.classes = found.classes;
		self.scanned = true;
		tracing::debug!(
			roots = self.roots.len(),
			resources = self.resources.len(),
			classes = self.classes.len(),
			"modules.scanned"
		);
		Ok(())
	}

	pub fn is_scanned(&self) -> bool {
		self.scanned
	}

	pub fn roots(&self) -> &[PathBuf] {
		&self.roots
	}

	pub fn resources(&self) -> &[String] {
		&self.resources
	}

	pub fn classes(&self) -> &[Arc<ClassInfo>] {
		&self.classes
	}

	/// Classes declaring `interface`, in scan order.
	pub fn find_implementations(&self, interface: &str) -> Vec<Arc<ClassInfo>> {
		self.classes.iter().filter(|class| class.implements(interface)).cloned().collect()
	}
}

#[derive(Default)]
struct Found {
	resources: Vec<String>,
	classes: Vec<Arc<ClassInfo>>,
}

impl Found {
	fn add(&mut self, path: &Path, name: String) -> Result<()> {
		let is_manifest = path
			.file_name()
			.and_then(|file| file.to_str())
			.is_some_and(is_manifest_name);
		if is_manifest {
			let manifest = ModuleManifest::read(path)?;
			self.classes.extend(manifest.classes.into_iter().map(|entry| {
				Arc::new(ClassInfo {
					name: entry.name,
					implements: entry.implements,
					module: manifest.name.clone(),
					manifest: name.clone(),
				})
			}));
		}
		self.resources.push(name);
		Ok(())
	}
}

fn scan_root(root: &Path, filter: &ScanFilter, found: &mut Found) -> Result<()> {
	let metadata = std::fs::metadata(root).map_err(|error| ModuleError::Io {
		path: root.to_path_buf(),
		error,
	})?;

	if metadata.is_file() {
		let name = root
			.file_name()
			.map(|file| file.to_string_lossy().into_owned())
			.unwrap_or_default();
		return found.add(root, name);
	}

	let entry_filter = filter.clone();
	let walk = WalkBuilder::new(root)
		.standard_filters(false)
		.follow_links(false)
		.sort_by_file_name(|a, b| a.cmp(b))
		.filter_entry(move |entry| entry.depth() == 0 || !entry_filter.excludes(entry.path()))
		.build();

	for entry in walk {
		let entry = entry.map_err(|error| ModuleError::Walk {
			root: root.to_path_buf(),
			error,
		})?;
		if !entry.file_type().is_some_and(|kind| kind.is_file()) {
			continue;
		}
		let Ok(relative) = entry.path().strip_prefix(root) else {
			continue;
		};
		found.add(entry.path(), resource_name(relative))?;
	}
	Ok(())
}

fn resource_name(relative: &Path) -> String {
	let mut name = String::new();
	for component in relative.components() {
		if let Component::Normal(part) = component {
			if !name.is_empty() {
				name.push('/');
			}
			name.push_str(&part.to_string_lossy());
		}
	}
	name
}
