use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;

use crate::class::{ClassFactory, ClassInfo, Instance};
use crate::{ModuleError, Result};

struct LoaderInner {
	generation: u64,
	roots: Vec<PathBuf>,
	parent: Option<ModuleLoader>,
	classes: FxHashMap<String, Arc<ClassInfo>>,
	detached: AtomicBool,
}

/// Resolves class names for one installed generation of module roots.
///
/// Resolution is parent-first: a class defined by the parent chain shadows a class
/// of the same name defined here. Cheap to clone.
#[derive(Clone)]
pub struct ModuleLoader {
	inner: Arc<LoaderInner>,
}

impl ModuleLoader {
	pub(crate) fn new<I>(generation: u64, roots: Vec<PathBuf>, parent: Option<ModuleLoader>, classes: I) -> Self
	where
		I: IntoIterator<Item = Arc<ClassInfo>>,
	{
		let mut defined: FxHashMap<String, Arc<ClassInfo>> = FxHashMap::default();
		for class in classes {
			if let Some(existing) = defined.get(&class.name) {
				tracing::debug!(
					class = %class.name,
					kept = %existing.manifest,
					ignored = %class.manifest,
					"modules.duplicate_class"
				);
				continue;
			}
			defined.insert(class.name.clone(), class);
		}
		Self {
			inner: Arc::new(LoaderInner {
				generation,
				roots,
				parent,
				classes: defined,
				detached: AtomicBool::new(false),
			}),
		}
	}

	/// Loader with no roots and no classes; every lookup misses.
	pub fn empty() -> Self {
		Self::new(0, Vec::new(), None, std::iter::empty())
	}

	/// Install sequence number; `0` for the empty loader.
	pub fn generation(&self) -> u64 {
		self.inner.generation
	}

	pub fn roots(&self) -> &[PathBuf] {
		&self.inner.roots
	}

	pub fn parent(&self) -> Option<&ModuleLoader> {
		self.inner.parent.as_ref()
	}

	/// Roots of this loader and every ancestor.
	pub fn chain_roots(&self) -> Vec<PathBuf> {
		let mut roots = Vec::new();
		let mut loader = Some(self);
		while let Some(current) = loader {
			roots.extend(current.roots().iter().cloned());
			loader = current.parent();
		}
		roots
	}

	pub fn defines(&self, class: &str) -> bool {
		self.inner.classes.contains_key(class)
	}

	pub fn load_class(&self, class: &str) -> Option<Arc<ClassInfo>> {
		self.parent()
			.and_then(|parent| parent.load_class(class))
			.or_else(|| self.inner.classes.get(class).cloned())
	}

	/// Creates an instance of `class` through its linked [`ClassFactory`].
	pub fn instantiate(&self, class: &str) -> Result<Instance> {
		if self.is_detached() {
			return Err(ModuleError::Detached(self.generation()));
		}
		let info = self.load_class(class).ok_or_else(|| ModuleError::UnknownClass(class.to_owned()))?;
		let factory = ClassFactory::find(&info.name).ok_or_else(|| ModuleError::NoFactory(info.name.clone()))?;
		Ok((factory.create)())
	}

	pub fn is_detached(&self) -> bool {
		self.inner.detached.load(Ordering::Acquire)
	}

	/// Marks the loader unreachable for new instantiations. Returns `false` if it
	/// already was.
	pub(crate) fn detach(&self) -> bool {
		!self.inner.detached.swap(true, Ordering::AcqRel)
	}

	pub fn ptr_eq(&self, other: &ModuleLoader) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl std::fmt::Debug for ModuleLoader {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ModuleLoader")
			.field("generation", &self.generation())
			.field("roots", &self.roots())
			.field("classes", &self.inner.classes.len())
			.field("detached", &self.is_detached())
			.finish()
	}
}
