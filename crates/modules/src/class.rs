//! Class descriptions and the statically linked factories that instantiate them.

use std::any::Any;
use std::sync::LazyLock;

use rustc_hash::FxHashMap;

/// Boxed instance produced by a [`ClassFactory`].
pub type Instance = Box<dyn Any + Send + Sync>;

/// A class defined by a module manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
	pub name: String,
	pub implements: Vec<String>,
	/// `name` of the defining manifest.
	pub module: String,
	/// Root-relative resource name of the defining manifest.
	pub manifest: String,
}

impl ClassInfo {
	pub fn implements(&self, interface: &str) -> bool {
		self.implements.iter().any(|name| name == interface)
	}
}

/// Links a class name to the code that constructs it.
///
/// Modules only describe classes; the code lives in the binary and is registered with
/// [`register_class!`](crate::register_class). A loader can instantiate a class only
/// if it defines it and a factory with the same name is linked in.
pub struct ClassFactory {
	pub class: &'static str,
	pub create: fn() -> Instance,
}

inventory::collect!(ClassFactory);

impl ClassFactory {
	pub const fn new(class: &'static str, create: fn() -> Instance) -> Self {
		Self { class, create }
	}

	pub fn find(class: &str) -> Option<&'static ClassFactory> {
		FACTORY_INDEX.get(class).copied()
	}
}

impl std::fmt::Debug for ClassFactory {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClassFactory").field("class", &self.class).finish_non_exhaustive()
	}
}

static FACTORY_INDEX: LazyLock<FxHashMap<&'static str, &'static ClassFactory>> = LazyLock::new(|| {
	let mut map = FxHashMap::default();
	for factory in inventory::iter::<ClassFactory> {
		if map.insert(factory.class, factory).is_some() {
			tracing::warn!(class = factory.class, "modules.duplicate_factory");
		}
	}
	map
});

/// Registers a [`ClassFactory`] for `$class` via `inventory`.
///
/// ```ignore
/// fn new_terrain_editor() -> atelier_modules::Instance {
///     Box::new(TerrainEditor::default())
/// }
/// atelier_modules::register_class!("atelier.tools.TerrainEditor", new_terrain_editor);
/// ```
#[macro_export]
macro_rules! register_class {
	($class:expr, $create:expr $(,)?) => {
		$crate::inventory::submit! {
			$crate::ClassFactory::new($class, $create)
		}
	};
}
