use std::fmt;

use bitflags::bitflags;

/// Named partition of the module registry.
///
/// Each scope owns at most one installed generation at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
	/// Modules shipped with the editor.
	Core,
	/// Site-specific modules configured by an administrator.
	Custom,
	/// Plugins, one module tree per plugin.
	Plugins,
	/// User-supplied libraries.
	LocalLibraries,
	/// User-compiled classes, linked against the user libraries.
	LocalClasses,
}

impl Scope {
	/// Every scope, in query order.
	pub const ALL: [Scope; 5] = [
		Scope::Core,
		Scope::Custom,
		Scope::Plugins,
		Scope::LocalLibraries,
		Scope::LocalClasses,
	];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Core => "core",
			Self::Custom => "custom",
			Self::Plugins => "plugins",
			Self::LocalLibraries => "local_libraries",
			Self::LocalClasses => "local_classes",
		}
	}

	/// The scope whose installed loader parents this scope's loaders.
	pub const fn depends_on(self) -> Option<Scope> {
		match self {
			Self::LocalClasses => Some(Self::LocalLibraries),
			_ => None,
		}
	}

	pub(crate) const fn index(self) -> usize {
		self as usize
	}

	const fn flag(self) -> ScopeSet {
		match self {
			Self::Core => ScopeSet::CORE,
			Self::Custom => ScopeSet::CUSTOM,
			Self::Plugins => ScopeSet::PLUGINS,
			Self::LocalLibraries => ScopeSet::LOCAL_LIBRARIES,
			Self::LocalClasses => ScopeSet::LOCAL_CLASSES,
		}
	}
}

impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

bitflags! {
	/// Caller-chosen subset of [`Scope`]s for queries.
	#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct ScopeSet: u8 {
		const CORE = 1 << 0;
		const CUSTOM = 1 << 1;
		const PLUGINS = 1 << 2;
		const LOCAL_LIBRARIES = 1 << 3;
		const LOCAL_CLASSES = 1 << 4;

		const CORE_ONLY = Self::CORE.bits();
		const ALL = Self::CORE.bits()
			| Self::CUSTOM.bits()
			| Self::PLUGINS.bits()
			| Self::LOCAL_LIBRARIES.bits()
			| Self::LOCAL_CLASSES.bits();
	}
}

impl ScopeSet {
	/// Member scopes in [`Scope::ALL`] order.
	pub fn scopes(self) -> impl Iterator<Item = Scope> {
		Scope::ALL.into_iter().filter(move |scope| self.contains(scope.flag()))
	}
}

impl From<Scope> for ScopeSet {
	fn from(scope: Scope) -> Self {
		scope.flag()
	}
}

impl FromIterator<Scope> for ScopeSet {
	fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
		iter.into_iter().fold(Self::empty(), |set, scope| set | scope.flag())
	}
}
