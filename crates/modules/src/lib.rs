//! Hot-swappable module registry.
//!
//! Modules are trees of resources whose `module.toml` manifests declare classes and
//! the interfaces they implement. The registry partitions installed modules by
//! [`Scope`]; each scope can be rebuilt from new roots at runtime while other
//! subsystems keep querying it. See [`ModuleRegistry`] for the swap guarantees.
//!
//! Code is never loaded from disk. A class found by a scan is instantiated through a
//! [`ClassFactory`] linked into the binary with [`register_class!`]; replacing a
//! scope detaches its old [`ModuleLoader`], which then refuses new instantiations.

mod class;
mod error;
pub mod events;
mod filter;
mod loader;
mod manifest;
mod plugins;
mod registry;
mod scanner;
mod scope;

#[doc(hidden)]
pub use inventory;

pub use class::{ClassFactory, ClassInfo, Instance};
pub use error::{ModuleError, Result};
pub use filter::{DEFAULT_EXCLUDES, ScanFilter};
pub use loader::ModuleLoader;
pub use manifest::{ClassEntry, ModuleManifest, is_manifest_name};
pub use plugins::{Plugin, PluginHost, PluginSet};
pub use registry::{AssetSink, ModuleRegistry, ModuleRegistryBuilder, ReloadOutcome, ScopeGeneration};
pub use scanner::ModuleScanner;
pub use scope::{Scope, ScopeSet};
