use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use atelier_events::Handler;
use atelier_modules::{Scope, ScopeSet};
use atelier_runtime::{ModulesConfig, Runtime, RuntimeConfig, lifecycle};
use atelier_worker::Domain;
use pretty_assertions::assert_eq;

const WAIT: Duration = Duration::from_secs(5);
const PLUGIN: &str = "atelier.editor.Plugin";

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
	let deadline = Instant::now() + WAIT;
	while Instant::now() < deadline {
		if cond() {
			return true;
		}
		thread::sleep(Duration::from_millis(2));
	}
	cond()
}

fn module_dir(parent: &Path, name: &str, classes: &[&str]) -> PathBuf {
	let dir = parent.join(name);
	fs::create_dir_all(&dir).expect("create module dir");
	let mut manifest = format!("name = \"{name}\"\n");
	for class in classes {
		manifest.push_str(&format!("\n[[class]]\nname = \"{class}\"\nimplements = [\"{PLUGIN}\"]\n"));
	}
	fs::write(dir.join("module.toml"), manifest).expect("write manifest");
	dir
}

fn counter(runtime: &Runtime, event_type: &atelier_events::EventType) -> Arc<AtomicUsize> {
	let count = Arc::new(AtomicUsize::new(0));
	let seen = Arc::clone(&count);
	runtime.events().register(
		event_type,
		&Handler::new(move |_| {
			seen.fetch_add(1, Ordering::SeqCst);
		}),
	);
	count
}

fn class_names(runtime: &Runtime, scopes: impl Into<ScopeSet>) -> Vec<String> {
	runtime
		.modules()
		.find_implementations(PLUGIN, scopes)
		.iter()
		.map(|class| class.name.clone())
		.collect()
}

#[test]
fn editor_ready_fires_once_after_ui_engine_and_core() {
	let tmp = tempfile::tempdir().expect("create tempdir");
	let config = RuntimeConfig {
		modules: ModulesConfig {
			core: vec![module_dir(tmp.path(), "core", &["atelier.core.Impl"])],
			..ModulesConfig::default()
		},
		..RuntimeConfig::default()
	};
	let runtime = Runtime::start(config).expect("runtime starts");
	let ready = counter(&runtime, lifecycle::editor_ready());

	assert!(wait_until(|| runtime.modules().current(Scope::Core).generation() != 0));
	thread::sleep(Duration::from_millis(20));
	assert_eq!(ready.load(Ordering::SeqCst), 0);
	assert!(!runtime.editor_ready().is_complete());

	let events = runtime.events().clone();
	runtime.dispatcher().submit(Domain::UiAffine, {
		let events = events.clone();
		move || events.publish(lifecycle::ui_ready().clone())
	});
	runtime
		.dispatcher()
		.submit(Domain::EngineAffine, move || events.publish(lifecycle::engine_ready().clone()));

	assert!(wait_until(|| ready.load(Ordering::SeqCst) == 1));
	runtime.events().publish(lifecycle::ui_ready().clone());
	runtime.events().publish(lifecycle::engine_ready().clone());
	thread::sleep(Duration::from_millis(50));
	assert_eq!(ready.load(Ordering::SeqCst), 1);
	assert!(runtime.editor_ready().is_complete());
	assert_eq!(class_names(&runtime, ScopeSet::CORE_ONLY), vec!["atelier.core.Impl"]);
}

#[test]
fn core_without_roots_still_completes_startup() {
	let runtime = Runtime::start(RuntimeConfig::default()).expect("runtime starts");
	let ready = counter(&runtime, lifecycle::editor_ready());

	runtime.events().publish(lifecycle::ui_ready().clone());
	runtime.events().publish(lifecycle::engine_ready().clone());

	assert!(wait_until(|| ready.load(Ordering::SeqCst) == 1));
	assert!(class_names(&runtime, ScopeSet::ALL).is_empty());
}

#[test]
fn configured_scopes_and_plugins_load_in_dependency_order() {
	let tmp = tempfile::tempdir().expect("create tempdir");
	let plugins = tmp.path().join("plugins");
	module_dir(&plugins, "paint", &["paint.Plugin"]);
	let config = RuntimeConfig {
		modules: ModulesConfig {
			core: vec![module_dir(tmp.path(), "core", &["core.Impl"])],
			custom: vec![module_dir(tmp.path(), "custom", &["custom.Impl"])],
			local_libraries: vec![module_dir(tmp.path(), "libs", &["lib.Impl"])],
			local_classes: vec![module_dir(tmp.path(), "classes", &["user.Impl"])],
			plugins_dir: Some(plugins),
			..ModulesConfig::default()
		},
		..RuntimeConfig::default()
	};
	let runtime = Runtime::start(config).expect("runtime starts");

	// Registered after start; the preload event may already be gone, so poll the
	// registry instead.
	assert!(wait_until(|| class_names(&runtime, ScopeSet::ALL).len() == 5));
	assert_eq!(
		class_names(&runtime, ScopeSet::ALL),
		vec!["core.Impl", "custom.Impl", "paint.Plugin", "lib.Impl", "user.Impl"]
	);

	let libraries = runtime.modules().current(Scope::LocalLibraries);
	let classes = runtime.modules().current(Scope::LocalClasses);
	assert!(
		classes
			.loader()
			.parent()
			.is_some_and(|parent| parent.ptr_eq(libraries.loader()))
	);
}

#[test]
fn plugins_preloaded_is_announced() {
	let tmp = tempfile::tempdir().expect("create tempdir");
	let plugins = tmp.path().join("plugins");
	module_dir(&plugins, "sculpt", &["sculpt.Plugin"]);
	let runtime = Runtime::start(RuntimeConfig::default()).expect("runtime starts");
	let preloaded = counter(&runtime, lifecycle::plugins_preloaded());

	runtime
		.apply_module_roots(&ModulesConfig {
			plugins_dir: Some(plugins),
			..ModulesConfig::default()
		})
		.expect("valid module config");

	assert!(wait_until(|| preloaded.load(Ordering::SeqCst) == 1));
	assert_eq!(class_names(&runtime, Scope::Plugins), vec!["sculpt.Plugin"]);
}

#[test]
fn changed_roots_replace_installed_modules() {
	let tmp = tempfile::tempdir().expect("create tempdir");
	let first = module_dir(tmp.path(), "first", &["first.Impl"]);
	let second = module_dir(tmp.path(), "second", &["second.Impl"]);
	let runtime = Runtime::start(RuntimeConfig {
		modules: ModulesConfig {
			custom: vec![first],
			..ModulesConfig::default()
		},
		..RuntimeConfig::default()
	})
	.expect("runtime starts");
	assert!(wait_until(|| class_names(&runtime, Scope::Custom) == ["first.Impl"]));

	runtime
		.apply_module_roots(&ModulesConfig {
			custom: vec![second],
			..ModulesConfig::default()
		})
		.expect("valid module config");
	assert!(wait_until(|| class_names(&runtime, Scope::Custom) == ["second.Impl"]));

	runtime
		.apply_module_roots(&ModulesConfig::default())
		.expect("valid module config");
	assert!(wait_until(|| class_names(&runtime, Scope::Custom).is_empty()));
}

#[test]
fn invalid_exclusion_pattern_fails_startup() {
	let config = RuntimeConfig {
		modules: ModulesConfig {
			exclude: vec![String::from("[broken")],
			..ModulesConfig::default()
		},
		..RuntimeConfig::default()
	};
	assert!(matches!(
		Runtime::start(config),
		Err(atelier_runtime::RuntimeError::Modules(_))
	));
}
