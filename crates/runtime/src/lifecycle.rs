//! Startup milestones announced on the event bus.
//!
//! The UI and engine hosts publish [`ui_ready`] and [`engine_ready`] from their own
//! domains once their contexts exist. The runtime publishes [`plugins_preloaded`]
//! after loading the plugins directory and [`editor_ready`] once the UI, the engine
//! and the core modules are all available.

use std::sync::LazyLock;

use atelier_events::{EventBus, EventType, JoinRegistration};
use atelier_modules::{Scope, events as module_events};

static LIFECYCLE: LazyLock<EventType> = LazyLock::new(|| EventType::root("lifecycle"));
static UI_READY: LazyLock<EventType> = LazyLock::new(|| EventType::child("lifecycle.ui_ready", &LIFECYCLE));
static ENGINE_READY: LazyLock<EventType> = LazyLock::new(|| EventType::child("lifecycle.engine_ready", &LIFECYCLE));
static PLUGINS_PRELOADED: LazyLock<EventType> =
	LazyLock::new(|| EventType::child("lifecycle.plugins_preloaded", &LIFECYCLE));
static EDITOR_READY: LazyLock<EventType> = LazyLock::new(|| EventType::child("lifecycle.editor_ready", &LIFECYCLE));

/// Parent of every lifecycle event.
pub fn lifecycle() -> &'static EventType {
	&LIFECYCLE
}

pub fn ui_ready() -> &'static EventType {
	&UI_READY
}

pub fn engine_ready() -> &'static EventType {
	&ENGINE_READY
}

pub fn plugins_preloaded() -> &'static EventType {
	&PLUGINS_PRELOADED
}

pub fn editor_ready() -> &'static EventType {
	&EDITOR_READY
}

/// Publishes [`editor_ready`] once UI, engine and core modules have all been
/// announced.
pub fn wire_editor_ready(bus: &EventBus) -> JoinRegistration {
	let announce = bus.downgrade();
	bus.on_all_of([
		(ui_ready().clone(), 1),
		(engine_ready().clone(), 1),
		(module_events::scope_reloaded(Scope::Core).clone(), 1),
	])
	.then(move || {
		if let Some(bus) = announce.upgrade() {
			tracing::info!("lifecycle.editor_ready");
			bus.publish(editor_ready().clone());
		}
	})
	.build()
}
