//! Event types announcing installed module generations.

use std::sync::LazyLock;

use atelier_events::EventType;

use crate::Scope;

static RELOADED: LazyLock<EventType> = LazyLock::new(|| EventType::root("modules.reloaded"));

static SCOPE_RELOADED: LazyLock<[EventType; 5]> = LazyLock::new(|| {
	Scope::ALL.map(|scope| EventType::child(format!("modules.reloaded.{}", scope.as_str()), &RELOADED))
});

/// Parent type of every per-scope reload event.
pub fn reloaded() -> &'static EventType {
	&RELOADED
}

/// Published after a generation for `scope` is installed, carrying [`ScopeReloaded`].
pub fn scope_reloaded(scope: Scope) -> &'static EventType {
	&SCOPE_RELOADED[scope.index()]
}

/// Payload of [`scope_reloaded`] events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeReloaded {
	pub scope: Scope,
	pub generation: u64,
}
