//! Asynchronous join barriers over the event bus.
//!
//! A join owns a multiset of still-awaited event types. Every delivery of a
//! subscribed type removes one matching entry; the delivery that empties the set runs
//! the join's action and unregisters the join from every type it subscribed to.
//! "Remove one, check empty, mark fired" happens under a single lock, so concurrent
//! deliveries can neither fire a join twice nor drive its counts below zero.

use std::sync::Arc;

use atelier_worker::Domain;
use parking_lot::Mutex;

use crate::handler::WeakHandler;
use crate::{Event, EventBus, EventType, Handler, WeakEventBus};


type EventAction = Box<dyn FnOnce(&Arc<Event>) + Send + 'static>;
type BarrierAction = Box<dyn FnOnce() + Send + 'static>;

enum JoinAction {
	/// Fan-in of closures run with the single triggering event.
	Single(Vec<EventAction>),
	/// One handler run once every requirement is met.
	AllOf(Option<BarrierAction>),
}

impl JoinAction {
	fn run(self, event: Option<&Arc<Event>>) {
		match self {
			Self::Single(actions) => {
				if let Some(event) = event {
					for action in actions {
						action(event);
					}
				}
			}
			Self::AllOf(handler) => {
				if let Some(handler) = handler {
					handler();
				}
			}
		}
	}
}

struct JoinState {
	pending: Vec<EventType>,
	action: Option<JoinAction>,
	fired: bool,
}

struct JoinCore {
	state: Mutex<JoinState>,
	registrations: Mutex<Vec<(EventType, WeakHandler)>>,
	bus: WeakEventBus,
}

impl JoinCore {
	fn deliver(&self, required: &EventType, event: &Arc<Event>) {
		let action = {
			let mut state = self.state.lock();
			if state.fired {
				return;
			}
			let Some(index) = state.pending.iter().position(|ty| ty == required) else {
				return;
			};
			state.pending.swap_remove(index);
			if !state.pending.is_empty() {
				return;
			}
			state.fired = true;
			state.action.take()
		};

		tracing::debug!(event_type = %event.event_type(), "events.join_fired");
		let _unregister = UnregisterOnDrop(self);
		if let Some(action) = action {
			action.run(Some(event));
		}
	}

	fn unregister_all(&self) {
		let registrations = std::mem::take(&mut *self.registrations.lock());
		let Some(bus) = self.bus.upgrade() else {
			return;
		};
		for (event_type, handler) in registrations {
			if let Some(handler) = handler.upgrade() {
				bus.unregister(&event_type, &handler);
			}
		}
	}
}

/// Unregisters the join even if its action panics.
struct UnregisterOnDrop<'a>(&'a JoinCore);

impl Drop for UnregisterOnDrop<'_> {
	fn drop(&mut self) {
		self.0.unregister_all();
	}
}

/// Handle to a built join.
///
/// Dropping the handle does not cancel the join; the bus keeps it alive until it
/// fires.
#[derive(Clone)]
pub struct JoinRegistration {
	core: Arc<JoinCore>,
}

impl JoinRegistration {
	/// Returns `true` once the join has fired (or was cancelled).
	pub fn is_complete(&self) -> bool {
		self.core.state.lock().fired
	}

	/// Number of event occurrences still awaited.
	pub fn pending(&self) -> usize {
		self.core.state.lock().pending.len()
	}

	/// Withdraws the join without running its action. Returns `false` if it had
	/// already fired.
	pub fn cancel(&self) -> bool {
		{
			let mut state = self.core.state.lock();
			if state.fired {
				return false;
			}
			state.fired = true;
			state.action = None;
		}
		self.core.unregister_all();
		true
	}
}

impl std::fmt::Debug for JoinRegistration {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.core.state.lock();
		f.debug_struct("JoinRegistration")
			.field("pending", &state.pending)
			.field("fired", &state.fired)
			.finish()
	}
}

fn install(bus: &EventBus, pending: Vec<EventType>, action: JoinAction) -> JoinRegistration {
	let mut distinct: Vec<EventType> = Vec::new();
	for ty in &pending {
		if !distinct.contains(ty) {
			distinct.push(ty.clone());
		}
	}

	let core = Arc::new(JoinCore {
		state: Mutex::new(JoinState {
			pending,
			action: Some(action),
			fired: false,
		}),
		registrations: Mutex::new(Vec::with_capacity(distinct.len())),
		bus: bus.downgrade(),
	});

	if distinct.is_empty() {
		// Nothing to wait for: fire right away, still off the caller's thread.
		let fire = Arc::clone(&core);
		bus.dispatcher().submit(Domain::Background, move || {
			let action = {
				let mut state = fire.state.lock();
				if state.fired {
					return;
				}
				state.fired = true;
				state.action.take()
			};
			if let Some(action) = action {
				action.run(None);
			}
		});
		return JoinRegistration { core };
	}

	let handlers: Vec<(EventType, Handler)> = distinct
		.into_iter()
		.map(|required| {
			let join = Arc::clone(&core);
			let ty = required.clone();
			(required, Handler::new(move |event| join.deliver(&ty, event)))
		})
		.collect();

	core.registrations
		.lock()
		.extend(handlers.iter().map(|(ty, handler)| (ty.clone(), handler.downgrade())));
	for (ty, handler) in &handlers {
		bus.register(ty, handler);
	}

	JoinRegistration { core }
}

/// Builder for a join that fans one event out to several closures.
pub struct SingleJoinBuilder {
	bus: EventBus,
	event_type: EventType,
	actions: Vec<EventAction>,
}

impl SingleJoinBuilder {
	/// Adds a closure to run when the event is first observed.
	#[must_use]
	pub fn then<F>(mut self, action: F) -> Self
	where
		F: FnOnce(&Arc<Event>) + Send + 'static,
	{
		self.actions.push(Box::new(action));
		self
	}

	/// Registers the join.
	pub fn build(self) -> JoinRegistration {
		install(&self.bus, vec![self.event_type], JoinAction::Single(self.actions))
	}
}

/// Builder for a barrier over several event occurrences.
pub struct AllOfJoinBuilder {
	bus: EventBus,
	requirements: Vec<EventType>,
	handler: Option<BarrierAction>,
}

impl AllOfJoinBuilder {
	/// Awaits `count` more occurrences of `event_type`.
	#[must_use]
	pub fn require(mut self, event_type: &EventType, count: usize) -> Self {
		self.requirements.extend(std::iter::repeat_n(event_type.clone(), count));
		self
	}

	/// Sets the handler run once every requirement is met. A later call replaces an
	/// earlier one.
	#[must_use]
	pub fn then<F>(mut self, handler: F) -> Self
	where
		F: FnOnce() + Send + 'static,
	{
		self.handler = Some(Box::new(handler));
		self
	}

	/// Registers the join. With no requirements it fires immediately.
	pub fn build(self) -> JoinRegistration {
		install(&self.bus, self.requirements, JoinAction::AllOf(self.handler))
	}
}

impl EventBus {
	/// Starts a join that runs its closures once, on the first `event_type` event.
	pub fn on_event(&self, event_type: &EventType) -> SingleJoinBuilder {
		SingleJoinBuilder {
			bus: self.clone(),
			event_type: event_type.clone(),
			actions: Vec::new(),
		}
	}

	/// Starts a barrier over `(event type, occurrence count)` requirements.
	///
	/// The same type may appear several times; counts add up. Requirements on a
	/// super-type are met by events of its sub-types.
	pub fn on_all_of<I>(&self, requirements: I) -> AllOfJoinBuilder
	where
		I: IntoIterator<Item = (EventType, usize)>,
	{
		let builder = AllOfJoinBuilder {
			bus: self.clone(),
			requirements: Vec::new(),
			handler: None,
		};
		requirements
			.into_iter()
			.fold(builder, |builder, (event_type, count)| builder.require(&event_type, count))
	}
}
