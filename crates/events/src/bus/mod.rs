use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use atelier_worker::{Dispatcher, Domain};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::{Event, EventType, Handler};

#[cfg(test)]
mod tests;

/// Tuning for an [`EventBus`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBusConfig {
	/// Pause between delivery rounds of an unconsumed consumable event.
	///
	/// Zero redelivers immediately. This only spaces rounds out; there is no limit on
	/// how many rounds an unconsumed event gets.
	pub redelivery_delay: Duration,
}

struct BusInner {
	dispatcher: Dispatcher,
	handlers: RwLock<FxHashMap<EventType, Arc<[Handler]>>>,
	config: EventBusConfig,
}

/// Registry of event type to handler lists, dispatching on [`Domain::Background`].
///
/// Cheap to clone; clones share the same handler table. Handler lists are
/// copy-on-write, so publishing only holds the read lock long enough to snapshot them.
#[derive(Clone)]
pub struct EventBus {
	inner: Arc<BusInner>,
}

/// Non-owning handle to an [`EventBus`].
#[derive(Clone)]
pub struct WeakEventBus {
	inner: Weak<BusInner>,
}

impl WeakEventBus {
	pub fn upgrade(&self) -> Option<EventBus> {
		self.inner.upgrade().map(|inner| EventBus { inner })
	}
}

impl EventBus {
	pub fn new(dispatcher: Dispatcher) -> Self {
		Self::with_config(dispatcher, EventBusConfig::default())
	}

	pub fn with_config(dispatcher: Dispatcher, config: EventBusConfig) -> Self {
		Self {
			inner: Arc::new(BusInner {
				dispatcher,
				handlers: RwLock::new(FxHashMap::default()),
				config,
			}),
		}
	}

	pub fn dispatcher(&self) -> &Dispatcher {
		&self.inner.dispatcher
	}

	pub fn downgrade(&self) -> WeakEventBus {
		WeakEventBus {
			inner: Arc::downgrade(&self.inner),
		}
	}

	/// Adds `handler` for exact matches of `event_type` (and, through the hierarchy,
	/// all of its sub-types). Returns `false` if it was already registered there.
	pub fn register(&self, event_type: &EventType, handler: &Handler) -> bool {
		let mut handlers = self.inner.handlers.write();
		let list = handlers.entry(event_type.clone()).or_insert_with(|| Arc::from(Vec::new()));
		if list.contains(handler) {
			return false;
		}
		let mut next = list.to_vec();
		next.push(handler.clone());
		*list = Arc::from(next);
		tracing::trace!(event_type = %event_type, handlers = list.len(), "events.register");
		true
	}

	/// Removes `handler` from `event_type`. Returns `false` if it was not registered.
	pub fn unregister(&self, event_type: &EventType, handler: &Handler) -> bool {
		let mut handlers = self.inner.handlers.write();
		let Some(list) = handlers.get_mut(event_type) else {
			return false;
		};
		let Some(index) = list.iter().position(|h| h == handler) else {
			return false;
		};
		if list.len() == 1 {
			handlers.remove(event_type);
		} else {
			let mut next = list.to_vec();
			next.remove(index);
			*list = Arc::from(next);
		}
		tracing::trace!(event_type = %event_type, "events.unregister");
		true
	}

	/// Number of handlers registered on exactly `event_type`.
	pub fn handler_count(&self, event_type: &EventType) -> usize {
		self.inner.handlers.read().get(event_type).map_or(0, |list| list.len())
	}

	/// Delivers `event` asynchronously to the handlers of its type and every ancestor.
	///
	/// Handlers are looked up when the delivery task runs, not at the call. Each
	/// handler invocation is its own background task.
	pub fn publish(&self, event: impl Into<Arc<Event>>) {
		let event = event.into();
		let bus = self.clone();
		self.inner.dispatcher.submit(Domain::Background, move || bus.deliver(event));
	}

	fn matching_handlers(&self, event_type: &EventType) -> Vec<Handler> {
		let handlers = self.inner.handlers.read();
		event_type
			.lineage()
			.filter_map(|ty| handlers.get(ty))
			.flat_map(|list| list.iter().cloned())
			.collect()
	}

	fn deliver(&self, event: Arc<Event>) {
		let handlers = self.matching_handlers(event.event_type());
		tracing::trace!(event_type = %event.event_type(), handlers = handlers.len(), "events.deliver");

		if !event.event_type().is_consumable() {
			for handler in handlers {
				let event = Arc::clone(&event);
				self.inner.dispatcher.submit(Domain::Background, move || handler.call(&event));
			}
			return;
		}

		let round = Arc::new(DeliveryRound {
			remaining: AtomicUsize::new(handlers.len()),
			bus: self.clone(),
			event: Arc::clone(&event),
		});
		if handlers.is_empty() {
			round.finish();
			return;
		}
		for handler in handlers {
			let guard = RoundGuard(Arc::clone(&round));
			let event = Arc::clone(&event);
			self.inner.dispatcher.submit(Domain::Background, move || {
				let _guard = guard;
				handler.call(&event);
			});
		}
	}

	fn redeliver(&self, event: Arc<Event>) {
		tracing::trace!(event_type = %event.event_type(), "events.redeliver");
		let delay = self.inner.config.redelivery_delay;
		if delay.is_zero() {
			self.publish(event);
		} else {
			let bus = self.clone();
			self.inner.dispatcher.schedule(move || bus.publish(event), delay);
		}
	}
}

impl std::fmt::Debug for EventBus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EventBus")
			.field("types", &self.inner.handlers.read().len())
			.field("config", &self.inner.config)
			.finish()
	}
}

/// One delivery of a consumable event to its current handlers.
struct DeliveryRound {
	remaining: AtomicUsize,
	bus: EventBus,
	event: Arc<Event>,
}

impl DeliveryRound {
	fn finish(&self) {
		if !self.event.is_consumed() {
			self.bus.redeliver(Arc::clone(&self.event));
		}
	}
}

/// Counts a handler invocation as finished when dropped, including on unwind or
/// when the task is discarded unrun.
struct RoundGuard(Arc<DeliveryRound>);

impl Drop for RoundGuard {
	fn drop(&mut self) {
		if self.0.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
			self.0.finish();
		}
	}
}
