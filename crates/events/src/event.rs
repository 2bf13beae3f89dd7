use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::EventType;

/// One published occurrence of an [`EventType`].
pub struct Event {
	event_type: EventType,
	consumed: AtomicBool,
	payload: Option<Arc<dyn Any + Send + Sync>>,
}

impl Event {
	pub fn new(event_type: EventType) -> Self {
		Self {
			event_type,
			consumed: AtomicBool::new(false),
			payload: None,
		}
	}

	pub fn with_payload<T>(event_type: EventType, payload: T) -> Self
	where
		T: Any + Send + Sync,
	{
		Self {
			event_type,
			consumed: AtomicBool::new(false),
			payload: Some(Arc::new(payload)),
		}
	}

	pub fn event_type(&self) -> &EventType {
		&self.event_type
	}

	/// Payload downcast to `T`, if present and of that type.
	pub fn payload<T: Any>(&self) -> Option<&T> {
		self.payload.as_deref()?.downcast_ref::<T>()
	}

	/// Claims the event. Returns `true` for the first claimer only.
	pub fn consume(&self) -> bool {
		!self.consumed.swap(true, Ordering::AcqRel)
	}

	pub fn is_consumed(&self) -> bool {
		self.consumed.load(Ordering::Acquire)
	}
}

impl From<EventType> for Event {
	fn from(event_type: EventType) -> Self {
		Self::new(event_type)
	}
}

impl From<EventType> for Arc<Event> {
	fn from(event_type: EventType) -> Self {
		Arc::new(Event::new(event_type))
	}
}

impl fmt::Debug for Event {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Event")
			.field("type", &self.event_type.name())
			.field("consumed", &self.is_consumed())
			.field("has_payload", &self.payload.is_some())
			.finish()
	}
}
