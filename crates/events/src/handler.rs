use std::fmt;
use std::sync::{Arc, Weak};

use crate::Event;

type HandlerFn = dyn Fn(&Arc<Event>) + Send + Sync + 'static;

/// Registered event callback.
///
/// Identity is the underlying allocation: clones compare equal, two handlers built
/// from identical closures do not. Keep a clone to unregister later.
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

/// Non-owning reference to a [`Handler`].
#[derive(Clone)]
pub(crate) struct WeakHandler(Weak<HandlerFn>);

impl Handler {
	pub fn new<F>(f: F) -> Self
	where
		F: Fn(&Arc<Event>) + Send + Sync + 'static,
	{
		Self(Arc::new(f))
	}

	pub(crate) fn call(&self, event: &Arc<Event>) {
		(self.0)(event);
	}

	pub(crate) fn downgrade(&self) -> WeakHandler {
		WeakHandler(Arc::downgrade(&self.0))
	}

	fn addr(&self) -> *const () {
		Arc::as_ptr(&self.0) as *const ()
	}
}

impl WeakHandler {
	pub(crate) fn upgrade(&self) -> Option<Handler> {
		self.0.upgrade().map(Handler)
	}
}

impl PartialEq for Handler {
	fn eq(&self, other: &Self) -> bool {
		self.addr() == other.addr()
	}
}

impl Eq for Handler {}

impl fmt::Debug for Handler {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Handler({:p})", self.addr())
	}
}
