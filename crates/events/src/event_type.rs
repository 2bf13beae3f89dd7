use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Clone)]
struct EventTypeInner {
	name: Cow<'static, str>,
	parent: Option<EventType>,
	consumable: bool,
}

/// Node in the event type forest.
///
/// Identity is the name, so names must be unique process-wide; dotted names
/// (`modules.reloaded.core`) keep them that way. Cloning is cheap.
#[derive(Clone)]
pub struct EventType(Arc<EventTypeInner>);

impl EventType {
	/// Creates a type with no super-type.
	pub fn root(name: impl Into<Cow<'static, str>>) -> Self {
		Self(Arc::new(EventTypeInner {
			name: name.into(),
			parent: None,
			consumable: false,
		}))
	}

	/// Creates a sub-type of `parent`. Handlers on `parent` also receive its events.
	pub fn child(name: impl Into<Cow<'static, str>>, parent: &EventType) -> Self {
		Self(Arc::new(EventTypeInner {
			name: name.into(),
			parent: Some(parent.clone()),
			consumable: false,
		}))
	}

	/// Marks events of this type as redelivered until a handler consumes them.
	#[must_use]
	pub fn consumable(mut self) -> Self {
		Arc::make_mut(&mut self.0).consumable = true;
		self
	}

	pub fn name(&self) -> &str {
		&self.0.name
	}

	/// Direct super-type, if any.
	pub fn super_type(&self) -> Option<&EventType> {
		self.0.parent.as_ref()
	}

	pub fn is_consumable(&self) -> bool {
		self.0.consumable
	}

	/// This type followed by its ancestors, most specific first.
	pub fn lineage(&self) -> Lineage<'_> {
		Lineage { next: Some(self) }
	}

	/// Returns `true` if `other` is this type or one of its ancestors.
	pub fn is_a(&self, other: &EventType) -> bool {
		self.lineage().any(|ty| ty == other)
	}
}

impl PartialEq for EventType {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
	}
}

impl Eq for EventType {}

impl Hash for EventType {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.0.name.hash(state);
	}
}

impl fmt::Debug for EventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut list = f.debug_list();
		for ty in self.lineage() {
			list.entry(&ty.name());
		}
		list.finish()
	}
}

impl fmt::Display for EventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Iterator over an [`EventType`] and its ancestors.
pub struct Lineage<'a> {
	next: Option<&'a EventType>,
}

impl<'a> Iterator for Lineage<'a> {
	type Item = &'a EventType;

	fn next(&mut self) -> Option<Self::Item> {
		let current = self.next?;
		self.next = current.super_type();
		Some(current)
	}
}
