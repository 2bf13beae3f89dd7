use std::fmt;

/// Logical thread a task is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
	/// Unordered work on an elastic pool of worker threads.
	Background,
	/// Serialized work that may touch UI toolkit state.
	UiAffine,
	/// Serialized work that may touch engine scene-graph state.
	EngineAffine,
	/// Serialized delayed and periodic work.
	Scheduled,
}

impl Domain {
	/// Every domain, in declaration order.
	pub const ALL: [Domain; 4] = [Self::Background, Self::UiAffine, Self::EngineAffine, Self::Scheduled];

	/// Stable label used as the `domain` tracing field.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Background => "background",
			Self::UiAffine => "ui",
			Self::EngineAffine => "engine",
			Self::Scheduled => "scheduled",
		}
	}

	/// Returns `true` when tasks on this domain never overlap and run in submission order.
	pub const fn is_serialized(self) -> bool {
		!matches!(self, Self::Background)
	}

	pub(crate) const fn index(self) -> usize {
		self as usize
	}
}

impl fmt::Display for Domain {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
