use std::sync::atomic::{AtomicU64, Ordering};

use crate::Domain;

/// Counter snapshot for one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainStats {
	pub domain: Domain,
	pub submitted: u64,
	pub completed: u64,
	pub failed: u64,
	/// Tasks discarded because the domain's consumer was gone.
	pub dropped: u64,
}

impl DomainStats {
	/// Tasks submitted but not yet finished.
	pub fn pending(&self) -> u64 {
		self.submitted
			.saturating_sub(self.completed)
			.saturating_sub(self.failed)
			.saturating_sub(self.dropped)
	}
}

#[derive(Debug, Default)]
pub(crate) struct DomainCounters {
	submitted: AtomicU64,
	completed: AtomicU64,
	failed: AtomicU64,
	dropped: AtomicU64,
}

impl DomainCounters {
	pub(crate) fn submitted(&self) {
		self.submitted.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn completed(&self) {
		self.completed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn failed(&self) {
		self.failed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn dropped(&self) {
		self.dropped.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn snapshot(&self, domain: Domain) -> DomainStats {
		DomainStats {
			domain,
			submitted: self.submitted.load(Ordering::Relaxed),
			completed: self.completed.load(Ordering::Relaxed),
			failed: self.failed.load(Ordering::Relaxed),
			dropped: self.dropped.load(Ordering::Relaxed),
		}
	}
}
