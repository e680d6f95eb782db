use std::time::Duration;

/// Limits for one [`crate::JobRuntime::drain`] call.
#[derive(Debug, Clone, Copy)]
pub struct DrainBudget {
	pub duration: Duration,
	pub max_completions: usize,
}

impl DrainBudget {
	pub const fn new(duration: Duration, max_completions: usize) -> Self {
		Self { duration, max_completions }
	}
}

/// Outcome of a drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
	pub completed: u64,
	pub pending_interactive: usize,
	pub pending_background: usize,
	pub budget_exhausted: bool,
}

impl DrainReport {
	pub const fn is_idle(&self) -> bool {
		self.pending_interactive == 0 && self.pending_background == 0
	}
}
