/// Execution classes used for job scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Analyses the user is waiting on (editor open/change, manual runs).
	Interactive,
	/// Work that may lag behind: enrichment, fallback retirement, replays.
	Background,
	/// Blocking I/O executed on the blocking pool (temp copies, file reads).
	IoBlocking,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
			Self::IoBlocking => "io_blocking",
		}
	}
}
