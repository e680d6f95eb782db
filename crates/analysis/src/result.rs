use std::time::Duration;

use sonde_markers::RenderStats;
use sonde_primitives::{RelPath, ScopeId};
use sonde_tracking::TrackingStats;

use crate::error::AnalysisError;
use crate::trigger::TriggerKind;

/// Why a run stopped without completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
	/// Cancellation was requested through the job's token.
	Requested,
	/// A scope of the request was not ready; the request was deferred.
	NotReady,
	/// The engine or backend could not be reached.
	BackendUnavailable,
	/// The user declined the bulk-analysis confirmation.
	Declined,
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
	Completed,
	Cancelled { reason: CancelReason },
	/// The run failed; `cause` is the original error for diagnostics.
	Failed { warning: String, cause: String },
}

impl RunStatus {
	pub const fn is_completed(&self) -> bool {
		matches!(self, Self::Completed)
	}

	pub const fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled { .. })
	}

	pub const fn is_failed(&self) -> bool {
		matches!(self, Self::Failed { .. })
	}

	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Completed => "completed",
			Self::Cancelled { .. } => "cancelled",
			Self::Failed { .. } => "failed",
		}
	}
}

/// Outcome of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
	pub analysis_id: u64,
	pub scope: ScopeId,
	pub trigger: TriggerKind,
	pub status: RunStatus,
	/// Files tracked and rendered.
	pub analyzed: Vec<RelPath>,
	/// Files excluded by pattern or version control.
	pub excluded: Vec<RelPath>,
	/// Files the engine failed on; their previous results were kept.
	pub failed: Vec<RelPath>,
	/// Files dropped before or during engine invocation.
	pub dropped: Vec<RelPath>,
	pub tracking: TrackingStats,
	pub render: RenderStats,
	pub elapsed: Duration,
}

impl AnalysisResult {
	pub(crate) fn new(analysis_id: u64, scope: ScopeId, trigger: TriggerKind) -> Self {
		Self {
			analysis_id,
			scope,
			trigger,
			status: RunStatus::Completed,
			analyzed: Vec::new(),
			excluded: Vec::new(),
			failed: Vec::new(),
			dropped: Vec::new(),
			tracking: TrackingStats::default(),
			render: RenderStats::default(),
			elapsed: Duration::ZERO,
		}
	}

	pub(crate) fn add_tracking(&mut self, stats: &TrackingStats) {
		let t = &mut self.tracking;
		t.server_key += stats.server_key;
		t.exact += stats.exact;
		t.line += stats.line;
		t.proximity += stats.proximity;
		t.created += stats.created;
		t.dropped += stats.dropped;
		t.retained += stats.retained;
	}

	pub(crate) fn add_render(&mut self, stats: &RenderStats) {
		self.render.created += stats.created;
		self.render.updated += stats.updated;
		self.render.deleted += stats.deleted;
		self.render.unchanged += stats.unchanged;
	}
}

/// Maps a pipeline error onto the run status.
pub(crate) fn status_of(err: &AnalysisError) -> RunStatus {
	match err {
		AnalysisError::Cancelled => RunStatus::Cancelled {
			reason: CancelReason::Requested,
		},
		AnalysisError::BackendUnavailable { .. } => RunStatus::Cancelled {
			reason: CancelReason::BackendUnavailable,
		},
		other => RunStatus::Failed {
			warning: warning_for(other).to_string(),
			cause: other.to_string(),
		},
	}
}

fn warning_for(err: &AnalysisError) -> &'static str {
	match err {
		AnalysisError::Configuration { .. } | AnalysisError::Settings(_) => "Analysis could not be configured",
		AnalysisError::EngineFailure { .. } => "Analysis engine failed",
		AnalysisError::UnknownScope(_) => "Analysis requested for an unknown project",
		_ => "Analysis failed",
	}
}
