//! Host UI and telemetry hooks.

use std::time::Duration;

use sonde_primitives::ScopeId;

use crate::result::AnalysisResult;

/// User-facing callbacks for interactive runs.
pub trait HostUi: Send + Sync {
	/// Asked before an interactive run over more files than the configured
	/// threshold. Returning false cancels the run.
	fn confirm_bulk_analysis(&self, _scope: &ScopeId, _file_count: usize) -> bool {
		true
	}

	/// Shown when an interactive run fails.
	fn report_failure(&self, _result: &AnalysisResult) {}
}

/// Host UI that accepts every confirmation and shows nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentUi;

impl HostUi for SilentUi {}

/// Telemetry callbacks.
pub trait AnalysisListener: Send + Sync {
	fn on_analysis_done(&self, _result: &AnalysisResult) {}

	/// Called per analyzed file with the engine time of its run.
	fn on_file_analyzed(&self, _language: Option<&str>, _elapsed: Duration) {}
}
