//! Error taxonomy of an analysis run.

use sonde_primitives::{RelPath, ScopeId};

use crate::settings::SettingsError;

/// Result type for analysis operations.
pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;

/// Why an analysis, or part of one, could not proceed.
///
/// None of these escape [`crate::Orchestrator::analyze`]: the scheduler turns
/// them into an [`crate::AnalysisResult`] status.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AnalysisError {
	/// A file could not be prepared for analysis and was dropped from the run.
	#[error("cannot prepare {file}: {reason}")]
	Configuration { file: RelPath, reason: String },

	/// The scope is not ready or the engine could not be reached.
	#[error("backend unavailable for scope {scope}: {reason}")]
	BackendUnavailable { scope: ScopeId, reason: String },

	/// The engine failed for the given files.
	#[error("engine failed on {} file(s): {reason}", files.len())]
	EngineFailure { files: Vec<RelPath>, reason: String },

	/// The host does not know the scope.
	#[error("unknown configuration scope {0}")]
	UnknownScope(ScopeId),

	#[error("analysis cancelled")]
	Cancelled,

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Settings(#[from] SettingsError),
}

impl AnalysisError {
	pub fn configuration(file: &RelPath, reason: impl ToString) -> Self {
		Self::Configuration {
			file: file.clone(),
			reason: reason.to_string(),
		}
	}

	pub const fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}
}
