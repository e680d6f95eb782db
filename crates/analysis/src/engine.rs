//! Analysis engine adapter interface.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sonde_primitives::RelPath;
use sonde_tracking::RawFinding;
use sonde_worker::CancellationToken;

use crate::configure::Properties;
use crate::inputs::InputFile;
use crate::settings::RuleConfig;

/// Everything the engine needs for one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineRequest {
	pub analysis_id: u64,
	pub base_dir: PathBuf,
	pub files: Vec<InputFile>,
	pub properties: Properties,
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub rules: BTreeMap<String, RuleConfig>,
}

/// Findings the engine reported for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFindings {
	pub path: RelPath,
	#[serde(default)]
	pub findings: Vec<RawFinding>,
}

/// Engine output of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineResponse {
	pub per_file: Vec<FileFindings>,
	/// Language the engine detected per file.
	pub detected_languages: BTreeMap<RelPath, String>,
	/// Files the engine failed on; their previous results are kept.
	pub failed_files: BTreeSet<RelPath>,
}

impl EngineResponse {
	/// Findings for `path`, concatenated if the engine reported it twice.
	pub fn take_findings(&mut self, path: &RelPath) -> Vec<RawFinding> {
		let mut out = Vec::new();
		for entry in self.per_file.iter_mut().filter(|entry| &entry.path == path) {
			out.append(&mut entry.findings);
		}
		out
	}
}

/// Engine-side failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
	/// The engine cannot analyze these files (e.g. missing build data); the
	/// run continues without them.
	#[error("engine cannot analyze {} file(s): {reason}", files.len())]
	CannotAnalyze { files: Vec<RelPath>, reason: String },

	/// The engine process or service could not be reached.
	#[error("engine unavailable: {0}")]
	Unavailable(String),

	#[error("engine failed: {0}")]
	Failed(String),

	#[error("engine run cancelled")]
	Cancelled,
}

/// The static-analysis engine.
///
/// Implementations should stop work promptly once `cancel` fires. They may
/// additionally report completion out of band through
/// [`crate::Orchestrator::on_engine_completed`].
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
	async fn analyze(&self, request: EngineRequest, cancel: CancellationToken) -> Result<EngineResponse, EngineError>;
}
