//! Server records loaded from a JSON snapshot file.

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use sonde_analysis::{RemoteBinding, RemoteError, RemoteIssues};
use sonde_primitives::RelPath;
use sonde_tracking::ServerFinding;

/// Remote facade answering from a captured `{"issues": [...], "taint": [...]}` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SnapshotRemote {
	issues: Vec<ServerFinding>,
	taint: Vec<ServerFinding>,
}

impl SnapshotRemote {
	pub fn load(path: &Path) -> anyhow::Result<Self> {
		let text = std::fs::read_to_string(path).with_context(|| format!("reading server snapshot {}", path.display()))?;
		let snapshot: Self = serde_json::from_str(&text).with_context(|| format!("parsing server snapshot {}", path.display()))?;
		tracing::debug!(issues = snapshot.issues.len(), taint = snapshot.taint.len(), "Server snapshot loaded");
		Ok(snapshot)
	}

	fn select(records: &[ServerFinding], path: &RelPath, include_resolved: bool) -> Vec<ServerFinding> {
		records
			.iter()
			.filter(|record| &record.path == path && (include_resolved || !record.resolved))
			.cloned()
			.collect()
	}
}

#[async_trait]
impl RemoteIssues for SnapshotRemote {
	async fn fetch_issues(
		&self,
		_binding: &RemoteBinding,
		_branch: &str,
		path: &RelPath,
		include_resolved: bool,
	) -> Result<Vec<ServerFinding>, RemoteError> {
		Ok(Self::select(&self.issues, path, include_resolved))
	}

	async fn fetch_taint(
		&self,
		_binding: &RemoteBinding,
		_branch: &str,
		path: &RelPath,
		include_resolved: bool,
	) -> Result<Vec<ServerFinding>, RemoteError> {
		Ok(Self::select(&self.taint, path, include_resolved))
	}
}
