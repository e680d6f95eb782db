//! Remote server issue facade.

use async_trait::async_trait;
use sonde_primitives::RelPath;
use sonde_tracking::ServerFinding;

use crate::settings::RemoteBinding;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
	#[error("server unreachable: {0}")]
	Unreachable(String),

	#[error("unexpected server response: {0}")]
	Protocol(String),
}

/// Read access to a server's issue and taint records.
#[async_trait]
pub trait RemoteIssues: Send + Sync {
	async fn fetch_issues(
		&self,
		binding: &RemoteBinding,
		branch: &str,
		path: &RelPath,
		include_resolved: bool,
	) -> Result<Vec<ServerFinding>, RemoteError>;

	async fn fetch_taint(
		&self,
		binding: &RemoteBinding,
		branch: &str,
		path: &RelPath,
		include_resolved: bool,
	) -> Result<Vec<ServerFinding>, RemoteError>;
}
