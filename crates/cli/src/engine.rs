//! Engine adapter talking JSON to a child process.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use sonde_analysis::{AnalysisEngine, CancellationToken, EngineError, EngineRequest, EngineResponse};
use sonde_primitives::RelPath;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Runs one engine process per analysis.
///
/// The request is written to the child's stdin as JSON; the child answers on
/// stdout with either an engine response or `{"error": {...}}`.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
	program: PathBuf,
	args: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Reply {
	Error { error: ReplyError },
	Response(EngineResponse),
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum ReplyError {
	CannotAnalyze { files: Vec<RelPath>, reason: String },
	Failed { reason: String },
}

impl ProcessEngine {
	pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
		Self {
			program: program.into(),
			args,
		}
	}
}

fn decode(stdout: &[u8]) -> Result<EngineResponse, EngineError> {
	match serde_json::from_slice::<Reply>(stdout) {
		Ok(Reply::Response(response)) => Ok(response),
		Ok(Reply::Error {
			error: ReplyError::CannotAnalyze { files, reason },
		}) => Err(EngineError::CannotAnalyze { files, reason }),
		Ok(Reply::Error {
			error: ReplyError::Failed { reason },
		}) => Err(EngineError::Failed(reason)),
		Err(err) => Err(EngineError::Failed(format!("malformed engine output: {err}"))),
	}
}

#[async_trait]
impl AnalysisEngine for ProcessEngine {
	async fn analyze(&self, request: EngineRequest, cancel: CancellationToken) -> Result<EngineResponse, EngineError> {
		let payload = serde_json::to_vec(&request).map_err(|e| EngineError::Failed(e.to_string()))?;

		let mut child = Command::new(&self.program)
			.args(&self.args)
			.current_dir(&request.base_dir)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::inherit())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| EngineError::Unavailable(format!("failed to spawn engine '{}': {e}", self.program.display())))?;
		tracing::debug!(analysis_id = request.analysis_id, pid = ?child.id(), "Engine process started");

		let (Some(mut stdin), Some(mut stdout)) = (child.stdin.take(), child.stdout.take()) else {
			return Err(EngineError::Unavailable("engine stdio not captured".into()));
		};
		let exchange = async move {
			stdin.write_all(&payload).await?;
			stdin.shutdown().await?;
			drop(stdin);
			let mut out = Vec::new();
			stdout.read_to_end(&mut out).await?;
			Ok::<_, std::io::Error>(out)
		};

		let output = tokio::select! {
			_ = cancel.cancelled() => {
				if let Err(err) = child.kill().await {
					tracing::warn!(error = %err, "Failed to kill cancelled engine process");
				}
				return Err(EngineError::Cancelled);
			}
			output = exchange => output.map_err(|e| EngineError::Failed(format!("engine I/O failed: {e}")))?,
		};

		let status = child.wait().await.map_err(|e| EngineError::Failed(e.to_string()))?;
		match decode(&output) {
			Ok(response) if status.success() => Ok(response),
			Ok(_) => Err(EngineError::Failed(format!("engine exited with {status}"))),
			Err(err @ EngineError::CannotAnalyze { .. }) => Err(err),
			Err(_) if !status.success() => Err(EngineError::Failed(format!("engine exited with {status}"))),
			Err(err) => Err(err),
		}
	}
}
