//! `sonde`: runs one analysis of a project directory and prints annotation
//! operations as JSON lines on stdout.

mod cli;
mod engine;
mod remote;
mod sink;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use cli::{AnalyzeArgs, Cli, Command};
use engine::ProcessEngine;
use remote::SnapshotRemote;
use sink::JsonLinesSink;
use sonde_analysis::{AnalysisRequest, DrainBudget, LocalFiles, Orchestrator, RunStatus, SettingsFile, TriggerKind};
use sonde_primitives::RelPath;

const DRAIN: DrainBudget = DrainBudget::new(Duration::from_secs(30), usize::MAX);

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	match cli.command {
		Command::Analyze(args) => analyze(args).await,
	}
}

async fn analyze(args: AnalyzeArgs) -> anyhow::Result<ExitCode> {
	let base_dir = args
		.base_dir
		.canonicalize()
		.with_context(|| format!("base directory {}", args.base_dir.display()))?;
	if !base_dir.is_dir() {
		bail!("{} is not a directory", base_dir.display());
	}
	let scope = cli::scope_name(&base_dir);
	let settings_path = args.settings_path();
	tracing::info!(scope = %scope, base_dir = %base_dir.display(), settings = %settings_path.display(), "Starting analysis");

	let files = if args.files.is_empty() {
		walk(&base_dir)?
	} else {
		args.files.iter().map(|f| RelPath::from(f.as_str())).collect()
	};

	let host = Arc::new(LocalFiles::new().with_scope(scope.as_str(), base_dir.clone()));
	let engine = Arc::new(ProcessEngine::new(args.engine.clone(), args.engine_args.clone()));
	let mut builder = Orchestrator::builder(engine, host)
		.settings_source(Arc::new(SettingsFile::new(settings_path)))
		.sink(Arc::new(JsonLinesSink::new(std::io::stdout())));
	if let Some(path) = &args.server_snapshot {
		builder = builder.remote(Arc::new(SnapshotRemote::load(path)?));
	}
	let orchestrator = builder.build();
	orchestrator.set_ready(scope.as_str(), true).await;

	let trigger = if args.manual { TriggerKind::Manual } else { TriggerKind::Startup };
	let result = orchestrator.analyze(AnalysisRequest::new(scope.as_str(), trigger).files(files)).await;

	let drained = orchestrator.drain(DRAIN).await;
	if !drained.is_idle() {
		tracing::warn!(?drained, "Background work still pending at exit");
	}
	orchestrator.shutdown(DrainBudget::new(Duration::from_secs(1), usize::MAX)).await;

	let metrics = orchestrator.metrics();
	tracing::info!(
		status = result.status.as_str(),
		analyzed = result.analyzed.len(),
		excluded = result.excluded.len(),
		failed = result.failed.len(),
		dropped = result.dropped.len(),
		enrichment_runs = metrics.enrichment_runs,
		elapsed_ms = result.elapsed.as_millis() as u64,
		"Analysis finished"
	);

	Ok(match &result.status {
		RunStatus::Completed => ExitCode::SUCCESS,
		RunStatus::Failed { warning, cause } => {
			eprintln!("sonde: {warning}: {cause}");
			ExitCode::from(1)
		}
		RunStatus::Cancelled { reason } => {
			eprintln!("sonde: analysis cancelled ({reason:?})");
			ExitCode::from(2)
		}
	})
}

/// Every file under `root` not hidden or ignored, as scope-relative paths.
fn walk(root: &Path) -> anyhow::Result<Vec<RelPath>> {
	let mut files = Vec::new();
	for entry in ignore::WalkBuilder::new(root).build() {
		let entry = entry.context("walking base directory")?;
		if !entry.file_type().is_some_and(|t| t.is_file()) {
			continue;
		}
		if let Some(rel) = relative(root, entry.path()) {
			files.push(rel);
		}
	}
	files.sort();
	Ok(files)
}

fn relative(root: &Path, path: &Path) -> Option<RelPath> {
	let rel = path.strip_prefix(root).ok()?;
	let parts: Vec<_> = rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
	(!parts.is_empty()).then(|| RelPath::from(parts.join("/")))
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::fmt::format::FmtSpan;
	use tracing_subscriber::prelude::*;

	if let Some(log_dir) = std::env::var("SONDE_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("sonde.{}.log", std::process::id()));

		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
				if verbose {
					EnvFilter::new("sonde_analysis=trace,sonde_markers=debug,sonde=debug,info")
				} else {
					EnvFilter::new("sonde_analysis=debug,sonde=debug,info")
				}
			});

			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(file)
				.with_ansi(false)
				.with_span_events(FmtSpan::CLOSE)
				.with_target(true);

			tracing_subscriber::registry().with(filter).with(file_layer).init();

			tracing::info!(path = ?log_path, "Tracing initialized");
			return;
		}
	}

	// stdout carries annotation events
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_max_level(if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN })
		.init();
}
