//! The analysis pipeline.
//!
//! One run walks `ReadinessCheck → Excluding → Configuring → Engine-Invoke →
//! Tracking → MarkerRender` with cancellation checked at every boundary. The
//! scope lock is only held while the tracked store or the rendered
//! annotations of the scope are mutated; the engine call and input
//! preparation run without it.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rustc_hash::FxHashSet;
use sonde_markers::AnnotationKind;
use sonde_primitives::{FileKey, RelPath, ScopeId};
use sonde_tracking::{CommitOutcome, IssueTracker, RawFinding};
use sonde_worker::{JobToken, TaskClass};
use tokio::task::JoinError;

use crate::configure::{Properties, merge_properties};
use crate::engine::{EngineError, EngineRequest, EngineResponse};
use crate::enrichment::EnrichmentJob;
use crate::error::AnalysisError;
use crate::exclusions::Exclusions;
use crate::inputs::{LanguageTable, PreparedInputs, TestClassifier, prepare};
use crate::orchestrator::Inner;
use crate::request::AnalysisRequest;
use crate::result::{AnalysisResult, CancelReason, RunStatus, status_of};
use crate::settings::Settings;
use crate::state::AnalysisState;

/// Optional pipeline stages, chosen when the orchestrator is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
	/// Follow local rendering with server enrichment for bound scopes.
	pub remote_enrichment: bool,
	/// Consult deprecated per-file configurators for properties.
	pub legacy_configurators: bool,
}

impl Default for Capabilities {
	fn default() -> Self {
		Self {
			remote_enrichment: true,
			legacy_configurators: false,
		}
	}
}

/// Early exit of a run.
#[derive(Debug)]
pub(crate) enum Halt {
	Error(AnalysisError),
	Cancel(CancelReason),
}

impl From<AnalysisError> for Halt {
	fn from(err: AnalysisError) -> Self {
		Self::Error(err)
	}
}

fn checkpoint(token: &JobToken) -> Result<(), Halt> {
	if token.is_cancelled() {
		return Err(AnalysisError::Cancelled.into());
	}
	Ok(())
}

fn blocking_failed(err: JoinError) -> AnalysisError {
	AnalysisError::Io(std::io::Error::other(err))
}

impl Inner {
	/// Runs one request to its terminal state.
	///
	/// Never fails: every error is turned into the result's status.
	pub(crate) async fn run(self: &Arc<Self>, request: &AnalysisRequest, token: &JobToken) -> AnalysisResult {
		let started = Instant::now();
		let mut result = AnalysisResult::new(token.id(), request.scope.clone(), request.trigger);
		self.metrics.inc(|m| &m.runs_started);
		tracing::debug!(
			analysis_id = token.id(),
			scope = %request.scope,
			trigger = request.trigger.as_str(),
			files = request.files.len(),
			"Analysis started"
		);

		result.status = match self.execute(request, token, &mut result).await {
			Ok(()) => RunStatus::Completed,
			Err(Halt::Cancel(reason)) => RunStatus::Cancelled { reason },
			Err(Halt::Error(err)) => status_of(&err),
		};
		result.elapsed = started.elapsed();
		result
	}

	async fn execute(self: &Arc<Self>, request: &AnalysisRequest, token: &JobToken, result: &mut AnalysisResult) -> Result<(), Halt> {
		let scope = &request.scope;
		let behavior = request.trigger.behavior();

		if !self.readiness.is_ready(scope) {
			return Err(Halt::Cancel(CancelReason::NotReady));
		}
		let settings = self.settings.settings(scope).map_err(AnalysisError::from)?;
		let base_dir = self.host.base_dir(scope).ok_or_else(|| AnalysisError::UnknownScope(scope.clone()))?;

		if behavior.interactive
			&& request.files.len() > settings.bulk_confirm_threshold
			&& !self.ui.confirm_bulk_analysis(scope, request.files.len())
		{
			return Err(Halt::Cancel(CancelReason::Declined));
		}
		checkpoint(token)?;

		if request.clear_report {
			let _scope_guard = self.locks.lock(scope.clone()).await;
			let stats = self.markers.clear_kind(scope, AnnotationKind::Report);
			self.metrics.record_render(&stats);
		}

		let exclusions = {
			let host = self.host.clone();
			let patterns = settings.exclusions.clone();
			let respect_vcs = settings.respect_vcs_ignore;
			let scope = scope.clone();
			self.runtime
				.spawn_blocking(TaskClass::IoBlocking, move || {
					let vcs = if respect_vcs { host.ignore_oracle(&scope) } else { None };
					Exclusions::new(&patterns, vcs)
				})
				.await
				.map_err(blocking_failed)?
		};
		let (eligible, excluded) = exclusions.partition(request.files.clone(), |file| &file.path);
		if !excluded.is_empty() {
			let _scope_guard = self.locks.lock(scope.clone()).await;
			for (file, reason) in &excluded {
				let key = FileKey::new(scope.clone(), file.path.clone());
				let stats = self.markers.clear_file(&key);
				self.store.remove(&key);
				self.metrics.record_render(&stats);
				tracing::debug!(file = %key, reason = ?reason, "Cleared excluded file");
				result.excluded.push(file.path.clone());
			}
			self.metrics.add(|m| &m.files_excluded, excluded.len());
		}
		if eligible.is_empty() {
			return Ok(());
		}
		checkpoint(token)?;

		let paths: Vec<RelPath> = eligible.iter().map(|file| file.path.clone()).collect();
		let properties = self.properties(scope, &paths, &settings);

		let mut inputs = {
			let host = self.host.clone();
			let scope = scope.clone();
			let languages = LanguageTable::new(&settings.languages);
			let tests = TestClassifier::new(&settings.test_patterns);
			self.runtime
				.spawn_blocking(TaskClass::IoBlocking, move || prepare(host.as_ref(), &scope, eligible, &languages, &tests))
				.await
				.map_err(blocking_failed)?
		};
		for dropped in inputs.dropped.drain(..) {
			if let AnalysisError::Configuration { file, .. } = dropped {
				result.dropped.push(file);
			}
		}
		if inputs.is_empty() {
			return Ok(());
		}
		checkpoint(token)?;

		let (mut response, engine_elapsed) = self
			.invoke_engine(request, &base_dir, &mut inputs, properties, &settings, token, result)
			.await?;
		checkpoint(token)?;

		self.track_and_render(request, &settings, &inputs, &mut response, engine_elapsed, token, result)
			.await?;

		for configurator in &self.configurators {
			configurator.analysis_complete(scope, &result.analyzed);
		}

		if self.capabilities.remote_enrichment
			&& behavior.fetch_remote
			&& !result.analyzed.is_empty()
			&& let (Some(remote), Some(binding)) = (self.remote.clone(), settings.remote.clone())
		{
			let job = EnrichmentJob {
				scope: scope.clone(),
				files: result.analyzed.clone(),
				kind: request.trigger.annotation_kind(),
				binding,
				filter: settings.marker_filter(),
				include_resolved_taint: settings.issue_filter.shows_resolved(),
			};
			if behavior.match_async {
				self.spawn_enrichment(remote, job);
			} else if let Err(err) = self.enrich(remote.as_ref(), job, token).await {
				if err.is_cancelled() {
					return Err(err.into());
				}
				self.metrics.inc(|m| &m.enrichment_failures);
				tracing::warn!(scope = %scope, error = %err, "Server enrichment failed");
			}
		}
		Ok(())
	}

	fn properties(&self, scope: &ScopeId, files: &[RelPath], settings: &Settings) -> Properties {
		let mut layers: Vec<(&str, Properties)> = Vec::new();
		if self.capabilities.legacy_configurators {
			for configurator in &self.file_configurators {
				let mut merged = Properties::new();
				for file in files {
					merged.extend(configurator.configure(scope, file));
				}
				layers.push((configurator.name(), merged));
			}
		}
		for configurator in &self.configurators {
			layers.push((configurator.name(), configurator.properties(scope, files)));
		}
		layers.push(("settings", settings.properties.clone()));
		merge_properties(layers)
	}

	/// Calls the engine, dropping refused files and retrying once.
	#[allow(clippy::too_many_arguments)]
	async fn invoke_engine(
		&self,
		request: &AnalysisRequest,
		base_dir: &Path,
		inputs: &mut PreparedInputs,
		properties: Properties,
		settings: &Settings,
		token: &JobToken,
		result: &mut AnalysisResult,
	) -> Result<(EngineResponse, Duration), Halt> {
		let id = token.id();
		let started = Instant::now();
		self.states.begin(AnalysisState {
			id,
			scope: request.scope.clone(),
			files: inputs.paths(),
			trigger: request.trigger,
			started_at: started,
		});

		let mut retried = false;
		loop {
			let engine_request = EngineRequest {
				analysis_id: id,
				base_dir: base_dir.to_path_buf(),
				files: inputs.files.clone(),
				properties: properties.clone(),
				rules: settings.rules.clone(),
			};
			tracing::trace!(analysis_id = id, files = engine_request.files.len(), "analysis.engine.invoke");

			let outcome = tokio::select! {
				biased;
				_ = token.cancelled() => Err(EngineError::Cancelled),
				outcome = self.engine.analyze(engine_request, token.cancellation().clone()) => outcome,
			};

			match outcome {
				Ok(response) => {
					self.states.complete(id);
					return Ok((response, started.elapsed()));
				}
				Err(EngineError::CannotAnalyze { files, reason }) if !retried => {
					let refused: FxHashSet<RelPath> = files.into_iter().collect();
					let removed = inputs.retain(|path| !refused.contains(path));
					tracing::warn!(analysis_id = id, refused = removed, reason = %reason, "Engine refused files, retrying without them");
					let mut refused: Vec<RelPath> = refused.into_iter().collect();
					refused.sort();
					result.dropped.extend(refused);
					if inputs.is_empty() {
						self.states.complete(id);
						return Ok((EngineResponse::default(), started.elapsed()));
					}
					retried = true;
				}
				Err(err) => {
					self.states.retire_after(id, settings.fallback_grace());
					let err = match err {
						EngineError::Cancelled => AnalysisError::Cancelled,
						EngineError::Unavailable(reason) => AnalysisError::BackendUnavailable {
							scope: request.scope.clone(),
							reason,
						},
						EngineError::CannotAnalyze { files, reason } => AnalysisError::EngineFailure { files, reason },
						EngineError::Failed(reason) => AnalysisError::EngineFailure {
							files: inputs.paths(),
							reason,
						},
					};
					return Err(err.into());
				}
			}
		}
	}

	/// Tracks and renders every analyzed file under the scope lock.
	#[allow(clippy::too_many_arguments)]
	async fn track_and_render(
		&self,
		request: &AnalysisRequest,
		settings: &Settings,
		inputs: &PreparedInputs,
		response: &mut EngineResponse,
		engine_elapsed: Duration,
		token: &JobToken,
		result: &mut AnalysisResult,
	) -> Result<(), Halt> {
		let scope = &request.scope;
		let kind = request.trigger.annotation_kind();
		let tracker = IssueTracker::new(settings.tracker_policy());
		let filter = settings.marker_filter();
		let now = Utc::now();

		let _scope_guard = self.locks.lock(scope.clone()).await;
		for input in &inputs.files {
			checkpoint(token)?;
			let key = FileKey::new(scope.clone(), input.path.clone());

			if response.failed_files.contains(&input.path) {
				tracing::warn!(file = %key, "Engine failed on file, keeping previous results");
				self.metrics.inc(|m| &m.files_failed);
				result.failed.push(input.path.clone());
				continue;
			}
			let Some(source) = inputs.sources.get(&input.path) else {
				continue;
			};

			let raw: Vec<RawFinding> = response
				.take_findings(&input.path)
				.into_iter()
				.map(|finding| finding.located(source))
				.collect();
			let previous = self.store.issues(&key);
			let server = self.store.server_findings(&key);
			let outcome = tracker.track(&previous, raw, &server, now);

			if let CommitOutcome::Stale { current } = self.store.commit(&key, token.id(), outcome.issues.clone()) {
				tracing::debug!(file = %key, analysis_id = token.id(), current, "Skipping stale analysis result");
				self.metrics.inc(|m| &m.stale_commits);
				continue;
			}
			let render = self.markers.render(&key, kind, &outcome.issues, &filter);

			self.metrics.record_tracking(&outcome.stats);
			self.metrics.record_render(&render);
			result.add_tracking(&outcome.stats);
			result.add_render(&render);
			result.analyzed.push(input.path.clone());

			let language = response
				.detected_languages
				.get(&input.path)
				.map(String::as_str)
				.or(input.language.as_deref());
			for listener in &self.listeners {
				listener.on_file_analyzed(language, engine_elapsed);
			}
		}
		self.metrics.add(|m| &m.files_analyzed, result.analyzed.len());
		Ok(())
	}
}
