//! Orchestrator root: owns every piece of shared analysis state.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use sonde_markers::{MarkerUpdater, NullSink, RenderSink, RenderedAnnotation};
use sonde_primitives::{FileKey, ScopeId};
use sonde_tracking::{IssueStore, TrackedIssue};
use sonde_worker::{CancellationToken, DrainBudget, DrainReport, JobClock, JobRecord, JobRuntime, JobToken, KeyedLocks};
use tokio::sync::oneshot;

use crate::configure::{AnalysisConfigurator, FileConfigurator};
use crate::engine::AnalysisEngine;
use crate::hooks::{AnalysisListener, HostUi, SilentUi};
use crate::host::HostFiles;
use crate::metrics::{AnalysisMetrics, MetricsSnapshot};
use crate::pipeline::Capabilities;
use crate::readiness::ReadinessCache;
use crate::remote::RemoteIssues;
use crate::request::AnalysisRequest;
use crate::result::{AnalysisResult, CancelReason, RunStatus};
use crate::settings::{Settings, SettingsSource};
use crate::state::AnalysisStates;
use crate::trigger::TriggerKind;

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

pub(crate) struct Inner {
	pub(crate) engine: Arc<dyn AnalysisEngine>,
	pub(crate) host: Arc<dyn HostFiles>,
	pub(crate) settings: Arc<dyn SettingsSource>,
	pub(crate) remote: Option<Arc<dyn RemoteIssues>>,
	pub(crate) ui: Arc<dyn HostUi>,
	pub(crate) listeners: Vec<Arc<dyn AnalysisListener>>,
	pub(crate) file_configurators: Vec<Arc<dyn FileConfigurator>>,
	pub(crate) configurators: Vec<Arc<dyn AnalysisConfigurator>>,
	pub(crate) capabilities: Capabilities,
	pub(crate) readiness: Arc<ReadinessCache>,
	pub(crate) store: IssueStore,
	pub(crate) markers: MarkerUpdater,
	pub(crate) states: AnalysisStates,
	pub(crate) locks: KeyedLocks<ScopeId>,
	pub(crate) runtime: JobRuntime,
	pub(crate) clock: JobClock,
	pub(crate) metrics: AnalysisMetrics,
	deferred: Mutex<FxHashMap<ScopeId, AnalysisRequest>>,
	pub(crate) shutdown: CancellationToken,
}

/// Entry point for analysis requests.
///
/// Cheap to clone; clones share all state. Runs of one scope are serialized
/// where they touch tracked state, runs of different scopes proceed in
/// parallel.
#[derive(Clone)]
pub struct Orchestrator {
	inner: Arc<Inner>,
}

impl std::fmt::Debug for Orchestrator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Orchestrator")
			.field("in_flight", &self.inner.states.len())
			.field("store_version", &self.inner.store.version())
			.finish_non_exhaustive()
	}
}

impl Orchestrator {
	pub fn builder(engine: Arc<dyn AnalysisEngine>, host: Arc<dyn HostFiles>) -> OrchestratorBuilder {
		OrchestratorBuilder::new(engine, host)
	}

	/// Runs `request` and waits for its terminal state.
	pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisResult {
		self.submit(request).await.join().await
	}

	/// Runs requests spanning several scopes.
	///
	/// Nothing runs unless every involved scope is ready. Otherwise every
	/// request is reported as not ready and the requests of unready scopes
	/// are deferred.
	pub async fn analyze_all(&self, requests: Vec<AnalysisRequest>) -> Vec<AnalysisResult> {
		let inner = &self.inner;
		if let Some(scope) = inner.readiness.first_not_ready(requests.iter().map(|r| &r.scope)) {
			tracing::info!(scope = %scope, requests = requests.len(), "Scope not ready, deferring multi-scope analysis");
			let mut results = Vec::with_capacity(requests.len());
			for request in requests {
				let mut result = AnalysisResult::new(inner.clock.next(), request.scope.clone(), request.trigger);
				result.status = RunStatus::Cancelled {
					reason: CancelReason::NotReady,
				};
				inner.report(&result);
				if !inner.readiness.is_ready(&request.scope)
					&& let Some(replay) = inner.defer(request)
				{
					inner.dispatch(replay).await;
				}
				results.push(result);
			}
			return results;
		}

		let mut handles = Vec::with_capacity(requests.len());
		for request in requests {
			handles.push(inner.dispatch(request).await);
		}
		let mut results = Vec::with_capacity(handles.len());
		for handle in handles {
			results.push(handle.join().await);
		}
		results
	}

	/// Starts `request` in the background.
	pub async fn submit(&self, request: AnalysisRequest) -> JobHandle {
		self.inner.dispatch(request).await
	}

	/// Records the readiness of `scope`.
	///
	/// Becoming ready replays the request deferred for the scope, if any.
	/// Becoming not ready cancels the scope's in-flight jobs.
	pub async fn set_ready(&self, scope: impl Into<ScopeId>, ready: bool) -> Option<JobHandle> {
		let scope = scope.into();
		let previous = self.inner.readiness.set_ready(&scope, ready);
		tracing::debug!(scope = %scope, ready, previous, "Scope readiness changed");
		if !ready {
			self.cancel_scope(&scope);
			return None;
		}
		let mut request = self.inner.deferred.lock().remove(&scope)?;
		request.trigger = TriggerKind::ReadinessChange;
		tracing::info!(scope = %scope, files = request.files.len(), "Replaying deferred analysis");
		Some(self.inner.dispatch(request).await)
	}

	pub fn is_ready(&self, scope: &ScopeId) -> bool {
		self.inner.readiness.is_ready(scope)
	}

	/// Requests cooperative cancellation of every job of `scope`.
	pub fn cancel_scope(&self, scope: &ScopeId) -> usize {
		let cancelled = self.inner.runtime.registry().cancel_key(scope.as_str());
		if cancelled > 0 {
			tracing::debug!(scope = %scope, cancelled, "Cancelled scope jobs");
		}
		cancelled
	}

	/// Drops everything known about `scope`: jobs, deferred work, tracked
	/// issues and annotations.
	pub async fn close_scope(&self, scope: &ScopeId) {
		self.cancel_scope(scope);
		self.inner.readiness.remove(scope);
		self.inner.deferred.lock().remove(scope);

		let _scope_guard = self.inner.locks.lock(scope.clone()).await;
		let stats = self.inner.markers.clear_scope(scope);
		let files = self.inner.store.remove_scope(scope);
		self.inner.metrics.record_render(&stats);
		tracing::debug!(scope = %scope, files = files.len(), deleted = stats.deleted, "Closed scope");
	}

	/// Engine completion signal for analysis `id`.
	pub fn on_engine_completed(&self, id: u64) -> bool {
		self.inner.states.complete(id).is_some()
	}

	pub fn tracked_issues(&self, file: &FileKey) -> Vec<TrackedIssue> {
		self.inner.store.issues(file)
	}

	pub fn taint_issues(&self, file: &FileKey) -> Vec<TrackedIssue> {
		self.inner.store.taint(file)
	}

	pub fn rendered(&self, file: &FileKey) -> Vec<RenderedAnnotation> {
		self.inner.markers.rendered(file)
	}

	pub fn metrics(&self) -> MetricsSnapshot {
		self.inner.metrics.snapshot()
	}

	/// Ids of analyses the engine has not signalled completion for.
	pub fn in_flight(&self) -> Vec<u64> {
		self.inner.states.in_flight()
	}

	/// The request waiting for `scope` to become ready.
	pub fn deferred(&self, scope: &ScopeId) -> Option<AnalysisRequest> {
		self.inner.deferred.lock().get(scope).cloned()
	}

	/// Waits for submitted jobs, background enrichment included, within
	/// `budget` without cancelling them.
	pub async fn drain(&self, budget: DrainBudget) -> DrainReport {
		self.inner.runtime.drain(budget).await
	}

	/// Cancels all jobs and drains them within `budget`.
	///
	/// Whatever is still running afterwards is aborted.
	pub async fn shutdown(&self, budget: DrainBudget) -> DrainReport {
		self.inner.shutdown.cancel();
		self.inner.runtime.registry().cancel_all();
		let report = self.inner.runtime.drain(budget).await;
		if !report.is_idle() {
			tracing::warn!(
				pending_interactive = report.pending_interactive,
				pending_background = report.pending_background,
				"Aborting analysis jobs left after drain"
			);
		}
		self.inner.runtime.abort_all();
		report
	}
}

impl Inner {
	async fn dispatch(self: &Arc<Self>, request: AnalysisRequest) -> JobHandle {
		self.runtime.reap().await;

		let id = self.clock.next();
		let token = JobToken::child_of(id, &self.shutdown);
		let class = request.trigger.task_class();
		self.runtime.registry().upsert(JobRecord {
			id,
			name: format!("analysis:{}", request.trigger.as_str()),
			key: request.scope.as_str().to_string(),
			class,
			started_at: Instant::now(),
			cancel: token.cancellation().clone(),
		});

		let (tx, rx) = oneshot::channel();
		let handle = JobHandle {
			id,
			scope: request.scope.clone(),
			trigger: request.trigger,
			token: token.clone(),
			rx,
		};
		self.runtime.submit(class, job(Arc::clone(self), request, token, tx));
		handle
	}

	fn report(&self, result: &AnalysisResult) {
		match &result.status {
			RunStatus::Completed => {
				self.metrics.inc(|m| &m.runs_completed);
				tracing::info!(
					analysis_id = result.analysis_id,
					scope = %result.scope,
					trigger = result.trigger.as_str(),
					analyzed = result.analyzed.len(),
					excluded = result.excluded.len(),
					created = result.tracking.created,
					elapsed_ms = result.elapsed.as_millis() as u64,
					"Analysis completed"
				);
			}
			RunStatus::Cancelled { reason } => {
				self.metrics.inc(|m| &m.runs_cancelled);
				tracing::info!(analysis_id = result.analysis_id, scope = %result.scope, reason = ?reason, "Analysis cancelled");
			}
			RunStatus::Failed { warning, cause } => {
				self.metrics.inc(|m| &m.runs_failed);
				tracing::warn!(analysis_id = result.analysis_id, scope = %result.scope, cause = %cause, "{warning}");
				if result.trigger.behavior().interactive {
					self.ui.report_failure(result);
				}
			}
		}
		for listener in &self.listeners {
			listener.on_analysis_done(result);
		}
	}

	/// Parks a request until its scope is ready.
	///
	/// Returns the coalesced request instead if the scope became ready in
	/// the meantime.
	fn defer(&self, request: AnalysisRequest) -> Option<AnalysisRequest> {
		self.metrics.inc(|m| &m.runs_deferred);
		let scope = request.scope.clone();
		let mut deferred = self.deferred.lock();
		let mut pending = match deferred.remove(&scope) {
			Some(mut earlier) => {
				earlier.absorb(request);
				earlier
			}
			None => request,
		};
		if self.readiness.is_ready(&scope) {
			pending.trigger = TriggerKind::ReadinessChange;
			return Some(pending);
		}
		tracing::debug!(scope = %scope, files = pending.files.len(), "Deferred analysis until scope is ready");
		deferred.insert(scope, pending);
		None
	}
}

fn job(inner: Arc<Inner>, request: AnalysisRequest, token: JobToken, tx: oneshot::Sender<AnalysisResult>) -> JobFuture {
	Box::pin(async move {
		let result = inner.run(&request, &token).await;
		inner.runtime.registry().remove(token.id());
		inner.report(&result);
		if result.status
			== (RunStatus::Cancelled {
				reason: CancelReason::NotReady,
			}) && let Some(replay) = inner.defer(request)
		{
			inner.dispatch(replay).await;
		}
		if tx.send(result).is_err() {
			tracing::trace!(analysis_id = token.id(), "analysis.job.result_dropped");
		}
	})
}

/// Handle to a submitted analysis.
#[derive(Debug)]
pub struct JobHandle {
	id: u64,
	scope: ScopeId,
	trigger: TriggerKind,
	token: JobToken,
	rx: oneshot::Receiver<AnalysisResult>,
}

impl JobHandle {
	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn scope(&self) -> &ScopeId {
		&self.scope
	}

	/// Requests cooperative cancellation of the run.
	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// Waits for the run's result.
	pub async fn join(self) -> AnalysisResult {
		match self.rx.await {
			Ok(result) => result,
			Err(_) => {
				let mut result = AnalysisResult::new(self.id, self.scope, self.trigger);
				result.status = RunStatus::Cancelled {
					reason: CancelReason::Requested,
				};
				result
			}
		}
	}
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
	engine: Arc<dyn AnalysisEngine>,
	host: Arc<dyn HostFiles>,
	settings: Arc<dyn SettingsSource>,
	remote: Option<Arc<dyn RemoteIssues>>,
	sink: Arc<dyn RenderSink>,
	ui: Arc<dyn HostUi>,
	listeners: Vec<Arc<dyn AnalysisListener>>,
	file_configurators: Vec<Arc<dyn FileConfigurator>>,
	configurators: Vec<Arc<dyn AnalysisConfigurator>>,
	capabilities: Option<Capabilities>,
	readiness: Option<Arc<ReadinessCache>>,
}

impl OrchestratorBuilder {
	fn new(engine: Arc<dyn AnalysisEngine>, host: Arc<dyn HostFiles>) -> Self {
		Self {
			engine,
			host,
			settings: Arc::new(Settings::default()),
			remote: None,
			sink: Arc::new(NullSink::default()),
			ui: Arc::new(SilentUi),
			listeners: Vec::new(),
			file_configurators: Vec::new(),
			configurators: Vec::new(),
			capabilities: None,
			readiness: None,
		}
	}

	/// Uses the same settings for every scope.
	pub fn settings(self, settings: Settings) -> Self {
		self.settings_source(Arc::new(settings))
	}

	pub fn settings_source(mut self, source: Arc<dyn SettingsSource>) -> Self {
		self.settings = source;
		self
	}

	pub fn remote(mut self, remote: Arc<dyn RemoteIssues>) -> Self {
		self.remote = Some(remote);
		self
	}

	pub fn sink(mut self, sink: Arc<dyn RenderSink>) -> Self {
		self.sink = sink;
		self
	}

	pub fn host_ui(mut self, ui: Arc<dyn HostUi>) -> Self {
		self.ui = ui;
		self
	}

	pub fn listener(mut self, listener: Arc<dyn AnalysisListener>) -> Self {
		self.listeners.push(listener);
		self
	}

	/// Adds a deprecated per-file configurator.
	pub fn file_configurator(mut self, configurator: Arc<dyn FileConfigurator>) -> Self {
		self.file_configurators.push(configurator);
		self
	}

	pub fn configurator(mut self, configurator: Arc<dyn AnalysisConfigurator>) -> Self {
		self.configurators.push(configurator);
		self
	}

	/// Overrides the capabilities derived from the registered adapters.
	pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
		self.capabilities = Some(capabilities);
		self
	}

	/// Shares a readiness cache with the component that publishes readiness.
	///
	/// Flags written directly to the cache gate new runs but do not replay
	/// deferred requests; [`Orchestrator::set_ready`] does both.
	pub fn readiness(mut self, cache: Arc<ReadinessCache>) -> Self {
		self.readiness = Some(cache);
		self
	}

	pub fn build(self) -> Orchestrator {
		let capabilities = self.capabilities.unwrap_or(Capabilities {
			remote_enrichment: self.remote.is_some(),
			legacy_configurators: !self.file_configurators.is_empty(),
		});
		Orchestrator {
			inner: Arc::new(Inner {
				engine: self.engine,
				host: self.host,
				settings: self.settings,
				remote: self.remote,
				ui: self.ui,
				listeners: self.listeners,
				file_configurators: self.file_configurators,
				configurators: self.configurators,
				capabilities,
				readiness: self.readiness.unwrap_or_default(),
				store: IssueStore::new(),
				markers: MarkerUpdater::new(self.sink),
				states: AnalysisStates::new(),
				locks: KeyedLocks::new(),
				runtime: JobRuntime::new(),
				clock: JobClock::new(),
				metrics: AnalysisMetrics::new(),
				deferred: Mutex::new(FxHashMap::default()),
				shutdown: CancellationToken::new(),
			}),
		}
	}
}
