//! Server enrichment of freshly tracked issues.
//!
//! Remote records are fetched without holding the scope lock. The merge into
//! the store and the re-render then happen under it, so a local run of the
//! same scope observes either none or all of one file's server state.

use std::sync::Arc;

use sonde_markers::{AnnotationKind, MarkerFilter};
use sonde_primitives::{FileKey, RelPath, ScopeId};
use sonde_tracking::{ServerFinding, apply_server_findings, reconcile_taint};
use sonde_worker::{JobRecord, JobToken, TaskClass};

use crate::error::{AnalysisError, Result};
use crate::orchestrator::Inner;
use crate::remote::RemoteIssues;
use crate::settings::RemoteBinding;

/// Work description for one enrichment pass.
#[derive(Debug, Clone)]
pub(crate) struct EnrichmentJob {
	pub scope: ScopeId,
	pub files: Vec<RelPath>,
	/// Layer the local run rendered into.
	pub kind: AnnotationKind,
	pub binding: RemoteBinding,
	pub filter: MarkerFilter,
	pub include_resolved_taint: bool,
}

/// What one enrichment pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
	pub files: usize,
	pub matched: usize,
	pub updated: usize,
	pub taint: usize,
	pub fetch_failures: usize,
}

struct Fetched {
	path: RelPath,
	issues: Option<Vec<ServerFinding>>,
	taint: Option<Vec<ServerFinding>>,
}

impl Inner {
	/// Runs enrichment on a background job with its own token.
	pub(crate) fn spawn_enrichment(self: &Arc<Self>, remote: Arc<dyn RemoteIssues>, job: EnrichmentJob) {
		let id = self.clock.next();
		let token = JobToken::child_of(id, &self.shutdown);
		self.runtime.registry().upsert(JobRecord {
			id,
			name: "enrichment".to_string(),
			key: job.scope.as_str().to_string(),
			class: TaskClass::Background,
			started_at: std::time::Instant::now(),
			cancel: token.cancellation().clone(),
		});

		let inner = Arc::clone(self);
		self.runtime.submit(TaskClass::Background, async move {
			let scope = job.scope.clone();
			match inner.enrich(remote.as_ref(), job, &token).await {
				Ok(report) => tracing::debug!(scope = %scope, matched = report.matched, updated = report.updated, "Background enrichment done"),
				Err(err) if err.is_cancelled() => tracing::debug!(scope = %scope, "Background enrichment cancelled"),
				Err(err) => {
					inner.metrics.inc(|m| &m.enrichment_failures);
					tracing::warn!(scope = %scope, error = %err, "Background enrichment failed");
				}
			}
			inner.runtime.registry().remove(id);
		});
	}

	/// Fetches server state for the job's files and merges it.
	pub(crate) async fn enrich(&self, remote: &dyn RemoteIssues, job: EnrichmentJob, token: &JobToken) -> Result<EnrichmentReport> {
		self.metrics.inc(|m| &m.enrichment_runs);
		let mut report = EnrichmentReport::default();

		let fetched = tokio::select! {
			biased;
			_ = token.cancelled() => return Err(AnalysisError::Cancelled),
			fetched = fetch_all(remote, &job) => fetched,
		};
		for file in &fetched {
			report.fetch_failures += usize::from(file.issues.is_none()) + usize::from(file.taint.is_none());
		}
		if report.fetch_failures > 0 {
			self.metrics.add(|m| &m.enrichment_failures, report.fetch_failures);
		}

		let _scope_guard = self.locks.lock(job.scope.clone()).await;
		for file in fetched {
			if token.is_cancelled() {
				return Err(AnalysisError::Cancelled);
			}
			let key = FileKey::new(job.scope.clone(), file.path);

			if let Some(records) = file.issues {
				let outcome = self.store.update_issues(&key, |issues| apply_server_findings(issues, &records));
				self.store.set_server_findings(&key, records);
				if let Some(outcome) = outcome {
					report.files += 1;
					report.matched += outcome.matched;
					report.updated += outcome.updated;
					if outcome.changed() {
						let stats = self.markers.render(&key, job.kind, &self.store.issues(&key), &job.filter);
						self.metrics.record_render(&stats);
					}
				}
			}

			if let Some(records) = file.taint {
				let taint = reconcile_taint(&self.store.taint(&key), &records);
				report.taint += taint.len();
				let stats = self.markers.render(&key, AnnotationKind::Taint, &taint, &job.filter);
				self.store.set_taint(&key, taint);
				self.metrics.record_render(&stats);
			}
		}
		tracing::trace!(scope = %job.scope, files = report.files, matched = report.matched, "analysis.enrichment.merged");
		Ok(report)
	}
}

async fn fetch_all(remote: &dyn RemoteIssues, job: &EnrichmentJob) -> Vec<Fetched> {
	let branch = job.binding.branch.as_str();
	let mut fetched = Vec::with_capacity(job.files.len());
	for path in &job.files {
		// Resolved records are always needed to learn resolution state.
		let issues = match remote.fetch_issues(&job.binding, branch, path, true).await {
			Ok(records) => Some(records),
			Err(err) => {
				tracing::warn!(scope = %job.scope, file = %path, error = %err, "Fetching server issues failed");
				None
			}
		};
		let taint = match remote.fetch_taint(&job.binding, branch, path, job.include_resolved_taint).await {
			Ok(records) => Some(records),
			Err(err) => {
				tracing::warn!(scope = %job.scope, file = %path, error = %err, "Fetching taint issues failed");
				None
			}
		};
		fetched.push(Fetched {
			path: path.clone(),
			issues,
			taint,
		});
	}
	fetched
}
