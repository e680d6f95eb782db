//! Runtime counters for analysis runs.
//!
//! Counters use relaxed ordering: exact interleavings don't matter, totals do.

use std::sync::atomic::{AtomicU64, Ordering};

use sonde_markers::RenderStats;
use sonde_tracking::TrackingStats;

#[derive(Debug, Default)]
pub struct AnalysisMetrics {
	pub runs_started: AtomicU64,
	pub runs_completed: AtomicU64,
	pub runs_cancelled: AtomicU64,
	pub runs_failed: AtomicU64,
	pub runs_deferred: AtomicU64,
	pub files_analyzed: AtomicU64,
	pub files_excluded: AtomicU64,
	pub files_failed: AtomicU64,
	pub issues_created: AtomicU64,
	pub issues_matched: AtomicU64,
	pub issues_dropped: AtomicU64,
	pub stale_commits: AtomicU64,
	pub markers_mutated: AtomicU64,
	pub enrichment_runs: AtomicU64,
	pub enrichment_failures: AtomicU64,
}

/// Plain copy of [`AnalysisMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
	pub runs_started: u64,
	pub runs_completed: u64,
	pub runs_cancelled: u64,
	pub runs_failed: u64,
	pub runs_deferred: u64,
	pub files_analyzed: u64,
	pub files_excluded: u64,
	pub files_failed: u64,
	pub issues_created: u64,
	pub issues_matched: u64,
	pub issues_dropped: u64,
	pub stale_commits: u64,
	pub markers_mutated: u64,
	pub enrichment_runs: u64,
	pub enrichment_failures: u64,
}

fn bump(counter: &AtomicU64, by: u64) {
	counter.fetch_add(by, Ordering::Relaxed);
}

impl AnalysisMetrics {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn inc(&self, counter: impl Fn(&Self) -> &AtomicU64) {
		bump(counter(self), 1);
	}

	pub fn add(&self, counter: impl Fn(&Self) -> &AtomicU64, by: usize) {
		bump(counter(self), by as u64);
	}

	pub fn record_tracking(&self, stats: &TrackingStats) {
		bump(&self.issues_created, stats.created as u64);
		bump(&self.issues_matched, stats.matched() as u64);
		bump(&self.issues_dropped, stats.dropped as u64);
	}

	pub fn record_render(&self, stats: &RenderStats) {
		bump(&self.markers_mutated, stats.mutations() as u64);
	}

	pub fn snapshot(&self) -> MetricsSnapshot {
		let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
		MetricsSnapshot {
			runs_started: get(&self.runs_started),
			runs_completed: get(&self.runs_completed),
			runs_cancelled: get(&self.runs_cancelled),
			runs_failed: get(&self.runs_failed),
			runs_deferred: get(&self.runs_deferred),
			files_analyzed: get(&self.files_analyzed),
			files_excluded: get(&self.files_excluded),
			files_failed: get(&self.files_failed),
			issues_created: get(&self.issues_created),
			issues_matched: get(&self.issues_matched),
			issues_dropped: get(&self.issues_dropped),
			stale_commits: get(&self.stale_commits),
			markers_mutated: get(&self.markers_mutated),
			enrichment_runs: get(&self.enrichment_runs),
			enrichment_failures: get(&self.enrichment_failures),
		}
	}
}
