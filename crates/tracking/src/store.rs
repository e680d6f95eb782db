//! Tracked issue state per scope and file.
//!
//! The store is the single owner of tracked issues. Callers that need a
//! consistent read-modify-write cycle (tracking, enrichment) are expected to
//! hold their scope lock around it; the store itself only guarantees that
//! every individual call is atomic.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use sonde_primitives::{FileKey, RelPath, ScopeId};

use crate::issue::TrackedIssue;
use crate::server::ServerFinding;

/// Everything tracked for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileIssues {
	/// Locally detected issues, sorted by location.
	pub issues: Vec<TrackedIssue>,
	/// Latest remote records for the file, used by the server-key tier.
	pub server: Vec<ServerFinding>,
	/// Server-only taint issues.
	pub taint: Vec<TrackedIssue>,
	/// Analysis sequence number of the last applied commit.
	seq: u64,
}

impl FileIssues {
	pub const fn seq(&self) -> u64 {
		self.seq
	}
}

/// Result of [`IssueStore::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
	Applied,
	/// A newer analysis already committed for this file; nothing was written.
	Stale { current: u64 },
}

/// Tracked issues for every scope.
#[derive(Debug, Default)]
pub struct IssueStore {
	scopes: RwLock<FxHashMap<ScopeId, FxHashMap<RelPath, FileIssues>>>,
	/// Bumped on every mutation.
	version: AtomicU64,
}

impl IssueStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Monotonic change counter.
	pub fn version(&self) -> u64 {
		self.version.load(Ordering::Acquire)
	}

	pub fn file(&self, key: &FileKey) -> Option<FileIssues> {
		self.scopes.read().get(&key.scope)?.get(&key.path).cloned()
	}

	pub fn issues(&self, key: &FileKey) -> Vec<TrackedIssue> {
		self.read(key, |file| file.issues.clone()).unwrap_or_default()
	}

	pub fn server_findings(&self, key: &FileKey) -> Vec<ServerFinding> {
		self.read(key, |file| file.server.clone()).unwrap_or_default()
	}

	pub fn taint(&self, key: &FileKey) -> Vec<TrackedIssue> {
		self.read(key, |file| file.taint.clone()).unwrap_or_default()
	}

	/// Files with any tracked state in `scope`, sorted.
	pub fn files(&self, scope: &ScopeId) -> Vec<RelPath> {
		let mut files: Vec<RelPath> = self.scopes.read().get(scope).map(|files| files.keys().cloned().collect()).unwrap_or_default();
		files.sort();
		files
	}

	/// Replaces a file's tracked issues with the result of analysis `seq`.
	///
	/// Commits from a sequence older than the last applied one are rejected.
	pub fn commit(&self, key: &FileKey, seq: u64, issues: Vec<TrackedIssue>) -> CommitOutcome {
		let mut scopes = self.scopes.write();
		let file = scopes.entry(key.scope.clone()).or_default().entry(key.path.clone()).or_default();
		if seq < file.seq {
			tracing::debug!(file = %key, seq, current = file.seq, "store.commit_stale");
			return CommitOutcome::Stale { current: file.seq };
		}
		file.seq = seq;
		file.issues = issues;
		self.bump();
		CommitOutcome::Applied
	}

	/// Runs `f` over a file's tracked issues in place.
	///
	/// Returns `None` when the file has no tracked state.
	pub fn update_issues<R>(&self, key: &FileKey, f: impl FnOnce(&mut Vec<TrackedIssue>) -> R) -> Option<R> {
		let mut scopes = self.scopes.write();
		let file = scopes.get_mut(&key.scope)?.get_mut(&key.path)?;
		let result = f(&mut file.issues);
		self.bump();
		Some(result)
	}

	pub fn set_server_findings(&self, key: &FileKey, server: Vec<ServerFinding>) {
		self.write(key, |file| file.server = server);
	}

	pub fn set_taint(&self, key: &FileKey, taint: Vec<TrackedIssue>) {
		self.write(key, |file| file.taint = taint);
	}

	/// Forgets everything about a file.
	pub fn remove(&self, key: &FileKey) -> Option<FileIssues> {
		let mut scopes = self.scopes.write();
		let files = scopes.get_mut(&key.scope)?;
		let removed = files.remove(&key.path);
		if files.is_empty() {
			scopes.remove(&key.scope);
		}
		if removed.is_some() {
			self.bump();
		}
		removed
	}

	/// Forgets a whole scope, returning the files it held.
	pub fn remove_scope(&self, scope: &ScopeId) -> Vec<RelPath> {
		let Some(files) = self.scopes.write().remove(scope) else {
			return Vec::new();
		};
		self.bump();
		let mut paths: Vec<RelPath> = files.into_keys().collect();
		paths.sort();
		paths
	}

	fn read<R>(&self, key: &FileKey, f: impl FnOnce(&FileIssues) -> R) -> Option<R> {
		self.scopes.read().get(&key.scope)?.get(&key.path).map(f)
	}

	fn write(&self, key: &FileKey, f: impl FnOnce(&mut FileIssues)) {
		let mut scopes = self.scopes.write();
		f(scopes.entry(key.scope.clone()).or_default().entry(key.path.clone()).or_default());
		self.bump();
	}

	fn bump(&self) {
		self.version.fetch_add(1, Ordering::AcqRel);
	}
}
