use sonde_primitives::{FileKey, RelPath, Rope, ScopeId};

use crate::trigger::TriggerKind;

/// One file to analyze, with the editor content when it is open.
#[derive(Debug, Clone)]
pub struct FileRequest {
	pub path: RelPath,
	/// In-memory document content; preferred over the file on disk.
	pub snapshot: Option<Rope>,
}

impl FileRequest {
	pub fn on_disk(path: impl Into<RelPath>) -> Self {
		Self {
			path: path.into(),
			snapshot: None,
		}
	}

	pub fn with_snapshot(path: impl Into<RelPath>, snapshot: Rope) -> Self {
		Self {
			path: path.into(),
			snapshot: Some(snapshot),
		}
	}
}

/// A request to analyze files of one configuration scope.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
	pub scope: ScopeId,
	pub files: Vec<FileRequest>,
	pub trigger: TriggerKind,
	/// Delete the scope's report annotations before running.
	pub clear_report: bool,
}

impl AnalysisRequest {
	pub fn new(scope: impl Into<ScopeId>, trigger: TriggerKind) -> Self {
		Self {
			scope: scope.into(),
			files: Vec::new(),
			trigger,
			clear_report: false,
		}
	}

	pub fn file(mut self, path: impl Into<RelPath>) -> Self {
		self.push(FileRequest::on_disk(path));
		self
	}

	pub fn files<P: Into<RelPath>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
		for path in paths {
			self.push(FileRequest::on_disk(path));
		}
		self
	}

	pub fn document(mut self, path: impl Into<RelPath>, snapshot: Rope) -> Self {
		self.push(FileRequest::with_snapshot(path, snapshot));
		self
	}

	pub fn clearing_report(mut self) -> Self {
		self.clear_report = true;
		self
	}

	/// Adds a file, replacing an earlier entry for the same path.
	pub fn push(&mut self, file: FileRequest) {
		match self.files.iter_mut().find(|existing| existing.path == file.path) {
			Some(existing) => *existing = file,
			None => self.files.push(file),
		}
	}

	/// Folds a later request for the same scope into this one.
	///
	/// Files are unioned, later snapshots win, and the later trigger is kept.
	pub fn absorb(&mut self, later: Self) {
		debug_assert_eq!(self.scope, later.scope);
		for file in later.files {
			self.push(file);
		}
		self.trigger = later.trigger;
		self.clear_report |= later.clear_report;
	}

	pub fn keys(&self) -> impl Iterator<Item = FileKey> + '_ {
		self.files.iter().map(|file| FileKey::new(self.scope.clone(), file.path.clone()))
	}

	pub fn paths(&self) -> Vec<RelPath> {
		self.files.iter().map(|file| file.path.clone()).collect()
	}
}
