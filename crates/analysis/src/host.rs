//! Host file and document access.

use std::io;
use std::path::PathBuf;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use sonde_primitives::{FileKey, Rope, ScopeId};

use crate::exclusions::{GitignoreOracle, IgnoreOracle};

/// The host's view of files and open documents.
///
/// Calls may block on I/O; the pipeline only invokes them from the blocking
/// pool.
pub trait HostFiles: Send + Sync {
	/// Base directory the engine resolves a scope's files against.
	fn base_dir(&self, scope: &ScopeId) -> Option<PathBuf>;

	/// Content of the file's open editor buffer, if any.
	fn open_document(&self, _file: &FileKey) -> Option<Rope> {
		None
	}

	/// Path on the local filesystem; `None` for files the engine cannot read
	/// directly.
	fn local_path(&self, file: &FileKey) -> Option<PathBuf>;

	/// Content of a file without a local path.
	fn read(&self, file: &FileKey) -> io::Result<String>;

	/// Version-control ignore rules for a scope.
	fn ignore_oracle(&self, scope: &ScopeId) -> Option<Box<dyn IgnoreOracle>> {
		self.base_dir(scope)
			.map(|root| Box::new(GitignoreOracle::load(&root)) as Box<dyn IgnoreOracle>)
	}
}

/// Host backed by local directories, one per scope, plus open documents.
#[derive(Debug, Default)]
pub struct LocalFiles {
	roots: RwLock<FxHashMap<ScopeId, PathBuf>>,
	documents: RwLock<FxHashMap<FileKey, Rope>>,
}

impl LocalFiles {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_scope(self, scope: impl Into<ScopeId>, root: impl Into<PathBuf>) -> Self {
		self.add_scope(scope, root);
		self
	}

	pub fn add_scope(&self, scope: impl Into<ScopeId>, root: impl Into<PathBuf>) {
		self.roots.write().insert(scope.into(), root.into());
	}

	pub fn open(&self, file: FileKey, content: Rope) {
		self.documents.write().insert(file, content);
	}

	pub fn close(&self, file: &FileKey) -> Option<Rope> {
		self.documents.write().remove(file)
	}
}

impl HostFiles for LocalFiles {
	fn base_dir(&self, scope: &ScopeId) -> Option<PathBuf> {
		self.roots.read().get(scope).cloned()
	}

	fn open_document(&self, file: &FileKey) -> Option<Rope> {
		self.documents.read().get(file).cloned()
	}

	fn local_path(&self, file: &FileKey) -> Option<PathBuf> {
		if !file.path.is_contained() {
			return None;
		}
		self.base_dir(&file.scope).map(|root| root.join(file.path.as_str()))
	}

	fn read(&self, file: &FileKey) -> io::Result<String> {
		match self.local_path(file) {
			Some(path) => std::fs::read_to_string(path),
			None => Err(io::Error::new(io::ErrorKind::NotFound, format!("{} is not under a scope root", file))),
		}
	}
}
