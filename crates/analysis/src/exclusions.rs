//! Partitioning of requested files into eligible and excluded.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use sonde_primitives::RelPath;

/// Why a file is not analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
	/// Matched a configured exclusion pattern.
	Pattern,
	/// Ignored by version control.
	VcsIgnored,
}

/// Answers whether version control ignores a file.
pub trait IgnoreOracle: Send + Sync {
	fn is_ignored(&self, path: &RelPath) -> bool;
}

/// `.gitignore` rules found at a scope's base directory.
pub struct GitignoreOracle {
	root: PathBuf,
	rules: Gitignore,
}

impl GitignoreOracle {
	/// Reads `<root>/.gitignore` and `<root>/.git/info/exclude`.
	///
	/// Unreadable or malformed files are logged and skipped.
	pub fn load(root: &Path) -> Self {
		let mut builder = GitignoreBuilder::new(root);
		for candidate in [root.join(".gitignore"), root.join(".git").join("info").join("exclude")] {
			if candidate.is_file()
				&& let Some(err) = builder.add(&candidate)
			{
				tracing::warn!(path = %candidate.display(), error = %err, "Skipping unreadable ignore file");
			}
		}
		let rules = builder.build().unwrap_or_else(|err| {
			tracing::warn!(root = %root.display(), error = %err, "Ignoring malformed VCS ignore rules");
			Gitignore::empty()
		});
		Self {
			root: root.to_path_buf(),
			rules,
		}
	}
}

impl IgnoreOracle for GitignoreOracle {
	fn is_ignored(&self, path: &RelPath) -> bool {
		self.rules.matched_path_or_any_parents(self.root.join(path.as_str()), false).is_ignore()
	}
}

/// Exclusion rules of one run.
pub struct Exclusions {
	patterns: GlobSet,
	vcs: Option<Box<dyn IgnoreOracle>>,
}

impl Exclusions {
	/// Compiles `patterns`; invalid globs are logged and skipped.
	pub fn new(patterns: &[String], vcs: Option<Box<dyn IgnoreOracle>>) -> Self {
		Self {
			patterns: compile_globset(patterns),
			vcs,
		}
	}

	pub fn reason(&self, path: &RelPath) -> Option<ExclusionReason> {
		if self.patterns.is_match(path.as_str()) {
			return Some(ExclusionReason::Pattern);
		}
		if self.vcs.as_ref().is_some_and(|vcs| vcs.is_ignored(path)) {
			return Some(ExclusionReason::VcsIgnored);
		}
		None
	}

	/// Splits `items` by whether their path is excluded, keeping order.
	pub fn partition<T>(&self, items: Vec<T>, path: impl Fn(&T) -> &RelPath) -> (Vec<T>, Vec<(T, ExclusionReason)>) {
		let mut eligible = Vec::with_capacity(items.len());
		let mut excluded = Vec::new();
		for item in items {
			match self.reason(path(&item)) {
				Some(reason) => excluded.push((item, reason)),
				None => eligible.push(item),
			}
		}
		(eligible, excluded)
	}
}

/// Compiles glob patterns, skipping invalid ones.
pub(crate) fn compile_globset(patterns: &[String]) -> GlobSet {
	let mut builder = GlobSetBuilder::new();
	for pattern in patterns {
		match Glob::new(pattern) {
			Ok(glob) => {
				builder.add(glob);
			}
			Err(err) => tracing::warn!(pattern = %pattern, error = %err, "Skipping invalid glob pattern"),
		}
	}
	builder.build().unwrap_or_else(|err| {
		tracing::warn!(error = %err, "Glob set failed to build, matching nothing");
		GlobSet::empty()
	})
}
