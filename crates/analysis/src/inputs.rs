//! Engine input construction.
//!
//! Every eligible file becomes an [`InputFile`] plus the [`SourceText`] its
//! findings are hashed against. Content comes from, in order: the request's
//! snapshot, the host's open document, the local file, or a temporary copy of
//! a non-local file.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use globset::GlobSet;
use rustc_hash::FxHashMap;
use serde::Serialize;
use sonde_primitives::{FileKey, RelPath, Rope, ScopeId};
use sonde_tracking::SourceText;
use tempfile::TempDir;

use crate::error::AnalysisError;
use crate::exclusions::compile_globset;
use crate::host::HostFiles;
use crate::request::FileRequest;

/// Where the engine reads a file's content from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentSource {
	File { path: PathBuf },
	Inline { text: String },
}

/// One file descriptor of an engine request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputFile {
	pub path: RelPath,
	pub source: ContentSource,
	pub is_test: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub language: Option<String>,
}

/// Extension to language-key table.
#[derive(Debug, Clone)]
pub struct LanguageTable {
	by_extension: BTreeMap<String, String>,
}

const BUILTIN_LANGUAGES: &[(&str, &str)] = &[
	("c", "c"),
	("cc", "cpp"),
	("cpp", "cpp"),
	("cs", "cs"),
	("css", "css"),
	("go", "go"),
	("h", "c"),
	("hpp", "cpp"),
	("html", "web"),
	("java", "java"),
	("js", "js"),
	("jsx", "js"),
	("kt", "kotlin"),
	("php", "php"),
	("py", "py"),
	("rb", "ruby"),
	("scala", "scala"),
	("ts", "ts"),
	("tsx", "ts"),
	("xml", "xml"),
	("yaml", "yaml"),
	("yml", "yaml"),
];

impl LanguageTable {
	/// Built-in table with `overrides` applied on top.
	pub fn new(overrides: &BTreeMap<String, String>) -> Self {
		let mut by_extension: BTreeMap<String, String> =
			BUILTIN_LANGUAGES.iter().map(|(ext, lang)| (ext.to_string(), lang.to_string())).collect();
		for (ext, lang) in overrides {
			by_extension.insert(ext.trim_start_matches('.').to_ascii_lowercase(), lang.clone());
		}
		Self { by_extension }
	}

	pub fn language_of(&self, path: &RelPath) -> Option<&str> {
		let ext = path.extension()?.to_ascii_lowercase();
		self.by_extension.get(&ext).map(String::as_str)
	}
}

impl Default for LanguageTable {
	fn default() -> Self {
		Self::new(&BTreeMap::new())
	}
}

/// Classifies files as test code.
#[derive(Debug, Clone)]
pub struct TestClassifier {
	patterns: GlobSet,
}

impl TestClassifier {
	pub fn new(patterns: &[String]) -> Self {
		Self {
			patterns: compile_globset(patterns),
		}
	}

	pub fn is_test(&self, path: &RelPath) -> bool {
		self.patterns.is_match(path.as_str())
	}
}

/// Engine inputs of one run.
///
/// Holds the temporary directory of materialized copies, which is removed
/// when this value is dropped.
#[derive(Debug, Default)]
pub struct PreparedInputs {
	pub files: Vec<InputFile>,
	pub sources: FxHashMap<RelPath, SourceText>,
	/// Files that could not be prepared.
	pub dropped: Vec<AnalysisError>,
	temp: Option<TempDir>,
}

impl PreparedInputs {
	/// Removes files the engine refused, returning how many were removed.
	pub fn retain(&mut self, keep: impl Fn(&RelPath) -> bool) -> usize {
		let before = self.files.len();
		self.files.retain(|file| keep(&file.path));
		self.sources.retain(|path, _| keep(path));
		before - self.files.len()
	}

	pub fn is_empty(&self) -> bool {
		self.files.is_empty()
	}

	pub fn paths(&self) -> Vec<RelPath> {
		self.files.iter().map(|file| file.path.clone()).collect()
	}
}

/// Builds engine inputs. Blocking; run it on the blocking pool.
pub fn prepare(
	host: &dyn HostFiles,
	scope: &ScopeId,
	files: Vec<FileRequest>,
	languages: &LanguageTable,
	tests: &TestClassifier,
) -> PreparedInputs {
	let mut prepared = PreparedInputs::default();
	for request in files {
		let key = FileKey::new(scope.clone(), request.path.clone());
		match resolve(host, &key, request.snapshot, &mut prepared.temp) {
			Ok((source, text)) => {
				prepared.files.push(InputFile {
					language: languages.language_of(&request.path).map(str::to_string),
					is_test: tests.is_test(&request.path),
					path: request.path.clone(),
					source,
				});
				prepared.sources.insert(request.path, text);
			}
			Err(err) => {
				tracing::warn!(file = %key, error = %err, "Dropping file from analysis");
				prepared.dropped.push(AnalysisError::configuration(&request.path, err));
			}
		}
	}
	prepared
}

fn resolve(host: &dyn HostFiles, key: &FileKey, snapshot: Option<Rope>, temp: &mut Option<TempDir>) -> io::Result<(ContentSource, SourceText)> {
	if !key.path.is_contained() {
		return Err(io::Error::new(io::ErrorKind::InvalidInput, "path leaves the scope root"));
	}
	if let Some(rope) = snapshot.or_else(|| host.open_document(key)) {
		let text = rope.to_string();
		return Ok((ContentSource::Inline { text }, SourceText::new(rope)));
	}
	if let Some(path) = host.local_path(key) {
		let text = std::fs::read_to_string(&path)?;
		return Ok((ContentSource::File { path }, SourceText::from(text.as_str())));
	}

	let text = host.read(key)?;
	let dir = match temp.take() {
		Some(dir) => dir,
		None => tempfile::Builder::new().prefix("sonde-inputs-").tempdir()?,
	};
	let path = dir.path().join(key.path.as_str());
	*temp = Some(dir);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	std::fs::write(&path, &text)?;
	Ok((ContentSource::File { path }, SourceText::from(text.as_str())))
}
