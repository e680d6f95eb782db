//! Scripted adapters shared by the orchestrator integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use sonde_analysis::{
	AnalysisEngine, CancellationToken, ContentSource, EngineError, EngineRequest, EngineResponse, FileFindings, LocalFiles, Orchestrator,
	RemoteBinding, RemoteError, RemoteIssues, Settings, SettingsError, SettingsSource,
};
use sonde_markers::{Annotation, ChildAnnotation, MarkerId, RenderSink};
use sonde_primitives::{FileKey, RelPath, ScopeId, Severity, TextRange};
use sonde_tracking::{RawFinding, ServerFinding, checksum};
use tempfile::TempDir;
use tokio::sync::Notify;

pub const RULE: &str = "todo:fixme";
pub const SCOPE: &str = "proj";

/// Engine reporting one finding per `FIXME` occurrence.
#[derive(Default)]
pub struct ScriptedEngine {
	calls: AtomicUsize,
	in_engine: AtomicUsize,
	requests: Mutex<Vec<Vec<RelPath>>>,
	gate: Mutex<Option<Arc<Notify>>>,
	errors: Mutex<VecDeque<EngineError>>,
	failed_files: Mutex<BTreeSet<RelPath>>,
	refuse: Mutex<Vec<RelPath>>,
}

impl ScriptedEngine {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Makes every following call wait for a permit on the returned gate.
	pub fn hold(&self) -> Arc<Notify> {
		let gate = Arc::new(Notify::new());
		*self.gate.lock() = Some(gate.clone());
		gate
	}

	pub fn fail_next(&self, err: EngineError) {
		self.errors.lock().push_back(err);
	}

	pub fn fail_on(&self, path: &str) {
		self.failed_files.lock().insert(path.into());
	}

	/// Refuses the given files once with `CannotAnalyze`.
	pub fn refuse_once(&self, paths: &[&str]) {
		*self.refuse.lock() = paths.iter().map(|p| RelPath::from(*p)).collect();
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn in_engine(&self) -> usize {
		self.in_engine.load(Ordering::SeqCst)
	}

	pub fn requests(&self) -> Vec<Vec<RelPath>> {
		self.requests.lock().clone()
	}

	fn findings_for(text: &str) -> Vec<RawFinding> {
		let mut out = Vec::new();
		for (idx, line) in text.lines().enumerate() {
			if let Some(col) = line.find("FIXME") {
				let col = col as u32;
				out.push(RawFinding::new(
					RULE,
					"Take the required action to fix the issue indicated by this comment.",
					Severity::Major,
					Some(TextRange::new(idx as u32 + 1, col, idx as u32 + 1, col + 5)),
				));
			}
		}
		out
	}
}

struct Entered<'a>(&'a AtomicUsize);

impl Drop for Entered<'_> {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

#[async_trait]
impl AnalysisEngine for ScriptedEngine {
	async fn analyze(&self, request: EngineRequest, cancel: CancellationToken) -> Result<EngineResponse, EngineError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.in_engine.fetch_add(1, Ordering::SeqCst);
		let _entered = Entered(&self.in_engine);
		self.requests.lock().push(request.files.iter().map(|f| f.path.clone()).collect());

		if let Some(err) = self.errors.lock().pop_front() {
			return Err(err);
		}
		let refused: Vec<RelPath> = {
			let mut refuse = self.refuse.lock();
			let hit: Vec<RelPath> = request.files.iter().map(|f| f.path.clone()).filter(|p| refuse.contains(p)).collect();
			if !hit.is_empty() {
				refuse.clear();
			}
			hit
		};
		if !refused.is_empty() {
			return Err(EngineError::CannotAnalyze {
				files: refused,
				reason: "missing build output".into(),
			});
		}

		let gate = self.gate.lock().clone();
		if let Some(gate) = gate {
			tokio::select! {
				_ = cancel.cancelled() => return Err(EngineError::Cancelled),
				_ = gate.notified() => {}
			}
		}

		let failed = self.failed_files.lock().clone();
		let mut response = EngineResponse::default();
		for file in &request.files {
			if failed.contains(&file.path) {
				response.failed_files.insert(file.path.clone());
				continue;
			}
			let text = match &file.source {
				ContentSource::Inline { text } => text.clone(),
				ContentSource::File { path } => std::fs::read_to_string(path).map_err(|e| EngineError::Failed(e.to_string()))?,
			};
			response.per_file.push(FileFindings {
				path: file.path.clone(),
				findings: Self::findings_for(&text),
			});
		}
		Ok(response)
	}
}

/// One call received by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
	Create { file: FileKey, marker: MarkerId },
	Update { file: FileKey, marker: MarkerId },
	Delete { file: FileKey, marker: MarkerId },
	Children { file: FileKey, parent: MarkerId, count: usize },
}

impl SinkEvent {
	pub fn is_mutation(&self) -> bool {
		!matches!(self, Self::Children { .. })
	}
}

/// Sink recording every call and the annotations currently shown.
#[derive(Default)]
pub struct RecordingSink {
	next: AtomicU64,
	events: Mutex<Vec<SinkEvent>>,
	live: Mutex<FxHashMap<MarkerId, (FileKey, Annotation)>>,
}

impl RecordingSink {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn events(&self) -> Vec<SinkEvent> {
		self.events.lock().clone()
	}

	pub fn mutations(&self) -> usize {
		self.events.lock().iter().filter(|e| e.is_mutation()).count()
	}

	/// Annotations shown for `file`, ordered by start line.
	pub fn live(&self, file: &FileKey) -> Vec<Annotation> {
		let mut out: Vec<Annotation> = self
			.live
			.lock()
			.values()
			.filter(|(key, _)| key == file)
			.map(|(_, annotation)| annotation.clone())
			.collect();
		out.sort_by_key(|a| (a.kind, a.range.map(|r| r.start_line)));
		out
	}
}

impl RenderSink for RecordingSink {
	fn create(&self, file: &FileKey, annotation: &Annotation) -> MarkerId {
		let marker = MarkerId(self.next.fetch_add(1, Ordering::SeqCst));
		self.live.lock().insert(marker, (file.clone(), annotation.clone()));
		self.events.lock().push(SinkEvent::Create { file: file.clone(), marker });
		marker
	}

	fn update(&self, file: &FileKey, marker: MarkerId, annotation: &Annotation) {
		self.live.lock().insert(marker, (file.clone(), annotation.clone()));
		self.events.lock().push(SinkEvent::Update { file: file.clone(), marker });
	}

	fn delete(&self, file: &FileKey, marker: MarkerId) {
		self.live.lock().remove(&marker);
		self.events.lock().push(SinkEvent::Delete { file: file.clone(), marker });
	}

	fn set_children(&self, file: &FileKey, parent: MarkerId, children: &[ChildAnnotation]) {
		self.events.lock().push(SinkEvent::Children {
			file: file.clone(),
			parent,
			count: children.len(),
		});
	}
}

/// Latch that stays open once opened.
#[derive(Default)]
pub struct Gate {
	open: AtomicBool,
	notify: Notify,
}

impl Gate {
	pub fn open(&self) {
		self.open.store(true, Ordering::SeqCst);
		self.notify.notify_waiters();
	}

	pub async fn wait(&self) {
		loop {
			let notified = self.notify.notified();
			if self.open.load(Ordering::SeqCst) {
				return;
			}
			notified.await;
		}
	}
}

/// Remote facade serving fixed records.
#[derive(Default)]
pub struct ScriptedRemote {
	issues: Mutex<Vec<ServerFinding>>,
	taint: Mutex<Vec<ServerFinding>>,
	gate: Mutex<Option<Arc<Gate>>>,
	unreachable: AtomicBool,
	fetches: AtomicUsize,
}

impl ScriptedRemote {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn add_issue(&self, record: ServerFinding) {
		self.issues.lock().push(record);
	}

	pub fn add_taint(&self, record: ServerFinding) {
		self.taint.lock().push(record);
	}

	/// Makes fetches wait until the returned gate is opened.
	pub fn hold(&self) -> Arc<Gate> {
		let gate = Arc::new(Gate::default());
		*self.gate.lock() = Some(gate.clone());
		gate
	}

	pub fn set_unreachable(&self, unreachable: bool) {
		self.unreachable.store(unreachable, Ordering::SeqCst);
	}

	pub fn fetches(&self) -> usize {
		self.fetches.load(Ordering::SeqCst)
	}

	async fn serve(&self, records: &Mutex<Vec<ServerFinding>>, path: &RelPath, include_resolved: bool) -> Result<Vec<ServerFinding>, RemoteError> {
		self.fetches.fetch_add(1, Ordering::SeqCst);
		let gate = self.gate.lock().clone();
		if let Some(gate) = gate {
			gate.wait().await;
		}
		if self.unreachable.load(Ordering::SeqCst) {
			return Err(RemoteError::Unreachable("connection refused".into()));
		}
		Ok(records
			.lock()
			.iter()
			.filter(|r| &r.path == path && (include_resolved || !r.resolved))
			.cloned()
			.collect())
	}
}

#[async_trait]
impl RemoteIssues for ScriptedRemote {
	async fn fetch_issues(&self, _binding: &RemoteBinding, _branch: &str, path: &RelPath, include_resolved: bool) -> Result<Vec<ServerFinding>, RemoteError> {
		self.serve(&self.issues, path, include_resolved).await
	}

	async fn fetch_taint(&self, _binding: &RemoteBinding, _branch: &str, path: &RelPath, include_resolved: bool) -> Result<Vec<ServerFinding>, RemoteError> {
		self.serve(&self.taint, path, include_resolved).await
	}
}

/// A server record for the `FIXME` on `line` of `path`.
pub fn fixme_record(key: &str, path: &str, line: u32, line_text: &str, resolved: bool) -> ServerFinding {
	let col = line_text.find("FIXME").unwrap_or(0) as u32;
	ServerFinding {
		key: key.to_string(),
		rule_key: RULE.to_string(),
		message: "Take the required action to fix the issue indicated by this comment.".to_string(),
		severity: Severity::Major,
		issue_type: Default::default(),
		path: path.into(),
		text_range: Some(TextRange::new(line, col, line, col + 5)),
		line_hash: Some(checksum(line_text)),
		text_range_hash: Some(checksum("FIXME")),
		creation_date: server_epoch(),
		resolved,
		flows: Vec::new(),
	}
}

pub fn server_epoch() -> DateTime<Utc> {
	Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).single().unwrap()
}

pub fn bound_settings() -> Settings {
	Settings {
		remote: Some(RemoteBinding {
			connection_id: "server".into(),
			project_key: "org:proj".into(),
			branch: "main".into(),
		}),
		..Settings::default()
	}
}

/// Settings that tests can change between runs.
#[derive(Default)]
pub struct SharedSettings(Mutex<Settings>);

impl SharedSettings {
	pub fn new(settings: Settings) -> Arc<Self> {
		Arc::new(Self(Mutex::new(settings)))
	}

	pub fn update(&self, f: impl FnOnce(&mut Settings)) {
		f(&mut self.0.lock());
	}
}

impl SettingsSource for SharedSettings {
	fn settings(&self, _scope: &ScopeId) -> Result<Settings, SettingsError> {
		Ok(self.0.lock().clone())
	}
}

/// A scope directory on disk.
pub struct Workspace {
	pub dir: TempDir,
	pub host: Arc<LocalFiles>,
}

impl Workspace {
	pub fn new() -> Self {
		Self::with_scopes(&[SCOPE])
	}

	/// One subdirectory per scope.
	pub fn with_scopes(scopes: &[&str]) -> Self {
		let _ = tracing_subscriber::fmt::try_init();
		let dir = tempfile::tempdir().expect("failed to create temp dir");
		let host = LocalFiles::new();
		for scope in scopes {
			let root = dir.path().join(scope);
			std::fs::create_dir_all(&root).unwrap();
			host.add_scope(*scope, root);
		}
		Self { dir, host: Arc::new(host) }
	}

	pub fn root(&self, scope: &str) -> std::path::PathBuf {
		self.dir.path().join(scope)
	}

	pub fn write(&self, scope: &str, path: &str, text: &str) {
		let full = self.root(scope).join(path);
		if let Some(parent) = Path::new(&full).parent() {
			std::fs::create_dir_all(parent).unwrap();
		}
		std::fs::write(full, text).unwrap();
	}
}

pub fn key(path: &str) -> FileKey {
	FileKey::new(SCOPE, path)
}

/// Builds a ready orchestrator over `workspace` with a recording sink.
pub async fn orchestrator(
	workspace: &Workspace,
	engine: Arc<ScriptedEngine>,
	settings: Settings,
	remote: Option<Arc<ScriptedRemote>>,
) -> (Orchestrator, Arc<RecordingSink>) {
	let sink = RecordingSink::new();
	let mut builder = Orchestrator::builder(engine, workspace.host.clone()).settings(settings).sink(sink.clone());
	if let Some(remote) = remote {
		builder = builder.remote(remote);
	}
	let orchestrator = builder.build();
	orchestrator.set_ready(SCOPE, true).await;
	(orchestrator, sink)
}

/// Polls a condition with a timeout.
pub async fn wait_until<F>(timeout: Duration, mut f: F) -> bool
where
	F: FnMut() -> bool,
{
	let start = std::time::Instant::now();
	while start.elapsed() < timeout {
		if f() {
			return true;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	false
}
