use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use sonde_analysis::{
	AnalysisConfigurator, AnalysisListener, AnalysisRequest, AnalysisResult, CancelReason, DrainBudget, EngineError, HostUi, Orchestrator,
	Properties, ReadinessCache, RunStatus, Settings, TriggerKind,
};
use sonde_markers::AnnotationKind;
use sonde_primitives::{RelPath, ScopeId};

use crate::common::{RecordingSink, SCOPE, ScriptedEngine, SharedSettings, Workspace, key, orchestrator};

const NOT_READY: RunStatus = RunStatus::Cancelled {
	reason: CancelReason::NotReady,
};

#[tokio::test]
async fn unready_scope_defers_and_replays() {
	let ws = Workspace::new();
	ws.write(SCOPE, "a.py", "# FIXME\n");
	ws.write(SCOPE, "b.py", "# FIXME\n");
	let engine = ScriptedEngine::new();
	let orch = Orchestrator::builder(engine.clone(), ws.host.clone()).build();

	let first = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).file("a.py")).await;
	let second = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).file("b.py")).await;
	assert_eq!(first.status, NOT_READY);
	assert_eq!(second.status, NOT_READY);
	assert_eq!(engine.calls(), 0);
	assert_eq!(orch.metrics().runs_deferred, 2);

	let deferred = orch.deferred(&SCOPE.into()).expect("request deferred");
	assert_eq!(deferred.paths(), vec![RelPath::from("a.py"), RelPath::from("b.py")]);

	let replay = orch.set_ready(SCOPE, true).await.expect("deferred request replayed");
	let result = replay.join().await;
	assert_eq!(result.status, RunStatus::Completed);
	assert_eq!(result.trigger, TriggerKind::ReadinessChange);
	assert_eq!(result.analyzed.len(), 2);
	assert!(orch.deferred(&SCOPE.into()).is_none());
}

/// Publishes readiness straight to the shared cache as soon as a run reports
/// the scope not ready, the way a backend finishing its startup would.
struct ReadyOnDeferral {
	cache: Arc<ReadinessCache>,
}

impl AnalysisListener for ReadyOnDeferral {
	fn on_analysis_done(&self, result: &AnalysisResult) {
		if result.status == NOT_READY {
			self.cache.set_ready(&result.scope, true);
		}
	}
}

#[tokio::test]
async fn replay_dispatched_from_a_job_completes_within_drain() {
	let ws = Workspace::new();
	ws.write(SCOPE, "a.py", "# FIXME\n");
	let engine = ScriptedEngine::new();
	let cache = Arc::new(ReadinessCache::new());
	let orch = Orchestrator::builder(engine.clone(), ws.host.clone())
		.readiness(cache.clone())
		.listener(Arc::new(ReadyOnDeferral { cache: cache.clone() }))
		.build();

	let handle = orch.submit(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).file("a.py")).await;
	let started = Instant::now();
	let report = orch.drain(DrainBudget::new(Duration::from_secs(5), 16)).await;

	assert!(started.elapsed() < Duration::from_secs(2), "drain stalled for {:?}", started.elapsed());
	assert!(report.is_idle());
	assert_eq!(report.completed, 2);
	assert_eq!(handle.join().await.status, NOT_READY);
	assert_eq!(engine.calls(), 1);
	assert_eq!(orch.tracked_issues(&key("a.py")).len(), 1);
	assert!(orch.deferred(&SCOPE.into()).is_none());
}

#[tokio::test]
async fn multi_scope_request_waits_for_every_scope() {
	let ws = Workspace::with_scopes(&["left", "right"]);
	ws.write("left", "a.py", "# FIXME\n");
	ws.write("right", "a.py", "# FIXME\n");
	let engine = ScriptedEngine::new();
	let orch = Orchestrator::builder(engine.clone(), ws.host.clone()).build();
	orch.set_ready("left", true).await;

	let requests = vec![
		AnalysisRequest::new("left", TriggerKind::ConfigChange).file("a.py"),
		AnalysisRequest::new("right", TriggerKind::ConfigChange).file("a.py"),
	];
	let results = orch.analyze_all(requests.clone()).await;
	assert!(results.iter().all(|r| r.status == NOT_READY));
	assert_eq!(engine.calls(), 0);

	orch.set_ready("right", true).await.expect("right replayed").join().await;
	let results = orch.analyze_all(requests).await;
	assert!(results.iter().all(|r| r.status.is_completed()));
}

#[tokio::test]
async fn excluded_files_are_cleared_before_the_engine_runs() {
	let ws = Workspace::new();
	ws.write(SCOPE, "gen/schema.py", "# FIXME\n");
	ws.write(SCOPE, "app.py", "# FIXME\n");
	let engine = ScriptedEngine::new();
	let settings = SharedSettings::new(Settings::default());
	let sink = RecordingSink::new();
	let orch = Orchestrator::builder(engine.clone(), ws.host.clone())
		.settings_source(settings.clone())
		.sink(sink.clone())
		.build();
	orch.set_ready(SCOPE, true).await;
	orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).files(["gen/schema.py", "app.py"])).await;
	assert_eq!(sink.live(&key("gen/schema.py")).len(), 1);

	settings.update(|s| s.exclusions = vec!["gen/**".into()]);
	engine.fail_next(EngineError::Failed("out of memory".into()));
	let result = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::ConfigChange).files(["gen/schema.py", "app.py"])).await;

	assert!(result.status.is_failed());
	assert_eq!(result.excluded, vec![RelPath::from("gen/schema.py")]);
	assert!(sink.live(&key("gen/schema.py")).is_empty());
	assert!(orch.tracked_issues(&key("gen/schema.py")).is_empty());
	assert_eq!(sink.live(&key("app.py")).len(), 1);
	assert_eq!(engine.requests().last(), Some(&vec![RelPath::from("app.py")]));
}

#[tokio::test]
async fn vcs_ignored_files_never_reach_the_engine() {
	let ws = Workspace::new();
	ws.write(SCOPE, ".gitignore", "build/\n");
	ws.write(SCOPE, "build/out.py", "# FIXME\n");
	ws.write(SCOPE, "src.py", "# FIXME\n");
	let engine = ScriptedEngine::new();
	let (orch, _sink) = orchestrator(&ws, engine.clone(), Settings::default(), None).await;

	let result = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).files(["build/out.py", "src.py"])).await;
	assert_eq!(result.excluded, vec![RelPath::from("build/out.py")]);
	assert_eq!(engine.requests(), vec![vec![RelPath::from("src.py")]]);
	assert_eq!(orch.metrics().files_excluded, 1);
}

#[tokio::test]
async fn refused_files_are_dropped_and_the_rest_analyzed() {
	let ws = Workspace::new();
	ws.write(SCOPE, "a.c", "/* FIXME */\n");
	ws.write(SCOPE, "b.c", "/* FIXME */\n");
	let engine = ScriptedEngine::new();
	let (orch, _sink) = orchestrator(&ws, engine.clone(), Settings::default(), None).await;
	engine.refuse_once(&["b.c"]);

	let result = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).files(["a.c", "b.c"])).await;
	assert_eq!(result.status, RunStatus::Completed);
	assert_eq!(result.analyzed, vec![RelPath::from("a.c")]);
	assert_eq!(result.dropped, vec![RelPath::from("b.c")]);
	assert_eq!(engine.calls(), 2);
}

#[tokio::test]
async fn missing_file_is_dropped_not_fatal() {
	let ws = Workspace::new();
	ws.write(SCOPE, "a.py", "# FIXME\n");
	let (orch, _sink) = orchestrator(&ws, ScriptedEngine::new(), Settings::default(), None).await;

	let result = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).files(["a.py", "gone.py"])).await;
	assert_eq!(result.status, RunStatus::Completed);
	assert_eq!(result.analyzed, vec![RelPath::from("a.py")]);
	assert_eq!(result.dropped, vec![RelPath::from("gone.py")]);
}

#[tokio::test]
async fn unknown_scope_fails() {
	let ws = Workspace::new();
	let engine = ScriptedEngine::new();
	let orch = Orchestrator::builder(engine.clone(), ws.host.clone()).build();
	orch.set_ready("elsewhere", true).await;

	let result = orch.analyze(AnalysisRequest::new("elsewhere", TriggerKind::EditorOpen).file("a.py")).await;
	assert!(result.status.is_failed());
	assert_eq!(engine.calls(), 0);
}

#[derive(Default)]
struct DecliningUi {
	asked: AtomicUsize,
	failures: AtomicUsize,
}

impl HostUi for DecliningUi {
	fn confirm_bulk_analysis(&self, _scope: &ScopeId, _file_count: usize) -> bool {
		self.asked.fetch_add(1, Ordering::SeqCst);
		false
	}

	fn report_failure(&self, _result: &AnalysisResult) {
		self.failures.fetch_add(1, Ordering::SeqCst);
	}
}

#[tokio::test]
async fn declined_bulk_analysis_is_cancelled() {
	let ws = Workspace::new();
	for name in ["a.py", "b.py", "c.py"] {
		ws.write(SCOPE, name, "# FIXME\n");
	}
	let engine = ScriptedEngine::new();
	let ui = Arc::new(DecliningUi::default());
	let settings = Settings {
		bulk_confirm_threshold: 2,
		..Settings::default()
	};
	let orch = Orchestrator::builder(engine.clone(), ws.host.clone())
		.settings(settings)
		.host_ui(ui.clone())
		.build();
	orch.set_ready(SCOPE, true).await;

	let manual = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::Manual).files(["a.py", "b.py", "c.py"])).await;
	assert_eq!(
		manual.status,
		RunStatus::Cancelled {
			reason: CancelReason::Declined
		}
	);
	assert_eq!(engine.calls(), 0);

	// Automatic triggers never ask.
	let startup = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::Startup).files(["a.py", "b.py", "c.py"])).await;
	assert!(startup.status.is_completed());
	assert_eq!(ui.asked.load(Ordering::SeqCst), 1);

	engine.fail_next(EngineError::Failed("crash".into()));
	orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::Manual).file("a.py")).await;
	engine.fail_next(EngineError::Failed("crash".into()));
	orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).file("a.py")).await;
	assert_eq!(ui.failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn clearing_report_removes_previous_report_annotations() {
	let ws = Workspace::new();
	ws.write(SCOPE, "a.py", "# FIXME\n");
	ws.write(SCOPE, "b.py", "# FIXME\n");
	let (orch, sink) = orchestrator(&ws, ScriptedEngine::new(), Settings::default(), None).await;

	orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::Manual).file("a.py")).await;
	orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).file("a.py")).await;
	let kinds: Vec<_> = sink.live(&key("a.py")).iter().map(|a| a.kind).collect();
	assert_eq!(kinds, vec![AnnotationKind::OnTheFly, AnnotationKind::Report]);

	orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::ManualChangeset).file("b.py").clearing_report())
		.await;
	let kinds: Vec<_> = sink.live(&key("a.py")).iter().map(|a| a.kind).collect();
	assert_eq!(kinds, vec![AnnotationKind::OnTheFly]);
	assert_eq!(sink.live(&key("b.py"))[0].kind, AnnotationKind::Report);
}

struct ProfileConfigurator {
	completed: AtomicUsize,
}

impl AnalysisConfigurator for ProfileConfigurator {
	fn name(&self) -> &str {
		"profile"
	}

	fn properties(&self, _scope: &ScopeId, _files: &[RelPath]) -> Properties {
		Properties::from([("sonde.profile".to_string(), "strict".to_string())])
	}

	fn analysis_complete(&self, _scope: &ScopeId, files: &[RelPath]) {
		self.completed.fetch_add(files.len(), Ordering::SeqCst);
	}
}

#[tokio::test]
async fn configurators_see_every_completed_file() {
	let ws = Workspace::new();
	ws.write(SCOPE, "a.py", "# FIXME\n");
	let configurator = Arc::new(ProfileConfigurator {
		completed: AtomicUsize::new(0),
	});
	let orch = Orchestrator::builder(ScriptedEngine::new(), ws.host.clone())
		.configurator(configurator.clone())
		.build();
	orch.set_ready(SCOPE, true).await;

	let result = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).file("a.py")).await;
	assert!(result.status.is_completed());
	assert_eq!(configurator.completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn closing_a_scope_forgets_everything() {
	let ws = Workspace::new();
	ws.write(SCOPE, "a.py", "# FIXME\n");
	let (orch, sink) = orchestrator(&ws, ScriptedEngine::new(), Settings::default(), None).await;
	orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).file("a.py")).await;
	assert_eq!(sink.live(&key("a.py")).len(), 1);

	let scope = ScopeId::from(SCOPE);
	orch.close_scope(&scope).await;
	assert!(sink.live(&key("a.py")).is_empty());
	assert!(orch.tracked_issues(&key("a.py")).is_empty());
	assert!(!orch.is_ready(&scope));
}
