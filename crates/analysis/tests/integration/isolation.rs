use std::time::Duration;

use sonde_analysis::{AnalysisRequest, EngineError, Orchestrator, RunStatus, Settings, TriggerKind};
use sonde_primitives::FileKey;

use crate::common::{RecordingSink, SCOPE, ScriptedEngine, Workspace, key, orchestrator, wait_until};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scopes_run_in_parallel() {
	let ws = Workspace::with_scopes(&["left", "right"]);
	ws.write("left", "a.py", "# FIXME\n");
	ws.write("right", "a.py", "# FIXME\n");
	let engine = ScriptedEngine::new();
	let sink = RecordingSink::new();
	let orch = Orchestrator::builder(engine.clone(), ws.host.clone()).sink(sink.clone()).build();
	orch.set_ready("left", true).await;
	orch.set_ready("right", true).await;

	let gate = engine.hold();
	let left = orch.submit(AnalysisRequest::new("left", TriggerKind::EditorOpen).file("a.py")).await;
	let right = orch.submit(AnalysisRequest::new("right", TriggerKind::EditorOpen).file("a.py")).await;
	assert!(wait_until(Duration::from_secs(2), || engine.in_engine() == 2).await);

	gate.notify_one();
	gate.notify_one();
	assert_eq!(left.join().await.status, RunStatus::Completed);
	assert_eq!(right.join().await.status, RunStatus::Completed);
	assert_eq!(sink.live(&FileKey::new("left", "a.py")).len(), 1);
	assert_eq!(sink.live(&FileKey::new("right", "a.py")).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_runs_of_one_scope_never_duplicate() {
	let ws = Workspace::new();
	ws.write(SCOPE, "app.py", "# FIXME one\n\n# FIXME two\n");
	let (orch, sink) = orchestrator(&ws, ScriptedEngine::new(), Settings::default(), None).await;

	let mut handles = Vec::new();
	for _ in 0..8 {
		handles.push(orch.submit(AnalysisRequest::new(SCOPE, TriggerKind::EditorChange).file("app.py")).await);
	}
	for handle in handles {
		assert_eq!(handle.join().await.status, RunStatus::Completed);
	}

	assert_eq!(orch.tracked_issues(&key("app.py")).len(), 2);
	assert_eq!(sink.live(&key("app.py")).len(), 2);
	assert_eq!(orch.rendered(&key("app.py")).len(), 2);
}

#[tokio::test]
async fn failed_file_keeps_previous_results() {
	let ws = Workspace::new();
	ws.write(SCOPE, "a.py", "# FIXME\n");
	ws.write(SCOPE, "b.py", "# FIXME\n");
	let engine = ScriptedEngine::new();
	let (orch, sink) = orchestrator(&ws, engine.clone(), Settings::default(), None).await;
	orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).files(["a.py", "b.py"])).await;
	let b_before = orch.tracked_issues(&key("b.py"));

	ws.write(SCOPE, "a.py", "clean = True\n");
	ws.write(SCOPE, "b.py", "clean = True\n");
	engine.fail_on("b.py");
	let result = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorChange).files(["a.py", "b.py"])).await;

	assert_eq!(result.status, RunStatus::Completed);
	assert_eq!(result.analyzed, vec!["a.py".into()]);
	assert_eq!(result.failed, vec!["b.py".into()]);
	assert!(sink.live(&key("a.py")).is_empty());
	assert_eq!(orch.tracked_issues(&key("b.py")), b_before);
	assert_eq!(sink.live(&key("b.py")).len(), 1);
	assert_eq!(orch.metrics().files_failed, 1);
}

#[tokio::test]
async fn engine_failure_in_one_scope_leaves_others_alone() {
	let ws = Workspace::with_scopes(&["left", "right"]);
	ws.write("left", "a.py", "# FIXME\n");
	ws.write("right", "a.py", "# FIXME\n");
	let engine = ScriptedEngine::new();
	let orch = Orchestrator::builder(engine.clone(), ws.host.clone()).build();
	orch.set_ready("left", true).await;
	orch.set_ready("right", true).await;

	engine.fail_next(EngineError::Failed("worker crashed".into()));
	let left = orch.analyze(AnalysisRequest::new("left", TriggerKind::EditorOpen).file("a.py")).await;
	let right = orch.analyze(AnalysisRequest::new("right", TriggerKind::EditorOpen).file("a.py")).await;

	match &left.status {
		RunStatus::Failed { warning, cause } => {
			assert_eq!(warning, "Analysis engine failed");
			assert!(cause.contains("worker crashed"));
		}
		other => panic!("unexpected status {other:?}"),
	}
	assert_eq!(right.status, RunStatus::Completed);
	assert!(orch.tracked_issues(&FileKey::new("left", "a.py")).is_empty());
	assert_eq!(orch.tracked_issues(&FileKey::new("right", "a.py")).len(), 1);
}

#[tokio::test]
async fn unavailable_engine_cancels_the_run() {
	let ws = Workspace::new();
	ws.write(SCOPE, "a.py", "# FIXME\n");
	let engine = ScriptedEngine::new();
	let (orch, _sink) = orchestrator(&ws, engine.clone(), Settings::default(), None).await;

	engine.fail_next(EngineError::Unavailable("process exited".into()));
	let result = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).file("a.py")).await;
	assert!(result.status.is_cancelled());

	let retry = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).file("a.py")).await;
	assert_eq!(retry.status, RunStatus::Completed);
}
