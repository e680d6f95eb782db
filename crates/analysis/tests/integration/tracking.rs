use std::time::Duration;

use pretty_assertions::assert_eq;
use sonde_analysis::{AnalysisRequest, RunStatus, Settings, TriggerKind};
use sonde_markers::AnnotationKind;
use sonde_primitives::Rope;

use crate::common::{SCOPE, ScriptedEngine, SinkEvent, Workspace, key, orchestrator, wait_until};

#[tokio::test]
async fn inserted_lines_keep_issue_identity() {
	let ws = Workspace::new();
	ws.write(SCOPE, "app.py", "import os\n# FIXME: handle errors\nprint(os.getcwd())\n");
	let engine = ScriptedEngine::new();
	let (orch, sink) = orchestrator(&ws, engine.clone(), Settings::default(), None).await;

	let first = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).file("app.py")).await;
	assert_eq!(first.status, RunStatus::Completed);
	assert_eq!(first.tracking.created, 1);
	let before = orch.tracked_issues(&key("app.py"));
	assert_eq!(before.len(), 1);
	assert_eq!(before[0].text_range.map(|r| r.start_line), Some(2));

	ws.write(SCOPE, "app.py", "import os\nimport sys\n\n# FIXME: handle errors\nprint(os.getcwd())\n");
	let second = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorChange).file("app.py")).await;
	assert_eq!(second.status, RunStatus::Completed);
	assert_eq!(second.tracking.created, 0);
	assert_eq!(second.tracking.matched(), 1);

	let after = orch.tracked_issues(&key("app.py"));
	assert_eq!(after.len(), 1);
	assert_eq!(after[0].id(), before[0].id());
	assert_eq!(after[0].created_at(), before[0].created_at());
	assert_eq!(after[0].text_range.map(|r| r.start_line), Some(4));

	let live = sink.live(&key("app.py"));
	assert_eq!(live.len(), 1);
	assert_eq!(live[0].kind, AnnotationKind::OnTheFly);
	assert_eq!(live[0].range.map(|r| r.start_line), Some(4));
	let mutations: Vec<_> = sink.events().into_iter().filter(SinkEvent::is_mutation).collect();
	assert!(matches!(mutations.as_slice(), [SinkEvent::Create { .. }, SinkEvent::Update { .. }]));
}

#[tokio::test]
async fn unchanged_rerun_mutates_nothing() {
	let ws = Workspace::new();
	ws.write(SCOPE, "app.py", "# FIXME one\nx = 1\n# FIXME two\n");
	let engine = ScriptedEngine::new();
	let (orch, sink) = orchestrator(&ws, engine, Settings::default(), None).await;

	orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).file("app.py")).await;
	let ids: Vec<_> = orch.tracked_issues(&key("app.py")).iter().map(|i| i.id()).collect();
	let mutations = sink.mutations();

	let rerun = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorChange).file("app.py")).await;
	assert_eq!(rerun.render.mutations(), 0);
	assert_eq!(sink.mutations(), mutations);
	let again: Vec<_> = orch.tracked_issues(&key("app.py")).iter().map(|i| i.id()).collect();
	assert_eq!(again, ids);
}

#[tokio::test]
async fn fixed_issue_disappears() {
	let ws = Workspace::new();
	ws.write(SCOPE, "app.py", "# FIXME\n");
	let (orch, sink) = orchestrator(&ws, ScriptedEngine::new(), Settings::default(), None).await;

	orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).file("app.py")).await;
	assert_eq!(sink.live(&key("app.py")).len(), 1);

	ws.write(SCOPE, "app.py", "# done\n");
	let result = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorChange).file("app.py")).await;
	assert_eq!(result.tracking.dropped, 1);
	assert!(orch.tracked_issues(&key("app.py")).is_empty());
	assert!(sink.live(&key("app.py")).is_empty());
}

#[tokio::test]
async fn open_document_snapshot_wins_over_disk() {
	let ws = Workspace::new();
	ws.write(SCOPE, "app.py", "print('saved')\n");
	let (orch, _sink) = orchestrator(&ws, ScriptedEngine::new(), Settings::default(), None).await;

	let request = AnalysisRequest::new(SCOPE, TriggerKind::EditorChange).document("app.py", Rope::from("x = 1\n# FIXME unsaved\n"));
	let result = orch.analyze(request).await;
	assert_eq!(result.analyzed, vec!["app.py".into()]);
	let issues = orch.tracked_issues(&key("app.py"));
	assert_eq!(issues.len(), 1);
	assert_eq!(issues[0].text_range.map(|r| r.start_line), Some(2));
}

#[tokio::test]
async fn older_run_never_overwrites_newer_commit() {
	let ws = Workspace::new();
	ws.write(SCOPE, "app.py", "# FIXME\n");
	let engine = ScriptedEngine::new();
	let (orch, _sink) = orchestrator(&ws, engine.clone(), Settings::default(), None).await;
	let gate = engine.hold();

	let older = orch.submit(AnalysisRequest::new(SCOPE, TriggerKind::EditorChange).file("app.py")).await;
	assert!(wait_until(Duration::from_secs(2), || engine.in_engine() == 1).await);
	let newer = orch.submit(AnalysisRequest::new(SCOPE, TriggerKind::EditorChange).file("app.py")).await;
	assert!(wait_until(Duration::from_secs(2), || engine.in_engine() == 2).await);
	assert!(older.id() < newer.id());

	gate.notify_last();
	let newer = newer.join().await;
	assert_eq!(newer.analyzed.len(), 1);

	gate.notify_one();
	let older = older.join().await;
	assert_eq!(older.status, RunStatus::Completed);
	assert!(older.analyzed.is_empty());
	assert_eq!(orch.metrics().stale_commits, 1);
	assert_eq!(orch.tracked_issues(&key("app.py")).len(), 1);
}
