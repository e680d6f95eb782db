use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use sonde_analysis::{AnalysisRequest, CancelReason, DrainBudget, RunStatus, Settings, TriggerKind};
use sonde_markers::{AnnotationKind, IssueFilter};
use sonde_primitives::TextRange;

use crate::common::{
	SCOPE, ScriptedEngine, ScriptedRemote, Workspace, bound_settings, fixme_record, key, orchestrator, server_epoch, wait_until,
};

const LINE: &str = "# FIXME: close the socket";

fn show_resolved() -> Settings {
	Settings {
		issue_filter: IssueFilter::All,
		..bound_settings()
	}
}

#[tokio::test]
async fn manual_run_enriches_inline_after_render() {
	let ws = Workspace::new();
	ws.write(SCOPE, "net.py", &format!("import socket\n{LINE}\n"));
	let remote = ScriptedRemote::new();
	remote.add_issue(fixme_record("AX-1", "net.py", 2, LINE, true));
	let (orch, sink) = orchestrator(&ws, ScriptedEngine::new(), show_resolved(), Some(remote.clone())).await;

	let result = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::Manual).file("net.py")).await;
	assert_eq!(result.status, RunStatus::Completed);
	assert_eq!(remote.fetches(), 2);

	let issues = orch.tracked_issues(&key("net.py"));
	assert_eq!(issues.len(), 1);
	assert!(issues[0].resolved);
	assert_eq!(issues[0].server_issue_key.as_deref(), Some("AX-1"));
	assert_eq!(issues[0].created_at(), server_epoch());

	let live = sink.live(&key("net.py"));
	assert_eq!(live.len(), 1);
	assert_eq!(live[0].kind, AnnotationKind::Report);
	assert!(live[0].resolved);
	assert_eq!(orch.metrics().enrichment_runs, 1);
}

#[tokio::test]
async fn resolved_issues_are_hidden_by_default() {
	let ws = Workspace::new();
	ws.write(SCOPE, "net.py", &format!("{LINE}\n"));
	let remote = ScriptedRemote::new();
	remote.add_issue(fixme_record("AX-1", "net.py", 1, LINE, true));
	let (orch, sink) = orchestrator(&ws, ScriptedEngine::new(), bound_settings(), Some(remote)).await;

	orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::Manual).file("net.py")).await;
	assert!(orch.tracked_issues(&key("net.py"))[0].resolved);
	assert!(sink.live(&key("net.py")).is_empty());
}

#[tokio::test]
async fn taint_issues_render_in_their_own_layer() {
	let ws = Workspace::new();
	ws.write(SCOPE, "db.py", "query = input()\ncursor.execute(query)\n");
	let remote = ScriptedRemote::new();
	let mut taint = fixme_record("TX-9", "db.py", 2, "cursor.execute(query)", false);
	taint.rule_key = "pythonsecurity:S3649".into();
	taint.text_range = Some(TextRange::new(2, 0, 2, 21));
	remote.add_taint(taint);
	let (orch, sink) = orchestrator(&ws, ScriptedEngine::new(), bound_settings(), Some(remote)).await;

	orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::Manual).file("db.py")).await;
	let taint = orch.taint_issues(&key("db.py"));
	assert_eq!(taint.len(), 1);
	assert_eq!(taint[0].server_issue_key.as_deref(), Some("TX-9"));
	let live = sink.live(&key("db.py"));
	assert_eq!(live.len(), 1);
	assert_eq!(live[0].kind, AnnotationKind::Taint);

	// Ids survive a second fetch of the same record.
	orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::Manual).file("db.py")).await;
	assert_eq!(orch.taint_issues(&key("db.py"))[0].id(), taint[0].id());
}

#[tokio::test]
async fn background_enrichment_survives_concurrent_local_run() {
	let ws = Workspace::new();
	ws.write(SCOPE, "net.py", &format!("{LINE}\n"));
	let remote = ScriptedRemote::new();
	remote.add_issue(fixme_record("AX-1", "net.py", 1, LINE, true));
	let gate = remote.hold();
	let engine = ScriptedEngine::new();
	let (orch, sink) = orchestrator(&ws, engine.clone(), show_resolved(), Some(remote.clone())).await;

	let opened = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).file("net.py")).await;
	assert_eq!(opened.status, RunStatus::Completed);
	assert_eq!(sink.live(&key("net.py")).len(), 1);
	assert!(wait_until(Duration::from_secs(2), || remote.fetches() >= 1).await);
	assert!(!orch.tracked_issues(&key("net.py"))[0].resolved);

	// A local run while the server is still answering.
	ws.write(SCOPE, "net.py", &format!("\n{LINE}\n"));
	orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorChange).file("net.py")).await;

	gate.open();
	assert!(wait_until(Duration::from_secs(2), || orch.tracked_issues(&key("net.py"))[0].resolved).await);
	let id = orch.tracked_issues(&key("net.py"))[0].id();

	// Later local runs keep the server resolution.
	ws.write(SCOPE, "net.py", &format!("\n\n{LINE}\n"));
	orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorChange).file("net.py")).await;
	let issues = orch.tracked_issues(&key("net.py"));
	assert_eq!(issues.len(), 1);
	assert_eq!(issues[0].id(), id);
	assert!(issues[0].resolved);
	assert_eq!(issues[0].text_range.map(|r| r.start_line), Some(3));
	assert!(sink.live(&key("net.py"))[0].resolved);
}

#[tokio::test]
async fn drain_waits_for_background_enrichment() {
	let ws = Workspace::new();
	ws.write(SCOPE, "net.py", &format!("{LINE}\n"));
	let remote = ScriptedRemote::new();
	remote.add_issue(fixme_record("AX-1", "net.py", 1, LINE, true));
	let (orch, sink) = orchestrator(&ws, ScriptedEngine::new(), show_resolved(), Some(remote.clone())).await;

	let handle = orch.submit(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).file("net.py")).await;
	let started = Instant::now();
	let report = orch.drain(DrainBudget::new(Duration::from_secs(5), 100)).await;

	assert!(started.elapsed() < Duration::from_secs(2), "drain stalled for {:?}", started.elapsed());
	assert!(report.is_idle());
	assert!(!report.budget_exhausted);
	assert_eq!(report.completed, 2);
	assert_eq!(handle.join().await.status, RunStatus::Completed);
	assert_eq!(remote.fetches(), 2);
	assert!(orch.tracked_issues(&key("net.py"))[0].resolved);
	assert!(sink.live(&key("net.py"))[0].resolved);
}

#[tokio::test]
async fn shutdown_during_background_run_skips_enrichment() {
	let ws = Workspace::new();
	ws.write(SCOPE, "net.py", &format!("{LINE}\n"));
	let remote = ScriptedRemote::new();
	remote.add_issue(fixme_record("AX-1", "net.py", 1, LINE, true));
	let engine = ScriptedEngine::new();
	let (orch, sink) = orchestrator(&ws, engine.clone(), show_resolved(), Some(remote.clone())).await;

	let _gate = engine.hold();
	let handle = orch.submit(AnalysisRequest::new(SCOPE, TriggerKind::EditorOpen).file("net.py")).await;
	assert!(wait_until(Duration::from_secs(2), || engine.in_engine() == 1).await);

	let started = Instant::now();
	let report = orch.shutdown(DrainBudget::new(Duration::from_secs(5), 100)).await;
	assert!(started.elapsed() < Duration::from_secs(2));
	assert!(report.is_idle());
	assert_eq!(
		handle.join().await.status,
		RunStatus::Cancelled {
			reason: CancelReason::Requested
		}
	);
	assert_eq!(remote.fetches(), 0);
	assert_eq!(sink.mutations(), 0);
}

#[tokio::test]
async fn typing_never_fetches_from_server() {
	let ws = Workspace::new();
	ws.write(SCOPE, "net.py", &format!("{LINE}\n"));
	let remote = ScriptedRemote::new();
	let (orch, _sink) = orchestrator(&ws, ScriptedEngine::new(), bound_settings(), Some(remote.clone())).await;

	orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::EditorChange).file("net.py")).await;
	assert_eq!(remote.fetches(), 0);
}

#[tokio::test]
async fn unreachable_server_keeps_local_results() {
	let ws = Workspace::new();
	ws.write(SCOPE, "net.py", &format!("{LINE}\n"));
	let remote = ScriptedRemote::new();
	remote.set_unreachable(true);
	let (orch, sink) = orchestrator(&ws, ScriptedEngine::new(), bound_settings(), Some(remote)).await;

	let result = orch.analyze(AnalysisRequest::new(SCOPE, TriggerKind::Manual).file("net.py")).await;
	assert_eq!(result.status, RunStatus::Completed);
	assert_eq!(sink.live(&key("net.py")).len(), 1);
	assert!(!orch.tracked_issues(&key("net.py"))[0].resolved);
	assert_eq!(orch.metrics().enrichment_failures, 2);
}
