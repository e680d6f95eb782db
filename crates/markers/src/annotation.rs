use serde::Serialize;
use sonde_primitives::{IssueType, RelPath, Severity, TextRange};
use sonde_tracking::{IssueId, TextEdit, TrackedIssue};

/// Which annotation layer an issue is rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
	/// Results of automatic analysis, refreshed on every run.
	OnTheFly,
	/// Results of an explicit manual analysis, kept until cleared.
	Report,
	/// Server-only taint vulnerabilities.
	Taint,
}

impl AnnotationKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::OnTheFly => "on_the_fly",
			Self::Report => "report",
			Self::Taint => "taint",
		}
	}
}

/// What a sink is asked to show for one tracked issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
	pub issue_id: IssueId,
	pub kind: AnnotationKind,
	pub rule_key: String,
	pub message: String,
	pub severity: Severity,
	#[serde(rename = "type")]
	pub issue_type: IssueType,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub range: Option<TextRange>,
	pub resolved: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub server_issue_key: Option<String>,
}

impl Annotation {
	pub fn from_issue(issue: &TrackedIssue, kind: AnnotationKind) -> Self {
		Self {
			issue_id: issue.id(),
			kind,
			rule_key: issue.rule_key.clone(),
			message: issue.message.clone(),
			severity: issue.severity,
			issue_type: issue.issue_type,
			range: issue.text_range,
			resolved: issue.resolved,
			server_issue_key: issue.server_issue_key.clone(),
		}
	}
}

/// Role of a child annotation under its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChildRole {
	/// Step `step` of secondary flow `flow`.
	FlowStep { flow: usize, step: usize },
	/// Suggested fix number `index`.
	QuickFix { index: usize, edits: Vec<TextEdit> },
}

/// Secondary location rendered under a primary annotation.
///
/// Children have no identity of their own and are replaced wholesale
/// whenever the parent is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildAnnotation {
	#[serde(flatten)]
	pub role: ChildRole,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub file: Option<RelPath>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub range: Option<TextRange>,
}

/// Flow steps first, in flow order, then quick fixes.
pub fn children(issue: &TrackedIssue) -> Vec<ChildAnnotation> {
	let flows = issue.flows.iter().enumerate().flat_map(|(flow, f)| {
		f.locations.iter().enumerate().map(move |(step, location)| ChildAnnotation {
			role: ChildRole::FlowStep { flow, step },
			message: location.message.clone(),
			file: location.file.clone(),
			range: location.range,
		})
	});
	let fixes = issue.quick_fixes.iter().enumerate().map(|(index, fix)| ChildAnnotation {
		role: ChildRole::QuickFix {
			index,
			edits: fix.edits.clone(),
		},
		message: fix.message.clone(),
		file: None,
		range: fix.edits.first().map(|edit| edit.range),
	});
	flows.chain(fixes).collect()
}
