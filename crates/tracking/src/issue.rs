use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sonde_primitives::{IssueType, Severity, TextRange};
use uuid::Uuid;

use crate::finding::{Flow, QuickFix, RawFinding};
use crate::server::ServerFinding;
use crate::trackable::Trackable;

/// Stable identity of a tracked issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(Uuid);

impl IssueId {
	/// Mints a fresh random id.
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for IssueId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for IssueId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// A finding with a durable identity.
///
/// `id` and `created_at` are set once when the issue is first seen and are
/// inherited by every later match. The remaining fields follow the latest
/// raw finding, except the server-owned ones (`server_issue_key`, `resolved`)
/// which only enrichment and server-key matching write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedIssue {
	id: IssueId,
	created_at: DateTime<Utc>,
	pub rule_key: String,
	pub message: String,
	pub severity: Severity,
	#[serde(rename = "type")]
	pub issue_type: IssueType,
	pub text_range: Option<TextRange>,
	pub line_hash: Option<String>,
	pub text_range_hash: Option<String>,
	pub server_issue_key: Option<String>,
	pub resolved: bool,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub flows: Vec<Flow>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub quick_fixes: Vec<QuickFix>,
}

impl TrackedIssue {
	/// Mints a new issue for a raw finding seen for the first time.
	pub fn from_raw(raw: RawFinding, now: DateTime<Utc>) -> Self {
		let (line_hash, text_range_hash) = raw.hashes();
		Self {
			id: IssueId::new(),
			created_at: now,
			rule_key: raw.rule_key,
			message: raw.message,
			severity: raw.severity,
			issue_type: raw.issue_type,
			text_range: raw.text_range,
			line_hash,
			text_range_hash,
			server_issue_key: None,
			resolved: false,
			flows: raw.flows,
			quick_fixes: raw.quick_fixes,
		}
	}

	/// Builds a taint issue from a server-only record.
	pub fn from_server(id: IssueId, record: &ServerFinding) -> Self {
		Self {
			id,
			created_at: record.creation_date,
			rule_key: record.rule_key.clone(),
			message: record.message.clone(),
			severity: record.severity,
			issue_type: record.issue_type,
			text_range: record.text_range,
			line_hash: record.line_hash.clone(),
			text_range_hash: record.text_range_hash.clone(),
			server_issue_key: Some(record.key.clone()),
			resolved: record.resolved,
			flows: record.flows.clone(),
			quick_fixes: Vec::new(),
		}
	}

	pub fn id(&self) -> IssueId {
		self.id
	}

	pub fn created_at(&self) -> DateTime<Utc> {
		self.created_at
	}

	/// Refreshes every locally owned field from a matched raw finding.
	///
	/// Identity, creation date and server-owned fields are left untouched.
	pub(crate) fn refresh_from(&mut self, raw: RawFinding) {
		let (line_hash, text_range_hash) = raw.hashes();
		self.rule_key = raw.rule_key;
		self.message = raw.message;
		self.severity = raw.severity;
		self.issue_type = raw.issue_type;
		self.text_range = raw.text_range;
		self.line_hash = line_hash;
		self.text_range_hash = text_range_hash;
		self.flows = raw.flows;
		self.quick_fixes = raw.quick_fixes;
	}

	/// Applies the fields a server record is authoritative for.
	///
	/// Returns true if anything changed.
	pub(crate) fn adopt_server_state(&mut self, record: &ServerFinding) -> bool {
		let changed = self.server_issue_key.as_deref() != Some(record.key.as_str())
			|| self.resolved != record.resolved
			|| self.created_at != record.creation_date;
		self.server_issue_key = Some(record.key.clone());
		self.resolved = record.resolved;
		self.created_at = record.creation_date;
		changed
	}
}

impl Trackable for TrackedIssue {
	fn rule_key(&self) -> &str {
		&self.rule_key
	}

	fn message(&self) -> &str {
		&self.message
	}

	fn text_range(&self) -> Option<&TextRange> {
		self.text_range.as_ref()
	}

	fn line_hash(&self) -> Option<&str> {
		self.line_hash.as_deref()
	}

	fn text_range_hash(&self) -> Option<&str> {
		self.text_range_hash.as_deref()
	}

	fn server_issue_key(&self) -> Option<&str> {
		self.server_issue_key.as_deref()
	}
}
