use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sonde_primitives::{IssueType, RelPath, Severity, TextRange};

use crate::finding::Flow;
use crate::trackable::Trackable;

/// A finding record fetched from a remote server.
///
/// Used both for regular issues and for taint vulnerabilities, which only
/// exist server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFinding {
	pub key: String,
	pub rule_key: String,
	pub message: String,
	pub severity: Severity,
	#[serde(default, rename = "type")]
	pub issue_type: IssueType,
	pub path: RelPath,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub text_range: Option<TextRange>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub line_hash: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub text_range_hash: Option<String>,
	pub creation_date: DateTime<Utc>,
	#[serde(default)]
	pub resolved: bool,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub flows: Vec<Flow>,
}

impl Trackable for ServerFinding {
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
		Some(&self.key)
	}
}
