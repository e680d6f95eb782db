use serde::{Deserialize, Serialize};
use sonde_primitives::{IssueType, RelPath, Severity, TextRange};

use crate::hash::SourceText;
use crate::trackable::Trackable;

/// One location of a secondary flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowLocation {
	/// File of the location when it differs from the finding's file.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file: Option<RelPath>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub range: Option<TextRange>,
	#[serde(default)]
	pub message: String,
}

/// Ordered secondary locations explaining a finding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
	pub locations: Vec<FlowLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
	pub range: TextRange,
	pub new_text: String,
}

/// Engine-suggested fix for a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickFix {
	pub message: String,
	#[serde(default)]
	pub edits: Vec<TextEdit>,
}

/// A finding produced by a single analysis run.
///
/// Carries no identity. Its hashes are empty until [`Self::locate`] is called
/// with the content the engine analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFinding {
	pub rule_key: String,
	pub message: String,
	pub severity: Severity,
	#[serde(default, rename = "type")]
	pub issue_type: IssueType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub text_range: Option<TextRange>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub flows: Vec<Flow>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub quick_fixes: Vec<QuickFix>,
	#[serde(skip)]
	line_hash: Option<String>,
	#[serde(skip)]
	text_range_hash: Option<String>,
}

impl RawFinding {
	pub fn new(rule_key: impl Into<String>, message: impl Into<String>, severity: Severity, text_range: Option<TextRange>) -> Self {
		Self {
			rule_key: rule_key.into(),
			message: message.into(),
			severity,
			issue_type: IssueType::default(),
			text_range,
			flows: Vec::new(),
			quick_fixes: Vec::new(),
			line_hash: None,
			text_range_hash: None,
		}
	}

	pub fn with_type(mut self, issue_type: IssueType) -> Self {
		self.issue_type = issue_type;
		self
	}

	pub fn with_flows(mut self, flows: Vec<Flow>) -> Self {
		self.flows = flows;
		self
	}

	pub fn with_quick_fixes(mut self, quick_fixes: Vec<QuickFix>) -> Self {
		self.quick_fixes = quick_fixes;
		self
	}

	/// Computes the line and range hashes against the analyzed content.
	///
	/// Ranges that fall outside the content leave the matching hash empty.
	pub fn locate(&mut self, source: &SourceText) {
		match self.text_range {
			Some(range) => {
				self.line_hash = source.line_hash(range.start_line);
				self.text_range_hash = source.range_hash(&range);
			}
			None => {
				self.line_hash = None;
				self.text_range_hash = None;
			}
		}
	}

	/// Builder form of [`Self::locate`].
	pub fn located(mut self, source: &SourceText) -> Self {
		self.locate(source);
		self
	}

	pub(crate) fn hashes(&self) -> (Option<String>, Option<String>) {
		(self.line_hash.clone(), self.text_range_hash.clone())
	}
}

impl Trackable for RawFinding {
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
}
