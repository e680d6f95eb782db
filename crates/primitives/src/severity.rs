use serde::{Deserialize, Serialize};

/// Severity reported by the analysis engine for a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
	Info,
	Minor,
	Major,
	Critical,
	Blocker,
}

impl Severity {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Info => "info",
			Self::Minor => "minor",
			Self::Major => "major",
			Self::Critical => "critical",
			Self::Blocker => "blocker",
		}
	}
}

/// Category of a finding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
	Bug,
	Vulnerability,
	#[default]
	CodeSmell,
	SecurityHotspot,
}
