use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sonde_tracking::TrackedIssue;

/// Which issues are shown with respect to resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueFilter {
	All,
	#[default]
	NonResolved,
}

impl IssueFilter {
	/// Whether resolved issues stay visible.
	pub const fn shows_resolved(self) -> bool {
		matches!(self, Self::All)
	}
}

/// Which issues are shown with respect to age.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuePeriod {
	#[default]
	AllTime,
	NewCode,
}

/// Display predicate built once per run from the preferences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerFilter {
	hide_resolved: bool,
	new_code_since: Option<DateTime<Utc>>,
}

impl MarkerFilter {
	/// Builds the predicate.
	///
	/// `NewCode` without a baseline admits everything.
	pub fn new(filter: IssueFilter, period: IssuePeriod, baseline: Option<DateTime<Utc>>) -> Self {
		Self {
			hide_resolved: !filter.shows_resolved(),
			new_code_since: match period {
				IssuePeriod::AllTime => None,
				IssuePeriod::NewCode => baseline,
			},
		}
	}

	/// Admits every issue.
	pub const fn everything() -> Self {
		Self {
			hide_resolved: false,
			new_code_since: None,
		}
	}

	pub fn admits(&self, issue: &TrackedIssue) -> bool {
		if self.hide_resolved && issue.resolved {
			return false;
		}
		match self.new_code_since {
			Some(baseline) => issue.created_at() >= baseline,
			None => true,
		}
	}
}
