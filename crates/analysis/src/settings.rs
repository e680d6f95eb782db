//! Per-scope analysis settings.
//!
//! Settings are plain values read at the start of every run, so a changed
//! file takes effect on the next trigger without any invalidation protocol.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sonde_markers::{IssueFilter, IssuePeriod, MarkerFilter};
use sonde_primitives::ScopeId;
use sonde_tracking::TrackerPolicy;

/// Errors that can occur when loading settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("I/O error reading {path}: {error}")]
	Io { path: PathBuf, error: std::io::Error },

	#[error("invalid settings in {path}: {error}")]
	Parse { path: PathBuf, error: toml::de::Error },
}

/// Per-rule activation and parameters, forwarded to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
	pub active: bool,
	pub params: BTreeMap<String, String>,
}

impl Default for RuleConfig {
	fn default() -> Self {
		Self {
			active: true,
			params: BTreeMap::new(),
		}
	}
}

/// Binding of a scope to a project on a remote server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBinding {
	pub connection_id: String,
	pub project_key: String,
	#[serde(default = "default_branch")]
	pub branch: String,
}

/// Analysis settings of one configuration scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	pub issue_filter: IssueFilter,
	pub issue_period: IssuePeriod,
	/// Baseline of the new-code period.
	pub new_code_since: Option<DateTime<Utc>>,
	/// Globs of scope-relative paths never analyzed.
	pub exclusions: Vec<String>,
	/// Globs of scope-relative paths holding test code.
	pub test_patterns: Vec<String>,
	/// Extension to language overrides.
	pub languages: BTreeMap<String, String>,
	/// Explicit analysis properties; they win over configurator output.
	pub properties: BTreeMap<String, String>,
	pub rules: BTreeMap<String, RuleConfig>,
	#[serde(default = "default_respect_vcs_ignore")]
	pub respect_vcs_ignore: bool,
	#[serde(default = "default_fallback_grace_ms")]
	pub fallback_grace_ms: u64,
	#[serde(default = "default_bulk_confirm_threshold")]
	pub bulk_confirm_threshold: usize,
	pub remote: Option<RemoteBinding>,
}

fn default_branch() -> String {
	"main".to_string()
}

fn default_respect_vcs_ignore() -> bool {
	true
}

fn default_fallback_grace_ms() -> u64 {
	30_000
}

fn default_bulk_confirm_threshold() -> usize {
	10
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			issue_filter: IssueFilter::default(),
			issue_period: IssuePeriod::default(),
			new_code_since: None,
			exclusions: Vec::new(),
			test_patterns: Vec::new(),
			languages: BTreeMap::new(),
			properties: BTreeMap::new(),
			rules: BTreeMap::new(),
			respect_vcs_ignore: default_respect_vcs_ignore(),
			fallback_grace_ms: default_fallback_grace_ms(),
			bulk_confirm_threshold: default_bulk_confirm_threshold(),
			remote: None,
		}
	}
}

impl Settings {
	/// Reads settings from a TOML file.
	pub fn load(path: &Path) -> Result<Self, SettingsError> {
		let text = std::fs::read_to_string(path).map_err(|error| SettingsError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		toml::from_str(&text).map_err(|error| SettingsError::Parse {
			path: path.to_path_buf(),
			error,
		})
	}

	/// Reads settings from `path` if it exists, otherwise returns defaults.
	pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
		if path.exists() { Self::load(path) } else { Ok(Self::default()) }
	}

	pub fn marker_filter(&self) -> MarkerFilter {
		MarkerFilter::new(self.issue_filter, self.issue_period, self.new_code_since)
	}

	pub fn tracker_policy(&self) -> TrackerPolicy {
		TrackerPolicy {
			retain_unmatched_server_issues: self.issue_filter.shows_resolved(),
		}
	}

	pub fn fallback_grace(&self) -> Duration {
		Duration::from_millis(self.fallback_grace_ms)
	}
}

/// Where a run reads its scope's settings from.
pub trait SettingsSource: Send + Sync {
	fn settings(&self, scope: &ScopeId) -> Result<Settings, SettingsError>;
}

/// The same settings for every scope.
impl SettingsSource for Settings {
	fn settings(&self, _scope: &ScopeId) -> Result<Settings, SettingsError> {
		Ok(self.clone())
	}
}

/// Settings re-read from a TOML file on every run.
#[derive(Debug, Clone)]
pub struct SettingsFile {
	path: PathBuf,
}

impl SettingsFile {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl SettingsSource for SettingsFile {
	fn settings(&self, _scope: &ScopeId) -> Result<Settings, SettingsError> {
		Settings::load_or_default(&self.path)
	}
}
