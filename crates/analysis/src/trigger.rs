use serde::{Deserialize, Serialize};
use sonde_markers::AnnotationKind;
use sonde_worker::TaskClass;

/// What caused an analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
	Startup,
	EditorOpen,
	EditorChange,
	Manual,
	ManualChangeset,
	BindingChange,
	ConfigChange,
	ReadinessChange,
}

/// Per-trigger run behavior, consulted once when a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerBehavior {
	/// A user is waiting: bulk confirmation, failure reporting, interactive lane.
	pub interactive: bool,
	/// Enrichment from the remote server follows local rendering.
	pub fetch_remote: bool,
	/// Enrichment runs as its own background job instead of inline.
	pub match_async: bool,
	/// Results go to the report layer instead of the on-the-fly layer.
	pub report: bool,
}

impl TriggerKind {
	pub const ALL: [Self; 8] = [
		Self::Startup,
		Self::EditorOpen,
		Self::EditorChange,
		Self::Manual,
		Self::ManualChangeset,
		Self::BindingChange,
		Self::ConfigChange,
		Self::ReadinessChange,
	];

	pub const fn behavior(self) -> TriggerBehavior {
		const fn b(interactive: bool, fetch_remote: bool, match_async: bool, report: bool) -> TriggerBehavior {
			TriggerBehavior {
				interactive,
				fetch_remote,
				match_async,
				report,
			}
		}
		match self {
			Self::Startup => b(false, true, true, false),
			Self::EditorOpen => b(false, true, true, false),
			Self::EditorChange => b(false, false, false, false),
			Self::Manual => b(true, true, false, true),
			Self::ManualChangeset => b(true, true, false, true),
			Self::BindingChange => b(false, true, true, false),
			Self::ConfigChange => b(false, true, true, false),
			Self::ReadinessChange => b(false, true, true, false),
		}
	}

	pub const fn annotation_kind(self) -> AnnotationKind {
		if self.behavior().report { AnnotationKind::Report } else { AnnotationKind::OnTheFly }
	}

	pub const fn task_class(self) -> TaskClass {
		if self.behavior().interactive {
			TaskClass::Interactive
		} else {
			TaskClass::Background
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Startup => "startup",
			Self::EditorOpen => "editor_open",
			Self::EditorChange => "editor_change",
			Self::Manual => "manual",
			Self::ManualChangeset => "manual_changeset",
			Self::BindingChange => "binding_change",
			Self::ConfigChange => "config_change",
			Self::ReadinessChange => "readiness_change",
		}
	}
}
