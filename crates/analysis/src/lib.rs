//! Analysis orchestration.
//!
//! # Purpose
//!
//! - Turn analysis requests (editor events, manual runs, configuration and
//!   readiness changes) into engine runs over the eligible files of a scope.
//! - Reconcile each run's findings with the tracked issues of the previous
//!   run, render the result, and enrich it with server state afterwards.
//! - Keep scopes independent: one scope's slow run, failure or missing
//!   configuration never blocks or corrupts another.
//!
//! # Key types
//!
//! | Type | Meaning | Constraints |
//! |---|---|---|
//! | [`Orchestrator`] | Root owning readiness, store, markers and jobs | Built once with [`OrchestratorBuilder`] |
//! | [`AnalysisRequest`] | Files of one scope plus a [`TriggerKind`] | Paths deduplicated, last snapshot wins |
//! | [`AnalysisEngine`] | Adapter to the external analyzer | Must honour the cancellation token |
//! | [`RemoteIssues`] | Read-only server facade | Only consulted after local render |
//! | [`AnalysisResult`] | Terminal state of a run | Exactly one per run |
//! | [`Settings`] | Per-scope preferences | Reloaded per run from a [`SettingsSource`] |
//!
//! # Invariants
//!
//! - No scope is analyzed before it is ready; such requests are deferred and
//!   replayed once the scope becomes ready.
//! - Excluded files lose their annotations before the engine is invoked.
//! - The tracked issues and annotations of a scope are only mutated under
//!   that scope's lock; the engine call and remote fetches run outside it.
//! - A cancelled run commits nothing after the cancellation is observed.
//! - A run's result never overwrites the committed result of a newer run.
//! - Enrichment of a file starts only after the file was rendered locally.
//!
//! # Pipeline
//!
//! ```text
//! ReadinessCheck -> Excluding -> Configuring -> Engine-Invoke -> Tracking -> MarkerRender -> [Enrichment]
//! ```

mod configure;
mod engine;
mod enrichment;
mod error;
mod exclusions;
mod hooks;
mod host;
mod inputs;
mod metrics;
mod orchestrator;
mod pipeline;
mod readiness;
mod remote;
mod request;
mod result;
mod settings;
mod state;
mod trigger;

pub use configure::{AnalysisConfigurator, FileConfigurator, Properties, merge_properties};
pub use engine::{AnalysisEngine, EngineError, EngineRequest, EngineResponse, FileFindings};
pub use enrichment::EnrichmentReport;
pub use error::{AnalysisError, Result};
pub use exclusions::{ExclusionReason, Exclusions, GitignoreOracle, IgnoreOracle};
pub use hooks::{AnalysisListener, HostUi, SilentUi};
pub use host::{HostFiles, LocalFiles};
pub use inputs::{ContentSource, InputFile, LanguageTable, TestClassifier};
pub use metrics::{AnalysisMetrics, MetricsSnapshot};
pub use orchestrator::{JobHandle, Orchestrator, OrchestratorBuilder};
pub use pipeline::Capabilities;
pub use readiness::ReadinessCache;
pub use remote::{RemoteError, RemoteIssues};
pub use request::{AnalysisRequest, FileRequest};
pub use result::{AnalysisResult, CancelReason, RunStatus};
pub use settings::{RemoteBinding, RuleConfig, Settings, SettingsError, SettingsFile, SettingsSource};
pub use state::{AnalysisState, AnalysisStates};
pub use trigger::{TriggerBehavior, TriggerKind};
pub use sonde_worker::{CancellationToken, DrainBudget, DrainReport};
