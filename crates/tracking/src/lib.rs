//! Issue identity tracking.
//!
//! # Purpose
//!
//! - Give every finding a stable identity ([`IssueId`]) and first-seen date that
//!   survive edits and repeated analysis runs.
//! - Merge server-side state (resolution, server key, creation date) into the
//!   tracked set without touching locally derived locations.
//!
//! # Key types
//!
//! | Type | Meaning | Constraints |
//! |---|---|---|
//! | [`RawFinding`] | One analysis run's output for a file | No identity; hashes attached by [`RawFinding::locate`] |
//! | [`TrackedIssue`] | Durable identity record | `id` and `created_at` are inherited, never recomputed |
//! | [`ServerFinding`] | Remote record (issue or taint) | Carries authoritative key, hashes and resolution |
//! | [`Trackable`] | Comparison view over all three | Used uniformly by every matching tier |
//! | [`IssueTracker`] | Reconciliation of raw against previous | Deterministic for identical input |
//! | [`IssueStore`] | Tracked issues per scope and file | Sole owner of the tracked state |
//!
//! # Invariants
//!
//! - Matching never depends on the order of the previous issues; ties inside a
//!   tier go to the nearest line, then to the earliest raw finding.
//! - A matched issue keeps its `id` and `created_at`; every other local field
//!   is refreshed from the raw finding.
//! - Server enrichment only writes `resolved`, `server_issue_key` and
//!   `created_at`.
//! - A commit from an older analysis sequence never replaces a newer one.

mod enrich;
mod finding;
mod hash;
mod issue;
mod server;
mod store;
mod trackable;
mod tracker;

pub use enrich::{EnrichOutcome, apply_server_findings, reconcile_taint};
pub use finding::{Flow, FlowLocation, QuickFix, RawFinding, TextEdit};
pub use hash::{SourceText, checksum};
pub use issue::{IssueId, TrackedIssue};
pub use server::ServerFinding;
pub use store::{CommitOutcome, FileIssues, IssueStore};
pub use trackable::Trackable;
pub use tracker::{IssueTracker, MatchTier, PROXIMITY_WINDOW, TrackerPolicy, TrackingOutcome, TrackingStats};
