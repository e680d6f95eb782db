//! Core value types shared by the analysis, tracking and marker crates.

/// Identifier types for configuration scopes and files.
pub mod ids;
/// Text range types in line/offset coordinates.
pub mod range;
/// Rope helpers for extracting line and range content.
pub mod rope;
/// Finding severity and type classification.
pub mod severity;

pub use ids::{FileKey, RelPath, ScopeId};
pub use range::TextRange;
pub use ropey::{Rope, RopeSlice};
pub use severity::{IssueType, Severity};
