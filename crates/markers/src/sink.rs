use std::fmt;

use serde::Serialize;
use sonde_primitives::FileKey;

use crate::annotation::{Annotation, ChildAnnotation};

/// Handle a sink returns for a created annotation.
///
/// Only meaningful to the sink that issued it; it is recomputed on every
/// render and never stored with the tracked issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MarkerId(pub u64);

impl fmt::Display for MarkerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "m{}", self.0)
	}
}

/// Host side of annotation rendering.
///
/// Calls arrive serialized per file: the updater never issues two calls for
/// the same file concurrently.
pub trait RenderSink: Send + Sync {
	fn create(&self, file: &FileKey, annotation: &Annotation) -> MarkerId;

	fn update(&self, file: &FileKey, marker: MarkerId, annotation: &Annotation);

	fn delete(&self, file: &FileKey, marker: MarkerId);

	/// Replaces every child of `parent`.
	fn set_children(&self, file: &FileKey, parent: MarkerId, children: &[ChildAnnotation]);
}

/// Sink that renders nothing.
#[derive(Debug, Default)]
pub struct NullSink {
	next: std::sync::atomic::AtomicU64,
}

impl RenderSink for NullSink {
	fn create(&self, _file: &FileKey, _annotation: &Annotation) -> MarkerId {
		MarkerId(self.next.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
	}

	fn update(&self, _file: &FileKey, _marker: MarkerId, _annotation: &Annotation) {}

	fn delete(&self, _file: &FileKey, _marker: MarkerId) {}

	fn set_children(&self, _file: &FileKey, _parent: MarkerId, _children: &[ChildAnnotation]) {}
}
