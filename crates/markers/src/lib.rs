//! Annotation rendering for tracked issues.
//!
//! [`MarkerUpdater`] owns the set of annotations a [`RenderSink`] currently
//! shows and turns each new tracked-issue set into the minimal sequence of
//! create, update and delete calls. Annotations are a disposable projection:
//! they are keyed by [`sonde_tracking::IssueId`] and the sink's [`MarkerId`]
//! never flows back into tracking.
//!
//! Display preferences are folded into a [`MarkerFilter`] once per run and
//! applied as a plain predicate.

mod annotation;
mod filter;
mod sink;
mod updater;

pub use annotation::{Annotation, AnnotationKind, ChildAnnotation, ChildRole, children};
pub use filter::{IssueFilter, IssuePeriod, MarkerFilter};
pub use sink::{MarkerId, NullSink, RenderSink};
pub use updater::{MarkerUpdater, RenderStats, RenderedAnnotation};
