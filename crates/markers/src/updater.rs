//! Diffing of tracked issues against rendered annotations.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use sonde_primitives::{FileKey, ScopeId};
use sonde_tracking::{IssueId, TrackedIssue};

use crate::annotation::{Annotation, AnnotationKind, ChildAnnotation, children};
use crate::filter::MarkerFilter;
use crate::sink::{MarkerId, RenderSink};

/// One annotation currently shown by the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedAnnotation {
	pub marker: MarkerId,
	pub annotation: Annotation,
	pub children: Vec<ChildAnnotation>,
}

/// Sink calls issued by one render pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
	pub created: usize,
	pub updated: usize,
	pub deleted: usize,
	pub unchanged: usize,
}

impl RenderStats {
	pub const fn mutations(&self) -> usize {
		self.created + self.updated + self.deleted
	}

	fn add(&mut self, other: Self) {
		self.created += other.created;
		self.updated += other.updated;
		self.deleted += other.deleted;
		self.unchanged += other.unchanged;
	}
}

type Layer = FxHashMap<IssueId, RenderedAnnotation>;

/// Owns the rendered annotation set and keeps the sink in sync with it.
///
/// Tracked issues are only read. Each layer (file and [`AnnotationKind`]) is
/// diffed independently, so clearing report annotations never touches
/// on-the-fly ones.
pub struct MarkerUpdater {
	sink: Arc<dyn RenderSink>,
	layers: Mutex<FxHashMap<(FileKey, AnnotationKind), Layer>>,
}

impl MarkerUpdater {
	pub fn new(sink: Arc<dyn RenderSink>) -> Self {
		Self {
			sink,
			layers: Mutex::new(FxHashMap::default()),
		}
	}

	/// Brings one layer of `file` in line with `issues`.
	///
	/// Creates annotations for new admitted issues, updates those whose
	/// projection changed and deletes the rest. Children are resent in full
	/// with every create or update.
	pub fn render(&self, file: &FileKey, kind: AnnotationKind, issues: &[TrackedIssue], filter: &MarkerFilter) -> RenderStats {
		let mut layers = self.layers.lock();
		let mut previous = layers.remove(&(file.clone(), kind)).unwrap_or_default();
		let mut next = Layer::default();
		let mut stats = RenderStats::default();

		for issue in issues.iter().filter(|issue| filter.admits(issue)) {
			let annotation = Annotation::from_issue(issue, kind);
			let kids = children(issue);
			let rendered = match previous.remove(&issue.id()) {
				Some(old) if old.annotation == annotation && old.children == kids => {
					stats.unchanged += 1;
					old
				}
				Some(old) => {
					self.sink.update(file, old.marker, &annotation);
					self.sink.set_children(file, old.marker, &kids);
					stats.updated += 1;
					RenderedAnnotation {
						marker: old.marker,
						annotation,
						children: kids,
					}
				}
				None => {
					let marker = self.sink.create(file, &annotation);
					if !kids.is_empty() {
						self.sink.set_children(file, marker, &kids);
					}
					stats.created += 1;
					RenderedAnnotation {
						marker,
						annotation,
						children: kids,
					}
				}
			};
			next.insert(issue.id(), rendered);
		}

		for stale in sorted(previous) {
			self.sink.delete(file, stale.marker);
			stats.deleted += 1;
		}

		if !next.is_empty() {
			layers.insert((file.clone(), kind), next);
		}
		drop(layers);

		if stats.mutations() > 0 {
			tracing::trace!(
				file = %file,
				kind = kind.as_str(),
				created = stats.created,
				updated = stats.updated,
				deleted = stats.deleted,
				"markers.render"
			);
		}
		stats
	}

	/// Deletes every annotation of `file` in all layers.
	pub fn clear_file(&self, file: &FileKey) -> RenderStats {
		let mut layers = self.layers.lock();
		let keys: Vec<_> = layers.keys().filter(|(f, _)| f == file).cloned().collect();
		let mut stats = RenderStats::default();
		for key in keys {
			if let Some(layer) = layers.remove(&key) {
				stats.add(self.delete_layer(&key.0, layer));
			}
		}
		stats
	}

	/// Deletes every annotation of one kind across a scope.
	pub fn clear_kind(&self, scope: &ScopeId, kind: AnnotationKind) -> RenderStats {
		self.clear_where(|f, k| &f.scope == scope && k == kind)
	}

	/// Deletes every annotation of a scope.
	pub fn clear_scope(&self, scope: &ScopeId) -> RenderStats {
		self.clear_where(|f, _| &f.scope == scope)
	}

	/// Everything shown for `file`, ordered by layer then location.
	pub fn rendered(&self, file: &FileKey) -> Vec<RenderedAnnotation> {
		let layers = self.layers.lock();
		let mut kinds: Vec<_> = layers.iter().filter(|((f, _), _)| f == file).collect();
		kinds.sort_by_key(|((_, kind), _)| *kind);
		kinds.into_iter().flat_map(|(_, layer)| sorted(layer.clone())).collect()
	}

	/// Marker of `issue` in a layer, if rendered.
	pub fn marker_of(&self, file: &FileKey, kind: AnnotationKind, issue: IssueId) -> Option<MarkerId> {
		self.layers.lock().get(&(file.clone(), kind))?.get(&issue).map(|r| r.marker)
	}

	fn clear_where(&self, pred: impl Fn(&FileKey, AnnotationKind) -> bool) -> RenderStats {
		let mut layers = self.layers.lock();
		let mut keys: Vec<_> = layers.keys().filter(|(f, k)| pred(f, *k)).cloned().collect();
		keys.sort();
		let mut stats = RenderStats::default();
		for key in keys {
			if let Some(layer) = layers.remove(&key) {
				stats.add(self.delete_layer(&key.0, layer));
			}
		}
		stats
	}

	fn delete_layer(&self, file: &FileKey, layer: Layer) -> RenderStats {
		let mut stats = RenderStats::default();
		for rendered in sorted(layer) {
			self.sink.delete(file, rendered.marker);
			stats.deleted += 1;
		}
		stats
	}
}

impl std::fmt::Debug for MarkerUpdater {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MarkerUpdater").field("layers", &self.layers.lock().len()).finish_non_exhaustive()
	}
}

/// Layer contents in location order, for stable sink call sequences.
fn sorted(layer: Layer) -> Vec<RenderedAnnotation> {
	let mut items: Vec<_> = layer.into_values().collect();
	items.sort_by(|a, b| {
		a.annotation
			.range
			.cmp(&b.annotation.range)
			.then_with(|| a.annotation.rule_key.cmp(&b.annotation.rule_key))
			.then_with(|| a.marker.cmp(&b.marker))
	});
	items
}
