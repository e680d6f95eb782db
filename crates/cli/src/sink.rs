//! Render sink writing one JSON object per annotation operation.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use sonde_markers::{Annotation, ChildAnnotation, MarkerId, RenderSink};
use sonde_primitives::FileKey;

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Event<'a> {
	Create {
		file: &'a FileKey,
		marker: MarkerId,
		annotation: &'a Annotation,
	},
	Update {
		file: &'a FileKey,
		marker: MarkerId,
		annotation: &'a Annotation,
	},
	Delete {
		file: &'a FileKey,
		marker: MarkerId,
	},
	Children {
		file: &'a FileKey,
		parent: MarkerId,
		children: &'a [ChildAnnotation],
	},
}

/// Writes annotation operations as JSON lines.
pub struct JsonLinesSink<W> {
	out: Mutex<W>,
	next: AtomicU64,
}

impl<W: Write + Send> JsonLinesSink<W> {
	pub fn new(out: W) -> Self {
		Self {
			out: Mutex::new(out),
			next: AtomicU64::new(1),
		}
	}

	pub fn into_inner(self) -> W {
		self.out.into_inner()
	}

	fn emit(&self, event: &Event<'_>) {
		let mut out = self.out.lock();
		let written = serde_json::to_writer(&mut *out, event)
			.map_err(std::io::Error::from)
			.and_then(|()| out.write_all(b"\n"))
			.and_then(|()| out.flush());
		if let Err(err) = written {
			tracing::warn!(error = %err, "Failed to write annotation event");
		}
	}
}

impl<W: Write + Send> RenderSink for JsonLinesSink<W> {
	fn create(&self, file: &FileKey, annotation: &Annotation) -> MarkerId {
		let marker = MarkerId(self.next.fetch_add(1, Ordering::Relaxed));
		self.emit(&Event::Create { file, marker, annotation });
		marker
	}

	fn update(&self, file: &FileKey, marker: MarkerId, annotation: &Annotation) {
		self.emit(&Event::Update { file, marker, annotation });
	}

	fn delete(&self, file: &FileKey, marker: MarkerId) {
		self.emit(&Event::Delete { file, marker });
	}

	fn set_children(&self, file: &FileKey, parent: MarkerId, children: &[ChildAnnotation]) {
		self.emit(&Event::Children { file, parent, children });
	}
}
