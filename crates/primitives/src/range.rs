use serde::{Deserialize, Serialize};

/// A region of a source file.
///
/// Lines are 1-based, offsets are 0-based character offsets within their line.
/// The end position is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRange {
	pub start_line: u32,
	pub start_line_offset: u32,
	pub end_line: u32,
	pub end_line_offset: u32,
}

impl TextRange {
	pub const fn new(start_line: u32, start_line_offset: u32, end_line: u32, end_line_offset: u32) -> Self {
		Self {
			start_line,
			start_line_offset,
			end_line,
			end_line_offset,
		}
	}

	/// Creates a range covering a whole line up to `len` characters.
	pub const fn line(line: u32, len: u32) -> Self {
		Self::new(line, 0, line, len)
	}

	/// Returns true when the range spans more than one line.
	pub const fn is_multiline(&self) -> bool {
		self.end_line > self.start_line
	}

	/// Returns the same range moved by `delta` lines, saturating at line 1.
	pub fn shifted(&self, delta: i64) -> Self {
		let shift = |line: u32| (i64::from(line) + delta).clamp(1, i64::from(u32::MAX)) as u32;
		Self {
			start_line: shift(self.start_line),
			end_line: shift(self.end_line),
			..*self
		}
	}
}

/// Absolute distance between two optional start lines.
///
/// Returns `None` when either side has no line (file-level finding).
pub fn line_distance(a: Option<u32>, b: Option<u32>) -> Option<u32> {
	match (a, b) {
		(Some(a), Some(b)) => Some(a.abs_diff(b)),
		_ => None,
	}
}
