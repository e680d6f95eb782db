//! Rope utilities for reading finding locations out of a document.

use ropey::RopeSlice;

use crate::TextRange;

/// Returns the text of a 1-based line without its line terminator.
pub fn line_text(text: RopeSlice, line: u32) -> Option<String> {
	let idx = line_index(text, line)?;
	let mut content = text.line(idx).to_string();
	let trimmed = content.trim_end_matches(['\n', '\r']).len();
	content.truncate(trimmed);
	Some(content)
}

/// Returns the exact text covered by a range.
///
/// Offsets past the end of their line are clamped to the line end. Returns
/// `None` if a line is out of bounds or the range is inverted.
pub fn range_text(text: RopeSlice, range: &TextRange) -> Option<String> {
	let start = char_at(text, range.start_line, range.start_line_offset)?;
	let end = char_at(text, range.end_line, range.end_line_offset)?;
	if start > end {
		return None;
	}
	Some(text.slice(start..end).to_string())
}

/// Number of characters on a line, excluding its terminator.
pub fn line_len(text: RopeSlice, line: u32) -> Option<usize> {
	let idx = line_index(text, line)?;
	let slice = text.line(idx);
	let mut len = slice.len_chars();
	while len > 0 && matches!(slice.char(len - 1), '\n' | '\r') {
		len -= 1;
	}
	Some(len)
}

fn line_index(text: RopeSlice, line: u32) -> Option<usize> {
	let idx = (line as usize).checked_sub(1)?;
	(idx < text.len_lines()).then_some(idx)
}

fn char_at(text: RopeSlice, line: u32, offset: u32) -> Option<usize> {
	let idx = line_index(text, line)?;
	let len = line_len(text, line)?;
	Some(text.line_to_char(idx) + (offset as usize).min(len))
}
