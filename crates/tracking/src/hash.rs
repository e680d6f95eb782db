use sonde_primitives::rope::{line_text, range_text};
use sonde_primitives::{Rope, TextRange};

/// Content digest used for line and range hashes.
///
/// Lowercase hex MD5 of the text with all whitespace removed, which makes the
/// hash insensitive to re-indentation and matches the digest servers publish.
pub fn checksum(text: &str) -> String {
	let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
	format!("{:x}", md5::compute(compact.as_bytes()))
}

/// Document content a finding's hashes are computed against.
#[derive(Debug, Clone)]
pub struct SourceText {
	rope: Rope,
}

impl SourceText {
	pub fn new(rope: Rope) -> Self {
		Self { rope }
	}

	pub fn rope(&self) -> &Rope {
		&self.rope
	}

	/// Hash of the whole 1-based line, or `None` past the end of the file.
	pub fn line_hash(&self, line: u32) -> Option<String> {
		line_text(self.rope.slice(..), line).map(|text| checksum(&text))
	}

	/// Hash of the exact snippet covered by `range`.
	pub fn range_hash(&self, range: &TextRange) -> Option<String> {
		range_text(self.rope.slice(..), range).map(|text| checksum(&text))
	}
}

impl From<&str> for SourceText {
	fn from(text: &str) -> Self {
		Self::new(Rope::from(text))
	}
}
