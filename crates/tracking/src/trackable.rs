use sonde_primitives::TextRange;

/// Comparison view shared by raw findings, tracked issues and server records.
///
/// Every matching tier only looks at a finding through this trait, so the
/// same algorithm applies whatever the finding's origin.
pub trait Trackable {
	fn rule_key(&self) -> &str;

	fn message(&self) -> &str;

	fn text_range(&self) -> Option<&TextRange>;

	/// Hash of the full line the finding starts on.
	fn line_hash(&self) -> Option<&str>;

	/// Hash of the exact snippet the finding covers.
	fn text_range_hash(&self) -> Option<&str>;

	/// Key of the matching remote record, if the finding is server-linked.
	fn server_issue_key(&self) -> Option<&str> {
		None
	}

	/// 1-based start line; `None` for file-level findings.
	fn line(&self) -> Option<u32> {
		self.text_range().map(|r| r.start_line)
	}

	fn is_file_level(&self) -> bool {
		self.text_range().is_none()
	}
}
