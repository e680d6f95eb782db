use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier of a configuration scope (project, workspace folder).
///
/// Readiness, exclusions and tracked-issue stores are all keyed by this id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(Arc<str>);

impl ScopeId {
	pub fn new(id: impl AsRef<str>) -> Self {
		Self(Arc::from(id.as_ref()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ScopeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for ScopeId {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for ScopeId {
	fn from(value: String) -> Self {
		Self(Arc::from(value))
	}
}

impl Serialize for ScopeId {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.0)
	}
}

impl<'de> Deserialize<'de> for ScopeId {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		String::deserialize(deserializer).map(Self::from)
	}
}

/// Scope-relative file path using `/` separators.
///
/// Normalized on construction: backslashes become `/` and a leading `./`
/// is stripped, so the same file always produces the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelPath(Arc<str>);

impl RelPath {
	pub fn new(path: impl AsRef<str>) -> Self {
		let normalized = path.as_ref().replace('\\', "/");
		let trimmed = normalized.trim_start_matches("./");
		Self(Arc::from(trimmed))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Whether the path stays inside the directory it is joined to: not
	/// absolute, no drive prefix, no `..` segment.
	pub fn is_contained(&self) -> bool {
		let path = &*self.0;
		!path.is_empty()
			&& !path.starts_with('/')
			&& !path.split('/').next().is_some_and(|first| first.ends_with(':'))
			&& path.split('/').all(|segment| segment != "..")
	}

	/// Returns the file extension without the dot, if any.
	pub fn extension(&self) -> Option<&str> {
		let name = self.0.rsplit('/').next()?;
		let (stem, ext) = name.rsplit_once('.')?;
		if stem.is_empty() || ext.is_empty() { None } else { Some(ext) }
	}
}

impl fmt::Display for RelPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for RelPath {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for RelPath {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl Serialize for RelPath {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.0)
	}
}

impl<'de> Deserialize<'de> for RelPath {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		String::deserialize(deserializer).map(Self::new)
	}
}

/// A file identified within its configuration scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileKey {
	pub scope: ScopeId,
	pub path: RelPath,
}

impl FileKey {
	pub fn new(scope: impl Into<ScopeId>, path: impl Into<RelPath>) -> Self {
		Self {
			scope: scope.into(),
			path: path.into(),
		}
	}
}

impl fmt::Display for FileKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.scope, self.path)
	}
}
