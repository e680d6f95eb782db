//! Analysis property sources and their merge order.

use std::collections::BTreeMap;

use sonde_primitives::{RelPath, ScopeId};

pub type Properties = BTreeMap<String, String>;

/// Deprecated per-file property contributor.
///
/// Only consulted when the pipeline runs with legacy configurators enabled.
pub trait FileConfigurator: Send + Sync {
	fn name(&self) -> &str;

	fn configure(&self, scope: &ScopeId, file: &RelPath) -> Properties;
}

/// Property contributor invoked once per run.
pub trait AnalysisConfigurator: Send + Sync {
	fn name(&self) -> &str;

	fn properties(&self, scope: &ScopeId, files: &[RelPath]) -> Properties;

	/// Called after the run's results have been rendered.
	fn analysis_complete(&self, _scope: &ScopeId, _files: &[RelPath]) {}
}

/// Merges property layers, later layers overriding earlier ones.
///
/// Overrides are logged, never rejected.
pub fn merge_properties<'a>(layers: impl IntoIterator<Item = (&'a str, Properties)>) -> Properties {
	let mut merged = Properties::new();
	let mut origin: BTreeMap<String, &'a str> = BTreeMap::new();
	for (source, layer) in layers {
		for (key, value) in layer {
			if let Some(previous) = merged.get(&key)
				&& *previous != value
			{
				tracing::debug!(
					key = %key,
					previous = %previous,
					value = %value,
					overridden = origin.get(&key).copied().unwrap_or_default(),
					by = source,
					"Analysis property overridden"
				);
			}
			origin.insert(key.clone(), source);
			merged.insert(key, value);
		}
	}
	merged
}
