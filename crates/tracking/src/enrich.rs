//! Server-side enrichment of an already tracked set.

use rustc_hash::FxHashMap;

use crate::issue::{IssueId, TrackedIssue};
use crate::server::ServerFinding;
use crate::trackable::Trackable;
use crate::tracker::{HasId, MatchTier, Pair, canonical_rank, claim, content_match, distance, sort_issues};

/// Counters for one enrichment pass over a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichOutcome {
	/// Issues bound to a server record.
	pub matched: usize,
	/// Bound issues whose server-owned fields actually changed.
	pub updated: usize,
	/// Server records that matched no local issue.
	pub unmatched_server: usize,
}

impl EnrichOutcome {
	pub const fn changed(&self) -> bool {
		self.updated > 0
	}
}

/// Binds remote records to tracked issues and copies their server-owned fields.
///
/// Only the server-key and exact-content tiers apply: remote records carry
/// authoritative keys and hashes, so looser matches would only add noise.
/// Text ranges and every other locally derived field stay untouched.
pub fn apply_server_findings(issues: &mut [TrackedIssue], server: &[ServerFinding]) -> EnrichOutcome {
	let rank = canonical_rank(&*issues);
	let mut issue_claimed = vec![false; issues.len()];
	let mut server_claimed = vec![false; server.len()];
	let mut outcome = EnrichOutcome::default();

	for tier in [MatchTier::ServerKey, MatchTier::ExactContent] {
		let mut pairs = Vec::new();
		for (i, issue) in issues.iter().enumerate().filter(|(i, _)| !issue_claimed[*i]) {
			for (s, record) in server.iter().enumerate().filter(|(s, _)| !server_claimed[*s]) {
				let admissible = match tier {
					MatchTier::ServerKey => (issue.server_issue_key.as_deref() == Some(record.key.as_str())).then(|| distance(issue, record)),
					_ => content_match(tier, issue, record),
				};
				if let Some(distance) = admissible {
					pairs.push(Pair {
						strength: 0,
						distance,
						base_rank: rank[i],
						candidate: s,
						base: i,
						server: Some(s),
					});
				}
			}
		}
		for pair in claim(pairs, &mut issue_claimed, &mut server_claimed) {
			outcome.matched += 1;
			if issues[pair.base].adopt_server_state(&server[pair.candidate]) {
				outcome.updated += 1;
			}
		}
	}

	outcome.unmatched_server = server_claimed.iter().filter(|claimed| !**claimed).count();
	outcome
}

/// Rebuilds a file's taint set from the latest remote records.
///
/// Remote records are authoritative for taint, so the set is replaced; a
/// record whose key was already tracked keeps its previous id.
pub fn reconcile_taint(previous: &[TrackedIssue], records: &[ServerFinding]) -> Vec<TrackedIssue> {
	let known: FxHashMap<&str, IssueId> = previous
		.iter()
		.filter_map(|issue| issue.server_issue_key().map(|key| (key, issue.issue_id())))
		.collect();
	let mut taint: Vec<TrackedIssue> = records
		.iter()
		.map(|record| {
			let id = known.get(record.key.as_str()).copied().unwrap_or_default();
			TrackedIssue::from_server(id, record)
		})
		.collect();
	sort_issues(&mut taint);
	taint
}
