//! Reconciliation of a run's raw findings against the previously tracked set.
//!
//! Matching runs tier by tier, strongest signal first. Inside one tier every
//! admissible (previous, raw) pair is collected and claimed greedily in the
//! order `(strength, line distance, previous rank, raw index)`. The previous
//! rank is a canonical order over the previous issues, so the result does not
//! depend on how the previous set was stored; the raw index breaks the
//! remaining ties in engine order.

use chrono::{DateTime, Utc};
use sonde_primitives::range::line_distance;

use crate::finding::RawFinding;
use crate::issue::TrackedIssue;
use crate::server::ServerFinding;
use crate::trackable::Trackable;

/// Maximum line distance for a proximity match.
pub const PROXIMITY_WINDOW: u32 = 3;

/// Matching tiers, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatchTier {
	/// The previous issue's server key resolves to a remote record that
	/// locates the raw finding.
	ServerKey,
	/// Same rule and byte-identical range content.
	ExactContent,
	/// Same rule and identical enclosing line, offsets moved.
	LineContent,
	/// Same rule on a nearby line.
	Proximity,
}

impl MatchTier {
	pub const ALL: [Self; 4] = [Self::ServerKey, Self::ExactContent, Self::LineContent, Self::Proximity];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ServerKey => "server_key",
			Self::ExactContent => "exact_content",
			Self::LineContent => "line_content",
			Self::Proximity => "proximity",
		}
	}
}

/// Display-policy knobs that affect what survives tracking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerPolicy {
	/// Keep server-linked issues that no longer match locally, marked resolved.
	pub retain_unmatched_server_issues: bool,
}

/// Counters for one tracking pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackingStats {
	pub server_key: usize,
	pub exact: usize,
	pub line: usize,
	pub proximity: usize,
	pub created: usize,
	pub dropped: usize,
	pub retained: usize,
}

impl TrackingStats {
	pub const fn matched(&self) -> usize {
		self.server_key + self.exact + self.line + self.proximity
	}

	fn record(&mut self, tier: MatchTier) {
		match tier {
			MatchTier::ServerKey => self.server_key += 1,
			MatchTier::ExactContent => self.exact += 1,
			MatchTier::LineContent => self.line += 1,
			MatchTier::Proximity => self.proximity += 1,
		}
	}
}

/// Result of one tracking pass for a file.
#[derive(Debug, Clone)]
pub struct TrackingOutcome {
	pub issues: Vec<TrackedIssue>,
	pub stats: TrackingStats,
}

/// The issue reconciliation algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct IssueTracker {
	policy: TrackerPolicy,
}

impl IssueTracker {
	pub const fn new(policy: TrackerPolicy) -> Self {
		Self { policy }
	}

	pub const fn policy(&self) -> TrackerPolicy {
		self.policy
	}

	/// Maps `raw` onto `previous` and returns the file's new tracked set.
	///
	/// `server` holds the remote records known for the file; it feeds the
	/// server-key tier and may be empty. `now` stamps newly minted issues.
	pub fn track(&self, previous: &[TrackedIssue], raw: Vec<RawFinding>, server: &[ServerFinding], now: DateTime<Utc>) -> TrackingOutcome {
		let rank = canonical_rank(previous);
		let mut prev_claimed = vec![false; previous.len()];
		let mut raw_claimed = vec![false; raw.len()];
		let mut bindings: Vec<Option<Binding>> = vec![None; raw.len()];

		for tier in MatchTier::ALL {
			let pairs = match tier {
				MatchTier::ServerKey => server_key_pairs(previous, &rank, &raw, server, &prev_claimed, &raw_claimed),
				_ => content_pairs(tier, previous, &rank, &raw, &prev_claimed, &raw_claimed),
			};
			for pair in claim(pairs, &mut prev_claimed, &mut raw_claimed) {
				bindings[pair.candidate] = Some(Binding {
					previous: pair.base,
					tier,
					server: pair.server,
				});
			}
		}

		let mut stats = TrackingStats::default();
		let mut issues = Vec::with_capacity(raw.len());

		for (finding, binding) in raw.into_iter().zip(bindings) {
			match binding {
				Some(binding) => {
					stats.record(binding.tier);
					let mut issue = previous[binding.previous].clone();
					issue.refresh_from(finding);
					if let Some(record) = binding.server.map(|idx| &server[idx]) {
						issue.resolved = record.resolved;
					}
					issues.push(issue);
				}
				None => {
					stats.created += 1;
					issues.push(TrackedIssue::from_raw(finding, now));
				}
			}
		}

		for (idx, issue) in previous.iter().enumerate() {
			if prev_claimed[idx] {
				continue;
			}
			if self.policy.retain_unmatched_server_issues && issue.server_issue_key.is_some() {
				let mut kept = issue.clone();
				kept.resolved = true;
				issues.push(kept);
				stats.retained += 1;
			} else {
				stats.dropped += 1;
			}
		}

		sort_issues(&mut issues);
		tracing::trace!(
			matched = stats.matched(),
			created = stats.created,
			dropped = stats.dropped,
			retained = stats.retained,
			"tracking.pass"
		);
		TrackingOutcome { issues, stats }
	}
}

/// Stable presentation order for a file's issues.
pub(crate) fn sort_issues(issues: &mut [TrackedIssue]) {
	issues.sort_by(|a, b| {
		a.text_range
			.cmp(&b.text_range)
			.then_with(|| a.rule_key.cmp(&b.rule_key))
			.then_with(|| a.id().cmp(&b.id()))
	});
}

#[derive(Debug, Clone, Copy)]
struct Binding {
	previous: usize,
	tier: MatchTier,
	server: Option<usize>,
}

/// One admissible match inside a tier.
///
/// Field order is the claim order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Pair {
	pub strength: u8,
	pub distance: u32,
	pub base_rank: usize,
	pub candidate: usize,
	pub base: usize,
	pub server: Option<usize>,
}

/// Claims pairs greedily in sort order, skipping already claimed sides.
pub(crate) fn claim(mut pairs: Vec<Pair>, base_claimed: &mut [bool], cand_claimed: &mut [bool]) -> Vec<Pair> {
	pairs.sort_unstable();
	let mut won = Vec::new();
	for pair in pairs {
		if base_claimed[pair.base] || cand_claimed[pair.candidate] {
			continue;
		}
		base_claimed[pair.base] = true;
		cand_claimed[pair.candidate] = true;
		won.push(pair);
	}
	won
}

/// Rank of every issue in a canonical order independent of storage order.
pub(crate) fn canonical_rank<T: Trackable + HasId>(issues: &[T]) -> Vec<usize> {
	let mut order: Vec<usize> = (0..issues.len()).collect();
	order.sort_by(|&a, &b| {
		let (a, b) = (&issues[a], &issues[b]);
		a.text_range()
			.cmp(&b.text_range())
			.then_with(|| a.rule_key().cmp(b.rule_key()))
			.then_with(|| a.text_range_hash().cmp(&b.text_range_hash()))
			.then_with(|| a.issue_id().cmp(&b.issue_id()))
	});
	let mut rank = vec![0; issues.len()];
	for (position, idx) in order.into_iter().enumerate() {
		rank[idx] = position;
	}
	rank
}

/// Tiebreak identity for canonical ordering.
pub(crate) trait HasId {
	fn issue_id(&self) -> crate::IssueId;
}

impl HasId for TrackedIssue {
	fn issue_id(&self) -> crate::IssueId {
		self.id()
	}
}

/// Line distance between two findings, zero when either is file-level.
pub(crate) fn distance(a: &impl Trackable, b: &impl Trackable) -> u32 {
	line_distance(a.line(), b.line()).unwrap_or(0)
}

/// Admissibility test for the content tiers, returning the line distance.
pub(crate) fn content_match(tier: MatchTier, base: &impl Trackable, candidate: &impl Trackable) -> Option<u32> {
	if base.rule_key() != candidate.rule_key() {
		return None;
	}
	match tier {
		MatchTier::ServerKey => None,
		MatchTier::ExactContent => {
			if base.is_file_level() && candidate.is_file_level() {
				return (base.message() == candidate.message()).then_some(0);
			}
			match (base.text_range_hash(), candidate.text_range_hash()) {
				(Some(a), Some(b)) if a == b => Some(distance(base, candidate)),
				_ => None,
			}
		}
		MatchTier::LineContent => match (base.line_hash(), candidate.line_hash()) {
			(Some(a), Some(b)) if a == b => line_distance(base.line(), candidate.line()),
			_ => None,
		},
		MatchTier::Proximity => line_distance(base.line(), candidate.line()).filter(|d| *d <= PROXIMITY_WINDOW),
	}
}

fn content_pairs(
	tier: MatchTier,
	previous: &[TrackedIssue],
	rank: &[usize],
	raw: &[RawFinding],
	prev_claimed: &[bool],
	raw_claimed: &[bool],
) -> Vec<Pair> {
	let mut pairs = Vec::new();
	for (p, prev) in previous.iter().enumerate().filter(|(p, _)| !prev_claimed[*p]) {
		for (r, finding) in raw.iter().enumerate().filter(|(r, _)| !raw_claimed[*r]) {
			if let Some(distance) = content_match(tier, prev, finding) {
				pairs.push(Pair {
					strength: 0,
					distance,
					base_rank: rank[p],
					candidate: r,
					base: p,
					server: None,
				});
			}
		}
	}
	pairs
}

/// Pairs for the server-key tier.
///
/// A previous issue linked to key `K` looks up the remote record with key `K`
/// and binds to the raw finding that record locates: by range hash, then by
/// line hash, then by proximity to the record's line.
fn server_key_pairs(
	previous: &[TrackedIssue],
	rank: &[usize],
	raw: &[RawFinding],
	server: &[ServerFinding],
	prev_claimed: &[bool],
	raw_claimed: &[bool],
) -> Vec<Pair> {
	let mut pairs = Vec::new();
	if server.is_empty() {
		return pairs;
	}
	for (p, prev) in previous.iter().enumerate().filter(|(p, _)| !prev_claimed[*p]) {
		let Some(key) = prev.server_issue_key.as_deref() else {
			continue;
		};
		let Some((s, record)) = server.iter().enumerate().find(|(_, record)| record.key == key) else {
			continue;
		};
		for (r, finding) in raw.iter().enumerate().filter(|(r, _)| !raw_claimed[*r]) {
			if finding.rule_key != prev.rule_key || finding.rule_key != record.rule_key {
				continue;
			}
			if let Some(strength) = locate_by_record(record, finding) {
				pairs.push(Pair {
					strength,
					distance: distance(record, finding),
					base_rank: rank[p],
					candidate: r,
					base: p,
					server: Some(s),
				});
			}
		}
	}
	pairs
}

fn locate_by_record(record: &ServerFinding, finding: &RawFinding) -> Option<u8> {
	if record.is_file_level() && finding.is_file_level() {
		return Some(0);
	}
	if let (Some(a), Some(b)) = (record.text_range_hash(), finding.text_range_hash())
		&& a == b
	{
		return Some(0);
	}
	if let (Some(a), Some(b)) = (record.line_hash(), finding.line_hash())
		&& a == b
	{
		return Some(1);
	}
	line_distance(record.line(), finding.line())
		.filter(|d| *d <= PROXIMITY_WINDOW)
		.map(|_| 2)
}
