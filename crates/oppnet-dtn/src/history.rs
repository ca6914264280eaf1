//! Encounter history tracking
//!
//! Every policy keeps, per peer, the list of past contacts with that peer.
//! The mean gap between consecutive contacts is the shared "how often do
//! we meet" signal: rank engines use it to filter neighbours and the focus
//! engine uses it as its utility.
//!
//! Histories are append-only. Spans are recorded when a contact closes, so
//! each history is ordered by end time and is never reordered.

use std::collections::HashMap;

use oppnet_core::{PeerIdentity, SimTime};

/// The closed interval of one contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactSpan {
    /// When the contact started
    pub start: SimTime,
    /// When the contact ended
    pub end: SimTime,
}

impl ContactSpan {
    /// Create a span
    ///
    /// `end` is clamped so that a span never ends before it starts.
    pub fn new(start: SimTime, end: SimTime) -> Self {
        let end = if end < start { start } else { end };
        Self { start, end }
    }

    /// Length of the contact in seconds
    pub fn length(&self) -> f64 {
        self.end.since(self.start)
    }
}

/// Chronological list of contacts with one peer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncounterHistory {
    spans: Vec<ContactSpan>,
}

impl EncounterHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finished contact
    pub fn record(&mut self, span: ContactSpan) {
        self.spans.push(span);
    }

    /// Number of recorded contacts
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Check if no contact was recorded
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Iterate over recorded contacts, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &ContactSpan> {
        self.spans.iter()
    }

    /// Most recent contact
    pub fn last(&self) -> Option<&ContactSpan> {
        self.spans.last()
    }

    /// Mean gap between consecutive contacts
    ///
    /// Sums `start[i] - end[i - 1]` over consecutive pairs and divides by the
    /// number of recorded contacts (not the number of gaps). An empty or
    /// single-contact history yields `0`.
    pub fn average_gap(&self) -> f64 {
        if self.spans.is_empty() {
            return 0.0;
        }

        let total: f64 = self
            .spans
            .windows(2)
            .map(|pair| pair[1].start.since(pair[0].end))
            .sum();

        total / self.spans.len() as f64
    }
}

/// Per-peer encounter bookkeeping for one node
///
/// Holds the histories of finished contacts and the start time of every
/// contact currently open.
#[derive(Debug, Clone)]
pub struct EncounterTracker<I: PeerIdentity> {
    histories: HashMap<I, EncounterHistory>,
    starts: HashMap<I, SimTime>,
}

impl<I: PeerIdentity> Default for EncounterTracker<I> {
    fn default() -> Self {
        Self {
            histories: HashMap::new(),
            starts: HashMap::new(),
        }
    }
}

impl<I: PeerIdentity> EncounterTracker<I> {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of a contact with `peer`
    pub fn open(&mut self, peer: &I, now: SimTime) {
        self.starts.insert(peer.clone(), now);
    }

    /// Close the contact with `peer` and return its span
    ///
    /// A missing start time counts as the start of the simulation. The start
    /// time is removed, so a second call for the same contact yields a span
    /// starting at zero rather than reusing stale state. The span is not
    /// recorded; policies decide that themselves.
    pub fn close(&mut self, peer: &I, now: SimTime) -> ContactSpan {
        let start = self.starts.remove(peer).unwrap_or(SimTime::ZERO);
        ContactSpan::new(start, now)
    }

    /// Start time of the open contact with `peer`
    pub fn contact_start(&self, peer: &I) -> Option<SimTime> {
        self.starts.get(peer).copied()
    }

    /// Get the history for `peer`, creating an empty one if needed
    pub fn touch(&mut self, peer: &I) -> &mut EncounterHistory {
        self.histories.entry(peer.clone()).or_default()
    }

    /// Append a finished contact to `peer`'s history
    pub fn record(&mut self, peer: &I, span: ContactSpan) {
        self.touch(peer).record(span);
    }

    /// History with `peer`, if any
    pub fn history(&self, peer: &I) -> Option<&EncounterHistory> {
        self.histories.get(peer)
    }

    /// Read-only view of `peer`'s history for another node's engine
    pub fn snapshot_history(&self, peer: &I) -> Option<&EncounterHistory> {
        self.history(peer)
    }

    /// Mean inter-contact gap with `peer`, `0` if never met
    pub fn average_gap(&self, peer: &I) -> f64 {
        self.histories
            .get(peer)
            .map(EncounterHistory::average_gap)
            .unwrap_or(0.0)
    }

    /// Peers with a history entry, in identity order
    pub fn known_peers(&self) -> Vec<I> {
        let mut peers: Vec<I> = self.histories.keys().cloned().collect();
        peers.sort();
        peers
    }

    /// Total number of recorded contacts over all peers
    pub fn total_contacts(&self) -> usize {
        self.histories.values().map(EncounterHistory::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oppnet_core::NodeAddress;
    use proptest::prelude::*;

    fn span(start: f64, end: f64) -> ContactSpan {
        ContactSpan::new(SimTime(start), SimTime(end))
    }

    #[test]
    fn test_span_clamps_end() {
        let s = span(30.0, 10.0);
        assert_eq!(s.start, SimTime(30.0));
        assert_eq!(s.end, SimTime(30.0));
        assert_eq!(s.length(), 0.0);
    }

    #[test]
    fn test_empty_history_gap_is_zero() {
        assert_eq!(EncounterHistory::new().average_gap(), 0.0);
    }

    #[test]
    fn test_single_contact_gap_is_zero() {
        let mut history = EncounterHistory::new();
        history.record(span(10.0, 40.0));
        assert_eq!(history.average_gap(), 0.0);
    }

    #[test]
    fn test_average_gap_divides_by_record_count() {
        let mut history = EncounterHistory::new();
        history.record(span(0.0, 10.0));
        history.record(span(30.0, 40.0));
        history.record(span(100.0, 110.0));

        // gaps: 20 + 60 = 80, over 3 records
        assert!((history.average_gap() - 80.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_close_defaults_start_to_zero() {
        let mut tracker: EncounterTracker<NodeAddress> = EncounterTracker::new();
        let peer = NodeAddress(1);

        let s = tracker.close(&peer, SimTime(25.0));
        assert_eq!(s, span(0.0, 25.0));
    }

    #[test]
    fn test_close_clears_start() {
        let mut tracker: EncounterTracker<NodeAddress> = EncounterTracker::new();
        let peer = NodeAddress(1);

        tracker.open(&peer, SimTime(10.0));
        assert_eq!(tracker.contact_start(&peer), Some(SimTime(10.0)));

        let first = tracker.close(&peer, SimTime(40.0));
        assert_eq!(first, span(10.0, 40.0));
        assert_eq!(tracker.contact_start(&peer), None);

        // Closing again does not reuse the old start
        let second = tracker.close(&peer, SimTime(40.0));
        assert_eq!(second.start, SimTime::ZERO);
    }

    #[test]
    fn test_tracker_unknown_peer_gap_is_zero() {
        let tracker: EncounterTracker<NodeAddress> = EncounterTracker::new();
        assert_eq!(tracker.average_gap(&NodeAddress(5)), 0.0);
        assert!(tracker.snapshot_history(&NodeAddress(5)).is_none());
    }

    #[test]
    fn test_touch_creates_empty_history() {
        let mut tracker: EncounterTracker<NodeAddress> = EncounterTracker::new();
        tracker.touch(&NodeAddress(3));

        assert_eq!(tracker.known_peers(), vec![NodeAddress(3)]);
        assert_eq!(tracker.total_contacts(), 0);
    }

    #[test]
    fn test_known_peers_sorted() {
        let mut tracker: EncounterTracker<NodeAddress> = EncounterTracker::new();
        tracker.record(&NodeAddress(4), span(0.0, 1.0));
        tracker.record(&NodeAddress(2), span(0.0, 1.0));
        tracker.record(&NodeAddress(2), span(5.0, 6.0));

        assert_eq!(tracker.known_peers(), vec![NodeAddress(2), NodeAddress(4)]);
        assert_eq!(tracker.total_contacts(), 3);
    }

    /// Chronological, non-overlapping spans built from (gap, length) pairs
    fn chronological(parts: &[(f64, f64)]) -> Vec<ContactSpan> {
        let mut t = 0.0;
        parts
            .iter()
            .map(|(gap, len)| {
                let start = t + gap;
                t = start + len;
                span(start, t)
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_average_gap_matches_pairwise_sum(
            parts in prop::collection::vec((0.0f64..1_000.0, 0.0f64..500.0), 0..40)
        ) {
            let spans = chronological(&parts);
            let mut history = EncounterHistory::new();
            for s in &spans {
                history.record(*s);
            }

            let avg = history.average_gap();
            if spans.len() <= 1 {
                prop_assert_eq!(avg, 0.0);
            } else {
                // Gaps after the first contact are exactly the generated gaps
                let expected: f64 = parts[1..].iter().map(|(gap, _)| gap).sum::<f64>()
                    / spans.len() as f64;
                prop_assert!((avg - expected).abs() < 1e-6);
                prop_assert!(avg >= 0.0);
            }
        }

        #[test]
        fn prop_average_gap_ignores_contact_lengths(
            gaps in prop::collection::vec(0.0f64..1_000.0, 2..20),
            lengths_a in prop::collection::vec(0.0f64..500.0, 20),
            lengths_b in prop::collection::vec(0.0f64..500.0, 20),
        ) {
            let parts_a: Vec<_> = gaps.iter().copied().zip(lengths_a).collect();
            let parts_b: Vec<_> = gaps.iter().copied().zip(lengths_b).collect();

            let mut a = EncounterHistory::new();
            chronological(&parts_a).into_iter().for_each(|s| a.record(s));
            let mut b = EncounterHistory::new();
            chronological(&parts_b).into_iter().for_each(|s| b.record(s));

            prop_assert!((a.average_gap() - b.average_gap()).abs() < 1e-6);
        }
    }
}
