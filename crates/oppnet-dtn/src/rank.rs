//! PeopleRank scoring shared by both rank engines
//!
//! PeopleRank is PageRank over the social contact graph:
//!
//! ```text
//! rank(h) = (1 - d) + d * sum over peers p of rank(p) / degree(p)
//! ```
//!
//! There is no global iteration. Each node stores, per peer, the last score
//! and degree it computed for that peer, and evaluates the formula lazily
//! over whatever table it is handed.

use std::collections::HashMap;

use oppnet_core::PeerIdentity;

/// Last known (score, degree) of one peer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankEntry {
    /// Last computed centrality of the peer
    pub score: f64,
    /// Normalisation weight of the peer's contribution
    pub degree: u32,
}

impl RankEntry {
    /// Create an entry
    pub fn new(score: f64, degree: u32) -> Self {
        Self { score, degree }
    }

    /// This entry's share of the neighbour sum
    ///
    /// A zero degree is treated as one.
    pub fn contribution(&self) -> f64 {
        self.score / f64::from(self.degree.max(1))
    }
}

/// Rank context of one node: a `RankEntry` per peer
///
/// Entries are overwritten wholesale, never merged.
#[derive(Debug, Clone)]
pub struct RankTable<I: PeerIdentity> {
    entries: HashMap<I, RankEntry>,
}

impl<I: PeerIdentity> Default for RankTable<I> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<I: PeerIdentity> RankTable<I> {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the entry for `peer`
    pub fn insert(&mut self, peer: I, entry: RankEntry) {
        self.entries.insert(peer, entry);
    }

    /// Get the entry for `peer`
    pub fn get(&self, peer: &I) -> Option<&RankEntry> {
        self.entries.get(peer)
    }

    /// Check if `peer` has an entry
    pub fn contains(&self, peer: &I) -> bool {
        self.entries.contains_key(peer)
    }

    /// Number of peers in the table
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = (&I, &RankEntry)> {
        self.entries.iter()
    }

    /// Sum of `score / degree` over all entries
    pub fn contribution_sum(&self) -> f64 {
        self.entries.values().map(RankEntry::contribution).sum()
    }
}

/// PeopleRank from a precomputed neighbour sum
pub fn people_rank_from_sum(damping_factor: f64, contribution_sum: f64) -> f64 {
    (1.0 - damping_factor) + damping_factor * contribution_sum
}

/// PeopleRank of the node owning `table`, using `damping_factor`
///
/// The damping factor is the caller's, not the table owner's: a node
/// always evaluates everyone with its own configuration.
pub fn people_rank<I: PeerIdentity>(damping_factor: f64, table: &RankTable<I>) -> f64 {
    people_rank_from_sum(damping_factor, table.contribution_sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oppnet_core::NodeAddress;
    use proptest::prelude::*;

    #[test]
    fn test_isolated_node_rank() {
        let table: RankTable<NodeAddress> = RankTable::new();
        assert!((people_rank(0.85, &table) - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_rank_sums_contributions() {
        let mut table = RankTable::new();
        table.insert(NodeAddress(1), RankEntry::new(1.0, 2));
        table.insert(NodeAddress(2), RankEntry::new(0.6, 3));

        // 0.5 + 0.2 = 0.7
        assert!((table.contribution_sum() - 0.7).abs() < 1e-12);
        assert!((people_rank(0.5, &table) - (0.5 + 0.35)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_degree_counts_as_one() {
        assert_eq!(RankEntry::new(0.4, 0).contribution(), 0.4);
    }

    #[test]
    fn test_insert_overwrites() {
        let mut table = RankTable::new();
        table.insert(NodeAddress(1), RankEntry::new(1.0, 2));
        table.insert(NodeAddress(1), RankEntry::new(0.3, 1));

        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&NodeAddress(1)), Some(&RankEntry::new(0.3, 1)));
    }

    proptest! {
        #[test]
        fn prop_rank_at_least_teleport_term(
            damping in 0.0f64..=1.0,
            entries in prop::collection::vec((0.0f64..10.0, 1u32..50), 0..30),
        ) {
            let mut table = RankTable::new();
            for (i, (score, degree)) in entries.iter().enumerate() {
                table.insert(NodeAddress(i as u32), RankEntry::new(*score, *degree));
            }
            prop_assert!(people_rank(damping, &table) >= (1.0 - damping) - 1e-12);
        }

        #[test]
        fn prop_rank_increases_with_peer_score(
            damping in 0.01f64..=1.0,
            score in 0.0f64..10.0,
            bump in 0.001f64..5.0,
            degree in 1u32..20,
        ) {
            let mut low = RankTable::new();
            low.insert(NodeAddress(1), RankEntry::new(score, degree));
            let mut high = RankTable::new();
            high.insert(NodeAddress(1), RankEntry::new(score + bump, degree));

            prop_assert!(people_rank(damping, &high) > people_rank(damping, &low));
        }
    }
}
