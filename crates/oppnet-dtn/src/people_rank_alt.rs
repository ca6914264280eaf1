//! PeopleRank with lazy refresh and neighbour filtering
//!
//! Variant of [`crate::people_rank`] that re-derives its whole rank table
//! every time a contact comes up, and only admits a peer as a social
//! neighbour while the two nodes meet often enough: the mean gap between
//! their past contacts must stay below `max_interconnection`.
//!
//! Only the engine of the currently connected peer can be read. Each
//! contact therefore snapshots that peer's neighbour sum, and refreshes use
//! the last snapshot taken of every other peer.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use oppnet_core::{
    ConfigError, ConfigResult, Contact, DecisionEngine, EngineResult, Message, PeerIdentity,
    SimTime,
};

use crate::centrality::Centralities;
use crate::history::EncounterTracker;
use crate::people_rank::{DAMPING_FACTOR, validate_damping};
use crate::rank::{RankEntry, RankTable, people_rank, people_rank_from_sum};
use crate::settings::Settings;

/// Settings namespace of the lazy engine
pub const NAMESPACE: &str = "PeopleRankAltRouter";
/// Maximum mean inter-contact gap setting
pub const MAX_INTERCONNECTION: &str = "maxInterconnection";

/// Configuration for lazy PeopleRank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeopleRankAltConfig {
    /// Damping factor `d` in `[0, 1]`
    pub damping_factor: f64,
    /// Peers are admitted while their mean gap is strictly below this
    pub max_interconnection: f64,
}

impl Default for PeopleRankAltConfig {
    fn default() -> Self {
        Self {
            damping_factor: 0.87,
            max_interconnection: 3600.0,
        }
    }
}

impl PeopleRankAltConfig {
    /// Read the config from the `PeopleRankAltRouter` namespace
    pub fn from_settings(settings: &Settings) -> ConfigResult<Self> {
        Self::from_namespace(settings, NAMESPACE)
    }

    /// Read the config from an arbitrary namespace
    pub fn from_namespace(settings: &Settings, namespace: &str) -> ConfigResult<Self> {
        let view = settings.namespace(namespace);
        let config = Self {
            damping_factor: view.get_f64(DAMPING_FACTOR)?,
            max_interconnection: view.get_f64(MAX_INTERCONNECTION)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        validate_damping(self.damping_factor)?;
        if self.max_interconnection.is_nan() || self.max_interconnection < 0.0 {
            return Err(ConfigError::OutOfRange {
                key: MAX_INTERCONNECTION.to_string(),
                reason: format!("must be non-negative, got {}", self.max_interconnection),
            });
        }
        Ok(())
    }
}

/// Lazy PeopleRank decision engine for one node
#[derive(Debug, Clone)]
pub struct PeopleRankAltEngine<I: PeerIdentity> {
    config: PeopleRankAltConfig,
    ranks: RankTable<I>,
    encounters: EncounterTracker<I>,
    /// Last neighbour sum seen for each peer while connected to it
    observed_sums: HashMap<I, f64>,
    neighbors: BTreeSet<I>,
}

impl<I: PeerIdentity> PeopleRankAltEngine<I> {
    /// Create an engine, rejecting invalid configuration
    pub fn new(config: PeopleRankAltConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::fresh(config))
    }

    fn fresh(config: PeopleRankAltConfig) -> Self {
        Self {
            config,
            ranks: RankTable::new(),
            encounters: EncounterTracker::new(),
            observed_sums: HashMap::new(),
            neighbors: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &PeopleRankAltConfig {
        &self.config
    }

    pub fn snapshot_rank_table(&self) -> &RankTable<I> {
        &self.ranks
    }

    pub fn encounters(&self) -> &EncounterTracker<I> {
        &self.encounters
    }

    /// Confirmed social neighbours, in identity order
    pub fn neighbors(&self) -> impl Iterator<Item = &I> {
        self.neighbors.iter()
    }

    /// Check if `peer` was admitted as a neighbour
    pub fn is_neighbor(&self, peer: &I) -> bool {
        self.neighbors.contains(peer)
    }

    /// This node's own PeopleRank
    pub fn rank(&self) -> f64 {
        people_rank(self.config.damping_factor, &self.ranks)
    }

    /// PeopleRank of another node, evaluated with this node's damping factor
    pub fn rank_of(&self, other: &Self) -> f64 {
        people_rank(self.config.damping_factor, other.snapshot_rank_table())
    }

    fn begin_contact(&mut self, peer: &I, now: SimTime) {
        self.encounters.open(peer, now);
    }

    /// Rebuild every entry of the rank table from the observed sums
    fn refresh_ranks(&mut self) {
        let damping = self.config.damping_factor;

        for peer in self.encounters.known_peers() {
            let sum = self.observed_sums.get(&peer).copied().unwrap_or(0.0);
            let score = people_rank_from_sum(damping, sum);
            self.ranks.insert(peer, RankEntry::new(score, 1));
        }
    }
}

impl<I: PeerIdentity> DecisionEngine<I> for PeopleRankAltEngine<I> {
    fn name(&self) -> &'static str {
        "people-rank-alt"
    }

    fn connection_up(&mut self, contact: &Contact<I>, peer_engine: &Self) -> EngineResult<()> {
        let sum = peer_engine.snapshot_rank_table().contribution_sum();
        self.observed_sums.insert(contact.peer.clone(), sum);
        self.refresh_ranks();

        tracing::debug!(
            peer = %contact.peer,
            observed_sum = sum,
            entries = self.ranks.len(),
            "Refreshed PeopleRank table"
        );
        Ok(())
    }

    fn connection_down(
        &mut self,
        contact: &Contact<I>,
        _peer_engine: &mut Self,
    ) -> EngineResult<()> {
        let peer = &contact.peer;
        let prior_gap = self.encounters.average_gap(peer);
        self.encounters.touch(peer);
        let span = self.encounters.close(peer, contact.now);

        if self.config.max_interconnection > prior_gap {
            self.encounters.record(peer, span);
            if self.neighbors.insert(peer.clone()) {
                tracing::debug!(peer = %peer, gap = prior_gap, "Admitted social neighbour");
            }
        } else {
            tracing::trace!(peer = %peer, gap = prior_gap, "Peer meets too rarely, contact not kept");
        }

        Ok(())
    }

    fn exchange_for_new_connection(
        &mut self,
        contact: &Contact<I>,
        peer_engine: &mut Self,
    ) -> EngineResult<()> {
        self.begin_contact(&contact.peer, contact.now);
        peer_engine.begin_contact(&contact.local, contact.now);
        Ok(())
    }

    fn new_message(&mut self, _message: &mut Message<I>) -> bool {
        true
    }

    fn should_save_received_message(
        &mut self,
        _message: &mut Message<I>,
        _this_node: &I,
    ) -> EngineResult<bool> {
        Ok(true)
    }

    fn should_send_message_to_host(
        &self,
        message: &Message<I>,
        other_node: &I,
        other_engine: &Self,
        this_node: &I,
    ) -> EngineResult<bool> {
        if message.is_addressed_to(other_node) {
            return Ok(true);
        }
        if message.is_addressed_to(this_node) {
            return Ok(false);
        }

        Ok(self.rank_of(other_engine) > self.rank())
    }

    fn should_delete_sent_message(
        &mut self,
        _message: &mut Message<I>,
        _other_node: &I,
    ) -> EngineResult<bool> {
        Ok(true)
    }

    fn replicate(&self) -> Self {
        Self::fresh(self.config.clone())
    }
}

impl<I: PeerIdentity> Centralities<I> for PeopleRankAltEngine<I> {
    fn global_centralities(&self, encounters: &EncounterTracker<I>) -> Vec<f64> {
        vec![
            self.rank(),
            self.ranks.len() as f64,
            encounters.total_contacts() as f64,
        ]
    }

    fn centralities(&self) -> Vec<f64> {
        self.global_centralities(&self.encounters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oppnet_core::{MessageId, NodeAddress, SimTime};

    const D: f64 = 0.5;

    fn engine(max_interconnection: f64) -> PeopleRankAltEngine<NodeAddress> {
        PeopleRankAltEngine::new(PeopleRankAltConfig {
            damping_factor: D,
            max_interconnection,
        })
        .unwrap()
    }

    fn contact(local: u32, peer: u32, now: f64) -> Contact<NodeAddress> {
        Contact::new(NodeAddress(local), NodeAddress(peer), SimTime(now))
    }

    fn up(
        a: &mut PeopleRankAltEngine<NodeAddress>,
        b: &mut PeopleRankAltEngine<NodeAddress>,
        ids: (u32, u32),
        now: f64,
    ) {
        let c = contact(ids.0, ids.1, now);
        a.connection_up(&c, b).unwrap();
        b.connection_up(&c.reversed(), a).unwrap();
        a.exchange_for_new_connection(&c, b).unwrap();
    }

    fn down(
        a: &mut PeopleRankAltEngine<NodeAddress>,
        b: &mut PeopleRankAltEngine<NodeAddress>,
        ids: (u32, u32),
        now: f64,
    ) {
        let c = contact(ids.0, ids.1, now);
        a.connection_down(&c, b).unwrap();
        b.connection_down(&c.reversed(), a).unwrap();
    }

    #[test]
    fn test_first_contact_is_admitted() {
        let mut a = engine(100.0);
        let mut b = engine(100.0);

        up(&mut a, &mut b, (0, 1), 10.0);
        // No history yet, nothing to refresh
        assert!(a.snapshot_rank_table().is_empty());

        down(&mut a, &mut b, (0, 1), 40.0);
        assert!(a.is_neighbor(&NodeAddress(1)));
        assert!(b.is_neighbor(&NodeAddress(0)));
        assert_eq!(a.encounters().history(&NodeAddress(1)).unwrap().len(), 1);
        assert_eq!(a.encounters().contact_start(&NodeAddress(1)), None);
    }

    #[test]
    fn test_refresh_uses_observed_sum_with_unit_degree() {
        let mut a = engine(100.0);
        let mut b = engine(100.0);

        up(&mut a, &mut b, (0, 1), 10.0);
        down(&mut a, &mut b, (0, 1), 40.0);
        up(&mut a, &mut b, (0, 1), 60.0);

        // Both tables were empty when observed, so every score is 1 - d
        let entry = a.snapshot_rank_table().get(&NodeAddress(1)).unwrap();
        assert_eq!(entry.degree, 1);
        assert!((entry.score - (1.0 - D)).abs() < 1e-12);
        assert!((a.rank() - ((1.0 - D) + D * (1.0 - D))).abs() < 1e-12);
    }

    #[test]
    fn test_refresh_covers_every_known_peer() {
        let mut a = engine(100.0);
        let mut b = engine(100.0);
        let mut c = engine(100.0);

        up(&mut a, &mut b, (0, 1), 0.0);
        down(&mut a, &mut b, (0, 1), 10.0);

        // Meeting c refreshes the entry for b as well
        up(&mut a, &mut c, (0, 2), 20.0);
        assert!(a.snapshot_rank_table().contains(&NodeAddress(1)));
        assert!(!a.snapshot_rank_table().contains(&NodeAddress(2)));
    }

    #[test]
    fn test_rare_peer_not_recorded() {
        let mut a = engine(15.0);
        let mut b = engine(15.0);

        up(&mut a, &mut b, (0, 1), 0.0);
        down(&mut a, &mut b, (0, 1), 10.0);
        up(&mut a, &mut b, (0, 1), 50.0);
        down(&mut a, &mut b, (0, 1), 60.0);
        // gap 40 over 2 records = 20, above the threshold
        assert!((a.encounters().average_gap(&NodeAddress(1)) - 20.0).abs() < 1e-9);

        up(&mut a, &mut b, (0, 1), 70.0);
        down(&mut a, &mut b, (0, 1), 80.0);

        assert_eq!(a.encounters().history(&NodeAddress(1)).unwrap().len(), 2);
        assert_eq!(a.encounters().contact_start(&NodeAddress(1)), None);
    }

    #[test]
    fn test_zero_threshold_admits_nobody() {
        let mut a = engine(0.0);
        let mut b = engine(0.0);

        up(&mut a, &mut b, (0, 1), 0.0);
        down(&mut a, &mut b, (0, 1), 10.0);

        assert!(!a.is_neighbor(&NodeAddress(1)));
        assert_eq!(a.neighbors().count(), 0);
        // The history entry still exists, empty
        assert!(a.encounters().history(&NodeAddress(1)).unwrap().is_empty());
    }

    #[test]
    fn test_connection_down_twice_is_harmless() {
        let mut a = engine(100.0);
        let mut b = engine(100.0);

        up(&mut a, &mut b, (0, 1), 10.0);
        down(&mut a, &mut b, (0, 1), 40.0);
        let c = contact(0, 1, 40.0);
        a.connection_down(&c, &mut b).unwrap();

        assert_eq!(a.encounters().contact_start(&NodeAddress(1)), None);
    }

    #[test]
    fn test_forwarding_prefers_higher_rank() {
        let mut a = engine(100.0);
        let mut b = engine(100.0);
        let lonely = engine(100.0);

        up(&mut a, &mut b, (0, 1), 0.0);
        down(&mut a, &mut b, (0, 1), 10.0);
        up(&mut a, &mut b, (0, 1), 20.0);

        let msg = Message::new(MessageId::new("M1"), NodeAddress(5), NodeAddress(9), SimTime(0.0));
        assert!(
            lonely
                .should_send_message_to_host(&msg, &NodeAddress(0), &a, &NodeAddress(5))
                .unwrap()
        );
        assert!(
            !a.should_send_message_to_host(&msg, &NodeAddress(5), &lonely, &NodeAddress(0))
                .unwrap()
        );
    }

    #[test]
    fn test_config_from_settings() {
        let settings = Settings::parse(
            "PeopleRankAltRouter.dampingFactor = 0.8\nPeopleRankAltRouter.maxInterconnection = 600\n",
        )
        .unwrap();
        let config = PeopleRankAltConfig::from_settings(&settings).unwrap();
        assert_eq!(config.max_interconnection, 600.0);

        let bad = Settings::new()
            .with("PeopleRankAltRouter.dampingFactor", 0.8)
            .with("PeopleRankAltRouter.maxInterconnection", -1);
        assert!(matches!(
            PeopleRankAltConfig::from_settings(&bad),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_replicate_resets_state() {
        let mut a = engine(100.0);
        let mut b = engine(100.0);
        up(&mut a, &mut b, (0, 1), 0.0);
        down(&mut a, &mut b, (0, 1), 10.0);

        let copy = a.replicate();
        assert_eq!(copy.neighbors().count(), 0);
        assert_eq!(copy.config(), a.config());
    }
}
