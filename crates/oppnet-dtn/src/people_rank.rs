//! PeopleRank with eager rank propagation
//!
//! Every long enough contact updates both nodes' views of each other.
//! When a contact of length above `min_duration` ends, each side recomputes
//! the other's score from the other's current rank table and stores it
//! together with the other's degree (known neighbours plus one).
//!
//! Messages drift towards nodes with higher PeopleRank.

use serde::{Deserialize, Serialize};

use oppnet_core::{
    ConfigError, ConfigResult, Contact, DecisionEngine, EngineResult, Message, PeerIdentity,
};

use crate::centrality::Centralities;
use crate::history::EncounterTracker;
use crate::rank::{RankEntry, RankTable, people_rank};
use crate::settings::Settings;

/// Settings namespace of the eager engine
pub const NAMESPACE: &str = "PeopleRankRouter";
/// Damping factor setting
pub const DAMPING_FACTOR: &str = "dampingFactor";
/// Minimum contact duration setting
pub const MIN_DURATION: &str = "minDuration";

/// Configuration for eager PeopleRank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeopleRankConfig {
    /// Damping factor `d` in `[0, 1]`
    pub damping_factor: f64,
    /// Contacts must last strictly longer than this (seconds) to re-rank
    pub min_duration: f64,
}

impl Default for PeopleRankConfig {
    fn default() -> Self {
        Self {
            damping_factor: 0.87,
            min_duration: 60.0,
        }
    }
}

impl PeopleRankConfig {
    /// Read the config from the `PeopleRankRouter` namespace
    pub fn from_settings(settings: &Settings) -> ConfigResult<Self> {
        Self::from_namespace(settings, NAMESPACE)
    }

    /// Read the config from an arbitrary namespace
    pub fn from_namespace(settings: &Settings, namespace: &str) -> ConfigResult<Self> {
        let view = settings.namespace(namespace);
        let config = Self {
            damping_factor: view.get_f64(DAMPING_FACTOR)?,
            min_duration: view.get_f64(MIN_DURATION)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        validate_damping(self.damping_factor)?;
        if !self.min_duration.is_finite() || self.min_duration < 0.0 {
            return Err(ConfigError::OutOfRange {
                key: MIN_DURATION.to_string(),
                reason: format!("must be a non-negative duration, got {}", self.min_duration),
            });
        }
        Ok(())
    }
}

pub(crate) fn validate_damping(damping_factor: f64) -> ConfigResult<()> {
    if !(0.0..=1.0).contains(&damping_factor) {
        return Err(ConfigError::OutOfRange {
            key: DAMPING_FACTOR.to_string(),
            reason: format!("must lie in [0, 1], got {}", damping_factor),
        });
    }
    Ok(())
}

/// Eager PeopleRank decision engine for one node
#[derive(Debug, Clone)]
pub struct PeopleRankEngine<I: PeerIdentity> {
    config: PeopleRankConfig,
    ranks: RankTable<I>,
    encounters: EncounterTracker<I>,
}

impl<I: PeerIdentity> PeopleRankEngine<I> {
    /// Create an engine, rejecting invalid configuration
    pub fn new(config: PeopleRankConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::fresh(config))
    }

    fn fresh(config: PeopleRankConfig) -> Self {
        Self {
            config,
            ranks: RankTable::new(),
            encounters: EncounterTracker::new(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &PeopleRankConfig {
        &self.config
    }

    /// Read-only view of this node's rank context
    pub fn snapshot_rank_table(&self) -> &RankTable<I> {
        &self.ranks
    }

    /// Read-only view of this node's encounter bookkeeping
    pub fn encounters(&self) -> &EncounterTracker<I> {
        &self.encounters
    }

    /// This node's own PeopleRank
    pub fn rank(&self) -> f64 {
        people_rank(self.config.damping_factor, &self.ranks)
    }

    /// PeopleRank of another node, evaluated with this node's damping factor
    pub fn rank_of(&self, other: &Self) -> f64 {
        people_rank(self.config.damping_factor, other.snapshot_rank_table())
    }

    /// Number of peers in this node's rank context
    pub fn neighbor_count(&self) -> usize {
        self.ranks.len()
    }

    /// Recompute and store `host`'s entry from its current rank table
    ///
    /// The stored degree is the host's neighbour count plus one.
    pub fn update_rank(&mut self, host: &I, host_engine: &Self) {
        let score = self.rank_of(host_engine);
        let degree = u32::try_from(host_engine.neighbor_count())
            .unwrap_or(u32::MAX)
            .saturating_add(1);

        self.ranks.insert(host.clone(), RankEntry::new(score, degree));
        tracing::debug!(peer = %host, score, degree, "Updated PeopleRank entry");
    }

    fn begin_contact(&mut self, peer: &I, contact: &Contact<I>) {
        self.encounters.open(peer, contact.now);
    }
}

impl<I: PeerIdentity> DecisionEngine<I> for PeopleRankEngine<I> {
    fn name(&self) -> &'static str {
        "people-rank"
    }

    fn connection_up(&mut self, _contact: &Contact<I>, _peer_engine: &Self) -> EngineResult<()> {
        Ok(())
    }

    fn connection_down(
        &mut self,
        contact: &Contact<I>,
        peer_engine: &mut Self,
    ) -> EngineResult<()> {
        let span = self.encounters.close(&contact.peer, contact.now);
        self.encounters.record(&contact.peer, span);

        if span.length() > self.config.min_duration {
            self.update_rank(&contact.peer, peer_engine);
            peer_engine.update_rank(&contact.local, self);
        } else {
            tracing::trace!(
                peer = %contact.peer,
                length = span.length(),
                "Contact too short to re-rank"
            );
        }

        Ok(())
    }

    fn exchange_for_new_connection(
        &mut self,
        contact: &Contact<I>,
        peer_engine: &mut Self,
    ) -> EngineResult<()> {
        self.begin_contact(&contact.peer, contact);
        peer_engine.begin_contact(&contact.local, contact);
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

impl<I: PeerIdentity> Centralities<I> for PeopleRankEngine<I> {
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
