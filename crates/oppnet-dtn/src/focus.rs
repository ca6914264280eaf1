//! Spray-and-Focus routing
//!
//! Spray phase as in [`crate::spray`]. Once a node is down to its last
//! copy it does not simply wait: it hands the message to a peer whose
//! encounter history with the destination scores higher than its own.
//!
//! Each node also keeps a last-encounter timer `τ(j)` for every node it has
//! heard of. Timers are learned transitively: if the peer saw `j` recently
//! enough that walking over from the peer would still beat our own timer,
//! ours is tightened to the peer's timer plus the expected travel time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use oppnet_core::{
    ConfigError, ConfigResult, Contact, DecisionEngine, EngineResult, Message, PeerIdentity,
    SimTime,
};

use crate::history::{EncounterHistory, EncounterTracker};
use crate::settings::Settings;
use crate::spray::{BINARY_MODE, CopyBudget, NROF_COPIES, validate_copies};

/// Settings namespace of the Spray-and-Focus engine
pub const NAMESPACE: &str = "SprayAndFocusRouter";
/// Namespace used by older scenario files, also accepted as a router name
pub const LEGACY_NAMESPACE: &str = "SprayAndFocusDERouter";
/// Utility margin setting
pub const TRANSITIVITY_THRESHOLD: &str = "transitivityThreshold";

/// Configuration for Spray-and-Focus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SprayAndFocusConfig {
    /// Initial copy quota `L`
    pub initial_copies: u32,
    /// Binary split of the quota
    pub binary: bool,
    /// Margin by which the peer's utility must beat ours in the focus phase
    ///
    /// With a non-zero margin a peer whose mean gap is only slightly larger
    /// no longer gets the message. `0` keeps the plain strict comparison.
    #[serde(default)]
    pub transitivity_threshold: f64,
}

impl Default for SprayAndFocusConfig {
    fn default() -> Self {
        Self {
            initial_copies: 8,
            binary: true,
            transitivity_threshold: 0.0,
        }
    }
}

impl SprayAndFocusConfig {
    /// Read the config from the `SprayAndFocusRouter` namespace
    ///
    /// Falls back to `SprayAndFocusDERouter` when only that namespace
    /// carries `nrofCopies`.
    pub fn from_settings(settings: &Settings) -> ConfigResult<Self> {
        let primary = settings.namespace(NAMESPACE);
        let legacy = settings.namespace(LEGACY_NAMESPACE);
        if !primary.contains(NROF_COPIES) && legacy.contains(NROF_COPIES) {
            return Self::from_namespace(settings, LEGACY_NAMESPACE);
        }
        Self::from_namespace(settings, NAMESPACE)
    }

    /// Read the config from an arbitrary namespace
    pub fn from_namespace(settings: &Settings, namespace: &str) -> ConfigResult<Self> {
        let view = settings.namespace(namespace);
        let config = Self {
            initial_copies: view.get_u32(NROF_COPIES)?,
            binary: view.get_bool(BINARY_MODE)?,
            transitivity_threshold: view.get_f64_or(TRANSITIVITY_THRESHOLD, 0.0)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        validate_copies(self.initial_copies)?;
        if !self.transitivity_threshold.is_finite() {
            return Err(ConfigError::OutOfRange {
                key: TRANSITIVITY_THRESHOLD.to_string(),
                reason: format!("must be finite, got {}", self.transitivity_threshold),
            });
        }
        Ok(())
    }

    pub fn budget(&self) -> CopyBudget {
        CopyBudget::new(self.binary)
    }
}

/// Expected time for the two endpoints of `contact` to cover their distance
///
/// Infinite when neither node is moving.
pub fn time_to_meet<I: PeerIdentity>(contact: &Contact<I>) -> f64 {
    let speed = contact
        .local_motion
        .speed_or_zero()
        .max(contact.peer_motion.speed_or_zero());

    if speed > 0.0 {
        contact.distance() / speed
    } else {
        f64::INFINITY
    }
}

/// Timers `own` should adopt after hearing `other`'s timers
///
/// For every `j` known to `other` (except `exclude`), yields
/// `τ_other(j) + tm` when `τ_other(j) < τ_own(j) - tm`. Unknown own timers
/// count as `+∞`. Every yielded value is strictly below the current own
/// timer, so applying them only ever lowers timers.
pub fn transitive_updates<I: PeerIdentity>(
    own: &HashMap<I, SimTime>,
    other: &HashMap<I, SimTime>,
    exclude: &I,
    time_to_meet: f64,
) -> Vec<(I, SimTime)> {
    if !time_to_meet.is_finite() {
        return Vec::new();
    }

    let mut updates: Vec<(I, SimTime)> = other
        .iter()
        .filter(|(node, _)| *node != exclude)
        .filter_map(|(node, &theirs)| {
            let mine = own.get(node).copied().unwrap_or(SimTime::INFINITY);
            (theirs.as_secs() < mine.as_secs() - time_to_meet)
                .then(|| (node.clone(), theirs.offset(time_to_meet)))
        })
        .collect();
    updates.sort_by(|a, b| a.0.cmp(&b.0));
    updates
}

/// Spray-and-Focus decision engine for one node
#[derive(Debug, Clone)]
pub struct SprayAndFocusEngine<I: PeerIdentity> {
    config: SprayAndFocusConfig,
    budget: CopyBudget,
    encounters: EncounterTracker<I>,
    last_encounters: HashMap<I, SimTime>,
}

impl<I: PeerIdentity> SprayAndFocusEngine<I> {
    /// Create an engine, rejecting invalid configuration
    pub fn new(config: SprayAndFocusConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::fresh(config))
    }

    fn fresh(config: SprayAndFocusConfig) -> Self {
        Self {
            budget: config.budget(),
            config,
            encounters: EncounterTracker::new(),
            last_encounters: HashMap::new(),
        }
    }

    pub fn config(&self) -> &SprayAndFocusConfig {
        &self.config
    }

    pub fn encounters(&self) -> &EncounterTracker<I> {
        &self.encounters
    }

    /// Read-only view of this node's history with `peer`
    pub fn snapshot_history(&self, peer: &I) -> Option<&EncounterHistory> {
        self.encounters.snapshot_history(peer)
    }

    /// Last-encounter timer `τ(node)`, if known
    pub fn last_encounter(&self, node: &I) -> Option<SimTime> {
        self.last_encounters.get(node).copied()
    }

    /// Number of nodes with a timer
    pub fn known_timers(&self) -> usize {
        self.last_encounters.len()
    }

    /// Utility towards `destination`: mean gap of past contacts with it
    pub fn utility(&self, destination: &I) -> f64 {
        self.encounters.average_gap(destination)
    }

    fn begin_contact(&mut self, peer: &I, now: SimTime) {
        self.encounters.open(peer, now);
        self.last_encounters.insert(peer.clone(), now);
    }

    fn apply_timers(&mut self, updates: Vec<(I, SimTime)>) {
        for (node, time) in updates {
            tracing::trace!(node = %node, timer = %time, "Tightened encounter timer");
            self.last_encounters.insert(node, time);
        }
    }
}

impl<I: PeerIdentity> DecisionEngine<I> for SprayAndFocusEngine<I> {
    fn name(&self) -> &'static str {
        "spray-and-focus"
    }

    fn connection_up(&mut self, _contact: &Contact<I>, _peer_engine: &Self) -> EngineResult<()> {
        Ok(())
    }

    fn connection_down(
        &mut self,
        contact: &Contact<I>,
        _peer_engine: &mut Self,
    ) -> EngineResult<()> {
        let span = self.encounters.close(&contact.peer, contact.now);
        self.encounters.record(&contact.peer, span);
        Ok(())
    }

    fn exchange_for_new_connection(
        &mut self,
        contact: &Contact<I>,
        peer_engine: &mut Self,
    ) -> EngineResult<()> {
        let (local, peer, now) = (&contact.local, &contact.peer, contact.now);

        self.begin_contact(peer, now);
        peer_engine.begin_contact(local, now);

        let tm = time_to_meet(contact);
        let ours = transitive_updates(&self.last_encounters, &peer_engine.last_encounters, local, tm);
        let theirs = transitive_updates(&peer_engine.last_encounters, &self.last_encounters, peer, tm);

        tracing::debug!(
            peer = %peer,
            time_to_meet = tm,
            local_updates = ours.len(),
            peer_updates = theirs.len(),
            "Exchanged encounter timers"
        );

        self.apply_timers(ours);
        peer_engine.apply_timers(theirs);
        Ok(())
    }

    fn new_message(&mut self, message: &mut Message<I>) -> bool {
        self.budget.stamp(message, self.config.initial_copies);
        true
    }

    fn should_save_received_message(
        &mut self,
        message: &mut Message<I>,
        this_node: &I,
    ) -> EngineResult<bool> {
        self.budget.receive(message, this_node)
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
        if self.budget.can_spray(message)? {
            return Ok(true);
        }

        // Focus phase: the larger mean gap wins
        let destination = message.destination();
        let theirs = other_engine.utility(destination);
        let ours = self.utility(destination);
        Ok(theirs > ours + self.config.transitivity_threshold)
    }

    fn should_delete_sent_message(
        &mut self,
        message: &mut Message<I>,
        other_node: &I,
    ) -> EngineResult<bool> {
        self.budget.after_send(message, other_node)
    }

    fn replicate(&self) -> Self {
        Self::fresh(self.config.clone())
    }
}
