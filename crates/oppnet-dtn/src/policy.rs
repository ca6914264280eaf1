//! Routing policy selection
//!
//! A scenario picks one policy for a whole group of nodes, by name, through
//! the `Group.router` setting. [`PolicyConfig`] is the parsed choice plus
//! that policy's parameters, and [`RoutingPolicy`] is the runtime engine
//! that dispatches every hook to the selected implementation.
//!
//! Peers are expected to run the same policy. A peer running a different
//! one is reported as [`EngineError::FamilyMismatch`] instead of being
//! silently misread.

use std::fmt;
use std::str::FromStr;

use derive_more::From;
use serde::{Deserialize, Serialize};

use oppnet_core::{
    ConfigError, ConfigResult, Contact, DecisionEngine, EngineError, EngineResult, Message,
    PeerIdentity,
};

use crate::centrality::Centralities;
use crate::focus::{SprayAndFocusConfig, SprayAndFocusEngine};
use crate::history::EncounterTracker;
use crate::people_rank::{PeopleRankConfig, PeopleRankEngine};
use crate::people_rank_alt::{PeopleRankAltConfig, PeopleRankAltEngine};
use crate::settings::Settings;
use crate::spray::{SprayAndWaitConfig, SprayAndWaitEngine};

/// Setting that selects the policy
pub const ROUTER_KEY: &str = "Group.router";

/// The available policy families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyFamily {
    PeopleRank,
    PeopleRankAlt,
    SprayAndWait,
    SprayAndFocus,
}

impl PolicyFamily {
    /// Every family, in declaration order
    pub const ALL: [PolicyFamily; 4] = [
        PolicyFamily::PeopleRank,
        PolicyFamily::PeopleRankAlt,
        PolicyFamily::SprayAndWait,
        PolicyFamily::SprayAndFocus,
    ];

    /// Router name, also the settings namespace
    pub fn router_name(&self) -> &'static str {
        match self {
            PolicyFamily::PeopleRank => crate::people_rank::NAMESPACE,
            PolicyFamily::PeopleRankAlt => crate::people_rank_alt::NAMESPACE,
            PolicyFamily::SprayAndWait => crate::spray::NAMESPACE,
            PolicyFamily::SprayAndFocus => crate::focus::NAMESPACE,
        }
    }

    /// Short name
    pub fn alias(&self) -> &'static str {
        match self {
            PolicyFamily::PeopleRank => "people-rank",
            PolicyFamily::PeopleRankAlt => "people-rank-alt",
            PolicyFamily::SprayAndWait => "spray-and-wait",
            PolicyFamily::SprayAndFocus => "spray-and-focus",
        }
    }

    /// Older router names still accepted when parsing
    pub fn legacy_names(&self) -> &'static [&'static str] {
        match self {
            PolicyFamily::SprayAndFocus => &[crate::focus::LEGACY_NAMESPACE],
            _ => &[],
        }
    }

    /// Whether engines of this family report centralities
    pub fn is_rank_based(&self) -> bool {
        matches!(self, PolicyFamily::PeopleRank | PolicyFamily::PeopleRankAlt)
    }
}

impl fmt::Display for PolicyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.router_name())
    }
}

impl FromStr for PolicyFamily {
    type Err = ConfigError;

    /// Accepts the router name, a legacy name or the short alias,
    /// case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|family| {
                family.router_name().eq_ignore_ascii_case(name)
                    || family.alias().eq_ignore_ascii_case(name)
                    || family
                        .legacy_names()
                        .iter()
                        .any(|legacy| legacy.eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| ConfigError::UnknownRouter(name.to_string()))
    }
}

/// Selected policy and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From)]
#[serde(tag = "router")]
pub enum PolicyConfig {
    #[serde(rename = "PeopleRankRouter", alias = "people-rank")]
    PeopleRank(PeopleRankConfig),
    #[serde(rename = "PeopleRankAltRouter", alias = "people-rank-alt")]
    PeopleRankAlt(PeopleRankAltConfig),
    #[serde(rename = "SprayAndWaitRouter", alias = "spray-and-wait")]
    SprayAndWait(SprayAndWaitConfig),
    #[serde(
        rename = "SprayAndFocusRouter",
        alias = "spray-and-focus",
        alias = "SprayAndFocusDERouter"
    )]
    SprayAndFocus(SprayAndFocusConfig),
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::PeopleRank(PeopleRankConfig::default())
    }
}

impl PolicyConfig {
    /// Read the policy named by `Group.router` and its namespace
    pub fn from_settings(settings: &Settings) -> ConfigResult<Self> {
        let router = settings.get(ROUTER_KEY).ok_or_else(|| ConfigError::Missing {
            key: ROUTER_KEY.to_string(),
        })?;
        let family: PolicyFamily = router.parse()?;
        Self::from_namespace(family, settings)
    }

    /// Read the parameters of `family` from its namespace
    pub fn from_namespace(family: PolicyFamily, settings: &Settings) -> ConfigResult<Self> {
        let config: Self = match family {
            PolicyFamily::PeopleRank => PeopleRankConfig::from_settings(settings)?.into(),
            PolicyFamily::PeopleRankAlt => PeopleRankAltConfig::from_settings(settings)?.into(),
            PolicyFamily::SprayAndWait => SprayAndWaitConfig::from_settings(settings)?.into(),
            PolicyFamily::SprayAndFocus => SprayAndFocusConfig::from_settings(settings)?.into(),
        };
        tracing::debug!(router = %family, "Loaded routing policy settings");
        Ok(config)
    }

    pub fn family(&self) -> PolicyFamily {
        match self {
            PolicyConfig::PeopleRank(_) => PolicyFamily::PeopleRank,
            PolicyConfig::PeopleRankAlt(_) => PolicyFamily::PeopleRankAlt,
            PolicyConfig::SprayAndWait(_) => PolicyFamily::SprayAndWait,
            PolicyConfig::SprayAndFocus(_) => PolicyFamily::SprayAndFocus,
        }
    }

    /// Reject out-of-range values
    pub fn validate(&self) -> ConfigResult<()> {
        match self {
            PolicyConfig::PeopleRank(c) => c.validate(),
            PolicyConfig::PeopleRankAlt(c) => c.validate(),
            PolicyConfig::SprayAndWait(c) => c.validate(),
            PolicyConfig::SprayAndFocus(c) => c.validate(),
        }
    }

    /// Legal values that make the policy degenerate
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let damping = match self {
            PolicyConfig::PeopleRank(c) => Some(c.damping_factor),
            PolicyConfig::PeopleRankAlt(c) => Some(c.damping_factor),
            _ => None,
        };
        match damping {
            Some(d) if d == 0.0 => warnings.push(ConfigWarning::DampingIgnoresNeighbors),
            Some(d) if d == 1.0 => warnings.push(ConfigWarning::DampingDropsBaseRank),
            _ => {}
        }

        match self {
            PolicyConfig::PeopleRank(c) if c.min_duration == 0.0 => {
                warnings.push(ConfigWarning::ZeroContactThreshold);
            }
            PolicyConfig::PeopleRankAlt(c) if c.max_interconnection == 0.0 => {
                warnings.push(ConfigWarning::NoNeighborAdmitted);
            }
            PolicyConfig::SprayAndWait(c) if c.initial_copies == 1 => {
                warnings.push(ConfigWarning::SingleCopy);
            }
            PolicyConfig::SprayAndFocus(c) if c.initial_copies == 1 => {
                warnings.push(ConfigWarning::SingleCopy);
            }
            _ => {}
        }

        warnings
    }

    /// Build the prototype engine that every node's engine is replicated from
    pub fn prototype<I: PeerIdentity>(&self) -> ConfigResult<RoutingPolicy<I>> {
        let policy: RoutingPolicy<I> = match self {
            PolicyConfig::PeopleRank(c) => PeopleRankEngine::new(c.clone())?.into(),
            PolicyConfig::PeopleRankAlt(c) => PeopleRankAltEngine::new(c.clone())?.into(),
            PolicyConfig::SprayAndWait(c) => SprayAndWaitEngine::new(c.clone())?.into(),
            PolicyConfig::SprayAndFocus(c) => SprayAndFocusEngine::new(c.clone())?.into(),
        };
        Ok(policy)
    }
}

/// Suspicious but legal configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Damping factor 0: every rank is 1 regardless of neighbours
    DampingIgnoresNeighbors,
    /// Damping factor 1: isolated nodes have rank 0
    DampingDropsBaseRank,
    /// Every contact re-ranks, however short
    ZeroContactThreshold,
    /// No peer can ever pass the interconnection filter
    NoNeighborAdmitted,
    /// A single copy: no spray phase at all
    SingleCopy,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::DampingIgnoresNeighbors => {
                write!(f, "dampingFactor is 0, neighbours never affect rank")
            }
            ConfigWarning::DampingDropsBaseRank => {
                write!(f, "dampingFactor is 1, nodes without neighbours rank 0")
            }
            ConfigWarning::ZeroContactThreshold => {
                write!(f, "minDuration is 0, every contact re-ranks")
            }
            ConfigWarning::NoNeighborAdmitted => {
                write!(f, "maxInterconnection is 0, no neighbour is ever admitted")
            }
            ConfigWarning::SingleCopy => write!(f, "nrofCopies is 1, messages are never sprayed"),
        }
    }
}

/// Runtime engine for whichever policy was selected
#[derive(Debug, Clone, From)]
pub enum RoutingPolicy<I: PeerIdentity> {
    PeopleRank(PeopleRankEngine<I>),
    PeopleRankAlt(PeopleRankAltEngine<I>),
    SprayAndWait(SprayAndWaitEngine<I>),
    SprayAndFocus(SprayAndFocusEngine<I>),
}

macro_rules! each_engine {
    ($policy:expr, $engine:ident => $body:expr) => {
        match $policy {
            RoutingPolicy::PeopleRank($engine) => $body,
            RoutingPolicy::PeopleRankAlt($engine) => $body,
            RoutingPolicy::SprayAndWait($engine) => $body,
            RoutingPolicy::SprayAndFocus($engine) => $body,
        }
    };
}

macro_rules! each_pair {
    ($local:expr, $peer:expr, ($a:ident, $b:ident) => $body:expr) => {
        match ($local, $peer) {
            (RoutingPolicy::PeopleRank($a), RoutingPolicy::PeopleRank($b)) => $body,
            (RoutingPolicy::PeopleRankAlt($a), RoutingPolicy::PeopleRankAlt($b)) => $body,
            (RoutingPolicy::SprayAndWait($a), RoutingPolicy::SprayAndWait($b)) => $body,
            (RoutingPolicy::SprayAndFocus($a), RoutingPolicy::SprayAndFocus($b)) => $body,
            (local, peer) => Err(family_mismatch(local, peer)),
        }
    };
}

fn family_mismatch<I: PeerIdentity>(local: &RoutingPolicy<I>, peer: &RoutingPolicy<I>) -> EngineError {
    tracing::warn!(local = %local.family(), peer = %peer.family(), "Peer runs a different policy");
    EngineError::FamilyMismatch {
        local: local.family().to_string(),
        peer: peer.family().to_string(),
    }
}

impl<I: PeerIdentity> RoutingPolicy<I> {
    pub fn family(&self) -> PolicyFamily {
        match self {
            RoutingPolicy::PeopleRank(_) => PolicyFamily::PeopleRank,
            RoutingPolicy::PeopleRankAlt(_) => PolicyFamily::PeopleRankAlt,
            RoutingPolicy::SprayAndWait(_) => PolicyFamily::SprayAndWait,
            RoutingPolicy::SprayAndFocus(_) => PolicyFamily::SprayAndFocus,
        }
    }

    /// Encounter bookkeeping, for the policies that keep one
    pub fn encounters(&self) -> Option<&EncounterTracker<I>> {
        match self {
            RoutingPolicy::PeopleRank(e) => Some(e.encounters()),
            RoutingPolicy::PeopleRankAlt(e) => Some(e.encounters()),
            RoutingPolicy::SprayAndWait(_) => None,
            RoutingPolicy::SprayAndFocus(e) => Some(e.encounters()),
        }
    }

    /// Centralities of rank-based policies, `None` otherwise
    pub fn centralities(&self) -> Option<Vec<f64>> {
        match self {
            RoutingPolicy::PeopleRank(e) => Some(e.centralities()),
            RoutingPolicy::PeopleRankAlt(e) => Some(e.centralities()),
            _ => None,
        }
    }

    /// Centralities over external encounter bookkeeping, `None` for non-rank policies
    pub fn global_centralities(&self, encounters: &EncounterTracker<I>) -> Option<Vec<f64>> {
        match self {
            RoutingPolicy::PeopleRank(e) => Some(e.global_centralities(encounters)),
            RoutingPolicy::PeopleRankAlt(e) => Some(e.global_centralities(encounters)),
            _ => None,
        }
    }
}

impl<I: PeerIdentity> DecisionEngine<I> for RoutingPolicy<I> {
    fn name(&self) -> &'static str {
        each_engine!(self, e => e.name())
    }

    fn connection_up(&mut self, contact: &Contact<I>, peer_engine: &Self) -> EngineResult<()> {
        each_pair!(self, peer_engine, (a, b) => a.connection_up(contact, b))
    }

    fn connection_down(
        &mut self,
        contact: &Contact<I>,
        peer_engine: &mut Self,
    ) -> EngineResult<()> {
        each_pair!(self, peer_engine, (a, b) => a.connection_down(contact, b))
    }

    fn exchange_for_new_connection(
        &mut self,
        contact: &Contact<I>,
        peer_engine: &mut Self,
    ) -> EngineResult<()> {
        each_pair!(self, peer_engine, (a, b) => a.exchange_for_new_connection(contact, b))
    }

    fn new_message(&mut self, message: &mut Message<I>) -> bool {
        each_engine!(self, e => e.new_message(message))
    }

    fn is_final_dest(&self, message: &Message<I>, node: &I) -> bool {
        each_engine!(self, e => e.is_final_dest(message, node))
    }

    fn should_save_received_message(
        &mut self,
        message: &mut Message<I>,
        this_node: &I,
    ) -> EngineResult<bool> {
        each_engine!(self, e => e.should_save_received_message(message, this_node))
    }

    fn should_send_message_to_host(
        &self,
        message: &Message<I>,
        other_node: &I,
        other_engine: &Self,
        this_node: &I,
    ) -> EngineResult<bool> {
        each_pair!(self, other_engine, (a, b) => {
            a.should_send_message_to_host(message, other_node, b, this_node)
        })
    }

    fn should_delete_sent_message(
        &mut self,
        message: &mut Message<I>,
        other_node: &I,
    ) -> EngineResult<bool> {
        each_engine!(self, e => e.should_delete_sent_message(message, other_node))
    }

    fn should_delete_old_message(&self, message: &Message<I>, reporting_node: &I) -> bool {
        each_engine!(self, e => e.should_delete_old_message(message, reporting_node))
    }

    fn update(&mut self, node: &I) {
        each_engine!(self, e => e.update(node))
    }

    fn replicate(&self) -> Self {
        each_engine!(self, e => e.replicate().into())
    }
}
