//! Spray-and-Wait routing
//!
//! A message starts with a quota of `L` copies. While a node holds more
//! than one copy it hands part of its quota to every peer it meets (spray
//! phase). Once down to one copy it only delivers directly to the
//! destination (wait phase).
//!
//! Two ways to split the quota:
//! - **Binary**: the receiver gets `ceil(c/2)`, the sender keeps `floor(c/2)`
//! - **Source**: the receiver gets one copy, the sender keeps `c - 1`

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use oppnet_core::{
    ConfigError, ConfigResult, Contact, DecisionEngine, EngineError, EngineResult, Message,
    PeerIdentity,
};

use crate::settings::Settings;

/// Settings namespace of the Spray-and-Wait engine
pub const NAMESPACE: &str = "SprayAndWaitRouter";
/// Initial copy quota setting
pub const NROF_COPIES: &str = "nrofCopies";
/// Binary split setting
pub const BINARY_MODE: &str = "binaryMode";

/// Copy quota arithmetic shared by the spray engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyBudget {
    /// Split the quota in half instead of handing out single copies
    pub binary: bool,
}

impl CopyBudget {
    pub fn new(binary: bool) -> Self {
        Self { binary }
    }

    /// Quota the receiver keeps out of `copies`
    pub fn on_receive(&self, copies: u32) -> u32 {
        let kept = if self.binary { copies.div_ceil(2) } else { 1 };
        kept.max(1)
    }

    /// Quota the sender keeps after handing part of `copies` away
    pub fn on_send(&self, copies: u32) -> u32 {
        let kept = if self.binary {
            copies / 2
        } else {
            copies.saturating_sub(1)
        };
        kept.max(1)
    }

    /// Stamp the initial quota on a fresh message
    pub fn stamp<I: PeerIdentity>(&self, message: &mut Message<I>, initial_copies: u32) {
        if message.stamp_copies(initial_copies) {
            tracing::trace!(message = %message.id, copies = initial_copies, "Stamped copy quota");
        }
    }

    /// Take a received message's share of the quota
    ///
    /// The final destination keeps nothing and leaves the quota as it was.
    pub fn receive<I: PeerIdentity>(
        &self,
        message: &mut Message<I>,
        this_node: &I,
    ) -> EngineResult<bool> {
        if message.is_addressed_to(this_node) {
            return Ok(false);
        }

        let copies = quota(message)?;
        let kept = self.on_receive(copies);
        message.set_copies(kept);
        tracing::debug!(message = %message.id, received = copies, kept, "Took copy share");
        Ok(true)
    }

    /// Whether the holder is still in the spray phase
    pub fn can_spray<I: PeerIdentity>(&self, message: &Message<I>) -> EngineResult<bool> {
        Ok(quota(message)? > 1)
    }

    /// Spend quota after a successful send
    ///
    /// Returns whether the local copy should be dropped. A hand-off to the
    /// destination spends nothing.
    pub fn after_send<I: PeerIdentity>(
        &self,
        message: &mut Message<I>,
        other_node: &I,
    ) -> EngineResult<bool> {
        let copies = quota(message)?;
        if copies <= 1 {
            return Ok(true);
        }
        if message.is_addressed_to(other_node) {
            return Ok(false);
        }

        let kept = self.on_send(copies);
        message.set_copies(kept);
        tracing::debug!(message = %message.id, before = copies, kept, "Spent copy quota");
        Ok(false)
    }
}

fn quota<I: PeerIdentity>(message: &Message<I>) -> EngineResult<u32> {
    message.copies().ok_or_else(|| EngineError::MissingCopyQuota {
        message: message.id.to_string(),
    })
}

pub(crate) fn validate_copies(initial_copies: u32) -> ConfigResult<()> {
    if initial_copies == 0 {
        return Err(ConfigError::OutOfRange {
            key: NROF_COPIES.to_string(),
            reason: "at least one copy is required".to_string(),
        });
    }
    Ok(())
}

/// Configuration for Spray-and-Wait
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SprayAndWaitConfig {
    /// Initial copy quota `L`
    pub initial_copies: u32,
    /// Binary split of the quota
    pub binary: bool,
}

impl Default for SprayAndWaitConfig {
    fn default() -> Self {
        Self {
            initial_copies: 8,
            binary: true,
        }
    }
}

impl SprayAndWaitConfig {
    /// Source spraying: every relay gets a single copy
    pub fn source(initial_copies: u32) -> Self {
        Self {
            initial_copies,
            binary: false,
        }
    }

    /// Binary spraying
    pub fn binary(initial_copies: u32) -> Self {
        Self {
            initial_copies,
            binary: true,
        }
    }

    /// Read the config from the `SprayAndWaitRouter` namespace
    pub fn from_settings(settings: &Settings) -> ConfigResult<Self> {
        Self::from_namespace(settings, NAMESPACE)
    }

    /// Read the config from an arbitrary namespace
    pub fn from_namespace(settings: &Settings, namespace: &str) -> ConfigResult<Self> {
        let view = settings.namespace(namespace);
        let config = Self {
            initial_copies: view.get_u32(NROF_COPIES)?,
            binary: view.get_bool(BINARY_MODE)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        validate_copies(self.initial_copies)
    }

    pub fn budget(&self) -> CopyBudget {
        CopyBudget::new(self.binary)
    }
}

/// Spray-and-Wait decision engine for one node
///
/// Stateless apart from its configuration: everything it needs travels on
/// the message as the copy quota.
#[derive(Debug, Clone)]
pub struct SprayAndWaitEngine<I: PeerIdentity> {
    config: SprayAndWaitConfig,
    budget: CopyBudget,
    _identity: PhantomData<I>,
}

impl<I: PeerIdentity> SprayAndWaitEngine<I> {
    /// Create an engine, rejecting invalid configuration
    pub fn new(config: SprayAndWaitConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            budget: config.budget(),
            config,
            _identity: PhantomData,
        })
    }

    pub fn config(&self) -> &SprayAndWaitConfig {
        &self.config
    }

    pub fn budget(&self) -> CopyBudget {
        self.budget
    }
}

impl<I: PeerIdentity> DecisionEngine<I> for SprayAndWaitEngine<I> {
    fn name(&self) -> &'static str {
        "spray-and-wait"
    }

    fn connection_up(&mut self, _contact: &Contact<I>, _peer_engine: &Self) -> EngineResult<()> {
        Ok(())
    }

    fn connection_down(
        &mut self,
        _contact: &Contact<I>,
        _peer_engine: &mut Self,
    ) -> EngineResult<()> {
        Ok(())
    }

    fn exchange_for_new_connection(
        &mut self,
        _contact: &Contact<I>,
        _peer_engine: &mut Self,
    ) -> EngineResult<()> {
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
        _other_engine: &Self,
        this_node: &I,
    ) -> EngineResult<bool> {
        if message.is_addressed_to(other_node) {
            return Ok(true);
        }
        if message.is_addressed_to(this_node) {
            return Ok(false);
        }

        self.budget.can_spray(message)
    }

    fn should_delete_sent_message(
        &mut self,
        message: &mut Message<I>,
        other_node: &I,
    ) -> EngineResult<bool> {
        self.budget.after_send(message, other_node)
    }

    fn replicate(&self) -> Self {
        self.clone()
    }
}
