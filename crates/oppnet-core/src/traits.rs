//! Core traits for Oppnet
//!
//! ## Key Traits
//!
//! - [`DecisionEngine`]: The per-node forwarding policy contract

use crate::contact::Contact;
use crate::error::EngineResult;
use crate::identity::PeerIdentity;
use crate::message::Message;

/// Per-node forwarding policy
///
/// The routing framework owns one engine per node and calls these hooks at
/// connection and message lifecycle points, one call at a time and in
/// event order. Engines never do I/O and never block.
///
/// Hooks that need the other node's state receive its engine directly.
/// Reads of the peer go through its public query methods; any write to the
/// peer goes through a method of the peer that mutates the peer's own
/// fields. Engines never keep references to each other between calls.
pub trait DecisionEngine<I: PeerIdentity>: Sized + Send + Sync {
    /// Short policy name for diagnostics
    fn name(&self) -> &'static str;

    /// A contact with `contact.peer` has been established
    fn connection_up(&mut self, contact: &Contact<I>, peer_engine: &Self) -> EngineResult<()>;

    /// The contact with `contact.peer` has ended
    ///
    /// Must clear any per-contact start time kept for the peer, and must be
    /// safe to call again for the same contact.
    fn connection_down(&mut self, contact: &Contact<I>, peer_engine: &mut Self)
    -> EngineResult<()>;

    /// Called once per new contact so both sides can set up per-contact state
    ///
    /// After this returns, both engines agree on the contact start time and
    /// on any transitive inputs exchanged.
    fn exchange_for_new_connection(
        &mut self,
        contact: &Contact<I>,
        peer_engine: &mut Self,
    ) -> EngineResult<()>;

    /// A message originates at this node
    ///
    /// Returns whether the message is accepted.
    fn new_message(&mut self, message: &mut Message<I>) -> bool;

    /// Check if `node` is the message's final destination
    fn is_final_dest(&self, message: &Message<I>, node: &I) -> bool {
        message.is_addressed_to(node)
    }

    /// Decide whether to keep a message just received from another node
    fn should_save_received_message(
        &mut self,
        message: &mut Message<I>,
        this_node: &I,
    ) -> EngineResult<bool>;

    /// Decide whether to hand `message` to `other_node`
    fn should_send_message_to_host(
        &self,
        message: &Message<I>,
        other_node: &I,
        other_engine: &Self,
        this_node: &I,
    ) -> EngineResult<bool>;

    /// After a successful send, decide whether to drop the local copy
    fn should_delete_sent_message(
        &mut self,
        message: &mut Message<I>,
        other_node: &I,
    ) -> EngineResult<bool>;

    /// Decide whether to drop a message another node reports as old
    fn should_delete_old_message(&self, _message: &Message<I>, _reporting_node: &I) -> bool {
        true
    }

    /// Periodic tick
    fn update(&mut self, _node: &I) {}

    /// Fresh engine for another node, sharing only static configuration
    fn replicate(&self) -> Self;
}
