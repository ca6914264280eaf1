//! Contact-trace replay
//!
//! The [`World`] owns one policy replica per node, each node's message
//! buffer and motion, and the set of live links. It turns trace events
//! into decision-engine hook calls, in event order:
//!
//! - connection up: `connection_up` on both sides, one
//!   `exchange_for_new_connection` from the lower-addressed side, then
//!   message exchange in both directions
//! - connection down: `connection_down` on both sides
//! - message creation: `new_message`, buffering, then an offer over the
//!   source's live links
//!
//! Any engine error stops the replay.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use oppnet_core::{
    Contact, DecisionEngine, EngineError, Message, MessageId, Motion, PeerIdentity, SimTime,
};
use oppnet_dtn::{CentralityReport, RoutingPolicy};
use oppnet_logging::NodeContextGuard;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, debug_span, trace};
use uuid::Uuid;

use crate::trace::{LinkState, Trace, TraceEvent};

/// Errors that stop a replay
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Event at t={at} is earlier than the current time t={now}")]
    OutOfOrder { at: SimTime, now: SimTime },

    #[error("Node {node} cannot connect to itself")]
    SelfContact { node: String },

    #[error("Message {id} already exists")]
    DuplicateMessage { id: String },

    #[error("Engine error at t={at}: {source}")]
    Engine {
        at: SimTime,
        #[source]
        source: EngineError,
    },
}

/// Replay statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimStats {
    /// Messages accepted at their source
    pub created: u64,
    /// Copies handed from one node to another
    pub relayed: u64,
    /// Messages that reached their destination (first copy only)
    pub delivered: u64,
    /// Sender copies dropped after a send
    pub deleted: u64,
    /// Copies the receiver declined to keep
    pub refused: u64,
    /// Sum of creation-to-delivery delays
    pub total_latency: f64,
}

impl SimStats {
    /// Fraction of created messages that were delivered
    pub fn delivery_ratio(&self) -> f64 {
        if self.created == 0 {
            return 0.0;
        }
        self.delivered as f64 / self.created as f64
    }

    /// Mean creation-to-delivery delay
    pub fn mean_latency(&self) -> Option<f64> {
        (self.delivered > 0).then(|| self.total_latency / self.delivered as f64)
    }
}

impl fmt::Display for SimStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "created:   {}", self.created)?;
        writeln!(f, "relayed:   {}", self.relayed)?;
        writeln!(f, "delivered: {}", self.delivered)?;
        writeln!(f, "deleted:   {}", self.deleted)?;
        writeln!(f, "refused:   {}", self.refused)?;
        write!(f, "delivery ratio: {:.4}", self.delivery_ratio())?;
        if let Some(latency) = self.mean_latency() {
            write!(f, "\nmean latency:   {:.2}", latency)?;
        }
        Ok(())
    }
}

/// One simulated node
#[derive(Debug)]
pub struct Node<I: PeerIdentity> {
    id: I,
    policy: RoutingPolicy<I>,
    buffer: Vec<Message<I>>,
    motion: Motion,
    delivered: HashSet<MessageId>,
    instance: Uuid,
}

impl<I: PeerIdentity> Node<I> {
    fn new(id: I, policy: RoutingPolicy<I>) -> Self {
        Self {
            id,
            policy,
            buffer: Vec::new(),
            motion: Motion::default(),
            delivered: HashSet::new(),
            instance: Uuid::new_v4(),
        }
    }

    pub fn id(&self) -> &I {
        &self.id
    }

    pub fn policy(&self) -> &RoutingPolicy<I> {
        &self.policy
    }

    /// Messages currently held
    pub fn buffer(&self) -> &[Message<I>] {
        &self.buffer
    }

    pub fn motion(&self) -> Motion {
        self.motion
    }

    /// Find a held message
    pub fn message(&self, id: &MessageId) -> Option<&Message<I>> {
        self.buffer.iter().find(|m| &m.id == id)
    }

    /// Check if this node has received `id` as its destination
    pub fn has_delivered(&self, id: &MessageId) -> bool {
        self.delivered.contains(id)
    }

    /// Whether a copy of `id` is held or was already delivered here
    fn knows(&self, id: &MessageId) -> bool {
        self.delivered.contains(id) || self.buffer.iter().any(|m| &m.id == id)
    }

    fn context(&self) -> NodeContextGuard {
        NodeContextGuard::with_instance_id(&self.id, self.instance)
    }
}

/// The replay world
#[derive(Debug)]
pub struct World<I: PeerIdentity> {
    prototype: RoutingPolicy<I>,
    nodes: Vec<Node<I>>,
    index: HashMap<I, usize>,
    links: BTreeSet<(I, I)>,
    messages: HashSet<MessageId>,
    now: SimTime,
    stats: SimStats,
}

impl<I: PeerIdentity> World<I> {
    /// Create an empty world; nodes join on first mention
    pub fn new(prototype: RoutingPolicy<I>) -> Self {
        Self {
            prototype,
            nodes: Vec::new(),
            index: HashMap::new(),
            links: BTreeSet::new(),
            messages: HashSet::new(),
            now: SimTime::ZERO,
            stats: SimStats::default(),
        }
    }

    /// Create a world with `nodes` already present, in that order
    pub fn with_nodes(prototype: RoutingPolicy<I>, nodes: impl IntoIterator<Item = I>) -> Self {
        let mut world = Self::new(prototype);
        for node in nodes {
            world.add_node(node);
        }
        world
    }

    /// Add a node with a fresh policy replica; no-op if it exists
    pub fn add_node(&mut self, id: I) -> usize {
        if let Some(&idx) = self.index.get(&id) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(Node::new(id.clone(), self.prototype.replicate()));
        self.index.insert(id, idx);
        idx
    }

    pub fn node(&self, id: &I) -> Option<&Node<I>> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    /// All nodes, in the order they joined
    pub fn nodes(&self) -> &[Node<I>] {
        &self.nodes
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Check if a link between `a` and `b` is up
    pub fn is_connected(&self, a: &I, b: &I) -> bool {
        self.links.contains(&link_key(a, b))
    }

    /// Move the clock forward to `at`
    pub fn advance_to(&mut self, at: SimTime) -> Result<(), SimError> {
        if at < self.now {
            return Err(SimError::OutOfOrder { at, now: self.now });
        }
        self.now = at;
        Ok(())
    }

    /// Replay a whole trace
    pub fn replay(&mut self, trace: &Trace<I>) -> Result<&SimStats, SimError> {
        for event in trace.events() {
            self.apply(event)?;
        }
        Ok(&self.stats)
    }

    /// Apply one trace event
    pub fn apply(&mut self, event: &TraceEvent<I>) -> Result<(), SimError> {
        self.advance_to(event.at())?;
        match event {
            TraceEvent::Connection { a, b, state, .. } => {
                match state {
                    LinkState::Up => self.connect(a, b)?,
                    LinkState::Down => self.disconnect(a, b)?,
                };
            }
            TraceEvent::Create {
                id, from, to, size, ..
            } => {
                self.create_message(id.clone(), from, to, *size)?;
            }
            TraceEvent::Move { node, motion, .. } => self.set_motion(node, *motion),
        }
        Ok(())
    }

    /// Update a node's location and speed
    pub fn set_motion(&mut self, node: &I, motion: Motion) {
        let idx = self.add_node(node.clone());
        self.nodes[idx].motion = motion;
    }

    /// Bring up the link between `a` and `b`
    ///
    /// Returns `false` if the link was already up.
    pub fn connect(&mut self, a: &I, b: &I) -> Result<bool, SimError> {
        if a == b {
            return Err(SimError::SelfContact {
                node: a.to_string(),
            });
        }
        let key = link_key(a, b);
        if self.links.contains(&key) {
            trace!(a = %a, b = %b, "Link already up");
            return Ok(false);
        }

        let low = self.add_node(key.0.clone());
        let high = self.add_node(key.1.clone());
        let at = self.now;
        let (lo, hi) = pair_mut(&mut self.nodes, low, high);
        let contact = Contact::new(lo.id.clone(), hi.id.clone(), at).with_motion(lo.motion, hi.motion);
        let reversed = contact.reversed();

        {
            let _ctx = lo.context();
            let _span = debug_span!("connection_up", node = %lo.id, peer = %hi.id).entered();
            lo.policy
                .connection_up(&contact, &hi.policy)
                .map_err(|source| SimError::Engine { at, source })?;
        }
        {
            let _ctx = hi.context();
            let _span = debug_span!("connection_up", node = %hi.id, peer = %lo.id).entered();
            hi.policy
                .connection_up(&reversed, &lo.policy)
                .map_err(|source| SimError::Engine { at, source })?;
        }
        {
            let _ctx = lo.context();
            let _span = debug_span!("exchange", node = %lo.id, peer = %hi.id).entered();
            lo.policy
                .exchange_for_new_connection(&contact, &mut hi.policy)
                .map_err(|source| SimError::Engine { at, source })?;
        }

        debug!(a = %key.0, b = %key.1, t = %at, "Link up");
        self.links.insert(key);
        self.exchange_messages(low, high)?;
        self.exchange_messages(high, low)?;
        Ok(true)
    }

    /// Take down the link between `a` and `b`
    ///
    /// Returns `false` if the link was not up.
    pub fn disconnect(&mut self, a: &I, b: &I) -> Result<bool, SimError> {
        let key = link_key(a, b);
        if !self.links.remove(&key) {
            trace!(a = %a, b = %b, "Link already down");
            return Ok(false);
        }

        let (Some(&low), Some(&high)) = (self.index.get(&key.0), self.index.get(&key.1)) else {
            return Ok(false);
        };
        let at = self.now;
        let (lo, hi) = pair_mut(&mut self.nodes, low, high);
        let contact = Contact::new(lo.id.clone(), hi.id.clone(), at).with_motion(lo.motion, hi.motion);
        let reversed = contact.reversed();

        {
            let _ctx = lo.context();
            let _span = debug_span!("connection_down", node = %lo.id, peer = %hi.id).entered();
            lo.policy
                .connection_down(&contact, &mut hi.policy)
                .map_err(|source| SimError::Engine { at, source })?;
        }
        {
            let _ctx = hi.context();
            let _span = debug_span!("connection_down", node = %hi.id, peer = %lo.id).entered();
            hi.policy
                .connection_down(&reversed, &mut lo.policy)
                .map_err(|source| SimError::Engine { at, source })?;
        }

        debug!(a = %key.0, b = %key.1, t = %at, "Link down");
        Ok(true)
    }

    /// Create a message at `from` for `to`
    ///
    /// Returns `false` if the source policy did not accept it.
    pub fn create_message(
        &mut self,
        id: MessageId,
        from: &I,
        to: &I,
        size: u64,
    ) -> Result<bool, SimError> {
        if self.messages.contains(&id) {
            return Err(SimError::DuplicateMessage { id: id.to_string() });
        }
        let source = self.add_node(from.clone());
        self.add_node(to.clone());

        let mut message = Message::new(id.clone(), from.clone(), to.clone(), self.now).with_size(size);
        let node = &mut self.nodes[source];
        let accepted = {
            let _ctx = node.context();
            node.policy.new_message(&mut message)
        };
        if !accepted {
            debug!(message = %id, "Source policy declined message");
            return Ok(false);
        }

        node.buffer.push(message);
        self.messages.insert(id);
        self.stats.created += 1;

        let peers: Vec<usize> = self
            .links
            .iter()
            .filter_map(|(a, b)| match (a == from, b == from) {
                (true, _) => Some(b),
                (_, true) => Some(a),
                _ => None,
            })
            .filter_map(|peer| self.index.get(peer).copied())
            .collect();
        for peer in peers {
            self.exchange_messages(source, peer)?;
        }
        Ok(true)
    }

    /// Offer every message `from` holds to `to`
    fn exchange_messages(&mut self, from: usize, to: usize) -> Result<(), SimError> {
        let at = self.now;
        let (sender, receiver) = pair_mut(&mut self.nodes, from, to);
        let _ctx = sender.context();
        let _span = debug_span!("exchange_messages", node = %sender.id, peer = %receiver.id).entered();
        let engine_error = |source| SimError::Engine { at, source };

        let mut idx = 0;
        while idx < sender.buffer.len() {
            let message = &mut sender.buffer[idx];
            if receiver.knows(&message.id) {
                idx += 1;
                continue;
            }
            let send = sender
                .policy
                .should_send_message_to_host(message, &receiver.id, &receiver.policy, &sender.id)
                .map_err(engine_error)?;
            if !send {
                idx += 1;
                continue;
            }

            let mut copy = message.replicate_for_transfer();
            self.stats.relayed += 1;
            if receiver.policy.is_final_dest(&copy, &receiver.id) {
                if receiver.delivered.insert(copy.id.clone()) {
                    self.stats.delivered += 1;
                    self.stats.total_latency += at.since(copy.created_at);
                    debug!(message = %copy.id, to = %receiver.id, "Delivered");
                }
            } else if receiver
                .policy
                .should_save_received_message(&mut copy, &receiver.id)
                .map_err(engine_error)?
            {
                trace!(message = %copy.id, to = %receiver.id, copies = ?copy.copies(), "Stored");
                receiver.buffer.push(copy);
            } else {
                self.stats.refused += 1;
            }

            if sender
                .policy
                .should_delete_sent_message(message, &receiver.id)
                .map_err(engine_error)?
            {
                sender.buffer.remove(idx);
                self.stats.deleted += 1;
            } else {
                idx += 1;
            }
        }
        Ok(())
    }

    /// Centrality report over every node, for rank-capable policies
    pub fn centrality_report(&self) -> Option<CentralityReport<I>> {
        if !self.prototype.family().is_rank_based() {
            return None;
        }
        self.nodes
            .iter()
            .map(|node| Some((node.id.clone(), node.policy.centralities()?)))
            .collect()
    }
}

fn link_key<I: PeerIdentity>(a: &I, b: &I) -> (I, I) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// Two distinct mutable elements of a slice
fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
