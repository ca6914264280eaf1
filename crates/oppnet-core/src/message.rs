//! Messages carried between nodes
//!
//! Engines never look at payloads. The only thing a policy writes on a
//! message is its copy quota, which is carried as a typed field instead of
//! an entry in an untyped property bag.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::PeerIdentity;
use crate::time::SimTime;

/// Unique message identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message in some node's buffer
///
/// Each node holds its own instance; a transfer hands the receiver an
/// independent copy via [`Message::replicate_for_transfer`], so quota
/// updates on one side never leak to the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "I: PeerIdentity")]
pub struct Message<I: PeerIdentity> {
    /// Unique identifier
    pub id: MessageId,
    /// Originating node
    pub source: I,
    /// Final destination
    pub destination: I,
    /// When the message was created
    pub created_at: SimTime,
    /// Size in bytes
    pub size: u64,
    /// Remaining copy quota, owned by the spray policies
    copies: Option<u32>,
}

impl<I: PeerIdentity> Message<I> {
    /// Create a message without a copy quota
    pub fn new(id: MessageId, source: I, destination: I, created_at: SimTime) -> Self {
        Self {
            id,
            source,
            destination,
            created_at,
            size: 0,
            copies: None,
        }
    }

    /// Set the message size
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Get the final destination
    pub fn destination(&self) -> &I {
        &self.destination
    }

    /// Check if `node` is the final destination
    pub fn is_addressed_to(&self, node: &I) -> bool {
        &self.destination == node
    }

    /// Get the remaining copy quota, if one was stamped
    pub fn copies(&self) -> Option<u32> {
        self.copies
    }

    /// Stamp the initial copy quota
    ///
    /// Only a message without a quota is stamped; returns `false` and leaves
    /// the existing quota alone otherwise.
    pub fn stamp_copies(&mut self, copies: u32) -> bool {
        if self.copies.is_some() {
            return false;
        }
        self.copies = Some(copies);
        true
    }

    /// Overwrite the remaining copy quota
    pub fn set_copies(&mut self, copies: u32) {
        self.copies = Some(copies);
    }

    /// The receiver's independent copy of this message
    pub fn replicate_for_transfer(&self) -> Self {
        self.clone()
    }
}
