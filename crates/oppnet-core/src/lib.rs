//! # Oppnet Core
//!
//! Core traits, types, and errors shared by the Oppnet decision engines.
//!
//! An opportunistic network never has an end-to-end path. Nodes carry
//! messages and decide, at each pairwise contact, whether to hand a copy
//! over. This crate holds the vocabulary those decisions are phrased in,
//! independent of any particular policy.
//!
//! ## Key Traits
//!
//! - [`PeerIdentity`]: Abstraction over node identification
//! - [`DecisionEngine`]: The hook contract every forwarding policy implements
//! - [`SimClock`]: Simulated time source
//!
//! ## Key Types
//!
//! - [`NodeAddress`]: Numeric node identity used by simulations and tests
//! - [`Contact`]: One live contact between two nodes, as seen from one side
//! - [`Message`]: A carried message with its typed routing extension
//! - [`SimTime`]: Simulated seconds

pub mod contact;
pub mod error;
pub mod identity;
pub mod message;
pub mod time;
pub mod traits;

// Re-export main types
pub use contact::*;
pub use error::*;
pub use identity::*;
pub use message::*;
pub use time::*;
pub use traits::*;
