//! Node identity abstractions
//!
//! This module provides the [`PeerIdentity`] trait that abstracts over
//! whatever the surrounding framework uses to name its nodes.
//!
//! - `NodeAddress`: Numeric identity used by the replay harness and tests

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::str::FromStr;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::IdentityError;

/// Trait for node identity abstraction
///
/// Engines only ever compare identities and use them as map keys, so the
/// bounds are about hashing, ordering and display. Ordering keeps reports
/// and iteration over snapshots deterministic.
pub trait PeerIdentity:
    Clone + Eq + Hash + Ord + Send + Sync + Debug + Display + Serialize + DeserializeOwned + 'static
{
    /// Get a short display form (for logging)
    fn short_id(&self) -> String {
        format!("{}", self)
    }
}

/// Numeric node address
///
/// Displays as `n<address>`, the way simulation hosts are usually named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeAddress(pub u32);

impl NodeAddress {
    /// Create a node address
    pub const fn new(address: u32) -> Self {
        Self(address)
    }

    /// Generate addresses `n0` through `n(count - 1)`
    pub fn range(count: u32) -> Vec<Self> {
        (0..count).map(Self).collect()
    }

    /// Get the underlying number
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl Display for NodeAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl FromStr for NodeAddress {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().strip_prefix('n').unwrap_or(s.trim());
        digits
            .parse::<u32>()
            .map(Self)
            .map_err(|_| IdentityError::InvalidFormat(format!("Invalid node address: {}", s)))
    }
}

impl PeerIdentity for NodeAddress {
    fn short_id(&self) -> String {
        self.0.to_string()
    }
}
