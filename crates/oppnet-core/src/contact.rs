//! Contacts between nodes
//!
//! A [`Contact`] is what the framework hands an engine for every
//! connection-level hook: who is on each end, what time it is, and where
//! both nodes are and how fast they move. It replaces reaching into a
//! global host registry for that information.

use serde::{Deserialize, Serialize};

use crate::identity::PeerIdentity;
use crate::time::SimTime;

/// A position on the simulation plane
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    /// Create a coordinate
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another coordinate
    pub fn distance(&self, other: &Coord) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Movement state of a node
///
/// `speed` is `None` while the node has no active movement path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub location: Coord,
    pub speed: Option<f64>,
}

impl Motion {
    /// A node standing still at `location`
    pub fn stationary(location: Coord) -> Self {
        Self {
            location,
            speed: None,
        }
    }

    /// A node moving along a path at `speed`
    pub fn moving(location: Coord, speed: f64) -> Self {
        Self {
            location,
            speed: Some(speed),
        }
    }

    /// Current speed, `0` without a path
    pub fn speed_or_zero(&self) -> f64 {
        self.speed.unwrap_or(0.0).max(0.0)
    }
}

/// One live contact, seen from the `local` side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "I: PeerIdentity")]
pub struct Contact<I: PeerIdentity> {
    /// The node whose engine is being called
    pub local: I,
    /// The node on the other end
    pub peer: I,
    /// Simulated time of the event
    pub now: SimTime,
    /// Movement state of the local node
    pub local_motion: Motion,
    /// Movement state of the peer
    pub peer_motion: Motion,
}

impl<I: PeerIdentity> Contact<I> {
    /// Create a contact between two stationary nodes at the origin
    pub fn new(local: I, peer: I, now: SimTime) -> Self {
        Self {
            local,
            peer,
            now,
            local_motion: Motion::default(),
            peer_motion: Motion::default(),
        }
    }

    /// Attach movement state for both endpoints
    pub fn with_motion(mut self, local_motion: Motion, peer_motion: Motion) -> Self {
        self.local_motion = local_motion;
        self.peer_motion = peer_motion;
        self
    }

    /// Get the node on the other side of `endpoint`
    ///
    /// Returns `None` if `endpoint` is not part of this contact.
    pub fn other_node(&self, endpoint: &I) -> Option<&I> {
        if endpoint == &self.local {
            Some(&self.peer)
        } else if endpoint == &self.peer {
            Some(&self.local)
        } else {
            None
        }
    }

    /// The same contact as seen from the peer
    pub fn reversed(&self) -> Self {
        Self {
            local: self.peer.clone(),
            peer: self.local.clone(),
            now: self.now,
            local_motion: self.peer_motion,
            peer_motion: self.local_motion,
        }
    }

    /// Current distance between the two endpoints
    pub fn distance(&self) -> f64 {
        self.local_motion.location.distance(&self.peer_motion.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::NodeAddress;

    #[test]
    fn test_coord_distance() {
        let a = Coord::new(0.0, 0.0);
        let b = Coord::new(3.0, 4.0);
        assert_eq!(a.distance(&b), 5.0);
    }

    #[test]
    fn test_speed_defaults_to_zero() {
        assert_eq!(Motion::stationary(Coord::default()).speed_or_zero(), 0.0);
        assert_eq!(Motion::moving(Coord::default(), 1.5).speed_or_zero(), 1.5);
    }

    #[test]
    fn test_other_node() {
        let a = NodeAddress(1);
        let b = NodeAddress(2);
        let contact = Contact::new(a, b, SimTime(5.0));

        assert_eq!(contact.other_node(&a), Some(&b));
        assert_eq!(contact.other_node(&b), Some(&a));
        assert_eq!(contact.other_node(&NodeAddress(3)), None);
    }

    #[test]
    fn test_reversed_swaps_motion() {
        let contact = Contact::new(NodeAddress(1), NodeAddress(2), SimTime(5.0)).with_motion(
            Motion::moving(Coord::new(0.0, 0.0), 2.0),
            Motion::stationary(Coord::new(6.0, 8.0)),
        );
        let reversed = contact.reversed();

        assert_eq!(reversed.local, NodeAddress(2));
        assert_eq!(reversed.peer, NodeAddress(1));
        assert_eq!(reversed.local_motion.speed, None);
        assert_eq!(reversed.peer_motion.speed, Some(2.0));
        assert_eq!(reversed.distance(), 10.0);
    }

    #[test]
    fn test_contact_deserializes_generic_identity() {
        let contact = Contact::new(NodeAddress(1), NodeAddress(2), SimTime(5.0))
            .with_motion(Motion::default(), Motion::moving(Coord::new(1.0, 1.0), 3.0));

        let json = serde_json::to_string(&contact).unwrap();
        let back: Contact<NodeAddress> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, contact);
    }
}
