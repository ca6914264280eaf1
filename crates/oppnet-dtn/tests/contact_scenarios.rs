//! Contact scenario tests
//!
//! Drives the decision engines through whole contacts the way a routing
//! framework would:
//! - Connection up / exchange / connection down on both sides
//! - Message hand-off with quota bookkeeping on sender and receiver
//! - Multi-hop relay chains
//! - Policy selection from scenario settings
//!
//! Everything runs on `NodeAddress` identities and hand-set times.

use oppnet_core::{
    ConfigError, Contact, Coord, DecisionEngine, EngineError, ManualClock, Message, MessageId,
    Motion, NodeAddress, SimClock, SimTime,
};
use oppnet_dtn::{
    PeopleRankConfig, PeopleRankEngine, PolicyConfig, PolicyFamily, RoutingPolicy, Settings,
    SprayAndFocusConfig, SprayAndWaitConfig, SprayAndWaitEngine,
};
use proptest::prelude::*;

// ============================================================================
// Helper functions for test setup
// ============================================================================

fn node(n: u32) -> NodeAddress {
    NodeAddress(n)
}

fn make_message(id: &str, from: u32, to: u32) -> Message<NodeAddress> {
    Message::new(MessageId::new(id), node(from), node(to), SimTime::ZERO)
}

/// Bring a contact up on both sides, at the clock's current time
fn contact_up<E: DecisionEngine<NodeAddress>>(
    clock: &ManualClock,
    a: (u32, &mut E),
    b: (u32, &mut E),
) {
    let contact = Contact::new(node(a.0), node(b.0), clock.now());
    a.1.connection_up(&contact, b.1).unwrap();
    b.1.connection_up(&contact.reversed(), a.1).unwrap();
    a.1.exchange_for_new_connection(&contact, b.1).unwrap();
}

/// Take a contact down on both sides, at the clock's current time
fn contact_down<E: DecisionEngine<NodeAddress>>(
    clock: &ManualClock,
    a: (u32, &mut E),
    b: (u32, &mut E),
) {
    let contact = Contact::new(node(a.0), node(b.0), clock.now());
    a.1.connection_down(&contact, b.1).unwrap();
    b.1.connection_down(&contact.reversed(), a.1).unwrap();
}

/// Outcome of offering one message over a live contact
#[derive(Debug, PartialEq)]
enum Handoff {
    NotSent,
    Delivered,
    Stored(Message<NodeAddress>),
    Refused,
}

/// Offer `message` from `sender` to `receiver`
///
/// Returns the outcome and whether the sender dropped its copy.
fn offer<E: DecisionEngine<NodeAddress>>(
    message: &mut Message<NodeAddress>,
    sender: (u32, &mut E),
    receiver: (u32, &mut E),
) -> (Handoff, bool) {
    let (from, to) = (node(sender.0), node(receiver.0));

    if !sender
        .1
        .should_send_message_to_host(message, &to, receiver.1, &from)
        .unwrap()
    {
        return (Handoff::NotSent, false);
    }

    let mut copy = message.replicate_for_transfer();
    let outcome = if receiver.1.is_final_dest(&copy, &to) {
        Handoff::Delivered
    } else if receiver.1.should_save_received_message(&mut copy, &to).unwrap() {
        Handoff::Stored(copy)
    } else {
        Handoff::Refused
    };

    let dropped = sender.1.should_delete_sent_message(message, &to).unwrap();
    (outcome, dropped)
}

// ============================================================================
// PeopleRank Contact Tests
// ============================================================================

#[test]
fn test_long_contact_ranks_both_nodes() {
    let clock = ManualClock::new(SimTime::ZERO);
    let config = PeopleRankConfig {
        damping_factor: 0.87,
        min_duration: 20.0,
    };
    let mut a: PeopleRankEngine<NodeAddress> = PeopleRankEngine::new(config).unwrap();
    let mut b = a.replicate();

    clock.set(SimTime(10.0));
    contact_up(&clock, (0, &mut a), (1, &mut b));
    clock.set(SimTime(40.0));
    contact_down(&clock, (0, &mut a), (1, &mut b));

    let span = *a.encounters().history(&node(1)).unwrap().last().unwrap();
    assert_eq!(span.start, SimTime(10.0));
    assert_eq!(span.end, SimTime(40.0));

    assert!(a.snapshot_rank_table().contains(&node(1)));
    assert!(b.snapshot_rank_table().contains(&node(0)));
    assert!(a.rank() > 0.13);
    assert!(b.rank() > 0.13);
    // b ranked a after a had already counted b
    assert_eq!(b.snapshot_rank_table().get(&node(0)).unwrap().degree, 2);
}

#[test]
fn test_contact_at_threshold_is_recorded_but_not_ranked() {
    let clock = ManualClock::new(SimTime::ZERO);
    let config = PeopleRankConfig {
        damping_factor: 0.87,
        min_duration: 30.0,
    };
    let mut a: PeopleRankEngine<NodeAddress> = PeopleRankEngine::new(config).unwrap();
    let mut b = a.replicate();

    clock.set(SimTime(10.0));
    contact_up(&clock, (0, &mut a), (1, &mut b));
    clock.set(SimTime(40.0));
    contact_down(&clock, (0, &mut a), (1, &mut b));

    assert_eq!(a.encounters().history(&node(1)).unwrap().len(), 1);
    assert!(a.snapshot_rank_table().is_empty());
    assert!(b.snapshot_rank_table().is_empty());
}

#[test]
fn test_message_climbs_rank_gradient() {
    let clock = ManualClock::new(SimTime::ZERO);
    let config = PeopleRankConfig {
        damping_factor: 0.87,
        min_duration: 5.0,
    };
    let prototype: PeopleRankEngine<NodeAddress> = PeopleRankEngine::new(config).unwrap();
    let mut hub = prototype.replicate();
    let mut leaf = prototype.replicate();

    // The hub spends time with several other nodes
    for peer in 10..14 {
        let mut other = prototype.replicate();
        contact_up(&clock, (1, &mut hub), (peer, &mut other));
        clock.advance(60.0);
        contact_down(&clock, (1, &mut hub), (peer, &mut other));
    }

    let mut msg = make_message("M1", 0, 99);
    assert!(leaf.new_message(&mut msg));

    contact_up(&clock, (0, &mut leaf), (1, &mut hub));
    let (outcome, dropped) = offer(&mut msg, (0, &mut leaf), (1, &mut hub));
    assert!(matches!(outcome, Handoff::Stored(_)));
    assert!(dropped);
}

// ============================================================================
// Spray Chain Tests
// ============================================================================

#[test]
fn test_binary_chain_halves_quota() {
    let clock = ManualClock::new(SimTime::ZERO);
    let prototype: SprayAndWaitEngine<NodeAddress> =
        SprayAndWaitEngine::new(SprayAndWaitConfig::binary(4)).unwrap();
    let (mut a, mut b, mut c) = (
        prototype.replicate(),
        prototype.replicate(),
        prototype.replicate(),
    );

    let mut at_a = make_message("M1", 0, 9);
    assert!(a.new_message(&mut at_a));
    assert_eq!(at_a.copies(), Some(4));

    // A -> B
    contact_up(&clock, (0, &mut a), (1, &mut b));
    let (outcome, dropped) = offer(&mut at_a, (0, &mut a), (1, &mut b));
    let Handoff::Stored(mut at_b) = outcome else {
        panic!("B should store the message");
    };
    assert!(!dropped);
    assert_eq!(at_b.copies(), Some(2));
    assert_eq!(at_a.copies(), Some(2));

    // B -> C
    contact_up(&clock, (1, &mut b), (2, &mut c));
    let (outcome, dropped) = offer(&mut at_b, (1, &mut b), (2, &mut c));
    let Handoff::Stored(at_c) = outcome else {
        panic!("C should store the message");
    };
    assert!(!dropped);
    assert_eq!(at_c.copies(), Some(1));
    assert_eq!(at_b.copies(), Some(1));

    // C is in the wait phase
    let mut d = prototype.replicate();
    let mut at_c = at_c;
    let (outcome, _) = offer(&mut at_c, (2, &mut c), (3, &mut d));
    assert_eq!(outcome, Handoff::NotSent);
}

#[test]
fn test_wait_phase_delivers_and_drops() {
    let prototype: SprayAndWaitEngine<NodeAddress> =
        SprayAndWaitEngine::new(SprayAndWaitConfig::source(1)).unwrap();
    let (mut a, mut dest) = (prototype.replicate(), prototype.replicate());

    let mut msg = make_message("M1", 0, 9);
    a.new_message(&mut msg);

    let (outcome, dropped) = offer(&mut msg, (0, &mut a), (9, &mut dest));
    assert_eq!(outcome, Handoff::Delivered);
    assert!(dropped);
}

#[test]
fn test_delivery_does_not_spend_quota() {
    let prototype: SprayAndWaitEngine<NodeAddress> =
        SprayAndWaitEngine::new(SprayAndWaitConfig::binary(8)).unwrap();
    let (mut a, mut dest) = (prototype.replicate(), prototype.replicate());

    let mut msg = make_message("M1", 0, 9);
    a.new_message(&mut msg);

    let (outcome, dropped) = offer(&mut msg, (0, &mut a), (9, &mut dest));
    assert_eq!(outcome, Handoff::Delivered);
    assert!(!dropped);
    assert_eq!(msg.copies(), Some(8));
}

#[test]
fn test_unstamped_message_is_rejected() {
    let prototype: SprayAndWaitEngine<NodeAddress> =
        SprayAndWaitEngine::new(SprayAndWaitConfig::default()).unwrap();
    let (a, b) = (prototype.replicate(), prototype.replicate());
    let msg = make_message("raw", 0, 9);

    let err = a
        .should_send_message_to_host(&msg, &node(1), &b, &node(0))
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingCopyQuota { .. }));
}

// ============================================================================
// Spray-and-Focus Tests
// ============================================================================

#[test]
fn test_focus_learns_timers_through_relay() {
    let config = PolicyConfig::SprayAndFocus(SprayAndFocusConfig::default());
    let prototype: RoutingPolicy<NodeAddress> = config.prototype().unwrap();
    let (mut a, mut b, mut c) = (
        prototype.replicate(),
        prototype.replicate(),
        prototype.replicate(),
    );

    let moving = |local: u32, peer: u32, now: f64| {
        Contact::new(node(local), node(peer), SimTime(now)).with_motion(
            Motion::moving(Coord::new(0.0, 0.0), 2.0),
            Motion::moving(Coord::new(0.0, 40.0), 2.0),
        )
    };

    b.exchange_for_new_connection(&moving(1, 2, 100.0), &mut c)
        .unwrap();
    a.exchange_for_new_connection(&moving(0, 1, 300.0), &mut b)
        .unwrap();

    let RoutingPolicy::SprayAndFocus(a) = a else {
        panic!("expected a Spray-and-Focus engine");
    };
    // 40 units at speed 2: learned timer is 100 + 20
    assert_eq!(a.last_encounter(&node(2)), Some(SimTime(120.0)));
    assert_eq!(a.last_encounter(&node(1)), Some(SimTime(300.0)));
}

// ============================================================================
// Policy Selection Tests
// ============================================================================

#[test]
fn test_policy_from_scenario_text() {
    let scenario = "\
# Social routing scenario
Group.router = PeopleRankRouter
PeopleRankRouter.dampingFactor = 0.87
PeopleRankRouter.minDuration = 20
";
    let settings = Settings::parse(scenario).unwrap();
    let config = PolicyConfig::from_settings(&settings).unwrap();
    assert_eq!(config.family(), PolicyFamily::PeopleRank);

    let prototype: RoutingPolicy<NodeAddress> = config.prototype().unwrap();
    let clock = ManualClock::new(SimTime(10.0));
    let (mut a, mut b) = (prototype.replicate(), prototype.replicate());

    contact_up(&clock, (0, &mut a), (1, &mut b));
    clock.set(SimTime(40.0));
    contact_down(&clock, (0, &mut a), (1, &mut b));

    let centralities = a.centralities().unwrap();
    assert_eq!(centralities.len(), 3);
    assert_eq!(centralities[1], 1.0);
}

#[test]
fn test_mixed_policies_are_rejected() {
    let rank: RoutingPolicy<NodeAddress> = PolicyConfig::default().prototype().unwrap();
    let spray: RoutingPolicy<NodeAddress> = PolicyConfig::SprayAndWait(SprayAndWaitConfig::default())
        .prototype()
        .unwrap();
    let (mut a, mut b) = (rank.replicate(), spray.replicate());

    let contact = Contact::new(node(0), node(1), SimTime(5.0));
    assert!(matches!(
        a.connection_up(&contact, &b),
        Err(EngineError::FamilyMismatch { .. })
    ));
    assert!(matches!(
        b.connection_down(&contact.reversed(), &mut a),
        Err(EngineError::FamilyMismatch { .. })
    ));
}

#[test]
fn test_incomplete_scenario_is_rejected() {
    let settings = Settings::parse("Group.router = SprayAndWaitRouter\n").unwrap();
    assert!(matches!(
        PolicyConfig::from_settings(&settings),
        Err(ConfigError::Missing { key }) if key == "SprayAndWaitRouter.nrofCopies"
    ));
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// After k relay hops in binary mode a copy holds max(1, ceil(L / 2^k))
    #[test]
    fn prop_binary_chain_closed_form(initial in 1u32..1024, hops in 0usize..12) {
        let prototype: SprayAndWaitEngine<NodeAddress> =
            SprayAndWaitEngine::new(SprayAndWaitConfig::binary(initial)).unwrap();
        let mut engines: Vec<_> = (0..=hops).map(|_| prototype.replicate()).collect();

        let mut msg = make_message("M1", 0, 999);
        engines[0].new_message(&mut msg);

        for k in 0..hops {
            if msg.copies() == Some(1) {
                break;
            }
            let (left, right) = engines.split_at_mut(k + 1);
            let (outcome, _) = offer(&mut msg, (k as u32, &mut left[k]), (k as u32 + 1, &mut right[0]));
            let Handoff::Stored(next) = outcome else {
                return Err(TestCaseError::fail(format!("hop {} not stored", k)));
            };
            msg = next;
        }

        let expected = initial.div_ceil(1u32 << hops).max(1);
        prop_assert_eq!(msg.copies(), Some(expected));
    }

    /// Copies held anywhere never exceed the initial quota nor drop below one
    #[test]
    fn prop_spray_quota_bounds(
        initial in 1u32..256,
        binary in any::<bool>(),
        offers in prop::collection::vec((0usize..6, 0usize..6), 1..40),
    ) {
        let config = SprayAndWaitConfig { initial_copies: initial, binary };
        let prototype: SprayAndWaitEngine<NodeAddress> = SprayAndWaitEngine::new(config).unwrap();
        let mut engines: Vec<_> = (0..6).map(|_| prototype.replicate()).collect();
        let mut held: Vec<Option<Message<NodeAddress>>> = vec![None; 6];

        let mut msg = make_message("M1", 0, 999);
        engines[0].new_message(&mut msg);
        held[0] = Some(msg);

        for (from, to) in offers {
            if from == to || held[to].is_some() {
                continue;
            }
            let Some(mut msg) = held[from].take() else { continue };

            let (lo, hi) = (from.min(to), from.max(to));
            let (left, right) = engines.split_at_mut(hi);
            let (sender, receiver) = if from < to {
                (&mut left[lo], &mut right[0])
            } else {
                (&mut right[0], &mut left[lo])
            };
            let (outcome, dropped) = offer(&mut msg, (from as u32, sender), (to as u32, receiver));

            if let Handoff::Stored(copy) = outcome {
                held[to] = Some(copy);
            }
            if !dropped {
                held[from] = Some(msg);
            }
        }

        for copy in held.iter().flatten() {
            let copies = copy.copies().unwrap_or(0);
            prop_assert!(copies >= 1);
            prop_assert!(copies <= initial);
        }
    }
}
