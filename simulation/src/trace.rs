//! Contact trace parsing
//!
//! Traces use the standard external-events line format, one event per line:
//!
//! ```text
//! # time CONN a b up|down
//! 10   CONN 0 1 up
//! 40   CONN 0 1 down
//! # time C id from to [size]
//! 12   C M1 0 3 1024
//! # time MOVE node x y speed
//! 15   MOVE 2 30.0 40.0 1.5
//! ```
//!
//! Blank lines and `#` comments are ignored. Times must be finite,
//! non-negative and non-decreasing.

use std::fmt;
use std::str::FromStr;

use oppnet_core::{Coord, MessageId, Motion, PeerIdentity, SimTime};
use thiserror::Error;

/// Errors raised while reading a trace
#[derive(Debug, Error, PartialEq)]
pub enum TraceError {
    #[error("line {line}: expected {expected}, found {found:?}")]
    Malformed {
        line: usize,
        expected: &'static str,
        found: String,
    },

    #[error("line {line}: unknown event kind {kind:?}")]
    UnknownKind { line: usize, kind: String },

    #[error("line {line}: {reason}")]
    Invalid { line: usize, reason: String },
}

impl TraceError {
    /// 1-based line the error was found on
    pub fn line(&self) -> usize {
        match self {
            TraceError::Malformed { line, .. }
            | TraceError::UnknownKind { line, .. }
            | TraceError::Invalid { line, .. } => *line,
        }
    }
}

/// Direction of a connection event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Up,
    Down,
}

impl FromStr for LinkState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(LinkState::Up),
            "down" => Ok(LinkState::Down),
            _ => Err(()),
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Up => write!(f, "up"),
            LinkState::Down => write!(f, "down"),
        }
    }
}

/// One event from a contact trace
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent<I: PeerIdentity> {
    /// A link between two nodes comes up or goes down
    Connection {
        at: SimTime,
        a: I,
        b: I,
        state: LinkState,
    },
    /// A message is created at `from`
    Create {
        at: SimTime,
        id: MessageId,
        from: I,
        to: I,
        size: u64,
    },
    /// A node's location and speed change
    Move { at: SimTime, node: I, motion: Motion },
}

impl<I: PeerIdentity> TraceEvent<I> {
    /// When the event happens
    pub fn at(&self) -> SimTime {
        match self {
            TraceEvent::Connection { at, .. }
            | TraceEvent::Create { at, .. }
            | TraceEvent::Move { at, .. } => *at,
        }
    }
}

/// A parsed, time-ordered contact trace
#[derive(Debug, Clone)]
pub struct Trace<I: PeerIdentity> {
    events: Vec<TraceEvent<I>>,
}

impl<I> Trace<I>
where
    I: PeerIdentity + FromStr,
{
    /// Parse a whole trace
    pub fn parse(text: &str) -> Result<Self, TraceError> {
        let mut events = Vec::new();
        let mut last = SimTime::ZERO;

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let Some(event) = parse_line::<I>(line, raw)? else {
                continue;
            };
            if event.at() < last {
                return Err(TraceError::Invalid {
                    line,
                    reason: format!("time {} is earlier than previous event at {}", event.at(), last),
                });
            }
            last = event.at();
            events.push(event);
        }

        Ok(Self { events })
    }
}

impl<I: PeerIdentity> Trace<I> {
    /// Build a trace from already ordered events
    pub fn from_events(events: Vec<TraceEvent<I>>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[TraceEvent<I>] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Every node named by the trace, sorted
    pub fn nodes(&self) -> Vec<I> {
        let mut nodes: Vec<I> = self
            .events
            .iter()
            .flat_map(|event| match event {
                TraceEvent::Connection { a, b, .. } => vec![a.clone(), b.clone()],
                TraceEvent::Create { from, to, .. } => vec![from.clone(), to.clone()],
                TraceEvent::Move { node, .. } => vec![node.clone()],
            })
            .collect();
        nodes.sort();
        nodes.dedup();
        nodes
    }

    /// Time of the last event
    pub fn end_time(&self) -> SimTime {
        self.events.last().map(TraceEvent::at).unwrap_or(SimTime::ZERO)
    }
}

/// Parse one trace line
///
/// Returns `Ok(None)` for blank and comment lines.
pub fn parse_line<I>(line: usize, raw: &str) -> Result<Option<TraceEvent<I>>, TraceError>
where
    I: PeerIdentity + FromStr,
{
    let text = raw.split('#').next().unwrap_or("").trim();
    if text.is_empty() {
        return Ok(None);
    }

    let fields: Vec<&str> = text.split_whitespace().collect();
    let at = time(line, fields[0])?;
    let Some(kind) = fields.get(1) else {
        return Err(TraceError::Malformed {
            line,
            expected: "an event kind after the time",
            found: text.to_string(),
        });
    };
    let args = &fields[2..];

    let event = match *kind {
        "CONN" => {
            let [a, b, state] = args else {
                return Err(arity(line, "CONN <a> <b> up|down", text));
            };
            let (a, b) = (node::<I>(line, a)?, node::<I>(line, b)?);
            if a == b {
                return Err(TraceError::Invalid {
                    line,
                    reason: format!("node {} cannot connect to itself", a),
                });
            }
            let state = state.parse::<LinkState>().map_err(|_| TraceError::Malformed {
                line,
                expected: "up or down",
                found: state.to_string(),
            })?;
            TraceEvent::Connection { at, a, b, state }
        }
        "C" => {
            let (id, from, to, size) = match args {
                [id, from, to] => (id, from, to, None),
                [id, from, to, size] => (id, from, to, Some(size)),
                _ => return Err(arity(line, "C <id> <from> <to> [size]", text)),
            };
            let (from, to) = (node::<I>(line, from)?, node::<I>(line, to)?);
            if from == to {
                return Err(TraceError::Invalid {
                    line,
                    reason: format!("message {} is addressed to its own source", id),
                });
            }
            let size = match size {
                Some(size) => size.parse::<u64>().map_err(|_| TraceError::Malformed {
                    line,
                    expected: "a size in bytes",
                    found: size.to_string(),
                })?,
                None => 0,
            };
            TraceEvent::Create {
                at,
                id: MessageId::new(*id),
                from,
                to,
                size,
            }
        }
        "MOVE" => {
            let [node_field, x, y, speed] = args else {
                return Err(arity(line, "MOVE <node> <x> <y> <speed>", text));
            };
            let node = node::<I>(line, node_field)?;
            let location = Coord::new(number(line, x)?, number(line, y)?);
            let speed = number(line, speed)?;
            if speed < 0.0 {
                return Err(TraceError::Invalid {
                    line,
                    reason: format!("negative speed {}", speed),
                });
            }
            let motion = if speed > 0.0 {
                Motion::moving(location, speed)
            } else {
                Motion::stationary(location)
            };
            TraceEvent::Move { at, node, motion }
        }
        other => {
            return Err(TraceError::UnknownKind {
                line,
                kind: other.to_string(),
            });
        }
    };

    Ok(Some(event))
}

fn arity(line: usize, expected: &'static str, found: &str) -> TraceError {
    TraceError::Malformed {
        line,
        expected,
        found: found.to_string(),
    }
}

fn time(line: usize, field: &str) -> Result<SimTime, TraceError> {
    let secs = number(line, field)?;
    if secs < 0.0 {
        return Err(TraceError::Invalid {
            line,
            reason: format!("negative time {}", secs),
        });
    }
    Ok(SimTime(secs))
}

fn number(line: usize, field: &str) -> Result<f64, TraceError> {
    field
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| TraceError::Malformed {
            line,
            expected: "a finite number",
            found: field.to_string(),
        })
}

fn node<I: FromStr>(line: usize, field: &str) -> Result<I, TraceError> {
    field.parse().map_err(|_| TraceError::Malformed {
        line,
        expected: "a node address",
        found: field.to_string(),
    })
}
