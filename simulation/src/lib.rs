//! Oppnet contact-trace replay
//!
//! Drives the decision engines from `oppnet-dtn` through a recorded contact
//! trace, one policy replica per node, and collects delivery statistics and
//! the centrality report.
//!
//! ## Modules
//!
//! - [`trace`]: the line-oriented trace format
//! - [`world`]: nodes, buffers, live links and the replay loop
//! - [`scenario`]: loading settings and traces from disk
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use oppnet_core::NodeAddress;
//! use oppnet_simulation::Scenario;
//!
//! let scenario: Scenario<NodeAddress> = Scenario::load(settings_path, trace_path)?;
//! let world = scenario.run(NodeAddress::range(50))?;
//! println!("{}", world.stats());
//! ```

pub mod scenario;
pub mod trace;
pub mod world;

pub use scenario::{Scenario, load_settings, write_report};
pub use trace::{LinkState, Trace, TraceError, TraceEvent, parse_line};
pub use world::{Node, SimError, SimStats, World};
