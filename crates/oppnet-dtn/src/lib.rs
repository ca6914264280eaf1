//! # Oppnet DTN
//!
//! Decision engines for opportunistic, delay-tolerant routing.
//!
//! In an opportunistic network there is no end-to-end path: messages move
//! only when two nodes happen to be in range. A decision engine is the
//! per-node policy that answers, at every contact, "should this message go
//! to that node?" and "should I keep my copy?".
//!
//! ## Policies
//!
//! - **PeopleRank** ([`people_rank`]): PageRank over the social contact
//!   graph, updated eagerly at the end of every long enough contact.
//!   Messages move to nodes with higher rank.
//!
//! - **PeopleRank, lazy** ([`people_rank_alt`]): the same score, refreshed
//!   when a contact starts, over peers met often enough.
//!
//! - **Spray-and-Wait** ([`spray`]): a fixed copy quota is sprayed over
//!   the first nodes met, then holders wait for the destination.
//!
//! - **Spray-and-Focus** ([`focus`]): like Spray-and-Wait, but the last
//!   copy keeps moving towards nodes with a better encounter history.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use oppnet_core::{Contact, DecisionEngine, NodeAddress, SimTime};
//! use oppnet_dtn::{PolicyConfig, Settings};
//!
//! let settings = Settings::parse(scenario_text)?;
//! let prototype = PolicyConfig::from_settings(&settings)?.prototype::<NodeAddress>()?;
//!
//! let mut a = prototype.replicate();
//! let mut b = prototype.replicate();
//!
//! let contact = Contact::new(NodeAddress(0), NodeAddress(1), SimTime(10.0));
//! a.connection_up(&contact, &b)?;
//! b.connection_up(&contact.reversed(), &a)?;
//! a.exchange_for_new_connection(&contact, &mut b)?;
//! ```
//!
//! ## Architecture
//!
//! - [`history`]: per-peer contact spans and the mean inter-contact gap
//! - [`rank`]: the PeopleRank formula over a rank table
//! - [`people_rank`], [`people_rank_alt`], [`spray`], [`focus`]: the engines
//! - [`policy`]: runtime selection and dispatch
//! - [`centrality`]: centrality export and the popularity report
//! - [`settings`]: namespaced scenario settings
//! - [`error`]: crate error type

pub mod centrality;
pub mod error;
pub mod focus;
pub mod history;
pub mod people_rank;
pub mod people_rank_alt;
pub mod policy;
pub mod rank;
pub mod settings;
pub mod spray;

// Re-export main types
pub use centrality::{Centralities, CentralityReport};
pub use error::{DtnError, DtnResult};
pub use focus::{SprayAndFocusConfig, SprayAndFocusEngine, time_to_meet, transitive_updates};
pub use history::{ContactSpan, EncounterHistory, EncounterTracker};
pub use people_rank::{PeopleRankConfig, PeopleRankEngine};
pub use people_rank_alt::{PeopleRankAltConfig, PeopleRankAltEngine};
pub use policy::{ConfigWarning, PolicyConfig, PolicyFamily, RoutingPolicy};
pub use rank::{RankEntry, RankTable, people_rank, people_rank_from_sum};
pub use settings::{Settings, SettingsView};
pub use spray::{CopyBudget, SprayAndWaitConfig, SprayAndWaitEngine};
