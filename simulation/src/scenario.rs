//! Scenario loading
//!
//! A scenario is a settings file selecting and configuring the policy plus
//! a contact trace. Settings files ending in `.toml` are read as a table of
//! tables; anything else as `Namespace.key = value` lines.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use oppnet_core::PeerIdentity;
use oppnet_dtn::{CentralityReport, PolicyConfig, Settings};
use tracing::{info, warn};

use crate::trace::Trace;
use crate::world::World;

/// Policy plus trace, ready to replay
#[derive(Debug, Clone)]
pub struct Scenario<I: PeerIdentity> {
    pub policy: PolicyConfig,
    pub trace: Trace<I>,
}

impl<I> Scenario<I>
where
    I: PeerIdentity + FromStr,
{
    /// Load settings and trace from disk
    pub fn load(settings_path: &Path, trace_path: &Path) -> anyhow::Result<Self> {
        let settings = load_settings(settings_path)?;
        let trace_text = fs::read_to_string(trace_path)
            .with_context(|| format!("Failed to read trace {}", trace_path.display()))?;
        let trace = Trace::parse(&trace_text)
            .with_context(|| format!("Failed to parse trace {}", trace_path.display()))?;
        Self::new(&settings, trace)
    }
}

impl<I: PeerIdentity> Scenario<I> {
    /// Select the policy from `settings` and pair it with `trace`
    pub fn new(settings: &Settings, trace: Trace<I>) -> anyhow::Result<Self> {
        let policy = PolicyConfig::from_settings(settings).context("Invalid router settings")?;
        for warning in policy.warnings() {
            warn!(router = %policy.family(), "{}", warning);
        }
        Ok(Self { policy, trace })
    }

    /// Replay the trace over a world holding `nodes` up front
    ///
    /// Nodes the trace mentions but `nodes` lacks join when first seen.
    pub fn run(&self, nodes: impl IntoIterator<Item = I>) -> anyhow::Result<World<I>> {
        let prototype = self.policy.prototype::<I>()?;
        let mut world = World::with_nodes(prototype, nodes);
        info!(
            router = %self.policy.family(),
            events = self.trace.len(),
            "Starting replay"
        );
        world.replay(&self.trace).context("Replay stopped")?;
        info!(end = %world.now(), delivered = world.stats().delivered, "Replay finished");
        Ok(world)
    }
}

/// Read settings from a `.toml` or `Namespace.key = value` file
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings {}", path.display()))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let settings = if is_toml {
        Settings::from_toml(&text)
    } else {
        Settings::parse(&text)
    };
    settings.with_context(|| format!("Failed to parse settings {}", path.display()))
}

/// Write the centrality report to `path`
pub fn write_report<I: PeerIdentity>(report: &CentralityReport<I>, path: &Path) -> anyhow::Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create report {}", path.display()))?;
    report
        .write_to(std::io::BufWriter::new(file))
        .with_context(|| format!("Failed to write report {}", path.display()))
}
