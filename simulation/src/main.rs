//! oppnet-sim - replay a contact trace through a routing policy

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use oppnet_core::NodeAddress;
use oppnet_dtn::PolicyFamily;
use oppnet_logging::{FileConfig, LogConfig, OppnetSubscriberBuilder};
use oppnet_simulation::{Scenario, write_report};

#[derive(Parser)]
#[command(
    name = "oppnet-sim",
    about = "Contact-trace replay for opportunistic routing policies",
    version
)]
struct Cli {
    /// Enable verbose logging (engine internals at debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write JSONL logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a trace and print delivery statistics
    Run {
        /// Contact trace (CONN / C / MOVE events)
        #[arg(short, long)]
        trace: PathBuf,

        /// Scenario settings (.toml or Namespace.key = value lines)
        #[arg(short, long)]
        settings: PathBuf,

        /// Create nodes n0..n(N-1) up front, so idle nodes appear in the report
        #[arg(short, long)]
        nodes: Option<u32>,

        /// Write the centrality report here (rank-based policies only)
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate settings and trace without replaying
    Check {
        #[arg(short, long)]
        trace: PathBuf,

        #[arg(short, long)]
        settings: PathBuf,
    },

    /// List the available routers
    Routers,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log = if cli.verbose {
        LogConfig::development()
    } else {
        LogConfig::default()
    };
    if let Some(dir) = &cli.log_dir {
        log = log.with_file(FileConfig::single_run(dir, "oppnet-sim"));
    }
    let _log_guard = OppnetSubscriberBuilder::new()
        .with_config(log)
        .init()
        .context("Failed to initialize logging")?;

    match cli.command {
        Commands::Run {
            trace,
            settings,
            nodes,
            report,
            json,
        } => {
            let scenario: Scenario<NodeAddress> = Scenario::load(&settings, &trace)?;
            let world = scenario.run(NodeAddress::range(nodes.unwrap_or(0)))?;

            if json {
                println!("{}", serde_json::to_string_pretty(world.stats())?);
            } else {
                println!("router:    {}", scenario.policy.family());
                println!("nodes:     {}", world.nodes().len());
                println!("{}", world.stats());
            }

            if let Some(path) = report {
                match world.centrality_report() {
                    Some(centralities) => {
                        write_report(&centralities, &path)?;
                        info!(path = %path.display(), rows = centralities.len(), "Wrote centrality report");
                    }
                    None => anyhow::bail!(
                        "{} does not export centralities, no report written",
                        scenario.policy.family()
                    ),
                }
            }
        }
        Commands::Check { trace, settings } => {
            let scenario: Scenario<NodeAddress> = Scenario::load(&settings, &trace)?;
            println!("router:    {}", scenario.policy.family());
            for warning in scenario.policy.warnings() {
                println!("warning:   {}", warning);
            }
            println!("events:    {}", scenario.trace.len());
            println!("nodes:     {}", scenario.trace.nodes().len());
            println!("ends at:   {}", scenario.trace.end_time());
        }
        Commands::Routers => {
            for family in PolicyFamily::ALL {
                let rank = if family.is_rank_based() { " (centralities)" } else { "" };
                println!("{:<22} {}{}", family.router_name(), family.alias(), rank);
            }
        }
    }

    Ok(())
}
