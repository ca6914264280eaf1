//! Structured logging for oppnet replays
//!
//! This crate wires up `tracing-subscriber` for the simulation harness and
//! anything else that drives decision engines.
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines for later analysis (default)
//! - **Pretty Output**: Human-readable console output for development
//! - **Node Context Injection**: Tag spans with the node whose hook is running
//! - **File Output**: Single-file or rotating output via tracing-appender
//!
//! # Quick Start
//!
//! ```ignore
//! use oppnet_logging::{LogConfig, OppnetSubscriberBuilder};
//!
//! // JSONL to console
//! let _guard = OppnetSubscriberBuilder::new().init()?;
//!
//! // Pretty console output with engine internals at debug
//! let _guard = OppnetSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//! ```
//!
//! # Node Context
//!
//! Use [`NodeContextGuard`] to set the node identity for a scope:
//!
//! ```ignore
//! use oppnet_core::NodeAddress;
//! use oppnet_logging::NodeContextGuard;
//!
//! let _guard = NodeContextGuard::new(&NodeAddress(0));
//! let _span = tracing::debug_span!("connection_up").entered();
//! ```

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use context::{NodeContextData, NodeContextGuard};
pub use layers::{BoxedLayer, NodeContextExtension, NodeContextLayer};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    filter::{Directive, ParseError},
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid filter directive {directive:?}: {source}")]
    Directive {
        directive: String,
        #[source]
        source: ParseError,
    },

    #[error("Cannot open log file in {directory}: {source}")]
    File {
        directory: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot create rolling log appender: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("A global subscriber is already installed")]
    AlreadyInitialized,
}

/// Result type for subscriber setup
pub type LogResult<T> = Result<T, LogError>;

/// The subscriber the output layers are stacked on
type Base = Layered<NodeContextLayer, Layered<EnvFilter, Registry>>;

/// Builder for configuring and initializing the oppnet logging subscriber
///
/// By default, console output uses JSONL format. Use `LogConfig::development()`
/// for human-readable pretty output.
pub struct OppnetSubscriberBuilder {
    config: LogConfig,
}

impl OppnetSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// The configuration this builder will install
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Build the env filter: `RUST_LOG` if set, else the default level plus
    /// the configured directives
    pub fn env_filter(&self) -> LogResult<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        let mut filter = EnvFilter::new(&self.config.default_level);
        for directive in &self.config.directives {
            let parsed = directive.parse::<Directive>().map_err(|source| LogError::Directive {
                directive: directive.clone(),
                source,
            })?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }

    /// Install the subscriber globally
    ///
    /// The returned guard flushes the file writer on drop and must be kept
    /// alive for as long as file output is wanted.
    pub fn init(self) -> LogResult<Option<WorkerGuard>> {
        let env_filter = self.env_filter()?;

        let mut outputs: Vec<BoxedLayer<Base>> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            let console = if self.config.console.pretty {
                layers::pretty_layer(self.config.console.ansi)
            } else {
                layers::jsonl_layer(&self.config.jsonl, std::io::stdout)
            };
            let console = match &self.config.console.level {
                Some(level) => console.with_filter(EnvFilter::new(level)).boxed(),
                None => console,
            };
            outputs.push(console);
        }

        if let Some(file) = &self.config.file {
            let (writer, worker) = file_writer(file)?;
            outputs.push(layers::jsonl_layer(&self.config.jsonl, writer));
            guard = Some(worker);
        }

        Registry::default()
            .with(env_filter)
            .with(NodeContextLayer::new())
            .with(outputs)
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized)?;

        Ok(guard)
    }
}

impl Default for OppnetSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Open the non-blocking file writer for `config`
///
/// [`RotationStrategy::Never`] truncates a single `<prefix>.jsonl`; the
/// rotating strategies append to dated files and prune old ones.
pub fn file_writer(config: &FileConfig) -> LogResult<(NonBlocking, WorkerGuard)> {
    let file_error = |source| LogError::File {
        directory: config.directory.display().to_string(),
        source,
    };
    fs::create_dir_all(&config.directory).map_err(file_error)?;

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let file = File::create(config.single_file_path()).map_err(file_error)?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .filename_suffix("jsonl");
    if let Some(max) = config.max_files {
        builder = builder.max_log_files(max);
    }
    let appender = builder.build(&config.directory)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() -> LogResult<()> {
    OppnetSubscriberBuilder::new().init().map(|_| ())
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() -> LogResult<()> {
    OppnetSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
        .map(|_| ())
}

/// Initialize logging for testing (minimal output)
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_testing() {
    let _ = OppnetSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}
