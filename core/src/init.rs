//! Initialization
//!
//! Loads configuration, installs the tracing subscriber, and publishes the
//! runtime settings. Frames work without it (defaults apply); call it once at
//! startup to get logging and configured limits.
//!
//! # Example
//!
//! ```rust,ignore
//! use coframe_core::init::InitBuilder;
//!
//! InitBuilder::new()
//!     .log_filter("coframe_core=trace")
//!     .init()?;
//! ```

use anyhow::{anyhow, Context, Result};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LogFormat, LoggingConfig};

/// Global initialization state
static INIT_STATE: OnceLock<InitState> = OnceLock::new();

#[derive(Debug)]
struct InitState {
    config: Config,
}

/// Options for initializing the runtime
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Config file path (overrides default search)
    pub config_path: Option<String>,

    /// Log filter directives (override config file and env vars)
    pub log_filter: Option<String>,

    /// Symmetric transfer budget (overrides config file and env vars)
    pub transfer_budget: Option<u64>,

    /// Whether to install a global tracing subscriber
    pub install_tracing: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            log_filter: None,
            transfer_budget: None,
            install_tracing: true,
        }
    }
}

/// Builder for constructing InitOptions
pub struct InitBuilder {
    options: InitOptions,
}

impl InitBuilder {
    pub fn new() -> Self {
        Self {
            options: InitOptions::default(),
        }
    }

    pub fn config_path(mut self, path: impl Into<String>) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.options.log_filter = Some(filter.into());
        self
    }

    pub fn transfer_budget(mut self, budget: u64) -> Self {
        self.options.transfer_budget = Some(budget);
        self
    }

    pub fn install_tracing(mut self, install: bool) -> Self {
        self.options.install_tracing = install;
        self
    }

    pub fn init(self) -> Result<()> {
        initialize(self.options)
    }
}

impl Default for InitBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize with the given options
///
/// Calling this more than once is safe; later calls are no-ops.
pub fn initialize(options: InitOptions) -> Result<()> {
    if INIT_STATE.get().is_some() {
        return Ok(());
    }

    let config = Config::builder()
        .config_path(options.config_path.map(std::path::PathBuf::from))
        .log_filter(options.log_filter)
        .transfer_budget(options.transfer_budget)
        .build()
        .context("Failed to load configuration")?;

    if options.install_tracing {
        install_tracing(&config.logging)?;
    }
    config.runtime.apply();
    tracing::debug!(
        filter = %config.logging.filter,
        transfer_budget = ?config.runtime.transfer_budget,
        "runtime initialized"
    );

    INIT_STATE
        .set(InitState { config })
        .map_err(|_| anyhow!("Initialization already completed"))?;

    Ok(())
}

fn install_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&logging.filter)
        .with_context(|| format!("Invalid log filter '{}'", logging.filter))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    // The host application may own the global subscriber already
    if let Err(err) = installed {
        tracing::debug!(error = %err, "tracing subscriber already installed");
    }
    Ok(())
}

pub fn is_initialized() -> bool {
    INIT_STATE.get().is_some()
}

/// The loaded configuration, once initialized
pub fn get_config() -> Option<&'static Config> {
    INIT_STATE.get().map(|state| &state.config)
}
