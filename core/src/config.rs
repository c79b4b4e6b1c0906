//! Configuration
//!
//! Settings are layered, later sources winning:
//!
//! 1. Built-in defaults
//! 2. A TOML file: the explicit path, else `COFRAME_CONFIG_PATH`, else
//!    `coframe.toml` in the working directory when present
//! 3. `COFRAME_*` environment variables, `__` separating nested keys
//!    (`COFRAME_LOGGING__FILTER=debug`, `COFRAME_RUNTIME__TRANSFER_BUDGET=1000`)
//! 4. Builder overrides
//!
//! A `.env` file is loaded into the environment first when present.

use std::cell::Cell;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

const ENV_PREFIX: &str = "COFRAME";
const CONFIG_PATH_VAR: &str = "COFRAME_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "coframe";

/* ===================== Settings ===================== */

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `warn` or `coframe_core::runtime=trace`
    #[serde(default = "default_filter")]
    pub filter: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_filter() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Upper bound on symmetric transfers within one top-level resume;
    /// unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_budget: Option<u64>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from the default sources
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(err) = EnvFilter::try_new(&self.logging.filter) {
            return Err(ConfigError::InvalidFilter {
                filter: self.logging.filter.clone(),
                reason: err.to_string(),
            });
        }
        if self.runtime.transfer_budget == Some(0) {
            return Err(ConfigError::ZeroTransferBudget);
        }
        Ok(())
    }

    /// Render as TOML, in the layout the file source reads
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }
}

/* ===================== Builder ===================== */

#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    log_filter: Option<String>,
    transfer_budget: Option<u64>,
    skip_dotenv: bool,
}

impl ConfigBuilder {
    /// Read this file instead of searching for one; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn log_filter(mut self, filter: Option<String>) -> Self {
        self.log_filter = filter;
        self
    }

    pub fn transfer_budget(mut self, budget: Option<u64>) -> Self {
        self.transfer_budget = budget;
        self
    }

    /// Do not load `.env`
    pub fn skip_dotenv(mut self, skip: bool) -> Self {
        self.skip_dotenv = skip;
        self
    }

    pub fn build(self) -> Result<Config> {
        if !self.skip_dotenv {
            // A missing .env is the common case
            let _ = dotenvy::dotenv();
        }

        let mut builder = config::Config::builder()
            .set_default("logging.filter", default_filter())?
            .set_default("logging.format", "compact")?;

        let path = self
            .config_path
            .or_else(|| std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from));
        builder = match path {
            Some(path) => builder.add_source(File::from(path).format(FileFormat::Toml).required(true)),
            None => builder.add_source(
                File::with_name(DEFAULT_CONFIG_FILE)
                    .format(FileFormat::Toml)
                    .required(false),
            ),
        };

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(filter) = self.log_filter {
            builder = builder.set_override("logging.filter", filter)?;
        }
        if let Some(budget) = self.transfer_budget {
            let budget = i64::try_from(budget).unwrap_or(i64::MAX);
            builder = builder.set_override("runtime.transfer_budget", budget)?;
        }

        let config: Config = builder
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/* ===================== Runtime settings ===================== */

/// Zero means unbounded
static TRANSFER_BUDGET: AtomicU64 = AtomicU64::new(0);

impl RuntimeConfig {
    /// Publish these settings to the frame runtime
    pub fn apply(&self) {
        TRANSFER_BUDGET.store(self.transfer_budget.unwrap_or(0), Ordering::Relaxed);
    }
}

thread_local! {
    static SCOPED_BUDGET: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Run `f` with a transfer budget that applies to this thread only
pub fn with_transfer_budget<R>(budget: u64, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<u64>);

    impl Drop for Restore {
        fn drop(&mut self) {
            SCOPED_BUDGET.with(|scoped| scoped.set(self.0));
        }
    }

    let _restore = Restore(SCOPED_BUDGET.with(|scoped| scoped.replace(Some(budget))));
    f()
}

pub(crate) fn transfer_budget() -> Option<u64> {
    if let Some(budget) = SCOPED_BUDGET.with(Cell::get) {
        return Some(budget);
    }
    match TRANSFER_BUDGET.load(Ordering::Relaxed) {
        0 => None,
        budget => Some(budget),
    }
}
