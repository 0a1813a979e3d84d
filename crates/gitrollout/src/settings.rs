//! Engine settings.
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `GITROLLOUT_*` environment variables (`__` separates nested
//! keys, e.g. `GITROLLOUT_BACKOFF__MAX_FAILURES`), then command line flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use gitrollout_git::SchedulerConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::cli::{Cli, TargetArgs};

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A source could not be read or deserialized.
    #[error("failed to load settings: {0}")]
    Load(#[from] ConfigError),

    /// The combined settings are unusable.
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Failure backoff of the scheduler.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BackoffSettings {
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_cycle_timeout_secs")]
    pub cycle_timeout_secs: u64,
    #[serde(default = "default_clone_timeout_secs")]
    pub clone_timeout_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_checkout_timeout_secs")]
    pub checkout_timeout_secs: u64,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_git_binary")]
    pub git_binary: String,
    #[serde(default)]
    pub listen: Option<SocketAddr>,
    #[serde(default)]
    pub state_file: Option<PathBuf>,
    #[serde(default)]
    pub backoff: BackoffSettings,
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_cycle_timeout_secs() -> u64 {
    900
}

fn default_clone_timeout_secs() -> u64 {
    600
}

fn default_fetch_timeout_secs() -> u64 {
    300
}

fn default_checkout_timeout_secs() -> u64 {
    300
}

fn default_command_timeout_secs() -> u64 {
    600
}

fn default_max_concurrency() -> usize {
    4
}

fn default_git_binary() -> String {
    "git".to_string()
}

fn default_max_failures() -> u32 {
    3
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_secs() -> u64 {
    1800
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            cycle_timeout_secs: default_cycle_timeout_secs(),
            clone_timeout_secs: default_clone_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            checkout_timeout_secs: default_checkout_timeout_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            git_binary: default_git_binary(),
            listen: None,
            state_file: None,
            backoff: BackoffSettings::default(),
        }
    }
}

impl Settings {
    /// Loads settings from the optional file and the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_from(file, Environment::with_prefix("GITROLLOUT"))
    }

    /// Loads settings from the optional file and `environment`.
    pub fn load_from(file: Option<&Path>, environment: Environment) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(environment.prefix_separator("_").separator("__"));

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Applies command line flags, which take precedence over every other source.
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(interval) = cli.interval {
            self.poll_interval_secs = interval;
        }
        if let Some(timeout) = cli.cycle_timeout {
            self.cycle_timeout_secs = timeout;
        }
        if let Some(timeout) = cli.command_timeout {
            self.command_timeout_secs = timeout;
        }
        if let Some(concurrency) = cli.concurrency {
            self.max_concurrency = concurrency;
        }
        if cli.listen.is_some() {
            self.listen = cli.listen;
        }
        if cli.state_file.is_some() {
            self.state_file = cli.state_file.clone();
        }
        self
    }

    /// Checks limits. Zero intervals, timeouts or concurrency are rejected.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (name, value) in [
            ("poll_interval_secs", self.poll_interval_secs),
            ("cycle_timeout_secs", self.cycle_timeout_secs),
            ("clone_timeout_secs", self.clone_timeout_secs),
            ("fetch_timeout_secs", self.fetch_timeout_secs),
            ("checkout_timeout_secs", self.checkout_timeout_secs),
            ("command_timeout_secs", self.command_timeout_secs),
            ("backoff.max_backoff_secs", self.backoff.max_backoff_secs),
        ] {
            if value == 0 {
                return Err(SettingsError::Invalid(format!("{name} must be non-zero")));
            }
        }
        if self.max_concurrency == 0 {
            return Err(SettingsError::Invalid("max_concurrency must be non-zero".to_string()));
        }
        let multiplier = self.backoff.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(SettingsError::Invalid(
                "backoff.backoff_multiplier must be a finite number of at least 1.0".to_string(),
            ));
        }
        if self.git_binary.trim().is_empty() {
            return Err(SettingsError::Invalid("git_binary must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_failures: self.backoff.max_failures,
            backoff_multiplier: self.backoff.backoff_multiplier,
            max_backoff: Duration::from_secs(self.backoff.max_backoff_secs),
        }
    }
}

/// Checks that the mirror and the checkout roots do not overlap.
///
/// Branch and tag roots must be disjoint, and neither may contain or be
/// contained in the mirror.
pub fn validate_layout(
    mirror: &Path,
    branches: Option<&TargetArgs>,
    tags: Option<&TargetArgs>,
) -> Result<(), SettingsError> {
    let mirror = absolute(mirror)?;
    let roots: Vec<(&str, PathBuf)> = [("branches", branches), ("tags", tags)]
        .into_iter()
        .filter_map(|(label, target)| target.map(|t| (label, &t.root)))
        .map(|(label, root)| absolute(root).map(|root| (label, root)))
        .collect::<Result<_, _>>()?;

    for (label, root) in &roots {
        if nested(root, &mirror) {
            return Err(SettingsError::Invalid(format!(
                "{} root {} overlaps the mirror {}",
                label,
                root.display(),
                mirror.display()
            )));
        }
    }
    if let [(_, branches), (_, tags)] = roots.as_slice()
        && nested(branches, tags)
    {
        return Err(SettingsError::Invalid(format!(
            "branch root {} and tag root {} overlap",
            branches.display(),
            tags.display()
        )));
    }
    Ok(())
}

fn nested(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

fn absolute(path: &Path) -> Result<PathBuf, SettingsError> {
    std::path::absolute(path)
        .map_err(|e| SettingsError::Invalid(format!("cannot resolve {}: {}", path.display(), e)))
}
