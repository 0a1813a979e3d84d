//! Mirror configuration.

use std::path::PathBuf;
use std::time::Duration;

use gitrollout_core::{Result, RolloutError};
use serde::{Deserialize, Serialize};

/// Configuration for the local bare mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorConfig {
    /// The remote repository URL (HTTPS, SSH or a local path).
    remote_url: String,

    /// Local path of the bare mirror.
    mirror_path: PathBuf,

    /// Initial mirror clone timeout.
    #[serde(default = "default_clone_timeout", with = "duration_secs")]
    clone_timeout: Duration,

    /// Fetch timeout.
    #[serde(default = "default_fetch_timeout", with = "duration_secs")]
    fetch_timeout: Duration,

    /// Checkout timeout, per ref.
    #[serde(default = "default_checkout_timeout", with = "duration_secs")]
    checkout_timeout: Duration,

    /// The git executable used for clone, fetch and checkout.
    #[serde(default = "default_git_binary")]
    git_binary: String,
}

fn default_clone_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_checkout_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_git_binary() -> String {
    "git".to_string()
}

impl MirrorConfig {
    /// Creates a new builder for MirrorConfig.
    pub fn builder() -> MirrorConfigBuilder {
        MirrorConfigBuilder::default()
    }

    /// Returns the remote URL.
    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    /// Returns the path of the bare mirror.
    pub fn mirror_path(&self) -> &PathBuf {
        &self.mirror_path
    }

    /// Returns the clone timeout.
    pub fn clone_timeout(&self) -> Duration {
        self.clone_timeout
    }

    /// Returns the fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Returns the per-ref checkout timeout.
    pub fn checkout_timeout(&self) -> Duration {
        self.checkout_timeout
    }

    /// Returns the git executable.
    pub fn git_binary(&self) -> &str {
        &self.git_binary
    }

    /// Returns true if `url` names the same remote as the configured one.
    ///
    /// Trailing slashes are ignored.
    pub fn same_remote(&self, url: &str) -> bool {
        self.remote_url.trim_end_matches('/') == url.trim_end_matches('/')
    }
}

/// Builder for MirrorConfig.
#[derive(Debug, Default)]
pub struct MirrorConfigBuilder {
    remote_url: Option<String>,
    mirror_path: Option<PathBuf>,
    clone_timeout: Option<Duration>,
    fetch_timeout: Option<Duration>,
    checkout_timeout: Option<Duration>,
    git_binary: Option<String>,
}

impl MirrorConfigBuilder {
    /// Sets the remote URL.
    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    /// Sets the local mirror path.
    pub fn mirror_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mirror_path = Some(path.into());
        self
    }

    /// Sets the clone timeout.
    pub fn clone_timeout(mut self, timeout: Duration) -> Self {
        self.clone_timeout = Some(timeout);
        self
    }

    /// Sets the fetch timeout.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Sets the per-ref checkout timeout.
    pub fn checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout = Some(timeout);
        self
    }

    /// Sets the git executable.
    pub fn git_binary(mut self, binary: impl Into<String>) -> Self {
        self.git_binary = Some(binary.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a required field is missing or a timeout is zero.
    pub fn build(self) -> Result<MirrorConfig> {
        let remote_url = self
            .remote_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| RolloutError::invalid_config("remote_url is required"))?;
        let mirror_path = self
            .mirror_path
            .ok_or_else(|| RolloutError::invalid_config("mirror_path is required"))?;

        let config = MirrorConfig {
            remote_url,
            mirror_path,
            clone_timeout: self.clone_timeout.unwrap_or_else(default_clone_timeout),
            fetch_timeout: self.fetch_timeout.unwrap_or_else(default_fetch_timeout),
            checkout_timeout: self.checkout_timeout.unwrap_or_else(default_checkout_timeout),
            git_binary: self.git_binary.unwrap_or_else(default_git_binary),
        };

        for (field, value) in [
            ("clone_timeout", config.clone_timeout),
            ("fetch_timeout", config.fetch_timeout),
            ("checkout_timeout", config.checkout_timeout),
        ] {
            if value.is_zero() {
                return Err(RolloutError::invalid_config(format!("{field} must be non-zero")));
            }
        }

        Ok(config)
    }
}


mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
