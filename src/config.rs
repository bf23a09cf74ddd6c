//! Test environment configuration
//!
//! A run is configured by a JSON file selected by `<product>` and `<config>`
//! on the command line. `<config>` may be a literal path; otherwise it is
//! looked up under `$FLEETSMITH_CONFIG_DIR/<product>/` (default
//! `~/.fleetsmith/<product>/`).
//!
//! ```json
//! {
//!   "account": {
//!     "auth_url": "https://identity.example.com/v2.0",
//!     "username": "qe-builder",
//!     "api_key": "...",
//!     "region": "ORD",
//!     "default_image_ref": "f4d8f2c2-...",
//!     "default_flavor_ref": "general1-1"
//!   },
//!   "run": { "server_build_timeout_secs": 600 }
//! }
//! ```

use crate::error::{FleetError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable overriding the config lookup directory
pub const CONFIG_DIR_ENV: &str = "FLEETSMITH_CONFIG_DIR";

/// Full test environment: account credentials plus run tuning
#[derive(Debug, Clone, Deserialize)]
pub struct TestEnv {
    /// Cloud account and endpoint settings
    pub account: AccountConfig,

    /// Run tuning knobs
    #[serde(default)]
    pub run: RunConfig,
}

/// Cloud account and endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// Identity service base URL (token endpoint lives under it)
    pub auth_url: String,

    /// Account username
    pub username: String,

    /// API key credential (preferred when present)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Password credential (used when no API key is configured)
    #[serde(default)]
    pub password: Option<String>,

    /// Tenant the account belongs to
    #[serde(default)]
    pub tenant_id: Option<String>,

    /// Region to select from the service catalog; first endpoint wins when unset
    #[serde(default)]
    pub region: Option<String>,

    /// Compute endpoint override; bypasses the service catalog entirely
    #[serde(default)]
    pub compute_endpoint: Option<String>,

    /// Image used when a build request does not name one
    #[serde(default)]
    pub default_image_ref: Option<String>,

    /// Flavor used when a build request does not name one
    #[serde(default)]
    pub default_flavor_ref: Option<String>,
}

/// Run tuning knobs
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Ceiling on any single server build wait
    #[serde(default = "default_build_timeout_secs")]
    pub server_build_timeout_secs: u64,

    /// Interval between build status polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// When true, a provider-reported fault marks the build as errored even
    /// if the build-completion wait succeeded. Off by default: a faulted but
    /// completed build still counts as passed, matching the tool this one
    /// replaces.
    #[serde(default)]
    pub fault_overrides_pass: bool,
}

fn default_build_timeout_secs() -> u64 {
    600
}

fn default_poll_interval_secs() -> u64 {
    10
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            server_build_timeout_secs: default_build_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            fault_overrides_pass: false,
        }
    }
}

impl RunConfig {
    /// Set the build wait ceiling
    pub fn with_build_timeout(mut self, timeout: Duration) -> Self {
        self.server_build_timeout_secs = timeout.as_secs();
        self
    }

    /// Set the build status poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_secs = interval.as_secs();
        self
    }

    /// Set the fault counting policy
    pub fn with_fault_override(mut self, fault_overrides_pass: bool) -> Self {
        self.fault_overrides_pass = fault_overrides_pass;
        self
    }

    /// Build wait ceiling as a [`Duration`]
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.server_build_timeout_secs)
    }

    /// Poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl TestEnv {
    /// Load the test environment for a product/config pair
    pub fn load(product: &str, config: &str) -> Result<Self> {
        let path = resolve_config_path(product, config)?;
        debug!("Loading test environment from {}", path.display());
        let raw = std::fs::read_to_string(&path)?;
        let env: TestEnv = serde_json::from_str(&raw)?;
        env.validate()?;
        Ok(env)
    }

    /// Parse a test environment from a JSON string
    pub fn from_json(raw: &str) -> Result<Self> {
        let env: TestEnv = serde_json::from_str(raw)?;
        env.validate()?;
        Ok(env)
    }

    fn validate(&self) -> Result<()> {
        if self.account.api_key.is_none() && self.account.password.is_none() {
            return Err(FleetError::config(
                "account needs either an api_key or a password",
            ));
        }
        Ok(())
    }
}

fn resolve_config_path(product: &str, config: &str) -> Result<PathBuf> {
    let literal = Path::new(config);
    if literal.is_file() {
        return Ok(literal.to_path_buf());
    }

    let base = match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => dirs::home_dir()
            .ok_or_else(|| FleetError::config("could not determine home directory"))?
            .join(".fleetsmith"),
    };
    let candidate = base.join(product).join(config);
    if candidate.is_file() {
        return Ok(candidate);
    }

    Err(FleetError::config(format!(
        "test config '{}' not found (looked at '{}' and '{}')",
        config,
        literal.display(),
        candidate.display()
    )))
}
