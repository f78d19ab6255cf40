//! Configuration management for txcourier
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use zeroize::Zeroizing;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub node: NodeConfig,
    pub submitter: SubmitterConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub rpc_urls: Vec<String>,
    pub chain_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitterConfig {
    /// Fixed gas limit; when absent the node is asked for an estimate
    pub fixed_gas_limit: Option<u64>,
    #[serde(default = "default_max_nonce_retries")]
    pub max_nonce_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Name of the environment variable holding the hex-encoded private key
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
}

fn default_max_nonce_retries() -> u32 {
    3
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_timeout_ms() -> u64 {
    3_600_000
}

fn default_private_key_env() -> String {
    "TXCOURIER_PRIVATE_KEY".to_string()
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("TXCOURIER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.node.rpc_urls.is_empty() {
            anyhow::bail!("At least one RPC URL must be configured");
        }
        if self.tracker.poll_interval_ms == 0 {
            anyhow::bail!("Poll interval must be non-zero");
        }
        if self.tracker.timeout_ms < self.tracker.poll_interval_ms {
            anyhow::bail!("Tracking timeout must be at least one poll interval");
        }
        Ok(())
    }
}

impl WalletConfig {
    /// Read the signing key from the configured environment variable.
    ///
    /// The key is wrapped in `Zeroizing` so the hex copy is wiped when the
    /// caller is done with it.
    pub fn private_key(&self) -> Result<Zeroizing<String>> {
        env::var(&self.private_key_env)
            .map(Zeroizing::new)
            .with_context(|| {
                format!(
                    "No wallet configured. Set {} to a hex-encoded private key",
                    self.private_key_env
                )
            })
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
