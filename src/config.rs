//! Configuration module for the candy machine mint controller
//!
//! This module handles configuration loading from TOML files and
//! environment variables, and provides structured configuration types.

use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::candy_machine::{CANDY_MACHINE_PROGRAM_ID, GATEWAY_PROGRAM_ID};

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// RPC endpoints configuration
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Wallet configuration
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Sale and mint configuration
    #[serde(default)]
    pub sale: SaleConfig,

    /// Identity gate configuration
    #[serde(default)]
    pub gatekeeper: GatekeeperConfig,

    /// User notification configuration
    #[serde(default)]
    pub alerts: AlertConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// HTTP JSON-RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// Websocket endpoint for signature subscriptions (derived from `url` when absent)
    #[serde(default)]
    pub ws_url: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,

    /// Commitment level a mint must reach: processed, confirmed or finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to keypair file
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleConfig {
    /// Candy machine account to mint from
    #[serde(default)]
    pub candy_machine_id: Option<String>,

    /// Candy machine v2 program
    #[serde(default = "default_candy_machine_program")]
    pub candy_machine_program: String,

    /// Confirmation deadline in milliseconds
    #[serde(default = "default_tx_timeout_ms")]
    pub tx_timeout_ms: u64,

    /// Signature status polling interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Skip the RPC preflight simulation on submit
    #[serde(default)]
    pub skip_preflight: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatekeeperConfig {
    /// Gateway program issuing identity passes
    #[serde(default = "default_gateway_program")]
    pub program_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Alerts hide themselves after this many milliseconds
    #[serde(default = "default_auto_hide_ms")]
    pub auto_hide_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

// Default value functions
fn default_rpc_url() -> String { "https://api.mainnet-beta.solana.com".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_commitment() -> String { "confirmed".to_string() }
fn default_keypair_path() -> String { "~/.config/solana/id.json".to_string() }
fn default_candy_machine_program() -> String { CANDY_MACHINE_PROGRAM_ID.to_string() }
fn default_tx_timeout_ms() -> u64 { 30_000 }
fn default_poll_interval_ms() -> u64 { 2_000 }
fn default_gateway_program() -> String { GATEWAY_PROGRAM_ID.to_string() }
fn default_auto_hide_ms() -> u64 { 6_000 }
fn default_true() -> bool { true }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            ws_url: None,
            timeout_secs: default_rpc_timeout(),
            commitment: default_commitment(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
        }
    }
}

impl Default for SaleConfig {
    fn default() -> Self {
        Self {
            candy_machine_id: None,
            candy_machine_program: default_candy_machine_program(),
            tx_timeout_ms: default_tx_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            skip_preflight: false,
        }
    }
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            program_id: default_gateway_program(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            auto_hide_ms: default_auto_hide_ms(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            wallet: WalletConfig::default(),
            sale: SaleConfig::default(),
            gatekeeper: GatekeeperConfig::default(),
            alerts: AlertConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration with `.env` and environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `CANDY_MINT_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CANDY_MINT_RPC_URL") {
            self.rpc.url = url;
        }
        if let Ok(ws) = std::env::var("CANDY_MINT_WS_URL") {
            self.rpc.ws_url = Some(ws);
        }
        if let Ok(id) = std::env::var("CANDY_MINT_CANDY_MACHINE_ID") {
            self.sale.candy_machine_id = Some(id);
        }
        if let Ok(path) = std::env::var("CANDY_MINT_KEYPAIR") {
            self.wallet.keypair_path = path;
        }
    }

    /// Check value ranges and that every key and level parses
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sale.tx_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "sale.tx_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.sale.poll_interval_ms == 0 || self.sale.poll_interval_ms >= self.sale.tx_timeout_ms {
            return Err(ConfigError::Invalid {
                field: "sale.poll_interval_ms",
                reason: format!(
                    "{} must be non-zero and below tx_timeout_ms {}",
                    self.sale.poll_interval_ms, self.sale.tx_timeout_ms
                ),
            });
        }
        if self.rpc.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "rpc.timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.commitment()?;
        self.candy_machine_id()?;
        self.candy_machine_program()?;
        self.gateway_program()?;
        Ok(())
    }

    pub fn commitment(&self) -> Result<CommitmentConfig, ConfigError> {
        match self.rpc.commitment.as_str() {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => Err(ConfigError::Invalid {
                field: "rpc.commitment",
                reason: format!("unknown commitment level '{}'", other),
            }),
        }
    }

    pub fn candy_machine_id(&self) -> Result<Option<Pubkey>, ConfigError> {
        self.sale
            .candy_machine_id
            .as_deref()
            .map(|s| parse_pubkey("sale.candy_machine_id", s))
            .transpose()
    }

    pub fn candy_machine_program(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("sale.candy_machine_program", &self.sale.candy_machine_program)
    }

    pub fn gateway_program(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("gatekeeper.program_id", &self.gatekeeper.program_id)
    }

    /// Websocket endpoint, derived from the HTTP one when not configured
    pub fn ws_url(&self) -> String {
        match &self.rpc.ws_url {
            Some(ws) => ws.clone(),
            None => {
                if let Some(rest) = self.rpc.url.strip_prefix("https://") {
                    format!("wss://{}", rest)
                } else if let Some(rest) = self.rpc.url.strip_prefix("http://") {
                    format!("ws://{}", rest)
                } else {
                    self.rpc.url.clone()
                }
            }
        }
    }

    pub fn tx_timeout(&self) -> Duration {
        Duration::from_millis(self.sale.tx_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.sale.poll_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    pub fn alert_duration(&self) -> Duration {
        Duration::from_millis(self.alerts.auto_hide_ms)
    }
}

fn parse_pubkey(field: &'static str, value: &str) -> Result<Pubkey, ConfigError> {
    Pubkey::from_str(value).map_err(|e| ConfigError::Invalid {
        field,
        reason: format!("'{}' is not a valid pubkey: {}", value, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.sale.tx_timeout_ms, 30_000);
        assert_eq!(config.alerts.auto_hide_ms, 6_000);
        assert!(config.validate().is_ok());
        assert_eq!(config.candy_machine_id().unwrap(), None);
    }

    #[test]
    fn test_ws_url_derivation() {
        let mut config = Config::default();
        config.rpc.url = "https://api.devnet.solana.com".to_string();
        assert_eq!(config.ws_url(), "wss://api.devnet.solana.com");

        config.rpc.url = "http://127.0.0.1:8899".to_string();
        assert_eq!(config.ws_url(), "ws://127.0.0.1:8899");

        config.rpc.ws_url = Some("ws://127.0.0.1:8900".to_string());
        assert_eq!(config.ws_url(), "ws://127.0.0.1:8900");
    }

    #[test]
    fn test_rejects_unknown_commitment() {
        let mut config = Config::default();
        config.rpc.commitment = "max".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "rpc.commitment", .. })
        ));
    }

    #[test]
    fn test_rejects_poll_interval_above_timeout() {
        let mut config = Config::default();
        config.sale.poll_interval_ms = 40_000;
        assert!(config.validate().is_err());
    }
}
