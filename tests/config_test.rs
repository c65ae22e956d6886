//! Configuration loading integration tests

use candy_mint::config::{Config, ConfigError};
use solana_sdk::commitment_config::CommitmentConfig;
use std::io::Write;
use std::time::Duration;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
[rpc]
url = "https://api.devnet.solana.com"
timeout_secs = 10
commitment = "finalized"

[wallet]
keypair_path = "/tmp/devnet.json"

[sale]
candy_machine_id = "11111111111111111111111111111111"
tx_timeout_ms = 45000
poll_interval_ms = 1000
skip_preflight = true

[alerts]
auto_hide_ms = 3000

[monitoring]
enable_metrics = true
"#,
    );

    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.commitment().unwrap(), CommitmentConfig::finalized());
    assert_eq!(config.tx_timeout(), Duration::from_millis(45_000));
    assert_eq!(config.poll_interval(), Duration::from_millis(1_000));
    assert_eq!(config.alert_duration(), Duration::from_millis(3_000));
    assert_eq!(config.rpc_timeout(), Duration::from_secs(10));
    assert!(config.sale.skip_preflight);
    assert!(config.monitoring.enable_metrics);
    assert_eq!(config.ws_url(), "wss://api.devnet.solana.com");
    assert!(config.candy_machine_id().unwrap().is_some());
}

#[test]
fn test_partial_config_uses_defaults() {
    let file = write_config("[wallet]\nkeypair_path = \"id.json\"\n");
    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.wallet.keypair_path, "id.json");
    assert_eq!(config.sale.tx_timeout_ms, 30_000);
    assert_eq!(config.sale.poll_interval_ms, 2_000);
    assert_eq!(config.alerts.auto_hide_ms, 6_000);
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_candy_machine_id_is_rejected() {
    let file = write_config("[sale]\ncandy_machine_id = \"not-a-key\"\n");
    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::Invalid { field: "sale.candy_machine_id", .. })
    ));
}

#[test]
fn test_zero_timeout_is_rejected() {
    let file = write_config("[sale]\ntx_timeout_ms = 0\n");
    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_malformed_toml_is_a_parse_error() {
    let file = write_config("[sale\ntx_timeout_ms = ");
    assert!(matches!(
        Config::from_file(file.path().to_str().unwrap()),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_missing_file_is_an_io_error() {
    assert!(matches!(
        Config::from_file("/nonexistent/candy-mint.toml"),
        Err(ConfigError::Io(_))
    ));
}
