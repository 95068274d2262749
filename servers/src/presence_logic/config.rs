use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use lib_presence::core::locations::Location;
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_FILE: &str = "server_presence.conf";

/// Raw configuration as it arrives from the three sources: built-in
/// defaults, the JSON config file, and CLI arguments / environment
/// variables. Later sources override earlier ones, field by field.
#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Venue presence aggregation service", version)]
#[serde(rename_all = "camelCase", default)]
struct RawConfig {
    #[clap(long, env = "PRESENCE_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    config_path: Option<PathBuf>,

    #[clap(long, env = "PRESENCE_HOST", help = "Address the web service binds to.")]
    host: Option<String>,

    #[clap(long, env = "PRESENCE_PORT", help = "Port the web service listens on.")]
    port: Option<u16>,

    #[clap(long, env = "PRESENCE_LOG_DIR", help = "Directory for log files; stdout only when unset.")]
    log_dir: Option<PathBuf>,

    #[clap(long, env = "PRESENCE_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    log_level: Option<String>,

    #[clap(long, env = "PRESENCE_BROKER_URL", help = "Broker WebSocket URL.")]
    broker_url: Option<String>,

    #[clap(long, env = "PRESENCE_BROKER_USERNAME")]
    broker_username: Option<String>,

    #[clap(long, env = "PRESENCE_BROKER_PASSWORD")]
    broker_password: Option<String>,

    #[clap(long, env = "PRESENCE_SESSION_TOPIC", help = "Topic carrying the wifi session snapshots.")]
    session_topic: Option<String>,

    #[clap(long, env = "PRESENCE_DEVICES_TOPIC", help = "Topic the presence summary is published to.")]
    devices_topic: Option<String>,

    #[clap(long, env = "PRESENCE_RECONNECT_DELAY_SECONDS", help = "Delay between broker reconnect attempts.")]
    reconnect_delay_seconds: Option<u64>,

    #[clap(long, env = "PRESENCE_WATCHDOG_TIMEOUT_SECONDS", help = "Seconds without an inbound snapshot before the process exits for its supervisor.")]
    watchdog_timeout_seconds: Option<u64>,

    #[clap(long, env = "PRESENCE_MASTER_FILE", help = "Path to the curated master registry JSON file.")]
    master_file: Option<PathBuf>,

    #[clap(long, env = "PRESENCE_USER_FILE", help = "Path to the self-service user registry JSON file.")]
    user_file: Option<PathBuf>,

    #[clap(long, env = "PRESENCE_TLS_CERT_PATH", help = "Path to the TLS certificate file.")]
    tls_cert_path: Option<PathBuf>,

    #[clap(long, env = "PRESENCE_TLS_KEY_PATH", help = "Path to the TLS private key file.")]
    tls_key_path: Option<PathBuf>,

    // The zone table is structured, so it only comes from the config file.
    #[clap(skip)]
    locations: Vec<Location>,
}

impl RawConfig {
    // Merge two RawConfig structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: RawConfig) -> RawConfig {
        RawConfig {
            config_path: other.config_path.or(self.config_path),
            host: other.host.or(self.host),
            port: other.port.or(self.port),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            broker_url: other.broker_url.or(self.broker_url),
            broker_username: other.broker_username.or(self.broker_username),
            broker_password: other.broker_password.or(self.broker_password),
            session_topic: other.session_topic.or(self.session_topic),
            devices_topic: other.devices_topic.or(self.devices_topic),
            reconnect_delay_seconds: other.reconnect_delay_seconds.or(self.reconnect_delay_seconds),
            watchdog_timeout_seconds: other
                .watchdog_timeout_seconds
                .or(self.watchdog_timeout_seconds),
            master_file: other.master_file.or(self.master_file),
            user_file: other.user_file.or(self.user_file),
            tls_cert_path: other.tls_cert_path.or(self.tls_cert_path),
            tls_key_path: other.tls_key_path.or(self.tls_key_path),
            locations: if other.locations.is_empty() { self.locations } else { other.locations },
        }
    }

    fn resolve(self) -> Config {
        Config {
            host: self.host.unwrap_or_else(|| "0.0.0.0".to_string()),
            port: self.port.unwrap_or(8010),
            log_dir: self.log_dir,
            log_level: self.log_level.unwrap_or_else(|| "info".to_string()),
            broker_url: self.broker_url.unwrap_or_else(|| "wss://localhost:9001".to_string()),
            broker_username: self.broker_username,
            broker_password: self.broker_password,
            session_topic: self.session_topic.unwrap_or_else(|| "/net/wlan-sessions".to_string()),
            devices_topic: self.devices_topic.unwrap_or_else(|| "/net/devices".to_string()),
            reconnect_delay: Duration::from_secs(self.reconnect_delay_seconds.unwrap_or(5)),
            watchdog_timeout: Duration::from_secs(self.watchdog_timeout_seconds.unwrap_or(300)),
            master_file: self.master_file.unwrap_or_else(|| PathBuf::from("masterDb.json")),
            user_file: self.user_file.unwrap_or_else(|| PathBuf::from("userDb.json")),
            tls_cert_path: self.tls_cert_path,
            tls_key_path: self.tls_key_path,
            locations: self.locations,
        }
    }
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
    pub broker_url: String,
    pub broker_username: Option<String>,
    pub broker_password: Option<String>,
    pub session_topic: String,
    pub devices_topic: String,
    pub reconnect_delay: Duration,
    pub watchdog_timeout: Duration,
    pub master_file: PathBuf,
    pub user_file: PathBuf,
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
    pub locations: Vec<Location>,
}

/// Loads the configuration: config file (when present) overridden by
/// environment variables and CLI arguments. A config file that exists but
/// does not parse is a bootstrap error, not a fallback.
pub fn load_config() -> anyhow::Result<Config> {
    let cli_args = RawConfig::parse();
    let config_file_path =
        cli_args.config_path.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current = RawConfig::default();
    if config_file_path.exists() {
        let config_str = fs::read_to_string(&config_file_path)
            .with_context(|| format!("unable to read config file {}", config_file_path.display()))?;
        let file_config: RawConfig = serde_json::from_str(&config_str)
            .with_context(|| format!("unable to parse config file {}", config_file_path.display()))?;
        current = current.merge(file_config);
    }

    Ok(current.merge(cli_args).resolve())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_file_overrides_defaults() {
        let file = RawConfig {
            port: Some(9000),
            session_topic: Some("/file/topic".into()),
            locations: vec![Location { name: "Bar".into(), ids: vec![1] }],
            ..Default::default()
        };
        let cli = RawConfig { port: Some(9001), ..Default::default() };

        let config = RawConfig::default().merge(file).merge(cli).resolve();
        assert_eq!(config.port, 9001);
        assert_eq!(config.session_topic, "/file/topic");
        assert_eq!(config.locations.len(), 1);
        // untouched fields fall back to the defaults
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.watchdog_timeout, Duration::from_secs(300));
    }

    #[test]
    fn config_file_round_trips_camel_case() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
  "port": 8443,
  "brokerUrl": "wss://broker.example:9001",
  "sessionTopic": "/net/wlan-sessions",
  "watchdogTimeoutSeconds": 120,
  "locations": [{"name": "Bar", "ids": [1, 3]}, {"name": "Workshop", "ids": [4]}]
}"#,
        )
        .unwrap();
        let config = raw.resolve();
        assert_eq!(config.port, 8443);
        assert_eq!(config.broker_url, "wss://broker.example:9001");
        assert_eq!(config.watchdog_timeout, Duration::from_secs(120));
        assert_eq!(config.locations[1].name, "Workshop");
    }
}
