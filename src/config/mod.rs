//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::netcode::DEFAULT_COMMAND_CAPACITY;
use crate::util::rate_limit::INPUT_RATE_LIMIT;
use crate::util::time::DEFAULT_TICK_RATE;
use crate::vehicle::VehicleArchetype;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Broadcast a snapshot every N executed ticks
    pub snapshot_interval_ticks: u32,
    /// Commands held per session before the oldest are dropped
    pub max_buffered_commands: usize,
    /// Client frames per second before messages are refused
    pub input_rate_limit: u32,
    /// Vehicle used when a join request does not name one
    pub default_archetype: VehicleArchetype,

    /// Allowed client origins for CORS (comma-separated); any origin when unset
    pub client_origin: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Some(port) = lookup("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string())
        };

        let tick_rate: u32 = parse_or(&lookup, "TICK_RATE", DEFAULT_TICK_RATE)?;
        if tick_rate == 0 {
            return Err(ConfigError::Invalid {
                key: "TICK_RATE",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            tick_rate,
            snapshot_interval_ticks: parse_or(&lookup, "SNAPSHOT_INTERVAL_TICKS", 1u32)?.max(1),
            max_buffered_commands: parse_or(&lookup, "MAX_BUFFERED_COMMANDS", DEFAULT_COMMAND_CAPACITY)?.max(1),
            input_rate_limit: parse_or(&lookup, "INPUT_RATE_LIMIT", INPUT_RATE_LIMIT)?,
            default_archetype: parse_or(&lookup, "DEFAULT_ARCHETYPE", VehicleArchetype::default())?,

            client_origin: lookup("CLIENT_ORIGIN").filter(|origin| !origin.trim().is_empty()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            tick_rate: DEFAULT_TICK_RATE,
            snapshot_interval_ticks: 1,
            max_buffered_commands: DEFAULT_COMMAND_CAPACITY,
            input_rate_limit: INPUT_RATE_LIMIT,
            default_archetype: VehicleArchetype::default(),
            client_origin: None,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.tick_rate, DEFAULT_TICK_RATE);
        assert_eq!(config.snapshot_interval_ticks, 1);
        assert_eq!(config.default_archetype, VehicleArchetype::Taxi);
        assert!(config.client_origin.is_none());
    }

    #[test]
    fn test_port_wins_over_server_addr() {
        let config = load(&[("PORT", "9000"), ("SERVER_ADDR", "127.0.0.1:1234")]).unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn test_reads_simulation_settings() {
        let config = load(&[
            ("TICK_RATE", "120"),
            ("SNAPSHOT_INTERVAL_TICKS", "3"),
            ("DEFAULT_ARCHETYPE", "Bus"),
            ("CLIENT_ORIGIN", "http://localhost:3000"),
        ])
        .unwrap();
        assert_eq!(config.tick_rate, 120);
        assert_eq!(config.snapshot_interval_ticks, 3);
        assert_eq!(config.default_archetype, VehicleArchetype::Bus);
        assert_eq!(config.client_origin.as_deref(), Some("http://localhost:3000"));
    }

    #[test]
    fn test_malformed_values_are_errors() {
        assert!(matches!(
            load(&[("TICK_RATE", "fast")]),
            Err(ConfigError::Invalid { key: "TICK_RATE", .. })
        ));
        assert!(matches!(
            load(&[("TICK_RATE", "0")]),
            Err(ConfigError::Invalid { key: "TICK_RATE", .. })
        ));
        assert!(matches!(
            load(&[("DEFAULT_ARCHETYPE", "tank")]),
            Err(ConfigError::Invalid { key: "DEFAULT_ARCHETYPE", .. })
        ));
        assert!(matches!(load(&[("SERVER_ADDR", "nowhere")]), Err(ConfigError::InvalidAddress)));
    }
}
