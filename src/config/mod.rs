//! Configuration module for the treelock service and client core.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Lock service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file holding the lease table
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
    /// How long an acquired lease stays valid
    pub lease_ttl: Duration,
    /// How often expired leases are swept from the table
    pub sweep_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("TREELOCK_API_PSK").ok();

        let db_path = env::var("TREELOCK_DB_PATH")
            .unwrap_or_else(|_| "./data/locks.sqlite".to_string())
            .into();

        let bind_addr = parse_or_default(
            "TREELOCK_BIND_ADDR",
            SocketAddr::from(([127, 0, 0, 1], 8080)),
        );

        let log_level = env::var("TREELOCK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_json = env::var("TREELOCK_LOG_FORMAT")
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let lease_ttl = parse_secs_or_default("TREELOCK_LEASE_TTL_SECS", 300);
        let sweep_interval = parse_secs_or_default("TREELOCK_SWEEP_INTERVAL_SECS", 60);

        Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            log_json,
            lease_ttl,
            sweep_interval,
        }
    }
}

/// Configuration for the client-side core (lock client and graph-store client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the lock service
    pub lock_url: String,
    /// Base URL of the graph-store service
    pub graph_url: String,
    /// Pre-shared key sent as `x-api-key`
    pub api_psk: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Load client configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let lock_url = env::var("TREELOCK_LOCK_URL")
            .unwrap_or_else(|_| format!("http://{}", DEFAULT_BIND_ADDR));
        let graph_url =
            env::var("TREELOCK_GRAPH_URL").unwrap_or_else(|_| "http://127.0.0.1:5000".to_string());
        let api_psk = env::var("TREELOCK_API_PSK").ok();
        let request_timeout = parse_secs_or_default("TREELOCK_REQUEST_TIMEOUT_SECS", 30);

        Self {
            lock_url,
            graph_url,
            api_psk,
            request_timeout,
        }
    }
}

/// Parse an environment variable, falling back to `default` when it is unset or malformed.
fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {} value {:?}, using default {:?}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

/// Parse a positive number of seconds that fits an `i64` epoch offset.
/// Zero and out-of-range values count as malformed.
fn parse_secs_or_default(key: &str, default: u64) -> Duration {
    let secs = match env::var(key) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(secs) if secs > 0 && i64::try_from(secs).is_ok() => secs,
            _ => {
                tracing::warn!("Invalid {} value {:?}, using default {}s", key, raw, default);
                default
            }
        },
        Err(_) => default,
    };
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "TREELOCK_API_PSK",
            "TREELOCK_DB_PATH",
            "TREELOCK_BIND_ADDR",
            "TREELOCK_LOG_LEVEL",
            "TREELOCK_LOG_FORMAT",
            "TREELOCK_LEASE_TTL_SECS",
            "TREELOCK_SWEEP_INTERVAL_SECS",
            "TREELOCK_LOCK_URL",
            "TREELOCK_GRAPH_URL",
            "TREELOCK_REQUEST_TIMEOUT_SECS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_default_config() {
        clear_env();

        let config = Config::from_env();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/locks.sqlite"));
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
        assert_eq!(config.lease_ttl, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    #[serial]
    fn test_malformed_values_fall_back_to_defaults() {
        clear_env();
        env::set_var("TREELOCK_BIND_ADDR", "not-an-address");
        env::set_var("TREELOCK_LEASE_TTL_SECS", "five minutes");
        env::set_var("TREELOCK_LOG_FORMAT", "JSON");

        let config = Config::from_env();

        assert!(config.log_json);

        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.lease_ttl, Duration::from_secs(300));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_and_oversized_durations_fall_back_to_defaults() {
        clear_env();
        env::set_var("TREELOCK_LEASE_TTL_SECS", "0");
        env::set_var("TREELOCK_SWEEP_INTERVAL_SECS", "0");
        env::set_var("TREELOCK_REQUEST_TIMEOUT_SECS", "18446744073709551615");

        let config = Config::from_env();
        let client = ClientConfig::from_env();

        assert_eq!(config.lease_ttl, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(client.request_timeout, Duration::from_secs(30));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_client_config_from_env() {
        clear_env();
        env::set_var("TREELOCK_LOCK_URL", "http://locks.internal:9000");
        env::set_var("TREELOCK_REQUEST_TIMEOUT_SECS", "5");

        let config = ClientConfig::from_env();

        assert_eq!(config.lock_url, "http://locks.internal:9000");
        assert_eq!(config.graph_url, "http://127.0.0.1:5000");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        clear_env();
    }
}
