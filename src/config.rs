//! Application configuration loaded from environment variables.
//!
//! Feed session settings:
//! - `MBP_WEBSOCKET_URL`: WebSocket endpoint of the market data server
//! - `MBP_USER`: user name sent in the login request (required)
//! - `MBP_APP_ID`: application id sent in the login request
//! - `MBP_POSITION`: position (client address) sent in the login request
//! - `MBP_RIC`: instrument to request on the MarketByPrice domain
//! - `MBP_CA_FILE`: PEM bundle of CA roots to pin for `wss://` endpoints
//!
//! Engine tuning lives in an optional JSON file named by
//! `MBP_ENGINE_CONFIG`; every field has a default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::replica::{ReplicaOptions, UnknownUpdatePolicy};

/// Default WebSocket endpoint.
const DEFAULT_WEBSOCKET_URL: &str = "ws://localhost:15000/WebSocket";

/// Default application id for the login request.
const DEFAULT_APP_ID: &str = "256";

/// Default login position.
const DEFAULT_POSITION: &str = "127.0.0.1";

/// Default instrument.
const DEFAULT_RIC: &str = "VOD.L";

/// Default log file used while the terminal UI owns the screen.
const DEFAULT_LOG_FILE: &str = "mbp-replica.log";

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub engine: EngineConfig,
    pub log_file: String,
}

/// Settings for the login and item request session.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub websocket_url: String,
    pub user: String,
    pub app_id: String,
    pub position: String,
    pub ric: String,
    /// Pinned CA roots; `None` trusts the public web PKI.
    pub ca_file: Option<PathBuf>,
}

/// Tuning for the replica engine and its consumer loop.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// What to do with an `Update` for a key the replica does not hold.
    pub unknown_update_policy: UnknownUpdatePolicy,
    /// Soft bound on queued items; `None` keeps the queue unbounded.
    pub queue_capacity: Option<usize>,
    /// Interval between checks while waiting for the complete book.
    pub poll_interval_ms: u64,
    /// Deadline for the initial refresh in headless mode.
    pub refresh_timeout_secs: u64,
    /// Consumer cadence.
    pub render_interval_ms: u64,
    /// How long updated rows stay highlighted.
    pub highlight_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unknown_update_policy: UnknownUpdatePolicy::default(),
            queue_capacity: None,
            poll_interval_ms: 100,
            refresh_timeout_secs: 30,
            render_interval_ms: 100,
            highlight_secs: 3,
        }
    }
}

impl EngineConfig {
    /// Loads engine tuning from a JSON file. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if an
    /// interval, the refresh timeout or the queue capacity is zero.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            crate::ReplicaError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&contents)?;

        if config.poll_interval_ms == 0 || config.render_interval_ms == 0 {
            return Err(crate::ReplicaError::Config(
                "poll_interval_ms and render_interval_ms must be greater than zero".to_string(),
            ));
        }
        if config.refresh_timeout_secs == 0 {
            return Err(crate::ReplicaError::Config(
                "refresh_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if config.queue_capacity == Some(0) {
            return Err(crate::ReplicaError::Config(
                "queue_capacity must be greater than zero when set".to_string(),
            ));
        }

        Ok(config)
    }

    /// Engine construction options derived from this configuration.
    pub fn replica_options(&self) -> ReplicaOptions {
        ReplicaOptions {
            unknown_update_policy: self.unknown_update_policy,
            queue_capacity: self.queue_capacity,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    pub fn highlight_duration(&self) -> Duration {
        Duration::from_secs(self.highlight_secs)
    }
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`ReplicaError::Config`](crate::ReplicaError::Config) if
/// `MBP_USER` is missing or the engine config file is unreadable.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let user = non_empty_var("MBP_USER").ok_or_else(|| {
        crate::ReplicaError::Config("MBP_USER must be set for the login request".to_string())
    })?;

    let feed = FeedConfig {
        websocket_url: non_empty_var("MBP_WEBSOCKET_URL")
            .unwrap_or_else(|| DEFAULT_WEBSOCKET_URL.to_string()),
        user,
        app_id: non_empty_var("MBP_APP_ID").unwrap_or_else(|| DEFAULT_APP_ID.to_string()),
        position: non_empty_var("MBP_POSITION").unwrap_or_else(|| DEFAULT_POSITION.to_string()),
        ric: non_empty_var("MBP_RIC").unwrap_or_else(|| DEFAULT_RIC.to_string()),
        ca_file: non_empty_var("MBP_CA_FILE").map(PathBuf::from),
    };

    let engine = match non_empty_var("MBP_ENGINE_CONFIG") {
        Some(path) => EngineConfig::load(Path::new(&path))?,
        None => EngineConfig::default(),
    };

    Ok(AppConfig {
        feed,
        engine,
        log_file: non_empty_var("MBP_LOG_FILE").unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
    })
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Mutex, PoisonError};

    /// Serializes tests that touch the process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Helper that temporarily sets env vars, runs `f`, then restores originals.
    ///
    /// # Safety
    ///
    /// Holds [`ENV_LOCK`] for the duration; no other code in this crate's
    /// tests reads these env vars concurrently.
    fn with_env<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
        let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let originals: Vec<(&str, Option<String>)> = vars
            .iter()
            .map(|(k, _)| (*k, std::env::var(k).ok()))
            .collect();

        for (k, v) in vars {
            // SAFETY: ENV_LOCK is held, so no other test mutates the environment.
            unsafe {
                match v {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }

        f();

        for (k, original) in originals {
            // SAFETY: restoring original values, same single-threaded context.
            unsafe {
                match original {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    const ALL_VARS: [&str; 8] = [
        "MBP_WEBSOCKET_URL",
        "MBP_USER",
        "MBP_APP_ID",
        "MBP_POSITION",
        "MBP_RIC",
        "MBP_CA_FILE",
        "MBP_ENGINE_CONFIG",
        "MBP_LOG_FILE",
    ];

    fn cleared_except<'a>(set: &[(&'a str, Option<&'a str>)]) -> Vec<(&'a str, Option<&'a str>)> {
        let mut vars: Vec<(&str, Option<&str>)> = ALL_VARS
            .iter()
            .filter(|name| !set.iter().any(|(k, _)| k == *name))
            .map(|name| (*name, None))
            .collect();
        vars.extend_from_slice(set);
        vars
    }

    #[test]
    fn defaults_with_only_user_set() {
        with_env(&cleared_except(&[("MBP_USER", Some("umer"))]), || {
            let config = fetch_config().unwrap();
            assert_eq!(config.feed.websocket_url, DEFAULT_WEBSOCKET_URL);
            assert_eq!(config.feed.user, "umer");
            assert_eq!(config.feed.app_id, DEFAULT_APP_ID);
            assert_eq!(config.feed.position, DEFAULT_POSITION);
            assert_eq!(config.feed.ric, DEFAULT_RIC);
            assert!(config.feed.ca_file.is_none());
            assert_eq!(config.engine, EngineConfig::default());
            assert_eq!(config.log_file, DEFAULT_LOG_FILE);
        });
    }

    #[test]
    fn rejects_missing_user() {
        with_env(&cleared_except(&[]), || {
            let err = fetch_config().unwrap_err();
            assert!(err.to_string().contains("MBP_USER must be set"));
        });
    }

    #[test]
    fn empty_values_treated_as_absent() {
        with_env(
            &cleared_except(&[
                ("MBP_USER", Some("umer")),
                ("MBP_RIC", Some("")),
                ("MBP_WEBSOCKET_URL", Some("")),
            ]),
            || {
                let config = fetch_config().unwrap();
                assert_eq!(config.feed.ric, DEFAULT_RIC);
                assert_eq!(config.feed.websocket_url, DEFAULT_WEBSOCKET_URL);
            },
        );
    }

    #[test]
    fn overrides_feed_settings() {
        with_env(
            &cleared_except(&[
                ("MBP_USER", Some("umer")),
                ("MBP_WEBSOCKET_URL", Some("ws://ads.example.com:15000/WebSocket")),
                ("MBP_APP_ID", Some("180")),
                ("MBP_POSITION", Some("10.0.0.7")),
                ("MBP_RIC", Some("BARC.L")),
                ("MBP_CA_FILE", Some("/etc/mbp/ca.pem")),
            ]),
            || {
                let config = fetch_config().unwrap();
                assert_eq!(
                    config.feed.websocket_url,
                    "ws://ads.example.com:15000/WebSocket"
                );
                assert_eq!(config.feed.app_id, "180");
                assert_eq!(config.feed.position, "10.0.0.7");
                assert_eq!(config.feed.ric, "BARC.L");
                assert_eq!(
                    config.feed.ca_file.as_deref(),
                    Some(Path::new("/etc/mbp/ca.pem"))
                );
            },
        );
    }

    #[test]
    fn loads_engine_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"queue_capacity": 64, "highlight_secs": 5}"#).unwrap();
        let path = path.to_string_lossy().into_owned();

        with_env(
            &cleared_except(&[
                ("MBP_USER", Some("umer")),
                ("MBP_ENGINE_CONFIG", Some(path.as_str())),
            ]),
            || {
                let config = fetch_config().unwrap();
                assert_eq!(config.engine.queue_capacity, Some(64));
                assert_eq!(config.engine.highlight_secs, 5);
                assert_eq!(config.engine.render_interval_ms, 100);
            },
        );
    }

    #[test]
    fn engine_defaults_convert_to_durations() {
        let config = EngineConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.highlight_duration(), Duration::from_secs(3));
        assert_eq!(
            config.replica_options().unknown_update_policy,
            UnknownUpdatePolicy::ImplicitAdd
        );
        assert!(config.replica_options().queue_capacity.is_none());
    }
}
