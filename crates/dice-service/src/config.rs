//! Dice service configuration.
//!
//! Configuration is loaded from environment variables. Every value has a
//! default, so an empty environment yields a working server.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::actors::{RoomSettings, SessionSettings};

/// Default HTTP/WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default frontend directory for release builds.
pub const DEFAULT_FRONTEND_DIR: &str = "frontend-build";

/// Default frontend directory when `DICE_DEBUG` is set.
pub const DEFAULT_DEBUG_FRONTEND_DIR: &str = "frontend/public";

/// Default time an empty room waits before tearing itself down.
pub const DEFAULT_ROOM_IDLE_SECONDS: u64 = 60;

/// Default number of roll results replayed to latecomers.
pub const DEFAULT_CACHED_RESULTS: usize = 10;

/// Default WebSocket ping period in seconds.
pub const DEFAULT_PING_PERIOD_SECONDS: u64 = 54;

/// Default read deadline in seconds. Must exceed the ping period.
pub const DEFAULT_PONG_WAIT_SECONDS: u64 = 60;

/// Default write deadline in seconds.
pub const DEFAULT_WRITE_WAIT_SECONDS: u64 = 10;

/// Dice service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP/WebSocket bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Directory the frontend is served from.
    pub frontend_dir: PathBuf,

    /// Debug mode: verbose logging and the development frontend directory.
    pub debug: bool,

    /// Seconds an empty room lingers before it is removed.
    pub room_idle_seconds: u64,

    /// Roll results kept per room for replay to new participants.
    pub cached_results: usize,

    /// WebSocket ping period in seconds.
    pub ping_period_seconds: u64,

    /// Read deadline in seconds, refreshed by every inbound frame.
    pub pong_wait_seconds: u64,

    /// Write deadline in seconds.
    pub write_wait_seconds: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("DICE_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let debug = parse_bool(vars, "DICE_DEBUG")?;

        let frontend_dir = vars.get("DICE_FRONTEND_DIR").map_or_else(
            || {
                if debug {
                    PathBuf::from(DEFAULT_DEBUG_FRONTEND_DIR)
                } else {
                    PathBuf::from(DEFAULT_FRONTEND_DIR)
                }
            },
            PathBuf::from,
        );

        let room_idle_seconds =
            parse_or(vars, "DICE_ROOM_IDLE_SECONDS", DEFAULT_ROOM_IDLE_SECONDS)?;
        let cached_results = parse_or(vars, "DICE_CACHED_RESULTS", DEFAULT_CACHED_RESULTS)?;
        let ping_period_seconds =
            parse_or(vars, "DICE_PING_PERIOD_SECONDS", DEFAULT_PING_PERIOD_SECONDS)?;
        let pong_wait_seconds =
            parse_or(vars, "DICE_PONG_WAIT_SECONDS", DEFAULT_PONG_WAIT_SECONDS)?;
        let write_wait_seconds =
            parse_or(vars, "DICE_WRITE_WAIT_SECONDS", DEFAULT_WRITE_WAIT_SECONDS)?;

        if ping_period_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "DICE_PING_PERIOD_SECONDS must be greater than zero".to_string(),
            ));
        }

        // A ping must go out before the peer's deadline can expire
        if pong_wait_seconds <= ping_period_seconds {
            return Err(ConfigError::InvalidValue(format!(
                "DICE_PONG_WAIT_SECONDS ({pong_wait_seconds}) must exceed \
                 DICE_PING_PERIOD_SECONDS ({ping_period_seconds})"
            )));
        }

        if write_wait_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "DICE_WRITE_WAIT_SECONDS must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            bind_address,
            frontend_dir,
            debug,
            room_idle_seconds,
            cached_results,
            ping_period_seconds,
            pong_wait_seconds,
            write_wait_seconds,
        })
    }

    /// Settings handed to every room actor.
    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            idle_timeout: Duration::from_secs(self.room_idle_seconds),
            cached_results: self.cached_results,
        }
    }

    /// Settings handed to every roller actor.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            ping_period: Duration::from_secs(self.ping_period_seconds),
            read_timeout: Duration::from_secs(self.pong_wait_seconds),
            write_timeout: Duration::from_secs(self.write_wait_seconds),
        }
    }
}

fn parse_or<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{key}={raw:?} is not a valid value"))),
    }
}

fn parse_bool(vars: &HashMap<String, String>, key: &str) -> Result<bool, ConfigError> {
    match vars.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "" | "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(format!(
                "{key}={v:?} is not a boolean"
            ))),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("Config should load successfully");

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.frontend_dir, PathBuf::from(DEFAULT_FRONTEND_DIR));
        assert!(!config.debug);
        assert_eq!(config.room_idle_seconds, DEFAULT_ROOM_IDLE_SECONDS);
        assert_eq!(config.cached_results, DEFAULT_CACHED_RESULTS);
        assert_eq!(config.ping_period_seconds, DEFAULT_PING_PERIOD_SECONDS);
        assert_eq!(config.pong_wait_seconds, DEFAULT_PONG_WAIT_SECONDS);
        assert_eq!(config.write_wait_seconds, DEFAULT_WRITE_WAIT_SECONDS);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let vars = HashMap::from([
            ("DICE_BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string()),
            ("DICE_FRONTEND_DIR".to_string(), "/srv/dice".to_string()),
            ("DICE_ROOM_IDLE_SECONDS".to_string(), "5".to_string()),
            ("DICE_CACHED_RESULTS".to_string(), "3".to_string()),
            ("DICE_PING_PERIOD_SECONDS".to_string(), "9".to_string()),
            ("DICE_PONG_WAIT_SECONDS".to_string(), "10".to_string()),
            ("DICE_WRITE_WAIT_SECONDS".to_string(), "2".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.frontend_dir, PathBuf::from("/srv/dice"));
        assert_eq!(config.room_settings().idle_timeout, Duration::from_secs(5));
        assert_eq!(config.room_settings().cached_results, 3);

        let session = config.session_settings();
        assert_eq!(session.ping_period, Duration::from_secs(9));
        assert_eq!(session.read_timeout, Duration::from_secs(10));
        assert_eq!(session.write_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_debug_switches_frontend_dir() {
        let vars = HashMap::from([("DICE_DEBUG".to_string(), "true".to_string())]);
        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert!(config.debug);
        assert_eq!(config.frontend_dir, PathBuf::from(DEFAULT_DEBUG_FRONTEND_DIR));

        // An explicit directory wins over the debug default
        let vars = HashMap::from([
            ("DICE_DEBUG".to_string(), "1".to_string()),
            ("DICE_FRONTEND_DIR".to_string(), "web".to_string()),
        ]);
        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.frontend_dir, PathBuf::from("web"));
    }

    #[test]
    fn test_invalid_number_rejected() {
        let vars = HashMap::from([("DICE_CACHED_RESULTS".to_string(), "ten".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("DICE_CACHED_RESULTS"))
        );
    }

    #[test]
    fn test_invalid_bool_rejected() {
        let vars = HashMap::from([("DICE_DEBUG".to_string(), "maybe".to_string())]);

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_pong_wait_must_exceed_ping_period() {
        let vars = HashMap::from([
            ("DICE_PING_PERIOD_SECONDS".to_string(), "60".to_string()),
            ("DICE_PONG_WAIT_SECONDS".to_string(), "60".to_string()),
        ]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("must exceed"))
        );
    }

    #[test]
    fn test_zero_write_wait_rejected() {
        let vars = HashMap::from([("DICE_WRITE_WAIT_SECONDS".to_string(), "0".to_string())]);

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }
}
