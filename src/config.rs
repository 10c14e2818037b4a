//! Configuration management for the rendezvous daemon.
//!
//! A single TOML file (default `config.toml`). On first run, if the file does
//! not exist, it is written out with defaults. Missing keys inside an existing
//! file fall back to their defaults section by section.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub socket: SocketConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the WebSocket transport and the health endpoint share.
    /// A bare host gets the default port appended.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

pub const DEFAULT_PORT: u16 = 3001;

fn default_listen_address() -> String {
    format!("0.0.0.0:{}", DEFAULT_PORT)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
        }
    }
}

impl ServerConfig {
    pub fn full_listen_address(&self) -> String {
        if self.listen_address.contains(':') {
            self.listen_address.clone()
        } else {
            format!("{}:{}", self.listen_address, DEFAULT_PORT)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to open a signaling socket or read `/health`.
    /// `"*"` allows every origin.
    #[serde(default = "default_allow_origins")]
    pub allow_origins: Vec<String>,
}

fn default_allow_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: default_allow_origins(),
        }
    }
}

impl CorsConfig {
    /// Requests without an `Origin` header (native clients, curl) are always allowed.
    pub fn is_origin_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(origin) => self
                .allow_origins
                .iter()
                .any(|allowed| allowed == "*" || allowed.eq_ignore_ascii_case(origin)),
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allow_origins.iter().any(|o| o == "*")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketConfig {
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// A connection that sends nothing (not even a pong) for this long is dropped.
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

fn default_ping_interval_ms() -> u64 {
    25_000
}

fn default_ping_timeout_ms() -> u64 {
    60_000
}

fn default_max_message_bytes() -> usize {
    1_000_000
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: default_ping_interval_ms(),
            ping_timeout_ms: default_ping_timeout_ms(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

impl SocketConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Waiting entries older than this are swept (ms).
    #[serde(default = "default_max_inactive_time_ms")]
    pub max_inactive_time_ms: u64,
    /// How often the sweep runs (ms).
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
}

fn default_max_inactive_time_ms() -> u64 {
    5 * 60 * 1000
}

fn default_cleanup_interval_ms() -> u64 {
    60 * 1000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_inactive_time_ms: default_max_inactive_time_ms(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
        }
    }
}

impl SessionConfig {
    pub fn max_inactive_time(&self) -> Duration {
        Duration::from_millis(self.max_inactive_time_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
    /// `stdout` or `file`
    #[serde(default = "default_log_output")]
    pub output: String,
    #[serde(default = "default_log_file_path")]
    pub file_path: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_output() -> String {
    "stdout".to_string()
}

fn default_log_file_path() -> String {
    "./logs/rendezvous.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            output: default_log_output(),
            file_path: default_log_file_path(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or write the defaults there and return them.
    pub fn load_or_create(path: &str) -> Result<Self, ConfigError> {
        if Path::new(path).exists() {
            Self::load_from_file(path)
        } else {
            let config = Config::default();
            config.save_to_file(path)?;
            Ok(config)
        }
    }

    pub fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                    path: path.to_string(),
                    source,
                })?;
            }
        }
        fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listen_address.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "server.listen_address",
                reason: "must not be empty".to_string(),
            });
        }
        if self.session.max_inactive_time_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "session.max_inactive_time_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        // tokio::time::interval panics on a zero period
        if self.session.cleanup_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "session.cleanup_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.socket.ping_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "socket.ping_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.socket.ping_timeout_ms <= self.socket.ping_interval_ms {
            return Err(ConfigError::Invalid {
                field: "socket.ping_timeout_ms",
                reason: format!(
                    "must exceed socket.ping_interval_ms ({})",
                    self.socket.ping_interval_ms
                ),
            });
        }
        if self.socket.max_message_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "socket.max_message_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid {
                field: "logging.format",
                reason: format!("expected pretty or json, got {:?}", self.logging.format),
            });
        }
        if !matches!(self.logging.output.as_str(), "stdout" | "file") {
            return Err(ConfigError::Invalid {
                field: "logging.output",
                reason: format!("expected stdout or file, got {:?}", self.logging.output),
            });
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.session.max_inactive_time_ms, 300_000);
        assert_eq!(config.session.cleanup_interval_ms, 60_000);
        assert_eq!(config.server.full_listen_address(), "0.0.0.0:3001");
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path_str = path.to_str().unwrap();

        let created = Config::load_or_create(path_str).unwrap();
        assert!(path.exists());

        let loaded = Config::load_from_file(path_str).unwrap();
        assert_eq!(
            loaded.session.max_inactive_time_ms,
            created.session.max_inactive_time_ms
        );
        assert_eq!(loaded.cors.allow_origins, vec!["*".to_string()]);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(
            &path,
            "[session]\nmax_inactive_time_ms = 1000\n\n[server]\nlisten_address = \"127.0.0.1\"\n",
        )
        .unwrap();

        let config = Config::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.session.max_inactive_time_ms, 1000);
        assert_eq!(config.session.cleanup_interval_ms, 60_000);
        assert_eq!(config.server.full_listen_address(), "127.0.0.1:3001");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_zero_cleanup_interval_rejected() {
        let mut config = Config::default();
        config.session.cleanup_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "session.cleanup_interval_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_ping_timeout_must_exceed_interval() {
        let mut config = Config::default();
        config.socket.ping_timeout_ms = config.socket.ping_interval_ms;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cors_wildcard_and_list() {
        let open = CorsConfig::default();
        assert!(open.is_origin_allowed(Some("https://app.example")));
        assert!(open.allows_any_origin());

        let strict = CorsConfig {
            allow_origins: vec!["https://app.example".to_string()],
        };
        assert!(strict.is_origin_allowed(None));
        assert!(strict.is_origin_allowed(Some("https://APP.example")));
        assert!(!strict.is_origin_allowed(Some("https://evil.example")));
        assert!(!strict.allows_any_origin());
    }

    #[test]
    fn test_zero_message_limit_rejected() {
        let mut config = Config::default();
        config.socket.max_message_bytes = 0;
        assert!(config.validate().is_err());
    }
}
