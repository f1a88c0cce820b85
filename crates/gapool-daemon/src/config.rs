// crates/gapool-daemon/src/config.rs
//
// Runtime configuration for the Gapool daemon.
// Loaded from a TOML file or populated with sensible defaults.

use std::fs;
use std::time::Duration;

use serde::Deserialize;

use gapool_rpc::ServerConfig;

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Host address miners connect to.
    #[serde(default = "default_listen_host")]
    pub listen_host: String,

    /// Port miners connect to.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Seconds between polls of the chain node.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds a single chain node call may take before it counts as
    /// unavailable.
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,

    /// Pending outbound lines per session before job pushes are superseded.
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// JSON-RPC endpoint of the chain node.
    #[serde(default = "default_node_url")]
    pub node_url: String,

    /// Basic-auth user for the chain node, if it requires one.
    #[serde(default)]
    pub node_user: Option<String>,

    #[serde(default)]
    pub node_password: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    2000
}

fn default_poll_interval_secs() -> u64 {
    25
}

fn default_upstream_timeout_secs() -> u64 {
    10
}

fn default_outbound_queue_capacity() -> usize {
    8
}

fn default_node_url() -> String {
    "http://127.0.0.1:31397".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen_host: default_listen_host(),
            listen_port: default_listen_port(),
            poll_interval_secs: default_poll_interval_secs(),
            upstream_timeout_secs: default_upstream_timeout_secs(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            node_url: default_node_url(),
            node_user: None,
            node_password: None,
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Override the listen address from a `host:port` string.
    pub fn set_listen(&mut self, addr: &str) -> Result<(), String> {
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| format!("listen address '{}' is not host:port", addr))?;
        let port: u16 = port
            .parse()
            .map_err(|_| format!("invalid port in listen address '{}'", addr))?;
        if host.is_empty() {
            return Err(format!("missing host in listen address '{}'", addr));
        }
        self.listen_host = host.to_string();
        self.listen_port = port;
        Ok(())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.listen_host.clone(),
            port: self.listen_port,
            outbound_queue_capacity: self.outbound_queue_capacity.max(1),
        }
    }

    /// Poll interval; never zero, which the timer cannot represent.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: DaemonConfig = toml::from_str("").unwrap();
        assert_eq!(config.listen_host, "0.0.0.0");
        assert_eq!(config.listen_port, 2000);
        assert_eq!(config.poll_interval(), Duration::from_secs(25));
        assert_eq!(config.upstream_timeout(), Duration::from_secs(10));
        assert_eq!(config.node_url, "http://127.0.0.1:31397");
        assert!(config.node_user.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let config: DaemonConfig = toml::from_str(
            r#"
            listen_port = 3333
            node_url = "http://10.0.0.5:8332"
            node_user = "miner"
            node_password = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.listen_host, "0.0.0.0");
        assert_eq!(config.listen_port, 3333);
        assert_eq!(config.node_url, "http://10.0.0.5:8332");
        assert_eq!(config.node_user.as_deref(), Some("miner"));
        assert_eq!(config.node_password.as_deref(), Some("secret"));
    }

    #[test]
    fn queue_capacity_and_intervals_are_clamped() {
        let config: DaemonConfig = toml::from_str(
            "outbound_queue_capacity = 0\npoll_interval_secs = 0\nupstream_timeout_secs = 0",
        )
        .unwrap();
        assert_eq!(config.server_config().outbound_queue_capacity, 1);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.upstream_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn listen_override_parses_host_and_port() {
        let mut config = DaemonConfig::default();
        config.set_listen("127.0.0.1:4000").unwrap();
        assert_eq!(config.server_config().addr(), "127.0.0.1:4000");

        assert!(config.set_listen("127.0.0.1").is_err());
        assert!(config.set_listen("127.0.0.1:notaport").is_err());
        assert!(config.set_listen(":4000").is_err());
        assert_eq!(config.listen_port, 4000);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(DaemonConfig::load("/nonexistent/gapool/config.toml").is_err());
    }
}
