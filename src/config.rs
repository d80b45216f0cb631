//! Configuration module for hubgate
//!
//! Supports JSON configuration; command line flags override file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::HubNetwork;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Hub address to forward connections to
    #[serde(default = "default_hub_addr")]
    pub hub_addr: String,

    /// Hub transport family
    #[serde(default)]
    pub hub_network: HubNetwork,

    /// Local addresses to listen on
    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,

    /// TLS certificate file (PEM); TLS is disabled unless both cert and key are set
    pub cert: Option<PathBuf>,

    /// TLS private key file (PEM)
    pub key: Option<PathBuf>,

    /// Prometheus metrics listen address (e.g. "127.0.0.1:9090"); disabled when unset
    pub metrics: Option<String>,

    /// Log accept and per-connection errors
    #[serde(default)]
    pub log_errors: bool,

    /// Protocol detection window in milliseconds; zero or negative disables detection
    #[serde(default = "default_detect_wait_ms")]
    pub detect_wait_ms: i64,

    /// Relay buffer size in KiB
    #[serde(default = "default_buffer_kb")]
    pub buffer_kb: usize,

    /// Don't announce the client IP to the hub
    #[serde(default)]
    pub no_send_ip: bool,
}

fn default_hub_addr() -> String {
    "127.0.0.1:411".to_string()
}

fn default_hosts() -> Vec<String> {
    vec!["0.0.0.0:411".to_string()]
}

fn default_detect_wait_ms() -> i64 {
    650
}

fn default_buffer_kb() -> usize {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hub_addr: default_hub_addr(),
            hub_network: HubNetwork::default(),
            hosts: default_hosts(),
            cert: None,
            key: None,
            metrics: None,
            log_errors: false,
            detect_wait_ms: default_detect_wait_ms(),
            buffer_kb: default_buffer_kb(),
            no_send_ip: false,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// The protocol detection window, or `None` when detection is disabled.
    pub fn detect_wait(&self) -> Option<Duration> {
        if self.detect_wait_ms > 0 {
            Some(Duration::from_millis(self.detect_wait_ms as u64))
        } else {
            None
        }
    }

    /// Relay buffer size in bytes; a zero `buffer_kb` falls back to the default.
    pub fn buffer_bytes(&self) -> usize {
        let kb = if self.buffer_kb == 0 {
            default_buffer_kb()
        } else {
            self.buffer_kb
        };
        kb * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.hub_addr, "127.0.0.1:411");
        assert_eq!(config.hub_network, HubNetwork::Tcp4);
        assert_eq!(config.hosts, vec!["0.0.0.0:411".to_string()]);
        assert_eq!(config.detect_wait(), Some(Duration::from_millis(650)));
        assert_eq!(config.buffer_bytes(), 10 * 1024);
        assert!(!config.no_send_ip);
    }

    #[test]
    fn test_detection_disabled() {
        let config = Config {
            detect_wait_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.detect_wait(), None);

        let config = Config {
            detect_wait_ms: -1,
            ..Default::default()
        };
        assert_eq!(config.detect_wait(), None);
    }

    #[test]
    fn test_zero_buffer_falls_back() {
        let config = Config {
            buffer_kb: 0,
            ..Default::default()
        };
        assert_eq!(config.buffer_bytes(), 10 * 1024);
    }

    #[test]
    fn test_from_json() {
        let config = Config::from_json(
            r#"{
                "hub_addr": "10.1.2.3:411",
                "hub_network": "unix",
                "hosts": ["127.0.0.1:1411", "127.0.0.1:1412"],
                "detect_wait_ms": 200,
                "no_send_ip": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.hub_addr, "10.1.2.3:411");
        assert_eq!(config.hub_network, HubNetwork::Unix);
        assert_eq!(config.hosts.len(), 2);
        assert_eq!(config.detect_wait(), Some(Duration::from_millis(200)));
        assert!(config.no_send_ip);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.hub_addr, config.hub_addr);
        assert_eq!(parsed.hosts, config.hosts);
    }
}
