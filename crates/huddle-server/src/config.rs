//! Server configuration loaded from environment variables.
//!
//! Everything except the Redis URL has a default. The relay cannot run
//! without the shared store and bus, so a missing `REDIS_URL` is reported by
//! [`ServerConfig::require_redis_url`] and aborts startup.

use std::net::SocketAddr;
use std::str::FromStr;

use huddle_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_OUTBOUND_BUFFER};

/// How the unread counter is raised when a message is sent while the
/// partner is unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnreadPolicy {
    /// Read the score, then write `score + 1`. Matches the behaviour existing
    /// clients were built against; concurrent senders can lose increments.
    #[default]
    Compatible,
    /// Single store-side increment (`ZINCRBY`).
    Atomic,
}

impl FromStr for UnreadPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compatible" | "compat" => Ok(Self::Compatible),
            "atomic" => Ok(Self::Atomic),
            other => Err(format!("unknown unread policy: {other}")),
        }
    }
}

/// Per-relay settings that do not concern the process itself.
#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    /// Capacity of each connection's outbound notification queue.
    pub outbound_buffer: usize,
    pub unread_policy: UnreadPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            unread_policy: UnreadPolicy::default(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP / WebSocket server.
    /// Env: `HTTP_ADDR`, or `PORT` to bind `0.0.0.0:{PORT}`
    /// Default: `0.0.0.0:5000`
    pub http_addr: SocketAddr,

    /// Redis URL shared by the relation store and the fanout bus.
    /// Env: `REDIS_URL`
    /// Default: none (startup fails).
    pub redis_url: Option<String>,

    /// Human-readable name for this relay process.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Huddle Node"`
    pub instance_name: String,

    /// Env: `OUTBOUND_BUFFER`
    /// Default: `256`
    pub outbound_buffer: usize,

    /// Env: `UNREAD_POLICY` (`compatible` / `atomic`)
    /// Default: `compatible`
    pub unread_policy: UnreadPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            redis_url: None,
            instance_name: "Huddle Node".to_string(),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            unread_policy: UnreadPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            match port.parse::<u16>() {
                Ok(port) => config.http_addr.set_port(port),
                Err(_) => tracing::warn!(value = %port, "Invalid PORT, using default"),
            }
        }

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Some(url) = lookup("REDIS_URL") {
            if !url.is_empty() {
                config.redis_url = Some(url);
            }
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Some(val) = lookup("OUTBOUND_BUFFER") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.outbound_buffer = n,
                _ => tracing::warn!(value = %val, "Invalid OUTBOUND_BUFFER, using default"),
            }
        }

        if let Some(val) = lookup("UNREAD_POLICY") {
            match val.parse::<UnreadPolicy>() {
                Ok(policy) => config.unread_policy = policy,
                Err(e) => tracing::warn!(error = %e, "Invalid UNREAD_POLICY, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    pub fn require_redis_url(&self) -> anyhow::Result<&str> {
        self.redis_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("REDIS_URL not specified"))
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            outbound_buffer: self.outbound_buffer,
            unread_policy: self.unread_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 5000).into());
        assert!(config.redis_url.is_none());
        assert_eq!(config.unread_policy, UnreadPolicy::Compatible);
    }

    #[test]
    fn test_missing_redis_url_is_fatal() {
        let config = config_from(&[]);
        assert!(config.require_redis_url().is_err());

        let config = config_from(&[("REDIS_URL", "")]);
        assert!(config.require_redis_url().is_err());

        let config = config_from(&[("REDIS_URL", "redis://127.0.0.1/")]);
        assert_eq!(config.require_redis_url().unwrap(), "redis://127.0.0.1/");
    }

    #[test]
    fn test_port_and_http_addr() {
        let config = config_from(&[("PORT", "7000")]);
        assert_eq!(config.http_addr.port(), 7000);

        let config = config_from(&[("PORT", "7000"), ("HTTP_ADDR", "127.0.0.1:9000")]);
        assert_eq!(config.http_addr, "127.0.0.1:9000".parse().unwrap());

        let config = config_from(&[("PORT", "not-a-port")]);
        assert_eq!(config.http_addr.port(), 5000);
    }

    #[test]
    fn test_unread_policy_parsing() {
        assert_eq!("atomic".parse::<UnreadPolicy>().unwrap(), UnreadPolicy::Atomic);
        assert_eq!(" Compatible ".parse::<UnreadPolicy>().unwrap(), UnreadPolicy::Compatible);
        assert!("sometimes".parse::<UnreadPolicy>().is_err());

        let config = config_from(&[("UNREAD_POLICY", "atomic"), ("OUTBOUND_BUFFER", "0")]);
        assert_eq!(config.unread_policy, UnreadPolicy::Atomic);
        assert_eq!(config.outbound_buffer, 256);
    }
}
