//! Endpoint Configuration
//!
//! One `EndpointConfig` describes the server a connection talks to and the
//! limits it runs under. It is fixed when a connection is opened; a
//! reconnect reuses the same values.

use crate::error::{Error, ErrorKind, Result};
use std::time::Duration;

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 6379;

/// Default connect and overall command timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default receive buffer capacity (1 MiB)
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Environment variable holding `host` or `host:port`
pub const HOST_ENV: &str = "REDIS_HOST";

/// Environment variable holding the credential
pub const PASSWORD_ENV: &str = "REDIS_PASSWORD";

/// Target server and per-connection limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Host name or IP address
    pub host: String,

    /// TCP port
    pub port: u16,

    /// Credential sent with AUTH after connecting; empty disables AUTH
    pub password: String,

    /// Bound for the connect and for one command round trip
    pub timeout: Duration,

    /// Fixed receive buffer capacity; larger replies fail with PARAMERR
    pub buffer_size: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            password: String::new(),
            timeout: DEFAULT_TIMEOUT,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl EndpointConfig {
    /// Creates a config for `host:port` with default limits and no credential.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Reads `REDIS_HOST` and `REDIS_PASSWORD`.
    ///
    /// Missing or empty variables fall back to the defaults.
    pub fn from_env() -> Result<Self> {
        let host = std::env::var(HOST_ENV).ok();
        let password = std::env::var(PASSWORD_ENV).ok();
        Self::from_parts(host.as_deref(), password.as_deref())
    }

    /// Builds a config from an optional `host[:port]` and credential.
    pub fn from_parts(host: Option<&str>, password: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = host.filter(|s| !s.is_empty()) {
            let (host, port) = parse_host_port(value)?;
            config.host = host;
            config.port = port;
        }

        if let Some(password) = password {
            config.password = password.to_string();
        }

        Ok(config)
    }

    /// Returns `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Rejects values no connection could work with.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::new(ErrorKind::Param, "host must not be empty"));
        }
        if self.port == 0 {
            return Err(Error::new(ErrorKind::Param, "port must not be zero"));
        }
        if self.timeout.is_zero() {
            return Err(Error::new(ErrorKind::Param, "timeout must not be zero"));
        }
        if self.buffer_size == 0 {
            return Err(Error::new(ErrorKind::Param, "buffer size must not be zero"));
        }
        Ok(())
    }
}

/// Splits `host`, `host:port` or `[v6-addr]:port`. A missing port means the
/// default port; an empty host means the default host.
pub fn parse_host_port(value: &str) -> Result<(String, u16)> {
    let (host, port) = if let Some(rest) = value.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| Error::new(ErrorKind::Param, format!("unterminated address {:?}", value)))?;
        match tail.strip_prefix(':') {
            Some(port) => (host, parse_port(port)?),
            None if tail.is_empty() => (host, DEFAULT_PORT),
            None => return Err(Error::new(ErrorKind::Param, format!("invalid address {:?}", value))),
        }
    } else {
        match value.split_once(':') {
            // a bare IPv6 address has several colons and no port
            Some((host, port)) if !port.contains(':') => (host, parse_port(port)?),
            _ => (value, DEFAULT_PORT),
        }
    };

    let host = if host.is_empty() { DEFAULT_HOST } else { host };
    Ok((host.to_string(), port))
}

fn parse_port(port: &str) -> Result<u16> {
    port.parse::<u16>()
        .map_err(|e| Error::new(ErrorKind::Param, format!("invalid port {:?}: {}", port, e)))
}
