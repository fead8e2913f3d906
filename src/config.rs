use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CachePolicy;
use crate::fetcher::FetcherSettings;

/// Default timeout for tool operations (30 seconds).
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CATALOG_URL: &str = "https://git.door43.org";
const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8787";
const DEFAULT_CACHE_CAPACITY_MB: u64 = 512;
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_CATALOG_TTL_SECS: u64 = 300;
const DEFAULT_BRANCH: &str = "master";
/// Upper bound for cache lifetimes (ten years); moka rejects anything past 1000.
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// How the MCP endpoint is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Newline-delimited JSON-RPC on stdin/stdout.
    Stdio,
    /// REST facade plus `POST /api/mcp`.
    Http,
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            _ => Err(ConfigError::Invalid {
                name: "TH_TRANSPORT",
                expected: "'stdio' or 'http'",
                value: s.to_string(),
            }),
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub catalog_url: String,
    pub transport: Transport,
    pub http_addr: SocketAddr,
    pub tool_timeout: Duration,
    pub cache_capacity_bytes: u64,
    pub cache_ttl: Duration,
    pub catalog_ttl: Duration,
    pub default_branch: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            transport: Transport::Stdio,
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            tool_timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
            cache_capacity_bytes: DEFAULT_CACHE_CAPACITY_MB * 1024 * 1024,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            catalog_ttl: Duration::from_secs(DEFAULT_CATALOG_TTL_SECS),
            default_branch: DEFAULT_BRANCH.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment.
    ///
    /// - `TH_CATALOG_URL` (default `https://git.door43.org`): remote catalog
    /// - `TH_TRANSPORT` (`stdio` | `http`, default `stdio`)
    /// - `TH_HTTP_ADDR` (default `127.0.0.1:8787`): listen address for `http`
    /// - `TH_TOOL_TIMEOUT_SECS` (default 30): max seconds per request
    /// - `TH_CACHE_CAPACITY_MB` (default 512): archive cache bound
    /// - `TH_CACHE_TTL_SECS` (default 3600): archive time-to-live
    /// - `TH_CATALOG_TTL_SECS` (default 300): catalog lookup time-to-live
    /// - `TH_DEFAULT_BRANCH` (default `master`): ref used without a catalog
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let catalog_url = get("TH_CATALOG_URL").unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string());
        let transport = match get("TH_TRANSPORT") {
            Some(value) => value.parse()?,
            None => Transport::Stdio,
        };
        let http_addr_raw = get("TH_HTTP_ADDR").unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
        let http_addr = http_addr_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "TH_HTTP_ADDR",
            expected: "a socket address such as 127.0.0.1:8787",
            value: http_addr_raw.clone(),
        })?;

        let seconds = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            positive(name, get(name), default)
        };

        Ok(Self {
            catalog_url,
            transport,
            http_addr,
            tool_timeout: Duration::from_secs(seconds("TH_TOOL_TIMEOUT_SECS", DEFAULT_TOOL_TIMEOUT_SECS)?),
            cache_capacity_bytes: megabytes("TH_CACHE_CAPACITY_MB", get("TH_CACHE_CAPACITY_MB"), DEFAULT_CACHE_CAPACITY_MB)?,
            cache_ttl: ttl("TH_CACHE_TTL_SECS", get("TH_CACHE_TTL_SECS"), DEFAULT_CACHE_TTL_SECS)?,
            catalog_ttl: ttl("TH_CATALOG_TTL_SECS", get("TH_CATALOG_TTL_SECS"), DEFAULT_CATALOG_TTL_SECS)?,
            default_branch: get("TH_DEFAULT_BRANCH").unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
        })
    }

    pub fn fetcher_settings(&self) -> FetcherSettings {
        FetcherSettings {
            cache: CachePolicy {
                capacity_bytes: self.cache_capacity_bytes,
                ttl: self.cache_ttl,
            },
            catalog_ttl: self.catalog_ttl,
            default_branch: self.default_branch.clone(),
            timeout: self.tool_timeout,
        }
    }
}

fn positive(name: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::Invalid {
                name,
                expected: "a positive integer",
                value: raw,
            }),
        },
    }
}

fn megabytes(name: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    let raw = value.clone().unwrap_or_default();
    positive(name, value, default)?
        .checked_mul(1024 * 1024)
        .ok_or(ConfigError::Invalid {
            name,
            expected: "a size in megabytes that fits in 64 bits",
            value: raw,
        })
}

fn ttl(name: &'static str, value: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let raw = value.clone().unwrap_or_default();
    let secs = positive(name, value, default)?;
    if secs > MAX_TTL_SECS {
        return Err(ConfigError::Invalid {
            name,
            expected: "at most ten years in seconds (315360000)",
            value: raw,
        });
    }
    Ok(Duration::from_secs(secs))
}
