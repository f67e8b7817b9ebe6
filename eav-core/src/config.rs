//! Cache configuration
//!
//! The recognized option set is small and static: enablement, entry TTL,
//! object capacity and the domain the cache instance is bound to.

use crate::{CacheDomain, ConfigError, EavResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable toggling the cache.
pub const ENV_ENABLED: &str = "EAV_CACHE_ENABLED";
/// Environment variable holding the entry TTL in seconds.
pub const ENV_TTL_SECS: &str = "EAV_CACHE_TTL_SECS";
/// Environment variable holding the object capacity.
pub const ENV_MAX_ENTRIES: &str = "EAV_CACHE_MAX_ENTRIES";
/// Environment variable naming the cache domain.
pub const ENV_DOMAIN: &str = "EAV_CACHE_DOMAIN";

/// Configuration shared by the metadata and object caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether caching is active. A disabled cache always reports misses.
    pub enabled: bool,
    /// Entries older than this read as misses.
    pub ttl: Duration,
    /// Maximum number of objects held by one domain's object cache.
    pub max_entries: usize,
    /// Partition this configuration binds to.
    pub domain: CacheDomain,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(600), // 10 minutes
            max_entries: 10_000,
            domain: CacheDomain::default(),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable caching.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the object capacity.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Bind to a domain.
    pub fn with_domain(mut self, domain: CacheDomain) -> Self {
        self.domain = domain;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `EAV_CACHE_ENABLED`: "true" or "false" (default: true)
    /// - `EAV_CACHE_TTL_SECS`: entry TTL in seconds (default: 600)
    /// - `EAV_CACHE_MAX_ENTRIES`: object capacity (default: 10000)
    /// - `EAV_CACHE_DOMAIN`: domain name (default: "default")
    pub fn from_env() -> EavResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> EavResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let enabled = match lookup(ENV_ENABLED) {
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => return Err(invalid(ENV_ENABLED, &raw, "expected true or false").into()),
            },
            None => defaults.enabled,
        };

        let ttl = match lookup(ENV_TTL_SECS) {
            Some(raw) => {
                let secs: i64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| invalid(ENV_TTL_SECS, &raw, "expected an integer"))?;
                if secs < 0 {
                    return Err(invalid(ENV_TTL_SECS, &raw, "must not be negative").into());
                }
                Duration::from_secs(secs as u64)
            }
            None => defaults.ttl,
        };

        let max_entries = match lookup(ENV_MAX_ENTRIES) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_MAX_ENTRIES, &raw, "expected a non-negative integer"))?,
            None => defaults.max_entries,
        };

        let domain = match lookup(ENV_DOMAIN) {
            Some(raw) => CacheDomain::new(&raw)
                .map_err(|_| invalid(ENV_DOMAIN, &raw, "must not be blank"))?,
            None => defaults.domain,
        };

        let config = Self {
            enabled,
            ttl,
            max_entries,
            domain,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check a programmatically assembled configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.ttl.is_zero() {
            return Err(invalid("ttl", "0", "an enabled cache needs a positive ttl"));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
