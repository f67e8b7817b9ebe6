//! Cache domain identifier.
//!
//! Every piece of cache state is partitioned by domain so that independent
//! connections or tenants sharing one process never see each other's data.

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Domain used when the configuration does not name one.
pub const DEFAULT_DOMAIN: &str = "default";

/// Named partition of the cache.
///
/// Construction goes through [`CacheDomain::new`], which rejects blank
/// names, so every value in circulation is a usable registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheDomain(Arc<str>);

impl CacheDomain {
    /// Create a domain from a name. Surrounding whitespace is trimmed.
    pub fn new(name: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "domain".to_string(),
            });
        }
        Ok(Self(Arc::from(trimmed)))
    }

    /// The name of this domain.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the fallback domain.
    pub fn is_default(&self) -> bool {
        &*self.0 == DEFAULT_DOMAIN
    }
}

impl Default for CacheDomain {
    fn default() -> Self {
        Self(Arc::from(DEFAULT_DOMAIN))
    }
}

impl fmt::Display for CacheDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CacheDomain {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CacheDomain {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CacheDomain> for String {
    fn from(domain: CacheDomain) -> Self {
        domain.0.to_string()
    }
}
