//! EAV Core - Shared Types
//!
//! Pure data structures used by every layer of the EAV cache: identifiers,
//! the scheme/type metadata model, the cacheable object contract,
//! configuration and the error hierarchy. No caching logic lives here.

mod clock;
mod config;
mod domain;
mod error;
mod identity;
mod metadata;
mod object;

pub use clock::{elapsed_between, Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, ENV_DOMAIN, ENV_ENABLED, ENV_MAX_ENTRIES, ENV_TTL_SECS};
pub use domain::{CacheDomain, DEFAULT_DOMAIN};
pub use error::{ConfigError, EavError, EavResult, MetadataError, QuotaError, ValidationError};
pub use identity::{
    compute_content_hash, ContentHash, ObjectId, SchemeId, Timestamp, TypeId, UserId,
    SYSTEM_USER_ID,
};
pub use metadata::{Scheme, Structure, TypeInfo};
pub use object::{CacheableObject, EavObject};
