//! Error types for EAV cache operations
//!
//! Cache misses and admission rejections are ordinary outcomes, not errors.
//! The variants here cover API misuse (bad configuration, malformed domain
//! identifiers) and failures reported by external collaborators.

use crate::{SchemeId, UserId};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },
}

/// Errors reported by the metadata provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Scheme not found: {name}")]
    SchemeNotFound { name: String },

    #[error("Scheme lookup failed for {name}: {reason}")]
    LookupFailed { name: String, reason: String },

    #[error("Scheme {scheme_id} is already bound to type {type_name}")]
    AlreadyRegistered {
        scheme_id: SchemeId,
        type_name: String,
    },
}

/// Errors reported by a quota resolver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuotaError {
    #[error("Quota resolution failed for user {user_id}: {reason}")]
    ResolutionFailed { user_id: UserId, reason: String },
}

/// Master error type for all EAV cache errors.
#[derive(Debug, Clone, Error)]
pub enum EavError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Quota error: {0}")]
    Quota(#[from] QuotaError),
}

/// Result type alias for EAV cache operations.
pub type EavResult<T> = Result<T, EavError>;

// =============================================================================
// TESTS
// =============================================================================
