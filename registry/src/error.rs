//! Registry error types.
//!
//! Every failure the registry reports maps onto one of five coarse kinds
//! (see [`ErrorKind`]); transports switch on the kind, humans read the message.

use serde::Serialize;
use thiserror::Error;

use crate::types::{CapabilityKind, SlotId};

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Namespace quota exceeded: all {limit} numbered slots are occupied")]
    QuotaExceeded { limit: usize },

    #[error("Namespace not found: {0}")]
    NamespaceNotFound(SlotId),

    #[error("{kind} not found: '{key}' in namespace {namespace}")]
    NotFound {
        kind: CapabilityKind,
        namespace: SlotId,
        key: String,
    },

    #[error("{kind} already exists: '{key}' in namespace {namespace}")]
    Conflict {
        kind: CapabilityKind,
        namespace: SlotId,
        key: String,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },
}

impl RegistryError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::NamespaceNotFound(_) | Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Validation { .. } => ErrorKind::ValidationError,
        }
    }
}

/// Coarse error classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    QuotaExceeded,
    NotFound,
    Conflict,
    Forbidden,
    ValidationError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuotaExceeded => "quota_exceeded",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Forbidden => "forbidden",
            Self::ValidationError => "validation_error",
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}
