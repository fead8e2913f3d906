//! Error taxonomy for the resource subsystem.
//!
//! `ResourceError` is `Clone` because a single in-flight archive download is
//! awaited by every concurrent caller of the same key, and each of them gets
//! a copy of the outcome.

use thiserror::Error;

pub type Result<T, E = ResourceError> = std::result::Result<T, E>;

/// Errors produced while parsing, fetching, or extracting resources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The reference string could not be parsed. Not retryable.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// The resource or entry does not exist. Not retryable.
    #[error("{resource} not found: {identifier}")]
    NotFound {
        resource: String,
        identifier: String,
    },

    /// Network or remote failure. Transient, never retried at this layer.
    #[error("fetch failed for {url}: {reason}")]
    Fetch {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    /// Corrupt archive or malformed table/markdown content.
    #[error("failed to parse {what}: {reason}")]
    Parse { what: String, reason: String },

    /// The request exceeded its deadline.
    #[error("operation timed out after {0} seconds")]
    Timeout(u64),
}

impl ResourceError {
    pub fn not_found(resource: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            identifier: identifier.into(),
        }
    }

    pub fn fetch(url: impl Into<String>, status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            status,
            reason: reason.into(),
        }
    }

    pub fn parse(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Callers treat parse failures exactly like absent resources.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Parse { .. })
    }

    /// Short machine-readable code used in REST and MCP error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidReference(_) => "invalid_reference",
            Self::NotFound { .. } | Self::Parse { .. } => "not_found",
            Self::Fetch { .. } => "fetch_error",
            Self::Timeout(_) => "timeout",
        }
    }
}
