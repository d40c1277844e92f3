//! TKS-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::sampler::SignalKind;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, TksError>;

/// Top-level error type for the tamper kill switch.
#[derive(Debug, Error)]
pub enum TksError {
    #[error("[TKS-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[TKS-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[TKS-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[TKS-1101] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[TKS-2001] sampler failure for {kind}: {details}")]
    SamplerFailure { kind: SignalKind, details: String },

    #[error("[TKS-2002] probe output parse failure in {context}: {details}")]
    ProbeParse {
        context: &'static str,
        details: String,
    },

    #[error("[TKS-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[TKS-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[TKS-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl TksError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "TKS-1001",
            Self::MissingConfig { .. } => "TKS-1002",
            Self::ConfigParse { .. } => "TKS-1003",
            Self::UnsupportedPlatform { .. } => "TKS-1101",
            Self::SamplerFailure { .. } => "TKS-2001",
            Self::ProbeParse { .. } => "TKS-2002",
            Self::Serialization { .. } => "TKS-2101",
            Self::Io { .. } => "TKS-3002",
            Self::Runtime { .. } => "TKS-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Runtime { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for sampler failures.
    #[must_use]
    pub fn sampler(kind: SignalKind, details: impl Into<String>) -> Self {
        Self::SamplerFailure {
            kind,
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for TksError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for TksError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
