//! Error boundary types and classification.
//!
//! This module provides the types that cross the boundary between the host
//! application and the resilience layer: `RawError` (the only universally
//! available error shape at an interception point) and the classification
//! machinery that maps it onto a stable taxonomy.

pub mod classification;

// Re-export main types for convenient access
pub use classification::{
    classify, retry_delay, should_auto_retry, Category, ErrorCode, ErrorDetails, Severity,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error code carried by the originating platform, when one exists.
///
/// Wallet backends report numeric JSON-RPC codes while pairing libraries
/// report short string codes; both shapes are preserved verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceCode {
    /// Numeric code, e.g. a JSON-RPC error code like -32000.
    Number(i64),
    /// String code, e.g. "UNPREDICTABLE_GAS_LIMIT".
    Text(String),
}

impl std::fmt::Display for SourceCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

/// The raw error shape observed at an interception point.
///
/// Only `message` is guaranteed to exist; stack, code, and source origin are
/// attached when the platform provides them. Instances are ephemeral: one is
/// built per interception and never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawError {
    /// The error message text.
    pub message: String,
    /// Stack trace text, when available.
    pub stack: Option<String>,
    /// Platform error code, when available.
    pub code: Option<SourceCode>,
    /// Origin of the error (file path or URL), when available.
    pub source: Option<String>,
}

impl RawError {
    /// Creates a raw error from a message alone.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            code: None,
            source: None,
        }
    }

    /// Attaches a stack trace.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Attaches a platform error code.
    pub fn with_code(mut self, code: SourceCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attaches the origin (file path or URL) of the error.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Builds a raw error from any standard error, preserving the source
    /// chain as pseudo-stack text so stack-scoped suppression rules can
    /// still match.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut raw = Self::new(err.to_string());
        let mut frames = Vec::new();
        let mut cause = err.source();
        while let Some(c) = cause {
            frames.push(c.to_string());
            cause = c.source();
        }
        if !frames.is_empty() {
            raw.stack = Some(frames.join("\n"));
        }
        raw
    }
}

impl From<String> for RawError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for RawError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl std::fmt::Display for RawError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RawError {}

/// Errors produced by the resilience layer's own collaborator contracts.
#[derive(Debug, Error)]
pub enum WalletguardError {
    /// The transaction status source could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The status source reached the backend but the request failed.
    #[error("status source error ({status}): {message}")]
    Backend {
        /// HTTP-style status code reported by the backend.
        status: u16,
        /// Backend-provided failure message.
        message: String,
    },

    /// The status source returned a payload that could not be interpreted.
    #[error("malformed status payload: {0}")]
    MalformedPayload(String),

    /// Any other failure surfaced by a collaborator.
    #[error("{0}")]
    Other(String),
}

impl From<&WalletguardError> for RawError {
    fn from(err: &WalletguardError) -> Self {
        let raw = RawError::new(err.to_string());
        match err {
            WalletguardError::Backend { status, .. } => {
                raw.with_code(SourceCode::Number(i64::from(*status)))
            }
            _ => raw,
        }
    }
}
