//! Error taxonomy and classification.
//!
//! This module maps raw errors onto a closed taxonomy of stable codes. The
//! classifier is a pure function: ordered case-insensitive substring tests
//! against the lowered message (and, for the wallet-pairing internal-bug
//! category, against method names embedded in the stack), first match wins.
//! Every downstream retry and suppression decision switches on the resulting
//! code, never on raw message text again.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::RawError;

/// Upper bound on any computed retry delay.
const MAX_RETRY_DELAY: Duration = Duration::from_millis(30_000);

/// Range of the uniform jitter added to every retry delay, in milliseconds.
const JITTER_RANGE_MS: u64 = 1_000;

/// Stable taxonomy key for a classified error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The user declined the request in their wallet.
    UserRejected,
    /// The account cannot cover value plus fees.
    InsufficientFunds,
    /// Gas estimation failed; the transaction would likely revert.
    GasEstimationFailed,
    /// The offered gas price is below what the network currently accepts.
    GasPriceTooLow,
    /// The transaction nonce has already been consumed.
    NonceTooLow,
    /// Connectivity problem between the client and the network.
    NetworkError,
    /// The RPC endpoint answered with an error.
    RpcError,
    /// The wallet session is missing or disconnected.
    WalletConnectionError,
    /// The contract rejected the call.
    ContractError,
    /// The request failed input validation.
    ValidationError,
    /// The backend is rate limiting the client.
    RateLimited,
    /// Transient internal error raised by the pairing library during its own
    /// session cleanup; not indicative of a functional failure.
    WalletconnectInternalError,
    /// Fallback for anything the taxonomy does not recognize.
    UnknownError,
}

impl ErrorCode {
    /// Returns the stable string form of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserRejected => "USER_REJECTED",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::GasEstimationFailed => "GAS_ESTIMATION_FAILED",
            Self::GasPriceTooLow => "GAS_PRICE_TOO_LOW",
            Self::NonceTooLow => "NONCE_TOO_LOW",
            Self::NetworkError => "NETWORK_ERROR",
            Self::RpcError => "RPC_ERROR",
            Self::WalletConnectionError => "WALLET_CONNECTION_ERROR",
            Self::ContractError => "CONTRACT_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::RateLimited => "RATE_LIMITED",
            Self::WalletconnectInternalError => "WALLETCONNECT_INTERNAL_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity of a classified error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational; no user action required.
    Low,
    /// Noticeable but usually self-healing.
    Medium,
    /// The operation failed and will not succeed without a change.
    High,
    /// The application is in a broken state.
    Critical,
}

/// Functional area a classified error belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Connectivity and RPC transport.
    Network,
    /// Wallet session and signing.
    Wallet,
    /// Transaction construction and execution.
    Transaction,
    /// Input validation.
    Validation,
    /// Everything else, including pairing-library internals.
    System,
}

/// A classified error: the stable code plus the fixed attributes baked into
/// the taxonomy for that code.
///
/// Derived deterministically from a [`RawError`]; never mutated after
/// creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Stable taxonomy key.
    pub code: ErrorCode,
    /// The raw message the classification was derived from.
    pub message: String,
    /// Human-facing message suitable for display.
    pub user_message: String,
    /// Severity of the error.
    pub severity: Severity,
    /// Whether the condition can clear up without a code or input change.
    pub recoverable: bool,
    /// Functional area the error belongs to.
    pub category: Category,
}

impl std::fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorDetails {}

/// Fixed `(severity, recoverable, category, user_message)` tuple for a code.
fn profile(code: ErrorCode) -> (Severity, bool, Category, &'static str) {
    match code {
        ErrorCode::UserRejected => (
            Severity::Low,
            true,
            Category::Wallet,
            "Transaction was rejected in your wallet.",
        ),
        ErrorCode::InsufficientFunds => (
            Severity::High,
            false,
            Category::Transaction,
            "Insufficient funds to complete this transaction.",
        ),
        ErrorCode::GasEstimationFailed => (
            Severity::Medium,
            true,
            Category::Transaction,
            "Unable to estimate gas for this transaction. It may fail if submitted.",
        ),
        ErrorCode::GasPriceTooLow => (
            Severity::Low,
            true,
            Category::Transaction,
            "Gas price is too low for current network conditions.",
        ),
        ErrorCode::NonceTooLow => (
            Severity::Medium,
            true,
            Category::Transaction,
            "Transaction nonce is out of date. Please try again.",
        ),
        ErrorCode::NetworkError => (
            Severity::Medium,
            true,
            Category::Network,
            "Network connection problem. Retrying automatically.",
        ),
        ErrorCode::RpcError => (
            Severity::Medium,
            true,
            Category::Network,
            "The RPC endpoint returned an error. Retrying automatically.",
        ),
        ErrorCode::WalletConnectionError => (
            Severity::Medium,
            true,
            Category::Wallet,
            "Wallet connection lost. Please reconnect your wallet.",
        ),
        ErrorCode::ContractError => (
            Severity::High,
            false,
            Category::Transaction,
            "The transaction was rejected by the contract.",
        ),
        ErrorCode::ValidationError => (
            Severity::Medium,
            false,
            Category::Validation,
            "The request failed validation. Please check the inputs.",
        ),
        ErrorCode::RateLimited => (
            Severity::Low,
            true,
            Category::Network,
            "Too many requests. Slowing down automatically.",
        ),
        ErrorCode::WalletconnectInternalError => (
            Severity::Low,
            true,
            Category::System,
            "A transient wallet-pairing hiccup occurred. No action is needed.",
        ),
        ErrorCode::UnknownError => (
            Severity::Medium,
            true,
            Category::System,
            "An unexpected error occurred. Please try again.",
        ),
    }
}

/// Returns true when any pattern is a substring of `haystack`.
///
/// `haystack` must already be lower-cased; patterns are stored lower-cased.
fn contains_any(haystack: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| haystack.contains(p))
}

/// Message patterns for the pairing library's internal cleanup errors.
const PAIRING_INTERNAL_MESSAGES: &[&str] = &[
    "no matching key",
    "session topic doesn't exist",
    "pairing topic doesn't exist",
    "session or pairing topic",
    "expirer: expired",
    "missing or invalid. record:",
];

/// Stack frame names that identify the pairing library's validation path.
const PAIRING_INTERNAL_FRAMES: &[&str] = &[
    "isvalidsessionorpairingtopic",
    "isvaliddisconnect",
    "onsessiondeleterequest",
    "deletepairing",
    "onrelayeventrequest",
];

/// Determines the taxonomy code for a lowered message and optional lowered
/// stack. Checks run in fixed priority order; the first match wins.
fn code_for(message: &str, stack: Option<&str>) -> ErrorCode {
    if contains_any(
        message,
        &[
            "user rejected",
            "user denied",
            "rejected by user",
            "user cancelled",
            "user canceled",
            "request rejected",
        ],
    ) {
        return ErrorCode::UserRejected;
    }
    if contains_any(
        message,
        &["insufficient funds", "insufficient balance", "exceeds balance"],
    ) {
        return ErrorCode::InsufficientFunds;
    }
    if contains_any(
        message,
        &[
            "cannot estimate gas",
            "gas required exceeds allowance",
            "gas estimation failed",
            "eth_estimategas",
        ],
    ) {
        return ErrorCode::GasEstimationFailed;
    }
    if contains_any(
        message,
        &[
            "gas price too low",
            "transaction underpriced",
            "replacement transaction underpriced",
            "max fee per gas less than block base fee",
        ],
    ) {
        return ErrorCode::GasPriceTooLow;
    }
    if contains_any(
        message,
        &["nonce too low", "invalid nonce", "nonce has already been used"],
    ) {
        return ErrorCode::NonceTooLow;
    }
    if contains_any(
        message,
        &[
            "network",
            "timeout",
            "timed out",
            "econnreset",
            "econnrefused",
            "fetch failed",
            "failed to fetch",
            "socket hang up",
        ],
    ) {
        return ErrorCode::NetworkError;
    }
    if contains_any(
        message,
        &[
            "internal json-rpc error",
            "json-rpc",
            "jsonrpc",
            "rpc error",
            "missing response",
            "bad response",
        ],
    ) {
        return ErrorCode::RpcError;
    }
    if contains_any(
        message,
        &[
            "wallet not connected",
            "wallet connection",
            "no wallet",
            "connector not connected",
            "session disconnected",
            "please connect your wallet",
        ],
    ) {
        return ErrorCode::WalletConnectionError;
    }
    if contains_any(
        message,
        &["execution reverted", "revert", "call exception", "safe transaction failed"],
    ) {
        return ErrorCode::ContractError;
    }
    if contains_any(
        message,
        &[
            "invalid address",
            "invalid argument",
            "invalid params",
            "invalid parameters",
            "validation failed",
            "bad checksum",
        ],
    ) {
        return ErrorCode::ValidationError;
    }
    if contains_any(message, &["rate limit", "too many requests", "429"]) {
        return ErrorCode::RateLimited;
    }
    if contains_any(message, PAIRING_INTERNAL_MESSAGES)
        || stack.is_some_and(|s| contains_any(s, PAIRING_INTERNAL_FRAMES))
    {
        return ErrorCode::WalletconnectInternalError;
    }
    ErrorCode::UnknownError
}

/// Classifies a raw error into the stable taxonomy.
///
/// Total and side-effect-free: every input maps to exactly one
/// [`ErrorDetails`], falling back to [`ErrorCode::UnknownError`] (recoverable,
/// medium severity) when nothing matches.
pub fn classify(raw: &RawError) -> ErrorDetails {
    let message = raw.message.to_lowercase();
    let stack = raw.stack.as_ref().map(|s| s.to_lowercase());
    let code = code_for(&message, stack.as_deref());
    let (severity, recoverable, category, user_message) = profile(code);

    ErrorDetails {
        code,
        message: raw.message.clone(),
        user_message: user_message.to_string(),
        severity,
        recoverable,
        category,
    }
}

/// Returns true when the retry engine may transparently re-run the failed
/// operation.
///
/// Only recoverable, non-critical errors in the fixed auto-retryable set
/// qualify. Note that retrying a `GAS_PRICE_TOO_LOW` failure without bumping
/// the gas price only helps when the network's price estimate itself moves;
/// callers that adjust fee parameters should override the retry condition.
pub fn should_auto_retry(details: &ErrorDetails) -> bool {
    details.recoverable
        && details.severity != Severity::Critical
        && matches!(
            details.code,
            ErrorCode::NetworkError
                | ErrorCode::RpcError
                | ErrorCode::RateLimited
                | ErrorCode::GasPriceTooLow
        )
}

/// Base backoff delay for a code, before the exponential factor and jitter.
fn base_delay(code: ErrorCode) -> Duration {
    let millis = match code {
        ErrorCode::NetworkError => 2_000,
        ErrorCode::RpcError => 3_000,
        ErrorCode::RateLimited => 5_000,
        ErrorCode::GasPriceTooLow => 1_000,
        _ => 2_000,
    };
    Duration::from_millis(millis)
}

/// Computes the backoff delay before retry attempt `attempt` (1-based):
/// `min(base * 2^(attempt-1) + uniform_jitter(0..1000ms), 30s)`.
///
/// Jitter is drawn independently per call; nothing is shared across
/// concurrent callers.
pub fn retry_delay(details: &ErrorDetails, attempt: u32) -> Duration {
    let attempt = attempt.max(1);
    let base = base_delay(details.code);
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt - 1));
    let jitter = Duration::from_millis(rand::rng().random_range(0..JITTER_RANGE_MS));
    (exponential + jitter).min(MAX_RETRY_DELAY)
}
