//! Walletguard - error resilience for multi-signature wallet clients.
//!
//! Wallet clients that pair over a WalletConnect-style relay see a steady
//! stream of raw failures: user rejections, RPC flakiness, contract reverts,
//! and a class of internally-recoverable errors the pairing library throws
//! during its own session teardown. This crate turns that stream into
//! something a client can act on:
//!
//! - [`error`] classifies raw errors into a closed taxonomy of stable codes
//!   with fixed severity, category, and retry attributes.
//! - [`suppression`] identifies known-benign pairing-teardown errors by
//!   pattern, absorbs them at the platform's reporting entry points while
//!   active, and best-effort guards the pairing library's validation
//!   methods so they stop throwing in the first place.
//! - [`retry`] re-runs failed operations with per-code capped exponential
//!   backoff and jitter.
//! - [`monitor`] polls transaction status until settlement, escalating its
//!   interval while the status source is down.
//! - [`notification`] routes classified errors to an injected toast
//!   capability, choosing the channel by severity.
//! - [`logging`] installs an optional stderr diagnostic subscriber.

pub mod error;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod retry;
pub mod suppression;

pub use error::{
    classify, retry_delay, should_auto_retry, Category, ErrorCode, ErrorDetails, RawError,
    Severity, WalletguardError,
};
pub use monitor::{
    MonitorConfig, MonitorHandle, StatusKind, StatusMonitor, StatusSource, TransactionStatus,
};
pub use notification::{ErrorNotifier, ToastOptions, ToastSink};
pub use retry::{retry, RetryPolicy};
pub use suppression::{
    RuleSet, SuppressionRule, SuppressionStats, Suppressor, SuppressorConfig, ValidatorRegistry,
};
