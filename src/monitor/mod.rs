//! Polling monitor for multi-signature transaction status.
//!
//! A monitor session repeatedly queries a [`StatusSource`] for one
//! transaction, correlated by its safe transaction hash, and reports every
//! observation to a caller-supplied callback. Consecutive failures escalate
//! the polling interval and, once a fixed budget is exhausted, stop the
//! session. Cancellation is cooperative: stopping flips a flag checked at
//! the start of every tick; an in-flight fetch is not aborted, only its
//! continuation is suppressed. Sessions share no mutable state and may run
//! concurrently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::WalletguardError;

/// Upper bound on the escalated polling interval.
const MAX_POLL_BACKOFF: Duration = Duration::from_millis(30_000);

/// Lifecycle stage of a multi-signature transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    /// Collecting confirmations; not yet executable.
    Pending,
    /// Enough confirmations collected; awaiting execution.
    Confirmed,
    /// Executed on chain.
    Executed,
    /// Execution failed.
    Failed,
}

impl StatusKind {
    /// True once the transaction has left the pending stage.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One observation of a transaction's status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatus {
    /// Current lifecycle stage.
    pub status: StatusKind,
    /// Number of owner confirmations collected so far.
    pub confirmations: u32,
    /// Block the transaction was included in, once executed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Gas consumed by execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    /// Effective gas price paid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u128>,
    /// Hash of the on-chain execution transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_tx_hash: Option<String>,
}

impl TransactionStatus {
    /// Creates a pending observation with the given confirmation count.
    pub fn pending(confirmations: u32) -> Self {
        Self {
            status: StatusKind::Pending,
            confirmations,
            block_number: None,
            gas_used: None,
            gas_price: None,
            execution_tx_hash: None,
        }
    }

    /// Creates an executed observation.
    pub fn executed(confirmations: u32, block_number: u64, execution_tx_hash: &str) -> Self {
        Self {
            status: StatusKind::Executed,
            confirmations,
            block_number: Some(block_number),
            gas_used: None,
            gas_price: None,
            execution_tx_hash: Some(execution_tx_hash.to_string()),
        }
    }
}

/// The downstream status service, consumed via a narrow request/response
/// contract.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetches the current status of the transaction identified by
    /// `safe_tx_hash`.
    async fn transaction_status(
        &self,
        safe_tx_hash: &str,
    ) -> Result<TransactionStatus, WalletguardError>;
}

/// Configuration for a monitor session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Interval between polls while the source is healthy.
    /// Default: 5 seconds.
    pub poll_interval: Duration,
    /// Consecutive failures tolerated before the session stops.
    /// Default: 3.
    pub max_consecutive_errors: u32,
    /// When true, the session stops scheduling once the status leaves
    /// pending (the recovery variant). The base variant keeps polling
    /// regardless of status. Default: false.
    pub stop_when_settled: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_consecutive_errors: 3,
            stop_when_settled: false,
        }
    }
}

impl MonitorConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the consecutive-failure budget.
    pub fn with_max_consecutive_errors(mut self, budget: u32) -> Self {
        self.max_consecutive_errors = budget;
        self
    }

    /// Enables or disables stopping once the status settles.
    pub fn with_stop_when_settled(mut self, stop: bool) -> Self {
        self.stop_when_settled = stop;
        self
    }
}

/// Callback invoked with every successful status observation.
pub type StatusCallback = Arc<dyn Fn(&TransactionStatus) + Send + Sync>;

/// Callback invoked with every failed poll.
pub type PollErrorCallback = Arc<dyn Fn(&WalletguardError) + Send + Sync>;

/// Handle owning a running monitor session.
///
/// Dropping the handle does not stop the session; call
/// [`MonitorHandle::stop`].
pub struct MonitorHandle {
    safe_tx_hash: String,
    monitoring: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// The correlation id this session polls for.
    pub fn safe_tx_hash(&self) -> &str {
        &self.safe_tx_hash
    }

    /// Requests a cooperative stop. The flag is checked at the start of
    /// every tick; an in-flight fetch finishes but its continuation is
    /// suppressed.
    pub fn stop(&self) {
        self.monitoring.store(false, Ordering::SeqCst);
    }

    /// True while the session is still polling.
    pub fn is_running(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst) && !self.task.is_finished()
    }

    /// Waits for the session task to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// The polling state machine.
pub struct StatusMonitor;

impl StatusMonitor {
    /// Starts a monitor session for `safe_tx_hash` and returns its handle.
    ///
    /// `on_update` receives every successful observation; `on_error`, when
    /// provided, receives every poll failure. Each session escalates its
    /// interval by `min(base * 2^(consecutive_errors-1), 30s)` on failures
    /// and stops without further scheduling once the failure budget is
    /// exhausted.
    pub fn spawn(
        source: Arc<dyn StatusSource>,
        safe_tx_hash: impl Into<String>,
        config: MonitorConfig,
        on_update: StatusCallback,
        on_error: Option<PollErrorCallback>,
    ) -> MonitorHandle {
        let safe_tx_hash = safe_tx_hash.into();
        let monitoring = Arc::new(AtomicBool::new(true));

        let hash = safe_tx_hash.clone();
        let flag = Arc::clone(&monitoring);
        let task = tokio::spawn(async move {
            let mut consecutive_errors: u32 = 0;

            loop {
                if !flag.load(Ordering::SeqCst) {
                    break;
                }

                let delay = match source.transaction_status(&hash).await {
                    Ok(status) => {
                        consecutive_errors = 0;
                        on_update(&status);
                        if config.stop_when_settled && status.status.is_settled() {
                            tracing::debug!(
                                target: "walletguard::monitor",
                                safe_tx_hash = %hash,
                                status = ?status.status,
                                "transaction settled; stopping monitor"
                            );
                            break;
                        }
                        config.poll_interval
                    }
                    Err(err) => {
                        consecutive_errors += 1;
                        if let Some(cb) = &on_error {
                            cb(&err);
                        }
                        if consecutive_errors >= config.max_consecutive_errors {
                            tracing::warn!(
                                target: "walletguard::monitor",
                                safe_tx_hash = %hash,
                                failures = consecutive_errors,
                                "failure budget exhausted; stopping monitor"
                            );
                            break;
                        }
                        escalated_interval(config.poll_interval, consecutive_errors)
                    }
                };

                tokio::time::sleep(delay).await;
            }

            flag.store(false, Ordering::SeqCst);
        });

        MonitorHandle {
            safe_tx_hash,
            monitoring,
            task,
        }
    }
}

/// Escalated interval after `consecutive_errors` failures (1-based):
/// `min(base * 2^(consecutive_errors-1), 30s)`.
fn escalated_interval(base: Duration, consecutive_errors: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(consecutive_errors.saturating_sub(1)))
        .min(MAX_POLL_BACKOFF)
}
