//! Integration tests for the error resilience layer.
//!
//! These tests exercise the crate end-to-end the way a wallet client would
//! wire it: classify raw failures, suppress pairing-teardown noise at the
//! reporting entry points, guard validator objects, retry transient
//! failures, and monitor transaction status through outages.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use walletguard::error::WalletguardError;
use walletguard::monitor::StatusSource;
use walletguard::notification::{ErrorNotifier, ToastOptions, ToastSink};
use walletguard::suppression::{
    CrashHook, LogSink, RuleSeverity, SessionValidator, SuppressionRule, ValidatorRegistry,
};
use walletguard::{
    classify, retry, should_auto_retry, ErrorCode, MonitorConfig, RawError, RetryPolicy, Severity,
    StatusKind, StatusMonitor, Suppressor, SuppressorConfig, TransactionStatus,
};

// ============================================================================
// Shared test doubles
// ============================================================================

#[derive(Default)]
struct RecordingSink {
    errors: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
}

impl LogSink for RecordingSink {
    fn error(&self, raw: &RawError) {
        self.errors.lock().unwrap().push(raw.message.clone());
    }

    fn warn(&self, raw: &RawError) {
        self.warnings.lock().unwrap().push(raw.message.clone());
    }
}

#[derive(Default)]
struct RecordingHook {
    uncaught: Mutex<Vec<String>>,
}

impl CrashHook for RecordingHook {
    fn on_uncaught(&self, raw: &RawError) -> bool {
        self.uncaught.lock().unwrap().push(raw.message.clone());
        false
    }

    fn on_unhandled_rejection(&self, raw: &RawError) -> bool {
        self.uncaught.lock().unwrap().push(raw.message.clone());
        false
    }
}

struct FailingValidator {
    message: String,
}

impl SessionValidator for FailingValidator {
    fn is_valid_session_or_pairing_topic(&self, _topic: &str) -> Result<bool, RawError> {
        Err(RawError::new(self.message.clone()))
    }

    fn is_valid_disconnect(&self, _topic: &str) -> Result<bool, RawError> {
        Err(RawError::new(self.message.clone()))
    }

    fn get_data(&self, _topic: &str) -> Result<Value, RawError> {
        Err(RawError::new(self.message.clone()))
    }
}

fn production_suppressor() -> (Arc<Suppressor>, Arc<RecordingSink>, Arc<RecordingHook>) {
    let sink = Arc::new(RecordingSink::default());
    let hook = Arc::new(RecordingHook::default());
    let suppressor = Arc::new(
        Suppressor::with_config(SuppressorConfig::new().with_production(true))
            .with_hooks(sink.clone(), hook.clone()),
    );
    (suppressor, sink, hook)
}

// ============================================================================
// Classification Drives Retry Decisions
// ============================================================================

#[test]
fn test_classification_feeds_retry_decision() {
    let transient = classify(&RawError::new("network timeout while fetching"));
    assert_eq!(transient.code, ErrorCode::NetworkError);
    assert!(should_auto_retry(&transient));

    let permanent = classify(&RawError::new("execution reverted: GS026"));
    assert_eq!(permanent.code, ErrorCode::ContractError);
    assert_eq!(permanent.severity, Severity::High);
    assert!(!should_auto_retry(&permanent));
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_from_transient_relay_outage() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::new(3);

    let result = retry(
        |_attempt| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err("ECONNRESET".to_string())
                } else {
                    Ok("0xexec")
                }
            }
        },
        &policy,
    )
    .await;

    assert_eq!(result, Ok("0xexec"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_gives_up_immediately_on_user_rejection() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::new(5);

    let result: Result<(), String> = retry(
        |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("User rejected transaction".to_string()) }
        },
        &policy,
    )
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Suppression Lifecycle Against the Teardown Corpus
// ============================================================================

#[test]
fn test_full_suppression_lifecycle() {
    let (suppressor, sink, _) = production_suppressor();

    // Inactive: everything flows through untouched.
    suppressor.log_error(&RawError::new("No matching key. session: early"));
    assert_eq!(sink.errors.lock().unwrap().len(), 1);

    suppressor.activate();
    let corpus = [
        "No matching key. session or pairing topic doesn't exist: abc123",
        "User rejected transaction",
        "No matching key. session: def456",
        "Network connection failed",
        "session or pairing topic doesn't exist",
        "Invalid session topic",
    ];
    for msg in corpus {
        suppressor.log_error(&RawError::new(msg));
    }
    assert_eq!(suppressor.stats().suppressed_count, 4);
    // One pre-activation forward plus the two real failures.
    assert_eq!(sink.errors.lock().unwrap().len(), 3);

    suppressor.deactivate();
    suppressor.log_error(&RawError::new("No matching key. session: late"));
    assert_eq!(suppressor.stats().suppressed_count, 4);
    assert_eq!(sink.errors.lock().unwrap().len(), 4);
}

#[test]
fn test_crash_hooks_report_suppressed_errors_as_handled() {
    let (suppressor, _, hook) = production_suppressor();
    suppressor.activate();

    assert!(suppressor.handle_uncaught(&RawError::new("expirer: expired. topic: t")));
    assert!(suppressor.handle_rejection(&RawError::new("Invalid pairing topic")));
    assert!(!suppressor.handle_uncaught(&RawError::new("insufficient funds")));

    assert_eq!(hook.uncaught.lock().unwrap().as_slice(), ["insufficient funds"]);
    assert_eq!(suppressor.stats().suppressed_count, 2);
}

#[test]
fn test_runtime_rule_extends_suppression_everywhere() {
    let (suppressor, sink, _) = production_suppressor();
    suppressor.activate();

    suppressor.log_error(&RawError::new("relay heartbeat skipped"));
    assert_eq!(sink.errors.lock().unwrap().len(), 1);

    suppressor.add_rule(SuppressionRule::new(
        ["relay heartbeat skipped"],
        "benign during relay failover",
        RuleSeverity::Low,
    ));
    suppressor.log_error(&RawError::new("Relay heartbeat skipped twice"));
    assert_eq!(sink.errors.lock().unwrap().len(), 1);
    assert_eq!(suppressor.stats().suppressed_count, 1);
}

// ============================================================================
// Validator Guarding Through Activation
// ============================================================================

#[tokio::test]
async fn test_activation_guards_registered_validators() {
    let registry = Arc::new(ValidatorRegistry::new());
    registry.register(
        "sign_client",
        Arc::new(FailingValidator {
            message: "No matching key. session: abc".to_string(),
        }),
    );

    let suppressor = Suppressor::with_config(
        SuppressorConfig::new()
            .with_production(true)
            .with_discovery_interval(Duration::from_millis(5))
            .with_discovery_timeout(Duration::from_millis(500)),
    )
    .with_registry(Arc::clone(&registry));

    suppressor.activate();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(registry.guarded_count(), 1);
    let validator = registry.validator("sign_client").unwrap();
    // Rule-matching throws collapse to safe defaults.
    assert_eq!(validator.is_valid_session_or_pairing_topic("t"), Ok(false));
    assert_eq!(validator.is_valid_disconnect("t"), Ok(false));
    assert_eq!(validator.get_data("t"), Ok(Value::Null));

    suppressor.deactivate();
}

#[tokio::test]
async fn test_guarded_validator_rethrows_real_failures() {
    let registry = Arc::new(ValidatorRegistry::new());
    registry.register(
        "sign_client",
        Arc::new(FailingValidator {
            message: "keystore corrupted".to_string(),
        }),
    );

    let suppressor = Suppressor::with_config(
        SuppressorConfig::new()
            .with_production(true)
            .with_discovery_interval(Duration::from_millis(5)),
    )
    .with_registry(Arc::clone(&registry));

    suppressor.activate();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let validator = registry.validator("sign_client").unwrap();
    let err = validator.get_data("t").unwrap_err();
    assert_eq!(err.message, "keystore corrupted");

    suppressor.deactivate();
}

// ============================================================================
// Notifier Routing with Suppression Wired In
// ============================================================================

#[derive(Default)]
struct RecordingToasts {
    warnings: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl ToastSink for RecordingToasts {
    fn warning(&self, title: &str, _options: &ToastOptions) {
        self.warnings.lock().unwrap().push(title.to_string());
    }

    fn error(&self, title: &str, _options: &ToastOptions) {
        self.errors.lock().unwrap().push(title.to_string());
    }
}

#[test]
fn test_notifier_routes_by_severity_and_skips_suppressed() {
    let toasts = Arc::new(RecordingToasts::default());
    let (suppressor, _, _) = production_suppressor();
    let notifier = ErrorNotifier::new(toasts.clone()).with_suppressor(suppressor);

    // Suppressed teardown noise: nothing shown.
    assert!(notifier
        .notify(&RawError::new("No matching key. session: abc"))
        .is_none());

    // Transient network trouble: warning channel.
    let details = notifier.notify(&RawError::new("network timeout")).unwrap();
    assert_eq!(details.code, ErrorCode::NetworkError);

    // Permanent failure: error channel.
    notifier.notify(&RawError::new("insufficient funds"));

    assert_eq!(toasts.warnings.lock().unwrap().as_slice(), ["Network issue"]);
    assert_eq!(
        toasts.errors.lock().unwrap().as_slice(),
        ["Transaction issue"]
    );
}

// ============================================================================
// Status Monitoring Through an Outage
// ============================================================================

struct OutageThenRecovery {
    calls: AtomicU32,
}

#[async_trait]
impl StatusSource for OutageThenRecovery {
    async fn transaction_status(
        &self,
        _safe_tx_hash: &str,
    ) -> Result<TransactionStatus, WalletguardError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match n {
            1 => Ok(TransactionStatus::pending(1)),
            2 | 3 => Err(WalletguardError::Network("relay outage".to_string())),
            _ => Ok(TransactionStatus::executed(2, 19_000_000, "0xexec")),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_monitor_rides_out_an_outage_and_reports_settlement() {
    let source = Arc::new(OutageThenRecovery {
        calls: AtomicU32::new(0),
    });
    let observed = Arc::new(Mutex::new(Vec::new()));
    let poll_errors = Arc::new(AtomicU32::new(0));

    let observed_cb = Arc::clone(&observed);
    let errors_cb = Arc::clone(&poll_errors);
    let handle = StatusMonitor::spawn(
        source,
        "0xsafetx",
        MonitorConfig::new()
            .with_poll_interval(Duration::from_millis(10))
            .with_stop_when_settled(true),
        Arc::new(move |status| {
            observed_cb.lock().unwrap().push(status.status);
        }),
        Some(Arc::new(move |_| {
            errors_cb.fetch_add(1, Ordering::SeqCst);
        })),
    );

    handle.join().await;
    assert_eq!(
        observed.lock().unwrap().as_slice(),
        [StatusKind::Pending, StatusKind::Executed]
    );
    // Two failed polls inside the budget, then recovery.
    assert_eq!(poll_errors.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_stops_after_sustained_outage() {
    struct AlwaysDown;

    #[async_trait]
    impl StatusSource for AlwaysDown {
        async fn transaction_status(
            &self,
            _safe_tx_hash: &str,
        ) -> Result<TransactionStatus, WalletguardError> {
            Err(WalletguardError::Network("relay outage".to_string()))
        }
    }

    let poll_errors = Arc::new(AtomicU32::new(0));
    let errors_cb = Arc::clone(&poll_errors);
    let handle = StatusMonitor::spawn(
        Arc::new(AlwaysDown),
        "0xsafetx",
        MonitorConfig::new().with_poll_interval(Duration::from_millis(10)),
        Arc::new(|_| {}),
        Some(Arc::new(move |_| {
            errors_cb.fetch_add(1, Ordering::SeqCst);
        })),
    );

    assert!(handle.is_running());
    handle.join().await;
    assert_eq!(poll_errors.load(Ordering::SeqCst), 3);
}

// ============================================================================
// End-to-End: Submit, Retry, Monitor
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_submit_with_retry_then_monitor_to_settlement() {
    // Submission fails once with a transient RPC error, then succeeds.
    let submissions = AtomicU32::new(0);
    let policy = RetryPolicy::new(3);
    let safe_tx_hash = retry(
        |_attempt| {
            let n = submissions.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    Err("Internal JSON-RPC error.".to_string())
                } else {
                    Ok("0xsafetx".to_string())
                }
            }
        },
        &policy,
    )
    .await
    .expect("submission should succeed on retry");

    let source = Arc::new(OutageThenRecovery {
        calls: AtomicU32::new(3),
    });
    let settled = Arc::new(Mutex::new(None));
    let settled_cb = Arc::clone(&settled);
    let handle = StatusMonitor::spawn(
        source,
        safe_tx_hash,
        MonitorConfig::new()
            .with_poll_interval(Duration::from_millis(10))
            .with_stop_when_settled(true),
        Arc::new(move |status| {
            *settled_cb.lock().unwrap() = Some(status.clone());
        }),
        None,
    );

    handle.join().await;
    let status = settled.lock().unwrap().clone().unwrap();
    assert_eq!(status.status, StatusKind::Executed);
    assert_eq!(status.execution_tx_hash.as_deref(), Some("0xexec"));
}
