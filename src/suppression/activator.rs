//! Suppression activator: rewires platform error-reporting entry points.
//!
//! The [`Suppressor`] is an explicit context object holding the four
//! reporting entry points the host routes its errors through: the error
//! logging call, the warning logging call, the global uncaught-error hook,
//! and the unhandled-rejection hook. Activation saves the current hooks and
//! installs suppressing wrappers in their place; deactivation restores the
//! saved hooks exactly. A process-wide lazy instance is available through
//! [`Suppressor::global`] for hosts that want ambient wiring.
//!
//! All state mutation happens synchronously within one hook invocation or
//! one `activate`/`deactivate` call; no lock is ever held across an await.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::patcher::{self, ValidatorRegistry};
use super::{RuleSet, SuppressionRule};
use crate::error::RawError;

/// A synchronous logging sink: the error and warning logging entry points.
pub trait LogSink: Send + Sync {
    /// Reports an error-level event.
    fn error(&self, raw: &RawError);
    /// Reports a warning-level event.
    fn warn(&self, raw: &RawError);
}

/// The global crash-reporting entry points.
///
/// Both methods return `true` when the error was handled, which tells the
/// platform to skip its default crash-style presentation.
pub trait CrashHook: Send + Sync {
    /// Invoked for a synchronous uncaught error.
    fn on_uncaught(&self, raw: &RawError) -> bool;
    /// Invoked for an unhandled promise-style rejection.
    fn on_unhandled_rejection(&self, raw: &RawError) -> bool;
}

/// Default sink that forwards to `tracing`.
struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn error(&self, raw: &RawError) {
        tracing::error!(target: "walletguard", message = %raw.message, "error");
    }

    fn warn(&self, raw: &RawError) {
        tracing::warn!(target: "walletguard", message = %raw.message, "warning");
    }
}

/// Default crash hook: logs and reports the error as unhandled.
struct TracingCrashHook;

impl CrashHook for TracingCrashHook {
    fn on_uncaught(&self, raw: &RawError) -> bool {
        tracing::error!(target: "walletguard", message = %raw.message, "uncaught error");
        false
    }

    fn on_unhandled_rejection(&self, raw: &RawError) -> bool {
        tracing::error!(target: "walletguard", message = %raw.message, "unhandled rejection");
        false
    }
}

/// Configuration for a [`Suppressor`].
#[derive(Clone, Debug)]
pub struct SuppressorConfig {
    /// When true, suppressed errors are not mirrored at debug level.
    /// Defaults to true in release builds.
    pub production: bool,
    /// Interval between validator discovery scans.
    pub discovery_interval: Duration,
    /// Total budget for the discovery pass.
    pub discovery_timeout: Duration,
}

impl Default for SuppressorConfig {
    fn default() -> Self {
        Self {
            production: cfg!(not(debug_assertions)),
            discovery_interval: Duration::from_millis(500),
            discovery_timeout: Duration::from_secs(10),
        }
    }
}

impl SuppressorConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets production mode (disables debug mirroring of suppressed errors).
    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    /// Sets the discovery scan interval.
    pub fn with_discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = interval;
        self
    }

    /// Sets the discovery timeout.
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }
}

/// Snapshot of suppression activity, safe to take at any time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionStats {
    /// Number of errors absorbed since construction or the last reset.
    pub suppressed_count: u64,
    /// Whether the wrappers are currently installed.
    pub is_active: bool,
    /// Number of rules in the table.
    pub rule_count: usize,
}

/// Shared matching state referenced by the suppressor and its wrappers.
pub(crate) struct SuppressionCore {
    rules: RwLock<RuleSet>,
    suppressed_count: AtomicU64,
    active: AtomicBool,
    production: bool,
}

impl SuppressionCore {
    fn new(rules: RuleSet, production: bool) -> Self {
        Self {
            rules: RwLock::new(rules),
            suppressed_count: AtomicU64::new(0),
            active: AtomicBool::new(false),
            production,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn matches(&self, raw: &RawError) -> bool {
        self.rules.read().unwrap().matches(raw)
    }

    pub(crate) fn record_suppressed(&self, raw: &RawError) {
        self.suppressed_count.fetch_add(1, Ordering::SeqCst);
        if !self.production {
            tracing::debug!(
                target: "walletguard::suppression",
                message = %raw.message,
                "suppressed benign error"
            );
        }
    }
}

/// Evaluates the rule table with the decision path isolated: a panic while
/// deciding yields `None`, which callers treat as "forward the original".
fn decide(core: &SuppressionCore, raw: &RawError) -> Option<bool> {
    catch_unwind(AssertUnwindSafe(|| core.matches(raw))).ok()
}

/// Logging wrapper installed by `activate()`.
///
/// Exactly one of {suppressed, forwarded} happens per call. An internal
/// failure while deciding never loses the original error: it is forwarded
/// and the failure is reported through `tracing` directly, which is the
/// untouched channel, to avoid feedback loops.
struct SuppressingLogSink {
    original: Arc<dyn LogSink>,
    core: Arc<SuppressionCore>,
}

impl LogSink for SuppressingLogSink {
    fn error(&self, raw: &RawError) {
        if !self.core.is_active() {
            self.original.error(raw);
            return;
        }
        match decide(&self.core, raw) {
            Some(true) => self.core.record_suppressed(raw),
            Some(false) => self.original.error(raw),
            None => {
                tracing::error!(
                    target: "walletguard::suppression",
                    "suppression decision failed; forwarding original error"
                );
                self.original.error(raw);
            }
        }
    }

    fn warn(&self, raw: &RawError) {
        if !self.core.is_active() {
            self.original.warn(raw);
            return;
        }
        match decide(&self.core, raw) {
            Some(true) => self.core.record_suppressed(raw),
            Some(false) => self.original.warn(raw),
            None => {
                tracing::error!(
                    target: "walletguard::suppression",
                    "suppression decision failed; forwarding original warning"
                );
                self.original.warn(raw);
            }
        }
    }
}

/// Crash-hook wrapper installed by `activate()`.
struct SuppressingCrashHook {
    original: Arc<dyn CrashHook>,
    core: Arc<SuppressionCore>,
}

impl SuppressingCrashHook {
    fn handle(&self, raw: &RawError, forward: impl FnOnce(&RawError) -> bool) -> bool {
        if !self.core.is_active() {
            return forward(raw);
        }
        match decide(&self.core, raw) {
            Some(true) => {
                self.core.record_suppressed(raw);
                true
            }
            Some(false) => forward(raw),
            None => {
                tracing::error!(
                    target: "walletguard::suppression",
                    "suppression decision failed; forwarding to original hook"
                );
                forward(raw)
            }
        }
    }
}

impl CrashHook for SuppressingCrashHook {
    fn on_uncaught(&self, raw: &RawError) -> bool {
        self.handle(raw, |r| self.original.on_uncaught(r))
    }

    fn on_unhandled_rejection(&self, raw: &RawError) -> bool {
        self.handle(raw, |r| self.original.on_unhandled_rejection(r))
    }
}

struct SavedHooks {
    log: Arc<dyn LogSink>,
    crash: Arc<dyn CrashHook>,
}

struct DiscoveryTask {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Hook slots and activation bookkeeping, mutated only under one mutex.
struct Slots {
    log: Arc<dyn LogSink>,
    crash: Arc<dyn CrashHook>,
    saved: Option<SavedHooks>,
    registry: Option<Arc<ValidatorRegistry>>,
    discovery: Option<DiscoveryTask>,
}

/// The suppression activator.
///
/// States: Inactive (initial) -> Active -> Inactive, re-activatable.
/// `activate()` and `deactivate()` are idempotent; the invariant is that
/// whenever the suppressor is inactive, every hook slot is
/// reference-identical to its pre-activation value.
pub struct Suppressor {
    core: Arc<SuppressionCore>,
    config: SuppressorConfig,
    slots: Mutex<Slots>,
}

impl Default for Suppressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Suppressor {
    /// Creates a suppressor with the default rule table, default config,
    /// and `tracing`-backed hooks.
    pub fn new() -> Self {
        Self::with_config(SuppressorConfig::default())
    }

    /// Creates a suppressor with the default rule table and custom config.
    pub fn with_config(config: SuppressorConfig) -> Self {
        Self {
            core: Arc::new(SuppressionCore::new(RuleSet::new(), config.production)),
            config,
            slots: Mutex::new(Slots {
                log: Arc::new(TracingLogSink),
                crash: Arc::new(TracingCrashHook),
                saved: None,
                registry: None,
                discovery: None,
            }),
        }
    }

    /// Replaces the logging sink and crash hook. Only meaningful before
    /// activation; the replaced hooks become the restoration targets.
    pub fn with_hooks(self, log: Arc<dyn LogSink>, crash: Arc<dyn CrashHook>) -> Self {
        {
            let mut slots = self.slots.lock().unwrap();
            slots.log = log;
            slots.crash = crash;
        }
        self
    }

    /// Attaches the registry scanned by the best-effort validator discovery
    /// pass started on activation.
    pub fn with_registry(self, registry: Arc<ValidatorRegistry>) -> Self {
        {
            let mut slots = self.slots.lock().unwrap();
            slots.registry = Some(registry);
        }
        self
    }

    /// Returns the process-wide lazily-constructed instance.
    pub fn global() -> &'static Suppressor {
        static GLOBAL: OnceLock<Suppressor> = OnceLock::new();
        GLOBAL.get_or_init(Suppressor::new)
    }

    pub(crate) fn core(&self) -> Arc<SuppressionCore> {
        Arc::clone(&self.core)
    }

    /// Activates suppression.
    ///
    /// Saves the current hooks and installs the suppressing wrappers, all
    /// synchronously under one lock so no error can observe a partially
    /// installed hook set, then starts the bounded validator discovery task
    /// when a registry is attached and an async runtime is available.
    /// Idempotent: a second call is a no-op and the banner is logged once.
    pub fn activate(&self) {
        let mut slots = self.slots.lock().unwrap();
        if self.core.is_active() {
            tracing::debug!("error suppression already active");
            return;
        }

        let saved = SavedHooks {
            log: Arc::clone(&slots.log),
            crash: Arc::clone(&slots.crash),
        };
        slots.log = Arc::new(SuppressingLogSink {
            original: Arc::clone(&saved.log),
            core: Arc::clone(&self.core),
        });
        slots.crash = Arc::new(SuppressingCrashHook {
            original: Arc::clone(&saved.crash),
            core: Arc::clone(&self.core),
        });
        slots.saved = Some(saved);
        self.core.active.store(true, Ordering::SeqCst);
        tracing::info!(
            rules = self.core.rules.read().unwrap().rule_count(),
            "error suppression active"
        );

        if let Some(registry) = slots.registry.clone() {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let stop = Arc::new(AtomicBool::new(false));
                    let handle = runtime.spawn(patcher::run_discovery(
                        registry,
                        Arc::clone(&self.core),
                        self.config.discovery_interval,
                        self.config.discovery_timeout,
                        Arc::clone(&stop),
                    ));
                    slots.discovery = Some(DiscoveryTask { stop, handle });
                }
                Err(_) => {
                    tracing::debug!("no async runtime available; skipping validator discovery");
                }
            }
        }
    }

    /// Deactivates suppression, restoring every saved hook to its exact
    /// pre-activation value and stopping discovery. No-op when inactive.
    pub fn deactivate(&self) {
        let mut slots = self.slots.lock().unwrap();
        if !self.core.is_active() {
            tracing::debug!("error suppression already inactive");
            return;
        }

        if let Some(saved) = slots.saved.take() {
            slots.log = saved.log;
            slots.crash = saved.crash;
        }
        if let Some(task) = slots.discovery.take() {
            task.stop.store(true, Ordering::SeqCst);
            task.handle.abort();
        }
        self.core.active.store(false, Ordering::SeqCst);
        tracing::info!("error suppression deactivated");
    }

    /// Returns true while the wrappers are installed.
    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    /// Reports an error through the current error-logging entry point.
    pub fn log_error(&self, raw: &RawError) {
        let sink = Arc::clone(&self.slots.lock().unwrap().log);
        sink.error(raw);
    }

    /// Reports a warning through the current warning-logging entry point.
    pub fn log_warning(&self, raw: &RawError) {
        let sink = Arc::clone(&self.slots.lock().unwrap().log);
        sink.warn(raw);
    }

    /// Routes an uncaught error through the current hook. Returns true when
    /// the error was handled and the platform's default presentation should
    /// be skipped.
    pub fn handle_uncaught(&self, raw: &RawError) -> bool {
        let hook = Arc::clone(&self.slots.lock().unwrap().crash);
        hook.on_uncaught(raw)
    }

    /// Routes an unhandled rejection through the current hook.
    pub fn handle_rejection(&self, raw: &RawError) -> bool {
        let hook = Arc::clone(&self.slots.lock().unwrap().crash);
        hook.on_unhandled_rejection(raw)
    }

    /// Returns the currently installed logging sink.
    pub fn log_sink(&self) -> Arc<dyn LogSink> {
        Arc::clone(&self.slots.lock().unwrap().log)
    }

    /// Returns the currently installed crash hook.
    pub fn crash_hook(&self) -> Arc<dyn CrashHook> {
        Arc::clone(&self.slots.lock().unwrap().crash)
    }

    /// Read-only check against the rule table; does not count.
    pub fn is_suppressed(&self, raw: &RawError) -> bool {
        self.core.matches(raw)
    }

    /// Appends a rule to the table at runtime.
    pub fn add_rule(&self, rule: SuppressionRule) {
        self.core.rules.write().unwrap().add_rule(rule);
    }

    /// Takes a stats snapshot without side effects.
    pub fn stats(&self) -> SuppressionStats {
        SuppressionStats {
            suppressed_count: self.core.suppressed_count.load(Ordering::SeqCst),
            is_active: self.core.is_active(),
            rule_count: self.core.rules.read().unwrap().rule_count(),
        }
    }

    /// Zeroes the suppressed counter. Independent of activation state.
    pub fn reset_stats(&self) {
        self.core.suppressed_count.store(0, Ordering::SeqCst);
    }
}
