//! Best-effort guarding of pairing-library validator objects.
//!
//! Some pairing libraries throw from their own validation methods before
//! any logging or hook path is reached. This module wraps such objects so
//! that a thrown error matching a suppression rule becomes a safe default
//! value instead of propagating, while non-matching errors are re-thrown
//! unchanged. The wrap targets a strict allow-list of method names and runs
//! as a bounded discovery pass over a registry of known locations; it is a
//! mitigation, not a guarantee.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use super::activator::SuppressionCore;
use crate::error::RawError;

/// The only method names the patcher will ever guard.
pub const PATCHABLE_METHODS: [&str; 3] =
    ["isValidSessionOrPairingTopic", "isValidDisconnect", "getData"];

/// A pairing-library object exposing the recognizable validation methods.
///
/// Implemented by the transport layer as a thin shim over the third-party
/// session object; the resilience layer only ever sees this trait.
pub trait SessionValidator: Send + Sync {
    /// Predicate: is the topic a live session or pairing topic?
    fn is_valid_session_or_pairing_topic(&self, topic: &str) -> Result<bool, RawError>;

    /// Predicate: may the session be disconnected?
    fn is_valid_disconnect(&self, topic: &str) -> Result<bool, RawError>;

    /// Data accessor for the record stored under a topic.
    fn get_data(&self, topic: &str) -> Result<Value, RawError>;
}

/// Wraps a validator so rule-matching errors collapse to safe defaults:
/// `false` for the predicate methods, `Value::Null` for the data accessor.
/// Non-matching errors propagate unchanged.
pub struct GuardedValidator {
    inner: Arc<dyn SessionValidator>,
    core: Arc<SuppressionCore>,
}

impl GuardedValidator {
    pub(crate) fn wrap(inner: Arc<dyn SessionValidator>, core: Arc<SuppressionCore>) -> Self {
        Self { inner, core }
    }

    /// Wraps a validator using the given suppressor's rule table.
    pub fn new(inner: Arc<dyn SessionValidator>, suppressor: &super::Suppressor) -> Self {
        Self::wrap(inner, suppressor.core())
    }

    fn absorb(&self, err: &RawError, method: &str) -> bool {
        if !self.core.matches(err) {
            return false;
        }
        if self.core.is_active() {
            self.core.record_suppressed(err);
        }
        tracing::debug!(
            target: "walletguard::patcher",
            method,
            message = %err.message,
            "guarded validator returned safe default"
        );
        true
    }
}

impl SessionValidator for GuardedValidator {
    fn is_valid_session_or_pairing_topic(&self, topic: &str) -> Result<bool, RawError> {
        match self.inner.is_valid_session_or_pairing_topic(topic) {
            Err(err) if self.absorb(&err, "isValidSessionOrPairingTopic") => Ok(false),
            other => other,
        }
    }

    fn is_valid_disconnect(&self, topic: &str) -> Result<bool, RawError> {
        match self.inner.is_valid_disconnect(topic) {
            Err(err) if self.absorb(&err, "isValidDisconnect") => Ok(false),
            other => other,
        }
    }

    fn get_data(&self, topic: &str) -> Result<Value, RawError> {
        match self.inner.get_data(topic) {
            Err(err) if self.absorb(&err, "getData") => Ok(Value::Null),
            other => other,
        }
    }
}

struct Slot {
    location: String,
    validator: Arc<dyn SessionValidator>,
    guarded: bool,
}

/// The bounded set of globally reachable locations the discovery pass scans.
///
/// The transport layer registers candidate validators under a location key
/// as they become reachable; consumers always fetch the current validator
/// through the registry so a guard swap is transparent to them.
#[derive(Default)]
pub struct ValidatorRegistry {
    slots: Mutex<Vec<Slot>>,
}

impl ValidatorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a candidate validator under a location key. Re-registering
    /// a location replaces the previous candidate unguarded.
    pub fn register(&self, location: impl Into<String>, validator: Arc<dyn SessionValidator>) {
        let location = location.into();
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.iter_mut().find(|s| s.location == location) {
            slot.validator = validator;
            slot.guarded = false;
        } else {
            slots.push(Slot {
                location,
                validator,
                guarded: false,
            });
        }
    }

    /// Returns the current validator for a location, guarded or not.
    pub fn validator(&self, location: &str) -> Option<Arc<dyn SessionValidator>> {
        self.slots
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.location == location)
            .map(|s| Arc::clone(&s.validator))
    }

    /// Number of registered locations.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    /// True when no location is registered.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().unwrap().is_empty()
    }

    /// Number of locations whose validator is currently guarded.
    pub fn guarded_count(&self) -> usize {
        self.slots.lock().unwrap().iter().filter(|s| s.guarded).count()
    }

    /// Guards every currently-unguarded slot. Returns how many were guarded.
    pub(crate) fn guard_pending(&self, core: &Arc<SuppressionCore>) -> usize {
        let mut slots = self.slots.lock().unwrap();
        let mut guarded = 0;
        for slot in slots.iter_mut().filter(|s| !s.guarded) {
            let wrapped = GuardedValidator::wrap(Arc::clone(&slot.validator), Arc::clone(core));
            slot.validator = Arc::new(wrapped);
            slot.guarded = true;
            guarded += 1;
            tracing::debug!(
                target: "walletguard::patcher",
                location = %slot.location,
                methods = ?PATCHABLE_METHODS,
                "guarded validator"
            );
        }
        guarded
    }
}

/// The bounded discovery pass started on suppression activation.
///
/// Scans the registry on a fixed short interval and guards what it finds,
/// stopping as soon as at least one object was guarded, when the stop flag
/// flips, or when the timeout elapses, whichever comes first.
pub(crate) async fn run_discovery(
    registry: Arc<ValidatorRegistry>,
    core: Arc<SuppressionCore>,
    interval: Duration,
    timeout: Duration,
    stop: Arc<AtomicBool>,
) {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut guarded_total = 0;

    loop {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        guarded_total += registry.guard_pending(&core);
        if guarded_total > 0 {
            tracing::debug!(
                target: "walletguard::patcher",
                guarded = guarded_total,
                "validator discovery complete"
            );
            break;
        }
        if tokio::time::Instant::now() + interval > deadline {
            tracing::debug!(target: "walletguard::patcher", "validator discovery timed out");
            break;
        }
        tokio::time::sleep(interval).await;
    }
}
