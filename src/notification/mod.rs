//! Toast notification capability and the classified-error notifier.
//!
//! The resilience layer never renders UI. User-relevant errors are routed
//! through an injected [`ToastSink`] capability; which channel is used and
//! what text is shown is decided by the error's classification, never by
//! raw message text.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{classify, Category, ErrorDetails, RawError, Severity};
use crate::suppression::Suppressor;

/// Display options accompanying a toast title.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToastOptions {
    /// Longer human-facing description shown under the title.
    pub description: String,
    /// Auto-dismiss delay; `None` keeps the toast until dismissed.
    pub auto_close: Option<Duration>,
}

impl ToastOptions {
    /// Creates options with a description and no auto-close.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            auto_close: None,
        }
    }

    /// Sets the auto-dismiss delay.
    pub fn with_auto_close(mut self, delay: Duration) -> Self {
        self.auto_close = Some(delay);
        self
    }
}

/// The injected toast/notification capability.
pub trait ToastSink: Send + Sync {
    /// Shows a warning-level toast.
    fn warning(&self, title: &str, options: &ToastOptions);
    /// Shows an error-level toast.
    fn error(&self, title: &str, options: &ToastOptions);
}

/// Title shown for a classified error, by functional area.
fn title_for(details: &ErrorDetails) -> &'static str {
    match details.category {
        Category::Network => "Network issue",
        Category::Wallet => "Wallet issue",
        Category::Transaction => "Transaction issue",
        Category::Validation => "Invalid input",
        Category::System => "Unexpected error",
    }
}

/// Routes classified errors to the toast capability.
///
/// When constructed with a suppressor, errors matching a suppression rule
/// produce no toast at all; counting them remains the activator's job.
pub struct ErrorNotifier {
    sink: Arc<dyn ToastSink>,
    suppressor: Option<Arc<Suppressor>>,
    warning_auto_close: Duration,
}

impl ErrorNotifier {
    /// Creates a notifier that shows a toast for every classified error.
    pub fn new(sink: Arc<dyn ToastSink>) -> Self {
        Self {
            sink,
            suppressor: None,
            warning_auto_close: Duration::from_secs(5),
        }
    }

    /// Skips toasts for errors the given suppressor's rules match.
    pub fn with_suppressor(mut self, suppressor: Arc<Suppressor>) -> Self {
        self.suppressor = Some(suppressor);
        self
    }

    /// Sets the auto-dismiss delay used for warning toasts.
    pub fn with_warning_auto_close(mut self, delay: Duration) -> Self {
        self.warning_auto_close = delay;
        self
    }

    /// Classifies the error and, unless it is suppressed, shows a toast:
    /// low/medium severities use the warning channel with auto-close,
    /// high/critical use the error channel and stay until dismissed.
    ///
    /// Returns the classification for callers chaining retry decisions, or
    /// `None` when the error was suppressed.
    pub fn notify(&self, raw: &RawError) -> Option<ErrorDetails> {
        if let Some(suppressor) = &self.suppressor {
            if suppressor.is_suppressed(raw) {
                tracing::debug!(
                    target: "walletguard::notification",
                    message = %raw.message,
                    "suppressed error; no toast shown"
                );
                return None;
            }
        }

        let details = classify(raw);
        let options = ToastOptions::new(details.user_message.clone());
        match details.severity {
            Severity::Low | Severity::Medium => self.sink.warning(
                title_for(&details),
                &options.with_auto_close(self.warning_auto_close),
            ),
            Severity::High | Severity::Critical => {
                self.sink.error(title_for(&details), &options);
            }
        }
        Some(details)
    }
}
