//! Diagnostic logging setup.
//!
//! The crate emits all of its diagnostics through `tracing`; hosts that
//! already install a subscriber can ignore this module entirely. For
//! standalone use, [`init_logging`] installs a stderr subscriber honoring
//! `RUST_LOG` with a programmatic fallback level.

use tracing_subscriber::{fmt, EnvFilter};

/// Fallback log level used when `RUST_LOG` is unset.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogLevel {
    /// Trace level, most verbose.
    Trace,
    /// Debug level.
    Debug,
    /// Info level (default).
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level, least verbose.
    Error,
    /// Disable logging entirely.
    Off,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

/// Configuration for the diagnostic subscriber.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Fallback level when `RUST_LOG` is unset.
    pub level: LogLevel,
    /// Whether to include timestamps.
    pub with_timestamps: bool,
    /// Whether to include the target (module path).
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamps: true,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fallback log level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets whether to include timestamps.
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.with_timestamps = enabled;
        self
    }

    /// Sets whether to include the target (module path).
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }
}

/// Installs a stderr `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Installation is
/// best-effort: when the host application already set a global subscriber
/// this is a no-op, so library and host never fight over the default.
///
/// # Examples
///
/// ```no_run
/// use walletguard::logging::{init_logging, LoggingConfig, LogLevel};
///
/// init_logging(LoggingConfig::new().with_level(LogLevel::Debug));
/// ```
pub fn init_logging(config: LoggingConfig) {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(config.level.as_directive())
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(config.with_target);

    let result = if config.with_timestamps {
        subscriber.try_init()
    } else {
        subscriber.without_time().try_init()
    };
    if result.is_err() {
        tracing::debug!("a global subscriber is already installed; keeping it");
    }
}

/// Initializes logging with default configuration: info level unless
/// `RUST_LOG` overrides it, timestamps and targets enabled, stderr output.
pub fn init_default_logging() {
    init_logging(LoggingConfig::default());
}
