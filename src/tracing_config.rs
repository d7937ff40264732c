//! Log output setup for the `bottle-studio` binary
//!
//! Library code only emits `log` records and `tracing` spans; the binary
//! installs one global subscriber here. `RUST_LOG` takes precedence over
//! the `-v` count, an explicit filter over both.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Dependencies that are chatty at debug level
const NOISY_TARGETS: &[&str] = &["hyper", "h2", "tower_http", "ort", "mio"];

/// Where and how log lines are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Colored single-line output for terminals
    #[default]
    Console,
    /// Plain output without timestamps, for containers whose runtime stamps lines
    Compact,
    /// One JSON object per event including the active span stack
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Subscriber settings collected from the command line
#[derive(Debug, Default)]
pub struct TracingConfig {
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Full filter directive string, replacing the verbosity mapping
    pub filter_override: Option<String>,
    /// Logged once at startup so all lines of a run can be correlated
    pub session_id: Option<String>,
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `-v` count: 0 info, 1 debug, 2+ trace for this crate
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, directives: S) -> Self {
        self.filter_override = Some(directives.into());
        self
    }

    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Directives derived from the verbosity alone
    ///
    /// Raises the level of this crate first; dependencies listed in
    /// [`NOISY_TARGETS`] stay at `warn` until `-vv`.
    #[must_use]
    pub fn verbosity_directives(&self) -> String {
        let (own, deps) = match self.verbosity {
            0 => ("info", "warn"),
            1 => ("debug", "warn"),
            _ => ("trace", "debug"),
        };
        let mut directives = format!("info,bottle_studio={own}");
        for target in NOISY_TARGETS {
            directives.push_str(&format!(",{target}={deps}"));
        }
        directives
    }

    /// Explicit override, then `RUST_LOG`, then the verbosity mapping
    fn directives(&self) -> String {
        self.filter_override
            .clone()
            .or_else(|| std::env::var(EnvFilter::DEFAULT_ENV).ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| self.verbosity_directives())
    }

    /// Install the global subscriber
    ///
    /// `log` records from the library are bridged into the subscriber.
    ///
    /// # Errors
    /// - Unparsable filter directives
    /// - A global subscriber is already installed
    pub fn init(self) -> anyhow::Result<()> {
        let filter = EnvFilter::try_new(self.directives())?;
        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => registry
                .with(fmt::layer().with_target(false).compact())
                .try_init()?,
            TracingFormat::Compact => registry
                .with(fmt::layer().with_ansi(false).without_time().compact())
                .try_init()?,
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => registry
                .with(fmt::layer().json().with_current_span(true).with_span_list(true))
                .try_init()?,
        }

        if let Some(session_id) = &self.session_id {
            tracing::info!(session_id = %session_id, version = env!("CARGO_PKG_VERSION"), "bottle-studio started");
        }
        Ok(())
    }
}

/// Install the subscriber for one CLI run with a fresh session id
///
/// # Errors
/// - See [`TracingConfig::init`]
pub fn init_cli_tracing(verbosity: u8, format: TracingFormat) -> anyhow::Result<()> {
    TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(format)
        .with_session_id(uuid::Uuid::new_v4().to_string())
        .init()
}

/// Spans opened by the CLI around disk batches
pub mod spans {
    use std::path::Path;
    use tracing::{info_span, Span};

    pub fn batch_processing(file_count: usize, profile: &str) -> Span {
        info_span!("batch", files = file_count, profile = %profile)
    }

    pub fn file_processing(path: &Path) -> Span {
        info_span!("file", path = %path.display())
    }
}
