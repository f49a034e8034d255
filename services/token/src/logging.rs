//! Tracing subscriber setup.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Name reported in logs when `SERVICE_NAME` is unset.
pub const DEFAULT_SERVICE_NAME: &str = "oauth2-token-service";

/// Dependencies that are chatty at `info` and below.
const QUIET_TARGETS: &[&str] = &["hyper", "h2"];

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Service name in the startup event
    pub service: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            service: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl LogConfig {
    /// `level` followed by a `warn` cap for noisy dependencies. An explicit
    /// directive for one of them in `level` wins.
    #[must_use]
    pub fn directives(&self) -> String {
        let mut directives = vec![self.level.clone()];
        directives.extend(
            QUIET_TARGETS
                .iter()
                .filter(|target| !self.level.contains(&format!("{target}=")))
                .map(|target| format!("{target}=warn")),
        );
        directives.join(",")
    }
}

/// Installs the global subscriber. Call once at startup.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.directives()));

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!(
        service = %config.service,
        version = env!("CARGO_PKG_VERSION"),
        json = config.json,
        "Tracing initialised"
    );
}
