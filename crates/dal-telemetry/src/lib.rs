//! # DAL Telemetry
//!
//! Observability for the DAL node.
//!
//! ## Components
//!
//! - **Logs**: `tracing` with an `EnvFilter`, pretty or JSON output
//! - **Metrics**: Prometheus registry rendered by `GET /metrics`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dal_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_telemetry(&TelemetryConfig::from_env())?;
//!     // Spans, logs and metrics are now being collected
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DAL_SERVICE_NAME` | `dal-node` | Service name in logs |
//! | `DAL_LOG_LEVEL` | `info` | Log level filter (`RUST_LOG` also honored) |
//! | `DAL_JSON_LOGS` | `false` | One JSON object per line |
//! | `DAL_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, AMPLIFICATIONS, HEADER_TRANSITIONS,
    L1_FINALIZED_LEVEL, MESSAGES_RECEIVED, PEERS_CONNECTED, RECONSTRUCTION_DURATION,
    SHARDS_REMOVED, SHARDS_STORED, TOPICS_JOINED,
};
pub use tracing_setup::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging and metrics.
///
/// Metrics are registered first so that nothing observed during startup is lost.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_tracing(config)
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
