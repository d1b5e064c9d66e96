//! Prometheus metrics for DAL subsystems.
//!
//! All metrics follow the naming convention: `dal_<subsystem>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., shards_stored_total)
//! - **Gauge**: Value that can go up or down (e.g., peers_connected)
//! - **Histogram**: Distribution of values (e.g., reconstruction_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // SHARD STORE
    // =========================================================================

    pub static ref SHARDS_STORED: IntCounter = IntCounter::new(
        "dal_store_shards_stored_total",
        "Shards written to the shard store"
    ).expect("metric creation failed");

    pub static ref SHARDS_REMOVED: IntCounter = IntCounter::new(
        "dal_store_shards_removed_total",
        "Shards deleted by garbage collection"
    ).expect("metric creation failed");

    // =========================================================================
    // SLOT TRACKER / L1
    // =========================================================================

    pub static ref L1_FINALIZED_LEVEL: IntGauge = IntGauge::new(
        "dal_l1_finalized_level",
        "Last finalized L1 level processed"
    ).expect("metric creation failed");

    /// Header transitions, labelled by resulting status
    pub static ref HEADER_TRANSITIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("dal_tracker_header_transitions_total", "Slot header status transitions"),
        &["status"]
    ).expect("metric creation failed");

    // =========================================================================
    // GOSSIP
    // =========================================================================

    pub static ref PEERS_CONNECTED: IntGauge = IntGauge::new(
        "dal_gossip_peers_connected",
        "Currently connected peers"
    ).expect("metric creation failed");

    pub static ref TOPICS_JOINED: IntGauge = IntGauge::new(
        "dal_gossip_topics_joined",
        "Topics the node is subscribed to"
    ).expect("metric creation failed");

    /// Received shard messages by validation outcome
    pub static ref MESSAGES_RECEIVED: IntCounterVec = IntCounterVec::new(
        Opts::new("dal_gossip_messages_received_total", "Shard messages received"),
        &["outcome"]  // accepted/rejected/ignored/duplicate
    ).expect("metric creation failed");

    // =========================================================================
    // AMPLIFICATION
    // =========================================================================

    pub static ref AMPLIFICATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("dal_amplification_runs_total", "Amplification attempts"),
        &["outcome"]  // amplified/skipped/failed
    ).expect("metric creation failed");

    pub static ref RECONSTRUCTION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "dal_amplification_reconstruction_duration_seconds",
            "Time spent reconstructing slots"
        ).buckets(exponential_buckets(0.001, 2.0, 14).unwrap_or_default())
    ).expect("metric creation failed");
}

/// Register all DAL metrics with the global registry.
///
/// Calling it more than once is harmless.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(SHARDS_STORED.clone()),
        Box::new(SHARDS_REMOVED.clone()),
        Box::new(L1_FINALIZED_LEVEL.clone()),
        Box::new(HEADER_TRANSITIONS.clone()),
        Box::new(PEERS_CONNECTED.clone()),
        Box::new(TOPICS_JOINED.clone()),
        Box::new(MESSAGES_RECEIVED.clone()),
        Box::new(AMPLIFICATIONS.clone()),
        Box::new(RECONSTRUCTION_DURATION.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
