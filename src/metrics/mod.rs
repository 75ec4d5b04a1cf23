// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Write side:
// - events appended per kind
// - append conflicts (optimistic concurrency losses)
// - append failures (storage unavailable)
// - hydration failures
//
// Read side:
// - projection events dispatched / unhandled / failed per kind
// - handler duration
// - dead-lettered projection events
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Event store
    pub events_appended: IntCounterVec,
    pub append_conflicts: IntCounter,
    pub append_failures: IntCounter,
    pub hydration_failures: IntCounter,

    // Projections
    pub projection_dispatched: IntCounterVec,
    pub projection_unhandled: IntCounterVec,
    pub projection_failed: IntCounterVec,
    pub projection_duration: HistogramVec,

    // DLQ
    pub dlq_messages_total: IntCounter,
    pub dlq_messages_by_kind: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Event store
        let events_appended = IntCounterVec::new(
            Opts::new("event_store_events_appended_total", "Events durably appended"),
            &["kind"],
        )?;
        registry.register(Box::new(events_appended.clone()))?;

        let append_conflicts = IntCounter::new(
            "event_store_append_conflicts_total",
            "Appends rejected because the expected version was stale",
        )?;
        registry.register(Box::new(append_conflicts.clone()))?;

        let append_failures = IntCounter::new(
            "event_store_append_failures_total",
            "Appends that failed for any reason other than a conflict",
        )?;
        registry.register(Box::new(append_failures.clone()))?;

        let hydration_failures = IntCounter::new(
            "event_store_hydration_failures_total",
            "Aggregate loads that hit an unreadable history",
        )?;
        registry.register(Box::new(hydration_failures.clone()))?;

        // Projections
        let projection_dispatched = IntCounterVec::new(
            Opts::new("projection_events_dispatched_total", "Events handled by a projection"),
            &["kind"],
        )?;
        registry.register(Box::new(projection_dispatched.clone()))?;

        let projection_unhandled = IntCounterVec::new(
            Opts::new("projection_events_unhandled_total", "Events with no registered projection"),
            &["kind"],
        )?;
        registry.register(Box::new(projection_unhandled.clone()))?;

        let projection_failed = IntCounterVec::new(
            Opts::new("projection_events_failed_total", "Events whose projection failed"),
            &["kind", "reason"],
        )?;
        registry.register(Box::new(projection_failed.clone()))?;

        let projection_duration = HistogramVec::new(
            HistogramOpts::new("projection_dispatch_duration_seconds", "Projection handler duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["kind"],
        )?;
        registry.register(Box::new(projection_duration.clone()))?;

        // DLQ
        let dlq_messages_total = IntCounter::new(
            "dlq_messages_total",
            "Total projection records in the dead letter queue",
        )?;
        registry.register(Box::new(dlq_messages_total.clone()))?;

        let dlq_messages_by_kind = IntCounterVec::new(
            Opts::new("dlq_messages_by_kind", "DLQ records by event kind"),
            &["kind"],
        )?;
        registry.register(Box::new(dlq_messages_by_kind.clone()))?;

        Ok(Self {
            registry,
            events_appended,
            append_conflicts,
            append_failures,
            hydration_failures,
            projection_dispatched,
            projection_unhandled,
            projection_failed,
            projection_duration,
            dlq_messages_total,
            dlq_messages_by_kind,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_event_appended(&self, kind: &str) {
        self.events_appended.with_label_values(&[kind]).inc();
    }

    /// Helper to record one projection dispatch
    pub fn record_projection(&self, kind: &str, duration_secs: f64, success: bool) {
        if success {
            self.projection_dispatched.with_label_values(&[kind]).inc();
        } else {
            self.projection_failed.with_label_values(&[kind, "handler_error"]).inc();
        }
        self.projection_duration.with_label_values(&[kind]).observe(duration_secs);
    }

    pub fn record_projection_unhandled(&self, kind: &str) {
        self.projection_unhandled.with_label_values(&[kind]).inc();
    }

    pub fn record_projection_decode_failure(&self, kind: &str) {
        self.projection_failed.with_label_values(&[kind, "decode_error"]).inc();
    }

    /// Helper to record DLQ message
    pub fn record_dlq_message(&self, kind: &str) {
        self.dlq_messages_total.inc();
        self.dlq_messages_by_kind.with_label_values(&[kind]).inc();
    }
}
