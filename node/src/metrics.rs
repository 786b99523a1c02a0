//! # Prometheus Metrics
//!
//! Counters for the transaction pipeline. There is no scrape endpoint; the
//! text exposition is printed by `demo` and logged by `run` on shutdown.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use shade_protocol::ProtocolError;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly: prometheus handles are reference-counted, so clones
/// update the same series.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    pub transactions_created_total: IntCounter,
    pub transactions_anchored_total: IntCounter,
    pub anchors_canceled_total: IntCounter,
    pub anchors_finalized_total: IntCounter,
    pub compliance_rejections_total: IntCounter,
    /// Refusals for any other policy reason: signature, range proof,
    /// duplicate anchor.
    pub verification_rejections_total: IntCounter,
    /// Anchors currently pending.
    pub anchors_pending: IntGauge,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("shade".into()), None)?;

        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let c = IntCounter::new(name, help)?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };

        let transactions_created_total =
            counter("transactions_created_total", "Transactions created and signed")?;
        let transactions_anchored_total =
            counter("transactions_anchored_total", "Transactions that passed every check and were anchored")?;
        let anchors_canceled_total =
            counter("anchors_canceled_total", "Anchors canceled inside their window")?;
        let anchors_finalized_total =
            counter("anchors_finalized_total", "Anchors finalized after their window")?;
        let compliance_rejections_total = counter(
            "compliance_rejections_total",
            "Transactions or screenings refused by compliance",
        )?;

        let verification_rejections_total = counter(
            "verification_rejections_total",
            "Transactions refused for a reason other than compliance",
        )?;

        let anchors_pending = IntGauge::new("anchors_pending", "Anchors awaiting finalization")?;
        registry.register(Box::new(anchors_pending.clone()))?;

        Ok(Self {
            registry,
            transactions_created_total,
            transactions_anchored_total,
            anchors_canceled_total,
            anchors_finalized_total,
            compliance_rejections_total,
            verification_rejections_total,
            anchors_pending,
        })
    }

    /// Count a refused transaction against the counter for its reason.
    pub fn record_rejection(&self, error: &ProtocolError) {
        match error {
            ProtocolError::ComplianceRejected(_) => self.compliance_rejections_total.inc(),
            _ => self.verification_rejections_total.inc(),
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
