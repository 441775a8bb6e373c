//! Prometheus counters for the delivery pipeline.
//!
//! Collectors are registered into [`REGISTRY`] on first use; exposing them
//! is left to the embedding process.

use lazy_static::lazy_static;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref NOTIFICATIONS_SENT: IntCounterVec = register(IntCounterVec::new(
        Opts::new("notifications_sent", "Notifications handed to the transport"),
        &["kind"]
    )
    .expect("metric can not be created"));

    pub static ref TRIGGERS_SKIPPED: IntCounterVec = register(IntCounterVec::new(
        Opts::new("triggers_skipped", "Triggers that produced no notification"),
        &["reason"]
    )
    .expect("metric can not be created"));

    pub static ref FILTER_FALLBACKS: IntCounterVec = register(IntCounterVec::new(
        Opts::new("filter_fallbacks", "Notifications sent unfiltered after a filter miss or error"),
        &["outcome"]
    )
    .expect("metric can not be created"));

    pub static ref DELIVERY_FAILURES: IntCounterVec = register(IntCounterVec::new(
        Opts::new("delivery_failures", "Recovered failures on the delivery path"),
        &["stage"]
    )
    .expect("metric can not be created"));
}

fn register(collector: IntCounterVec) -> IntCounterVec {
    // A second registration only happens if the same name is reused; the
    // counter still works unregistered.
    if let Err(e) = REGISTRY.register(Box::new(collector.clone())) {
        tracing::warn!("metric registration failed: {:?}", e);
    }
    collector
}
