//! Copyright (c) 2024 MASSA LABS <info@massa.net>

//! Telemetry sinks for the tracker: an update meter, a re-rolling meter, a
//! parent-before-child anomaly meter, and a time-since-update histogram.
//!
//! These are fire-and-forget, matching the "telemetry, not error handling"
//! stance of the error design: nothing here ever fails a caller's operation.

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};

/// The Prometheus collectors backing the tracker's telemetry sinks.
///
/// Construct one per process and register it against whatever
/// [`prometheus::Registry`] the host service exposes on its `/metrics`
/// endpoint; this crate does not run an HTTP server of its own.
#[derive(Clone)]
pub struct TrackerMetrics {
    /// incremented once per `create_or_update_for_slot_and_millisecond` call
    update_meter: IntCounter,
    /// incremented when ingest re-activates a previously `Rolled` slot
    re_rollup_meter: IntCounter,
    /// incremented when coarser-propagation finds a non-`Active` parent
    parent_before_child_meter: IntCounter,
    /// `now - timestamp` recorded for every slot visited by
    /// `get_slots_older_than`, rolled slots included
    time_since_update: Histogram,
}

impl TrackerMetrics {
    /// Build and register the tracker's collectors against `registry`.
    ///
    /// Panics if a collector of the same name is already registered; this
    /// mirrors `massa-metrics`, which treats a metrics-registration failure
    /// as a startup bug rather than something to recover from.
    pub fn new(registry: &Registry) -> TrackerMetrics {
        let update_meter = IntCounter::with_opts(Opts::new(
            "rollup_tracker_updates_total",
            "slots touched by create_or_update_for_slot_and_millisecond",
        ))
        .expect("valid counter opts");
        let re_rollup_meter = IntCounter::with_opts(Opts::new(
            "rollup_tracker_re_rollups_total",
            "previously rolled slots re-activated by ingest",
        ))
        .expect("valid counter opts");
        let parent_before_child_meter = IntCounter::with_opts(Opts::new(
            "rollup_tracker_parent_before_child_total",
            "coarser-propagation finding a non-active parent slot",
        ))
        .expect("valid counter opts");
        let time_since_update = Histogram::with_opts(HistogramOpts::new(
            "rollup_tracker_slot_age_millis",
            "now - timestamp observed while scanning for slots older than a threshold",
        ))
        .expect("valid histogram opts");

        registry
            .register(Box::new(update_meter.clone()))
            .expect("update_meter registers cleanly");
        registry
            .register(Box::new(re_rollup_meter.clone()))
            .expect("re_rollup_meter registers cleanly");
        registry
            .register(Box::new(parent_before_child_meter.clone()))
            .expect("parent_before_child_meter registers cleanly");
        registry
            .register(Box::new(time_since_update.clone()))
            .expect("time_since_update registers cleanly");

        TrackerMetrics {
            update_meter,
            re_rollup_meter,
            parent_before_child_meter,
            time_since_update,
        }
    }

    pub(crate) fn tick_update(&self) {
        self.update_meter.inc();
    }

    pub(crate) fn tick_re_rollup(&self) {
        self.re_rollup_meter.inc();
    }

    pub(crate) fn tick_parent_before_child(&self) {
        self.parent_before_child_meter.inc();
    }

    pub(crate) fn observe_age(&self, age_millis: i64) {
        self.time_since_update.observe(age_millis.max(0) as f64);
    }

    /// Current value of the update meter. Exposed for tests; production
    /// callers should scrape the registered collectors instead.
    pub fn update_count(&self) -> u64 {
        self.update_meter.get()
    }

    /// Current value of the re-rollup meter.
    pub fn re_rollup_count(&self) -> u64 {
        self.re_rollup_meter.get()
    }

    /// Current value of the parent-before-child meter.
    pub fn parent_before_child_count(&self) -> u64 {
        self.parent_before_child_meter.get()
    }

    /// Number of observations recorded into the slot-age histogram.
    pub fn age_observation_count(&self) -> u64 {
        self.time_since_update.get_sample_count()
    }
}
