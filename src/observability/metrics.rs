//! Metrics collection using metrics-rs.

use metrics::{Counter, Histogram, Unit, counter, gauge, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Whether metrics have been initialized.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

const LINES_READ: &str = "linefold_lines_read";
const LINES_WRITTEN: &str = "linefold_lines_written";
const ITEMS_PUSHED: &str = "linefold_items_pushed";
const ITEMS_POPPED: &str = "linefold_items_popped";
const CHANNEL_DEPTH: &str = "linefold_channel_depth";
const STAGE_ITEMS: &str = "linefold_stage_items";
const STAGE_TIME_NS: &str = "linefold_stage_time_ns";

/// Initialize metrics descriptions.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    metrics::describe_counter!(LINES_READ, Unit::Count, "Lines read by the source stage");
    metrics::describe_counter!(
        LINES_WRITTEN,
        Unit::Count,
        "Fixed-width lines written by the sink stage"
    );
    metrics::describe_counter!(ITEMS_PUSHED, Unit::Count, "Items pushed onto a channel");
    metrics::describe_counter!(ITEMS_POPPED, Unit::Count, "Items popped from a channel");
    metrics::describe_counter!(
        STAGE_ITEMS,
        Unit::Count,
        "Items entering or leaving a stage"
    );
    metrics::describe_gauge!(
        CHANNEL_DEPTH,
        Unit::Count,
        "Number of items queued in a channel"
    );
    metrics::describe_histogram!(
        STAGE_TIME_NS,
        Unit::Nanoseconds,
        "Time to transform a single item"
    );
}

/// Record a line read by the source stage.
#[inline]
pub fn record_line_read(stage: &str) {
    counter!(LINES_READ, "stage" => stage.to_string()).increment(1);
}

/// Record a line written by the sink stage.
#[inline]
pub fn record_line_written(stage: &str) {
    counter!(LINES_WRITTEN, "stage" => stage.to_string()).increment(1);
}

/// Record an item pushed onto a channel.
#[inline]
pub fn record_item_pushed(channel: &str) {
    counter!(ITEMS_PUSHED, "channel" => channel.to_string()).increment(1);
}

/// Record an item popped from a channel.
#[inline]
pub fn record_item_popped(channel: &str) {
    counter!(ITEMS_POPPED, "channel" => channel.to_string()).increment(1);
}

/// Record channel depth (queued items).
#[inline]
pub fn record_channel_depth(channel: &str, depth: usize) {
    gauge!(CHANNEL_DEPTH, "channel" => channel.to_string()).set(depth as f64);
}

/// Metrics collector for one stage, with its labels resolved once.
#[derive(Clone)]
pub struct StageMetrics {
    stage: String,
    items_in: Counter,
    items_out: Counter,
    processing_time: Histogram,
}

impl StageMetrics {
    /// Create a collector for the named stage.
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            items_in: counter!(STAGE_ITEMS, "stage" => stage.to_string(), "direction" => "in"),
            items_out: counter!(STAGE_ITEMS, "stage" => stage.to_string(), "direction" => "out"),
            processing_time: histogram!(STAGE_TIME_NS, "stage" => stage.to_string()),
        }
    }

    /// Record an incoming item.
    #[inline]
    pub fn record_in(&self) {
        self.items_in.increment(1);
    }

    /// Record an outgoing item.
    #[inline]
    pub fn record_out(&self) {
        self.items_out.increment(1);
    }

    /// Record processing time.
    #[inline]
    pub fn record_time(&self, duration: Duration) {
        self.processing_time.record(duration.as_nanos() as f64);
    }

    /// Start a timer and return a guard that records on drop.
    pub fn start_timer(&self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            metrics: self,
        }
    }

    /// Get the stage name.
    pub fn stage(&self) -> &str {
        &self.stage
    }
}

/// Guard that records processing time when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    metrics: &'a StageMetrics,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.metrics.record_time(self.start.elapsed());
    }
}
