//! Observability features: metrics and tracing.
//!
//! - **Metrics**: counters, gauges and histograms via `metrics-rs`
//! - **Tracing**: structured logging and spans via `tracing`
//!
//! ## Metrics
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `linefold_lines_read` | Counter | Lines read by the source stage |
//! | `linefold_lines_written` | Counter | Fixed-width lines written by the sink stage |
//! | `linefold_items_pushed` | Counter | Items pushed onto a channel |
//! | `linefold_items_popped` | Counter | Items popped from a channel |
//! | `linefold_stage_items` | Counter | Items entering (`in`) or leaving (`out`) a stage |
//! | `linefold_channel_depth` | Gauge | Items currently queued in a channel |
//! | `linefold_stage_time_ns` | Histogram | Time spent transforming one item |
//!
//! Nothing is exported unless the application installs a recorder; without
//! one every `record_*` call is a no-op.
//!
//! ## Tracing
//!
//! A `pipeline` span wraps [`Pipeline::run`](crate::pipeline::Pipeline::run)
//! and every stage thread runs inside its own `stage` span.

mod metrics;
mod tracing_support;

pub use metrics::{
    StageMetrics, init_metrics, record_channel_depth, record_item_popped, record_item_pushed,
    record_line_read, record_line_written,
};
pub use tracing_support::{
    instrument_pipeline, instrument_stage, span_pipeline, span_stage, trace_close, trace_eos,
    trace_error,
};
