//! Tracing integration for structured logging and spans.

use tracing::{Level, Span, span};

/// Create a span for a pipeline run.
#[inline]
pub fn span_pipeline(name: &str) -> Span {
    span!(Level::INFO, "pipeline", name = %name)
}

/// Create a span for one stage thread.
#[inline]
pub fn span_stage(pipeline: &str, stage: &str) -> Span {
    span!(Level::DEBUG, "stage", pipeline = %pipeline, stage = %stage)
}

/// Enter a pipeline span, returning the guard.
pub fn instrument_pipeline(name: &str) -> tracing::span::EnteredSpan {
    span_pipeline(name).entered()
}

/// Enter a stage span, returning the guard.
pub fn instrument_stage(pipeline: &str, stage: &str) -> tracing::span::EnteredSpan {
    span_stage(pipeline, stage).entered()
}

/// Log a stage observing the terminal signal of its input.
#[inline]
pub fn trace_eos(stage: &str, items: u64) {
    tracing::debug!(stage = %stage, items = items, "end of stream");
}

/// Log a stage having closed its output channel.
#[inline]
pub fn trace_close(stage: &str, channel: &str) {
    tracing::debug!(stage = %stage, channel = %channel, "output closed");
}

/// Log a stage failure.
#[inline]
pub fn trace_error(stage: &str, error: &dyn std::error::Error) {
    tracing::error!(stage = %stage, error = %error, "stage failed");
}
