//! Pipeline stages and their I/O collaborators.
//!
//! - [`LineSource`]: supplies raw input lines (e.g. stdin, a file, a `Vec`)
//! - [`Transform`]: a pure per-line rewrite ([`LineJoin`], [`MarkerFold`])
//! - [`LineSink`]: receives finished fixed-width lines
//!
//! The stage runners ([`SourceStage`], [`TransformStage`], [`SinkStage`])
//! wrap these in the loop every stage shares: pop from the input channel,
//! transform, push downstream, and close the output once the input reports
//! its terminal `None`.
//!
//! ```text
//! LineSource ─> SourceStage ─A─> TransformStage<LineJoin> ─B─>
//!               TransformStage<MarkerFold> ─C─> SinkStage ─> LineSink
//! ```

mod sink;
mod source;
mod transform;

pub use sink::{CollectHandle, CollectSink, LineWrapper, SinkStage, WriterSink};
pub use source::{IterSource, ReaderSource, SourceStage};
pub use transform::{LineJoin, MarkerFold, TransformStage, fold_markers, join_line};

use crate::error::Result;

/// Stage name of the source stage.
pub const SOURCE_STAGE: &str = "source";
/// Stage name of the line-join stage.
pub const JOIN_STAGE: &str = "join";
/// Stage name of the marker-fold stage.
pub const FOLD_STAGE: &str = "fold";
/// Stage name of the sink stage.
pub const SINK_STAGE: &str = "sink";

/// Input collaborator: a lazy sequence of text lines.
pub trait LineSource: Send {
    /// Read the next line, including its terminator if it had one.
    ///
    /// Returns `Ok(None)` when the input is exhausted.
    fn read_line(&mut self) -> Result<Option<String>>;

    /// Agree on line framing before the first read.
    ///
    /// The pipeline calls this with its terminator and maximum line length so
    /// a source that splits raw input does so the way the stages expect.
    /// Sources yielding ready-made lines can ignore it.
    fn set_framing(&mut self, _terminator: char, _max_line_len: usize) {}

    /// Whether the last line read was cut short and continues in the next.
    fn line_continues(&self) -> bool {
        false
    }

    /// Get the name of this source (for debugging/logging).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Output collaborator: accepts finished lines in order.
pub trait LineSink: Send {
    /// Write one line. The sink appends the line break itself.
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Get the name of this sink (for debugging/logging).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A pure per-line rewrite applied by a [`TransformStage`].
pub trait Transform: Send {
    /// Rewrite one line.
    fn apply(&mut self, line: String) -> String;

    /// Get the name of this transform (for debugging/logging).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<S: LineSource + ?Sized> LineSource for Box<S> {
    fn read_line(&mut self) -> Result<Option<String>> {
        (**self).read_line()
    }

    fn set_framing(&mut self, terminator: char, max_line_len: usize) {
        (**self).set_framing(terminator, max_line_len)
    }

    fn line_continues(&self) -> bool {
        (**self).line_continues()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<K: LineSink + ?Sized> LineSink for Box<K> {
    fn write_line(&mut self, line: &str) -> Result<()> {
        (**self).write_line(line)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Why the source stage stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The input collaborator ran out of lines.
    EndOfInput,
    /// A line matching the stop sentinel was read.
    StopSentinel,
}

/// Counters reported by one stage when it finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    /// Stage name.
    pub stage: &'static str,
    /// Items taken from upstream (lines read, for the source).
    pub items_in: u64,
    /// Items handed downstream (lines written, for the sink).
    pub items_out: u64,
    /// Set by the source stage only.
    pub stop: Option<StopReason>,
}

impl StageReport {
    fn new(stage: &'static str) -> Self {
        Self {
            stage,
            items_in: 0,
            items_out: 0,
            stop: None,
        }
    }
}
