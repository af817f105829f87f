//! Per-line transforms and the stage that runs them between two channels.

use super::{FOLD_STAGE, JOIN_STAGE, StageReport, Transform};
use crate::channel::BoundedChannel;
use crate::error::Result;
use crate::observability::{self, StageMetrics};

/// Replace a trailing `terminator` with a single space.
///
/// Lines without a trailing terminator are returned unchanged. The length in
/// characters never changes.
///
/// ```rust
/// use linefold::stage::join_line;
///
/// assert_eq!(join_line("hello\n".to_string(), '\n'), "hello ");
/// assert_eq!(join_line("hello".to_string(), '\n'), "hello");
/// ```
pub fn join_line(mut line: String, terminator: char) -> String {
    if line.ends_with(terminator) {
        line.pop();
        line.push(' ');
    }
    line
}

/// Collapse each adjacent pair of `marker` into one `substitute`.
///
/// Pairs are taken greedily from the left and never overlap, so an odd run
/// leaves its last marker in place.
///
/// ```rust
/// use linefold::stage::fold_markers;
///
/// assert_eq!(fold_markers("a+++b", '+', '^'), "a^+b");
/// ```
pub fn fold_markers(line: &str, marker: char, substitute: char) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == marker && chars.peek() == Some(&marker) {
            chars.next();
            out.push(substitute);
        } else {
            out.push(c);
        }
    }
    out
}

/// Transform replacing the line terminator with a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineJoin {
    terminator: char,
}

impl LineJoin {
    /// Create a join transform for the given terminator.
    pub fn new(terminator: char) -> Self {
        Self { terminator }
    }
}

impl Default for LineJoin {
    fn default() -> Self {
        Self::new('\n')
    }
}

impl Transform for LineJoin {
    fn apply(&mut self, line: String) -> String {
        join_line(line, self.terminator)
    }

    fn name(&self) -> &str {
        JOIN_STAGE
    }
}

/// Transform folding adjacent marker pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerFold {
    marker: char,
    substitute: char,
}

impl MarkerFold {
    /// Create a fold transform.
    pub fn new(marker: char, substitute: char) -> Self {
        Self { marker, substitute }
    }
}

impl Default for MarkerFold {
    fn default() -> Self {
        Self::new('+', '^')
    }
}

impl Transform for MarkerFold {
    fn apply(&mut self, line: String) -> String {
        if !line.contains(self.marker) {
            return line;
        }
        fold_markers(&line, self.marker, self.substitute)
    }

    fn name(&self) -> &str {
        FOLD_STAGE
    }
}

/// A middle stage: pops from one channel, applies a [`Transform`], pushes
/// onto the next.
pub struct TransformStage<T> {
    stage: &'static str,
    transform: T,
}

impl<T: Transform> TransformStage<T> {
    /// Wrap a transform under the given stage name.
    pub fn new(stage: &'static str, transform: T) -> Self {
        Self { stage, transform }
    }

    /// Get the stage name.
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Drain `input`, pushing each transformed line onto `output`.
    ///
    /// Once `input` reports its terminal `None`, closes `output`. Closure is
    /// checked against `input`, so `output` can never close while upstream
    /// still holds items.
    pub fn run(
        &mut self,
        input: &BoundedChannel<String>,
        output: &BoundedChannel<String>,
    ) -> Result<StageReport> {
        let metrics = StageMetrics::new(self.stage);
        let mut report = StageReport::new(self.stage);
        tracing::debug!(stage = %self.stage, transform = %self.transform.name(), "stage started");

        while let Some(line) = input.pop()? {
            report.items_in += 1;
            metrics.record_in();

            let line = {
                let _timer = metrics.start_timer();
                self.transform.apply(line)
            };

            output.push(line)?;
            report.items_out += 1;
            metrics.record_out();
        }

        observability::trace_eos(self.stage, report.items_in);
        output.close_after(input)?;
        observability::trace_close(self.stage, output.name());
        Ok(report)
    }
}
