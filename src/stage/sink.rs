//! Sink stage and output collaborators.

use super::{LineSink, SINK_STAGE, StageReport};
use crate::channel::BoundedChannel;
use crate::error::Result;
use crate::observability::{self, StageMetrics};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Re-chunks a character stream into lines of exactly `width` characters.
///
/// ```rust
/// use linefold::stage::LineWrapper;
///
/// let mut wrapper = LineWrapper::new(4);
/// let mut out = Vec::new();
/// wrapper.push_str("12345", |l| { out.push(l.to_string()); Ok(()) }).unwrap();
/// wrapper.finish(|l| { out.push(l.to_string()); Ok(()) }).unwrap();
/// assert_eq!(out, ["1234", "5"]);
/// ```
#[derive(Debug, Clone)]
pub struct LineWrapper {
    width: usize,
    buf: String,
    fill: usize,
}

impl LineWrapper {
    /// Create a wrapper emitting lines of `width` characters.
    ///
    /// # Panics
    ///
    /// Panics if `width` is zero.
    pub fn new(width: usize) -> Self {
        assert!(width > 0, "output width must be at least 1");
        Self {
            width,
            buf: String::with_capacity(width),
            fill: 0,
        }
    }

    /// Get the configured width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Get the number of characters waiting for a full line.
    pub fn pending(&self) -> usize {
        self.fill
    }

    /// Append `text`, calling `emit` for every line that fills up.
    ///
    /// Returns the number of lines emitted.
    pub fn push_str<F>(&mut self, text: &str, mut emit: F) -> Result<u64>
    where
        F: FnMut(&str) -> Result<()>,
    {
        let mut emitted = 0;
        for c in text.chars() {
            self.buf.push(c);
            self.fill += 1;
            if self.fill == self.width {
                emit(&self.buf)?;
                self.buf.clear();
                self.fill = 0;
                emitted += 1;
            }
        }
        Ok(emitted)
    }

    /// Emit the partial line, if any. Never emits an empty line.
    ///
    /// Returns whether a line was emitted.
    pub fn finish<F>(&mut self, mut emit: F) -> Result<bool>
    where
        F: FnMut(&str) -> Result<()>,
    {
        if self.fill == 0 {
            return Ok(false);
        }
        emit(&self.buf)?;
        self.buf.clear();
        self.fill = 0;
        Ok(true)
    }
}

/// Writes each line plus `\n` to a writer, flushing after every line.
///
/// # Example
///
/// ```rust
/// use linefold::stage::{LineSink, WriterSink};
///
/// let mut sink = WriterSink::new(Vec::new());
/// sink.write_line("abcd").unwrap();
/// assert_eq!(sink.into_inner(), b"abcd\n");
/// ```
pub struct WriterSink<W> {
    name: String,
    writer: W,
    lines_written: u64,
}

impl<W: Write + Send> WriterSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            name: "writersink".to_string(),
            writer,
            lines_written: 0,
        }
    }

    /// Set a custom name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Get the number of lines written.
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> LineSink for WriterSink<W> {
    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        self.lines_written += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A sink that keeps every line in memory.
///
/// Lines are read back through a [`CollectHandle`], which can be cloned and
/// kept after the sink has been moved into a pipeline.
#[derive(Default)]
pub struct CollectSink {
    lines: Arc<Mutex<Vec<String>>>,
}

/// Handle for reading the lines gathered by a [`CollectSink`].
#[derive(Clone)]
pub struct CollectHandle {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CollectSink {
    /// Create an empty collecting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a handle for reading the collected lines.
    pub fn handle(&self) -> CollectHandle {
        CollectHandle {
            lines: Arc::clone(&self.lines),
        }
    }
}

impl LineSink for CollectSink {
    fn write_line(&mut self, line: &str) -> Result<()> {
        lock(&self.lines).push(line.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "collectsink"
    }
}

impl CollectHandle {
    /// Get a copy of the lines collected so far.
    pub fn lines(&self) -> Vec<String> {
        lock(&self.lines).clone()
    }

    /// Get the number of lines collected so far.
    pub fn len(&self) -> usize {
        lock(&self.lines).len()
    }

    /// Check if no lines were collected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock(lines: &Mutex<Vec<String>>) -> MutexGuard<'_, Vec<String>> {
    lines.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The last stage: drains channel C into fixed-width lines.
#[derive(Debug, Clone, Copy)]
pub struct SinkStage {
    width: usize,
}

impl SinkStage {
    /// Create a sink stage emitting lines of `width` characters.
    pub fn new(width: usize) -> Self {
        Self { width }
    }

    /// Drain `input` into `sink`, then flush the remaining partial line.
    pub fn run<K: LineSink + ?Sized>(
        &self,
        input: &BoundedChannel<String>,
        sink: &mut K,
    ) -> Result<StageReport> {
        let metrics = StageMetrics::new(SINK_STAGE);
        let mut report = StageReport::new(SINK_STAGE);
        let mut wrapper = LineWrapper::new(self.width);
        tracing::debug!(sink = %sink.name(), width = self.width, "sink stage started");

        let mut emit = |line: &str| -> Result<()> {
            sink.write_line(line)?;
            metrics.record_out();
            observability::record_line_written(SINK_STAGE);
            Ok(())
        };

        while let Some(text) = input.pop()? {
            report.items_in += 1;
            metrics.record_in();
            report.items_out += wrapper.push_str(&text, &mut emit)?;
        }

        observability::trace_eos(SINK_STAGE, report.items_in);
        if wrapper.finish(&mut emit)? {
            report.items_out += 1;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(width: usize, pieces: &[&str]) -> Vec<String> {
        let mut wrapper = LineWrapper::new(width);
        let mut out = Vec::new();
        for piece in pieces {
            wrapper
                .push_str(piece, |l| {
                    out.push(l.to_string());
                    Ok(())
                })
                .unwrap();
        }
        wrapper
            .finish(|l| {
                out.push(l.to_string());
                Ok(())
            })
            .unwrap();
        out
    }

    #[test]
    fn test_wrapper_exact_fill() {
        assert_eq!(wrap(4, &["ab", "cd"]), vec!["abcd"]);
    }

    #[test]
    fn test_wrapper_partial_flush() {
        assert_eq!(wrap(4, &["12345"]), vec!["1234", "5"]);
    }

    #[test]
    fn test_wrapper_spans_items() {
        assert_eq!(wrap(3, &["a", "bcde", "fg"]), vec!["abc", "def", "g"]);
    }

    #[test]
    fn test_wrapper_no_empty_line() {
        assert!(wrap(4, &[]).is_empty());
        assert!(wrap(4, &["", ""]).is_empty());
    }

    #[test]
    fn test_wrapper_counts_characters() {
        assert_eq!(wrap(2, &["äöü"]), vec!["äö", "ü"]);
    }

    #[test]
    fn test_wrapper_pending() {
        let mut wrapper = LineWrapper::new(4);
        wrapper.push_str("abcdef", |_| Ok(())).unwrap();
        assert_eq!(wrapper.pending(), 2);
        assert!(wrapper.finish(|_| Ok(())).unwrap());
        assert_eq!(wrapper.pending(), 0);
        assert!(!wrapper.finish(|_| Ok(())).unwrap());
    }

    #[test]
    fn test_writer_sink() {
        let mut sink = WriterSink::new(Vec::new());
        sink.write_line("one").unwrap();
        sink.write_line("two").unwrap();
        assert_eq!(sink.lines_written(), 2);
        assert_eq!(sink.into_inner(), b"one\ntwo\n");
    }

    /// Records the number of bytes written at every flush.
    #[derive(Default)]
    struct FlushLog {
        bytes: Vec<u8>,
        flushed_at: Vec<usize>,
    }

    impl Write for FlushLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.bytes.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed_at.push(self.bytes.len());
            Ok(())
        }
    }

    #[test]
    fn test_writer_sink_flushes_each_line() {
        let mut sink = WriterSink::new(FlushLog::default());
        sink.write_line("one").unwrap();
        sink.write_line("three").unwrap();

        let log = sink.into_inner();
        assert_eq!(log.bytes, b"one\nthree\n");
        assert_eq!(log.flushed_at, vec![4, 10]);
    }

    #[test]
    fn test_collect_sink_handle() {
        let mut sink = CollectSink::new();
        let handle = sink.handle();
        assert!(handle.is_empty());
        sink.write_line("x").unwrap();
        assert_eq!(handle.lines(), vec!["x"]);
    }

    #[test]
    fn test_sink_stage_flushes_remainder() {
        let input = BoundedChannel::new(4);
        input.push("12345".to_string()).unwrap();
        input.close();

        let mut sink = CollectSink::new();
        let handle = sink.handle();
        let report = SinkStage::new(4).run(&input, &mut sink).unwrap();

        assert_eq!(handle.lines(), vec!["1234", "5"]);
        assert_eq!(report.items_in, 1);
        assert_eq!(report.items_out, 2);
    }
}
