//! Source stage and input collaborators.

use super::{LineSource, SOURCE_STAGE, StageReport, StopReason};
use crate::channel::BoundedChannel;
use crate::config::{OversizePolicy, PipelineConfig};
use crate::error::{Error, Result};
use crate::observability::{self, StageMetrics};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Reads terminated lines from any buffered reader.
///
/// Lines keep their terminator (`\n` unless changed). Invalid UTF-8 is
/// replaced rather than rejected, so a stray byte never stops the pipeline.
///
/// With a line limit set, no read buffers more than the bytes `max_line_len`
/// characters can occupy. A longer line comes back in pieces and
/// [`LineSource::line_continues`] reports each cut.
///
/// # Example
///
/// ```rust
/// use linefold::stage::{LineSource, ReaderSource};
///
/// let mut src = ReaderSource::new("one\ntwo".as_bytes());
/// assert_eq!(src.read_line().unwrap().as_deref(), Some("one\n"));
/// assert_eq!(src.read_line().unwrap().as_deref(), Some("two"));
/// assert_eq!(src.read_line().unwrap(), None);
/// ```
pub struct ReaderSource<R> {
    name: String,
    reader: R,
    terminator: char,
    limit: usize,
    carry: Vec<u8>,
    continues: bool,
    lines_read: u64,
}

impl<R: BufRead + Send> ReaderSource<R> {
    /// Wrap a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            name: "readersrc".to_string(),
            reader,
            terminator: '\n',
            limit: usize::MAX,
            carry: Vec::new(),
            continues: false,
            lines_read: 0,
        }
    }

    /// Set a custom name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Split lines on `terminator` instead of `\n`.
    pub fn with_terminator(mut self, terminator: char) -> Self {
        self.terminator = terminator;
        self
    }

    /// Bound every read to what `max_line_len` characters can occupy.
    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.set_framing(self.terminator, max_line_len);
        self
    }

    /// Get the number of reads that returned data so far.
    ///
    /// A line cut at the read limit counts once per piece.
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }
}

impl ReaderSource<BufReader<File>> {
    /// Open a file for line-by-line reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)).with_name(format!("filesrc:{}", path.display())))
    }
}

impl<R: BufRead + Send> LineSource for ReaderSource<R> {
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = std::mem::take(&mut self.carry);
        let mut encoded = [0u8; 4];
        let terminator = self.terminator.encode_utf8(&mut encoded).as_bytes();
        let last = terminator[terminator.len() - 1];

        while buf.len() < self.limit && !buf.ends_with(terminator) {
            let available = self.reader.fill_buf()?;
            if available.is_empty() {
                break;
            }
            let window = &available[..available.len().min(self.limit - buf.len())];
            let used = match window.iter().position(|&b| b == last) {
                Some(i) => i + 1,
                None => window.len(),
            };
            buf.extend_from_slice(&window[..used]);
            self.reader.consume(used);
        }

        if buf.is_empty() {
            self.continues = false;
            return Ok(None);
        }
        self.continues = buf.len() >= self.limit && !buf.ends_with(terminator);
        if self.continues {
            // An incomplete trailing character belongs to the next piece.
            if let Err(e) = std::str::from_utf8(&buf) {
                if e.error_len().is_none() {
                    self.carry = buf.split_off(e.valid_up_to());
                }
            }
        }
        self.lines_read += 1;

        let line = match String::from_utf8(buf) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(
                    source = %self.name,
                    line = self.lines_read,
                    "replacing invalid UTF-8 in input"
                );
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        Ok(Some(line))
    }

    fn set_framing(&mut self, terminator: char, max_line_len: usize) {
        self.terminator = terminator;
        // Enough bytes for max_line_len + 1 characters of any width, so a cut
        // piece is always oversized and a fitting line is never cut.
        self.limit = max_line_len.saturating_add(1).saturating_mul(4);
    }

    fn line_continues(&self) -> bool {
        self.continues
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Yields a fixed list of lines, exactly as given.
///
/// # Example
///
/// ```rust
/// use linefold::stage::{IterSource, LineSource};
///
/// let mut src = IterSource::new(["ab", "cd"]);
/// assert_eq!(src.read_line().unwrap().as_deref(), Some("ab"));
/// ```
pub struct IterSource {
    lines: std::vec::IntoIter<String>,
}

impl IterSource {
    /// Create a source over the given lines.
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect::<Vec<_>>().into_iter(),
        }
    }
}

impl LineSource for IterSource {
    fn read_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.next())
    }

    fn name(&self) -> &str {
        "itersrc"
    }
}

/// The first stage: reads input lines and feeds channel A.
///
/// Recognizes the stop sentinel and bounds every line to the agreed maximum
/// length before it enters the pipeline.
#[derive(Debug, Clone)]
pub struct SourceStage {
    stop_sentinel: Option<String>,
    terminator: char,
    max_line_len: usize,
    oversize: OversizePolicy,
}

impl SourceStage {
    /// Create a source stage from the pipeline configuration.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            stop_sentinel: config.stop_sentinel.clone(),
            terminator: config.terminator,
            max_line_len: config.max_line_len,
            oversize: config.oversize,
        }
    }

    /// Check whether a line is the stop sentinel, ignoring its terminator.
    pub fn is_stop(&self, line: &str) -> bool {
        match &self.stop_sentinel {
            Some(sentinel) => line.strip_suffix(self.terminator).unwrap_or(line) == sentinel,
            None => false,
        }
    }

    /// Apply the oversize policy to one input line.
    pub fn bound(&self, line: String) -> Result<Vec<String>> {
        let (body, terminated) = match line.strip_suffix(self.terminator) {
            Some(body) => (body, true),
            None => (line.as_str(), false),
        };
        let len = body.chars().count();
        if len <= self.max_line_len {
            return Ok(vec![line]);
        }

        match self.oversize {
            OversizePolicy::Reject => Err(Error::OversizedLine {
                len,
                max: self.max_line_len,
            }),
            OversizePolicy::Truncate => {
                tracing::warn!(
                    len = len,
                    max = self.max_line_len,
                    "truncating oversized input line"
                );
                let mut kept: String = body.chars().take(self.max_line_len).collect();
                if terminated {
                    kept.push(self.terminator);
                }
                Ok(vec![kept])
            }
            OversizePolicy::Split => {
                let chars: Vec<char> = body.chars().collect();
                let mut chunks: Vec<String> = chars
                    .chunks(self.max_line_len)
                    .map(|chunk| chunk.iter().collect())
                    .collect();
                if terminated {
                    if let Some(last) = chunks.last_mut() {
                        last.push(self.terminator);
                    }
                }
                tracing::debug!(len = len, chunks = chunks.len(), "splitting oversized input line");
                Ok(chunks)
            }
        }
    }

    /// Read `source` until it is exhausted or the stop sentinel appears,
    /// pushing every line onto `output`, then close `output`.
    ///
    /// Pieces of a line the source cut at its read limit count as one input
    /// line and are never taken for the stop sentinel.
    ///
    /// On error `output` is left open; the pipeline cancels it.
    pub fn run<S: LineSource + ?Sized>(
        &self,
        source: &mut S,
        output: &BoundedChannel<String>,
    ) -> Result<StageReport> {
        let metrics = StageMetrics::new(SOURCE_STAGE);
        let mut report = StageReport::new(SOURCE_STAGE);
        tracing::debug!(source = %source.name(), "source stage started");

        let mut continuation = false;
        let reason = loop {
            let Some(line) = source.read_line()? else {
                break StopReason::EndOfInput;
            };
            let continues = source.line_continues();

            if !continuation {
                report.items_in += 1;
                metrics.record_in();
                observability::record_line_read(SOURCE_STAGE);

                if !continues && self.is_stop(&line) {
                    tracing::debug!(line = report.items_in, "stop sentinel received");
                    break StopReason::StopSentinel;
                }
            }

            if continuation && self.oversize == OversizePolicy::Truncate {
                // Tail of a line already truncated: only its terminator is kept.
                if line.ends_with(self.terminator) {
                    output.push(self.terminator.to_string())?;
                    report.items_out += 1;
                    metrics.record_out();
                }
            } else {
                for chunk in self.bound(line)? {
                    output.push(chunk)?;
                    report.items_out += 1;
                    metrics.record_out();
                }
            }
            continuation = continues;
        };

        observability::trace_eos(SOURCE_STAGE, report.items_in);
        output.close();
        observability::trace_close(SOURCE_STAGE, output.name());
        report.stop = Some(reason);
        Ok(report)
    }
}
