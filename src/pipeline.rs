//! The four-stage pipeline.
//!
//! ```text
//!  LineSource                                                        LineSink
//!      │                                                                 ▲
//!  [source] ──A──> [join: "\n" → " "] ──B──> [fold: "++" → "^"] ──C──> [sink: W columns]
//! ```
//!
//! Each stage runs on its own thread. The three channels are owned by the
//! [`Pipeline`] and borrowed by the stages for the duration of
//! [`Pipeline::run`], so no channel or stage outlives a run.
//!
//! End-of-stream cascades downstream one hop at a time: the source closes A,
//! the join stage closes B only after A is closed and drained, and so on.
//! The run finishes when the sink has drained C.
//!
//! If any stage fails, all three channels are cancelled so the remaining
//! stages wake up and exit, and the first real error is returned.

use crate::channel::{BoundedChannel, ChannelStats};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::observability;
use crate::stage::{
    FOLD_STAGE, JOIN_STAGE, LineJoin, LineSink, LineSource, MarkerFold, SINK_STAGE, SOURCE_STAGE,
    SinkStage, SourceStage, StageReport, StopReason, TransformStage,
};
use std::thread;

/// A fixed four-stage text pipeline.
///
/// # Example
///
/// ```rust
/// use linefold::config::PipelineConfig;
/// use linefold::pipeline::Pipeline;
/// use linefold::stage::{CollectSink, IterSource};
///
/// let pipeline = Pipeline::new(PipelineConfig::default().with_width(4)).unwrap();
/// let sink = CollectSink::new();
/// let lines = sink.handle();
///
/// pipeline.run(IterSource::new(["ab", "cd", "STOP"]), sink).unwrap();
/// assert_eq!(lines.lines(), ["abcd"]);
/// ```
#[derive(Debug)]
pub struct Pipeline {
    name: String,
    config: PipelineConfig,
    source_to_join: BoundedChannel<String>,
    join_to_fold: BoundedChannel<String>,
    fold_to_sink: BoundedChannel<String>,
}

impl Pipeline {
    /// Create a pipeline with three empty, open channels.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let limit = config.item_limit();
        let channel = |name: &str| -> Result<BoundedChannel<String>> {
            Ok(BoundedChannel::try_new(config.capacity)?
                .with_name(name)
                .with_item_limit(limit, |line: &String| line.chars().count()))
        };

        Ok(Self {
            name: "linefold".to_string(),
            source_to_join: channel("a")?,
            join_to_fold: channel("b")?,
            fold_to_sink: channel("c")?,
            config,
        })
    }

    /// Set a custom name (used in the pipeline tracing span).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Get the pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run all four stages to completion.
    ///
    /// Consumes the pipeline: every channel is closed by the end of a run.
    pub fn run<S, K>(self, mut source: S, mut sink: K) -> Result<PipelineReport>
    where
        S: LineSource,
        K: LineSink,
    {
        let _span = observability::instrument_pipeline(&self.name);
        observability::init_metrics();
        tracing::info!(
            capacity = self.config.capacity,
            width = self.config.width,
            "pipeline starting"
        );

        source.set_framing(self.config.terminator, self.config.max_line_len);
        let source_stage = SourceStage::new(&self.config);
        let mut join_stage = TransformStage::new(JOIN_STAGE, LineJoin::new(self.config.terminator));
        let mut fold_stage = TransformStage::new(
            FOLD_STAGE,
            MarkerFold::new(self.config.marker, self.config.substitute),
        );
        let sink_stage = SinkStage::new(self.config.width);

        let reports = thread::scope(|s| -> Result<[StageReport; 4]> {
            let handles = [
                self.spawn_stage(s, SOURCE_STAGE, || {
                    source_stage.run(&mut source, &self.source_to_join)
                }),
                self.spawn_stage(s, JOIN_STAGE, || {
                    join_stage.run(&self.source_to_join, &self.join_to_fold)
                }),
                self.spawn_stage(s, FOLD_STAGE, || {
                    fold_stage.run(&self.join_to_fold, &self.fold_to_sink)
                }),
                self.spawn_stage(s, SINK_STAGE, || sink_stage.run(&self.fold_to_sink, &mut sink)),
            ];

            let mut first_error: Option<Error> = None;
            let mut reports = Vec::with_capacity(4);
            for (stage, handle) in [SOURCE_STAGE, JOIN_STAGE, FOLD_STAGE, SINK_STAGE]
                .into_iter()
                .zip(handles)
            {
                let result = match handle {
                    Ok(handle) => handle
                        .join()
                        .unwrap_or_else(|_| Err(Error::StagePanicked(stage.to_string()))),
                    Err(e) => Err(e),
                };
                match result {
                    Ok(report) => reports.push(report),
                    Err(e) => first_error = Some(prefer_real_error(first_error, e)),
                }
            }

            if let Some(e) = first_error {
                return Err(e);
            }
            reports
                .try_into()
                .map_err(|_| Error::StagePanicked("pipeline".to_string()))
        })?;

        debug_assert!(self.fold_to_sink.is_terminal());
        let [source, join, fold, sink] = reports;
        let report = PipelineReport {
            source,
            join,
            fold,
            sink,
            channels: [
                self.source_to_join.stats(),
                self.join_to_fold.stats(),
                self.fold_to_sink.stats(),
            ],
        };
        tracing::info!(
            lines_read = report.source.items_in,
            lines_written = report.lines_written(),
            stop = ?report.stop_reason(),
            "pipeline finished"
        );
        Ok(report)
    }

    /// Spawn one stage on a named scoped thread.
    ///
    /// A failing or panicking stage cancels every channel so its neighbours
    /// do not block forever. If the thread cannot be spawned at all, the
    /// channels are cancelled as well and the spawn error is returned in
    /// place of the handle.
    fn spawn_stage<'scope, 'env, F>(
        &'env self,
        s: &'scope thread::Scope<'scope, 'env>,
        stage: &'static str,
        body: F,
    ) -> Result<thread::ScopedJoinHandle<'scope, Result<StageReport>>>
    where
        F: FnOnce() -> Result<StageReport> + Send + 'scope,
    {
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.name, stage))
            .spawn_scoped(s, move || {
                let _span = observability::instrument_stage(&self.name, stage);
                let _guard = CancelOnPanic(self);
                let result = body();
                if let Err(e) = &result {
                    if !e.is_cancelled() {
                        observability::trace_error(stage, e);
                    }
                    self.cancel_all();
                }
                result
            });

        spawned.map_err(|e| {
            self.cancel_all();
            Error::Io(e)
        })
    }

    fn cancel_all(&self) {
        self.source_to_join.cancel();
        self.join_to_fold.cancel();
        self.fold_to_sink.cancel();
    }
}

/// Cancels the pipeline's channels if the owning stage thread unwinds.
struct CancelOnPanic<'a>(&'a Pipeline);

impl Drop for CancelOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.cancel_all();
        }
    }
}

/// Keep the error that caused the shutdown, not the cancellations it triggered.
fn prefer_real_error(current: Option<Error>, next: Error) -> Error {
    match current {
        Some(current) if !current.is_cancelled() => current,
        Some(current) if next.is_cancelled() => current,
        _ => next,
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Source stage counters.
    pub source: StageReport,
    /// Line-join stage counters.
    pub join: StageReport,
    /// Marker-fold stage counters.
    pub fold: StageReport,
    /// Sink stage counters.
    pub sink: StageReport,
    /// Final statistics of channels A, B and C.
    pub channels: [ChannelStats; 3],
}

impl PipelineReport {
    /// Why the source stopped reading.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.source.stop
    }

    /// Number of output lines written by the sink.
    pub fn lines_written(&self) -> u64 {
        self.sink.items_out
    }
}

/// Run `lines` through a pipeline built from `config` and return the output.
///
/// ```rust
/// use linefold::config::PipelineConfig;
///
/// let out = linefold::pipeline::process(PipelineConfig::default().with_width(4), ["12345"]).unwrap();
/// assert_eq!(out, ["1234", "5"]);
/// ```
pub fn process<I, S>(config: PipelineConfig, lines: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let sink = crate::stage::CollectSink::new();
    let handle = sink.handle();
    Pipeline::new(config)?.run(crate::stage::IterSource::new(lines), sink)?;
    Ok(handle.lines())
}
