//! # linefold
//!
//! A four-stage text pipeline connected by bounded ring-buffer channels.
//!
//! ```text
//! input ─> source ─A─> join ─B─> fold ─C─> sink ─> output
//! ```
//!
//! - **source** reads lines and stops at end of input or at the stop
//!   sentinel (`STOP` by default)
//! - **join** replaces each trailing line terminator with a space
//! - **fold** collapses every adjacent marker pair (`++`) into one
//!   substitute (`^`), greedily from the left
//! - **sink** re-chunks the character stream into lines of a fixed width
//!   (80 by default) and flushes any remainder at the end
//!
//! Every channel is a [`BoundedChannel`](channel::BoundedChannel): a fixed
//! capacity circular queue with blocking `push`/`pop`, so a fast stage is
//! held back by a slow one instead of buffering without bound. End of
//! stream travels through the channels themselves: `pop` returns `None`
//! exactly when the channel is closed and drained.
//!
//! ## Quick Start
//!
//! ```rust
//! use linefold::prelude::*;
//!
//! let pipeline = Pipeline::new(PipelineConfig::default().with_width(4))?;
//! let sink = CollectSink::new();
//! let lines = sink.handle();
//!
//! pipeline.run(IterSource::new(["a++b", "cd", "STOP"]), sink)?;
//! assert_eq!(lines.lines(), ["a^bc", "d"]);
//! # Ok::<(), linefold::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod config;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod stage;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::channel::{BoundedChannel, ChannelStats};
    pub use crate::config::{OversizePolicy, PipelineConfig};
    pub use crate::error::{Error, Result};
    pub use crate::pipeline::{Pipeline, PipelineReport};
    pub use crate::stage::{
        CollectSink, IterSource, LineSink, LineSource, ReaderSource, StopReason, WriterSink,
    };
}

pub use error::{Error, Result};
