//! Error types for linefold.

use thiserror::Error;

/// Result type alias using linefold's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for linefold operations.
///
/// The channel variants (`CapacityViolation`, `ClosedChannel`,
/// `PrematureClose`) are internal-invariant violations. A correctly wired
/// pipeline never produces them from external input.
#[derive(Error, Debug)]
pub enum Error {
    /// An item larger than the channel's agreed maximum was pushed.
    #[error("channel '{channel}': item of size {len} exceeds limit of {max}")]
    CapacityViolation {
        /// Channel name.
        channel: String,
        /// Measured size of the rejected item.
        len: usize,
        /// Installed limit.
        max: usize,
    },

    /// `push` was called after `close` on the same channel.
    #[error("channel '{channel}': push after close")]
    ClosedChannel {
        /// Channel name.
        channel: String,
    },

    /// A channel was closed before its upstream reached its terminal state.
    #[error("channel '{channel}' closed while upstream '{upstream}' still in flight")]
    PrematureClose {
        /// Channel being closed.
        channel: String,
        /// Upstream channel that was not yet drained.
        upstream: String,
    },

    /// The channel was cancelled while an operation was pending.
    #[error("channel '{channel}' cancelled")]
    Cancelled {
        /// Channel name.
        channel: String,
    },

    /// A timed push or pop expired.
    #[error("channel '{channel}': operation timed out")]
    Timeout {
        /// Channel name.
        channel: String,
    },

    /// An input line exceeded the configured maximum and the source rejects it.
    #[error("input line of {len} characters exceeds maximum of {max}")]
    OversizedLine {
        /// Length of the offending line in characters.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A stage thread panicked.
    #[error("stage '{0}' panicked")]
    StagePanicked(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error came from cancellation rather than a real failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}
