//! Pipeline configuration.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Default number of items each channel can hold.
pub const DEFAULT_CAPACITY: usize = 50;
/// Default maximum input line length, in characters.
pub const DEFAULT_MAX_LINE_LEN: usize = 1000;
/// Default output line width, in characters.
pub const DEFAULT_WIDTH: usize = 80;
/// Default stop sentinel.
pub const DEFAULT_STOP_SENTINEL: &str = "STOP";

/// What the source stage does with an input line longer than
/// [`PipelineConfig::max_line_len`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OversizePolicy {
    /// Deliver the line as consecutive chunks of at most `max_line_len`
    /// characters. Only the last chunk keeps the terminator.
    #[default]
    Split,
    /// Keep the first `max_line_len` characters and drop the rest.
    Truncate,
    /// Fail the source with [`Error::OversizedLine`].
    Reject,
}

impl fmt::Display for OversizePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OversizePolicy::Split => "split",
            OversizePolicy::Truncate => "truncate",
            OversizePolicy::Reject => "reject",
        })
    }
}

impl FromStr for OversizePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "split" => Ok(OversizePolicy::Split),
            "truncate" => Ok(OversizePolicy::Truncate),
            "reject" => Ok(OversizePolicy::Reject),
            other => Err(Error::InvalidConfig(format!(
                "unknown oversize policy '{}' (expected split, truncate or reject)",
                other
            ))),
        }
    }
}

/// Configuration for a [`Pipeline`](crate::pipeline::Pipeline).
///
/// # Example
///
/// ```rust
/// use linefold::config::PipelineConfig;
///
/// let config = PipelineConfig::default()
///     .with_width(40)
///     .with_marker('*', '#');
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Items each of the three channels can hold.
    pub capacity: usize,
    /// Maximum input line length in characters, excluding the terminator.
    pub max_line_len: usize,
    /// Output line width in characters.
    pub width: usize,
    /// Line terminator replaced by a space in the join stage.
    pub terminator: char,
    /// Character whose adjacent pairs are folded.
    pub marker: char,
    /// Replacement for one folded marker pair.
    pub substitute: char,
    /// Input line that ends the stream early, if any.
    pub stop_sentinel: Option<String>,
    /// Handling of over-long input lines.
    pub oversize: OversizePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            width: DEFAULT_WIDTH,
            terminator: '\n',
            marker: '+',
            substitute: '^',
            stop_sentinel: Some(DEFAULT_STOP_SENTINEL.to_string()),
            oversize: OversizePolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Set the channel capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the maximum input line length.
    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    /// Set the output width.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Set the line terminator.
    pub fn with_terminator(mut self, terminator: char) -> Self {
        self.terminator = terminator;
        self
    }

    /// Set the marker character and its substitute.
    pub fn with_marker(mut self, marker: char, substitute: char) -> Self {
        self.marker = marker;
        self.substitute = substitute;
        self
    }

    /// Set the stop sentinel.
    pub fn with_stop_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.stop_sentinel = Some(sentinel.into());
        self
    }

    /// Disable the stop sentinel; only end of input ends the stream.
    pub fn without_stop_sentinel(mut self) -> Self {
        self.stop_sentinel = None;
        self
    }

    /// Set the oversize policy.
    pub fn with_oversize(mut self, policy: OversizePolicy) -> Self {
        self.oversize = policy;
        self
    }

    /// Largest item any channel may carry, in characters.
    ///
    /// One more than `max_line_len` to leave room for the terminator. The
    /// join stage preserves length and the fold stage never grows a line, so
    /// the same bound holds on every channel.
    pub fn item_limit(&self) -> usize {
        self.max_line_len + 1
    }

    /// Check the configuration for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidConfig("capacity must be at least 1".into()));
        }
        if self.width == 0 {
            return Err(Error::InvalidConfig("width must be at least 1".into()));
        }
        if self.max_line_len == 0 {
            return Err(Error::InvalidConfig(
                "max_line_len must be at least 1".into(),
            ));
        }
        if self.marker == self.terminator {
            return Err(Error::InvalidConfig(format!(
                "marker {:?} must differ from the line terminator",
                self.marker
            )));
        }
        if let Some(sentinel) = &self.stop_sentinel {
            if sentinel.is_empty() {
                return Err(Error::InvalidConfig("stop sentinel must not be empty".into()));
            }
            if sentinel.contains(self.terminator) {
                return Err(Error::InvalidConfig(
                    "stop sentinel must not contain the line terminator".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.capacity, 50);
        assert_eq!(config.max_line_len, 1000);
        assert_eq!(config.width, 80);
        assert_eq!(config.marker, '+');
        assert_eq!(config.substitute, '^');
        assert_eq!(config.stop_sentinel.as_deref(), Some("STOP"));
        assert_eq!(config.oversize, OversizePolicy::Split);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = PipelineConfig::default()
            .with_capacity(4)
            .with_width(10)
            .with_max_line_len(20)
            .with_marker('*', '#')
            .with_stop_sentinel("END")
            .with_oversize(OversizePolicy::Reject);
        assert_eq!(config.capacity, 4);
        assert_eq!(config.width, 10);
        assert_eq!(config.item_limit(), 21);
        assert_eq!(config.marker, '*');
        assert_eq!(config.substitute, '#');
        assert_eq!(config.stop_sentinel.as_deref(), Some("END"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_zero_values() {
        assert!(PipelineConfig::default().with_capacity(0).validate().is_err());
        assert!(PipelineConfig::default().with_width(0).validate().is_err());
        assert!(PipelineConfig::default().with_max_line_len(0).validate().is_err());
    }

    #[test]
    fn test_config_rejects_marker_terminator_clash() {
        let config = PipelineConfig::default().with_marker('\n', '^');
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_config_sentinel_rules() {
        assert!(PipelineConfig::default().with_stop_sentinel("").validate().is_err());
        assert!(PipelineConfig::default().with_stop_sentinel("a\nb").validate().is_err());
        let config = PipelineConfig::default().without_stop_sentinel();
        assert!(config.stop_sentinel.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_oversize_policy_parse() {
        assert_eq!("split".parse::<OversizePolicy>().unwrap(), OversizePolicy::Split);
        assert_eq!("TRUNCATE".parse::<OversizePolicy>().unwrap(), OversizePolicy::Truncate);
        assert_eq!("reject".parse::<OversizePolicy>().unwrap(), OversizePolicy::Reject);
        assert!("drop".parse::<OversizePolicy>().is_err());
        assert_eq!(OversizePolicy::Truncate.to_string(), "truncate");
    }
}
