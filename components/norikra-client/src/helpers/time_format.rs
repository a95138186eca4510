// Local crates
use crate::helpers::load_config::ConfigError;

// External crates
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use std::fmt::Write;

/// Default rendering of event times: `2013/05/14 17:57:59`
pub const DEFAULT_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Time zone event times are rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeZoneMode {
    #[default]
    Local,
    Utc,
}

/// Rendering failures of a single event time.
#[derive(Debug, thiserror::Error)]
pub enum TimeFormatError {
    #[error("event time {0} is out of the representable range")]
    OutOfRange(i64),
    #[error("event time {0} could not be rendered with the configured time format")]
    Render(i64),
}

/// Renders epoch seconds with a strftime pattern.
///
/// The pattern is checked once on construction, so rendering a valid
/// timestamp never fails afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFormatter {
    pattern: String,
    zone: TimeZoneMode,
}

impl TimeFormatter {
    /// Validate `pattern` and build a formatter for `zone`.
    pub fn new(pattern: impl Into<String>, zone: TimeZoneMode) -> Result<Self, ConfigError> {
        let pattern = pattern.into();
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::InvalidTimeFormat(pattern));
        }
        Ok(Self { pattern, zone })
    }

    /// The strftime pattern in use.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Render epoch seconds with the configured pattern and zone.
    pub fn render(&self, timestamp: i64) -> Result<String, TimeFormatError> {
        let utc: DateTime<Utc> =
            DateTime::from_timestamp(timestamp, 0).ok_or(TimeFormatError::OutOfRange(timestamp))?;

        let mut rendered = String::new();
        let result = match self.zone {
            TimeZoneMode::Utc => write!(rendered, "{}", utc.format(&self.pattern)),
            TimeZoneMode::Local => write!(
                rendered,
                "{}",
                utc.with_timezone(&Local).format(&self.pattern)
            ),
        };
        result.map_err(|_| TimeFormatError::Render(timestamp))?;

        Ok(rendered)
    }
}
