//! Configuration types for the traffic logger.
//!
//! This module contains the verbosity [`Level`], the [`TrafficLoggerConfig`] used to build a
//! [`TrafficLoggerLayer`](crate::TrafficLoggerLayer), and the errors raised while validating it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tag used when the configuration does not name one.
pub const DEFAULT_TAG: &str = "HTTP";

/// How much of each exchange gets logged.
///
/// Levels are ordered by increasing detail, and each level includes everything logged by the
/// levels below it.
///
/// # Examples
///
/// ```rust
/// use wiretap::Level;
///
/// assert!(Level::Body > Level::Headers);
/// assert_eq!("headers".parse::<Level>().unwrap(), Level::Headers);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// No logs. Requests are forwarded untouched.
    #[default]
    None,
    /// Logs request and response lines.
    ///
    /// ```text
    /// #1 Sending POST request http://example.com/greeting
    /// #1 Received response for http://example.com/greeting with 200 in 22ms
    /// ```
    Basic,
    /// Logs request and response lines and their respective headers.
    ///
    /// ```text
    /// #1 Sending POST request http://example.com/greeting
    /// ------
    /// Headers
    /// ------
    /// Content-Type: text/plain
    /// Content-Length: 3
    /// host: example.com
    /// ------
    /// ```
    Headers,
    /// Logs request and response lines, their headers and their bodies (if present and
    /// human-readable).
    ///
    /// ```text
    /// #1 Received response for http://example.com/greeting with 200 in 22ms
    /// ------
    /// Headers
    /// ------
    /// content-type: text/plain
    /// content-length: 6
    /// ------
    /// Body: Hello!
    /// ------
    /// ```
    Body,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::None => "none",
            Level::Basic => "basic",
            Level::Headers => "headers",
            Level::Body => "body",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Level::None),
            "basic" => Ok(Level::Basic),
            "headers" => Ok(Level::Headers),
            "body" => Ok(Level::Body),
            _ => Err(ConfigError::InvalidLevel(s.to_string())),
        }
    }
}

/// Errors raised while building a traffic logger from its configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("level is not set, use Level::None to disable logging")]
    MissingLevel,
    #[error("unknown log level `{0}` (expected none, basic, headers or body)")]
    InvalidLevel(String),
}

/// Configuration for the traffic logging middleware.
///
/// Both fields are optional so the struct can be deserialized from partial host configuration,
/// but a level is mandatory when the layer is built.
///
/// # Examples
///
/// ```rust
/// use wiretap::{Level, TrafficLoggerConfig};
///
/// let config = TrafficLoggerConfig::default()
///     .with_tag("payments-api")
///     .with_level(Level::Headers);
///
/// let from_json: TrafficLoggerConfig =
///     serde_json::from_str(r#"{ "level": "body" }"#).unwrap();
/// assert_eq!(from_json.level, Some(Level::Body));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficLoggerConfig {
    /// Label prefixed to every emitted line. Defaults to [`DEFAULT_TAG`].
    pub tag: Option<String>,
    /// Verbosity. Required.
    pub level: Option<Level>,
}

impl TrafficLoggerConfig {
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Resolve the configuration into a tag and level, applying defaults.
    pub(crate) fn resolve(self) -> Result<(String, Level), ConfigError> {
        let level = self.level.ok_or(ConfigError::MissingLevel)?;
        let tag = self.tag.unwrap_or_else(|| DEFAULT_TAG.to_string());
        Ok((tag, level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_by_detail() {
        assert!(Level::None < Level::Basic);
        assert!(Level::Basic < Level::Headers);
        assert!(Level::Headers < Level::Body);
    }

    #[test]
    fn level_parses_case_insensitively() {
        assert_eq!("BODY".parse::<Level>().unwrap(), Level::Body);
        assert_eq!(" Basic ".parse::<Level>().unwrap(), Level::Basic);
        assert_eq!(
            "verbose".parse::<Level>(),
            Err(ConfigError::InvalidLevel("verbose".to_string()))
        );
    }

    #[test]
    fn resolve_applies_default_tag() {
        let (tag, level) = TrafficLoggerConfig::default()
            .with_level(Level::Basic)
            .resolve()
            .unwrap();
        assert_eq!(tag, DEFAULT_TAG);
        assert_eq!(level, Level::Basic);
    }

    #[test]
    fn resolve_requires_level() {
        let result = TrafficLoggerConfig::default().with_tag("api").resolve();
        assert_eq!(result, Err(ConfigError::MissingLevel));
    }

    #[test]
    fn config_deserializes_from_partial_json() {
        let config: TrafficLoggerConfig =
            serde_json::from_str(r#"{ "tag": "billing", "level": "headers" }"#).unwrap();
        assert_eq!(config.tag.as_deref(), Some("billing"));
        assert_eq!(config.level, Some(Level::Headers));

        let empty: TrafficLoggerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, TrafficLoggerConfig::default());
    }
}
