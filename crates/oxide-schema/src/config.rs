//! Driver configuration.

use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;

use crate::error::{Result, SchemaError};

/// Connection and schema settings handed to a driver at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Connection string, e.g. `sqlite::memory:` or `sqlite://app.db`.
    pub url: String,
    /// Prefix prepended to every table name.
    pub prefix: String,
    /// Timezone used to render timestamp defaults, `UTC` or `+HH:MM`.
    pub timezone: String,
    /// Reconnect and replay a statement once when the connection drops.
    pub reconnect: bool,
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// Enforce foreign keys on connect (SQLite only).
    pub foreign_keys: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            prefix: String::new(),
            timezone: "UTC".to_string(),
            reconnect: true,
            max_connections: 1,
            foreign_keys: true,
        }
    }
}

impl DriverConfig {
    /// Creates a configuration for the given connection string.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Builds a configuration from `DATABASE_URL`, `DATABASE_PREFIX` and
    /// `DATABASE_TIMEZONE`, falling back to defaults for unset variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.url = url;
        }
        if let Ok(prefix) = std::env::var("DATABASE_PREFIX") {
            config.prefix = prefix;
        }
        if let Ok(timezone) = std::env::var("DATABASE_TIMEZONE") {
            config.timezone = timezone;
        }
        config
    }

    /// Sets the table prefix.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the timezone.
    #[must_use]
    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Enables or disables the reconnect-and-retry on connection loss.
    #[must_use]
    pub const fn reconnect(mut self, enabled: bool) -> Self {
        self.reconnect = enabled;
        self
    }

    /// Sets the maximum number of pooled connections.
    #[must_use]
    pub const fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Enables or disables foreign key enforcement on connect.
    #[must_use]
    pub const fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Parses the configured timezone.
    pub fn timezone_offset(&self) -> Result<FixedOffset> {
        parse_offset(&self.timezone)
    }
}

/// Parses `UTC`, `Z` or a `±HH:MM` offset.
pub(crate) fn parse_offset(value: &str) -> Result<FixedOffset> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("utc") || value == "Z" {
        return Ok(utc());
    }

    let invalid = || SchemaError::driver(format!("Invalid timezone offset: {value}"));
    let (sign, rest) = match value.as_bytes().first() {
        Some(b'+') => (1, &value[1..]),
        Some(b'-') => (-1, &value[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !digits(hours) || !digits(minutes) {
        return Err(invalid());
    }
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes >= 60 {
        return Err(invalid());
    }
    let seconds = i32::try_from(hours * 3600 + minutes * 60).map_err(|_| invalid())?;
    FixedOffset::east_opt(sign * seconds).ok_or_else(invalid)
}

/// The UTC offset.
pub(crate) fn utc() -> FixedOffset {
    Utc.fix()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::default();
        assert!(config.reconnect);
        assert!(config.foreign_keys);
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.timezone_offset().unwrap(), utc());
    }

    #[test]
    fn test_builder() {
        let config = DriverConfig::new("sqlite://app.db")
            .prefix("app_")
            .timezone("+02:30")
            .reconnect(false);
        assert_eq!(config.url, "sqlite://app.db");
        assert_eq!(config.prefix, "app_");
        assert!(!config.reconnect);
        assert_eq!(
            config.timezone_offset().unwrap().local_minus_utc(),
            2 * 3600 + 30 * 60
        );
    }

    #[test]
    fn test_parse_offsets() {
        assert_eq!(parse_offset("-05:00").unwrap().local_minus_utc(), -5 * 3600);
        assert_eq!(parse_offset("+01").unwrap().local_minus_utc(), 3600);
        assert!(parse_offset("Europe/Paris").is_err());
        assert!(parse_offset("+01:75").is_err());
    }

    #[test]
    fn test_out_of_range_offsets_are_errors() {
        let err = parse_offset("+999999:00").unwrap_err();
        assert!(matches!(err, SchemaError::Driver(_)));
        assert!(parse_offset("+24:00").is_err());
        assert!(parse_offset("+01:-30").is_err());
        assert!(parse_offset("--01:00").is_err());
        assert!(parse_offset("++01:00").is_err());
        assert_eq!(parse_offset("+23:59").unwrap().local_minus_utc(), 23 * 3600 + 59 * 60);

        let config = DriverConfig::new("sqlite::memory:").timezone("+4294967295:00");
        assert!(config.timezone_offset().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: DriverConfig =
            serde_json::from_str(r#"{"url": "sqlite::memory:", "prefix": "t_"}"#).unwrap();
        assert_eq!(config.prefix, "t_");
        assert_eq!(config.timezone, "UTC");
        assert!(config.reconnect);
    }
}
