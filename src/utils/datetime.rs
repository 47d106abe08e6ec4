//! Datetime parsing and formatting shared by the store and the extractor
//!
//! Timestamps are stored in SQLite as UTC text
//! (`YYYY-MM-DD HH:MM:SS.ffffff`), which keeps lexical and chronological
//! order identical.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum DateTimeError {
    #[error("Invalid datetime format: '{input}'")]
    InvalidFormat { input: String },

    #[error("Date out of range: {input}")]
    OutOfRange { input: String },
}

pub struct DateTimeParser;

impl DateTimeParser {
    /// Parse a timestamp in any of the formats the application writes or reads
    ///
    /// Supports RFC3339 with offset and the naive SQLite formats (assumed UTC).
    pub fn parse_flexible(datetime_str: &str) -> Result<DateTime<Utc>, DateTimeError> {
        let trimmed = datetime_str.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(dt.with_timezone(&Utc));
        }

        let naive_formats = [
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
        ];

        for format in &naive_formats {
            if let Ok(naive_dt) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(DateTime::from_naive_utc_and_offset(naive_dt, Utc));
            }
        }

        Err(DateTimeError::InvalidFormat {
            input: datetime_str.to_string(),
        })
    }

    /// Parse the compact `YYYYMMDD` upload date reported by yt-dlp
    pub fn parse_upload_date(raw: &str) -> Result<DateTime<Utc>, DateTimeError> {
        let date = NaiveDate::parse_from_str(raw.trim(), "%Y%m%d").map_err(|_| {
            DateTimeError::InvalidFormat {
                input: raw.to_string(),
            }
        })?;
        let naive = date.and_hms_opt(0, 0, 0).ok_or_else(|| DateTimeError::OutOfRange {
            input: raw.to_string(),
        })?;
        Ok(DateTime::from_naive_utc_and_offset(naive, Utc))
    }

    /// Convert a unix timestamp in seconds
    pub fn from_unix_seconds(seconds: i64) -> Result<DateTime<Utc>, DateTimeError> {
        Utc.timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| DateTimeError::OutOfRange {
                input: seconds.to_string(),
            })
    }

    pub fn format_for_storage(dt: &DateTime<Utc>) -> String {
        dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }

    /// Short form used by the dashboard
    pub fn format_for_display(dt: &DateTime<Utc>) -> String {
        dt.format("%Y-%m-%d %H:%M UTC").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let dt = DateTimeParser::parse_flexible("2024-05-01T12:00:00+02:00").unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_storage_format_round_trips() {
        let dt = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 15).unwrap()
            + chrono::Duration::microseconds(250);
        let stored = DateTimeParser::format_for_storage(&dt);
        assert_eq!(stored, "2024-05-01 08:30:15.000250");
        assert_eq!(DateTimeParser::parse_flexible(&stored).unwrap(), dt);
    }

    #[test]
    fn test_parse_plain_sqlite_timestamp() {
        let dt = DateTimeParser::parse_flexible("2024-05-01 08:30:15").unwrap();
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_upload_date() {
        let dt = DateTimeParser::parse_upload_date("20240229").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 2, 29));
        assert!(DateTimeParser::parse_upload_date("2024-02-29").is_err());
    }

    #[test]
    fn test_invalid_format() {
        assert_eq!(
            DateTimeParser::parse_flexible("yesterday"),
            Err(DateTimeError::InvalidFormat {
                input: "yesterday".to_string()
            })
        );
    }
}
