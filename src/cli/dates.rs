use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, ValueEnum};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

pub const DATE_HELP: &str = "Examples are \"yesterday\", \"2025-03-15\", \"15/03/2025\"";
pub const MOMENT_HELP: &str =
    "Examples are \"1 hour ago\", \"12:00 16/03/2025\", \"2025-03-16T12:00:00+09:00\"";

pub(crate) fn validation_error(message: String) -> anyhow::Error {
    Args::command()
        .error(clap::error::ErrorKind::ValueValidation, message)
        .into()
}

/// Parses a point in time. RFC 3339 is accepted as is, anything else goes through natural
/// language parsing relative to now.
pub fn parse_moment(input: &str, style: DateStyle) -> Result<DateTime<Utc>> {
    if let Ok(v) = DateTime::parse_from_rfc3339(input) {
        return Ok(v.to_utc());
    }
    parse_date_string(input, Local::now(), style.into())
        .map(|v| v.to_utc())
        .map_err(|e| validation_error(format!("Failed to validate date {input:?}: {e}")))
}

/// Parses a calendar day, falling back to `today` when nothing was given.
pub fn parse_day(input: Option<&str>, style: DateStyle, today: NaiveDate) -> Result<NaiveDate> {
    let Some(input) = input else {
        return Ok(today);
    };
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date);
    }
    Ok(parse_moment(input, style)?
        .with_timezone(&Local)
        .date_naive())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{parse_day, parse_moment, DateStyle};

    #[test]
    fn iso_inputs_are_exact() {
        let today = NaiveDate::from_ymd_opt(2018, 7, 4).unwrap();
        assert_eq!(parse_day(None, DateStyle::Uk, today).unwrap(), today);
        assert_eq!(
            parse_day(Some("2018-07-01"), DateStyle::Uk, today).unwrap(),
            NaiveDate::from_ymd_opt(2018, 7, 1).unwrap()
        );
        assert_eq!(
            parse_moment("2018-07-04T09:00:00+09:00", DateStyle::Uk).unwrap(),
            Utc.with_ymd_and_hms(2018, 7, 4, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_moment("not a date at all", DateStyle::Us).is_err());
    }
}
