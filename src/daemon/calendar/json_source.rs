use std::{io::ErrorKind, path::PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::{daemon::storage::entities::CalendarEvent, utils::time::day_start};

use super::CalendarSource;

/// Calendars that never describe the user's own time.
const SYSTEM_CALENDARS: &[&str] = &[
    "Birthdays",
    "Holidays",
    "Siri Suggestions",
    "Scheduled Reminders",
    "日本の祝日",
    "誕生日",
    "Siriからの提案",
    "日時設定ありリマインダー",
];

#[derive(Debug, Deserialize)]
struct HelperEvent {
    #[serde(default)]
    event_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    start_time: String,
    end_time: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    calendar: String,
    #[serde(default)]
    all_day: bool,
}

/// Reads the JSON array written by an external calendar helper. Times without an offset are
/// local to `tz`.
pub struct JsonFileCalendarSource<Tz: TimeZone> {
    path: PathBuf,
    calendar_names: Vec<String>,
    tz: Tz,
}

impl<Tz: TimeZone> JsonFileCalendarSource<Tz> {
    pub fn new(path: PathBuf, calendar_names: Vec<String>, tz: Tz) -> Self {
        Self {
            path,
            calendar_names,
            tz,
        }
    }

    fn wanted(&self, calendar: &str) -> bool {
        !SYSTEM_CALENDARS.contains(&calendar)
            && (self.calendar_names.is_empty() || self.calendar_names.iter().any(|c| c == calendar))
    }

    fn parse_time(&self, raw: &str) -> Result<DateTime<Utc>> {
        if let Ok(v) = DateTime::parse_from_rfc3339(raw) {
            return Ok(v.to_utc());
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Ok(day_start(date, &self.tz));
        }
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
            .with_context(|| format!("Unrecognized event time {raw:?}"))?;
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|v| v.to_utc())
            .with_context(|| format!("Event time {raw:?} does not exist locally"))
    }

    fn convert(&self, event: HelperEvent) -> Result<CalendarEvent> {
        let event_id = if event.event_id.is_empty() {
            fallback_event_id(&event.calendar, &event.title, &event.start_time)
        } else {
            event.event_id
        };
        Ok(CalendarEvent {
            event_id,
            start_time: self.parse_time(&event.start_time)?,
            end_time: self.parse_time(&event.end_time)?,
            title: event.title,
            description: event.description,
            location: event.location,
            calendar_id: event.calendar,
            all_day: event.all_day,
        })
    }
}

/// Stable id for events the helper could not identify.
fn fallback_event_id(calendar: &str, title: &str, start: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(calendar.as_bytes());
    hasher.update(title.as_bytes());
    hasher.update(start.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl<Tz> CalendarSource for JsonFileCalendarSource<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: Send + Sync,
{
    async fn fetch_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Calendar file {:?} does not exist yet", self.path);
                return Ok(vec![]);
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", self.path))?,
        };

        let raw = serde_json::from_str::<Vec<HelperEvent>>(&content)
            .with_context(|| format!("Calendar file {:?} is not a JSON array", self.path))?;

        let mut events = vec![];
        for event in raw {
            if !self.wanted(&event.calendar) {
                continue;
            }
            match self.convert(event) {
                Ok(event) if event.start_time < to && event.end_time > from => events.push(event),
                Ok(_) => {}
                // ignore broken entries, the rest of the file is still usable
                Err(e) => warn!("Skipping calendar event: {e:?}"),
            }
        }
        Ok(events)
    }
}
