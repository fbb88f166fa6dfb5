//! Imports calendar events so the recorder can tell when the user is in a meeting.

pub mod json_source;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as DayDuration, TimeZone, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[cfg(test)]
use mockall::automock;

use crate::{
    config::CalendarConfig,
    utils::{
        clock::{today_in, Clock},
        time::day_start,
    },
};

use super::storage::{entities::CalendarEvent, record_storage::CalendarStore};

/// Anything that can list calendar events for a time range.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Events overlapping `[from, to)`.
    async fn fetch_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>>;
}

/// Periodically copies events from a [CalendarSource] into the store.
pub struct CalendarSyncModule<S, Tz: TimeZone> {
    store: S,
    source: Box<dyn CalendarSource>,
    shutdown: CancellationToken,
    interval: Duration,
    days_ahead: u32,
    tz: Tz,
    time_provider: Box<dyn Clock>,
}

impl<S: CalendarStore, Tz: TimeZone> CalendarSyncModule<S, Tz> {
    pub fn new(
        store: S,
        source: Box<dyn CalendarSource>,
        shutdown: CancellationToken,
        config: &CalendarConfig,
        tz: Tz,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            store,
            source,
            shutdown,
            interval: Duration::from_secs(config.sync_interval_seconds.max(1)),
            days_ahead: config.days_ahead.max(1),
            tz,
            time_provider,
        }
    }

    /// Imports events from the start of the local day up to `days_ahead` days later. Returns the
    /// number of stored events.
    pub async fn sync_once(&self) -> Result<usize> {
        let now = self.time_provider.time();
        let today = today_in(self.time_provider.as_ref(), &self.tz);
        let from = day_start(today, &self.tz);
        let to = day_start(
            today + DayDuration::days(i64::from(self.days_ahead)),
            &self.tz,
        );

        let events = self.source.fetch_events(from, to).await?;
        let count = events.len();
        for event in events {
            self.store.upsert_calendar_event(event, now).await?;
        }
        Ok(count)
    }

    pub async fn run(self) -> Result<()> {
        loop {
            match self.sync_once().await {
                Ok(count) => info!("Synchronized {count} calendar events"),
                Err(e) => error!("Calendar synchronization failed {e:?}"),
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep(self.interval) => ()
            }
        }
    }
}
