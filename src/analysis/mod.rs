//! Read side of the tracker. [Reports] answers dashboard style questions about the activity log;
//! calendar days and hour or week keys are taken in the report's time zone.

pub mod blocks;
pub mod summary;

use anyhow::Result;
use blocks::{aggregate_blocks, BlockWidth, TimeBlock};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use summary::{
    daily_summary, hourly_breakdown, project_summary, total_seconds, weekly_trend,
    DailySummaryRow, HourlyRow, ProjectSummaryRow, WeeklyTrendRow,
};

use crate::{
    daemon::storage::{
        entities::{ActivityFilter, ActivityRecord, CalendarEvent, ManualTag, TagUpdate},
        record_storage::{ActivityStore, CalendarStore},
    },
    utils::{
        clock::{today_in, Clock},
        time::{date_label, day_bounds, day_start, format_work_time},
    },
};

pub const DEFAULT_PROJECT_DAYS: i64 = 7;
pub const DEFAULT_TREND_WEEKS: u32 = 4;

/// Everything shown for a single day at once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayOverview {
    pub date: String,
    pub total_seconds: f64,
    pub total_work_time: String,
    pub summary: Vec<DailySummaryRow>,
    pub hourly: Vec<HourlyRow>,
    pub calendar_events: Vec<CalendarEvent>,
}

pub struct Reports<S, Tz: TimeZone> {
    store: S,
    tz: Tz,
    clock: Box<dyn Clock>,
}

impl<S: ActivityStore + CalendarStore, Tz: TimeZone> Reports<S, Tz> {
    pub fn new(store: S, tz: Tz, clock: Box<dyn Clock>) -> Self {
        Self { store, tz, clock }
    }

    pub fn tz(&self) -> &Tz {
        &self.tz
    }

    pub fn today(&self) -> NaiveDate {
        today_in(self.clock.as_ref(), &self.tz)
    }

    fn bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        day_bounds(date, &self.tz)
    }

    /// All records of a day, idle included, oldest first.
    async fn day_records(&self, date: NaiveDate) -> Result<Vec<ActivityRecord>> {
        let (start, end) = self.bounds(date);
        self.store.records_between(start, end).await
    }

    pub async fn get_activities(&self, filter: ActivityFilter) -> Result<Vec<ActivityRecord>> {
        self.store.get_activities(filter).await
    }

    pub async fn get_daily_summary(&self, date: NaiveDate) -> Result<Vec<DailySummaryRow>> {
        Ok(daily_summary(&self.day_records(date).await?))
    }

    /// Every record of the day in order, idle ones included.
    pub async fn get_timeline(&self, date: NaiveDate) -> Result<Vec<ActivityRecord>> {
        self.day_records(date).await
    }

    pub async fn get_hourly_breakdown(&self, date: NaiveDate) -> Result<Vec<HourlyRow>> {
        Ok(hourly_breakdown(&self.day_records(date).await?, &self.tz))
    }

    /// Both ends are whole days and inclusive. Defaults to the last week up to today.
    pub async fn get_project_summary(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<ProjectSummaryRow>> {
        let today = self.today();
        let start = start.unwrap_or(today - Duration::days(DEFAULT_PROJECT_DAYS));
        let end = end.unwrap_or(today);
        let records = self
            .store
            .records_between(day_start(start, &self.tz), self.bounds(end).1)
            .await?;
        Ok(project_summary(&records, &self.tz))
    }

    /// Totals per week and task category starting `weeks` weeks before today.
    pub async fn get_weekly_trend(&self, weeks: u32) -> Result<Vec<WeeklyTrendRow>> {
        let today = self.today();
        let start = today - Duration::weeks(i64::from(weeks));
        let records = self
            .store
            .records_between(day_start(start, &self.tz), self.bounds(today).1)
            .await?;
        Ok(weekly_trend(&records, &self.tz))
    }

    pub async fn get_time_blocks(
        &self,
        date: NaiveDate,
        width: BlockWidth,
    ) -> Result<Vec<TimeBlock>> {
        Ok(aggregate_blocks(
            &self.day_records(date).await?,
            width,
            &self.tz,
        ))
    }

    pub async fn get_calendar_events(&self, date: NaiveDate) -> Result<Vec<CalendarEvent>> {
        let (start, end) = self.bounds(date);
        self.store.calendar_events_between(start, end).await
    }

    pub async fn get_manual_tags(&self, date: NaiveDate) -> Result<Vec<ManualTag>> {
        let (start, end) = self.bounds(date);
        self.store.manual_tags_between(start, end).await
    }

    /// Seconds of non-idle activity on `date`.
    pub async fn daily_total(&self, date: NaiveDate) -> Result<f64> {
        Ok(total_seconds(&self.day_records(date).await?))
    }

    pub async fn get_day_overview(&self, date: NaiveDate) -> Result<DayOverview> {
        let records = self.day_records(date).await?;
        let total = total_seconds(&records);
        Ok(DayOverview {
            date: date_label(date),
            total_seconds: total,
            total_work_time: format_work_time(total),
            summary: daily_summary(&records),
            hourly: hourly_breakdown(&records, &self.tz),
            calendar_events: self.get_calendar_events(date).await?,
        })
    }

    /// Retags one app's records, both ends inclusive.
    pub async fn retag_app(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        app_name: &str,
        update: &TagUpdate,
    ) -> Result<usize> {
        self.store
            .update_tags_by_app(start, end, app_name, update)
            .await
    }

    /// Retags every record of `[start, end)`, for example one block.
    pub async fn retag_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        update: &TagUpdate,
    ) -> Result<usize> {
        self.store.update_tags_by_time(start, end, update).await
    }

    pub async fn add_manual_tag(&self, tag: ManualTag) -> Result<i64> {
        self.store.insert_manual_tag(tag).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};

    use crate::{
        daemon::storage::{
            entities::{NewActivity, TagUpdate},
            record_storage::{ActivityStore, SqliteStore},
        },
        utils::clock::TestClock,
    };

    use super::{blocks::BlockWidth, Reports};

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 7, day, hour, minute, 0).unwrap()
    }

    fn activity(timestamp: DateTime<Utc>, cost: &str, task: &str, is_idle: bool) -> NewActivity {
        NewActivity {
            timestamp,
            app_name: "Code".into(),
            window_title: "main.rs".into(),
            bundle_id: String::new(),
            url: String::new(),
            tab_title: String::new(),
            duration_seconds: 5.,
            is_idle,
            cost_category: cost.into(),
            task_category: task.into(),
            app_category: "development".into(),
            notes: None,
        }
    }

    async fn reports() -> Result<Reports<Arc<SqliteStore>, Utc>> {
        let store = Arc::new(SqliteStore::open_in_memory()?);
        for record in [
            activity(at(4, 9, 0), "Dev", "impl", false),
            activity(at(4, 9, 1), "Dev", "impl", false),
            activity(at(4, 9, 2), "Dev", "impl", true),
            activity(at(4, 23, 59), "Dev", "review", false),
            activity(at(5, 0, 0), "Dev", "review", false),
            activity(at(1, 12, 0), "Ops", "deploy", false),
            activity(at(6, 12, 0), "", "meeting", false),
        ] {
            store.insert_activity(record).await?;
        }
        Ok(Reports::new(
            store,
            Utc,
            Box::new(TestClock::starting_at(at(6, 15, 0))),
        ))
    }

    fn day(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 7, day).unwrap()
    }

    #[tokio::test]
    async fn day_queries_respect_boundaries() -> Result<()> {
        let reports = reports().await?;
        assert_eq!(reports.get_timeline(day(4)).await?.len(), 4);
        assert_eq!(reports.daily_total(day(4)).await?, 15.);

        let overview = reports.get_day_overview(day(4)).await?;
        assert_eq!(overview.date, "2018-07-04");
        assert_eq!(overview.total_work_time, "0h 0m");
        assert_eq!(overview.summary[0].task_category, "impl");
        Ok(())
    }

    #[tokio::test]
    async fn project_summary_defaults_to_last_week() -> Result<()> {
        let reports = reports().await?;
        let rows = reports.get_project_summary(None, None).await?;
        let tasks = rows.iter().map(|r| r.task_category.as_str()).collect::<Vec<_>>();
        assert_eq!(tasks, vec!["impl", "review", "deploy"]);
        assert_eq!(rows[1].active_days, 2);

        let rows = reports
            .get_project_summary(Some(day(5)), Some(day(5)))
            .await?;
        assert_eq!(rows.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn weekly_trend_starts_weeks_ago() -> Result<()> {
        let reports = reports().await?;
        let rows = reports.get_weekly_trend(0).await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].task_category, "meeting");
        assert!(reports.get_weekly_trend(1).await?.len() >= 4);
        Ok(())
    }

    #[tokio::test]
    async fn blocks_can_be_committed_back() -> Result<()> {
        let reports = reports().await?;
        let blocks = reports.get_time_blocks(day(4), BlockWidth::DEFAULT).await?;
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].record_count, 2);

        let update = TagUpdate {
            task_category: Some("design".into()),
            cost_category: None,
        };
        let changed = reports
            .retag_range(blocks[0].block_start, blocks[0].block_end, &update)
            .await?;
        assert_eq!(changed, 2);
        let blocks = reports.get_time_blocks(day(4), BlockWidth::DEFAULT).await?;
        assert_eq!(blocks[0].task_category, "design");
        Ok(())
    }

    #[tokio::test]
    async fn empty_retag_changes_nothing() -> Result<()> {
        let reports = reports().await?;
        let (start, end) = (at(4, 0, 0), at(5, 0, 0));
        assert_eq!(reports.retag_range(start, end, &TagUpdate::default()).await?, 0);
        assert_eq!(
            reports
                .retag_app(start, end, "Code", &TagUpdate::default())
                .await?,
            0
        );
        let blocks = reports.get_time_blocks(day(4), BlockWidth::DEFAULT).await?;
        assert_eq!(blocks[0].task_category, "impl");
        Ok(())
    }

    #[tokio::test]
    async fn display_zone_moves_day_boundaries() -> Result<()> {
        let store = Arc::new(SqliteStore::open_in_memory()?);
        store
            .insert_activity(activity(at(4, 23, 59), "Dev", "review", false))
            .await?;
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let reports = Reports::new(store, tokyo, Box::new(TestClock::starting_at(at(6, 15, 0))));
        assert!(reports.get_timeline(day(4)).await?.is_empty());
        assert_eq!(reports.get_timeline(day(5)).await?.len(), 1);
        assert_eq!(reports.today(), day(7));
        Ok(())
    }
}
