//! Plain output of report commands. Rows are tab separated so they can be piped into `column -t`
//! or a spreadsheet, `--json` prints the same data through serde.

use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::{
    analysis::{
        blocks::TimeBlock,
        summary::{HourlyRow, ProjectSummaryRow, WeeklyTrendRow},
        DayOverview,
    },
    daemon::storage::entities::{ActivityRecord, CalendarEvent, ManualTag},
    utils::{percentage::share_of, time::format_seconds},
};

/// Placeholder for empty categories so columns stay aligned.
const NONE: &str = "-";

fn or_none(value: &str) -> &str {
    if value.is_empty() {
        NONE
    } else {
        value
    }
}

fn local_time<Tz: TimeZone>(moment: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    moment.with_timezone(tz).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn print_rows(header: &[&str], rows: impl IntoIterator<Item = String>) {
    println!("{}", header.join("\t"));
    for row in rows {
        println!("{row}");
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn daily_rows(overview: &DayOverview) -> Vec<String> {
    overview
        .summary
        .iter()
        .map(|row| {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                row.app_name,
                or_none(&row.cost_category),
                or_none(&row.task_category),
                format_seconds(row.total_seconds),
                share_of(row.total_seconds, overview.total_seconds),
                row.record_count,
            )
        })
        .collect()
}

pub fn print_daily(overview: &DayOverview) {
    println!("{}\ttotal {}", overview.date, overview.total_work_time);
    print_rows(
        &["app", "cost", "task", "time", "share", "records"],
        daily_rows(overview),
    );
}

pub fn print_timeline<Tz: TimeZone>(records: &[ActivityRecord], tz: &Tz)
where
    Tz::Offset: Display,
{
    print_rows(
        &["time", "duration", "app", "title", "task", "cost"],
        records.iter().map(|r| {
            if r.is_idle {
                format!(
                    "{}\t{}\tidle",
                    local_time(&r.timestamp, tz),
                    format_seconds(r.duration_seconds)
                )
            } else {
                format!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    local_time(&r.timestamp, tz),
                    format_seconds(r.duration_seconds),
                    r.app_name,
                    r.display_title(),
                    or_none(&r.task_category),
                    or_none(&r.cost_category),
                )
            }
        }),
    );
}

pub fn print_hourly(rows: &[HourlyRow]) {
    print_rows(
        &["hour", "app", "task", "time"],
        rows.iter().map(|r| {
            format!(
                "{:02}:00\t{}\t{}\t{}",
                r.hour,
                r.app_name,
                or_none(&r.task_category),
                format_seconds(r.total_seconds)
            )
        }),
    );
}

pub fn print_projects(rows: &[ProjectSummaryRow]) {
    print_rows(
        &["cost", "task", "time", "days"],
        rows.iter().map(|r| {
            format!(
                "{}\t{}\t{}\t{}",
                r.cost_category,
                or_none(&r.task_category),
                format_seconds(r.total_seconds),
                r.active_days
            )
        }),
    );
}

pub fn print_weekly(rows: &[WeeklyTrendRow]) {
    print_rows(
        &["week", "task", "time"],
        rows.iter().map(|r| {
            format!(
                "{}\t{}\t{}",
                r.week,
                or_none(&r.task_category),
                format_seconds(r.total_seconds)
            )
        }),
    );
}

fn block_row<Tz: TimeZone>(block: &TimeBlock, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    let apps = block
        .top_apps
        .iter()
        .map(|(app, seconds)| format!("{app} ({})", format_seconds(*seconds)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        block.label(tz),
        format_seconds(block.total_seconds),
        or_none(&block.task_category),
        or_none(&block.cost_category),
        apps,
        block.titles.join(" | "),
    )
}

pub fn print_blocks<Tz: TimeZone>(blocks: &[TimeBlock], tz: &Tz)
where
    Tz::Offset: Display,
{
    print_rows(
        &["block", "time", "task", "cost", "apps", "titles"],
        blocks.iter().map(|b| block_row(b, tz)),
    );
}

pub fn print_activities<Tz: TimeZone>(records: &[ActivityRecord], tz: &Tz)
where
    Tz::Offset: Display,
{
    print_rows(
        &["id", "time", "duration", "app", "title", "task", "cost", "idle"],
        records.iter().map(|r| {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                r.id,
                local_time(&r.timestamp, tz),
                format_seconds(r.duration_seconds),
                r.app_name,
                r.display_title(),
                or_none(&r.task_category),
                or_none(&r.cost_category),
                r.is_idle,
            )
        }),
    );
}

pub fn print_calendar<Tz: TimeZone>(events: &[CalendarEvent], tz: &Tz)
where
    Tz::Offset: Display,
{
    print_rows(
        &["start", "end", "title", "calendar", "location"],
        events.iter().map(|e| {
            let (start, end) = if e.all_day {
                ("all day".to_string(), String::new())
            } else {
                (local_time(&e.start_time, tz), local_time(&e.end_time, tz))
            };
            format!(
                "{start}\t{end}\t{}\t{}\t{}",
                e.title,
                or_none(&e.calendar_id),
                or_none(&e.location)
            )
        }),
    );
}

pub fn print_manual_tags<Tz: TimeZone>(tags: &[ManualTag], tz: &Tz)
where
    Tz::Offset: Display,
{
    print_rows(
        &["id", "start", "end", "task", "cost", "notes"],
        tags.iter().map(|t| {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                t.id.map(|v| v.to_string()).unwrap_or_default(),
                local_time(&t.start_time, tz),
                local_time(&t.end_time, tz),
                or_none(t.task_category.as_deref().unwrap_or_default()),
                or_none(t.cost_category.as_deref().unwrap_or_default()),
                t.notes.as_deref().unwrap_or_default(),
            )
        }),
    );
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::analysis::{blocks::TimeBlock, summary::DailySummaryRow, DayOverview};

    use super::{block_row, daily_rows};

    #[test]
    fn daily_rows_show_share_of_total() {
        let overview = DayOverview {
            date: "2018-07-04".into(),
            total_seconds: 400.,
            total_work_time: "0h 6m".into(),
            summary: vec![
                DailySummaryRow {
                    app_name: "Code".into(),
                    cost_category: "Dev".into(),
                    task_category: "impl".into(),
                    total_seconds: 300.,
                    record_count: 60,
                },
                DailySummaryRow {
                    app_name: "Slack".into(),
                    cost_category: String::new(),
                    task_category: "communication".into(),
                    total_seconds: 100.,
                    record_count: 20,
                },
            ],
            hourly: vec![],
            calendar_events: vec![],
        };
        assert_eq!(
            daily_rows(&overview),
            vec![
                "Code\tDev\timpl\t5m0s\t75.0%\t60",
                "Slack\t-\tcommunication\t1m40s\t25.0%\t20",
            ]
        );
    }

    #[test]
    fn block_row_lists_apps_and_titles() {
        let block = TimeBlock {
            block_start: Utc.with_ymd_and_hms(2018, 7, 4, 9, 0, 0).unwrap(),
            block_end: Utc.with_ymd_and_hms(2018, 7, 4, 9, 10, 0).unwrap(),
            total_seconds: 600.,
            record_count: 120,
            top_apps: vec![("Code".into(), 480.), ("Slack".into(), 120.)],
            titles: vec!["main.rs".into(), "general".into()],
            task_category: "impl".into(),
            cost_category: String::new(),
        };
        assert_eq!(
            block_row(&block, &Utc),
            "09:00-09:10\t10m0s\timpl\t-\tCode (8m0s), Slack (2m0s)\tmain.rs | general"
        );
    }
}
