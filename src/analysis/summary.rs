//! Grouping and summation over the activity log. Every function skips idle records and orders
//! rows deterministically; equal totals keep the order in which their group first appeared.

use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
};

use chrono::{NaiveDate, TimeZone, Timelike};
use serde::Serialize;

use crate::daemon::storage::entities::ActivityRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummaryRow {
    pub app_name: String,
    pub cost_category: String,
    pub task_category: String,
    pub total_seconds: f64,
    pub record_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyRow {
    pub hour: u32,
    pub app_name: String,
    pub task_category: String,
    pub total_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummaryRow {
    pub cost_category: String,
    pub task_category: String,
    pub total_seconds: f64,
    pub active_days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyTrendRow {
    /// `%Y-W%W`, weeks start on Monday.
    pub week: String,
    pub task_category: String,
    pub total_seconds: f64,
}

/// Rows keyed by group, kept in first-seen order.
struct Groups<K, R> {
    index: HashMap<K, usize>,
    rows: Vec<R>,
}

impl<K: Hash + Eq, R> Groups<K, R> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            rows: vec![],
        }
    }

    fn entry(&mut self, key: K, create: impl FnOnce() -> R) -> &mut R {
        let position = *self.index.entry(key).or_insert_with(|| {
            self.rows.push(create());
            self.rows.len() - 1
        });
        &mut self.rows[position]
    }

    fn into_rows(self) -> Vec<R> {
        self.rows
    }
}

fn by_total_desc<R>(rows: &mut [R], total: impl Fn(&R) -> f64) {
    rows.sort_by(|a, b| {
        total(b)
            .partial_cmp(&total(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn active(records: &[ActivityRecord]) -> impl Iterator<Item = &ActivityRecord> {
    records.iter().filter(|r| !r.is_idle)
}

/// Sum of non-idle durations.
pub fn total_seconds(records: &[ActivityRecord]) -> f64 {
    active(records).map(|r| r.duration_seconds).sum()
}

/// Per (app, cost category, task category), longest first.
pub fn daily_summary(records: &[ActivityRecord]) -> Vec<DailySummaryRow> {
    let mut groups = Groups::new();
    for record in active(records) {
        let row = groups.entry(
            (
                record.app_name.as_str(),
                record.cost_category.as_str(),
                record.task_category.as_str(),
            ),
            || DailySummaryRow {
                app_name: record.app_name.clone(),
                cost_category: record.cost_category.clone(),
                task_category: record.task_category.clone(),
                total_seconds: 0.,
                record_count: 0,
            },
        );
        row.total_seconds += record.duration_seconds;
        row.record_count += 1;
    }

    let mut rows = groups.into_rows();
    by_total_desc(&mut rows, |r| r.total_seconds);
    rows
}

/// Per (local hour, app, task category). Hours ascending, longest first within an hour.
pub fn hourly_breakdown<Tz: TimeZone>(records: &[ActivityRecord], tz: &Tz) -> Vec<HourlyRow> {
    let mut groups = Groups::new();
    for record in active(records) {
        let hour = record.timestamp.with_timezone(tz).hour();
        let row = groups.entry(
            (hour, record.app_name.as_str(), record.task_category.as_str()),
            || HourlyRow {
                hour,
                app_name: record.app_name.clone(),
                task_category: record.task_category.clone(),
                total_seconds: 0.,
            },
        );
        row.total_seconds += record.duration_seconds;
    }

    let mut rows = groups.into_rows();
    by_total_desc(&mut rows, |r| r.total_seconds);
    rows.sort_by_key(|r| r.hour);
    rows
}

/// Per (cost category, task category) with the number of distinct local days the pair was seen
/// on. Records without a cost category are left out.
pub fn project_summary<Tz: TimeZone>(
    records: &[ActivityRecord],
    tz: &Tz,
) -> Vec<ProjectSummaryRow> {
    let mut groups = Groups::new();
    for record in active(records).filter(|r| !r.cost_category.is_empty()) {
        let day = record.timestamp.with_timezone(tz).date_naive();
        let (row, days): &mut (ProjectSummaryRow, HashSet<NaiveDate>) = groups.entry(
            (record.cost_category.as_str(), record.task_category.as_str()),
            || {
                (
                    ProjectSummaryRow {
                        cost_category: record.cost_category.clone(),
                        task_category: record.task_category.clone(),
                        total_seconds: 0.,
                        active_days: 0,
                    },
                    HashSet::new(),
                )
            },
        );
        row.total_seconds += record.duration_seconds;
        days.insert(day);
        row.active_days = days.len();
    }

    let mut rows = groups
        .into_rows()
        .into_iter()
        .map(|(row, _)| row)
        .collect::<Vec<_>>();
    by_total_desc(&mut rows, |r| r.total_seconds);
    rows
}

/// Label of the Monday-based week `date` falls into.
pub fn week_label(date: NaiveDate) -> String {
    date.format("%Y-W%W").to_string()
}

/// Per (week, task category), weeks ascending.
pub fn weekly_trend<Tz: TimeZone>(records: &[ActivityRecord], tz: &Tz) -> Vec<WeeklyTrendRow> {
    let mut groups = Groups::new();
    for record in active(records) {
        let week = week_label(record.timestamp.with_timezone(tz).date_naive());
        let row = groups.entry((week.clone(), record.task_category.as_str()), || {
            WeeklyTrendRow {
                week,
                task_category: record.task_category.clone(),
                total_seconds: 0.,
            }
        });
        row.total_seconds += record.duration_seconds;
    }

    let mut rows = groups.into_rows();
    rows.sort_by(|a, b| a.week.cmp(&b.week));
    rows
}
