//! Folds a day of activity records into fixed-width wall-clock blocks. Each block suggests a
//! task and cost category by duration-weighted majority vote, which can then be committed back
//! with a time-scoped retag.

use std::{fmt, str::FromStr};

use anyhow::anyhow;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::Serialize;

use crate::{daemon::storage::entities::ActivityRecord, utils::time::day_bounds};

const TOP_APPS: usize = 3;
const MAX_TITLES: usize = 5;
const MINUTES_PER_DAY: u32 = 24 * 60;

/// Width of a block in minutes, between 1 and a whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockWidth(u32);

impl BlockWidth {
    pub const DEFAULT: BlockWidth = BlockWidth(10);

    pub fn new_opt(minutes: u32) -> Option<Self> {
        (1..=MINUTES_PER_DAY).contains(&minutes).then_some(Self(minutes))
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }
}

impl Default for BlockWidth {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FromStr for BlockWidth {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let minutes = s.parse::<u32>()?;
        Self::new_opt(minutes)
            .ok_or_else(|| anyhow!("Block width must be between 1 and {MINUTES_PER_DAY} minutes"))
    }
}

impl fmt::Display for BlockWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBlock {
    pub block_start: DateTime<Utc>,
    pub block_end: DateTime<Utc>,
    pub total_seconds: f64,
    pub record_count: usize,
    /// At most three apps, longest first.
    pub top_apps: Vec<(String, f64)>,
    /// Distinct titles in order of appearance, at most five.
    pub titles: Vec<String>,
    pub task_category: String,
    pub cost_category: String,
}

impl TimeBlock {
    /// `HH:MM-HH:MM` in the given zone.
    pub fn label<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: fmt::Display,
    {
        format!(
            "{}-{}",
            self.block_start.with_timezone(tz).format("%H:%M"),
            self.block_end.with_timezone(tz).format("%H:%M")
        )
    }
}

/// Weights keyed by name in first-seen order. Small enough that linear lookup wins over a map,
/// and the order gives deterministic tie-breaking.
#[derive(Debug, Default)]
struct Tally(Vec<(String, f64)>);

impl Tally {
    fn add(&mut self, key: &str, weight: f64) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some((_, total)) => *total += weight,
            None => self.0.push((key.to_string(), weight)),
        }
    }

    /// Heaviest key. Equal weights go to whichever was seen first.
    fn winner(&self) -> String {
        let mut best: Option<&(String, f64)> = None;
        for entry in &self.0 {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(k, _)| k.clone()).unwrap_or_default()
    }

    fn top(mut self, n: usize) -> Vec<(String, f64)> {
        // Stable sort keeps first-seen order among equal weights.
        self.0
            .sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        self.0.truncate(n);
        self.0
    }
}

struct BlockBuilder {
    key: (NaiveDate, u32),
    block_start: DateTime<Utc>,
    block_end: DateTime<Utc>,
    total_seconds: f64,
    record_count: usize,
    apps: Tally,
    task_votes: Tally,
    cost_votes: Tally,
    titles: Vec<String>,
}

impl BlockBuilder {
    fn open<Tz: TimeZone>(key: (NaiveDate, u32), width: BlockWidth, tz: &Tz) -> Self {
        let (date, minute_of_day) = key;
        let (day_start, day_end) = day_bounds(date, tz);
        let local_start = NaiveTime::from_hms_opt(minute_of_day / 60, minute_of_day % 60, 0)
            .map(|time| date.and_time(time))
            .and_then(|naive| tz.from_local_datetime(&naive).earliest())
            .map(|v| v.to_utc())
            // DST gap: fall back to counting minutes from midnight.
            .unwrap_or(day_start + Duration::minutes(i64::from(minute_of_day)));
        let block_end =
            (local_start + Duration::minutes(i64::from(width.minutes()))).min(day_end);

        Self {
            key,
            block_start: local_start,
            block_end,
            total_seconds: 0.,
            record_count: 0,
            apps: Tally::default(),
            task_votes: Tally::default(),
            cost_votes: Tally::default(),
            titles: vec![],
        }
    }

    fn fold(&mut self, record: &ActivityRecord) {
        let weight = record.duration_seconds;
        self.total_seconds += weight;
        self.record_count += 1;
        self.apps.add(&record.app_name, weight);
        // Untagged records carry no suggestion.
        if !record.task_category.is_empty() {
            self.task_votes.add(&record.task_category, weight);
        }
        if !record.cost_category.is_empty() {
            self.cost_votes.add(&record.cost_category, weight);
        }

        let title = record.display_title();
        if !title.is_empty()
            && self.titles.len() < MAX_TITLES
            && !self.titles.iter().any(|t| t == title)
        {
            self.titles.push(title.to_string());
        }
    }

    fn finish(self) -> TimeBlock {
        TimeBlock {
            block_start: self.block_start,
            block_end: self.block_end,
            total_seconds: self.total_seconds,
            record_count: self.record_count,
            task_category: self.task_votes.winner(),
            cost_category: self.cost_votes.winner(),
            top_apps: self.apps.top(TOP_APPS),
            titles: self.titles,
        }
    }
}

fn block_key<Tz: TimeZone>(
    timestamp: &DateTime<Utc>,
    width: BlockWidth,
    tz: &Tz,
) -> (NaiveDate, u32) {
    let local = timestamp.with_timezone(tz);
    let minute_of_day = local.hour() * 60 + local.minute();
    (
        local.date_naive(),
        minute_of_day / width.minutes() * width.minutes(),
    )
}

/// Groups records, which must be sorted by timestamp, into blocks. Idle records are ignored.
pub fn aggregate_blocks<Tz: TimeZone>(
    records: &[ActivityRecord],
    width: BlockWidth,
    tz: &Tz,
) -> Vec<TimeBlock> {
    let mut blocks = vec![];
    let mut current: Option<BlockBuilder> = None;

    for record in records.iter().filter(|r| !r.is_idle) {
        let key = block_key(&record.timestamp, width, tz);
        match current.as_mut() {
            Some(block) if block.key == key => block.fold(record),
            _ => {
                if let Some(finished) = current.take() {
                    blocks.push(finished.finish());
                }
                let mut block = BlockBuilder::open(key, width, tz);
                block.fold(record);
                current = Some(block);
            }
        }
    }

    if let Some(finished) = current {
        blocks.push(finished.finish());
    }
    blocks
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, FixedOffset, TimeZone, Utc};

    use crate::daemon::storage::entities::ActivityRecord;

    use super::{aggregate_blocks, BlockWidth};

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 7, 4, hour, minute, second).unwrap()
    }

    fn record(timestamp: DateTime<Utc>, app: &str, task: &str, seconds: f64) -> ActivityRecord {
        ActivityRecord {
            id: 0,
            timestamp,
            app_name: app.into(),
            window_title: format!("{app} - {task}"),
            bundle_id: String::new(),
            url: String::new(),
            tab_title: String::new(),
            duration_seconds: seconds,
            is_idle: false,
            cost_category: "CustomDevCost".into(),
            task_category: task.into(),
            app_category: "development".into(),
            notes: None,
        }
    }

    #[test]
    fn block_width_bounds() {
        assert!(BlockWidth::new_opt(0).is_none());
        assert!(BlockWidth::new_opt(1441).is_none());
        assert_eq!(BlockWidth::new_opt(1440).map(|w| w.minutes()), Some(1440));
        assert!("abc".parse::<BlockWidth>().is_err());
        assert_eq!("15".parse::<BlockWidth>().unwrap().minutes(), 15);
    }

    #[test]
    fn majority_vote_is_duration_weighted() {
        let records = [
            record(at(9, 0, 0), "Code", "A", 30.),
            record(at(9, 1, 0), "Code", "B", 50.),
            record(at(9, 2, 0), "Code", "A", 10.),
        ];
        let blocks = aggregate_blocks(&records, BlockWidth::DEFAULT, &Utc);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].task_category, "B");
        assert_eq!(blocks[0].total_seconds, 90.);
        assert_eq!(blocks[0].record_count, 3);

        let records = [
            record(at(9, 0, 0), "Code", "A", 30.),
            record(at(9, 1, 0), "Code", "B", 30.),
            record(at(9, 2, 0), "Code", "A", 10.),
            record(at(9, 3, 0), "Code", "B", 10.),
        ];
        let blocks = aggregate_blocks(&records, BlockWidth::DEFAULT, &Utc);
        assert_eq!(blocks[0].task_category, "A");
    }

    #[test]
    fn zero_duration_records_do_not_win() {
        let records = [
            record(at(9, 0, 0), "Code", "A", 0.),
            record(at(9, 1, 0), "Code", "B", 5.),
        ];
        let blocks = aggregate_blocks(&records, BlockWidth::DEFAULT, &Utc);
        assert_eq!(blocks[0].task_category, "B");
        assert_eq!(blocks[0].record_count, 2);
    }

    #[test]
    fn blocks_are_aligned_to_midnight() {
        let records = [
            record(at(9, 9, 59), "Code", "A", 5.),
            record(at(9, 10, 0), "Code", "A", 5.),
            record(at(9, 44, 0), "Code", "A", 5.),
        ];
        let blocks = aggregate_blocks(&records, BlockWidth::new_opt(15).unwrap(), &Utc);
        let starts = blocks.iter().map(|b| b.block_start).collect::<Vec<_>>();
        assert_eq!(starts, vec![at(9, 0, 0), at(9, 30, 0)]);
        assert_eq!(blocks[0].block_end, at(9, 15, 0));
        assert_eq!(blocks[0].record_count, 2);
        assert_eq!(blocks[1].label(&Utc), "09:30-09:45");
    }

    #[test]
    fn block_end_does_not_pass_midnight() {
        let records = [record(at(23, 30, 0), "Code", "A", 5.)];
        let blocks = aggregate_blocks(&records, BlockWidth::new_opt(7 * 60).unwrap(), &Utc);
        assert_eq!(blocks[0].block_start, at(21, 0, 0));
        assert_eq!(
            blocks[0].block_end,
            Utc.with_ymd_and_hms(2018, 7, 5, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn keys_follow_display_zone() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let records = [record(at(0, 5, 0), "Code", "A", 5.)];
        let blocks = aggregate_blocks(&records, BlockWidth::DEFAULT, &tokyo);
        assert_eq!(blocks[0].block_start, at(0, 0, 0));
        assert_eq!(blocks[0].label(&tokyo), "09:00-09:10");
    }

    #[test]
    fn idle_records_are_ignored() {
        let mut idle = record(at(9, 0, 0), "Code", "A", 500.);
        idle.is_idle = true;
        let records = [idle, record(at(9, 30, 0), "Code", "B", 5.)];
        let blocks = aggregate_blocks(&records, BlockWidth::DEFAULT, &Utc);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].task_category, "B");
    }

    #[test]
    fn apps_and_titles_are_capped() {
        let mut records = vec![];
        for (i, app) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
            records.push(record(at(9, 0, i as u32), app, "A", (i + 1) as f64));
        }
        records.push(record(at(9, 0, 10), "f", "A", 1.));
        let mut empty_title = record(at(9, 0, 11), "g", "A", 0.);
        empty_title.window_title = String::new();
        records.push(empty_title);

        let blocks = aggregate_blocks(&records, BlockWidth::DEFAULT, &Utc);
        assert_eq!(
            blocks[0].top_apps,
            vec![("f".to_string(), 7.), ("e".to_string(), 5.), ("d".to_string(), 4.)]
        );
        assert_eq!(blocks[0].titles.len(), 5);
        assert_eq!(blocks[0].titles[0], "a - A");
    }

    #[test]
    fn tab_title_is_preferred() {
        let mut browsing = record(at(9, 0, 0), "Safari", "A", 5.);
        browsing.tab_title = "Docs".into();
        let blocks = aggregate_blocks(&[browsing], BlockWidth::DEFAULT, &Utc);
        assert_eq!(blocks[0].titles, vec!["Docs".to_string()]);
    }
}
