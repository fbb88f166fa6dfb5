use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{classification::Classification, window_api::WindowSample};

/// One duration-weighted entry of the activity log. `timestamp` is the sample time, which ends
/// the `duration_seconds` charged to the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub app_name: String,
    pub window_title: String,
    pub bundle_id: String,
    pub url: String,
    pub tab_title: String,
    pub duration_seconds: f64,
    pub is_idle: bool,
    pub cost_category: String,
    pub task_category: String,
    pub app_category: String,
    pub notes: Option<String>,
}

impl ActivityRecord {
    /// Tab title for browsers, window title otherwise.
    pub fn display_title(&self) -> &str {
        if self.tab_title.is_empty() {
            &self.window_title
        } else {
            &self.tab_title
        }
    }
}

/// Fields of a record that is about to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub timestamp: DateTime<Utc>,
    pub app_name: String,
    pub window_title: String,
    pub bundle_id: String,
    pub url: String,
    pub tab_title: String,
    pub duration_seconds: f64,
    pub is_idle: bool,
    pub cost_category: String,
    pub task_category: String,
    pub app_category: String,
    pub notes: Option<String>,
}

impl NewActivity {
    pub fn from_sample(
        sample: WindowSample,
        duration_seconds: f64,
        classification: Classification,
    ) -> Self {
        Self {
            timestamp: sample.timestamp,
            app_name: sample.app_name,
            window_title: sample.window_title,
            bundle_id: sample.bundle_id,
            url: sample.url,
            tab_title: sample.tab_title,
            duration_seconds,
            is_idle: sample.is_idle,
            cost_category: classification.cost_category,
            task_category: classification.task_category,
            app_category: classification.app_category,
            notes: None,
        }
    }
}

pub const DEFAULT_ACTIVITY_LIMIT: usize = 1000;

/// Filter for [get_activities](super::record_storage::ActivityStore::get_activities). Bounds are
/// inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub app_name: Option<String>,
    pub cost_category: Option<String>,
    pub limit: usize,
}

impl Default for ActivityFilter {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            app_name: None,
            cost_category: None,
            limit: DEFAULT_ACTIVITY_LIMIT,
        }
    }
}

/// Tag fields to overwrite. Fields left as None keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagUpdate {
    pub task_category: Option<String>,
    pub cost_category: Option<String>,
}

impl TagUpdate {
    pub fn is_empty(&self) -> bool {
        self.task_category.is_none() && self.cost_category.is_none()
    }
}

/// Event imported from an external calendar. `event_id` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub event_id: String,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: String,
    pub calendar_id: String,
    pub all_day: bool,
}

/// User override attaching tags to a time range, independent of activity rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualTag {
    pub id: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub cost_category: Option<String>,
    pub task_category: Option<String>,
    pub notes: Option<String>,
}
