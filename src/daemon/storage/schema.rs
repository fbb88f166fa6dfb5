//! SQLite schema definition.
//!
//! Timestamps are UTC RFC 3339 strings with microseconds, so range filters are plain string
//! comparisons.

pub const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

-- Duration-weighted samples. Only the tag columns are ever rewritten.
CREATE TABLE IF NOT EXISTS activity_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    app_name TEXT NOT NULL DEFAULT '',
    window_title TEXT NOT NULL DEFAULT '',
    bundle_id TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL DEFAULT '',
    tab_title TEXT NOT NULL DEFAULT '',
    duration_seconds REAL NOT NULL DEFAULT 0,
    is_idle INTEGER NOT NULL DEFAULT 0,
    cost_category TEXT NOT NULL DEFAULT '',
    task_category TEXT NOT NULL DEFAULT '',
    app_category TEXT NOT NULL DEFAULT '',
    notes TEXT
);
CREATE INDEX IF NOT EXISTS idx_activity_timestamp ON activity_log(timestamp);
CREATE INDEX IF NOT EXISTS idx_activity_app ON activity_log(app_name);
CREATE INDEX IF NOT EXISTS idx_activity_cost ON activity_log(cost_category);

-- Imported from calendars, upserted by event_id
CREATE TABLE IF NOT EXISTS calendar_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    location TEXT NOT NULL DEFAULT '',
    calendar_id TEXT NOT NULL DEFAULT '',
    all_day INTEGER NOT NULL DEFAULT 0,
    synced_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_calendar_start ON calendar_events(start_time);

-- Manual time-range tags
CREATE TABLE IF NOT EXISTS manual_tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    cost_category TEXT,
    task_category TEXT,
    notes TEXT
);
CREATE INDEX IF NOT EXISTS idx_manual_tags_start ON manual_tags(start_time);
"#;
