use std::{future::Future, ops::Deref, path::Path, sync::Arc};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{
    params, params_from_iter,
    types::{Type, Value},
    Connection, OptionalExtension, Row,
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::utils::time::{from_storage, to_storage};

use super::{
    entities::{ActivityFilter, ActivityRecord, CalendarEvent, ManualTag, NewActivity, TagUpdate},
    schema::SCHEMA,
};

/// Interface for abstracting storage of the activity log.
pub trait ActivityStore {
    /// Appends a record and returns its id.
    fn insert_activity(&self, record: NewActivity) -> impl Future<Output = Result<i64>>;

    /// Records matching the filter, newest first. Bounds are inclusive.
    fn get_activities(
        &self,
        filter: ActivityFilter,
    ) -> impl Future<Output = Result<Vec<ActivityRecord>>>;

    /// Records with `start <= timestamp < end`, oldest first. Idle records included.
    fn records_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<ActivityRecord>>>;

    /// Rewrites tags of non-idle records of `app_name` with `start <= timestamp <= end`.
    /// Returns the number of rewritten rows.
    fn update_tags_by_app(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        app_name: &str,
        update: &TagUpdate,
    ) -> impl Future<Output = Result<usize>>;

    /// Rewrites tags of non-idle records with `start <= timestamp < end`.
    fn update_tags_by_time(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        update: &TagUpdate,
    ) -> impl Future<Output = Result<usize>>;

    fn insert_manual_tag(&self, tag: ManualTag) -> impl Future<Output = Result<i64>>;

    /// Manual tags overlapping `[start, end)`.
    fn manual_tags_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<ManualTag>>>;
}

impl<T: Deref> ActivityStore for T
where
    T::Target: ActivityStore,
{
    fn insert_activity(&self, record: NewActivity) -> impl Future<Output = Result<i64>> {
        self.deref().insert_activity(record)
    }

    fn get_activities(
        &self,
        filter: ActivityFilter,
    ) -> impl Future<Output = Result<Vec<ActivityRecord>>> {
        self.deref().get_activities(filter)
    }

    fn records_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<ActivityRecord>>> {
        self.deref().records_between(start, end)
    }

    fn update_tags_by_app(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        app_name: &str,
        update: &TagUpdate,
    ) -> impl Future<Output = Result<usize>> {
        self.deref().update_tags_by_app(start, end, app_name, update)
    }

    fn update_tags_by_time(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        update: &TagUpdate,
    ) -> impl Future<Output = Result<usize>> {
        self.deref().update_tags_by_time(start, end, update)
    }

    fn insert_manual_tag(&self, tag: ManualTag) -> impl Future<Output = Result<i64>> {
        self.deref().insert_manual_tag(tag)
    }

    fn manual_tags_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<ManualTag>>> {
        self.deref().manual_tags_between(start, end)
    }
}

/// Interface for calendar events imported by the calendar collaborator.
pub trait CalendarStore {
    /// Inserts the event or replaces the stored one with the same `event_id`.
    fn upsert_calendar_event(
        &self,
        event: CalendarEvent,
        synced_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>>;

    /// Events starting within `[start, end)`, earliest first.
    fn calendar_events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<CalendarEvent>>>;

    /// Non-all-day event with `start_time <= at <= end_time`. The latest starting one wins
    /// when meetings overlap.
    fn current_meeting(
        &self,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<CalendarEvent>>>;
}

impl<T: Deref> CalendarStore for T
where
    T::Target: CalendarStore,
{
    fn upsert_calendar_event(
        &self,
        event: CalendarEvent,
        synced_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> {
        self.deref().upsert_calendar_event(event, synced_at)
    }

    fn calendar_events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<CalendarEvent>>> {
        self.deref().calendar_events_between(start, end)
    }

    fn current_meeting(
        &self,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<CalendarEvent>>> {
        self.deref().current_meeting(at)
    }
}

/// The main realization of [ActivityStore] and [CalendarStore]. A single connection is shared
/// by the daemon tasks, so writes are serialized by the mutex.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {path:?}"))?;
        debug!("Opened database {path:?}");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

const ACTIVITY_COLUMNS: &str = "id, timestamp, app_name, window_title, bundle_id, url, tab_title, \
     duration_seconds, is_idle, cost_category, task_category, app_category, notes";

const CALENDAR_COLUMNS: &str =
    "event_id, title, description, start_time, end_time, location, calendar_id, all_day";

fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    from_storage(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn activity_from_row(row: &Row) -> rusqlite::Result<ActivityRecord> {
    Ok(ActivityRecord {
        id: row.get(0)?,
        timestamp: timestamp_column(row, 1)?,
        app_name: row.get(2)?,
        window_title: row.get(3)?,
        bundle_id: row.get(4)?,
        url: row.get(5)?,
        tab_title: row.get(6)?,
        duration_seconds: row.get(7)?,
        is_idle: row.get(8)?,
        cost_category: row.get(9)?,
        task_category: row.get(10)?,
        app_category: row.get(11)?,
        notes: row.get(12)?,
    })
}

fn calendar_from_row(row: &Row) -> rusqlite::Result<CalendarEvent> {
    Ok(CalendarEvent {
        event_id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        start_time: timestamp_column(row, 3)?,
        end_time: timestamp_column(row, 4)?,
        location: row.get(5)?,
        calendar_id: row.get(6)?,
        all_day: row.get(7)?,
    })
}

fn manual_tag_from_row(row: &Row) -> rusqlite::Result<ManualTag> {
    Ok(ManualTag {
        id: row.get(0)?,
        start_time: timestamp_column(row, 1)?,
        end_time: timestamp_column(row, 2)?,
        cost_category: row.get(3)?,
        task_category: row.get(4)?,
        notes: row.get(5)?,
    })
}

fn query_activities(
    conn: &Connection,
    sql: &str,
    values: Vec<Value>,
) -> Result<Vec<ActivityRecord>> {
    let mut statement = conn.prepare(sql)?;
    let rows = statement
        .query_map(params_from_iter(values), activity_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn update_tags(
    conn: &Connection,
    condition: &str,
    mut values: Vec<Value>,
    update: &TagUpdate,
) -> Result<usize> {
    if update.is_empty() {
        return Ok(0);
    }
    let mut assignments = Vec::new();
    if let Some(task) = &update.task_category {
        values.push(Value::Text(task.clone()));
        assignments.push(format!("task_category = ?{}", values.len()));
    }
    if let Some(cost) = &update.cost_category {
        values.push(Value::Text(cost.clone()));
        assignments.push(format!("cost_category = ?{}", values.len()));
    }
    let sql = format!(
        "UPDATE activity_log SET {} WHERE is_idle = 0 AND {condition}",
        assignments.join(", ")
    );
    let changed = conn.execute(&sql, params_from_iter(values))?;
    Ok(changed)
}

impl ActivityStore for SqliteStore {
    async fn insert_activity(&self, record: NewActivity) -> Result<i64> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO activity_log (timestamp, app_name, window_title, bundle_id, url, \
             tab_title, duration_seconds, is_idle, cost_category, task_category, app_category, notes) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                to_storage(&record.timestamp),
                record.app_name,
                record.window_title,
                record.bundle_id,
                record.url,
                record.tab_title,
                record.duration_seconds,
                record.is_idle,
                record.cost_category,
                record.task_category,
                record.app_category,
                record.notes,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn get_activities(&self, filter: ActivityFilter) -> Result<Vec<ActivityRecord>> {
        let mut conditions = vec!["1 = 1".to_string()];
        let mut values = Vec::new();
        let mut bind = |condition: &str, value: Value| {
            values.push(value);
            conditions.push(format!("{condition} ?{}", values.len()));
        };
        if let Some(start) = filter.start {
            bind("timestamp >=", Value::Text(to_storage(&start)));
        }
        if let Some(end) = filter.end {
            bind("timestamp <=", Value::Text(to_storage(&end)));
        }
        if let Some(app) = filter.app_name {
            bind("app_name =", Value::Text(app));
        }
        if let Some(cost) = filter.cost_category {
            bind("cost_category =", Value::Text(cost));
        }
        values.push(Value::Integer(filter.limit.try_into().unwrap_or(i64::MAX)));
        let sql = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activity_log WHERE {} \
             ORDER BY timestamp DESC, id DESC LIMIT ?{}",
            conditions.join(" AND "),
            values.len()
        );

        let conn = self.conn.lock().await;
        query_activities(&conn, &sql, values)
    }

    async fn records_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>> {
        let sql = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activity_log \
             WHERE timestamp >= ?1 AND timestamp < ?2 ORDER BY timestamp ASC, id ASC"
        );
        let conn = self.conn.lock().await;
        query_activities(
            &conn,
            &sql,
            vec![Value::Text(to_storage(&start)), Value::Text(to_storage(&end))],
        )
    }

    async fn update_tags_by_app(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        app_name: &str,
        update: &TagUpdate,
    ) -> Result<usize> {
        let conn = self.conn.lock().await;
        let changed = update_tags(
            &conn,
            "timestamp >= ?1 AND timestamp <= ?2 AND app_name = ?3",
            vec![
                Value::Text(to_storage(&start)),
                Value::Text(to_storage(&end)),
                Value::Text(app_name.to_string()),
            ],
            update,
        )?;
        debug!("Retagged {changed} records of {app_name}");
        Ok(changed)
    }

    async fn update_tags_by_time(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        update: &TagUpdate,
    ) -> Result<usize> {
        let conn = self.conn.lock().await;
        let changed = update_tags(
            &conn,
            "timestamp >= ?1 AND timestamp < ?2",
            vec![Value::Text(to_storage(&start)), Value::Text(to_storage(&end))],
            update,
        )?;
        debug!("Retagged {changed} records between {start} and {end}");
        Ok(changed)
    }

    async fn insert_manual_tag(&self, tag: ManualTag) -> Result<i64> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO manual_tags (start_time, end_time, cost_category, task_category, notes) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                to_storage(&tag.start_time),
                to_storage(&tag.end_time),
                tag.cost_category,
                tag.task_category,
                tag.notes,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn manual_tags_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ManualTag>> {
        let conn = self.conn.lock().await;
        let mut statement = conn.prepare(
            "SELECT id, start_time, end_time, cost_category, task_category, notes \
             FROM manual_tags WHERE start_time < ?2 AND end_time > ?1 ORDER BY start_time ASC",
        )?;
        let tags = statement
            .query_map(params![to_storage(&start), to_storage(&end)], manual_tag_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }
}

impl CalendarStore for SqliteStore {
    async fn upsert_calendar_event(
        &self,
        event: CalendarEvent,
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO calendar_events (event_id, title, description, start_time, end_time, \
             location, calendar_id, all_day, synced_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT(event_id) DO UPDATE SET title = excluded.title, \
             description = excluded.description, start_time = excluded.start_time, \
             end_time = excluded.end_time, location = excluded.location, \
             calendar_id = excluded.calendar_id, all_day = excluded.all_day, \
             synced_at = excluded.synced_at",
            params![
                event.event_id,
                event.title,
                event.description,
                to_storage(&event.start_time),
                to_storage(&event.end_time),
                event.location,
                event.calendar_id,
                event.all_day,
                to_storage(&synced_at),
            ],
        )?;
        Ok(())
    }

    async fn calendar_events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let conn = self.conn.lock().await;
        let mut statement = conn.prepare(&format!(
            "SELECT {CALENDAR_COLUMNS} FROM calendar_events \
             WHERE start_time >= ?1 AND start_time < ?2 ORDER BY start_time ASC"
        ))?;
        let events = statement
            .query_map(params![to_storage(&start), to_storage(&end)], calendar_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    async fn current_meeting(&self, at: DateTime<Utc>) -> Result<Option<CalendarEvent>> {
        let conn = self.conn.lock().await;
        let event = conn
            .query_row(
                &format!(
                    "SELECT {CALENDAR_COLUMNS} FROM calendar_events \
                     WHERE all_day = 0 AND start_time <= ?1 AND end_time >= ?1 \
                     ORDER BY start_time DESC LIMIT 1"
                ),
                params![to_storage(&at)],
                calendar_from_row,
            )
            .optional()?;
        Ok(event)
    }
}
