use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::{
    classification::classify,
    config::LiveConfig,
    daemon::{
        collection::TrackedSample,
        storage::{
            entities::NewActivity,
            record_storage::{ActivityStore, CalendarStore},
        },
    },
};

use super::module::EventProcessor;

/// Task category written for every sample taken during a calendar meeting.
pub const MEETING_TASK_CATEGORY: &str = "meeting";

/// Bridges [ProcessingModule](super::ProcessingModule) and the activity log: classifies each
/// sample with the current rules and appends it as a record.
pub struct ActivityRecorder<S> {
    store: S,
    config: Arc<LiveConfig>,
}

impl<S: ActivityStore + CalendarStore> ActivityRecorder<S> {
    pub fn new(store: S, config: Arc<LiveConfig>) -> Self {
        Self { store, config }
    }

    /// Calendar trouble never stops a sample from being recorded.
    async fn in_meeting(&self, message: &TrackedSample) -> bool {
        match self.store.current_meeting(message.sample.timestamp).await {
            Ok(Some(meeting)) => {
                debug!("Sample falls into meeting {:?}", meeting.title);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Could not check calendar, assuming no meeting: {e:?}");
                false
            }
        }
    }
}

impl<S: ActivityStore + CalendarStore> EventProcessor for ActivityRecorder<S> {
    async fn process_next(&mut self, message: TrackedSample) -> Result<()> {
        let snapshot = self.config.snapshot();
        let mut classification = classify(&message.sample, &snapshot.rules);

        if snapshot.config.calendar.enabled && self.in_meeting(&message).await {
            // Cost category from the rules is kept.
            classification.task_category = MEETING_TASK_CATEGORY.to_string();
        }

        let record =
            NewActivity::from_sample(message.sample, message.duration_seconds, classification);
        self.store.insert_activity(record).await?;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{DateTime, TimeZone, Utc};
    use tempfile::tempdir;

    use crate::{
        config::{Config, LiveConfig},
        daemon::{
            collection::TrackedSample,
            processing::module::EventProcessor,
            storage::{
                entities::{ActivityFilter, CalendarEvent},
                record_storage::{ActivityStore, CalendarStore, SqliteStore},
            },
        },
        window_api::WindowSample,
    };

    use super::ActivityRecorder;

    const RULES_YAML: &str = r#"
calendar:
  enabled: true
classification_rules:
  project_types:
    - type: custom-dev
      keywords: ["impulse-pj"]
      cost_category: CustomDevCost
  sub_phases:
    implementation: { keywords: ["VSCode"] }
"#;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 7, 4, 9, minute, 0).unwrap()
    }

    fn tracked(minute: u32, duration_seconds: f64) -> TrackedSample {
        TrackedSample {
            sample: WindowSample {
                app_name: "VSCode".into(),
                window_title: "repo: impulse-pj-42".into(),
                bundle_id: String::new(),
                url: String::new(),
                tab_title: String::new(),
                timestamp: at(minute),
                is_idle: false,
            },
            duration_seconds,
        }
    }

    fn live_config(dir: &std::path::Path) -> Result<Arc<LiveConfig>> {
        let config: Config = serde_yaml::from_str(RULES_YAML)?;
        Ok(Arc::new(LiveConfig::new(dir.join("timetracker.yaml"), config)?))
    }

    #[tokio::test]
    async fn records_classified_sample() -> Result<()> {
        let dir = tempdir()?;
        let store = Arc::new(SqliteStore::open_in_memory()?);
        let mut recorder = ActivityRecorder::new(store.clone(), live_config(dir.path())?);

        recorder.process_next(tracked(0, 5.)).await?;

        let records = store.get_activities(ActivityFilter::default()).await?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration_seconds, 5.);
        assert_eq!(records[0].task_category, "custom-dev-implementation");
        assert_eq!(records[0].cost_category, "CustomDevCost");
        assert!(!records[0].is_idle);
        Ok(())
    }

    #[tokio::test]
    async fn meeting_overrides_task_category_only() -> Result<()> {
        let dir = tempdir()?;
        let store = Arc::new(SqliteStore::open_in_memory()?);
        store
            .upsert_calendar_event(
                CalendarEvent {
                    event_id: "sync".into(),
                    title: "Weekly sync".into(),
                    description: String::new(),
                    start_time: at(10),
                    end_time: at(40),
                    location: String::new(),
                    calendar_id: "Work".into(),
                    all_day: false,
                },
                at(0),
            )
            .await?;
        let mut recorder = ActivityRecorder::new(store.clone(), live_config(dir.path())?);

        recorder.process_next(tracked(5, 5.)).await?;
        recorder.process_next(tracked(15, 5.)).await?;

        let records = store.get_activities(ActivityFilter::default()).await?;
        assert_eq!(records[0].task_category, "meeting");
        assert_eq!(records[0].cost_category, "CustomDevCost");
        assert_eq!(records[1].task_category, "custom-dev-implementation");
        Ok(())
    }
}
