use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use calendar::{json_source::JsonFileCalendarSource, CalendarSyncModule};
use chrono::Local;
use collection::{
    collector::{CollectionSettings, DataCollectionModule},
    TrackedSample,
};
use futures::future::OptionFuture;
use processing::{recorder::ActivityRecorder, ProcessingModule};
use reload::ConfigReloadModule;
use storage::record_storage::{ActivityStore, CalendarStore, SqliteStore};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    config::LiveConfig,
    utils::clock::{Clock, DefaultClock},
    window_api::{command::CommandWindowSampler, WindowSampler},
};

pub mod args;
pub mod calendar;
pub mod collection;
pub mod processing;
pub mod reload;
pub mod shutdown;
pub mod storage;

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    // Configuration problems are fatal, the daemon must not run with rules nobody wrote.
    let config = Arc::new(LiveConfig::load(config_path.as_deref())?);
    let snapshot = config.snapshot();
    let database = snapshot.config.database_path(&dir);
    info!("Using database {database:?}");
    let store = Arc::new(SqliteStore::open(&database)?);
    let sampler = CommandWindowSampler::new(&snapshot.config.monitor.sampler_command)?;

    std::env::set_current_dir("/")?;

    let (sender, receiver) = mpsc::channel::<TrackedSample>(10);
    let shutdown_token = CancellationToken::new();

    let collector = create_collector(
        sender,
        sampler,
        &shutdown_token,
        CollectionSettings::from(&snapshot.config.monitor),
        DefaultClock,
    );
    let processor = create_processor(store.clone(), receiver, config.clone());
    let reloader =
        ConfigReloadModule::new(config.clone(), shutdown_token.clone(), Box::new(DefaultClock));
    let calendar = snapshot.config.calendar.enabled.then(|| {
        create_calendar_sync(
            store.clone(),
            &snapshot.config.calendar_source_path(),
            &config,
            &shutdown_token,
        )
    });

    let (_, collection_result, processing_result, _, calendar_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        collector.run(),
        processor.run(),
        reloader.run(),
        OptionFuture::from(calendar.map(|module| module.run())),
    );

    if let Err(collection_result) = collection_result {
        error!("Collection module got an error {:?}", collection_result);
    }

    if let Err(processing_result) = processing_result {
        error!("Processing module got an error {:?}", processing_result);
    }

    if let Some(Err(calendar_result)) = calendar_result {
        error!("Calendar module got an error {:?}", calendar_result);
    }

    Ok(())
}

fn create_collector(
    sender: mpsc::Sender<TrackedSample>,
    sampler: impl WindowSampler + 'static,
    shutdown_token: &CancellationToken,
    settings: CollectionSettings,
    clock: impl Clock,
) -> DataCollectionModule {
    DataCollectionModule::new(
        sender,
        Box::new(sampler),
        shutdown_token.clone(),
        settings,
        Box::new(clock),
    )
}

fn create_processor<S: ActivityStore + CalendarStore>(
    store: S,
    receiver: mpsc::Receiver<TrackedSample>,
    config: Arc<LiveConfig>,
) -> ProcessingModule<ActivityRecorder<S>> {
    ProcessingModule::new(receiver, ActivityRecorder::new(store, config))
}

fn create_calendar_sync<S: CalendarStore>(
    store: S,
    source_path: &Path,
    config: &LiveConfig,
    shutdown_token: &CancellationToken,
) -> CalendarSyncModule<S, Local> {
    let snapshot = config.snapshot();
    let source = JsonFileCalendarSource::new(
        source_path.to_path_buf(),
        snapshot.config.calendar.calendar_names.clone(),
        Local,
    );
    CalendarSyncModule::new(
        store,
        Box::new(source),
        shutdown_token.clone(),
        &snapshot.config.calendar,
        Local,
        Box::new(DefaultClock),
    )
}
