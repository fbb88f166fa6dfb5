use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    config::MonitorConfig,
    utils::clock::Clock,
    window_api::{ActiveWindowData, WindowSample, WindowSampler},
};

use super::{
    accounting::{DurationAccountant, TickOutcome},
    afk::AfkEvaluator,
    TrackedSample,
};

/// What one attempt to read the focused window produced.
#[derive(Debug)]
pub enum SampleOutcome {
    Captured(ActiveWindowData),
    Empty,
    Failed(anyhow::Error),
    TimedOut,
}

/// Timing knobs of the collector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionSettings {
    pub interval: Duration,
    pub sample_timeout: Duration,
    pub idle_threshold_seconds: u32,
}

impl From<&MonitorConfig> for CollectionSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_seconds.max(1)),
            sample_timeout: Duration::from_secs(config.sample_timeout_seconds.max(1)),
            idle_threshold_seconds: config.idle_threshold_seconds,
        }
    }
}

pub struct DataCollectionModule {
    next: mpsc::Sender<TrackedSample>,
    producer: Box<dyn WindowSampler>,
    shutdown: CancellationToken,
    afk_evaluator: AfkEvaluator,
    accountant: DurationAccountant,
    settings: CollectionSettings,
    time_provider: Box<dyn Clock>,
}

impl DataCollectionModule {
    pub fn new(
        next: mpsc::Sender<TrackedSample>,
        producer: Box<dyn WindowSampler>,
        shutdown: CancellationToken,
        settings: CollectionSettings,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            producer,
            shutdown,
            afk_evaluator: AfkEvaluator::from_seconds(settings.idle_threshold_seconds),
            accountant: DurationAccountant::new(settings.interval),
            settings,
            time_provider,
        }
    }

    async fn acquire(&mut self) -> SampleOutcome {
        match tokio::time::timeout(self.settings.sample_timeout, self.producer.sample()).await {
            Ok(Ok(Some(data))) => SampleOutcome::Captured(data),
            Ok(Ok(None)) => SampleOutcome::Empty,
            Ok(Err(e)) => SampleOutcome::Failed(e),
            Err(_) => SampleOutcome::TimedOut,
        }
    }

    /// Runs one poll. Returns the sample to persist, if the tick produced one.
    async fn tick(&mut self) -> Option<TrackedSample> {
        let data = match self.acquire().await {
            SampleOutcome::Captured(data) => data,
            SampleOutcome::Empty => {
                debug!("No focused window, skipping tick");
                return None;
            }
            SampleOutcome::Failed(e) => {
                warn!("Encountered an error during collection {e:?}");
                return None;
            }
            SampleOutcome::TimedOut => {
                warn!(
                    "Sampler did not answer within {:?}, skipping tick",
                    self.settings.sample_timeout
                );
                return None;
            }
        };

        let is_idle = self.afk_evaluator.is_afk(data.idle_ms);
        let now = self.time_provider.time();
        match self.accountant.observe(now, is_idle) {
            TickOutcome::IdleEntered => {
                info!("User went idle after {}ms without input", data.idle_ms);
                None
            }
            TickOutcome::StillIdle => None,
            TickOutcome::Active {
                duration_seconds,
                resumed,
            } => {
                if resumed {
                    info!("User is back");
                }
                Some(TrackedSample {
                    sample: WindowSample::from_window(data, now, false),
                    duration_seconds,
                })
            }
        }
    }

    /// Executes the collector event loop.
    pub async fn run(mut self) -> Result<()> {
        let mut collection_point = self.time_provider.instant();
        loop {
            collection_point += self.settings.interval;

            if let Some(record) = self.tick().await {
                let span = info_span!("Processing collected data");
                debug!("Sending message {:?}", record);
                self.next
                    .send(record)
                    .instrument(span)
                    .await
                    .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
            }

            tokio::select! {
                // Cancelation means we stop execution of the event loop. Which means we also drop
                // the sender channel and consequently stop processing module.
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(collection_point) => ()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use chrono::{TimeZone, Utc};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::{
        utils::{clock::TestClock, logging::TEST_LOGGING},
        window_api::{ActiveWindowData, MockWindowSampler},
    };

    use super::{CollectionSettings, DataCollectionModule};

    const SETTINGS: CollectionSettings = CollectionSettings {
        interval: Duration::from_secs(5),
        sample_timeout: Duration::from_secs(1),
        idle_threshold_seconds: 60,
    };

    fn window(title: &str, idle_ms: u32) -> ActiveWindowData {
        ActiveWindowData {
            process_name: "Code".into(),
            window_title: title.into(),
            idle_ms,
            ..Default::default()
        }
    }

    fn collector(
        sampler: MockWindowSampler,
        sender: mpsc::Sender<super::TrackedSample>,
        shutdown: &CancellationToken,
    ) -> DataCollectionModule {
        let clock = TestClock::starting_at(Utc.with_ymd_and_hms(2018, 7, 4, 9, 0, 0).unwrap());
        DataCollectionModule::new(
            sender,
            Box::new(sampler),
            shutdown.clone(),
            SETTINGS,
            Box::new(clock),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn failed_and_empty_ticks_are_skipped() -> Result<()> {
        *TEST_LOGGING;
        let mut sampler = MockWindowSampler::new();
        let mut answers = vec![
            Ok(Some(window("a", 0))),
            Err(anyhow!("osascript failed")),
            Ok(None),
            Ok(Some(window("b", 0))),
        ]
        .into_iter();
        sampler
            .expect_sample()
            .returning(move || answers.next().unwrap_or(Ok(None)));

        let (sender, mut receiver) = mpsc::channel(10);
        let shutdown = CancellationToken::new();
        let module = collector(sampler, sender, &shutdown);

        let (result, _) = tokio::join!(module.run(), async {
            tokio::time::sleep(Duration::from_millis(17_500)).await;
            shutdown.cancel();
        });
        result?;

        let first = receiver.recv().await.unwrap();
        assert_eq!(first.sample.window_title, "a");
        assert_eq!(first.duration_seconds, 0.);
        let second = receiver.recv().await.unwrap();
        assert_eq!(second.sample.window_title, "b");
        // Two skipped ticks in between, so the cap applies.
        assert_eq!(second.duration_seconds, 10.);
        assert!(receiver.recv().await.is_none());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn idle_ticks_are_not_sent() -> Result<()> {
        *TEST_LOGGING;
        let mut sampler = MockWindowSampler::new();
        let mut answers = vec![
            window("a", 0),
            window("a", 61_000),
            window("a", 66_000),
            window("a", 0),
            window("a", 0),
        ]
        .into_iter();
        sampler
            .expect_sample()
            .returning(move || Ok(answers.next()));

        let (sender, mut receiver) = mpsc::channel(10);
        let shutdown = CancellationToken::new();
        let module = collector(sampler, sender, &shutdown);

        let (result, _) = tokio::join!(module.run(), async {
            tokio::time::sleep(Duration::from_millis(22_500)).await;
            shutdown.cancel();
        });
        result?;

        let mut durations = vec![];
        while let Some(record) = receiver.recv().await {
            assert!(!record.sample.is_idle);
            durations.push(record.duration_seconds);
        }
        assert_eq!(durations, vec![0., 0., 5.]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_sampler_times_out() -> Result<()> {
        *TEST_LOGGING;
        struct Hanging;

        #[async_trait::async_trait]
        impl crate::window_api::WindowSampler for Hanging {
            async fn sample(&mut self) -> Result<Option<ActiveWindowData>> {
                std::future::pending().await
            }
        }

        let (sender, mut receiver) = mpsc::channel(10);
        let shutdown = CancellationToken::new();
        let clock = TestClock::starting_at(Utc.with_ymd_and_hms(2018, 7, 4, 9, 0, 0).unwrap());
        let module = DataCollectionModule::new(
            sender,
            Box::new(Hanging),
            shutdown.clone(),
            SETTINGS,
            Box::new(clock),
        );

        let (result, _) = tokio::join!(module.run(), async {
            tokio::time::sleep(Duration::from_secs(12)).await;
            shutdown.cancel();
        });
        result?;
        assert!(receiver.recv().await.is_none());
        Ok(())
    }
}
