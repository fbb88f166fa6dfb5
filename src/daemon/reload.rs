use std::{sync::Arc, time::{Duration, SystemTime}};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{config::LiveConfig, utils::clock::Clock};

const DEFAULT_RELOAD_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Picks up configuration edits made while the daemon runs, such as tags added from the CLI.
/// A broken file keeps the previous rules active.
pub struct ConfigReloadModule {
    config: Arc<LiveConfig>,
    shutdown: CancellationToken,
    check_interval: Duration,
    last_modified: Option<SystemTime>,
    time_provider: Box<dyn Clock>,
}

impl ConfigReloadModule {
    pub fn new(
        config: Arc<LiveConfig>,
        shutdown: CancellationToken,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        let last_modified = modified_at(&config);
        Self {
            config,
            shutdown,
            check_interval: DEFAULT_RELOAD_CHECK_INTERVAL,
            last_modified,
            time_provider,
        }
    }

    /// Reloads when the file's modification time changed. Returns whether a reload was attempted.
    pub fn check_once(&mut self) -> bool {
        let modified = modified_at(&self.config);
        if modified.is_none() || modified == self.last_modified {
            return false;
        }
        self.last_modified = modified;
        if let Err(e) = self.config.reload() {
            warn!("Keeping previous configuration: {e:?}");
        }
        true
    }

    pub async fn run(mut self) -> Result<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep(self.check_interval) => ()
            }
            if self.check_once() {
                debug!("Configuration file changed");
            }
        }
    }
}

fn modified_at(config: &LiveConfig) -> Option<SystemTime> {
    std::fs::metadata(config.path())
        .and_then(|m| m.modified())
        .ok()
}

#[cfg(test)]
mod tests {
    use std::{
        fs::File,
        sync::Arc,
        time::{Duration, SystemTime},
    };

    use anyhow::Result;
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    use crate::{
        config::{LiveConfig, TagKind},
        utils::clock::DefaultClock,
    };

    use super::ConfigReloadModule;

    fn touch(path: &std::path::Path, seconds_later: u64) -> Result<()> {
        File::options()
            .append(true)
            .open(path)?
            .set_modified(SystemTime::now() + Duration::from_secs(seconds_later))?;
        Ok(())
    }

    #[test]
    fn reloads_only_after_change() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("timetracker.yaml");
        std::fs::write(&path, "classification_rules:\n  task_categories: [\"a\"]\n")?;

        let config = Arc::new(LiveConfig::load(Some(&path))?);
        let mut module = ConfigReloadModule::new(
            config.clone(),
            CancellationToken::new(),
            Box::new(DefaultClock),
        );
        assert!(!module.check_once());

        let writer = LiveConfig::load(Some(&path))?;
        assert!(writer.add_tag_value(TagKind::TaskCategories, "b")?);
        touch(&path, 5)?;

        assert!(module.check_once());
        assert_eq!(
            config.snapshot().config.tag_values(TagKind::TaskCategories),
            ["a".to_string(), "b".to_string()]
        );
        assert!(!module.check_once());
        Ok(())
    }

    #[test]
    fn broken_file_keeps_previous_rules() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("timetracker.yaml");
        std::fs::write(&path, "classification_rules:\n  task_categories: [\"a\"]\n")?;

        let config = Arc::new(LiveConfig::load(Some(&path))?);
        let mut module = ConfigReloadModule::new(
            config.clone(),
            CancellationToken::new(),
            Box::new(DefaultClock),
        );

        std::fs::write(&path, "classification_rules: [")?;
        touch(&path, 5)?;

        assert!(module.check_once());
        assert_eq!(
            config.snapshot().config.tag_values(TagKind::TaskCategories),
            ["a".to_string()]
        );
        Ok(())
    }
}
