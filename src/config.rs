//! Configuration management with YAML support.
//!
//! The file is read once at startup; an unreadable file or an invalid rule pattern stops the
//! process. [LiveConfig] keeps the parsed configuration together with the compiled
//! [ClassificationRuleSet] behind one pointer, so reloading or adding a tag swaps both at once.

use std::{
    fmt,
    marker::PhantomData,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{Arc, PoisonError, RwLock},
};

use anyhow::{anyhow, bail, Context, Result};
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};
use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::info;

use crate::classification::ClassificationRuleSet;

pub const CONFIG_FILE_NAME: &str = "timetracker.yaml";
const USER_CONFIG_PATH: &str = "~/.config/timetracker/timetracker.yaml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub calendar: CalendarConfig,

    #[serde(default)]
    pub classification_rules: RulesConfig,
}

/// Database configuration. Without a path the database lives in the application directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    #[serde(default = "default_idle_threshold_seconds")]
    pub idle_threshold_seconds: u32,

    #[serde(default = "default_sample_timeout_seconds")]
    pub sample_timeout_seconds: u64,

    /// Program and arguments printing the focused window as JSON.
    #[serde(default)]
    pub sampler_command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_calendar_source")]
    pub source_path: String,

    #[serde(default = "default_calendar_sync_seconds")]
    pub sync_interval_seconds: u64,

    #[serde(default = "default_days_ahead")]
    pub days_ahead: u32,

    /// Calendars to keep. Empty keeps every non-system calendar.
    #[serde(default)]
    pub calendar_names: Vec<String>,
}

/// Raw classification rules as written in the file. Compiled by
/// [ClassificationRuleSet::compile].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default = "default_project_type")]
    pub default_project_type: String,

    #[serde(default)]
    pub project_types: Vec<ProjectTypeConfig>,

    #[serde(default)]
    pub sub_phases: Ordered<PhaseConfig>,

    #[serde(default)]
    pub standalone_phases: Ordered<PhaseConfig>,

    /// Extends and overrides the built-in project type to cost category table.
    #[serde(default)]
    pub project_type_costs: Ordered<String>,

    #[serde(default)]
    pub task_categories: Vec<String>,

    #[serde(default)]
    pub cost_categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectTypeConfig {
    #[serde(rename = "type")]
    pub project_type: String,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cost_category: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseConfig {
    #[serde(default)]
    pub keywords: Vec<String>,
}

// Default value functions
fn default_interval_seconds() -> u64 {
    5
}

fn default_idle_threshold_seconds() -> u32 {
    300
}

fn default_sample_timeout_seconds() -> u64 {
    5
}

fn default_calendar_source() -> String {
    "~/.timetracker/cal_helper_output.json".to_string()
}

fn default_calendar_sync_seconds() -> u64 {
    3600
}

fn default_days_ahead() -> u32 {
    1
}

fn default_project_type() -> String {
    "custom-dev".to_string()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            idle_threshold_seconds: default_idle_threshold_seconds(),
            sample_timeout_seconds: default_sample_timeout_seconds(),
            sampler_command: Vec::new(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            source_path: default_calendar_source(),
            sync_interval_seconds: default_calendar_sync_seconds(),
            days_ahead: default_days_ahead(),
            calendar_names: Vec::new(),
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            default_project_type: default_project_type(),
            project_types: Vec::new(),
            sub_phases: Ordered::default(),
            standalone_phases: Ordered::default(),
            project_type_costs: Ordered::default(),
            task_categories: Vec::new(),
            cost_categories: Vec::new(),
        }
    }
}

impl Config {
    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self, app_dir: &Path) -> PathBuf {
        match &self.database.path {
            Some(path) => PathBuf::from(shellexpand::tilde(path).to_string()),
            None => app_dir.join("activity.db"),
        }
    }

    pub fn calendar_source_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.calendar.source_path).to_string())
    }

    pub fn tag_values(&self, kind: TagKind) -> &[String] {
        match kind {
            TagKind::TaskCategories => &self.classification_rules.task_categories,
            TagKind::CostCategories => &self.classification_rules.cost_categories,
        }
    }

    fn tag_values_mut(&mut self, kind: TagKind) -> &mut Vec<String> {
        match kind {
            TagKind::TaskCategories => &mut self.classification_rules.task_categories,
            TagKind::CostCategories => &mut self.classification_rules.cost_categories,
        }
    }
}

/// Finds the configuration file. An explicit path must exist. Without one, searches in order:
/// 1. ./timetracker.yaml (current directory)
/// 2. ~/.config/timetracker/timetracker.yaml
///
/// When neither exists the user path is returned so that later writes have a destination.
pub fn locate_config(explicit: Option<&Path>) -> Result<(PathBuf, bool)> {
    if let Some(path) = explicit {
        let path = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string());
        if !path.exists() {
            bail!("Configuration {path:?} not found");
        }
        // The daemon changes its working directory, so relative paths would go stale.
        return Ok((path.canonicalize().unwrap_or(path), true));
    }

    let user_path = PathBuf::from(shellexpand::tilde(USER_CONFIG_PATH).to_string());
    for path in [PathBuf::from(CONFIG_FILE_NAME), user_path.clone()] {
        if path.exists() {
            return Ok((path.canonicalize().unwrap_or(path), true));
        }
    }
    Ok((user_path, false))
}

pub fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration {path:?}"))?;
    serde_yaml::from_str(&content).with_context(|| format!("Malformed configuration {path:?}"))
}

/// Appends `value` to one tag list of the file on disk. The file belongs to the user, so only
/// that list is touched and keys this crate doesn't know about are written back as they were.
fn append_tag_to_file(path: &Path, kind: TagKind, value: &str) -> Result<()> {
    let mut document = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {path:?}"))?;
        serde_yaml::from_str::<Value>(&content)
            .with_context(|| format!("Malformed configuration {path:?}"))?
    } else {
        Value::Null
    };

    let rules = mapping_entry(&mut document, "classification_rules")
        .with_context(|| format!("Configuration {path:?} is not a mapping"))?;
    let list = mapping_entry(rules, &kind.to_string())
        .with_context(|| format!("classification_rules in {path:?} is not a mapping"))?;
    if list.is_null() {
        *list = Value::Sequence(Vec::new());
    }
    list.as_sequence_mut()
        .ok_or_else(|| anyhow!("{kind} in {path:?} is not a list"))?
        .push(Value::String(value.to_string()));

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_yaml::to_string(&document)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write configuration {path:?}"))
}

/// Value under `key` of a mapping, created as null when missing. A null `parent` becomes an
/// empty mapping first.
fn mapping_entry<'a>(parent: &'a mut Value, key: &str) -> Result<&'a mut Value> {
    if parent.is_null() {
        *parent = Value::Mapping(Mapping::new());
    }
    let mapping = parent
        .as_mapping_mut()
        .ok_or_else(|| anyhow!("expected a mapping"))?;
    Ok(mapping
        .entry(Value::String(key.to_string()))
        .or_insert(Value::Null))
}

/// Tag lists offered to retagging interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TagKind {
    #[value(name = "task_categories", alias = "task")]
    TaskCategories,
    #[value(name = "cost_categories", alias = "cost")]
    CostCategories,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagKind::TaskCategories => write!(f, "task_categories"),
            TagKind::CostCategories => write!(f, "cost_categories"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("category must be task_categories or cost_categories, got {0:?}")]
    UnknownKind(String),
    #[error("tag value is empty")]
    EmptyValue,
}

impl FromStr for TagKind {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task_categories" | "task" => Ok(TagKind::TaskCategories),
            "cost_categories" | "cost" => Ok(TagKind::CostCategories),
            other => Err(TagError::UnknownKind(other.to_string())),
        }
    }
}

/// Immutable view of the configuration handed to one consumer call.
#[derive(Debug)]
pub struct ConfigSnapshot {
    pub config: Config,
    pub rules: ClassificationRuleSet,
}

impl ConfigSnapshot {
    pub fn compile(config: Config) -> Result<Self> {
        let rules = ClassificationRuleSet::compile(&config.classification_rules)?;
        Ok(Self { config, rules })
    }
}

/// Shared, hot-swappable configuration.
pub struct LiveConfig {
    path: PathBuf,
    current: RwLock<Arc<ConfigSnapshot>>,
}

impl LiveConfig {
    /// Loads and compiles the configuration. Errors here must stop the application.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, exists) = locate_config(explicit)?;
        let config = if exists {
            info!("Loading configuration from {path:?}");
            read_config(&path)?
        } else {
            info!("No configuration found, using defaults");
            Config::default()
        };
        Self::new(path, config)
    }

    pub fn new(path: PathBuf, config: Config) -> Result<Self> {
        let snapshot = ConfigSnapshot::compile(config)?;
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-reads the file. On failure the previous snapshot stays active.
    pub fn reload(&self) -> Result<()> {
        let snapshot = ConfigSnapshot::compile(read_config(&self.path)?)?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
        info!("Configuration reloaded from {:?}", self.path);
        Ok(())
    }

    /// Appends `value` to a tag list and persists it to the file. Returns false when the value
    /// is already present, in which case nothing is written.
    pub fn add_tag_value(&self, kind: TagKind, value: &str) -> Result<bool> {
        let value = value.trim();
        if value.is_empty() {
            return Err(TagError::EmptyValue.into());
        }

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.config.tag_values(kind).iter().any(|v| v == value) {
            return Ok(false);
        }

        let mut config = current.config.clone();
        config.tag_values_mut(kind).push(value.to_string());
        append_tag_to_file(&self.path, kind, value)?;
        *current = Arc::new(ConfigSnapshot::compile(config)?);
        info!("Added {value:?} to {kind}");
        Ok(true)
    }
}

/// Mapping that keeps declaration order. Rule evaluation order follows the file, so plain hash
/// maps can't be used here.
#[derive(Debug, Clone, PartialEq)]
pub struct Ordered<T>(pub Vec<(String, T)>);

impl<T> Default for Ordered<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> Ordered<T> {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl<T: Serialize> Serialize for Ordered<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Ordered<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedVisitor<T> {
            type Value = Ordered<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(Ordered::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, T>()? {
                    entries.push((key, value));
                }
                Ok(Ordered(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}
