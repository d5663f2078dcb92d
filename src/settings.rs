use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::alert::AlertPattern;
use crate::timer::ControllerConfig;

pub const SETTINGS_ENV: &str = "LINKCLOCK_SETTINGS";
const DEFAULT_SETTINGS_FILE: &str = "linkclock.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub time_source_url: String,
    pub sync_attempts: u32,
    pub sync_timeout_ms: u64,
    /// Link that new sessions are written onto.
    pub base_link: String,
    pub stopwatch_tick_ms: u64,
    pub timer_tick_ms: u64,
    pub alarm_tick_ms: u64,
    pub timer_alert: AlertPattern,
    pub alarm_alert: AlertPattern,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            time_source_url: "https://worldtimeapi.org/api/timezone/Etc/UTC".into(),
            sync_attempts: 3,
            sync_timeout_ms: 5000,
            base_link: "https://linkclock.app/".into(),
            stopwatch_tick_ms: 50,
            timer_tick_ms: 100,
            alarm_tick_ms: 500,
            timer_alert: AlertPattern::timer_default(),
            alarm_alert: AlertPattern::alarm_default(),
        }
    }
}

impl Settings {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    pub fn stopwatch_config(&self) -> ControllerConfig {
        ControllerConfig {
            tick_interval: Duration::from_millis(self.stopwatch_tick_ms),
            alert: None,
        }
    }

    pub fn timer_config(&self) -> ControllerConfig {
        ControllerConfig {
            tick_interval: Duration::from_millis(self.timer_tick_ms),
            alert: Some(self.timer_alert),
        }
    }

    pub fn alarm_config(&self) -> ControllerConfig {
        ControllerConfig {
            tick_interval: Duration::from_millis(self.alarm_tick_ms),
            alert: Some(self.alarm_alert),
        }
    }
}

/// `$LINKCLOCK_SETTINGS`, or `linkclock.json` in the working directory.
pub fn default_settings_path() -> PathBuf {
    env::var_os(SETTINGS_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring unparseable settings in {}: {}",
                    path.display(),
                    err
                );
                Settings::default()
            })
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> Settings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
