use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::capture::TrackDefaults;

/// What the scanner does after a member was detected and toggled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectionPolicy {
    /// Front-facing kiosk: re-arm after `rearm_delay_ms`.
    #[default]
    Continuous,
    /// Admin scan: halt until the operator confirms the detected member.
    HandOff,
}

/// Rescan delay after decoding a payload already known not to match anyone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum KnownBadCadence {
    #[default]
    FrameDelay,
    Immediate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedbackSettings {
    pub sound_enabled: bool,
    pub volume: f32,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            volume: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScannerSettings {
    /// Group the kiosk is scanning for.
    pub group_id: Option<String>,
    pub default_fps: f64,
    pub fallback_width: u32,
    pub fallback_height: u32,
    pub detection_policy: DetectionPolicy,
    pub known_bad_cadence: KnownBadCadence,
    pub rearm_delay_ms: u64,
    pub feedback: FeedbackSettings,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        let defaults = TrackDefaults::default();
        Self {
            group_id: None,
            default_fps: defaults.fps,
            fallback_width: defaults.width,
            fallback_height: defaults.height,
            detection_policy: DetectionPolicy::Continuous,
            known_bad_cadence: KnownBadCadence::FrameDelay,
            rearm_delay_ms: 3000,
            feedback: FeedbackSettings::default(),
        }
    }
}

impl ScannerSettings {
    pub fn track_defaults(&self) -> TrackDefaults {
        TrackDefaults {
            fps: self.default_fps,
            width: self.fallback_width,
            height: self.fallback_height,
        }
    }

    pub fn rearm_delay(&self) -> Duration {
        Duration::from_millis(self.rearm_delay_ms)
    }
}

/// Directory holding the database and `settings.json`.
///
/// `ROLLCALL_HOME` overrides the platform data directory.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os("ROLLCALL_HOME") {
        return Ok(PathBuf::from(home));
    }
    ProjectDirs::from("org", "rollcall", "rollcall")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| anyhow!("could not determine a data directory; set ROLLCALL_HOME"))
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ScannerSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring unreadable settings at {}: {err}",
                    path.display()
                );
                ScannerSettings::default()
            })
        } else {
            ScannerSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RwLockReadGuard<'_, ScannerSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, ScannerSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn scanner(&self) -> ScannerSettings {
        self.read().clone()
    }

    /// Apply `change` and write the result to disk.
    pub fn update<F>(&self, change: F) -> Result<ScannerSettings>
    where
        F: FnOnce(&mut ScannerSettings),
    {
        let mut guard = self.write();
        let mut next = guard.clone();
        change(&mut next);
        self.persist(&next)?;
        *guard = next.clone();
        Ok(next)
    }

    fn persist(&self, data: &ScannerSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
