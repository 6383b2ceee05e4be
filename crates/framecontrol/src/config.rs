use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::media::ReadyState;
use crate::pump::SeekPolicy;
use crate::rate::{DEFAULT_FPS, Fps};

/// Persisted player configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Target rate for a fresh session and after reset.
    #[serde(default = "default_fps")]
    pub target_fps: Fps,
    /// Assumed source rate until the host supplies or calibrates one.
    #[serde(default = "default_fps")]
    pub source_fps: Fps,
    /// Tick rate of the built-in render loop.
    #[serde(default = "default_refresh_hz")]
    pub refresh_hz: u32,
    /// Readiness the media must report before a tick draws.
    #[serde(default = "default_min_ready_state")]
    pub min_ready_state: ReadyState,
    #[serde(default)]
    pub seek_policy: SeekPolicy,
    #[serde(default = "default_true")]
    pub looping: bool,
    /// Start playing as soon as a source is loaded.
    #[serde(default = "default_true")]
    pub autoplay_on_load: bool,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_version() -> u32 { 1 }
fn default_fps() -> Fps { DEFAULT_FPS }
fn default_refresh_hz() -> u32 { 60 }
fn default_min_ready_state() -> ReadyState { ReadyState::HaveCurrentData }
fn default_true() -> bool { true }
fn default_event_capacity() -> usize { 256 }

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            target_fps: DEFAULT_FPS,
            source_fps: DEFAULT_FPS,
            refresh_hz: 60,
            min_ready_state: ReadyState::HaveCurrentData,
            seek_policy: SeekPolicy::Clamp,
            looping: true,
            autoplay_on_load: true,
            event_capacity: 256,
        }
    }
}

impl PlayerConfig {
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("framecontrol").join("player.json")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Read config from `path`, falling back to defaults if missing or invalid.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded player config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse player config: {e}");
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No player config found, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self) {
        let path = Self::config_path();
        if let Err(e) = self.save_to(&path) {
            log::error!("Failed to save player config to {}: {e}", path.display());
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fresh_session() {
        let config = PlayerConfig::default();
        assert_eq!(config.target_fps.get(), 24);
        assert_eq!(config.source_fps.get(), 24);
        assert_eq!(config.refresh_hz, 60);
        assert_eq!(config.min_ready_state, ReadyState::HaveCurrentData);
        assert_eq!(config.seek_policy, SeekPolicy::Clamp);
        assert!(config.looping);
        assert!(config.autoplay_on_load);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: PlayerConfig = serde_json::from_str(r#"{"target_fps": 12}"#).unwrap();
        assert_eq!(config.target_fps.get(), 12);
        assert_eq!(config.source_fps.get(), 24);
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn zero_fps_is_rejected() {
        assert!(serde_json::from_str::<PlayerConfig>(r#"{"source_fps": 0}"#).is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("player.json");
        let config = PlayerConfig {
            target_fps: Fps::from_raw(30),
            seek_policy: SeekPolicy::Forward,
            min_ready_state: ReadyState::HaveEnoughData,
            looping: false,
            ..PlayerConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(PlayerConfig::load_from(&path), config);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(PlayerConfig::load_from(&path), PlayerConfig::default());
        assert_eq!(
            PlayerConfig::load_from(&dir.path().join("missing.json")),
            PlayerConfig::default()
        );
    }
}
