use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::constants::{
    DEFAULT_CONTROLS_HIDE_SECS, DEFAULT_POSITION_SAMPLE_HZ, DEFAULT_TAP_FEEDBACK_MS,
};
use crate::models::TranslationKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub controls: ControlsConfig,

    #[serde(default)]
    pub gestures: GestureConfig,

    #[serde(default)]
    pub pip: PipConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_speeds")]
    pub available_speeds: Vec<f64>,

    #[serde(default = "default_speed")]
    pub default_speed: f64,

    #[serde(default = "default_sample_hz")]
    pub position_sample_hz: u32,

    /// Tear the engine down when the app stops outside compact mode
    #[serde(default)]
    pub release_engine_on_stop: bool,

    #[serde(default = "default_kind")]
    pub preferred_kind: TranslationKind,

    #[serde(default = "default_quality")]
    pub preferred_quality: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlsConfig {
    #[serde(default = "default_hide_secs")]
    pub auto_hide_secs: u64,

    #[serde(default = "default_tap_feedback_ms")]
    pub tap_feedback_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureConfig {
    #[serde(default = "default_double_tap_ms")]
    pub double_tap_window_ms: u64,

    #[serde(default = "default_touch_slop")]
    pub touch_slop_px: f32,

    #[serde(default = "default_seek_ms_per_px")]
    pub seek_ms_per_px: f32,

    #[serde(default = "default_level_per_px")]
    pub level_per_px: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            debug!("Loading config from {:?}", config_path);
            let contents =
                fs::read_to_string(config_path).context("Failed to read config file")?;
            let config = Self::from_toml_str(&contents)?;
            info!("Config loaded successfully");
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            let config = Config::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse config file")?;
        Ok(config.sanitized())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, contents).context("Failed to write config file")?;

        debug!("Config saved to {:?}", config_path);
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("kadr").join("config.toml"))
    }

    /// Drops values the controller cannot honour.
    fn sanitized(mut self) -> Self {
        self.playback
            .available_speeds
            .retain(|speed| speed.is_finite() && *speed > 0.0);
        if self.playback.available_speeds.is_empty() {
            self.playback.available_speeds = default_speeds();
        }
        if !(self.playback.default_speed.is_finite() && self.playback.default_speed > 0.0) {
            self.playback.default_speed = default_speed();
        }
        self.playback.position_sample_hz = self.playback.position_sample_hz.clamp(1, 120);
        self
    }
}

impl PlaybackConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.position_sample_hz.max(1)))
    }
}

impl ControlsConfig {
    pub fn auto_hide(&self) -> Duration {
        Duration::from_secs(self.auto_hide_secs)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            available_speeds: default_speeds(),
            default_speed: default_speed(),
            position_sample_hz: default_sample_hz(),
            release_engine_on_stop: false,
            preferred_kind: default_kind(),
            preferred_quality: default_quality(),
        }
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            auto_hide_secs: default_hide_secs(),
            tap_feedback_ms: default_tap_feedback_ms(),
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            double_tap_window_ms: default_double_tap_ms(),
            touch_slop_px: default_touch_slop(),
            seek_ms_per_px: default_seek_ms_per_px(),
            level_per_px: default_level_per_px(),
        }
    }
}

impl Default for PipConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

// Default value functions
fn default_speeds() -> Vec<f64> { vec![0.5, 0.75, 1.0, 1.25, 1.5, 2.0] }
fn default_speed() -> f64 { 1.0 }
fn default_sample_hz() -> u32 { DEFAULT_POSITION_SAMPLE_HZ }
fn default_kind() -> TranslationKind { TranslationKind::Dubbed }
fn default_quality() -> String { "720".to_string() }
fn default_hide_secs() -> u64 { DEFAULT_CONTROLS_HIDE_SECS }
fn default_tap_feedback_ms() -> u64 { DEFAULT_TAP_FEEDBACK_MS }
fn default_double_tap_ms() -> u64 { 300 }
fn default_touch_slop() -> f32 { 8.0 }
fn default_seek_ms_per_px() -> f32 { 10.0 }
fn default_level_per_px() -> f32 { 1.0 / 300.0 }
fn default_true() -> bool { true }
