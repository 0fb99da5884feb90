use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::{
    model_download::{DEFAULT_POSE_MODEL_URL, default_pose_model_path},
    pipeline::skeleton::RenderConfig,
    types::FacingMode,
};

const CONFIG_ENV: &str = "POSE_OVERLAY_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "pose-overlay.toml";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub model: ModelConfig,
    pub render: RenderConfig,
    pub timing: TimingConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Preferred camera when the user is not asked.
    pub facing: Option<FacingMode>,
    /// Ask for front/rear before every session.
    pub prompt_facing: bool,
    pub ready_timeout_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            facing: None,
            prompt_facing: false,
            ready_timeout_ms: 5_000,
        }
    }
}

impl CameraConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub url: String,
    /// Minimum pose-presence score for a frame to report a pose.
    pub pose_threshold: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_pose_model_path(),
            url: DEFAULT_POSE_MODEL_URL.to_string(),
            pose_threshold: 0.5,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub countdown_from: u32,
    pub tick_interval_ms: u64,
    pub analyzing_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            countdown_from: 5,
            tick_interval_ms: 100,
            analyzing_delay_ms: 5_000,
        }
    }
}

impl TimingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn analyzing_delay(&self) -> Duration {
        Duration::from_millis(self.analyzing_delay_ms)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads from `POSE_OVERLAY_CONFIG`, then `pose-overlay.toml`, else defaults.
    pub fn discover() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            let path = PathBuf::from(path);
            log::info!("loading config from {}", path.display());
            return Self::load(&path);
        }

        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            log::info!("loading config from {}", local.display());
            return Self::load(local);
        }

        log::info!("no config file found, using defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        if self.timing.tick_interval_ms == 0 {
            bail!("timing.tick_interval_ms must be greater than zero");
        }
        let threshold = self.render.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            bail!("render.confidence_threshold must be within [0, 1], got {threshold}");
        }
        let pose_threshold = self.model.pose_threshold;
        if !(0.0..=1.0).contains(&pose_threshold) {
            bail!("model.pose_threshold must be within [0, 1], got {pose_threshold}");
        }
        if self.render.point_radius < 0 || self.render.stroke_width < 1 {
            bail!("render.point_radius must be >= 0 and render.stroke_width >= 1");
        }
        Ok(())
    }
}
