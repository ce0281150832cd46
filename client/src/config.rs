//! Runtime settings: JSON file first, command-line flags on top.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vigil_camera::{Backend, BackendPreference, CameraId, RetryPolicy};
use vigil_detect::DecodeConfig;
use vigil_pipeline::PipelineConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// indices (`0`) or URIs (`"rtsp://…"`, `"/dev/video2"`)
    pub cameras: Vec<CameraId>,
    /// `None` uses the platform order
    pub backends: Option<Vec<Backend>>,
    pub max_retries: u32,
    pub retry_delay_secs: f64,

    pub stride: u32,
    pub confidence: f32,
    pub input_size: u32,
    pub target_class: i32,
    pub model: Option<PathBuf>,

    pub zone_ratio: f32,
    pub rate_window_secs: f64,
    pub join_timeout_secs: f64,
    pub saving_hold_ms: u64,

    pub window_name: String,
    pub snapshot_dir: PathBuf,
    pub synthetic: bool,
    pub headless: bool,
    pub run_for_secs: Option<f64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cameras: vec![CameraId::Index(0)],
            backends: None,
            max_retries: 10,
            retry_delay_secs: 5.0,
            stride: 3,
            confidence: 0.5,
            input_size: 640,
            target_class: 0,
            model: None,
            zone_ratio: 0.8,
            rate_window_secs: 1.0,
            join_timeout_secs: 1.0,
            saving_hold_ms: 500,
            window_name: "Real-time YOLO".into(),
            snapshot_dir: PathBuf::from("SaveVideos"),
            synthetic: false,
            headless: false,
            run_for_secs: None,
        }
    }
}

fn seconds(field: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|e| invalid(field, e.to_string()))
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check ranges and normalise camera ids (`"/dev/video2"` becomes index 2).
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.cameras.is_empty() {
            return Err(invalid("cameras", "at least one camera is required"));
        }
        self.cameras = self
            .cameras
            .into_iter()
            .map(|id| match id {
                CameraId::Uri(s) => CameraId::parse(&s),
                index => index,
            })
            .collect();
        if self.stride == 0 {
            return Err(invalid("stride", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.zone_ratio) {
            return Err(invalid("zone_ratio", format!("{} is outside [0, 1]", self.zone_ratio)));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(invalid("confidence", format!("{} is outside [0, 1]", self.confidence)));
        }
        if self.input_size == 0 || self.input_size % 32 != 0 {
            return Err(invalid("input_size", "must be a positive multiple of 32"));
        }
        seconds("retry_delay_secs", self.retry_delay_secs)?;
        seconds("rate_window_secs", self.rate_window_secs)?;
        seconds("join_timeout_secs", self.join_timeout_secs)?;
        if let Some(secs) = self.run_for_secs {
            seconds("run_for_secs", secs)?;
        }
        Ok(self)
    }

    pub fn backend_preference(&self) -> BackendPreference {
        match &self.backends {
            Some(list) => BackendPreference::new(list.iter().copied()),
            None => BackendPreference::platform(),
        }
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        Ok(PipelineConfig {
            stride: self.stride,
            join_timeout: seconds("join_timeout_secs", self.join_timeout_secs)?,
            rate_window: seconds("rate_window_secs", self.rate_window_secs)?,
            zone_ratio: self.zone_ratio,
            farewell_hold: Duration::from_millis(self.saving_hold_ms),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                retry_delay: seconds("retry_delay_secs", self.retry_delay_secs)?,
            },
            backends: self.backend_preference(),
            ..PipelineConfig::default()
        })
    }

    pub fn decode_config(&self) -> DecodeConfig {
        DecodeConfig {
            confidence: self.confidence,
            classes: vec![self.target_class],
            ..DecodeConfig::default()
        }
    }

    pub fn run_for(&self) -> Option<Duration> {
        self.run_for_secs.and_then(|s| Duration::try_from_secs_f64(s).ok())
    }
}
