use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capture API a driver should use when opening a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Let the driver pick.
    Any,
    DirectShow,
    MediaFoundation,
    V4l2,
    GStreamer,
    AvFoundation,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Any => "any",
            Backend::DirectShow => "directshow",
            Backend::MediaFoundation => "mediafoundation",
            Backend::V4l2 => "v4l2",
            Backend::GStreamer => "gstreamer",
            Backend::AvFoundation => "avfoundation",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown capture backend {0:?}")]
pub struct UnknownBackend(pub String);

impl FromStr for Backend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "any" | "auto" => Ok(Backend::Any),
            "directshow" | "dshow" => Ok(Backend::DirectShow),
            "mediafoundation" | "msmf" => Ok(Backend::MediaFoundation),
            "v4l2" | "v4l" => Ok(Backend::V4l2),
            "gstreamer" | "gst" => Ok(Backend::GStreamer),
            "avfoundation" => Ok(Backend::AvFoundation),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

/// Ordered backend list: the head is used for every real open attempt, the
/// tail is only tried while diagnosing a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Backend>", into = "Vec<Backend>")]
pub struct BackendPreference {
    order: Vec<Backend>,
}

impl BackendPreference {
    /// Duplicates are dropped (first occurrence wins); an empty list means `[Any]`.
    pub fn new(order: impl IntoIterator<Item = Backend>) -> Self {
        let mut deduped = Vec::new();
        for b in order {
            if !deduped.contains(&b) {
                deduped.push(b);
            }
        }
        if deduped.is_empty() {
            deduped.push(Backend::Any);
        }
        Self { order: deduped }
    }

    /// Platform default: a native API first, the generic fallback last.
    pub fn platform() -> Self {
        if cfg!(target_os = "windows") {
            Self::new([Backend::DirectShow, Backend::MediaFoundation, Backend::Any])
        } else if cfg!(target_os = "macos") {
            Self::new([Backend::AvFoundation, Backend::Any])
        } else {
            Self::new([Backend::V4l2, Backend::GStreamer, Backend::Any])
        }
    }

    pub fn preferred(&self) -> Backend {
        self.order[0]
    }

    pub fn fallbacks(&self) -> &[Backend] {
        &self.order[1..]
    }

    pub fn as_slice(&self) -> &[Backend] {
        &self.order
    }
}

impl From<Vec<Backend>> for BackendPreference {
    fn from(order: Vec<Backend>) -> Self {
        Self::new(order)
    }
}

impl From<BackendPreference> for Vec<Backend> {
    fn from(p: BackendPreference) -> Self {
        p.order
    }
}

impl Default for BackendPreference {
    fn default() -> Self {
        Self::platform()
    }
}
