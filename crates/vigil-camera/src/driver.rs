use std::{convert::Infallible, fmt, io, str::FromStr};

use serde::{Deserialize, Serialize};
use vigil_common::Frame;

use crate::Backend;

/// A camera is either a device index or anything a backend can open by
/// name (`rtsp://…`, a file path, a GStreamer pipeline string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CameraId {
    Index(i32),
    Uri(String),
}

impl CameraId {
    /// `"2"` and `"/dev/video2"` both become `Index(2)`; everything else is a URI.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Ok(index) = s.parse::<i32>() {
            return CameraId::Index(index);
        }
        if let Some(digits) = s.strip_prefix("/dev/video") {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(index) = digits.parse::<i32>() {
                    return CameraId::Index(index);
                }
            }
        }
        CameraId::Uri(s.to_string())
    }

    pub fn index(&self) -> Option<i32> {
        match self {
            CameraId::Index(i) => Some(*i),
            CameraId::Uri(_) => None,
        }
    }
}

impl FromStr for CameraId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CameraId::parse(s))
    }
}

impl From<i32> for CameraId {
    fn from(index: i32) -> Self {
        CameraId::Index(index)
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraId::Index(i) => write!(f, "#{i}"),
            CameraId::Uri(u) => f.write_str(u),
        }
    }
}

/// What a driver can tell about a device without claiming it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The driver has no way to tell.
    Unknown,
    Absent,
    Present,
    /// The device node exists but this process may not open it.
    NoAccess,
}

/// An opened capture handle.
pub trait CaptureDevice: Send {
    /// Next frame, or `None` when nothing is ready yet or the read failed.
    /// Callers treat `None` as transient and poll again.
    fn read(&mut self) -> Option<Frame>;

    /// Give the device back to the system.  Must be idempotent.
    fn release(&mut self);
}

/// The capture primitive: opens devices.  Shared by every pipeline during
/// startup, so opening must not need `&mut self`.
pub trait CaptureDriver: Send + Sync {
    type Device: CaptureDevice + 'static;

    /// `backend == None` means "no hint, let the driver decide".
    fn open(&self, id: &CameraId, backend: Option<Backend>) -> Option<Self::Device>;

    fn presence(&self, _id: &CameraId) -> Presence {
        Presence::Unknown
    }
}

/// Presence check for V4L2-style device nodes (`/dev/videoN`).  Any id that
/// is not a `/dev/` path is reported as [`Presence::Unknown`].
pub fn device_node_presence(id: &CameraId) -> Presence {
    if !cfg!(unix) {
        return Presence::Unknown;
    }
    let path = match id {
        CameraId::Index(i) if *i >= 0 => format!("/dev/video{i}"),
        CameraId::Uri(u) if u.starts_with("/dev/") => u.clone(),
        _ => return Presence::Unknown,
    };
    match std::fs::OpenOptions::new().read(true).open(&path) {
        Ok(_) => Presence::Present,
        Err(e) => match e.kind() {
            io::ErrorKind::NotFound => Presence::Absent,
            io::ErrorKind::PermissionDenied => Presence::NoAccess,
            _ => Presence::Unknown,
        },
    }
}
