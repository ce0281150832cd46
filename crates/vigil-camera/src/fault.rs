use std::fmt;

use thiserror::Error;

use crate::CameraId;

/// Why a camera could not be opened, as far as diagnosis can tell.  The
/// classification is heuristic and not guaranteed to agree across platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CameraFault {
    #[error("camera device not found")]
    DeviceNotFound,
    #[error("camera is in use by another program")]
    DeviceBusy,
    #[error("camera access permission denied")]
    PermissionDenied,
    #[error("camera backend error")]
    BackendError,
    #[error("unknown camera error")]
    Unknown,
}

impl CameraFault {
    pub fn name(self) -> &'static str {
        match self {
            CameraFault::DeviceNotFound => "DEVICE_NOT_FOUND",
            CameraFault::DeviceBusy => "DEVICE_BUSY",
            CameraFault::PermissionDenied => "PERMISSION_DENIED",
            CameraFault::BackendError => "BACKEND_ERROR",
            CameraFault::Unknown => "UNKNOWN",
        }
    }

    /// What the operator can do about it.
    pub fn hint(self) -> &'static str {
        match self {
            CameraFault::DeviceNotFound => "check the cable and the configured camera index",
            CameraFault::DeviceBusy => "close other programs that use the camera",
            CameraFault::PermissionDenied => {
                "grant camera access (e.g. add the user to the `video` group)"
            }
            CameraFault::BackendError => {
                "the camera works with another capture backend; adjust the backend list"
            }
            CameraFault::Unknown => "reconnect the camera and try again",
        }
    }
}

/// Outcome of [`crate::diagnose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnosis {
    /// The device opens when no backend hint is given: only the preferred
    /// backend is at fault.
    BackendMismatch,
    Fault(CameraFault),
}

impl Diagnosis {
    pub fn fault(self) -> Option<CameraFault> {
        match self {
            Diagnosis::BackendMismatch => None,
            Diagnosis::Fault(f) => Some(f),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Diagnosis::BackendMismatch => "BACKEND_MISMATCH",
            Diagnosis::Fault(f) => f.name(),
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            Diagnosis::BackendMismatch => {
                "the device opens without a backend hint; put `any` first in the backend list"
            }
            Diagnosis::Fault(f) => f.hint(),
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnosis::BackendMismatch => {
                write!(f, "preferred backend rejected the device ({})", self.hint())
            }
            Diagnosis::Fault(fault) => write!(f, "{fault} ({})", fault.hint()),
        }
    }
}

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("camera {camera} could not be opened after {attempts} attempt(s): {diagnosis}")]
    Exhausted {
        camera: CameraId,
        attempts: u32,
        diagnosis: Diagnosis,
    },
    #[error("opening camera {camera} was cancelled")]
    Cancelled { camera: CameraId },
}

impl OpenError {
    pub fn camera(&self) -> &CameraId {
        match self {
            OpenError::Exhausted { camera, .. } | OpenError::Cancelled { camera } => camera,
        }
    }

    pub fn fault(&self) -> Option<CameraFault> {
        match self {
            OpenError::Exhausted { diagnosis, .. } => diagnosis.fault(),
            OpenError::Cancelled { .. } => None,
        }
    }
}
