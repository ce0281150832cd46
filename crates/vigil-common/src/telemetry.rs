//! Lifecycle events and the sink they are delivered to.
//!
//! Components emit an [`Event`] at startup, camera open/close, loop
//! start/stop and on errors.  What happens next (console log, file,
//! metrics, a watchdog) is the sink's business.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use log::Level;

/// Which worker of a pipeline an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopRole {
    Capture,
    Inference,
}

impl fmt::Display for LoopRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopRole::Capture => f.write_str("capture"),
            LoopRole::Inference => f.write_str("inference"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SystemStart,
    SystemStop,
    ModuleInit {
        module: String,
        detail: String,
    },
    CameraOpening {
        camera: String,
        backend: String,
        max_retries: u32,
    },
    RetryAttempt {
        camera: String,
        attempt: u32,
        max_retries: u32,
        fault: String,
        message: String,
    },
    BackendMismatch {
        camera: String,
        preferred: String,
    },
    CameraOpened {
        camera: String,
        backend: String,
        attempts: u32,
    },
    CameraError {
        camera: String,
        message: String,
    },
    CameraClosed {
        camera: String,
    },
    LoopStarted {
        camera: String,
        role: LoopRole,
    },
    LoopStopped {
        camera: String,
        role: LoopRole,
        iterations: u64,
    },
    DetectionFailed {
        camera: String,
        error: String,
    },
    CameraSwitched {
        from: String,
        to: String,
    },
    QuitRequested {
        reason: String,
    },
    ShutdownTimeout {
        camera: String,
        role: LoopRole,
        waited: Duration,
    },
}

impl Event {
    /// Stable upper-case tag, handy for filtering log files.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::SystemStart => "SYSTEM_START",
            Event::SystemStop => "SYSTEM_STOP",
            Event::ModuleInit { .. } => "MODULE_INIT",
            Event::CameraOpening { .. } => "CAMERA_OPENING",
            Event::RetryAttempt { .. } => "RETRY_ATTEMPT",
            Event::BackendMismatch { .. } => "BACKEND_MISMATCH",
            Event::CameraOpened { .. } => "CAMERA_OPEN",
            Event::CameraError { .. } => "CAMERA_ERROR",
            Event::CameraClosed { .. } => "CAMERA_CLOSE",
            Event::LoopStarted { .. } => "LOOP_START",
            Event::LoopStopped { .. } => "LOOP_STOP",
            Event::DetectionFailed { .. } => "DETECTION_FAILED",
            Event::CameraSwitched { .. } => "CAMERA_SWITCH",
            Event::QuitRequested { .. } => "USER_INPUT",
            Event::ShutdownTimeout { .. } => "SHUTDOWN_TIMEOUT",
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Event::RetryAttempt { .. }
            | Event::BackendMismatch { .. }
            | Event::DetectionFailed { .. }
            | Event::ShutdownTimeout { .. } => Level::Warn,
            Event::CameraError { .. } => Level::Error,
            _ => Level::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::SystemStart => f.write_str("system starting"),
            Event::SystemStop => f.write_str("system stopped"),
            Event::ModuleInit { module, detail } => write!(f, "{module}: {detail}"),
            Event::CameraOpening { camera, backend, max_retries } => {
                write!(f, "opening camera {camera} via {backend} (max retries {max_retries})")
            }
            Event::RetryAttempt { camera, attempt, max_retries, fault, message } => write!(
                f,
                "camera {camera} [{fault}] {message} - retry {attempt}/{max_retries}"
            ),
            Event::BackendMismatch { camera, preferred } => write!(
                f,
                "camera {camera} opens without a backend hint but not with {preferred}"
            ),
            Event::CameraOpened { camera, backend, attempts } => {
                write!(f, "camera {camera} open via {backend} after {attempts} attempt(s)")
            }
            Event::CameraError { camera, message } => write!(f, "camera {camera}: {message}"),
            Event::CameraClosed { camera } => write!(f, "camera {camera} released"),
            Event::LoopStarted { camera, role } => write!(f, "{role} loop started for {camera}"),
            Event::LoopStopped { camera, role, iterations } => {
                write!(f, "{role} loop for {camera} stopped after {iterations} iteration(s)")
            }
            Event::DetectionFailed { camera, error } => {
                write!(f, "detection failed on {camera}, keeping previous boxes: {error}")
            }
            Event::CameraSwitched { from, to } => write!(f, "display switched {from} -> {to}"),
            Event::QuitRequested { reason } => write!(f, "quit requested ({reason})"),
            Event::ShutdownTimeout { camera, role, waited } => write!(
                f,
                "{role} loop for {camera} still running after {waited:?}; abandoning it"
            ),
        }
    }
}

/// Receiver of lifecycle events.  Implementations must be cheap and must
/// not block: events are emitted from capture and inference threads.
pub trait Telemetry: Send + Sync {
    fn emit(&self, event: Event);
}

pub type SharedTelemetry = Arc<dyn Telemetry>;

/// Forwards events to the `log` facade under the `vigil::events` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn emit(&self, event: Event) {
        log::log!(target: "vigil::events", event.level(), "{} {}", event.kind(), event);
    }
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn emit(&self, _event: Event) {}
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    events: Mutex<Vec<Event>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(Event::kind).collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events().iter().filter(|e| e.kind() == kind).count()
    }
}

impl Telemetry for MemoryTelemetry {
    fn emit(&self, event: Event) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}
