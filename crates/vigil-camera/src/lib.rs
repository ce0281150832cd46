// vigil-camera/src/lib.rs
// ============================================================
// Camera acquisition layer for vigil
// Owns one video source per CameraConnection: backend choice,
// open-with-retry, and diagnosis of why an open failed.
// ------------------------------------------------------------
// Public API:
//   * CaptureDriver / CaptureDevice – the capture primitive
//   * CameraConnection::open()      – bounded retry state machine
//   * diagnose()                    – classify an open failure
//   * SyntheticDriver               – test-pattern source
// ------------------------------------------------------------
// Build notes
//   * `--features opencv` adds OpenCvDriver (videoio backends).
// ============================================================

//! vigil – camera layer
//!
//! Everything here talks to devices through the [`CaptureDriver`] trait so
//! the retry and diagnosis logic can be exercised with scripted fakes.
//! A driver opens a [`CameraId`] with an optional [`Backend`] hint and
//! hands back a [`CaptureDevice`] that yields [`Frame`]s.

mod backend;
mod connection;
mod diagnose;
mod driver;
mod fault;
mod synthetic;

#[cfg(feature = "opencv")]
pub mod opencv;

pub use backend::{Backend, BackendPreference, UnknownBackend};
pub use connection::{CameraConnection, ConnectionState, RetryPolicy};
pub use diagnose::{diagnose, PROBE_INDICES};
pub use driver::{device_node_presence, CameraId, CaptureDevice, CaptureDriver, Presence};
pub use fault::{CameraFault, Diagnosis, OpenError};
pub use synthetic::{SyntheticCamera, SyntheticDriver};

pub use vigil_common::Frame;
