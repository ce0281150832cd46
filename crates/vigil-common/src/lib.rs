// vigil-common/src/lib.rs
// ============================================================
// Shared value types for the vigil surveillance pipeline
// ------------------------------------------------------------
// Public API:
//   * Frame      – owned pixel buffer + geometry metadata
//   * Detection  – one pixel-space box from the detector
//   * Rect       – axis-aligned rectangle, warning-zone overlap test
//   * Telemetry  – injected lifecycle-event sink (LogTelemetry, MemoryTelemetry)
// ============================================================

//! vigil – common types
//!
//! Every other crate in the workspace depends on this one.  It holds the
//! data that crosses thread boundaries ([`Frame`], [`Detection`]) and the
//! [`Telemetry`] collaborator each component receives at construction
//! instead of reaching for a process-wide logger registry.

mod detection;
mod frame;
mod telemetry;

pub use detection::{any_intrusion, Detection, Rect};
pub use frame::{Frame, FrameError};
pub use telemetry::{
    Event, LogTelemetry, LoopRole, MemoryTelemetry, NullTelemetry, SharedTelemetry, Telemetry,
};
