// vigil-pipeline/src/lib.rs
// ============================================================
// Real-time pipeline core
//   capture thread ──► FrameChannel ◄── inference thread
//                          ▲
//                 orchestrator / display
// ------------------------------------------------------------
// Public API:
//   * FrameChannel                – latest frame + seq, detections, stop
//   * capture_loop / inference_loop
//   * StrideGate, InferenceStats
//   * RateCounter
//   * Worker::join_by(deadline)   – bounded join
//   * PipelineOrchestrator        – start / tick / run / shutdown
// ============================================================

//! vigil – pipeline
//!
//! Each camera gets two OS threads.  The capture thread overwrites a
//! single latest-frame slot as fast as the camera delivers; the inference
//! thread samples that slot every `stride` frames.  Nothing is queued, so
//! a slow model never builds a backlog and the display always shows the
//! newest frame.  Detections may lag the displayed frame by a few captures.
//!
//! Cancellation is cooperative: loops poll the channel's stop flag, and
//! shutdown waits for them against a single deadline.  A loop that is
//! stuck (e.g. inside a model call) is abandoned rather than awaited.

mod capture;
mod channel;
mod config;
mod display;
mod inference;
mod orchestrator;
mod rate;
mod worker;

pub use capture::{capture_loop, CaptureOutcome};
pub use channel::{FrameChannel, FrameSnapshot};
pub use config::PipelineConfig;
pub use display::{Display, Input, Overlay, PassthroughRenderer, Renderer};
pub use inference::{inference_loop, InferenceStats, StrideGate};
pub use orchestrator::{DetectorFactory, PipelineOrchestrator, ShutdownReport, StartupError, Tick};
pub use rate::RateCounter;
pub use worker::{JoinOutcome, Worker};
