use std::{
    sync::atomic::{AtomicI64, AtomicU64, Ordering},
    thread,
    time::Duration,
};

use log::{debug, warn};
use vigil_common::{Event, LoopRole, Telemetry};
use vigil_detect::Detector;

use crate::FrameChannel;

/// Admits a sequence number only once `stride` newer frames have been
/// captured since the last admitted one.  Starts at `-stride` so the very
/// first frame (seq 0) is admitted.
#[derive(Debug, Clone, Copy)]
pub struct StrideGate {
    stride: i64,
    last: i64,
}

impl StrideGate {
    pub fn new(stride: u32) -> Self {
        let stride = i64::from(stride.max(1));
        Self {
            stride,
            last: -stride,
        }
    }

    pub fn admit(&mut self, seq: i64) -> bool {
        if seq - self.last >= self.stride {
            self.last = seq;
            true
        } else {
            false
        }
    }

    pub fn last_processed(&self) -> i64 {
        self.last
    }
}

/// Live counters of one inference loop, readable from any thread.
#[derive(Debug)]
pub struct InferenceStats {
    invocations: AtomicU64,
    failures: AtomicU64,
    last_seq: AtomicI64,
}

impl Default for InferenceStats {
    fn default() -> Self {
        Self {
            invocations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last_seq: AtomicI64::new(-1),
        }
    }
}

impl InferenceStats {
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Seq of the most recent frame handed to the detector, -1 before any.
    pub fn last_seq(&self) -> i64 {
        self.last_seq.load(Ordering::Relaxed)
    }
}

/// Consumer: sample the channel every `stride` frames and run `detector`.
///
/// A detector error is logged and skipped: the previous detections stay
/// published and the loop carries on.
pub fn inference_loop<T: Detector + ?Sized>(
    detector: &mut T,
    channel: &FrameChannel,
    stats: &InferenceStats,
    stride: u32,
    idle: Duration,
    label: &str,
    telemetry: &dyn Telemetry,
) -> u64 {
    telemetry.emit(Event::LoopStarted {
        camera: label.to_string(),
        role: LoopRole::Inference,
    });

    let mut gate = StrideGate::new(stride);
    while !channel.stopped() {
        let snapshot = channel.snapshot_frame();
        let frame = match snapshot.frame {
            Some(frame) if gate.admit(snapshot.seq) => frame,
            _ => {
                thread::sleep(idle);
                continue;
            }
        };

        stats.last_seq.store(snapshot.seq, Ordering::Relaxed);
        stats.invocations.fetch_add(1, Ordering::Relaxed);
        match detector.predict(&frame) {
            Ok(detections) => {
                debug!("{label}: seq {} -> {} detection(s)", snapshot.seq, detections.len());
                channel.publish_detections(detections);
            }
            Err(e) => {
                stats.failures.fetch_add(1, Ordering::Relaxed);
                warn!("{label}: detection on seq {} failed: {e}", snapshot.seq);
                telemetry.emit(Event::DetectionFailed {
                    camera: label.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    let invocations = stats.invocations();
    telemetry.emit(Event::LoopStopped {
        camera: label.to_string(),
        role: LoopRole::Inference,
        iterations: invocations,
    });
    invocations
}
