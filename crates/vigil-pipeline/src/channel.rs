//! The shared state of one camera pipeline.
//!
//! Two independently locked groups, `(frame, seq)` and `detections`, plus
//! a stop flag.  Locks are held only for the swap or clone, never across
//! a model call or a render.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use vigil_common::{Detection, Frame};

/// A consistent `(frame, seq)` pair.  `frame` is `None` and `seq == -1`
/// until the first publish.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub frame: Option<Arc<Frame>>,
    pub seq: i64,
}

#[derive(Debug)]
struct FrameSlot {
    frame: Option<Arc<Frame>>,
    seq: i64,
}

#[derive(Debug)]
pub struct FrameChannel {
    frame: Mutex<FrameSlot>,
    detections: Mutex<Arc<[Detection]>>,
    stop: AtomicBool,
}

// A panicking writer can only have left a fully swapped value behind.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for FrameChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameChannel {
    pub fn new() -> Self {
        Self {
            frame: Mutex::new(FrameSlot {
                frame: None,
                seq: -1,
            }),
            detections: Mutex::new(Arc::from(Vec::new())),
            stop: AtomicBool::new(false),
        }
    }

    /// Replace the latest frame and return its sequence number.  The
    /// previous frame is dropped whether or not anyone looked at it.
    pub fn publish_frame(&self, frame: Frame) -> i64 {
        let frame = Arc::new(frame);
        let mut slot = lock(&self.frame);
        slot.frame = Some(frame);
        slot.seq += 1;
        slot.seq
    }

    pub fn snapshot_frame(&self) -> FrameSnapshot {
        let slot = lock(&self.frame);
        FrameSnapshot {
            frame: slot.frame.clone(),
            seq: slot.seq,
        }
    }

    pub fn seq(&self) -> i64 {
        lock(&self.frame).seq
    }

    /// Replace the detection set wholesale.
    pub fn publish_detections(&self, detections: Vec<Detection>) {
        let detections: Arc<[Detection]> = Arc::from(detections);
        *lock(&self.detections) = detections;
    }

    pub fn snapshot_detections(&self) -> Arc<[Detection]> {
        Arc::clone(&lock(&self.detections))
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}
