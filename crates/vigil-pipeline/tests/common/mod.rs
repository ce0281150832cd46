//! Scripted cameras and detectors for the pipeline tests.

#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender};
use vigil_camera::{Backend, CameraId, CaptureDevice, CaptureDriver};
use vigil_common::{Detection, Frame};
use vigil_detect::{DetectError, Detector};

/// Opens the listed ids with any backend.  Frames are 8x8 BGR with the
/// running frame counter in every byte.
pub struct TestDriver {
    working: Vec<CameraId>,
    read_delay: Duration,
    pub opened: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl TestDriver {
    pub fn new(working: &[i32]) -> Self {
        Self {
            working: working.iter().copied().map(CameraId::Index).collect(),
            read_delay: Duration::from_millis(2),
            opened: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every read blocks for `delay`, simulating a hung device.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl CaptureDriver for TestDriver {
    type Device = TestCamera;

    fn open(&self, id: &CameraId, _backend: Option<Backend>) -> Option<TestCamera> {
        if !self.working.contains(id) {
            return None;
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Some(TestCamera {
            source: Source::Counter(0),
            read_delay: self.read_delay,
            released: false,
            counter: Arc::clone(&self.released),
        })
    }
}

enum Source {
    Counter(u8),
    Queue(Receiver<Frame>),
}

pub struct TestCamera {
    source: Source,
    read_delay: Duration,
    released: bool,
    counter: Arc<AtomicUsize>,
}

impl CaptureDevice for TestCamera {
    fn read(&mut self) -> Option<Frame> {
        if self.released {
            return None;
        }
        match &mut self.source {
            Source::Counter(n) => {
                thread::sleep(self.read_delay);
                *n = n.wrapping_add(1);
                Some(Frame::filled(8, 8, 3, *n))
            }
            Source::Queue(rx) => rx.try_recv().ok(),
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Hands out cameras that replay whatever the test pushes into the queue.
pub struct QueueDriver {
    rx: Receiver<Frame>,
    pub released: Arc<AtomicUsize>,
}

impl QueueDriver {
    pub fn new(rx: Receiver<Frame>) -> Self {
        Self {
            rx,
            released: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl CaptureDriver for QueueDriver {
    type Device = TestCamera;

    fn open(&self, _id: &CameraId, _backend: Option<Backend>) -> Option<TestCamera> {
        Some(TestCamera {
            source: Source::Queue(self.rx.clone()),
            read_delay: Duration::ZERO,
            released: false,
            counter: Arc::clone(&self.released),
        })
    }
}

/// Reports the first byte of every frame it is given.
pub struct RecordingDetector {
    pub seen: Sender<u8>,
}

impl Detector for RecordingDetector {
    fn predict(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        let _ = self.seen.send(frame.data[0]);
        Ok(vec![Detection::new(0, 0, 4, 4, 0, 0.9)])
    }
}

/// Every call takes `delay`.
pub struct SlowDetector {
    pub delay: Duration,
}

impl Detector for SlowDetector {
    fn predict(&mut self, _frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        thread::sleep(self.delay);
        Ok(Vec::new())
    }
}

pub struct FailingDetector;

impl Detector for FailingDetector {
    fn predict(&mut self, _frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        Err(DetectError::Model("weights corrupted".into()))
    }
}
