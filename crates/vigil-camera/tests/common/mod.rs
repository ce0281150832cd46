//! Scripted capture driver shared by the integration tests.

#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use vigil_camera::{Backend, CameraId, CaptureDevice, CaptureDriver, Frame, Presence};

type Rule = Box<dyn Fn(&CameraId, Option<Backend>) -> bool + Send + Sync>;

/// Opens whatever `rule` allows and counts every handle it hands out and
/// every handle that comes back.
pub struct FakeDriver {
    rule: Rule,
    presence: Presence,
    pub calls: AtomicUsize,
    pub opened: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl FakeDriver {
    pub fn new(rule: impl Fn(&CameraId, Option<Backend>) -> bool + Send + Sync + 'static) -> Self {
        Self {
            rule: Box::new(rule),
            presence: Presence::Unknown,
            calls: AtomicUsize::new(0),
            opened: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// No camera anywhere.
    pub fn empty() -> Self {
        Self::new(|_, _| false)
    }

    pub fn with_presence(mut self, presence: Presence) -> Self {
        self.presence = presence;
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Handles opened but not yet given back.
    pub fn outstanding(&self) -> usize {
        self.opened() - self.released()
    }
}

impl CaptureDriver for FakeDriver {
    type Device = FakeDevice;

    fn open(&self, id: &CameraId, backend: Option<Backend>) -> Option<FakeDevice> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !(self.rule)(id, backend) {
            return None;
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Some(FakeDevice {
            released: false,
            counter: Arc::clone(&self.released),
        })
    }

    fn presence(&self, _id: &CameraId) -> Presence {
        self.presence
    }
}

pub struct FakeDevice {
    released: bool,
    counter: Arc<AtomicUsize>,
}

impl CaptureDevice for FakeDevice {
    fn read(&mut self) -> Option<Frame> {
        (!self.released).then(|| Frame::filled(4, 4, 3, 0))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}
