//! Test-pattern capture source: a bright vertical bar sweeping across a
//! dark BGR frame at a fixed frame rate.  Used for demos and for running
//! the whole pipeline on machines without a camera backend.

use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

use vigil_common::Frame;

use crate::{Backend, CameraId, CaptureDevice, CaptureDriver, Presence};

#[derive(Debug, Clone)]
pub struct SyntheticDriver {
    cameras: HashSet<CameraId>,
    width: u32,
    height: u32,
    fps: f64,
}

impl SyntheticDriver {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            cameras: HashSet::new(),
            width: width.max(1),
            height: height.max(1),
            fps: if fps.is_finite() && fps > 0.0 { fps } else { 30.0 },
        }
    }

    /// Make `id` openable.
    pub fn with_camera(mut self, id: impl Into<CameraId>) -> Self {
        self.cameras.insert(id.into());
        self
    }

    pub fn with_cameras<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<CameraId>,
    {
        self.cameras.extend(ids.into_iter().map(Into::into));
        self
    }
}

impl Default for SyntheticDriver {
    fn default() -> Self {
        Self::new(640, 480, 30.0).with_camera(0)
    }
}

impl CaptureDriver for SyntheticDriver {
    type Device = SyntheticCamera;

    // The pattern has no backend, any hint is accepted.
    fn open(&self, id: &CameraId, _backend: Option<Backend>) -> Option<SyntheticCamera> {
        self.cameras
            .contains(id)
            .then(|| SyntheticCamera::new(self.width, self.height, self.fps))
    }

    fn presence(&self, id: &CameraId) -> Presence {
        if self.cameras.contains(id) {
            Presence::Present
        } else {
            Presence::Absent
        }
    }
}

#[derive(Debug)]
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    period: Duration,
    next_due: Instant,
    produced: u64,
    released: bool,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            period: Duration::from_secs_f64(1.0 / fps),
            next_due: Instant::now(),
            produced: 0,
            released: false,
        }
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn render(&self) -> Frame {
        let mut frame = Frame::filled(self.width, self.height, 3, 24);
        let bar = (self.width / 16).max(1);
        let span = self.width.saturating_sub(bar).max(1) as u64;
        let x0 = ((self.produced * 8) % span) as u32;
        for y in 0..self.height {
            for x in x0..(x0 + bar).min(self.width) {
                if let Some(px) = frame.pixel_mut(x, y) {
                    px.copy_from_slice(&[40, 200, 240]);
                }
            }
        }
        frame
    }
}

impl CaptureDevice for SyntheticCamera {
    fn read(&mut self) -> Option<Frame> {
        if self.released {
            return None;
        }
        let now = Instant::now();
        if now < self.next_due {
            return None;
        }
        let frame = self.render();
        self.produced += 1;
        // Skip missed slots rather than bursting to catch up.
        self.next_due = (self.next_due + self.period).max(now);
        Some(frame)
    }

    fn release(&mut self) {
        self.released = true;
    }
}
