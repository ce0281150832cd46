//! What the orchestrator needs from the outside world each tick: something
//! to draw overlays, somewhere to show the result, and two input signals.

use std::time::Duration;

use vigil_common::{Detection, Frame, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    None,
    SwitchCamera,
    Quit,
}

/// Everything a renderer may draw on top of a frame.
#[derive(Debug, Clone, Copy)]
pub struct Overlay<'a> {
    pub detections: &'a [Detection],
    pub rate: f64,
    pub detection_count: usize,
    pub saving: bool,
    pub camera_label: &'a str,
    pub zone: Rect,
    pub intrusion: bool,
}

pub trait Renderer {
    fn render(&mut self, frame: &Frame, overlay: &Overlay<'_>) -> Frame;
}

/// Returns the frame untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughRenderer;

impl Renderer for PassthroughRenderer {
    fn render(&mut self, frame: &Frame, _overlay: &Overlay<'_>) -> Frame {
        frame.clone()
    }
}

pub trait Display {
    fn show(&mut self, camera_label: &str, frame: &Frame) -> anyhow::Result<()>;

    /// Wait up to `wait` for user input.
    fn poll(&mut self, wait: Duration) -> Input;

    /// Tear down windows, flush snapshots.  Called once from shutdown.
    fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<T: Display + ?Sized> Display for Box<T> {
    fn show(&mut self, camera_label: &str, frame: &Frame) -> anyhow::Result<()> {
        (**self).show(camera_label, frame)
    }

    fn poll(&mut self, wait: Duration) -> Input {
        (**self).poll(wait)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        (**self).close()
    }
}

impl<T: Renderer + ?Sized> Renderer for Box<T> {
    fn render(&mut self, frame: &Frame, overlay: &Overlay<'_>) -> Frame {
        (**self).render(frame, overlay)
    }
}
