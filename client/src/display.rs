//! Window-less display: keeps the last composed frame, quits after an
//! optional run time, and writes the final frame to disk on close.

use std::{
    fs,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use image::ImageFormat;
use log::info;
use vigil_common::Frame;
use vigil_pipeline::{Display, Input};

use crate::render::frame_to_rgb;

const PROGRESS_EVERY: Duration = Duration::from_secs(5);

pub struct HeadlessDisplay {
    snapshot_dir: PathBuf,
    deadline: Option<Instant>,
    last: Option<(String, Frame)>,
    shown: u64,
    last_progress: Instant,
}

impl HeadlessDisplay {
    pub fn new(snapshot_dir: impl Into<PathBuf>, run_for: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            snapshot_dir: snapshot_dir.into(),
            deadline: run_for.map(|d| now + d),
            last: None,
            shown: 0,
            last_progress: now,
        }
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }

    /// Write the last shown frame as JPEG.  `Ok(None)` when nothing was shown.
    pub fn write_snapshot(&self) -> Result<Option<PathBuf>> {
        let Some((label, frame)) = &self.last else {
            return Ok(None);
        };
        let img = frame_to_rgb(frame).context("frame has an unsupported pixel layout")?;
        fs::create_dir_all(&self.snapshot_dir)
            .with_context(|| format!("cannot create {}", self.snapshot_dir.display()))?;
        let path = snapshot_path(&self.snapshot_dir, label);
        img.save_with_format(&path, ImageFormat::Jpeg)
            .with_context(|| format!("cannot write {}", path.display()))?;
        Ok(Some(path))
    }
}

fn snapshot_path(dir: &Path, label: &str) -> PathBuf {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let cam: String = label.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    dir.join(format!("vigil_{secs}_cam{cam}.jpg"))
}

impl Display for HeadlessDisplay {
    fn show(&mut self, camera_label: &str, frame: &Frame) -> Result<()> {
        self.shown += 1;
        self.last = Some((camera_label.to_string(), frame.clone()));
        if self.last_progress.elapsed() >= PROGRESS_EVERY {
            self.last_progress = Instant::now();
            info!("{} frame(s) shown, current camera {camera_label}", self.shown);
        }
        Ok(())
    }

    fn poll(&mut self, wait: Duration) -> Input {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Input::Quit;
        }
        thread::sleep(wait);
        Input::None
    }

    fn close(&mut self) -> Result<()> {
        info!("{} frame(s) shown", self.shown);
        if let Some(path) = self.write_snapshot()? {
            info!("last frame saved to {}", path.display());
        }
        Ok(())
    }
}
