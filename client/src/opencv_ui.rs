//! HighGUI window and the text-annotated overlay renderer.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use log::warn;
use opencv::{
    core::{self, Mat, Point, Rect, Scalar, Size},
    highgui, imgproc,
    prelude::*,
};
use vigil_camera::opencv::{frame_to_mat, mat_to_frame};
use vigil_common::Frame;
use vigil_detect::label;
use vigil_pipeline::{Display, Input, Overlay, Renderer};

const FONT: i32 = imgproc::FONT_HERSHEY_SIMPLEX;

fn bgr(b: f64, g: f64, r: f64) -> Scalar {
    Scalar::new(b, g, r, 0.0)
}

pub struct WindowDisplay {
    name: String,
    open: bool,
}

impl WindowDisplay {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        highgui::named_window(&name, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("cannot create window {name:?}"))?;
        Ok(Self { name, open: true })
    }
}

impl Display for WindowDisplay {
    fn show(&mut self, _camera_label: &str, frame: &Frame) -> Result<()> {
        let mat = frame_to_mat(frame)?;
        highgui::imshow(&self.name, &mat)?;
        Ok(())
    }

    fn poll(&mut self, wait: Duration) -> Input {
        let ms = wait.as_millis().clamp(1, i32::MAX as u128) as i32;
        match highgui::wait_key(ms) {
            Ok(key) => match (key & 0xFF) as u8 {
                b'q' | b'Q' => Input::Quit,
                b'c' | b'C' => Input::SwitchCamera,
                _ => Input::None,
            },
            Err(e) => {
                warn!("wait_key failed: {e}");
                Input::None
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if std::mem::take(&mut self.open) {
            highgui::destroy_window(&self.name)?;
        }
        Ok(())
    }
}

impl Drop for WindowDisplay {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// UTC wall clock as `HH:MM:SS`.
fn clock() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        % 86_400;
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

fn text(
    img: &mut Mat,
    s: &str,
    org: Point,
    scale: f64,
    color: Scalar,
    thickness: i32,
) -> opencv::Result<()> {
    imgproc::put_text(
        img,
        s,
        org,
        FONT,
        scale,
        color,
        thickness,
        imgproc::LINE_AA,
        false,
    )
}

fn text_size(s: &str, scale: f64, thickness: i32) -> opencv::Result<Size> {
    let mut baseline = 0;
    imgproc::get_text_size(s, FONT, scale, thickness, &mut baseline)
}

fn rect(img: &mut Mat, r: Rect, color: Scalar, thickness: i32) -> opencv::Result<()> {
    imgproc::rectangle(img, r, color, thickness, imgproc::LINE_8, 0)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OpenCvRenderer;

impl OpenCvRenderer {
    fn draw(&self, frame: &Frame, overlay: &Overlay<'_>) -> opencv::Result<Mat> {
        let mut img = frame_to_mat(frame)?;
        let (w, h) = (img.cols(), img.rows());
        let red = bgr(0.0, 0.0, 255.0);
        let green = bgr(0.0, 255.0, 0.0);
        let white = bgr(255.0, 255.0, 255.0);

        // translucent warning zone
        let z = overlay.zone;
        let zone = Rect::new(z.x1, z.y1, z.width(), z.height());
        let mut tinted = img.try_clone()?;
        rect(&mut tinted, zone, red, -1)?;
        let mut blended = Mat::default();
        core::add_weighted(&tinted, 0.3, &img, 0.7, 0.0, &mut blended, -1)?;
        img = blended;
        rect(&mut img, zone, red, 2)?;

        for d in overlay.detections {
            let inside = d.intrudes(&overlay.zone);
            let (color, thickness) = if inside { (red, 3) } else { (green, 2) };
            rect(
                &mut img,
                Rect::new(d.x1, d.y1, d.x2 - d.x1, d.y2 - d.y1),
                color,
                thickness,
            )?;
            let name = label(d.class_id).unwrap_or("object");
            let caption = format!("{name} {:.2}", d.score);
            text(&mut img, &caption, Point::new(d.x1, (d.y1 - 8).max(12)), 0.5, color, 2)?;
        }

        if overlay.intrusion && !overlay.saving {
            let msg = "WARNING!";
            let size = text_size(msg, 1.5, 3)?;
            let org = Point::new((w - size.width) / 2, (h + size.height) / 2);
            let plate = Rect::new(
                org.x - 10,
                org.y - size.height - 10,
                size.width + 20,
                size.height + 20,
            );
            rect(&mut img, plate, bgr(0.0, 0.0, 0.0), -1)?;
            text(&mut img, msg, org, 1.5, red, 3)?;
        }

        let status: Vec<String> = if overlay.saving {
            vec!["Saving...".into()]
        } else {
            vec![
                format!("Time: {}", clock()),
                format!("FPS: {:.1}", overlay.rate),
                format!("Detected: {}", overlay.detection_count),
                format!("Camera: {}", overlay.camera_label),
            ]
        };
        for (i, line) in status.iter().enumerate() {
            let size = text_size(line, 0.6, 2)?;
            let color = if overlay.saving { red } else { white };
            let org = Point::new(w - size.width - 10, 25 + 25 * i as i32);
            text(&mut img, line, org, 0.6, color, 2)?;
        }

        text(&mut img, "[Q] Exit", Point::new(10, h - 35), 0.6, white, 2)?;
        text(&mut img, "[C] Switch Camera", Point::new(10, h - 10), 0.6, white, 2)?;
        Ok(img)
    }
}

impl Renderer for OpenCvRenderer {
    fn render(&mut self, frame: &Frame, overlay: &Overlay<'_>) -> Frame {
        match self.draw(frame, overlay) {
            Ok(img) => mat_to_frame(&img).unwrap_or_else(|| frame.clone()),
            Err(e) => {
                warn!("overlay drawing failed: {e}");
                frame.clone()
            }
        }
    }
}
