// vigil-preprocess/src/lib.rs
// ============================================================
// Frame -> model input
//   1. BGR/BGRA/gray bytes to packed RGB
//   2. aspect-preserving resize into a square canvas (letterbox)
//   3. 0..255 -> 0.0..1.0, packed as (H, W, C) or (1, C, H, W)
// ------------------------------------------------------------

//! vigil-preprocess – letterbox + normalise.
//!
//! The [`Letterbox`] returned with every tensor maps model coordinates
//! back onto the source frame.

use ndarray::{Array3, Array4, Axis};
use resize::{Pixel, Type};
use rgb::FromSlice;
use thiserror::Error;
use vigil_common::Frame;

/// Grey used for the padding bars, the value YOLO models were trained with.
pub const PAD_VALUE: u8 = 114;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("empty frame")]
    EmptyFrame,
    #[error("unsupported channel count {0}")]
    UnsupportedChannels(u8),
    #[error("resize failed: {0}")]
    Resize(#[from] resize::Error),
}

pub type Result<T> = std::result::Result<T, PreprocessError>;

/// Geometry of one letterbox transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// model pixels per source pixel
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub src_width: u32,
    pub src_height: u32,
}

impl Letterbox {
    pub fn fit(src_width: u32, src_height: u32, size: u32) -> Self {
        let scale = (size as f32 / src_width as f32).min(size as f32 / src_height as f32);
        let new_w = (src_width as f32 * scale).round();
        let new_h = (src_height as f32 * scale).round();
        Self {
            scale,
            pad_x: ((size as f32 - new_w) / 2.0).floor(),
            pad_y: ((size as f32 - new_h) / 2.0).floor(),
            src_width,
            src_height,
        }
    }

    /// Model-space point to source-frame pixel, clamped to the frame.
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        let sx = (x - self.pad_x) / self.scale;
        let sy = (y - self.pad_y) / self.scale;
        (
            sx.clamp(0.0, self.src_width as f32 - 1.0),
            sy.clamp(0.0, self.src_height as f32 - 1.0),
        )
    }

    fn inner_size(&self) -> (usize, usize) {
        (
            ((self.src_width as f32 * self.scale).round() as usize).max(1),
            ((self.src_height as f32 * self.scale).round() as usize).max(1),
        )
    }
}

/// A normalised (H, W, 3) RGB tensor plus the transform that produced it.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub tensor: Array3<f32>,
    pub letterbox: Letterbox,
}

impl Preprocessed {
    /// (1, 3, H, W) layout expected by ONNX detectors.
    pub fn to_nchw(&self) -> Array4<f32> {
        self.tensor
            .view()
            .permuted_axes([2, 0, 1])
            .insert_axis(Axis(0))
            .as_standard_layout()
            .into_owned()
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    size: u32,
}

impl Preprocessor {
    /// Output is a `size` x `size` square.
    pub fn new(size: u32) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn run(&self, frame: &Frame) -> Result<Preprocessed> {
        if frame.is_empty() {
            return Err(PreprocessError::EmptyFrame);
        }
        let rgb = to_rgb(frame)?;
        let letterbox = Letterbox::fit(frame.width, frame.height, self.size);
        let (inner_w, inner_h) = letterbox.inner_size();

        let mut scaled = vec![0u8; inner_w * inner_h * 3];
        let mut resizer = resize::new(
            frame.width as usize,
            frame.height as usize,
            inner_w,
            inner_h,
            Pixel::RGB8,
            Type::Triangle,
        )?;
        resizer.resize(rgb.as_rgb(), scaled.as_rgb_mut())?;

        let side = self.size as usize;
        let (ox, oy) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
        let pad = PAD_VALUE as f32 / 255.0;
        let mut tensor = Array3::<f32>::from_elem((side, side, 3), pad);
        for y in 0..inner_h.min(side - oy) {
            for x in 0..inner_w.min(side - ox) {
                let base = (y * inner_w + x) * 3;
                for c in 0..3 {
                    tensor[[oy + y, ox + x, c]] = scaled[base + c] as f32 / 255.0;
                }
            }
        }
        Ok(Preprocessed { tensor, letterbox })
    }
}

/// Frames arrive in capture order (BGR for colour, BGRA, or grey).
fn to_rgb(frame: &Frame) -> Result<Vec<u8>> {
    let ch = frame.channels as usize;
    if !matches!(ch, 1 | 3 | 4) {
        return Err(PreprocessError::UnsupportedChannels(frame.channels));
    }
    let mut out = Vec::with_capacity(frame.width as usize * frame.height as usize * 3);
    for px in frame.data.chunks_exact(ch) {
        match ch {
            1 => out.extend_from_slice(&[px[0], px[0], px[0]]),
            _ => out.extend_from_slice(&[px[2], px[1], px[0]]),
        }
    }
    Ok(out)
}
