// vigil-detect/src/lib.rs
// ============================================================
// vigil-detect  –  object-detection stage
// The pipeline only sees `Detector::predict(&Frame)`; which
// network runs behind it is this crate's business.
// ------------------------------------------------------------
// Pipeline: Frame → letterbox tensor → YOLO head → Vec<Detection>
// ------------------------------------------------------------
// Public API
//   * Detector::predict(frame)   – the black-box model call
//   * decode(output, …)          – YOLOv8 head → detections
//   * non_max_suppression / iou
//   * TractYolo::new(path, cfg)  – `--features tract`
// ============================================================

//! vigil – detection layer
//!
//! [`Detector`] is deliberately tiny: one call per frame, `&mut self` so an
//! implementation may keep scratch buffers, and `Send` so each camera's
//! inference thread can own one.  [`decode`] turns a raw YOLOv8 output
//! (`[4 + classes, anchors]`, centre boxes in model pixels) into
//! [`Detection`]s in source-frame pixels.

mod decode;
mod labels;

#[cfg(feature = "tract")]
mod tract;

pub use decode::{decode, iou, non_max_suppression, DecodeConfig};
pub use labels::{label, COCO_CLASSES};
#[cfg(feature = "tract")]
pub use tract::TractYolo;

use thiserror::Error;
pub use vigil_common::Detection;
use vigil_common::Frame;
use vigil_preprocess::PreprocessError;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("invalid output shape: expected [1, 4 + classes, anchors], got {0:?}")]
    InvalidOutputShape(Vec<usize>),
    #[error("model error: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, DetectError>;

/// The detection model as seen by an inference loop.
pub trait Detector: Send {
    fn predict(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Short description for logs.
    fn name(&self) -> &str {
        "detector"
    }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn predict(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        (**self).predict(frame)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Finds nothing, instantly.  Runs the pipeline without a model.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDetector;

impl Detector for NullDetector {
    fn predict(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "null"
    }
}
