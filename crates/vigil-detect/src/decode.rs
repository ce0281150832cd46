// ------------------------------------------------------------
// YOLOv8 head decoding • IoU • NMS
// ------------------------------------------------------------

use ndarray::ArrayView2;
use vigil_common::Detection;
use vigil_preprocess::Letterbox;

use crate::{DetectError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct DecodeConfig {
    /// minimum class score
    pub confidence: f32,
    pub iou_threshold: f32,
    /// classes to keep, empty keeps everything
    pub classes: Vec<i32>,
    pub max_detections: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            confidence: 0.5,
            iou_threshold: 0.45,
            classes: vec![0], // person
            max_detections: 300,
        }
    }
}

impl DecodeConfig {
    fn keeps(&self, class_id: i32) -> bool {
        self.classes.is_empty() || self.classes.contains(&class_id)
    }
}

pub fn iou(a: &Detection, b: &Detection) -> f32 {
    let ix1 = a.x1.max(b.x1) as f32;
    let iy1 = a.y1.max(b.y1) as f32;
    let ix2 = a.x2.min(b.x2) as f32;
    let iy2 = a.y2.min(b.y2) as f32;
    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let area = |d: &Detection| ((d.x2 - d.x1) as f32) * ((d.y2 - d.y1) as f32);
    inter / (area(a) + area(b) - inter + 1e-6)
}

/// Greedy per-class NMS, highest score first.
pub fn non_max_suppression(mut dets: Vec<Detection>, iou_thr: f32, max: usize) -> Vec<Detection> {
    dets.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Detection> = Vec::with_capacity(dets.len().min(max));
    'outer: for d in dets {
        for k in &keep {
            if k.class_id == d.class_id && iou(&d, k) > iou_thr {
                continue 'outer;
            }
        }
        keep.push(d);
        if keep.len() >= max {
            break;
        }
    }
    keep
}

/// Decode one image's YOLOv8 output.
///
/// `output` is `[4 + classes, anchors]` (the batch axis already removed);
/// the transposed `[anchors, 4 + classes]` export is accepted too.  Boxes
/// are `cx, cy, w, h` in model pixels and are mapped back through
/// `letterbox` into source-frame pixels.
pub fn decode(
    output: ArrayView2<'_, f32>,
    letterbox: &Letterbox,
    cfg: &DecodeConfig,
) -> Result<Vec<Detection>> {
    let (rows, cols) = output.dim();
    let view = if rows > cols { output.reversed_axes() } else { output };
    let (features, anchors) = view.dim();
    if features < 5 {
        return Err(DetectError::InvalidOutputShape(vec![rows, cols]));
    }

    let mut dets = Vec::new();
    for a in 0..anchors {
        let column = view.column(a);
        let Some((best, score)) = column
            .iter()
            .skip(4)
            .copied()
            .enumerate()
            .max_by(|x, y| x.1.total_cmp(&y.1))
        else {
            continue;
        };
        let class_id = best as i32;
        if score < cfg.confidence || !cfg.keeps(class_id) {
            continue;
        }

        let (cx, cy, w, h) = (column[0], column[1], column[2], column[3]);
        let (x1, y1) = letterbox.to_source(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_source(cx + w / 2.0, cy + h / 2.0);
        dets.push(Detection::new(
            x1 as i32, y1 as i32, x2 as i32, y2 as i32, class_id, score,
        ));
    }

    Ok(non_max_suppression(dets, cfg.iou_threshold, cfg.max_detections))
}
