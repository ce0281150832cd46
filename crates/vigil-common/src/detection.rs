use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixel coordinates, corners inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    /// Build from two corners in any order.
    pub fn new(xa: i32, ya: i32, xb: i32, yb: i32) -> Self {
        Self {
            x1: xa.min(xb),
            y1: ya.min(yb),
            x2: xa.max(xb),
            y2: ya.max(yb),
        }
    }

    /// The warning zone: a full-height band starting at `ratio` of the frame
    /// width and running to the right edge.  `0.8` keeps the right 20%.
    pub fn right_band(width: u32, height: u32, ratio: f32) -> Self {
        let ratio = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 1.0 };
        let x1 = (width as f32 * ratio) as i32;
        Self::new(x1, 0, width as i32, height as i32)
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Standard separating-axis test.  Touching edges count as overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        !(other.x2 < self.x1 || other.x1 > self.x2 || other.y2 < self.y1 || other.y1 > self.y2)
    }
}

/// One detector output box.  Coordinates are pixels of the frame the
/// detector was given; `x1 <= x2` and `y1 <= y2` always hold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub class_id: i32,
    pub score: f32,
}

impl Detection {
    /// Normalises corner order and clamps `score` into `[0, 1]`.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32, class_id: i32, score: f32) -> Self {
        let r = Rect::new(x1, y1, x2, y2);
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        Self {
            x1: r.x1,
            y1: r.y1,
            x2: r.x2,
            y2: r.y2,
            class_id,
            score,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect {
            x1: self.x1,
            y1: self.y1,
            x2: self.x2,
            y2: self.y2,
        }
    }

    pub fn intrudes(&self, zone: &Rect) -> bool {
        zone.overlaps(&self.rect())
    }
}

/// True when any detection's box overlaps the zone.
pub fn any_intrusion(detections: &[Detection], zone: &Rect) -> bool {
    detections.iter().any(|d| d.intrudes(zone))
}
