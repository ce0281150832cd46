//! Pure-Rust overlay renderer (image + imageproc).  Draws the warning
//! zone, the boxes, and the alert/saving markers; text needs a font and is
//! left to the OpenCV renderer.

use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut},
    rect::Rect as PixelRect,
};
use vigil_common::{Frame, Rect};
use vigil_pipeline::{Overlay, Renderer};

const RED: Rgb<u8> = Rgb([255, 0, 0]);
const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const ZONE_ALPHA: f32 = 0.3;

/// BGR/BGRA/grey frame to an RGB image.
pub fn frame_to_rgb(frame: &Frame) -> Option<RgbImage> {
    let ch = frame.channels as usize;
    let mut data = Vec::with_capacity(frame.width as usize * frame.height as usize * 3);
    for px in frame.data.chunks_exact(ch) {
        match ch {
            1 => data.extend_from_slice(&[px[0], px[0], px[0]]),
            3 | 4 => data.extend_from_slice(&[px[2], px[1], px[0]]),
            _ => return None,
        }
    }
    RgbImage::from_raw(frame.width, frame.height, data)
}

pub fn rgb_to_frame(img: &RgbImage) -> Option<Frame> {
    let mut data = Vec::with_capacity(img.as_raw().len());
    for px in img.pixels() {
        data.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    Frame::new(img.width(), img.height(), 3, data).ok()
}

/// `thickness` nested one-pixel outlines, shrinking inwards.
fn outline(img: &mut RgbImage, r: &Rect, thickness: i32, color: Rgb<u8>) {
    for i in 0..thickness {
        let (w, h) = (r.width() - 2 * i + 1, r.height() - 2 * i + 1);
        if w < 1 || h < 1 {
            break;
        }
        draw_hollow_rect_mut(
            img,
            PixelRect::at(r.x1 + i, r.y1 + i).of_size(w as u32, h as u32),
            color,
        );
    }
}

fn fill(img: &mut RgbImage, x: i32, y: i32, w: i32, h: i32, color: Rgb<u8>) {
    if w >= 1 && h >= 1 {
        draw_filled_rect_mut(img, PixelRect::at(x, y).of_size(w as u32, h as u32), color);
    }
}

fn shade(img: &mut RgbImage, zone: &Rect) {
    let (w, h) = img.dimensions();
    let x_end = (zone.x2.max(0) as u32).min(w);
    let y_end = (zone.y2.max(0) as u32).min(h);
    for y in zone.y1.max(0) as u32..y_end {
        for x in zone.x1.max(0) as u32..x_end {
            let px = img.get_pixel_mut(x, y);
            for (c, tint) in px.0.iter_mut().zip(RED.0) {
                *c = (f32::from(*c) * (1.0 - ZONE_ALPHA) + f32::from(tint) * ZONE_ALPHA) as u8;
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BoxRenderer;

impl Renderer for BoxRenderer {
    fn render(&mut self, frame: &Frame, overlay: &Overlay<'_>) -> Frame {
        let Some(mut img) = frame_to_rgb(frame) else {
            return frame.clone();
        };
        let (w, h) = (img.width() as i32, img.height() as i32);

        shade(&mut img, &overlay.zone);
        outline(&mut img, &overlay.zone, 2, RED);

        for det in overlay.detections {
            let (color, thickness) = if det.intrudes(&overlay.zone) {
                (RED, 3)
            } else {
                (GREEN, 2)
            };
            outline(&mut img, &det.rect(), thickness, color);
        }

        if overlay.intrusion && !overlay.saving {
            // centred alert plate
            fill(&mut img, w / 4, h / 2 - h / 10, w / 2, h / 5, BLACK);
            fill(&mut img, w / 4 + 4, h / 2 - h / 10 + 4, w / 2 - 8, h / 5 - 8, RED);
        }
        if overlay.saving {
            fill(&mut img, w - w / 4, 4, w / 4 - 4, (h / 12).max(4), RED);
        }

        rgb_to_frame(&img).unwrap_or_else(|| frame.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_common::{any_intrusion, Detection};

    fn overlay<'a>(frame: &Frame, dets: &'a [Detection], saving: bool) -> Overlay<'a> {
        let zone = Rect::right_band(frame.width, frame.height, 0.8);
        Overlay {
            detections: dets,
            rate: 30.0,
            detection_count: dets.len(),
            saving,
            camera_label: "#0",
            zone,
            intrusion: any_intrusion(dets, &zone),
        }
    }

    #[test]
    fn boxes_are_coloured_by_zone() {
        let frame = Frame::filled(100, 50, 3, 0);
        let dets = [
            Detection::new(10, 10, 30, 40, 0, 0.9),
            Detection::new(85, 10, 95, 40, 0, 0.8),
        ];
        let out = BoxRenderer.render(&frame, &overlay(&frame, &dets, false));

        assert_eq!(out.pixel(10, 20), Some(&[0u8, 255, 0][..]), "outside box is green");
        assert_eq!(out.pixel(85, 20), Some(&[0u8, 0, 255][..]), "zone box is red");
        assert_eq!(out.pixel(87, 20), Some(&[0u8, 0, 255][..]), "zone box is 3 px thick");
        assert_eq!(out.pixel(20, 20), Some(&[0u8, 0, 0][..]), "inside untouched");
        let tinted = out.pixel(90, 45).unwrap();
        assert!(tinted[2] > 0 && tinted[0] == 0, "zone is tinted red");
    }

    #[test]
    fn saving_hides_the_alert_plate() {
        let frame = Frame::filled(100, 50, 3, 0);
        let dets = [Detection::new(85, 10, 95, 40, 0, 0.8)];
        let alert = BoxRenderer.render(&frame, &overlay(&frame, &dets, false));
        let saving = BoxRenderer.render(&frame, &overlay(&frame, &dets, true));
        assert_eq!(alert.pixel(50, 25), Some(&[0u8, 0, 255][..]));
        assert_eq!(saving.pixel(50, 25), Some(&[0u8, 0, 0][..]));
        assert_eq!(saving.pixel(76, 5), Some(&[0u8, 0, 255][..]), "saving marker");
    }

    #[test]
    fn gray_frames_come_back_as_bgr() {
        let frame = Frame::filled(8, 8, 1, 7);
        let out = BoxRenderer.render(&frame, &overlay(&frame, &[], false));
        assert_eq!(out.channels, 3);
        assert_eq!(out.pixel(0, 0), Some(&[7u8, 7, 7][..]));
    }
}
