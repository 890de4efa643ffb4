use image::{Rgba, RgbaImage};

use crate::geometry::BBox;

pub const COMMITTED_COLOR: [u8; 4] = [0, 255, 0, 255];
pub const DRAFT_COLOR: [u8; 4] = [255, 0, 0, 255];

/// Copy of `base` with every box outlined in `color`.
pub fn overlay(base: &RgbaImage, boxes: &[BBox], color: [u8; 4], thickness: u32) -> RgbaImage {
    let mut img = base.clone();
    for b in boxes {
        draw_rect_outline(&mut img, b, color, thickness);
    }
    img
}

/// Outlines `b` in place. Pixels that fall outside the image are dropped,
/// so boxes partially or fully off-canvas are fine.
pub fn draw_rect_outline(img: &mut RgbaImage, b: &BBox, color: [u8; 4], thickness: u32) {
    let (min, max) = b.corners();
    let t = thickness.max(1) as i32;
    for i in 0..t {
        let (x0, y0, x1, y1) = (min.x + i, min.y + i, max.x - i, max.y - i);
        if x0 > x1 || y0 > y1 {
            break;
        }
        for x in x0..=x1 {
            put(img, x, y0, color);
            put(img, x, y1, color);
        }
        for y in y0..=y1 {
            put(img, x0, y, color);
            put(img, x1, y, color);
        }
    }
}

fn put(img: &mut RgbaImage, x: i32, y: i32, color: [u8; 4]) {
    let (w, h) = (img.width() as i32, img.height() as i32);
    if x >= 0 && x < w && y >= 0 && y < h {
        img.put_pixel(x as u32, y as u32, Rgba(color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_touches_edges_only() {
        let base = RgbaImage::new(20, 20);
        let img = overlay(&base, &[BBox::new((15, 15), (5, 5))], COMMITTED_COLOR, 1);
        assert_eq!(img.get_pixel(5, 5).0, COMMITTED_COLOR);
        assert_eq!(img.get_pixel(15, 10).0, COMMITTED_COLOR);
        assert_eq!(img.get_pixel(10, 10).0, [0, 0, 0, 0]);
        assert_eq!(img.get_pixel(4, 4).0, [0, 0, 0, 0]);
    }

    #[test]
    fn off_canvas_box_is_clipped() {
        let base = RgbaImage::new(10, 10);
        let img = overlay(&base, &[BBox::new((-5, -5), (40, 3))], COMMITTED_COLOR, 1);
        assert_eq!(img.get_pixel(0, 3).0, COMMITTED_COLOR);
        assert_eq!(img.get_pixel(9, 3).0, COMMITTED_COLOR);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }
}
