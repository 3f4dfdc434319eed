//! Anti-aliased drawing on square RGBA icon rasters
//!
//! Coordinates are in pixels with the origin at the top-left corner; shapes
//! are sampled at pixel centers and blended source-over.

use image::{Rgba, RgbaImage};

pub type Color = [u8; 4];

pub fn blank(size: u32) -> RgbaImage {
    RgbaImage::new(size, size)
}

/// Source-over blend of `color` scaled by `coverage` (0..=1)
pub fn blend(img: &mut RgbaImage, x: u32, y: u32, color: Color, coverage: f32) {
    if x >= img.width() || y >= img.height() {
        return;
    }
    let src_a = (color[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if src_a <= 0.0 {
        return;
    }
    let dst = img.get_pixel(x, y).0;
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);

    let mut out = [0u8; 4];
    for c in 0..3 {
        let value = if out_a > 0.0 {
            (color[c] as f32 * src_a + dst[c] as f32 * dst_a * (1.0 - src_a)) / out_a
        } else {
            0.0
        };
        out[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    img.put_pixel(x, y, Rgba(out));
}

/// Coverage of a pixel whose center is `distance` inside (negative) or
/// outside (positive) an edge
fn edge_coverage(distance: f32) -> f32 {
    (0.5 - distance).clamp(0.0, 1.0)
}

pub fn fill_circle(img: &mut RgbaImage, cx: f32, cy: f32, radius: f32, color: Color) {
    for_each_pixel(img, |x, y, px, py| {
        let d = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt() - radius;
        (x, y, edge_coverage(d))
    })
    .into_iter()
    .for_each(|(x, y, cov)| blend(img, x, y, color, cov));
}

/// Disc shaded from `top` to `bottom`
pub fn gradient_circle(img: &mut RgbaImage, cx: f32, cy: f32, radius: f32, top: Color, bottom: Color) {
    let samples = for_each_pixel(img, |x, y, px, py| {
        let d = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt() - radius;
        (x, y, edge_coverage(d))
    });
    for (x, y, cov) in samples {
        if cov <= 0.0 {
            continue;
        }
        let t = ((y as f32 + 0.5 - (cy - radius)) / (2.0 * radius)).clamp(0.0, 1.0);
        blend(img, x, y, lerp_color(top, bottom, t), cov);
    }
}

/// Soft dark halo offset below a disc
pub fn drop_shadow(img: &mut RgbaImage, cx: f32, cy: f32, radius: f32, offset: f32) {
    let blur = (radius * 0.15).max(1.0);
    let samples = for_each_pixel(img, |x, y, px, py| {
        let d = ((px - cx).powi(2) + (py - cy - offset).powi(2)).sqrt() - radius;
        (x, y, (1.0 - d / blur).clamp(0.0, 1.0))
    });
    for (x, y, cov) in samples {
        blend(img, x, y, [0, 0, 0, 90], cov);
    }
}

/// Ring segment from `start` sweeping `sweep` radians clockwise (0 = 12 o'clock)
pub fn stroke_arc(
    img: &mut RgbaImage,
    cx: f32,
    cy: f32,
    radius: f32,
    thickness: f32,
    start: f32,
    sweep: f32,
    color: Color,
) {
    if sweep <= 0.0 {
        return;
    }
    let full = std::f32::consts::TAU;
    let samples = for_each_pixel(img, |x, y, px, py| {
        let dx = px - cx;
        let dy = py - cy;
        let ring = ((dx * dx + dy * dy).sqrt() - radius).abs() - thickness / 2.0;
        let mut cov = edge_coverage(ring);
        if sweep < full && cov > 0.0 {
            // Angle measured clockwise from 12 o'clock
            let angle = dx.atan2(-dy).rem_euclid(full);
            let rel = (angle - start).rem_euclid(full);
            if rel > sweep {
                cov = 0.0;
            }
        }
        (x, y, cov)
    });
    for (x, y, cov) in samples {
        blend(img, x, y, color, cov);
    }
}

/// Thick segment with round caps
pub fn draw_line(
    img: &mut RgbaImage,
    from: (f32, f32),
    to: (f32, f32),
    thickness: f32,
    color: Color,
) {
    let (ax, ay) = from;
    let (bx, by) = to;
    let (vx, vy) = (bx - ax, by - ay);
    let len_sq = (vx * vx + vy * vy).max(f32::EPSILON);

    let samples = for_each_pixel(img, |x, y, px, py| {
        let t = (((px - ax) * vx + (py - ay) * vy) / len_sq).clamp(0.0, 1.0);
        let (qx, qy) = (ax + t * vx, ay + t * vy);
        let d = ((px - qx).powi(2) + (py - qy).powi(2)).sqrt() - thickness / 2.0;
        (x, y, edge_coverage(d))
    });
    for (x, y, cov) in samples {
        blend(img, x, y, color, cov);
    }
}

pub fn fill_rect(img: &mut RgbaImage, x0: f32, y0: f32, w: f32, h: f32, color: Color) {
    let samples = for_each_pixel(img, |x, y, px, py| {
        let cov_x = (px + 0.5).min(x0 + w) - (px - 0.5).max(x0);
        let cov_y = (py + 0.5).min(y0 + h) - (py - 0.5).max(y0);
        (x, y, cov_x.clamp(0.0, 1.0) * cov_y.clamp(0.0, 1.0))
    });
    for (x, y, cov) in samples {
        blend(img, x, y, color, cov);
    }
}

/// Copy of `img` with every alpha scaled by `opacity`
pub fn with_opacity(img: &RgbaImage, opacity: f32) -> RgbaImage {
    let opacity = opacity.clamp(0.0, 1.0);
    let mut out = img.clone();
    for px in out.pixels_mut() {
        px.0[3] = (px.0[3] as f32 * opacity).round() as u8;
    }
    out
}

/// Alpha-composite `from` at `1 - t` and `to` at `t`
pub fn cross_fade(from: &RgbaImage, to: &RgbaImage, t: f32) -> RgbaImage {
    let t = t.clamp(0.0, 1.0);
    if from.dimensions() != to.dimensions() {
        return to.clone();
    }
    let mut out = with_opacity(from, 1.0 - t);
    for (x, y, px) in to.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        blend(&mut out, x, y, [r, g, b, a], t);
    }
    out
}

pub fn lerp_color(a: Color, b: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = (a[i] as f32 + (b[i] as f32 - a[i] as f32) * t).round() as u8;
    }
    out
}

/// Ease-in-out cubic on `t` in 0..=1
pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

fn for_each_pixel<F>(img: &RgbaImage, mut f: F) -> Vec<(u32, u32, f32)>
where
    F: FnMut(u32, u32, f32, f32) -> (u32, u32, f32),
{
    let (w, h) = img.dimensions();
    let mut out = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            out.push(f(x, y, x as f32 + 0.5, y as f32 + 0.5));
        }
    }
    out
}
