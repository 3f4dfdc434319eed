//! The five icon animations, each a pure function of frame index

use super::canvas::{
    Color, blank, draw_line, drop_shadow, fill_rect, gradient_circle, stroke_arc, with_opacity,
};
use crate::app::config::AnimationConfig;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};
use std::time::Duration;

const WHITE: Color = [255, 255, 255, 255];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationKind {
    Download,
    Error,
    Complete,
    Progress,
    Pause,
}

impl AnimationKind {
    pub const ALL: [AnimationKind; 5] = [
        Self::Download,
        Self::Error,
        Self::Complete,
        Self::Progress,
        Self::Pause,
    ];

    /// Frames before the cycle repeats
    pub fn frames_per_cycle(&self) -> u32 {
        match self {
            Self::Download => 16,
            Self::Error => 12,
            Self::Complete => 20,
            Self::Progress => 24,
            Self::Pause => 20,
        }
    }

    /// Time before auto-stop
    pub fn duration(&self, config: &AnimationConfig) -> Duration {
        let ms = match self {
            Self::Download => config.download_duration_ms,
            Self::Error => config.error_duration_ms,
            Self::Complete => config.complete_duration_ms,
            Self::Progress => config.progress_duration_ms,
            Self::Pause => config.pause_duration_ms,
        };
        Duration::from_millis(ms)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Error => "error",
            Self::Complete => "complete",
            Self::Progress => "progress",
            Self::Pause => "pause",
        }
    }

    /// Draw frame `frame` (taken modulo the cycle) at `size`x`size`
    ///
    /// `progress` is only read by [`AnimationKind::Progress`].
    pub fn render(&self, frame: u32, size: u32, progress: f32) -> RgbaImage {
        let phase = (frame % self.frames_per_cycle()) as f32 / self.frames_per_cycle() as f32;
        let mut img = blank(size);
        let geo = Geometry::new(size);

        match self {
            Self::Download => {
                geo.badge(&mut img, [66, 165, 245, 255], [21, 101, 192, 255]);
                // Arrow bounces down and back once per cycle
                let bounce = (phase * TAU).sin() * geo.r * 0.12;
                draw_arrow(&mut img, &geo, bounce);
            }
            Self::Error => {
                geo.badge(&mut img, [239, 83, 80, 255], [183, 28, 28, 255]);
                // Decaying horizontal shake
                let shake = (phase * TAU * 3.0).sin() * geo.r * 0.15 * (1.0 - phase);
                draw_cross(&mut img, &geo, shake);
            }
            Self::Complete => {
                geo.badge(&mut img, [102, 187, 106, 255], [46, 125, 50, 255]);
                // Check mark draws in during the first half, then holds
                draw_check(&mut img, &geo, (phase * 2.0).min(1.0));
            }
            Self::Progress => {
                geo.badge(&mut img, [84, 110, 122, 255], [38, 50, 56, 255]);
                let ring = geo.r * 0.62;
                let thickness = (geo.r * 0.22).max(1.5);
                stroke_arc(&mut img, geo.c, geo.c, ring, thickness, 0.0, TAU, [255, 255, 255, 70]);
                stroke_arc(
                    &mut img,
                    geo.c,
                    geo.c,
                    ring,
                    thickness,
                    0.0,
                    progress.clamp(0.0, 1.0) * TAU,
                    [79, 195, 247, 255],
                );
                // Rotating highlight keeps the icon alive on stalled transfers
                stroke_arc(
                    &mut img,
                    geo.c,
                    geo.c,
                    ring,
                    thickness * 0.5,
                    phase * TAU,
                    PI / 6.0,
                    [255, 255, 255, 140],
                );
            }
            Self::Pause => {
                geo.badge(&mut img, [255, 202, 40, 255], [245, 127, 23, 255]);
                let pulse = 0.55 + 0.45 * (0.5 + 0.5 * (phase * TAU).cos());
                let mut bars = blank(size);
                let w = geo.r * 0.28;
                let h = geo.r * 0.95;
                let top = geo.c - h / 2.0;
                fill_rect(&mut bars, geo.c - w * 1.4, top, w, h, WHITE);
                fill_rect(&mut bars, geo.c + w * 0.4, top, w, h, WHITE);
                overlay(&mut img, &with_opacity(&bars, pulse));
            }
        }
        img
    }
}

impl std::fmt::Display for AnimationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared layout: a shadowed disc centered in the icon
struct Geometry {
    c: f32,
    r: f32,
}

impl Geometry {
    fn new(size: u32) -> Self {
        let s = size as f32;
        Self {
            c: s / 2.0,
            r: s * 0.44,
        }
    }

    fn badge(&self, img: &mut RgbaImage, top: Color, bottom: Color) {
        drop_shadow(img, self.c, self.c, self.r, (self.r * 0.06).max(0.5));
        gradient_circle(img, self.c, self.c, self.r, top, bottom);
    }

    fn stroke(&self) -> f32 {
        (self.r * 0.2).max(1.2)
    }
}

fn draw_arrow(img: &mut RgbaImage, geo: &Geometry, dy: f32) {
    let (c, r) = (geo.c, geo.r);
    let tip = c + r * 0.45 + dy;
    draw_line(img, (c, c - r * 0.5 + dy), (c, tip), geo.stroke(), WHITE);
    draw_line(img, (c - r * 0.38, tip - r * 0.38), (c, tip), geo.stroke(), WHITE);
    draw_line(img, (c + r * 0.38, tip - r * 0.38), (c, tip), geo.stroke(), WHITE);
}

fn draw_cross(img: &mut RgbaImage, geo: &Geometry, dx: f32) {
    let (c, k) = (geo.c + dx, geo.r * 0.4);
    draw_line(img, (c - k, geo.c - k), (c + k, geo.c + k), geo.stroke(), WHITE);
    draw_line(img, (c + k, geo.c - k), (c - k, geo.c + k), geo.stroke(), WHITE);
}

fn draw_check(img: &mut RgbaImage, geo: &Geometry, amount: f32) {
    if amount <= 0.0 {
        return;
    }
    let (c, r) = (geo.c, geo.r);
    let a = (c - r * 0.45, c + r * 0.02);
    let b = (c - r * 0.12, c + r * 0.35);
    let e = (c + r * 0.48, c - r * 0.3);

    // First stroke takes the first 40% of the draw-in
    let first = (amount / 0.4).min(1.0);
    draw_line(img, a, lerp(a, b, first), geo.stroke(), WHITE);
    if amount > 0.4 {
        let second = ((amount - 0.4) / 0.6).min(1.0);
        draw_line(img, b, lerp(b, e, second), geo.stroke(), WHITE);
    }
}

fn lerp(a: (f32, f32), b: (f32, f32), t: f32) -> (f32, f32) {
    (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t)
}

fn overlay(dst: &mut RgbaImage, src: &RgbaImage) {
    for (x, y, px) in src.enumerate_pixels() {
        super::canvas::blend(dst, x, y, px.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_renders_requested_size() {
        for kind in AnimationKind::ALL {
            for frame in [0, 1, kind.frames_per_cycle() - 1] {
                let img = kind.render(frame, 32, 0.5);
                assert_eq!(img.dimensions(), (32, 32), "{} frame {}", kind, frame);
                // Center is always opaque, corners stay transparent
                assert!(img.get_pixel(16, 16).0[3] > 200, "{}", kind);
                assert_eq!(img.get_pixel(0, 0).0[3], 0, "{}", kind);
            }
        }
    }

    #[test]
    fn test_frames_wrap_around_cycle() {
        let kind = AnimationKind::Download;
        let n = kind.frames_per_cycle();
        assert_eq!(kind.render(3, 24, 0.0), kind.render(3 + n, 24, 0.0));
    }

    #[test]
    fn test_animation_changes_between_frames() {
        let kind = AnimationKind::Download;
        assert_ne!(kind.render(0, 32, 0.0), kind.render(4, 32, 0.0));
    }

    #[test]
    fn test_progress_value_changes_output() {
        let kind = AnimationKind::Progress;
        assert_ne!(kind.render(0, 32, 0.1), kind.render(0, 32, 0.9));
    }

    #[test]
    fn test_duration_from_config() {
        let config = AnimationConfig::default();
        assert_eq!(
            AnimationKind::Error.duration(&config),
            Duration::from_millis(config.error_duration_ms)
        );
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&AnimationKind::Progress).unwrap(),
            "\"progress\""
        );
        let kind: AnimationKind = serde_json::from_str("\"pause\"").unwrap();
        assert_eq!(kind, AnimationKind::Pause);
    }
}
