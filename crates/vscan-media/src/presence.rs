//! Cheap human-presence checks for the thorough scan pre-filter.
//!
//! These never feed the sensitivity verdict directly. They only decide
//! which timestamps get a full detector pass.

use image::{imageops, RgbImage};

/// Fast yes/no check for a human in a frame.
pub trait HumanPresence {
    fn contains_human(&self, frame: &RgbImage) -> bool;
}

/// Flags frames whose skin-tone pixel coverage exceeds a fraction.
///
/// Classifies pixels in YCbCr space on a downsampled copy of the frame.
#[derive(Debug, Clone)]
pub struct SkinToneCheck {
    /// Minimum share of skin-tone pixels, in [0, 1]
    pub min_fraction: f32,
    /// Longest edge of the downsampled frame
    pub sample_edge: u32,
}

impl Default for SkinToneCheck {
    fn default() -> Self {
        Self {
            min_fraction: 0.02,
            sample_edge: 64,
        }
    }
}

impl SkinToneCheck {
    /// Share of skin-tone pixels in `frame`.
    pub fn skin_fraction(&self, frame: &RgbImage) -> f32 {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return 0.0;
        }

        let edge = self.sample_edge.max(1);
        let small;
        let sample = if width.max(height) > edge {
            let factor = edge as f32 / width.max(height) as f32;
            let w = ((width as f32 * factor).round() as u32).max(1);
            let h = ((height as f32 * factor).round() as u32).max(1);
            small = imageops::thumbnail(frame, w, h);
            &small
        } else {
            frame
        };

        let total = sample.pixels().len();
        let skin = sample.pixels().filter(|p| is_skin_tone(p[0], p[1], p[2])).count();
        skin as f32 / total as f32
    }
}

impl HumanPresence for SkinToneCheck {
    fn contains_human(&self, frame: &RgbImage) -> bool {
        self.skin_fraction(frame) >= self.min_fraction
    }
}

/// Treats every frame as containing a human.
///
/// Makes thorough mode run full detection at every sampled timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeHuman;

impl HumanPresence for AssumeHuman {
    fn contains_human(&self, _frame: &RgbImage) -> bool {
        true
    }
}

/// BT.601 full-range skin cluster.
fn is_skin_tone(r: u8, g: u8, b: u8) -> bool {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    y > 40.0 && (77.0..=127.0).contains(&cb) && (133.0..=173.0).contains(&cr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_skin_pixel_classification() {
        assert!(is_skin_tone(224, 172, 140));
        assert!(is_skin_tone(198, 134, 66));
        assert!(!is_skin_tone(0, 0, 255));
        assert!(!is_skin_tone(0, 0, 0));
        assert!(!is_skin_tone(255, 255, 255));
    }

    #[test]
    fn test_black_frame_has_no_human() {
        let check = SkinToneCheck::default();
        assert!(!check.contains_human(&RgbImage::new(320, 240)));
    }

    #[test]
    fn test_skin_patch_detected_after_downsample() {
        let mut frame = RgbImage::from_pixel(400, 300, Rgb([20, 60, 200]));
        for y in 100..200 {
            for x in 150..250 {
                frame.put_pixel(x, y, Rgb([224, 172, 140]));
            }
        }
        let check = SkinToneCheck::default();
        let fraction = check.skin_fraction(&frame);
        assert!(fraction > 0.05 && fraction < 0.15, "fraction = {}", fraction);
        assert!(check.contains_human(&frame));
    }

    #[test]
    fn test_empty_frame() {
        let check = SkinToneCheck::default();
        assert_eq!(check.skin_fraction(&RgbImage::new(0, 0)), 0.0);
    }

    #[test]
    fn test_assume_human() {
        assert!(AssumeHuman.contains_human(&RgbImage::new(1, 1)));
    }
}
