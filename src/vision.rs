//! Color-threshold flame classification.
//!
//! A frame is flame-positive when enough of its pixels fall inside an
//! orange/yellow band in HSV space. Hue uses the common 8-bit scale where
//! degrees are halved (`0..180`); saturation and value span `0..=255`.
//!
//! The pixel-count threshold is absolute, not relative to the frame size,
//! so it must be retuned if the source resolution changes.

use image::{Rgb, RgbImage};
use serde::Serialize;

/// Default minimum number of in-band pixels, exclusive.
pub const DEFAULT_PIXEL_THRESHOLD: u64 = 500;

/// An HSV pixel on the 8-bit scale (`h < 180`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    /// Convert an RGB pixel to 8-bit HSV, rounding to nearest.
    pub fn from_rgb(Rgb([r, g, b]): Rgb<u8>) -> Self {
        let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
        let max = rf.max(gf).max(bf);
        let min = rf.min(gf).min(bf);
        let diff = max - min;

        let s = if max > 0.0 { diff * 255.0 / max } else { 0.0 };

        let mut h = if diff == 0.0 {
            0.0
        } else if max == rf {
            60.0 * (gf - bf) / diff
        } else if max == gf {
            120.0 + 60.0 * (bf - rf) / diff
        } else {
            240.0 + 60.0 * (rf - gf) / diff
        };
        if h < 0.0 {
            h += 360.0;
        }

        // h is in [0, 360) here; halve and round ties up, wrapping 180 to 0
        let h8 = ((h / 2.0 + 0.5).floor() as u16) % 180;

        // All three values are < 256 by construction
        Self {
            h: h8 as u8,
            s: (s + 0.5).floor() as u8,
            v: max as u8,
        }
    }
}

/// Inclusive HSV range used to build the flame mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColorBand {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorBand {
    /// Orange/yellow band typical of a gas or wood flame.
    pub const FLAME: ColorBand = ColorBand {
        lower: [10, 100, 100],
        upper: [35, 255, 255],
    };

    pub fn contains(&self, hsv: Hsv) -> bool {
        (self.lower[0]..=self.upper[0]).contains(&hsv.h)
            && (self.lower[1]..=self.upper[1]).contains(&hsv.s)
            && (self.lower[2]..=self.upper[2]).contains(&hsv.v)
    }
}

impl Default for ColorBand {
    fn default() -> Self {
        Self::FLAME
    }
}

/// Outcome of classifying a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub flame: bool,
    pub flame_pixels: u64,
}

/// Static color-range classifier.
#[derive(Debug, Clone, Copy)]
pub struct FlameClassifier {
    band: ColorBand,
    pixel_threshold: u64,
}

impl Default for FlameClassifier {
    fn default() -> Self {
        Self::new(ColorBand::FLAME, DEFAULT_PIXEL_THRESHOLD)
    }
}

impl FlameClassifier {
    pub fn new(band: ColorBand, pixel_threshold: u64) -> Self {
        Self {
            band,
            pixel_threshold,
        }
    }

    pub fn pixel_threshold(&self) -> u64 {
        self.pixel_threshold
    }

    /// Number of pixels in `frame` that fall inside the color band.
    pub fn count_flame_pixels(&self, frame: &RgbImage) -> u64 {
        frame
            .pixels()
            .filter(|&&px| self.band.contains(Hsv::from_rgb(px)))
            .count() as u64
    }

    /// Classify a frame. Flame-positive iff the count strictly exceeds the threshold.
    pub fn classify(&self, frame: &RgbImage) -> Classification {
        let flame_pixels = self.count_flame_pixels(frame);
        Classification {
            flame: flame_pixels > self.pixel_threshold,
            flame_pixels,
        }
    }
}
