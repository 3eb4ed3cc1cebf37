//! Grayscale octave pyramid for scale-robust feature extraction.

use image::imageops::{self, FilterType};
use image::GrayImage;

/// Pyramid construction parameters.
#[derive(Debug, Clone)]
pub struct PyramidConfig {
    /// Maximum number of levels, level 0 included.
    pub n_levels: usize,
    /// Per-level downscale factor in (0, 1).
    pub scale_factor: f64,
    /// Stop once the next level would drop below this dimension.
    pub min_dimension: u32,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            n_levels: 4,
            scale_factor: 0.5,
            min_dimension: 48,
        }
    }
}

/// One pyramid level with its cumulative scale relative to level 0.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    pub image: GrayImage,
    /// Level size / level-0 size; level 0 has scale 1.0.
    pub scale: f64,
}

/// An octave pyramid. Level-`i` pixel coordinates map back to level 0 by
/// dividing by `levels[i].scale`.
#[derive(Debug, Clone)]
pub struct Pyramid {
    pub levels: Vec<PyramidLevel>,
}

/// Build a pyramid by repeated downscaling with linear filtering.
pub fn build_pyramid(base: &GrayImage, config: &PyramidConfig) -> Pyramid {
    let mut levels = vec![PyramidLevel {
        image: base.clone(),
        scale: 1.0,
    }];

    for i in 1..config.n_levels {
        let scale = config.scale_factor.powi(i as i32);
        let w = (f64::from(base.width()) * scale).round() as u32;
        let h = (f64::from(base.height()) * scale).round() as u32;
        if w.min(h) < config.min_dimension {
            break;
        }
        let image = imageops::resize(base, w, h, FilterType::Triangle);
        levels.push(PyramidLevel { image, scale });
    }

    Pyramid { levels }
}
