//! Keypoint detection and binary description.
//!
//! ORB-style pipeline: FAST-9 corners on every pyramid level, orientation by
//! intensity centroid, and a 256-bit steered-BRIEF descriptor sampled from a
//! Gaussian-blurred copy of the level image. Binary descriptors keep the
//! matcher in Hamming space.
//!
//! The test-pair pattern is generated from a compile-time seed, so two
//! images — and two runs — always describe keypoints against the same
//! pattern.

use image::GrayImage;
use imageproc::corners::{corners_fast9, Corner};
use imageproc::filter::gaussian_blur_f32;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::pyramid::{build_pyramid, PyramidConfig};

/// Descriptor length in bits.
pub const DESCRIPTOR_BITS: usize = 256;
const DESCRIPTOR_WORDS: usize = DESCRIPTOR_BITS / 64;

/// Sampling disc radius around a keypoint, in level pixels.
const PATCH_RADIUS: f32 = 15.0;
/// Keypoints closer than this to a level border are discarded so the whole
/// (rotated) sampling disc stays inside the image.
const BORDER_MARGIN: u32 = 16;

/// Seed for the BRIEF test-pair pattern. Fixed: descriptors from different
/// images are only comparable against the same pattern.
const PATTERN_SEED: u64 = 0x5ca1_eca8_d00d;

/// Feature extraction parameters.
#[derive(Debug, Clone)]
pub struct FeatureConfig {
    /// FAST-9 intensity threshold.
    pub fast_threshold: u8,
    /// Response-ranked cap on keypoints kept per pyramid level.
    pub max_per_level: usize,
    /// Blur applied to the level image before descriptor sampling.
    pub blur_sigma: f32,
    pub pyramid: PyramidConfig,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            fast_threshold: 20,
            max_per_level: 800,
            blur_sigma: 2.0,
            pyramid: PyramidConfig::default(),
        }
    }
}

/// A detected keypoint in level-0 (full image) coordinates.
#[derive(Debug, Clone, Copy)]
pub struct KeyPoint {
    pub x: f64,
    pub y: f64,
    /// Pyramid level the point was detected on.
    pub level: usize,
    /// FAST corner response.
    pub response: f32,
    /// Orientation from the intensity centroid, radians.
    pub angle: f32,
}

impl KeyPoint {
    pub fn point(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// A 256-bit binary descriptor packed into four words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor(pub [u64; DESCRIPTOR_WORDS]);

impl Descriptor {
    /// Hamming distance: popcount of the XOR.
    pub fn hamming(&self, other: &Self) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

/// The BRIEF test-pair pattern: point pairs inside the sampling disc.
struct TestPattern {
    pairs: Vec<([f32; 2], [f32; 2])>,
}

impl TestPattern {
    /// Uniform pairs inside the disc of radius [`PATCH_RADIUS`], drawn from
    /// the fixed [`PATTERN_SEED`].
    fn generate() -> Self {
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
        let sample_point = |rng: &mut StdRng| -> [f32; 2] {
            loop {
                let x = rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS);
                let y = rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS);
                if x * x + y * y <= PATCH_RADIUS * PATCH_RADIUS {
                    return [x, y];
                }
            }
        };
        let pairs = (0..DESCRIPTOR_BITS)
            .map(|_| (sample_point(&mut rng), sample_point(&mut rng)))
            .collect();
        Self { pairs }
    }
}

/// Orientation by intensity centroid over the sampling disc (ORB's moment
/// method): theta = atan2(m01, m10).
fn centroid_angle(img: &GrayImage, cx: u32, cy: u32) -> f32 {
    let r = PATCH_RADIUS as i32;
    let mut m10 = 0.0f32;
    let mut m01 = 0.0f32;
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy > r * r {
                continue;
            }
            let px = (cx as i32 + dx) as u32;
            let py = (cy as i32 + dy) as u32;
            let v = f32::from(img.get_pixel(px, py)[0]);
            m10 += dx as f32 * v;
            m01 += dy as f32 * v;
        }
    }
    m01.atan2(m10)
}

/// Sample one steered BRIEF descriptor at a keypoint on the blurred level
/// image. Offsets are rotated by the keypoint angle; rotation preserves
/// magnitude, so the border margin keeps every sample in bounds.
fn describe(img: &GrayImage, cx: u32, cy: u32, angle: f32, pattern: &TestPattern) -> Descriptor {
    let (sin, cos) = angle.sin_cos();
    let sample = |p: [f32; 2]| -> u8 {
        let rx = cos * p[0] - sin * p[1];
        let ry = sin * p[0] + cos * p[1];
        let px = (cx as f32 + rx).round() as u32;
        let py = (cy as f32 + ry).round() as u32;
        img.get_pixel(px, py)[0]
    };

    let mut words = [0u64; DESCRIPTOR_WORDS];
    for (i, (p, q)) in pattern.pairs.iter().enumerate() {
        if sample(*p) < sample(*q) {
            words[i / 64] |= 1 << (i % 64);
        }
    }
    Descriptor(words)
}

fn within_border(c: &Corner, width: u32, height: u32) -> bool {
    c.x >= BORDER_MARGIN
        && c.y >= BORDER_MARGIN
        && c.x + BORDER_MARGIN < width
        && c.y + BORDER_MARGIN < height
}

/// Detect keypoints and compute descriptors over the whole pyramid.
///
/// Keypoint coordinates are reported in level-0 pixels. The two output
/// vectors are index-aligned.
pub fn extract_features(gray: &GrayImage, config: &FeatureConfig) -> (Vec<KeyPoint>, Vec<Descriptor>) {
    let pattern = TestPattern::generate();
    let pyramid = build_pyramid(gray, &config.pyramid);

    let mut keypoints = Vec::new();
    let mut descriptors = Vec::new();

    for (level, pl) in pyramid.levels.iter().enumerate() {
        let (w, h) = pl.image.dimensions();
        if w <= 2 * BORDER_MARGIN || h <= 2 * BORDER_MARGIN {
            continue;
        }

        let mut corners: Vec<Corner> = corners_fast9(&pl.image, config.fast_threshold)
            .into_iter()
            .filter(|c| within_border(c, w, h))
            .collect();
        corners.sort_by(|a, b| b.score.total_cmp(&a.score));
        corners.truncate(config.max_per_level);

        if corners.is_empty() {
            continue;
        }
        let blurred = gaussian_blur_f32(&pl.image, config.blur_sigma);

        for c in &corners {
            let angle = centroid_angle(&blurred, c.x, c.y);
            descriptors.push(describe(&blurred, c.x, c.y, angle, &pattern));
            keypoints.push(KeyPoint {
                x: f64::from(c.x) / pl.scale,
                y: f64::from(c.y) / pl.scale,
                level,
                response: c.score,
                angle,
            });
        }
    }

    tracing::debug!(
        "extracted {} keypoints over {} pyramid levels",
        keypoints.len(),
        pyramid.levels.len()
    );
    (keypoints, descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    /// Seeded blob texture with enough corners for FAST.
    fn textured(w: u32, h: u32, seed: u64) -> GrayImage {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut img = GrayImage::from_pixel(w, h, image::Luma([200u8]));
        for _ in 0..120 {
            let bw = rng.gen_range(6..24);
            let bh = rng.gen_range(6..24);
            let x0 = rng.gen_range(0..w.saturating_sub(bw));
            let y0 = rng.gen_range(0..h.saturating_sub(bh));
            let v = rng.gen_range(0u8..140);
            for y in y0..y0 + bh {
                for x in x0..x0 + bw {
                    img.put_pixel(x, y, image::Luma([v]));
                }
            }
        }
        img
    }

    #[test]
    fn pattern_is_stable_and_in_disc() {
        let a = TestPattern::generate();
        let b = TestPattern::generate();
        assert_eq!(a.pairs.len(), DESCRIPTOR_BITS);
        for ((p1, q1), (p2, q2)) in a.pairs.iter().zip(b.pairs.iter()) {
            assert_eq!(p1, p2);
            assert_eq!(q1, q2);
            for pt in [p1, q1] {
                assert!(pt[0] * pt[0] + pt[1] * pt[1] <= PATCH_RADIUS * PATCH_RADIUS + 1e-3);
            }
        }
    }

    #[test]
    fn hamming_distance_counts_bits() {
        let a = Descriptor([0, 0, 0, 0]);
        let b = Descriptor([u64::MAX, 0, 0, 0]);
        let c = Descriptor([0b1011, 0, 0, 1]);
        assert_eq!(a.hamming(&a), 0);
        assert_eq!(a.hamming(&b), 64);
        assert_eq!(a.hamming(&c), 4);
    }

    #[test]
    fn extraction_is_deterministic() {
        let img = textured(320, 240, 7);
        let config = FeatureConfig::default();
        let (kp1, d1) = extract_features(&img, &config);
        let (kp2, d2) = extract_features(&img, &config);
        assert!(!kp1.is_empty());
        assert_eq!(kp1.len(), d1.len());
        assert_eq!(d1, d2);
        assert_eq!(kp1.len(), kp2.len());
    }

    #[test]
    fn blank_image_has_no_keypoints() {
        let img = GrayImage::from_pixel(200, 200, image::Luma([128u8]));
        let (kps, descs) = extract_features(&img, &FeatureConfig::default());
        assert!(kps.is_empty());
        assert!(descs.is_empty());
    }

    #[test]
    fn keypoints_respect_border_margin() {
        let img = textured(200, 160, 11);
        let (kps, _) = extract_features(&img, &FeatureConfig::default());
        for kp in kps.iter().filter(|k| k.level == 0) {
            assert!(kp.x >= f64::from(BORDER_MARGIN));
            assert!(kp.y >= f64::from(BORDER_MARGIN));
            assert!(kp.x < f64::from(200 - BORDER_MARGIN));
            assert!(kp.y < f64::from(160 - BORDER_MARGIN));
        }
    }
}
