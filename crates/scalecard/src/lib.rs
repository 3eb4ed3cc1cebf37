//! scalecard — pure-Rust locator for scale reference cards in specimen
//! photographs.
//!
//! Given a stored template of a calibration card and the card's known
//! pixel-to-millimeter ratio, scalecard finds the card in a new photograph,
//! derives that photograph's pixel-to-millimeter ratio from the card's
//! apparent size, and emits an exclusion polygon so the card can be kept out
//! of downstream measurements. The pipeline stages are:
//!
//! 1. **Pyramid** – grayscale octave pyramid of template and target.
//! 2. **Features** – FAST-9 keypoints per level, intensity-centroid
//!    orientation, 256-bit steered-BRIEF binary descriptors.
//! 3. **Matching** – brute-force k=2 Hamming matching with Lowe's ratio
//!    test.
//! 4. **Homography** – Hartley-normalized DLT inside a seeded RANSAC loop.
//! 5. **Scale** – minimal enclosing circles of the template rectangle and
//!    the transformed quadrilateral; their diameter ratio rescales the
//!    template's calibration ratio.
//! 6. **Equalize** – optional per-channel histogram matching of the target
//!    to the template, card interior excluded from the statistics.
//!
//! Too few good matches is not an error: the result carries
//! `detected_px_mm_ratio = None` and every caller must treat that as "not
//! found", never as zero.

pub mod equalize;
pub mod error;
pub mod features;
pub mod geometry;
pub mod homography;
pub mod locate;
pub mod matching;
pub mod pyramid;
pub mod template;

pub use error::Error;
pub use homography::HomographyError;
pub use locate::{locate_reference, LocateConfig};
pub use template::ReferenceTemplate;

/// Keypoint-matching bookkeeping for one locate call.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MatchStats {
    /// Keypoints extracted from the template.
    pub n_template_keypoints: usize,
    /// Keypoints extracted from the (resized) target.
    pub n_target_keypoints: usize,
    /// Matches surviving the ratio test.
    pub n_good_matches: usize,
    /// RANSAC inliers, present when a homography was fitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_inliers: Option<usize>,
}

/// Exclusion mask covering the detected card.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReferenceMask {
    /// Mask label, `"reference"`.
    pub label: String,
    /// Always false: the card region is excluded from downstream analysis.
    pub include: bool,
    /// Closed polygon: the four transformed template corners with the first
    /// vertex repeated last (5 points).
    pub coords: Vec<[i32; 2]>,
}

/// Result of one reference-location call.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DetectedReference {
    /// Pixel-to-millimeter ratio of the target image, rounded to one
    /// decimal. `None` means the card was not found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_px_mm_ratio: Option<f64>,
    /// Apparent-diameter ratio between the detected card and the template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diameter_ratio: Option<f64>,
    /// Card exclusion polygon, present on success when masking is requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<ReferenceMask>,
    /// Full-resolution target dimensions `[width, height]`.
    pub image_size: [u32; 2],
    pub stats: MatchStats,
    /// Color-corrected target, present when equalization was requested and
    /// detection succeeded. Never serialized.
    #[serde(skip)]
    pub equalized: Option<image::RgbImage>,
}

impl DetectedReference {
    /// True when the card was located.
    pub fn found(&self) -> bool {
        self.detected_px_mm_ratio.is_some()
    }
}
