//! End-to-end reference location: validate → resize → extract → match →
//! homography → scale ratio → mask → equalize.

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::equalize::match_histograms;
use crate::error::Error;
use crate::features::{extract_features, FeatureConfig};
use crate::geometry::{closed_polygon, min_enclosing_circle, transform_corners};
use crate::homography::{fit_ransac, RansacConfig};
use crate::matching::match_descriptors;
use crate::template::ReferenceTemplate;
use crate::{DetectedReference, MatchStats, ReferenceMask};

/// Mean target dimension above which an unconfigured call auto-downscales.
const AUTO_RESIZE_MEAN_DIM: f64 = 5000.0;
/// Downscale factor applied by the auto-resize rule.
const AUTO_RESIZE_FACTOR: f64 = 0.5;

/// Mask label carried by the exclusion polygon.
const REFERENCE_MASK_LABEL: &str = "reference";

/// Top-level locator configuration.
#[derive(Debug, Clone)]
pub struct LocateConfig {
    /// Minimum surviving keypoint matches for a detection; below this the
    /// result is "not found".
    pub min_matches: usize,
    /// Uniform target downscale factor. At the default 1.0, targets whose
    /// mean dimension exceeds 5000 px are downscaled by 0.5 automatically.
    pub resize: f64,
    /// Histogram-match the target to the template after a successful
    /// detection.
    pub equalize: bool,
    /// Emit the card exclusion polygon on success.
    pub mask: bool,
    /// Lowe ratio-test threshold for descriptor matching.
    pub lowe_ratio: f32,
    pub features: FeatureConfig,
    pub ransac: RansacConfig,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            min_matches: 10,
            resize: 1.0,
            equalize: false,
            mask: true,
            lowe_ratio: 0.7,
            features: FeatureConfig::default(),
            ransac: RansacConfig::default(),
        }
    }
}

fn validate(target: &RgbImage, config: &LocateConfig) -> Result<(), Error> {
    if target.width() == 0 || target.height() == 0 {
        return Err(Error::InvalidInput(format!(
            "target raster is degenerate: {}x{}",
            target.width(),
            target.height()
        )));
    }
    if config.min_matches < 1 {
        return Err(Error::InvalidInput(
            "min_matches must be at least 1".to_string(),
        ));
    }
    if !config.resize.is_finite() || config.resize <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "resize factor must be finite and positive, got {}",
            config.resize
        )));
    }
    if !config.lowe_ratio.is_finite() || config.lowe_ratio <= 0.0 || config.lowe_ratio >= 1.0 {
        return Err(Error::InvalidInput(format!(
            "lowe_ratio must lie in (0, 1), got {}",
            config.lowe_ratio
        )));
    }
    Ok(())
}

/// Resolve the effective resize factor (auto-downscale rule).
fn effective_resize(target: &RgbImage, requested: f64) -> f64 {
    let mean_dim = (f64::from(target.width()) + f64::from(target.height())) / 2.0;
    if mean_dim > AUTO_RESIZE_MEAN_DIM && requested == 1.0 {
        tracing::info!(
            "large target ({:.0} px mean dimension) - auto-resizing by {}",
            mean_dim,
            AUTO_RESIZE_FACTOR
        );
        AUTO_RESIZE_FACTOR
    } else {
        requested
    }
}

/// Round to one decimal place, half away from zero.
fn round_ratio(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Locate the reference card in `target` and derive its pixel-to-millimeter
/// ratio.
///
/// Too few good matches is a first-class outcome: the returned record has
/// `detected_px_mm_ratio = None` and no mask. Malformed inputs and estimator
/// breakdowns are errors.
pub fn locate_reference(
    template: &ReferenceTemplate,
    target: &RgbImage,
    config: &LocateConfig,
) -> Result<DetectedReference, Error> {
    validate(target, config)?;

    let image_size = [target.width(), target.height()];
    let resize_factor = effective_resize(target, config.resize);

    let working;
    let working_ref = if resize_factor == 1.0 {
        target
    } else {
        let w = ((f64::from(target.width()) * resize_factor).round() as u32).max(1);
        let h = ((f64::from(target.height()) * resize_factor).round() as u32).max(1);
        working = imageops::resize(target, w, h, FilterType::Triangle);
        &working
    };

    // Keypoints and binary descriptors on both rasters.
    let template_gray = imageops::grayscale(template.image());
    let target_gray = imageops::grayscale(working_ref);
    let (template_kps, template_descs) = extract_features(&template_gray, &config.features);
    let (target_kps, target_descs) = extract_features(&target_gray, &config.features);

    let good = match_descriptors(&template_descs, &target_descs, config.lowe_ratio);

    let mut stats = MatchStats {
        n_template_keypoints: template_kps.len(),
        n_target_keypoints: target_kps.len(),
        n_good_matches: good.len(),
        n_inliers: None,
    };

    if good.len() < config.min_matches {
        tracing::info!(
            "reference card not found - {} keypoint matches (min {})",
            good.len(),
            config.min_matches
        );
        return Ok(DetectedReference {
            detected_px_mm_ratio: None,
            diameter_ratio: None,
            mask: None,
            image_size,
            stats,
            equalized: None,
        });
    }

    let src: Vec<[f64; 2]> = good.iter().map(|m| template_kps[m.template_idx].point()).collect();
    let dst: Vec<[f64; 2]> = good.iter().map(|m| target_kps[m.target_idx].point()).collect();
    let fit = fit_ransac(&src, &dst, &config.ransac)?;
    stats.n_inliers = Some(fit.n_inliers);

    // Card quadrilateral at full target resolution.
    let corners = template.corner_points();
    let quad = transform_corners(&fit.h, &corners, resize_factor);

    let new_circle = min_enclosing_circle(&quad);
    let old_circle = min_enclosing_circle(&corners);
    let (new_circle, old_circle) = match (new_circle, old_circle) {
        (Some(n), Some(o)) if o.diameter() > 0.0 => (n, o),
        _ => {
            return Err(Error::InvalidInput(
                "degenerate corner geometry".to_string(),
            ))
        }
    };

    let diameter_ratio = new_circle.diameter() / old_circle.diameter();
    let detected_px_mm_ratio = round_ratio(diameter_ratio * template.px_mm_ratio());

    tracing::info!(
        "reference card found with {} keypoint matches ({} RANSAC inliers)",
        good.len(),
        fit.n_inliers
    );
    tracing::info!(
        "template {:.2} px/mm, detected {:.1} px/mm ({:.3}% of template scale)",
        template.px_mm_ratio(),
        detected_px_mm_ratio,
        diameter_ratio * 100.0
    );

    let mask = config.mask.then(|| ReferenceMask {
        label: REFERENCE_MASK_LABEL.to_string(),
        include: false,
        coords: closed_polygon(&quad),
    });

    let equalized = if config.equalize {
        tracing::info!("equalizing target histograms against template");
        Some(match_histograms(target, template.image(), Some(&quad)))
    } else {
        None
    };

    Ok(DetectedReference {
        detected_px_mm_ratio: Some(detected_px_mm_ratio),
        diameter_ratio: Some(diameter_ratio),
        mask,
        image_size,
        stats,
        equalized,
    })
}
