//! End-to-end locator properties on seeded synthetic card scenes.
//!
//! The scene generator scatters high-contrast blobs over a light
//! background; a crop of the scene acts as the card template, so the
//! template's texture reappears (translated, and optionally rescaled) in the
//! target image.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use scalecard::{locate_reference, LocateConfig, ReferenceTemplate};

const TEMPLATE_PX_MM: f64 = 10.0;

/// Seeded blob texture over the whole scene.
fn scene(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = RgbImage::from_pixel(width, height, Rgb([210, 205, 200]));
    for _ in 0..250 {
        let bw = rng.gen_range(8..30);
        let bh = rng.gen_range(8..30);
        let x0 = rng.gen_range(0..width - bw);
        let y0 = rng.gen_range(0..height - bh);
        let color = Rgb([
            rng.gen_range(10..150),
            rng.gen_range(10..150),
            rng.gen_range(10..150),
        ]);
        for y in y0..y0 + bh {
            for x in x0..x0 + bw {
                img.put_pixel(x, y, color);
            }
        }
    }
    img
}

/// Template: a 200x200 crop of the scene at (150, 120).
fn template_from(scene: &RgbImage) -> ReferenceTemplate {
    let crop = imageops::crop_imm(scene, 150, 120, 200, 200).to_image();
    ReferenceTemplate::new(crop, TEMPLATE_PX_MM).unwrap()
}

#[test]
fn identity_scene_recovers_template_ratio() {
    let scene = scene(600, 500, 42);
    let template = template_from(&scene);

    let out = locate_reference(&template, &scene, &LocateConfig::default()).unwrap();
    assert!(out.found(), "card not found: {:?}", out.stats);
    // Identity transform: diameter ratio 1.0, so the detected ratio equals
    // the template ratio after one-decimal rounding.
    assert_eq!(out.detected_px_mm_ratio, Some(TEMPLATE_PX_MM));
    let ratio = out.diameter_ratio.unwrap();
    assert!((ratio - 1.0).abs() < 0.01, "diameter ratio {}", ratio);
}

#[test]
fn mask_polygon_is_closed_and_near_card() {
    let scene = scene(600, 500, 42);
    let template = template_from(&scene);

    let out = locate_reference(&template, &scene, &LocateConfig::default()).unwrap();
    let mask = out.mask.expect("mask present on success");
    assert_eq!(mask.label, "reference");
    assert!(!mask.include);
    assert_eq!(mask.coords.len(), 5);
    assert_eq!(mask.coords[0], mask.coords[4]);
    // The quad should land on the card crop at (150, 120)-(350, 320).
    for (corner, expect) in mask.coords[..4]
        .iter()
        .zip([[150, 120], [150, 320], [350, 320], [350, 120]])
    {
        assert!(
            (corner[0] - expect[0]).abs() <= 3 && (corner[1] - expect[1]).abs() <= 3,
            "corner {:?} far from {:?}",
            corner,
            expect
        );
    }
}

#[test]
fn half_scale_scene_halves_the_ratio() {
    // Spec scenario: the card appears at half scale, so the detected ratio
    // is round(0.5 * 10.0, 1) = 5.0.
    let scene_full = scene(600, 500, 42);
    let template = template_from(&scene_full);
    let target = imageops::resize(&scene_full, 300, 250, FilterType::Triangle);

    let out = locate_reference(&template, &target, &LocateConfig::default()).unwrap();
    assert!(out.found(), "card not found: {:?}", out.stats);
    let detected = out.detected_px_mm_ratio.unwrap();
    assert!(
        (detected - 5.0).abs() <= 0.2,
        "detected {} px/mm, expected about 5.0",
        detected
    );
}

#[test]
fn unreachable_min_matches_is_not_found() {
    let scene = scene(600, 500, 42);
    let template = template_from(&scene);

    let config = LocateConfig {
        min_matches: 1_000_000,
        ..LocateConfig::default()
    };
    let out = locate_reference(&template, &scene, &config).unwrap();
    assert!(!out.found());
    assert!(out.mask.is_none());
    assert!(out.detected_px_mm_ratio.is_none());
}

#[test]
fn repeated_calls_are_identical() {
    let scene = scene(600, 500, 7);
    let template = template_from(&scene);
    let config = LocateConfig::default();

    let a = locate_reference(&template, &scene, &config).unwrap();
    let b = locate_reference(&template, &scene, &config).unwrap();
    assert_eq!(a.detected_px_mm_ratio, b.detected_px_mm_ratio);
    assert_eq!(a.diameter_ratio, b.diameter_ratio);
    assert_eq!(a.mask, b.mask);
    assert_eq!(a.stats.n_good_matches, b.stats.n_good_matches);
    assert_eq!(a.stats.n_inliers, b.stats.n_inliers);
}

#[test]
fn equalization_runs_only_when_requested() {
    let scene = scene(600, 500, 42);
    let template = template_from(&scene);

    let plain = locate_reference(&template, &scene, &LocateConfig::default()).unwrap();
    assert!(plain.equalized.is_none());

    let config = LocateConfig {
        equalize: true,
        ..LocateConfig::default()
    };
    let out = locate_reference(&template, &scene, &config).unwrap();
    let eq = out.equalized.expect("equalized image on success");
    assert_eq!(eq.dimensions(), (600, 500));
}
