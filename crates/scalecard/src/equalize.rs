//! Per-channel histogram matching of a target image to the template.
//!
//! Classic CDF matching: each channel gets a monotone lookup table mapping
//! target quantiles onto template quantiles. The detected card region is
//! excluded from the target statistics so the card itself does not skew the
//! correction, but the table is applied to every pixel.

use image::RgbImage;

use crate::geometry::{bounding_box, point_in_quad};

type ChannelHistogram = [u64; 256];

fn template_histograms(img: &RgbImage) -> [ChannelHistogram; 3] {
    let mut hist = [[0u64; 256]; 3];
    for p in img.pixels() {
        for ch in 0..3 {
            hist[ch][p.0[ch] as usize] += 1;
        }
    }
    hist
}

/// Target histograms with the card interior left out.
fn masked_histograms(img: &RgbImage, exclude: Option<&[[f64; 2]; 4]>) -> [ChannelHistogram; 3] {
    let mut hist = [[0u64; 256]; 3];
    let bb = exclude.and_then(|q| bounding_box(q, img.width(), img.height()));

    for (x, y, p) in img.enumerate_pixels() {
        if let (Some(quad), Some((x0, y0, x1, y1))) = (exclude, bb) {
            let in_bb = x >= x0 && x <= x1 && y >= y0 && y <= y1;
            if in_bb && point_in_quad(quad, [f64::from(x), f64::from(y)]) {
                continue;
            }
        }
        for ch in 0..3 {
            hist[ch][p.0[ch] as usize] += 1;
        }
    }
    hist
}

fn cdf(hist: &ChannelHistogram) -> [f64; 256] {
    let total: u64 = hist.iter().sum();
    let mut out = [0.0f64; 256];
    if total == 0 {
        return out;
    }
    let mut acc = 0u64;
    for (i, &c) in hist.iter().enumerate() {
        acc += c;
        out[i] = acc as f64 / total as f64;
    }
    out
}

/// Monotone LUT mapping source quantiles to reference quantiles.
fn matching_lut(source: &ChannelHistogram, reference: &ChannelHistogram) -> [u8; 256] {
    let src_cdf = cdf(source);
    let ref_cdf = cdf(reference);

    let mut lut = [0u8; 256];
    let mut j = 0usize;
    for (v, out) in lut.iter_mut().enumerate() {
        while j < 255 && ref_cdf[j] < src_cdf[v] {
            j += 1;
        }
        *out = j as u8;
    }
    lut
}

/// Match the target's channel histograms to the template's.
///
/// `exclude_quad`, when present, is the detected card quadrilateral in
/// target pixel coordinates; its interior is skipped when accumulating the
/// target statistics. Returns the corrected image; the input is untouched.
pub fn match_histograms(
    target: &RgbImage,
    template: &RgbImage,
    exclude_quad: Option<&[[f64; 2]; 4]>,
) -> RgbImage {
    let src_hists = masked_histograms(target, exclude_quad);
    if src_hists.iter().all(|h| h.iter().all(|&c| c == 0)) {
        // Everything masked away; nothing to estimate from.
        return target.clone();
    }
    let ref_hists = template_histograms(template);

    let luts = [
        matching_lut(&src_hists[0], &ref_hists[0]),
        matching_lut(&src_hists[1], &ref_hists[1]),
        matching_lut(&src_hists[2], &ref_hists[2]),
    ];

    let mut out = target.clone();
    for p in out.pixels_mut() {
        for ch in 0..3 {
            p.0[ch] = luts[ch][p.0[ch] as usize];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn matching_to_self_is_identity() {
        let mut img = RgbImage::new(16, 16);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8]);
        }
        let out = match_histograms(&img, &img, None);
        assert_eq!(out, img);
    }

    #[test]
    fn uniform_image_maps_to_template_level() {
        let target = RgbImage::from_pixel(8, 8, Rgb([50, 50, 50]));
        let template = RgbImage::from_pixel(8, 8, Rgb([120, 60, 200]));
        let out = match_histograms(&target, &template, None);
        assert_eq!(out.get_pixel(0, 0), &Rgb([120, 60, 200]));
    }

    #[test]
    fn masked_region_does_not_drive_statistics() {
        // Left half 40, right half 220; the bright half is masked out, so
        // the mapping is estimated from the dark half only.
        let mut target = RgbImage::new(20, 10);
        for (x, _, p) in target.enumerate_pixels_mut() {
            *p = Rgb(if x < 10 { [40, 40, 40] } else { [220, 220, 220] });
        }
        let template = RgbImage::from_pixel(8, 8, Rgb([90, 90, 90]));
        let quad = [[10.0, -1.0], [10.0, 11.0], [21.0, 11.0], [21.0, -1.0]];

        let out = match_histograms(&target, &template, Some(&quad));
        // Unmasked value maps to the template level; the LUT still applies
        // to the masked pixels.
        assert_eq!(out.get_pixel(0, 0), &Rgb([90, 90, 90]));
        assert_eq!(out.get_pixel(15, 5), &Rgb([90, 90, 90]));
    }

    #[test]
    fn fully_masked_target_is_returned_unchanged() {
        let target = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
        let template = RgbImage::from_pixel(4, 4, Rgb([200, 200, 200]));
        let quad = [[-1.0, -1.0], [-1.0, 5.0], [5.0, 5.0], [5.0, -1.0]];
        let out = match_histograms(&target, &template, Some(&quad));
        assert_eq!(out, target);
    }
}
