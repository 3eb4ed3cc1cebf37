//! Reference template: a crop of the scale card plus its calibration ratio.

use image::RgbImage;

use crate::error::Error;

/// A calibration template: an image patch of the reference card and the
/// pixel-to-millimeter ratio measured at template scale.
///
/// Created once per calibration session and reused, read-only, across many
/// target images.
#[derive(Debug, Clone)]
pub struct ReferenceTemplate {
    image: RgbImage,
    px_mm_ratio: f64,
}

impl ReferenceTemplate {
    /// Build a template from a card crop and a known pixel-per-millimeter
    /// ratio.
    ///
    /// Fails fast on a degenerate raster or a non-finite / non-positive
    /// ratio.
    pub fn new(image: RgbImage, px_mm_ratio: f64) -> Result<Self, Error> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::InvalidInput(format!(
                "template raster is degenerate: {}x{}",
                image.width(),
                image.height()
            )));
        }
        if !px_mm_ratio.is_finite() || px_mm_ratio <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "template px/mm ratio must be finite and positive, got {}",
                px_mm_ratio
            )));
        }
        Ok(Self {
            image,
            px_mm_ratio,
        })
    }

    /// Build a template from a card crop and a measured distance: two points
    /// clicked on the card (template pixel coordinates) and the physical
    /// distance between them in millimeters.
    pub fn from_measurement(
        image: RgbImage,
        p1: [f64; 2],
        p2: [f64; 2],
        distance_mm: f64,
    ) -> Result<Self, Error> {
        if !distance_mm.is_finite() || distance_mm <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "measured distance must be positive, got {} mm",
                distance_mm
            )));
        }
        let distance_px = ((p1[0] - p2[0]).powi(2) + (p1[1] - p2[1]).powi(2)).sqrt();
        if distance_px == 0.0 {
            return Err(Error::InvalidInput(
                "measurement points coincide".to_string(),
            ));
        }
        Self::new(image, distance_px / distance_mm)
    }

    /// The template raster.
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Pixels per millimeter at template scale.
    pub fn px_mm_ratio(&self) -> f64 {
        self.px_mm_ratio
    }

    /// Template dimensions `[width, height]`.
    pub fn size(&self) -> [u32; 2] {
        [self.image.width(), self.image.height()]
    }

    /// The template's four corners in template pixel coordinates, ordered
    /// `(0,0), (0,h), (w,h), (w,0)`.
    pub fn corner_points(&self) -> [[f64; 2]; 4] {
        let w = f64::from(self.image.width());
        let h = f64::from(self.image.height());
        [[0.0, 0.0], [0.0, h], [w, h], [w, 0.0]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn blank(w: u32, h: u32) -> RgbImage {
        RgbImage::new(w, h)
    }

    #[test]
    fn rejects_degenerate_raster() {
        assert!(matches!(
            ReferenceTemplate::new(blank(0, 100), 10.0),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            ReferenceTemplate::new(blank(100, 0), 10.0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_bad_ratio() {
        assert!(ReferenceTemplate::new(blank(10, 10), 0.0).is_err());
        assert!(ReferenceTemplate::new(blank(10, 10), -3.0).is_err());
        assert!(ReferenceTemplate::new(blank(10, 10), f64::NAN).is_err());
    }

    #[test]
    fn measurement_ratio() {
        // 300 px across 30 mm -> 10 px/mm.
        let t =
            ReferenceTemplate::from_measurement(blank(400, 400), [50.0, 200.0], [350.0, 200.0], 30.0)
                .unwrap();
        assert_relative_eq!(t.px_mm_ratio(), 10.0, epsilon = 1e-12);
    }

    #[test]
    fn measurement_rejects_coincident_points() {
        let r =
            ReferenceTemplate::from_measurement(blank(10, 10), [5.0, 5.0], [5.0, 5.0], 10.0);
        assert!(matches!(r, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn corner_order_matches_boundary_box() {
        let t = ReferenceTemplate::new(blank(200, 100), 1.0).unwrap();
        assert_eq!(
            t.corner_points(),
            [[0.0, 0.0], [0.0, 100.0], [200.0, 100.0], [200.0, 0.0]]
        );
    }
}
