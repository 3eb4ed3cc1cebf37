//! Crate-level error taxonomy.
//!
//! "Reference not found" is deliberately absent: too few good matches is a
//! first-class outcome carried in [`crate::DetectedReference`], not an error.

use crate::homography::HomographyError;

/// Errors raised by template construction and reference location.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed input rejected before any computation: degenerate raster,
    /// non-positive ratio or resize factor, zero `min_matches`.
    InvalidInput(String),
    /// The homography estimator failed (degenerate point configuration,
    /// numerical breakdown, too few inliers).
    Homography(HomographyError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Self::Homography(e) => write!(f, "homography estimation failed: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Homography(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HomographyError> for Error {
    fn from(e: HomographyError) -> Self {
        Self::Homography(e)
    }
}
