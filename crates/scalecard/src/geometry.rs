//! Quadrilateral and enclosing-circle helpers for the scale computation.

use nalgebra::Matrix3;

use crate::homography::project;

/// A circle in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: [f64; 2],
    pub radius: f64,
}

impl Circle {
    pub fn diameter(&self) -> f64 {
        2.0 * self.radius
    }

    fn contains(&self, p: [f64; 2], eps: f64) -> bool {
        let dx = p[0] - self.center[0];
        let dy = p[1] - self.center[1];
        dx * dx + dy * dy <= (self.radius + eps) * (self.radius + eps)
    }
}

fn circle_from_pair(a: [f64; 2], b: [f64; 2]) -> Circle {
    let center = [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0];
    let radius = ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt() / 2.0;
    Circle { center, radius }
}

/// Circumcircle of a non-degenerate triangle; `None` for collinear points.
fn circle_from_triple(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> Option<Circle> {
    let d = 2.0 * (a[0] * (b[1] - c[1]) + b[0] * (c[1] - a[1]) + c[0] * (a[1] - b[1]));
    if d.abs() < 1e-12 {
        return None;
    }
    let a2 = a[0] * a[0] + a[1] * a[1];
    let b2 = b[0] * b[0] + b[1] * b[1];
    let c2 = c[0] * c[0] + c[1] * c[1];
    let ux = (a2 * (b[1] - c[1]) + b2 * (c[1] - a[1]) + c2 * (a[1] - b[1])) / d;
    let uy = (a2 * (c[0] - b[0]) + b2 * (a[0] - c[0]) + c2 * (b[0] - a[0])) / d;
    let radius = ((a[0] - ux).powi(2) + (a[1] - uy).powi(2)).sqrt();
    Some(Circle {
        center: [ux, uy],
        radius,
    })
}

/// Exact minimal enclosing circle of a small point set.
///
/// The optimum is determined by two or three boundary points, so trying
/// every pair and triple is exact. Quadratic-and-worse in the point count,
/// which is fine for the 4-corner sets used here.
pub fn min_enclosing_circle(points: &[[f64; 2]]) -> Option<Circle> {
    let eps = 1e-9;
    match points {
        [] => return None,
        [p] => {
            return Some(Circle {
                center: *p,
                radius: 0.0,
            })
        }
        _ => {}
    }

    let mut best: Option<Circle> = None;
    let mut consider = |c: Circle| {
        if points.iter().all(|&p| c.contains(p, eps)) {
            match best {
                Some(b) if b.radius <= c.radius => {}
                _ => best = Some(c),
            }
        }
    };

    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            consider(circle_from_pair(points[i], points[j]));
            for k in (j + 1)..points.len() {
                if let Some(c) = circle_from_triple(points[i], points[j], points[k]) {
                    consider(c);
                }
            }
        }
    }
    best
}

/// Project the template corners through the homography and map back to full
/// target resolution by dividing out the resize factor.
pub fn transform_corners(
    h: &Matrix3<f64>,
    corners: &[[f64; 2]; 4],
    resize_factor: f64,
) -> [[f64; 2]; 4] {
    let mut out = [[0.0f64; 2]; 4];
    for (dst, &src) in out.iter_mut().zip(corners.iter()) {
        let p = project(h, src);
        *dst = [p[0] / resize_factor, p[1] / resize_factor];
    }
    out
}

/// Close a quadrilateral into the 5-point integer polygon the mask record
/// carries: the four vertices, truncated, with the first repeated last.
pub fn closed_polygon(quad: &[[f64; 2]; 4]) -> Vec<[i32; 2]> {
    let mut coords: Vec<[i32; 2]> = quad.iter().map(|p| [p[0] as i32, p[1] as i32]).collect();
    coords.push(coords[0]);
    coords
}

/// Ray-casting point-in-polygon test against a quadrilateral.
pub fn point_in_quad(quad: &[[f64; 2]; 4], p: [f64; 2]) -> bool {
    let mut inside = false;
    let n = quad.len();
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = quad[i];
        let [xj, yj] = quad[j];
        if ((yi > p[1]) != (yj > p[1]))
            && (p[0] < (xj - xi) * (p[1] - yi) / (yj - yi) + xi)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Axis-aligned integer bounding box of a quadrilateral, clamped to the
/// image dimensions. `None` when the quad lies entirely outside.
pub fn bounding_box(quad: &[[f64; 2]; 4], width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let min_x = quad.iter().map(|p| p[0]).fold(f64::INFINITY, f64::min);
    let min_y = quad.iter().map(|p| p[1]).fold(f64::INFINITY, f64::min);
    let max_x = quad.iter().map(|p| p[0]).fold(f64::NEG_INFINITY, f64::max);
    let max_y = quad.iter().map(|p| p[1]).fold(f64::NEG_INFINITY, f64::max);

    if max_x < 0.0 || max_y < 0.0 || min_x >= f64::from(width) || min_y >= f64::from(height) {
        return None;
    }
    let x0 = min_x.max(0.0) as u32;
    let y0 = min_y.max(0.0) as u32;
    let x1 = (max_x.ceil() as u32).min(width.saturating_sub(1));
    let y1 = (max_y.ceil() as u32).min(height.saturating_sub(1));
    Some((x0, y0, x1, y1))
}
