//! Pure point-set transforms used by renderers: spatial culling and
//! level-of-detail sizing.

use serde::{Deserialize, Serialize};

/// A drawable point as handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderPoint {
    pub x: f64,
    pub y: f64,
    pub size: f64,
}

impl RenderPoint {
    pub fn new(x: f64, y: f64, size: f64) -> Self {
        Self { x, y, size }
    }

    /// Squared distance to `(cx, cy)`.
    pub fn distance_sq(&self, center: (f64, f64)) -> f64 {
        let dx = self.x - center.0;
        let dy = self.y - center.1;
        dx * dx + dy * dy
    }
}

/// Keep the `max_points` points closest to `center`, nearest first.
///
/// A set already within the cap comes back unchanged, in its original order.
pub fn cull_points(points: &[RenderPoint], center: (f64, f64), max_points: usize) -> Vec<RenderPoint> {
    if points.len() <= max_points {
        return points.to_vec();
    }

    let mut ranked: Vec<(f64, RenderPoint)> = points
        .iter()
        .map(|p| (p.distance_sq(center), *p))
        .collect();

    if max_points > 0 {
        ranked.select_nth_unstable_by(max_points - 1, |a, b| a.0.total_cmp(&b.0));
    }
    ranked.truncate(max_points);
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
    ranked.into_iter().map(|(_, p)| p).collect()
}

/// Scale every point's size by `render_quality`.
pub fn apply_lod(points: &[RenderPoint], render_quality: f64) -> Vec<RenderPoint> {
    points
        .iter()
        .map(|p| RenderPoint {
            size: p.size * render_quality,
            ..*p
        })
        .collect()
}
