use serde::{Deserialize, Serialize};

use crate::geometry::{Pivot, Point, Polygon};

/// A rigid placement: rotate by `theta_degrees` about `pivot`, then translate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub dx: f64,
    pub dy: f64,
    /// Counter-clockwise rotation in degrees.
    pub theta_degrees: f64,
    pub pivot: Pivot,
}

impl Placement {
    pub fn new(dx: f64, dy: f64, theta_degrees: f64, pivot: Pivot) -> Self {
        Self {
            dx,
            dy,
            theta_degrees,
            pivot,
        }
    }

    pub fn identity() -> Self {
        Self::translate(0.0, 0.0)
    }

    /// Pure translation; the pivot has no effect and is recorded as `BoundsCenter`.
    pub fn translate(dx: f64, dy: f64) -> Self {
        Self::new(dx, dy, 0.0, Pivot::BoundsCenter)
    }

    pub fn rotate(theta_degrees: f64, pivot: Pivot) -> Self {
        Self::new(0.0, 0.0, theta_degrees, pivot)
    }

    pub fn is_identity(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0 && self.theta_degrees == 0.0
    }

    pub fn is_finite(&self) -> bool {
        let pivot_ok = match self.pivot {
            Pivot::Point(p) => p.is_finite(),
            Pivot::BoundsCenter | Pivot::Centroid => true,
        };
        pivot_ok && self.dx.is_finite() && self.dy.is_finite() && self.theta_degrees.is_finite()
    }

    /// Applies the placement to every ring of `polygon`. The pivot is resolved
    /// against the polygon before it moves.
    pub fn apply(&self, polygon: &Polygon) -> Polygon {
        if self.is_identity() {
            return polygon.clone();
        }
        let pivot: Point = polygon.pivot_point(self.pivot);
        let theta = self.theta_degrees;
        let (dx, dy) = (self.dx, self.dy);
        polygon.map_points(|p| {
            let rotated = if theta == 0.0 {
                *p
            } else {
                p.rotate_about(&pivot, theta)
            };
            rotated.translate(dx, dy)
        })
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::identity()
    }
}
