use serde::{Deserialize, Serialize};

/// Rings whose absolute signed area falls below this are treated as degenerate.
pub const AREA_EPSILON: f64 = 1e-12;

/// A 2D point in device coordinates. Units are whatever the caller chose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Rotate about `pivot`. Positive angles turn counter-clockwise.
    pub fn rotate_about(&self, pivot: &Point, theta_degrees: f64) -> Self {
        let (sin_t, cos_t) = theta_degrees.to_radians().sin_cos();
        let dx = self.x - pivot.x;
        let dy = self.y - pivot.y;
        Self {
            x: pivot.x + dx * cos_t - dy * sin_t,
            y: pivot.y + dx * sin_t + dy * cos_t,
        }
    }

    pub fn scale_about(&self, pivot: &Point, x_factor: f64, y_factor: f64) -> Self {
        Self {
            x: pivot.x + (self.x - pivot.x) * x_factor,
            y: pivot.y + (self.y - pivot.y) * y_factor,
        }
    }

    pub fn approx_eq(&self, other: &Point, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl BBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            min: Point::new(min_x, min_y),
            max: Point::new(max_x, max_y),
        })
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Closed-interval test: boxes sharing only an edge or a corner intersect.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn union(&self, other: &BBox) -> Self {
        Self {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            min: Point::new(self.min.x - margin, self.min.y - margin),
            max: Point::new(self.max.x + margin, self.max.y + margin),
        }
    }
}

/// Reference point for rotations and scaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Pivot {
    /// Center of the shape's bounding box.
    BoundsCenter,
    /// Area centroid of the shape.
    Centroid,
    /// A fixed point in device coordinates.
    Point(Point),
}

/// Signed shoelace area of an open ring. Counter-clockwise rings are positive.
pub fn ring_signed_area(ring: &[Point]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for (i, p) in ring.iter().enumerate() {
        let q = &ring[(i + 1) % ring.len()];
        twice_area += p.x * q.y - q.x * p.y;
    }
    twice_area / 2.0
}

/// Area centroid of an open ring together with its signed area.
fn ring_centroid(ring: &[Point]) -> (Point, f64) {
    let area = ring_signed_area(ring);
    if area.abs() < AREA_EPSILON {
        let n = ring.len().max(1) as f64;
        let sx: f64 = ring.iter().map(|p| p.x).sum();
        let sy: f64 = ring.iter().map(|p| p.y).sum();
        return (Point::new(sx / n, sy / n), 0.0);
    }
    let mut cx = 0.0;
    let mut cy = 0.0;
    for (i, p) in ring.iter().enumerate() {
        let q = &ring[(i + 1) % ring.len()];
        let cross = p.x * q.y - q.x * p.y;
        cx += (p.x + q.x) * cross;
        cy += (p.y + q.y) * cross;
    }
    (Point::new(cx / (6.0 * area), cy / (6.0 * area)), area)
}

/// A polygon with one outer ring and zero or more holes.
///
/// Rings are stored open: the first vertex is not repeated at the end. The
/// canonical orientation is a clockwise exterior with counter-clockwise holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<Point>,
    #[serde(default)]
    pub interiors: Vec<Vec<Point>>,
}

impl Polygon {
    pub fn new(exterior: Vec<Point>) -> Self {
        Self {
            exterior,
            interiors: Vec::new(),
        }
    }

    pub fn with_interiors(exterior: Vec<Point>, interiors: Vec<Vec<Point>>) -> Self {
        Self {
            exterior,
            interiors,
        }
    }

    /// Signed area of the exterior ring.
    pub fn signed_area(&self) -> f64 {
        ring_signed_area(&self.exterior)
    }

    /// Enclosed area: the exterior minus every hole.
    pub fn area(&self) -> f64 {
        let holes: f64 = self
            .interiors
            .iter()
            .map(|ring| ring_signed_area(ring).abs())
            .sum();
        self.signed_area().abs() - holes
    }

    pub fn is_clockwise(&self) -> bool {
        self.signed_area() < 0.0
    }

    pub fn has_holes(&self) -> bool {
        !self.interiors.is_empty()
    }

    /// Reorders rings into canonical orientation. Idempotent.
    pub fn normalize(&mut self) {
        if ring_signed_area(&self.exterior) > 0.0 {
            self.exterior.reverse();
        }
        for hole in &mut self.interiors {
            if ring_signed_area(hole) < 0.0 {
                hole.reverse();
            }
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_points(&self.exterior)
    }

    pub fn centroid(&self) -> Point {
        let (outer, outer_area) = ring_centroid(&self.exterior);
        if self.interiors.is_empty() || outer_area == 0.0 {
            return outer;
        }
        let mut weight = outer_area.abs();
        let mut cx = outer.x * weight;
        let mut cy = outer.y * weight;
        for hole in &self.interiors {
            let (c, a) = ring_centroid(hole);
            let a = a.abs();
            cx -= c.x * a;
            cy -= c.y * a;
            weight -= a;
        }
        if weight.abs() < AREA_EPSILON {
            return outer;
        }
        Point::new(cx / weight, cy / weight)
    }

    /// Resolves a pivot choice to a concrete point for this polygon.
    pub fn pivot_point(&self, pivot: Pivot) -> Point {
        match pivot {
            Pivot::BoundsCenter => self.bbox().map(|b| b.center()).unwrap_or_default(),
            Pivot::Centroid => self.centroid(),
            Pivot::Point(p) => p,
        }
    }

    /// Applies `f` to every vertex of every ring.
    pub fn map_points<F>(&self, f: F) -> Self
    where
        F: Fn(&Point) -> Point,
    {
        Self {
            exterior: self.exterior.iter().map(&f).collect(),
            interiors: self
                .interiors
                .iter()
                .map(|ring| ring.iter().map(&f).collect())
                .collect(),
        }
    }

    /// Exterior first, then holes.
    pub fn rings(&self) -> impl Iterator<Item = &[Point]> {
        std::iter::once(self.exterior.as_slice()).chain(self.interiors.iter().map(|r| r.as_slice()))
    }

    pub fn vertex_count(&self) -> usize {
        self.rings().map(|r| r.len()).sum()
    }
}

/// A set of pairwise disjoint polygons.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiPolygon {
    pub parts: Vec<Polygon>,
}

impl MultiPolygon {
    pub fn new(parts: Vec<Polygon>) -> Self {
        Self { parts }
    }

    pub fn area(&self) -> f64 {
        self.parts.iter().map(Polygon::area).sum()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Polygon> {
        self.parts.iter()
    }
}

/// Outcome of a union: either one polygon or several disjoint ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeResult {
    Single(Polygon),
    Multi(MultiPolygon),
}

impl ShapeResult {
    /// `None` when `parts` is empty.
    pub fn from_parts(mut parts: Vec<Polygon>) -> Option<Self> {
        match parts.len() {
            0 => None,
            1 => parts.pop().map(ShapeResult::Single),
            _ => Some(ShapeResult::Multi(MultiPolygon::new(parts))),
        }
    }

    pub fn parts(&self) -> &[Polygon] {
        match self {
            ShapeResult::Single(polygon) => std::slice::from_ref(polygon),
            ShapeResult::Multi(multi) => &multi.parts,
        }
    }

    pub fn into_parts(self) -> Vec<Polygon> {
        match self {
            ShapeResult::Single(polygon) => vec![polygon],
            ShapeResult::Multi(multi) => multi.parts,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ShapeResult::Single(_) => 1,
            ShapeResult::Multi(multi) => multi.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn area(&self) -> f64 {
        match self {
            ShapeResult::Single(polygon) => polygon.area(),
            ShapeResult::Multi(multi) => multi.area(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square_ccw() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ]
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_rotate_about_pivot() {
        let p = Point::new(2.0, 1.0);
        let r = p.rotate_about(&Point::new(1.0, 1.0), 90.0);
        assert!(r.approx_eq(&Point::new(1.0, 2.0), 1e-12));
    }

    #[test]
    fn test_scale_about_pivot() {
        let p = Point::new(3.0, 3.0);
        let s = p.scale_about(&Point::new(1.0, 1.0), 2.0, 0.5);
        assert!(s.approx_eq(&Point::new(5.0, 2.0), 1e-12));
    }

    #[test]
    fn test_signed_area_sign() {
        let ccw = unit_square_ccw();
        assert!((ring_signed_area(&ccw) - 1.0).abs() < 1e-12);
        let mut cw = ccw.clone();
        cw.reverse();
        assert!((ring_signed_area(&cw) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let poly = Polygon::new(unit_square_ccw()).normalized();
        assert!(poly.is_clockwise());
        let again = poly.clone().normalized();
        assert_eq!(poly, again);
    }

    #[test]
    fn test_normalize_orients_holes_counter_clockwise() {
        let mut hole = vec![
            Point::new(0.25, 0.25),
            Point::new(0.25, 0.75),
            Point::new(0.75, 0.75),
            Point::new(0.75, 0.25),
        ];
        assert!(ring_signed_area(&hole) < 0.0);
        let poly = Polygon::with_interiors(unit_square_ccw(), vec![hole.clone()]).normalized();
        hole.reverse();
        assert_eq!(poly.interiors[0], hole);
        assert!((poly.area() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_centroid_of_l_shape() {
        // Two unit squares stacked on the left plus one on the right.
        let poly = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 2.0),
            Point::new(0.0, 2.0),
        ]);
        let c = poly.centroid();
        assert!(c.approx_eq(&Point::new(5.0 / 6.0, 5.0 / 6.0), 1e-12));
        let center = poly.pivot_point(Pivot::BoundsCenter);
        assert!(center.approx_eq(&Point::new(1.0, 1.0), 1e-12));
    }

    #[test]
    fn test_bbox_intersection() {
        let a = BBox::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let b = BBox::new(Point::new(5.0, 5.0), Point::new(15.0, 15.0));
        let c = BBox::new(Point::new(20.0, 20.0), Point::new(30.0, 30.0));
        let edge = BBox::new(Point::new(10.0, 0.0), Point::new(12.0, 10.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.intersects(&edge));
    }

    #[test]
    fn test_shape_result_from_parts() {
        assert!(ShapeResult::from_parts(Vec::new()).is_none());
        let single = ShapeResult::from_parts(vec![Polygon::new(unit_square_ccw())]).unwrap();
        assert!(matches!(single, ShapeResult::Single(_)));
        assert_eq!(single.parts().len(), 1);
        let shifted = Polygon::new(unit_square_ccw()).map_points(|p| p.translate(5.0, 0.0));
        let multi =
            ShapeResult::from_parts(vec![Polygon::new(unit_square_ccw()), shifted]).unwrap();
        assert_eq!(multi.len(), 2);
        assert!((multi.area() - 2.0).abs() < 1e-12);
    }
}
