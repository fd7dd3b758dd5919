use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Coord, Line};
use serde::{Deserialize, Serialize};

use crate::boolean;
use crate::error::{GeometryError, Result};
use crate::geometry::{ring_signed_area, BBox, Pivot, Point, Polygon, AREA_EPSILON};
use crate::placement::Placement;
use crate::LayerId;

/// A single simple polygon to be placed into a device layer.
///
/// The exterior ring is always clockwise. Features built from point lists
/// never carry holes; a healed piece may.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Polygon", into = "Polygon")]
pub struct Feature {
    polygon: Polygon,
}

impl Feature {
    /// Builds a feature from an open or explicitly closed point list.
    pub fn create<I, P>(points: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<Point>,
    {
        let ring = validate_ring(points.into_iter().map(Into::into).collect())?;
        let mut feature = Self {
            polygon: Polygon::new(ring),
        };
        feature.normalize_orientation();
        Ok(feature)
    }

    /// Wraps a polygon produced by healing. The caller guarantees validity.
    pub(crate) fn from_healed(polygon: Polygon) -> Self {
        let mut feature = Self { polygon };
        feature.normalize_orientation();
        feature
    }

    fn normalize_orientation(&mut self) {
        self.polygon.normalize();
    }

    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    pub fn into_polygon(self) -> Polygon {
        self.polygon
    }

    /// Exterior ring vertices, clockwise, not closed.
    pub fn points(&self) -> &[Point] {
        &self.polygon.exterior
    }

    pub fn area(&self) -> f64 {
        self.polygon.area()
    }

    pub fn bbox(&self) -> BBox {
        self.polygon.bbox().unwrap_or_default()
    }

    pub fn centroid(&self) -> Point {
        self.polygon.centroid()
    }

    /// Returns a placed copy; `self` is left untouched.
    pub fn place(&self, placement: &Placement) -> Self {
        let mut placed = self.clone();
        placed.place_mut(placement);
        placed
    }

    pub fn place_mut(&mut self, placement: &Placement) {
        self.polygon = placement.apply(&self.polygon);
        self.normalize_orientation();
    }

    /// Returns a scaled copy. Negative factors mirror the shape.
    pub fn scale(&self, x_factor: f64, y_factor: f64, pivot: Pivot) -> Result<Self> {
        let mut scaled = self.clone();
        scaled.scale_mut(x_factor, y_factor, pivot)?;
        Ok(scaled)
    }

    pub fn scale_mut(&mut self, x_factor: f64, y_factor: f64, pivot: Pivot) -> Result<()> {
        check_scale_factors(x_factor, y_factor)?;
        let origin = self.polygon.pivot_point(pivot);
        self.polygon = self
            .polygon
            .map_points(|p| p.scale_about(&origin, x_factor, y_factor));
        self.normalize_orientation();
        Ok(())
    }

    /// Merges a raw polygon into this feature.
    ///
    /// Succeeds only when the union is one simple ring. On failure the
    /// feature is unchanged.
    pub fn union_with<I, P>(&mut self, points: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<Point>,
    {
        let other = Polygon::new(validate_ring(points.into_iter().map(Into::into).collect())?);
        let mut parts = boolean::union_pair(&self.polygon, &other);
        if parts.len() != 1 {
            return Err(GeometryError::DisjointUnion { parts: parts.len() });
        }
        let merged = parts.remove(0);
        if merged.has_holes() {
            return Err(GeometryError::DisjointUnion {
                parts: 1 + merged.interiors.len(),
            });
        }
        let ring = validate_ring(merged.exterior)
            .map_err(|_| GeometryError::DisjointUnion { parts: 1 })?;
        self.polygon = Polygon::new(ring);
        self.normalize_orientation();
        Ok(())
    }
}

/// Loading a stored polygon runs the same checks as [`Feature::create`].
/// Holes are accepted so healed pieces survive a round trip.
impl TryFrom<Polygon> for Feature {
    type Error = GeometryError;

    fn try_from(polygon: Polygon) -> Result<Self> {
        let exterior = validate_ring(polygon.exterior)?;
        let interiors = polygon
            .interiors
            .into_iter()
            .map(validate_ring)
            .collect::<Result<Vec<_>>>()?;
        let mut feature = Self {
            polygon: Polygon::with_interiors(exterior, interiors),
        };
        feature.normalize_orientation();
        Ok(feature)
    }
}

impl From<Feature> for Polygon {
    fn from(feature: Feature) -> Self {
        feature.polygon
    }
}

pub(crate) fn check_scale_factors(x_factor: f64, y_factor: f64) -> Result<()> {
    if !x_factor.is_finite() || !y_factor.is_finite() || x_factor == 0.0 || y_factor == 0.0 {
        return Err(GeometryError::degenerate(format!(
            "scale factors ({x_factor}, {y_factor}) collapse the shape"
        )));
    }
    Ok(())
}

/// Cleans a raw point list into an open ring without redundant vertices and
/// checks that it is simple.
fn validate_ring(points: Vec<Point>) -> Result<Vec<Point>> {
    if let Some(bad) = points.iter().find(|p| !p.is_finite()) {
        return Err(GeometryError::degenerate(format!(
            "non-finite coordinate ({}, {})",
            bad.x, bad.y
        )));
    }
    let points = boolean::simplify_ring(points);
    if points.len() < 3 {
        return Err(GeometryError::degenerate(format!(
            "{} distinct points, at least 3 required",
            points.len()
        )));
    }
    if ring_signed_area(&points).abs() < AREA_EPSILON {
        return Err(GeometryError::degenerate("zero area"));
    }
    if let Some((i, j)) = find_self_intersection(&points) {
        return Err(GeometryError::degenerate(format!(
            "edges {i} and {j} intersect"
        )));
    }
    Ok(points)
}

fn edge(ring: &[Point], i: usize) -> Line<f64> {
    let a = ring[i];
    let b = ring[(i + 1) % ring.len()];
    Line::new(Coord { x: a.x, y: a.y }, Coord { x: b.x, y: b.y })
}

/// Returns the first pair of edges that cross or overlap. Adjacent edges may
/// only share their common vertex.
fn find_self_intersection(ring: &[Point]) -> Option<(usize, usize)> {
    let n = ring.len();
    for i in 0..n {
        let a = edge(ring, i);
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            let b = edge(ring, j);
            match line_intersection(a, b) {
                None => {}
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(_) => return Some((i, j)),
            }
        }
    }
    None
}

/// Features registered together under one placement, each with its own layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureGroup {
    pub name: String,
    members: Vec<(LayerId, Feature)>,
}

impl FeatureGroup {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: Vec::new(),
        }
    }

    pub fn add(&mut self, layer: LayerId, feature: Feature) {
        self.members.push((layer, feature));
    }

    pub fn with(mut self, layer: LayerId, feature: Feature) -> Self {
        self.add(layer, feature);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (LayerId, &Feature)> {
        self.members.iter().map(|(layer, feature)| (*layer, feature))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<(f64, f64)> {
        vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)]
    }

    #[test]
    fn test_create_normalizes_to_clockwise() {
        let feature = Feature::create(rect(0.0, 0.0, 2.0, 1.0)).unwrap();
        assert!(feature.polygon().is_clockwise());
        assert!((feature.area() - 2.0).abs() < 1e-12);
        assert_eq!(feature.points().len(), 4);
    }

    #[test]
    fn test_create_accepts_closed_ring() {
        let mut ring = rect(0.0, 0.0, 1.0, 1.0);
        ring.push((0.0, 0.0));
        let feature = Feature::create(ring).unwrap();
        assert_eq!(feature.points().len(), 4);
    }

    #[test]
    fn test_create_drops_redundant_vertices() {
        let feature = Feature::create(vec![
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.5, 1.0),
            (0.5, 1.0),
            (0.0, 1.0),
        ])
        .unwrap();
        assert_eq!(feature.points().len(), 4);
        assert!((feature.area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_deserialize_normalizes_orientation() {
        let json = r#"{"exterior":[{"x":0.0,"y":0.0},{"x":2.0,"y":0.0},{"x":2.0,"y":1.0},{"x":0.0,"y":1.0}]}"#;
        let feature: Feature = serde_json::from_str(json).unwrap();
        assert!(feature.polygon().is_clockwise());
        let back: Feature = serde_json::from_str(&serde_json::to_string(&feature).unwrap()).unwrap();
        assert_eq!(back, feature);
    }

    #[test]
    fn test_deserialize_rejects_self_intersection() {
        let json = r#"{"exterior":[{"x":0.0,"y":0.0},{"x":1.0,"y":1.0},{"x":1.0,"y":0.0},{"x":0.0,"y":1.0}]}"#;
        assert!(serde_json::from_str::<Feature>(json).is_err());
    }

    #[test]
    fn test_orientation_normalization_is_idempotent() {
        let mut feature = Feature::create(rect(0.0, 0.0, 3.0, 1.0)).unwrap();
        let before = feature.clone();
        feature.normalize_orientation();
        assert_eq!(feature, before);
    }

    #[test]
    fn test_create_rejects_too_few_points() {
        let err = Feature::create(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 0.0)]).unwrap_err();
        assert!(matches!(err, GeometryError::DegeneratePolygon { .. }));
    }

    #[test]
    fn test_create_rejects_collinear_points() {
        let err = Feature::create(vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]).unwrap_err();
        assert!(matches!(err, GeometryError::DegeneratePolygon { .. }));
    }

    #[test]
    fn test_create_rejects_bowtie() {
        let err = Feature::create(vec![(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0)])
            .unwrap_err();
        assert!(matches!(err, GeometryError::DegeneratePolygon { .. }));
    }

    #[test]
    fn test_create_rejects_non_finite() {
        let err = Feature::create(vec![(0.0, 0.0), (f64::NAN, 1.0), (1.0, 0.0)]).unwrap_err();
        assert!(matches!(err, GeometryError::DegeneratePolygon { .. }));
    }

    #[test]
    fn test_place_and_inverse_round_trip() {
        let original = Feature::create(vec![(0.0, 0.0), (3.0, 0.5), (1.0, 2.0)]).unwrap();
        let pivot = Point::new(0.5, -0.25);
        let placed = original.place(&Placement::new(4.0, -2.0, 37.0, Pivot::Point(pivot)));
        let back = placed
            .place(&Placement::translate(-4.0, 2.0))
            .place(&Placement::rotate(-37.0, Pivot::Point(pivot)));
        assert_eq!(back.points().len(), original.points().len());
        for (a, b) in back.points().iter().zip(original.points()) {
            assert!(a.approx_eq(b, 1e-9), "{a:?} != {b:?}");
        }
    }

    #[test]
    fn test_place_leaves_source_untouched() {
        let original = Feature::create(rect(0.0, 0.0, 1.0, 1.0)).unwrap();
        let snapshot = original.clone();
        let _moved = original.place(&Placement::translate(5.0, 5.0));
        assert_eq!(original, snapshot);
    }

    #[test]
    fn test_mirror_scale_stays_clockwise() {
        let feature = Feature::create(rect(0.0, 0.0, 2.0, 1.0)).unwrap();
        let mirrored = feature.scale(-1.0, 2.0, Pivot::Centroid).unwrap();
        assert!(mirrored.polygon().is_clockwise());
        assert!((mirrored.area() - 4.0).abs() < 1e-12);
        let bbox = mirrored.bbox();
        assert!(bbox.min.approx_eq(&Point::new(0.0, -0.5), 1e-12));
        assert!(bbox.max.approx_eq(&Point::new(2.0, 1.5), 1e-12));
    }

    #[test]
    fn test_zero_scale_is_rejected() {
        let feature = Feature::create(rect(0.0, 0.0, 2.0, 1.0)).unwrap();
        assert!(feature.scale(0.0, 1.0, Pivot::BoundsCenter).is_err());
    }

    #[test]
    fn test_union_with_overlap_succeeds() {
        let mut feature = Feature::create(rect(0.0, 0.0, 2.0, 2.0)).unwrap();
        feature.union_with(rect(1.0, 1.0, 3.0, 3.0)).unwrap();
        assert!((feature.area() - 7.0).abs() < 1e-9);
        assert!(feature.polygon().is_clockwise());
        assert!(!feature.polygon().has_holes());
    }

    #[test]
    fn test_union_with_shared_edge_succeeds() {
        let mut feature = Feature::create(rect(0.0, 0.0, 1.0, 1.0)).unwrap();
        feature.union_with(rect(1.0, 0.0, 2.0, 1.0)).unwrap();
        assert!((feature.area() - 2.0).abs() < 1e-9);
        assert_eq!(feature.points().len(), 4);
    }

    #[test]
    fn test_union_with_single_point_contact_fails() {
        let mut feature = Feature::create(rect(0.0, 0.0, 1.0, 1.0)).unwrap();
        let before = feature.clone();
        let err = feature.union_with(rect(1.0, 1.0, 2.0, 2.0)).unwrap_err();
        assert!(matches!(err, GeometryError::DisjointUnion { .. }));
        assert_eq!(feature, before);
    }

    #[test]
    fn test_union_with_disjoint_fails() {
        let mut feature = Feature::create(rect(0.0, 0.0, 1.0, 1.0)).unwrap();
        let err = feature.union_with(rect(5.0, 5.0, 6.0, 6.0)).unwrap_err();
        assert_eq!(err, GeometryError::DisjointUnion { parts: 2 });
    }

    #[test]
    fn test_feature_group_keeps_order() {
        let group = FeatureGroup::new("pads")
            .with(1, Feature::create(rect(0.0, 0.0, 1.0, 1.0)).unwrap())
            .with(2, Feature::create(rect(2.0, 0.0, 3.0, 1.0)).unwrap());
        let layers: Vec<LayerId> = group.iter().map(|(layer, _)| layer).collect();
        assert_eq!(layers, vec![1, 2]);
        assert_eq!(group.len(), 2);
    }
}
