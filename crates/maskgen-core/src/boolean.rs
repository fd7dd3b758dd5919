//! Polygon union backed by `geo`'s boolean operations.
//!
//! Results are cleaned before they re-enter the data model: the repeated
//! closing coordinate is dropped, rings that touch themselves at a vertex are
//! split into simple loops, near-duplicate and collinear vertices are removed,
//! slivers below [`AREA_EPSILON`] are discarded and every ring is put into
//! canonical orientation.

use geo::{
    BooleanOps, Contains, Coord, InteriorPoint, LineString, MultiPolygon as GeoMultiPolygon,
    Polygon as GeoPolygon,
};

use crate::geometry::{ring_signed_area, Point, Polygon, AREA_EPSILON};

/// Vertices closer than this are merged.
const MERGE_TOLERANCE: f64 = 1e-9;

/// Relative cross-product threshold below which a vertex is considered collinear.
const COLLINEAR_TOLERANCE: f64 = 1e-9;

fn ring_to_geo(ring: &[Point]) -> LineString<f64> {
    LineString::from(
        ring.iter()
            .map(|p| Coord { x: p.x, y: p.y })
            .collect::<Vec<_>>(),
    )
}

pub(crate) fn to_geo(polygon: &Polygon) -> GeoPolygon<f64> {
    GeoPolygon::new(
        ring_to_geo(&polygon.exterior),
        polygon.interiors.iter().map(|r| ring_to_geo(r)).collect(),
    )
}

/// Simple, cleaned loops of one overlay ring. A ring pinched at a vertex
/// yields one loop per lobe.
fn ring_loops(ring: &LineString<f64>) -> Vec<Vec<Point>> {
    let mut points: Vec<Point> = ring.coords().map(|c| Point::new(c.x, c.y)).collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    split_pinched(points)
        .into_iter()
        .map(simplify_ring)
        .filter(|l| l.len() >= 3 && ring_signed_area(l).abs() >= AREA_EPSILON)
        .collect()
}

fn find_repeat(ring: &[Point]) -> Option<(usize, usize)> {
    for i in 0..ring.len() {
        for j in (i + 1)..ring.len() {
            if ring[i].approx_eq(&ring[j], MERGE_TOLERANCE) {
                return Some((i, j));
            }
        }
    }
    None
}

/// Cuts a ring at every revisited vertex until each loop is simple.
fn split_pinched(ring: Vec<Point>) -> Vec<Vec<Point>> {
    let mut pending = vec![ring];
    let mut loops = Vec::new();
    while let Some(ring) = pending.pop() {
        match find_repeat(&ring) {
            Some((i, j)) => {
                let mut outer = ring[j..].to_vec();
                outer.extend_from_slice(&ring[..i]);
                pending.push(ring[i..j].to_vec());
                pending.push(outer);
            }
            None => loops.push(ring),
        }
    }
    loops
}

fn dominant_sign(loops: &[Vec<Point>]) -> f64 {
    loops.iter().map(|l| ring_signed_area(l)).sum::<f64>().signum()
}

/// Index of the outline that encloses `hole`.
fn hole_owner(outlines: &[Vec<Point>], hole: &[Point]) -> usize {
    let inside = GeoPolygon::new(ring_to_geo(hole), vec![]).interior_point();
    inside
        .and_then(|pt| {
            outlines
                .iter()
                .position(|o| GeoPolygon::new(ring_to_geo(o), vec![]).contains(&pt))
        })
        .unwrap_or(0)
}

/// Converts one overlay polygon back into simple, normalized polygons.
pub(crate) fn from_geo(polygon: &GeoPolygon<f64>) -> Vec<Polygon> {
    let mut outlines = Vec::new();
    let mut holes = Vec::new();

    let exterior = ring_loops(polygon.exterior());
    let sign = dominant_sign(&exterior);
    for ring in exterior {
        if ring_signed_area(&ring).signum() == sign {
            outlines.push(ring);
        } else {
            holes.push(ring);
        }
    }
    for interior in polygon.interiors() {
        let loops = ring_loops(interior);
        let sign = dominant_sign(&loops);
        for ring in loops {
            if ring_signed_area(&ring).signum() == sign {
                holes.push(ring);
            } else {
                outlines.push(ring);
            }
        }
    }
    if outlines.is_empty() {
        return Vec::new();
    }

    let mut interiors: Vec<Vec<Vec<Point>>> = vec![Vec::new(); outlines.len()];
    for hole in holes {
        let owner = hole_owner(&outlines, &hole);
        interiors[owner].push(hole);
    }
    outlines
        .into_iter()
        .zip(interiors)
        .map(|(exterior, holes)| Polygon::with_interiors(exterior, holes).normalized())
        .collect()
}

/// Drops near-duplicate neighbours and vertices lying on the line through
/// their neighbours, repeating until the ring is stable.
pub(crate) fn simplify_ring(mut ring: Vec<Point>) -> Vec<Point> {
    loop {
        let before = ring.len();
        ring.dedup_by(|a, b| a.approx_eq(b, MERGE_TOLERANCE));
        while ring.len() > 1 && ring[0].approx_eq(&ring[ring.len() - 1], MERGE_TOLERANCE) {
            ring.pop();
        }
        if ring.len() < 3 {
            return ring;
        }

        let n = ring.len();
        let mut kept = Vec::with_capacity(n);
        for i in 0..n {
            let prev = ring[(i + n - 1) % n];
            let cur = ring[i];
            let next = ring[(i + 1) % n];
            let (ax, ay) = (cur.x - prev.x, cur.y - prev.y);
            let (bx, by) = (next.x - cur.x, next.y - cur.y);
            let cross = ax * by - ay * bx;
            let scale = (ax.hypot(ay) * bx.hypot(by)).max(f64::MIN_POSITIVE);
            if cross.abs() / scale > COLLINEAR_TOLERANCE {
                kept.push(cur);
            }
        }
        ring = kept;
        if ring.len() == before || ring.len() < 3 {
            return ring;
        }
    }
}

/// Unions `incoming` into a set of pairwise disjoint `pieces`.
///
/// The returned polygons are pairwise disjoint and normalized. Pieces that do
/// not touch `incoming` come back unchanged in shape.
pub fn union_into(pieces: &[Polygon], incoming: &Polygon) -> Vec<Polygon> {
    let subject = GeoMultiPolygon::new(pieces.iter().map(to_geo).collect());
    let clip = GeoMultiPolygon::new(vec![to_geo(incoming)]);
    let merged = subject.union(&clip);
    merged.iter().flat_map(from_geo).collect()
}

/// Unions two polygons, returning every resulting disjoint part.
pub fn union_pair(a: &Polygon, b: &Polygon) -> Vec<Polygon> {
    union_into(std::slice::from_ref(a), b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon {
        Polygon::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    #[test]
    fn test_simplify_drops_collinear_and_duplicates() {
        let ring = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
            Point::new(0.0, 0.0),
        ];
        let cleaned = simplify_ring(ring);
        assert_eq!(cleaned.len(), 4);
    }

    #[test]
    fn test_union_overlapping_rectangles() {
        let parts = union_pair(&rect(0.0, 0.0, 2.0, 2.0), &rect(1.0, 1.0, 3.0, 3.0));
        assert_eq!(parts.len(), 1);
        assert!((parts[0].area() - 7.0).abs() < 1e-9);
        assert!(parts[0].is_clockwise());
        assert_eq!(parts[0].exterior.len(), 8);
    }

    #[test]
    fn test_union_separated_rectangles() {
        let parts = union_pair(&rect(0.0, 0.0, 1.0, 1.0), &rect(3.0, 0.0, 4.0, 1.0));
        assert_eq!(parts.len(), 2);
        for part in &parts {
            assert!((part.area() - 1.0).abs() < 1e-9);
            assert_eq!(part.exterior.len(), 4);
        }
    }

    #[test]
    fn test_union_enclosing_frame_keeps_hole() {
        // A U-shape closed off by a bar leaves a square hole.
        let u = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(3.0, 0.0),
            Point::new(3.0, 3.0),
            Point::new(2.0, 3.0),
            Point::new(2.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 3.0),
            Point::new(0.0, 3.0),
        ]);
        let parts = union_pair(&u, &rect(0.0, 2.0, 3.0, 3.0));
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].interiors.len(), 1);
        assert!((parts[0].area() - 8.0).abs() < 1e-9);
        assert!(ring_signed_area(&parts[0].interiors[0]) > 0.0);
    }

    #[test]
    fn test_split_pinched_ring() {
        // Two unit squares sharing the corner (1, 1), traced as one ring.
        let ring = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(1.0, 2.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        let loops = split_pinched(ring);
        assert_eq!(loops.len(), 2);
        for l in &loops {
            assert_eq!(l.len(), 4);
            assert!((ring_signed_area(l).abs() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_pinched_overlay_output_becomes_two_pieces() {
        let pinched = GeoPolygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (1.0, 0.0),
                (1.0, 1.0),
                (2.0, 1.0),
                (2.0, 2.0),
                (1.0, 2.0),
                (1.0, 1.0),
                (0.0, 1.0),
                (0.0, 0.0),
            ]),
            vec![],
        );
        let parts = from_geo(&pinched);
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.is_clockwise() && !p.has_holes()));
    }

    #[test]
    fn test_corner_contact_union_gives_two_pieces() {
        let parts = union_pair(&rect(0.0, 0.0, 1.0, 1.0), &rect(1.0, 1.0, 2.0, 2.0));
        assert_eq!(parts.len(), 2);
        for part in &parts {
            assert_eq!(part.exterior.len(), 4);
            assert!((part.area() - 1.0).abs() < 1e-9);
        }
    }
}
