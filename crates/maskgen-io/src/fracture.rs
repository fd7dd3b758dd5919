//! Hole removal for formats without hole semantics.
//!
//! GDS-II BOUNDARY elements are plain filled polygons. A piece with holes is
//! written as one ring: each hole is joined to the outline by a zero-width
//! cut running from the hole's rightmost vertex in the +x direction to the
//! nearest outline edge. Holes are bridged right to left so every cut only
//! meets the outline or holes already merged into it.

use maskgen_core::geometry::ring_signed_area;
use maskgen_core::Point;

/// `ring` in the requested winding. Outlines are clockwise, holes counter-clockwise.
fn oriented(ring: &[Point], counter_clockwise: bool) -> Vec<Point> {
    let mut ring = ring.to_vec();
    if (ring_signed_area(&ring) > 0.0) != counter_clockwise {
        ring.reverse();
    }
    ring
}

fn max_x(ring: &[Point]) -> f64 {
    ring.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max)
}

/// Merges `holes` into `outline`. Returns `None` if a hole has no outline
/// edge to its right.
pub fn keyhole(outline: &[Point], holes: &[Vec<Point>]) -> Option<Vec<Point>> {
    let mut ring = oriented(outline, false);
    let mut holes: Vec<Vec<Point>> = holes.iter().map(|h| oriented(h, true)).collect();
    holes.sort_by(|a, b| max_x(b).total_cmp(&max_x(a)));

    for hole in &holes {
        ring = bridge(ring, hole)?;
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    Some(ring)
}

fn bridge(ring: Vec<Point>, hole: &[Point]) -> Option<Vec<Point>> {
    let (k, h) = hole
        .iter()
        .copied()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.x.total_cmp(&b.x).then(b.y.total_cmp(&a.y)))?;

    // Nearest edge crossing of the ray y = h.y, x >= h.x.
    let n = ring.len();
    let mut nearest: Option<(usize, Point)> = None;
    for i in 0..n {
        let (a, b) = (ring[i], ring[(i + 1) % n]);
        if (a.y > h.y) == (b.y > h.y) {
            continue;
        }
        let x = a.x + (h.y - a.y) * (b.x - a.x) / (b.y - a.y);
        if x < h.x {
            continue;
        }
        if nearest.map_or(true, |(_, p)| x < p.x) {
            nearest = Some((i, Point::new(x, h.y)));
        }
    }
    let (i, p) = nearest?;

    let mut out = Vec::with_capacity(n + hole.len() + 3);
    out.extend_from_slice(&ring[..=i]);
    out.push(p);
    out.extend_from_slice(&hole[k..]);
    out.extend_from_slice(&hole[..=k]);
    out.push(p);
    out.extend_from_slice(&ring[i + 1..]);
    out.dedup();
    Some(out)
}
