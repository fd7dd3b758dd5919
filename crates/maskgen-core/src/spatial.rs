use rstar::{RTree, RTreeObject, AABB};

use crate::geometry::BBox;

/// An entry in the R-tree, referencing a healed piece by its slot index.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialEntry {
    /// Index into the piece slot vector.
    pub piece_index: usize,
    /// Bounding box of the piece.
    pub bbox: BBox,
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min.x, self.bbox.min.y],
            [self.bbox.max.x, self.bbox.max.y],
        )
    }
}

/// Spatial index used to pick union candidates while a layer is healed.
pub struct SpatialIndex {
    tree: RTree<SpatialEntry>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    pub fn insert(&mut self, entry: SpatialEntry) {
        self.tree.insert(entry);
    }

    /// Removes an entry equal to `entry`. Returns whether one was found.
    pub fn remove(&mut self, entry: &SpatialEntry) -> bool {
        self.tree.remove(entry).is_some()
    }

    /// All entries whose box touches or overlaps `bbox`.
    pub fn query_bbox(&self, bbox: &BBox) -> Vec<&SpatialEntry> {
        let envelope = AABB::from_corners([bbox.min.x, bbox.min.y], [bbox.max.x, bbox.max.y]);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn entry(index: usize, x0: f64, y0: f64, x1: f64, y1: f64) -> SpatialEntry {
        SpatialEntry {
            piece_index: index,
            bbox: BBox::new(Point::new(x0, y0), Point::new(x1, y1)),
        }
    }

    #[test]
    fn test_spatial_query() {
        let mut index = SpatialIndex::new();
        index.insert(entry(0, 0.0, 0.0, 10.0, 10.0));
        index.insert(entry(1, 20.0, 20.0, 30.0, 30.0));

        let query = BBox::new(Point::new(-5.0, -5.0), Point::new(15.0, 15.0));
        let results = index.query_bbox(&query);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].piece_index, 0);
    }

    #[test]
    fn test_touching_boxes_are_candidates() {
        let mut index = SpatialIndex::new();
        index.insert(entry(0, 0.0, 0.0, 1.0, 1.0));
        let query = BBox::new(Point::new(1.0, 0.0), Point::new(2.0, 1.0));
        assert_eq!(index.query_bbox(&query).len(), 1);
    }

    #[test]
    fn test_remove_entry() {
        let mut index = SpatialIndex::new();
        let e = entry(3, 0.0, 0.0, 1.0, 1.0);
        index.insert(e.clone());
        assert_eq!(index.len(), 1);
        assert!(index.remove(&e));
        assert!(index.is_empty());
        assert!(!index.remove(&e));
    }
}
