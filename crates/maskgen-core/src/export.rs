//! The read-only view handed to CAD writers and plotters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, ShapeResult};
use crate::LayerId;

/// One closed ring, stored open. Outlines are clockwise, holes counter-clockwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRing {
    pub points: Vec<Point>,
    #[serde(default)]
    pub hole: bool,
}

/// Healed rings grouped by layer, in ascending layer order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportView {
    layers: BTreeMap<LayerId, Vec<ExportRing>>,
}

impl ExportView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends every ring of `shape` to `layer`: each piece's outline, then its holes.
    pub fn push_shape(&mut self, layer: LayerId, shape: &ShapeResult) {
        let rings = self.layers.entry(layer).or_default();
        let parts = match shape {
            ShapeResult::Single(polygon) => std::slice::from_ref(polygon),
            ShapeResult::Multi(multi) => multi.parts.as_slice(),
        };
        for polygon in parts {
            rings.push(ExportRing {
                points: polygon.exterior.clone(),
                hole: false,
            });
            rings.extend(polygon.interiors.iter().map(|hole| ExportRing {
                points: hole.clone(),
                hole: true,
            }));
        }
    }

    pub fn layer_ids(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.layers.keys().copied()
    }

    pub fn rings(&self, layer: LayerId) -> &[ExportRing] {
        self.layers.get(&layer).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (LayerId, &[ExportRing])> {
        self.layers
            .iter()
            .map(|(layer, rings)| (*layer, rings.as_slice()))
    }

    pub fn ring_count(&self) -> usize {
        self.layers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A collaborator that consumes a healed device, e.g. a CAD writer.
///
/// Implementations emit one closed polyline per ring and key their output
/// layer or channel by the ring's layer ID.
pub trait ExportSink {
    type Error;

    fn write_view(&mut self, name: &str, view: &ExportView) -> Result<(), Self::Error>;
}
