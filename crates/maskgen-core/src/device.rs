use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::boolean;
use crate::error::{GeometryError, Result};
use crate::export::ExportView;
use crate::feature::{check_scale_factors, Feature, FeatureGroup};
use crate::geometry::{Pivot, Polygon, ShapeResult};
use crate::placement::Placement;
use crate::spatial::{SpatialEntry, SpatialIndex};
use crate::LayerId;

/// Slack added to candidate boxes so pieces that only share an edge still meet.
const CANDIDATE_MARGIN: f64 = 1e-9;

/// Lifecycle stage of a [`Device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    /// Nothing registered yet.
    Empty,
    /// Features are being registered.
    Accumulating,
    /// Layers have been healed; only scaling and export remain.
    Healed,
}

/// A layered collection of placed features.
///
/// Features accumulate per layer in registration order until [`Device::heal`]
/// reduces every layer to its set of disjoint healed pieces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    pub name: String,
    features: BTreeMap<LayerId, Vec<Feature>>,
    healed: Option<BTreeMap<LayerId, Vec<Feature>>>,
}

impl Device {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            features: BTreeMap::new(),
            healed: None,
        }
    }

    pub fn state(&self) -> DeviceState {
        if self.healed.is_some() {
            DeviceState::Healed
        } else if self.features.is_empty() {
            DeviceState::Empty
        } else {
            DeviceState::Accumulating
        }
    }

    fn ensure_not_healed(&self, operation: &'static str) -> Result<()> {
        match self.state() {
            DeviceState::Healed => Err(GeometryError::InvalidState {
                operation,
                state: DeviceState::Healed,
            }),
            DeviceState::Empty | DeviceState::Accumulating => Ok(()),
        }
    }

    fn healed_layers(&self, operation: &'static str) -> Result<&BTreeMap<LayerId, Vec<Feature>>> {
        self.healed.as_ref().ok_or(GeometryError::InvalidState {
            operation,
            state: self.state(),
        })
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Copies `feature`, places the copy and appends it to `layer`.
    pub fn register(&mut self, feature: &Feature, layer: LayerId, placement: &Placement) -> Result<()> {
        self.ensure_not_healed("register a feature")?;
        if !placement.is_finite() {
            return Err(GeometryError::degenerate("placement has non-finite components"));
        }
        let placed = feature.place(placement);
        let features = self.features.entry(layer).or_default();
        features.push(placed);
        log::debug!(
            "{}: registered feature #{} on layer {}",
            self.name,
            features.len() - 1,
            layer
        );
        Ok(())
    }

    /// Registers every member of `group` under the same placement.
    pub fn register_group(&mut self, group: &FeatureGroup, placement: &Placement) -> Result<()> {
        self.ensure_not_healed("register a feature group")?;
        for (layer, feature) in group.iter() {
            self.register(feature, layer, placement)?;
        }
        log::debug!("{}: registered group '{}' ({} features)", self.name, group.name, group.len());
        Ok(())
    }

    /// Moves every registered feature. Each feature resolves the pivot against itself.
    pub fn transform_all(&mut self, placement: &Placement) -> Result<()> {
        self.ensure_not_healed("transform the device")?;
        if !placement.is_finite() {
            return Err(GeometryError::degenerate("placement has non-finite components"));
        }
        for feature in self.features.values_mut().flatten() {
            feature.place_mut(placement);
        }
        Ok(())
    }

    pub fn remove_feature(&mut self, layer: LayerId, index: usize) -> Result<Feature> {
        self.ensure_not_healed("remove a feature")?;
        let features = self
            .features
            .get_mut(&layer)
            .ok_or(GeometryError::UnknownLayer { layer })?;
        if index >= features.len() {
            return Err(GeometryError::IndexOutOfRange { layer, index });
        }
        Ok(features.remove(index))
    }

    /// Drops every feature on `layer`. The layer itself stays known to the device.
    pub fn clear_layer(&mut self, layer: LayerId) -> Result<usize> {
        self.ensure_not_healed("clear a layer")?;
        let features = self
            .features
            .get_mut(&layer)
            .ok_or(GeometryError::UnknownLayer { layer })?;
        let removed = features.len();
        features.clear();
        Ok(removed)
    }

    // ── Healing ──────────────────────────────────────────────────────

    /// Unions every layer into its disjoint pieces.
    ///
    /// Either all layers heal or the device stays in `Accumulating` with its
    /// registered features untouched.
    pub fn heal(&mut self) -> Result<()> {
        match self.state() {
            DeviceState::Accumulating => {}
            state => {
                return Err(GeometryError::InvalidState {
                    operation: "heal",
                    state,
                })
            }
        }

        let mut healed = BTreeMap::new();
        for (&layer, features) in &self.features {
            let pieces = heal_layer(layer, features)?;
            log::debug!(
                "{}: layer {} healed {} features into {} pieces",
                self.name,
                layer,
                features.len(),
                pieces.len()
            );
            healed.insert(layer, pieces);
        }

        log::info!("{}: healed {} layers", self.name, healed.len());
        self.healed = Some(healed);
        Ok(())
    }

    /// Scales every healed piece of `layer` about its own pivot.
    pub fn scale(&mut self, layer: LayerId, x_factor: f64, y_factor: f64, pivot: Pivot) -> Result<()> {
        check_scale_factors(x_factor, y_factor)?;
        let state = self.state();
        let pieces = self
            .healed
            .as_mut()
            .ok_or(GeometryError::InvalidState {
                operation: "scale a layer",
                state,
            })?
            .get_mut(&layer)
            .ok_or(GeometryError::UnknownLayer { layer })?;
        for piece in pieces.iter_mut() {
            piece.scale_mut(x_factor, y_factor, pivot)?;
        }
        Ok(())
    }

    /// The healed rings of every layer, for CAD writers and plotters.
    pub fn export_view(&self) -> Result<ExportView> {
        let healed = self.healed_layers("export")?;
        let mut view = ExportView::new();
        for (&layer, pieces) in healed {
            let polygons: Vec<Polygon> = pieces.iter().map(|p| p.polygon().clone()).collect();
            if let Some(shape) = ShapeResult::from_parts(polygons) {
                view.push_shape(layer, &shape);
            }
        }
        Ok(view)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn layers(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.features.keys().copied()
    }

    pub fn features(&self, layer: LayerId) -> Option<&[Feature]> {
        self.features.get(&layer).map(Vec::as_slice)
    }

    pub fn feature_count(&self) -> usize {
        self.features.values().map(Vec::len).sum()
    }

    pub fn healed(&self, layer: LayerId) -> Option<&[Feature]> {
        self.healed
            .as_ref()
            .and_then(|h| h.get(&layer))
            .map(Vec::as_slice)
    }

    /// The healed layer as a single polygon or a set of disjoint ones.
    pub fn healed_shape(&self, layer: LayerId) -> Option<ShapeResult> {
        let pieces = self.healed(layer)?;
        ShapeResult::from_parts(pieces.iter().map(|p| p.polygon().clone()).collect())
    }

    // ── Serialization ────────────────────────────────────────────────

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Reduces one layer to disjoint pieces.
///
/// Each incoming feature is unioned only with the pieces whose bounding box
/// it touches; the rest are left alone. Output is sorted by bounding box so the
/// result does not depend on registration order.
fn heal_layer(layer: LayerId, features: &[Feature]) -> Result<Vec<Feature>> {
    match features {
        [] => return Err(GeometryError::EmptyLayer { layer }),
        [single] => return Ok(vec![single.clone()]),
        _ => {}
    }

    let mut slots: Vec<Option<Polygon>> = Vec::with_capacity(features.len());
    let mut index = SpatialIndex::new();

    for feature in features {
        let incoming = feature.polygon();
        let query = feature.bbox().expanded(CANDIDATE_MARGIN);
        let hits: Vec<SpatialEntry> = index.query_bbox(&query).into_iter().cloned().collect();

        let mut touched = Vec::with_capacity(hits.len());
        for hit in &hits {
            index.remove(hit);
            if let Some(piece) = slots[hit.piece_index].take() {
                touched.push(piece);
            }
        }

        let merged = if touched.is_empty() {
            vec![incoming.clone()]
        } else {
            boolean::union_into(&touched, incoming)
        };

        for polygon in merged {
            let Some(bbox) = polygon.bbox() else {
                continue;
            };
            index.insert(SpatialEntry {
                piece_index: slots.len(),
                bbox,
            });
            slots.push(Some(polygon));
        }
    }

    let mut pieces: Vec<Feature> = slots
        .into_iter()
        .flatten()
        .map(Feature::from_healed)
        .collect();
    if pieces.is_empty() {
        return Err(GeometryError::EmptyLayer { layer });
    }
    pieces.sort_by(|a, b| {
        let (ba, bb) = (a.bbox(), b.bbox());
        ba.min
            .x
            .total_cmp(&bb.min.x)
            .then(ba.min.y.total_cmp(&bb.min.y))
            .then(ba.max.x.total_cmp(&bb.max.x))
            .then(ba.max.y.total_cmp(&bb.max.y))
    });
    Ok(pieces)
}
