use serde::{Deserialize, Serialize};

use maskgen_core::layer::display_color_index;
use maskgen_core::LayerId;

/// How one device layer is written out and drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: LayerId,
    pub name: String,
    pub gds_layer: u16,
    pub gds_datatype: u16,
    pub color: LayerColor,
    pub description: String,
}

impl LayerSpec {
    pub fn new(id: LayerId, name: &str, gds_layer: u16, gds_datatype: u16) -> Self {
        Self {
            id,
            name: name.to_string(),
            gds_layer,
            gds_datatype,
            color: LayerColor::for_layer(id),
            description: String::new(),
        }
    }

    pub fn with_color(mut self, r: u8, g: u8, b: u8) -> Self {
        self.color = LayerColor { r, g, b };
        self
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = desc.to_string();
        self
    }
}

/// RGB color for a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for LayerColor {
    fn default() -> Self {
        Self {
            r: 128,
            g: 128,
            b: 128,
        }
    }
}

/// Display palette indexed by layer color index, cycled when exhausted.
const PALETTE: [LayerColor; 8] = [
    LayerColor { r: 31, g: 119, b: 180 },
    LayerColor { r: 255, g: 127, b: 14 },
    LayerColor { r: 44, g: 160, b: 44 },
    LayerColor { r: 214, g: 39, b: 40 },
    LayerColor { r: 148, g: 103, b: 189 },
    LayerColor { r: 140, g: 86, b: 75 },
    LayerColor { r: 227, g: 119, b: 194 },
    LayerColor { r: 188, g: 189, b: 34 },
];

impl LayerColor {
    /// Palette color for a layer; the reserved layer gets the neutral default.
    pub fn for_layer(id: LayerId) -> Self {
        match display_color_index(id) {
            Some(index) => PALETTE[(index as usize - 1) % PALETTE.len()],
            None => Self::default(),
        }
    }
}

/// Device layer → output layer table. Unlisted layers map to themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerMap {
    layers: Vec<LayerSpec>,
}

impl LayerMap {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Adds or replaces the spec for `layer.id`.
    pub fn add_layer(&mut self, layer: LayerSpec) {
        match self.layers.iter_mut().find(|l| l.id == layer.id) {
            Some(existing) => *existing = layer,
            None => self.layers.push(layer),
        }
    }

    pub fn with_layer(mut self, layer: LayerSpec) -> Self {
        self.add_layer(layer);
        self
    }

    pub fn get_layer(&self, id: LayerId) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// GDS layer and datatype for `id`, or `None` if either number does not
    /// fit the signed 16-bit GDS fields.
    pub fn gds_target(&self, id: LayerId) -> Option<(u16, u16)> {
        let (layer, datatype) = match self.get_layer(id) {
            Some(spec) => (u32::from(spec.gds_layer), spec.gds_datatype),
            None => (id, 0),
        };
        let fits = |n: u32| n <= i16::MAX as u32;
        if fits(layer) && fits(u32::from(datatype)) {
            Some((layer as u16, datatype))
        } else {
            None
        }
    }

    pub fn color(&self, id: LayerId) -> LayerColor {
        self.get_layer(id)
            .map(|spec| spec.color)
            .unwrap_or_else(|| LayerColor::for_layer(id))
    }

    pub fn all_layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}
