/// A caller-chosen layer number. It doubles as the output layer and the
/// display color index of the layer.
pub type LayerId = u32;

/// Layer 0 carries no special color in the CAD mapping.
pub const RESERVED_LAYER: LayerId = 0;

pub fn is_reserved(layer: LayerId) -> bool {
    layer == RESERVED_LAYER
}

/// Display color index for plotting collaborators; `None` for the reserved layer.
pub fn display_color_index(layer: LayerId) -> Option<u32> {
    if is_reserved(layer) {
        None
    } else {
        Some(layer)
    }
}
