use thiserror::Error;

use crate::device::DeviceState;
use crate::LayerId;

/// Errors raised by feature construction, placement and device healing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Degenerate polygon: {reason}")]
    DegeneratePolygon { reason: String },

    #[error("Union does not form a single simple polygon ({parts} parts)")]
    DisjointUnion { parts: usize },

    #[error("Layer {layer} has no registered features")]
    EmptyLayer { layer: LayerId },

    #[error("Cannot {operation} while the device is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: DeviceState,
    },

    #[error("Layer {layer} is not present in the device")]
    UnknownLayer { layer: LayerId },

    #[error("Feature index {index} is out of range on layer {layer}")]
    IndexOutOfRange { layer: LayerId, index: usize },
}

impl GeometryError {
    pub(crate) fn degenerate(reason: impl Into<String>) -> Self {
        GeometryError::DegeneratePolygon {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GeometryError>;
