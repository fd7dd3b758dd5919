//! # maskgen I/O
//!
//! Export collaborators for healed devices: a GDS-II stream writer with
//! keyhole hole fracturing, the layer-to-output mapping it uses, and
//! JSON-loadable export settings.

pub mod fracture;
pub mod gds;
pub mod layer_map;
pub mod settings;

pub use gds::{GdsError, GdsWriter, WriteStats};
pub use layer_map::{LayerColor, LayerMap, LayerSpec};
pub use settings::{ExportSettings, SettingsError};
