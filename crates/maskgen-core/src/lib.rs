//! # maskgen Core
//!
//! Geometry model for parametric photomask layouts: simple polygon features,
//! rigid placements, layered devices, and the healing step that unions each
//! layer into its disjoint pieces before export.
//!
//! Everything here is pure in-memory data transformation. Writing CAD files
//! and plotting live with the collaborators that consume [`ExportView`].

pub mod boolean;
pub mod device;
pub mod error;
pub mod export;
pub mod feature;
pub mod geometry;
pub mod layer;
pub mod placement;
pub mod spatial;

pub use device::{Device, DeviceState};
pub use error::{GeometryError, Result};
pub use export::{ExportRing, ExportSink, ExportView};
pub use feature::{Feature, FeatureGroup};
pub use geometry::{BBox, MultiPolygon, Pivot, Point, Polygon, ShapeResult};
pub use layer::{LayerId, RESERVED_LAYER};
pub use placement::Placement;
