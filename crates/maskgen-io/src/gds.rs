//! GDS-II stream writer for healed devices.
//!
//! Each device becomes one structure; each healed piece becomes one BOUNDARY
//! element on the GDS layer the [`LayerMap`] assigns to its device layer.
//! Pieces with holes are fractured into a single keyhole ring first.
//!
//! Every structure is resolved and checked before the first record is
//! written, so a failed export leaves the sink untouched.
//!
//! ## GDS-II Record Structure
//! Each record: [2-byte length][2-byte record type][payload]
//! HEADER → BGNLIB → LIBNAME → UNITS → (BGNSTR → STRNAME → BOUNDARY* → ENDSTR)* → ENDLIB

use std::io::{self, Write};
use thiserror::Error;

use maskgen_core::layer::is_reserved;
use maskgen_core::{Device, ExportRing, ExportSink, ExportView, GeometryError, LayerId, Point};

use crate::fracture::keyhole;
use crate::layer_map::LayerMap;
use crate::settings::{ExportSettings, SettingsError};

// ── GDS-II Record Types ──────────────────────────────────────────────

pub(crate) mod record_type {
    pub const HEADER: u16 = 0x0002;
    pub const BGNLIB: u16 = 0x0102;
    pub const LIBNAME: u16 = 0x0206;
    pub const UNITS: u16 = 0x0305;
    pub const ENDLIB: u16 = 0x0400;
    pub const BGNSTR: u16 = 0x0502;
    pub const STRNAME: u16 = 0x0606;
    pub const ENDSTR: u16 = 0x0700;
    pub const BOUNDARY: u16 = 0x0800;
    pub const LAYER: u16 = 0x0D02;
    pub const DATATYPE: u16 = 0x0E02;
    pub const XY: u16 = 0x1003;
    pub const ENDEL: u16 = 0x1100;
}

/// GDS version 6.
const GDS_VERSION: i16 = 600;

/// Largest XY record: (65535 - 4) / 8 coordinate pairs, closing point included.
pub const MAX_BOUNDARY_POINTS: usize = 8191;

/// Modification/access timestamp written into BGNLIB and BGNSTR. Fixed so
/// identical devices produce identical streams.
const TIMESTAMP: [i16; 12] = [2024, 1, 1, 0, 0, 0, 2024, 1, 1, 0, 0, 0];

// ── Errors ────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum GdsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("Ring on layer {layer} has {points} points, limit is {max}", max = MAX_BOUNDARY_POINTS - 1)]
    TooManyPoints { layer: LayerId, points: usize },

    #[error("Coordinate {value} does not fit the database grid")]
    CoordinateOverflow { value: f64 },

    #[error("Layer {0} has no valid GDS layer number")]
    LayerOutOfRange(LayerId),

    #[error("Holes on layer {0} could not be merged into their outline")]
    UnbridgedHole(LayerId),

    #[error("Record of {0} bytes exceeds the GDS-II record limit")]
    RecordTooLong(usize),
}

/// Convert IEEE 754 f64 to GDS-II excess-64 real format.
pub(crate) fn f64_to_gds_real8(value: f64) -> [u8; 8] {
    if value == 0.0 {
        return [0u8; 8];
    }

    let sign_bit: u8 = if value < 0.0 { 0x80 } else { 0x00 };
    let mut val = value.abs();

    // Find exponent such that 1/16 <= mantissa < 1
    let mut exponent: i32 = 0;
    while val >= 1.0 && exponent < 63 {
        val /= 16.0;
        exponent += 1;
    }
    while val < 1.0 / 16.0 && exponent > -64 {
        val *= 16.0;
        exponent -= 1;
    }

    let mantissa = (val * (1u64 << 56) as f64) as u64;
    let exp_byte = sign_bit | ((exponent + 64) as u8 & 0x7F);

    let mut result = [0u8; 8];
    result[0] = exp_byte;
    result[1..].copy_from_slice(&mantissa.to_be_bytes()[1..]);
    result
}

// ── GDS-II Writer ─────────────────────────────────────────────────────

/// Summary of one written library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub structures: usize,
    pub boundaries: usize,
    pub skipped_layers: usize,
}

pub struct GdsWriter<W: Write> {
    writer: W,
    settings: ExportSettings,
    layer_map: LayerMap,
}

impl<W: Write> GdsWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            settings: ExportSettings::default(),
            layer_map: LayerMap::default(),
        }
    }

    pub fn with_settings(mut self, settings: ExportSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_layer_map(mut self, layer_map: LayerMap) -> Self {
        self.layer_map = layer_map;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Write a healed device as a single-structure library.
    pub fn write_device(&mut self, device: &Device) -> Result<WriteStats, GdsError> {
        let view = device.export_view()?;
        self.write_library(&[(device.name.as_str(), &view)])
    }

    /// Write one structure per `(name, view)` pair into a single library.
    pub fn write_library(&mut self, structures: &[(&str, &ExportView)]) -> Result<WriteStats, GdsError> {
        self.settings.validate()?;

        let mut stats = WriteStats::default();
        let prepared = structures
            .iter()
            .map(|&(name, view)| self.prepare_structure(name, view, &mut stats))
            .collect::<Result<Vec<_>, _>>()?;

        self.write_i16_record(record_type::HEADER, &[GDS_VERSION])?;
        self.write_i16_record(record_type::BGNLIB, &TIMESTAMP)?;
        let library_name = self.settings.library_name.clone();
        self.write_string_record(record_type::LIBNAME, &library_name)?;
        self.write_units()?;

        for structure in &prepared {
            self.write_structure(structure)?;
        }

        self.write_record(record_type::ENDLIB, &[])?;
        self.writer.flush()?;
        log::info!(
            "Wrote GDS library '{}': {} structures, {} boundaries",
            library_name,
            stats.structures,
            stats.boundaries
        );
        Ok(stats)
    }

    fn write_record(&mut self, record_type: u16, data: &[u8]) -> Result<(), GdsError> {
        let total_len = u16::try_from(data.len() + 4).map_err(|_| GdsError::RecordTooLong(data.len() + 4))?;
        self.writer.write_all(&total_len.to_be_bytes())?;
        self.writer.write_all(&record_type.to_be_bytes())?;
        if !data.is_empty() {
            self.writer.write_all(data)?;
        }
        Ok(())
    }

    fn write_i16_record(&mut self, record_type: u16, values: &[i16]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.write_record(record_type, &data)
    }

    fn write_i32_record(&mut self, record_type: u16, values: &[i32]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.write_record(record_type, &data)
    }

    fn write_string_record(&mut self, record_type: u16, s: &str) -> Result<(), GdsError> {
        let mut data: Vec<u8> = s.bytes().collect();
        // GDS strings must be even length
        if data.len() % 2 != 0 {
            data.push(0);
        }
        self.write_record(record_type, &data)
    }

    fn write_real8_record(&mut self, record_type: u16, values: &[f64]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| f64_to_gds_real8(*v)).collect();
        self.write_record(record_type, &data)
    }

    fn write_units(&mut self) -> Result<(), GdsError> {
        // db unit in user units, db unit in meters
        let db_in_user = self.settings.db_unit_in_m / self.settings.user_unit_in_m;
        let db_in_m = self.settings.db_unit_in_m;
        self.write_real8_record(record_type::UNITS, &[db_in_user, db_in_m])
    }

    /// Resolves layers, fractures holes and converts every coordinate.
    fn prepare_structure<'a>(
        &self,
        name: &'a str,
        view: &ExportView,
        stats: &mut WriteStats,
    ) -> Result<PreparedStructure<'a>, GdsError> {
        let scale = self.settings.db_per_user_unit();
        let mut boundaries = Vec::new();

        for (layer, rings) in view.iter() {
            if self.settings.skip_reserved_layer && is_reserved(layer) {
                log::warn!("{}: skipping reserved layer {} ({} rings)", name, layer, rings.len());
                stats.skipped_layers += 1;
                continue;
            }
            let (gds_layer, datatype) = self
                .layer_map
                .gds_target(layer)
                .ok_or(GdsError::LayerOutOfRange(layer))?;

            for (outline, holes) in pieces(rings).ok_or(GdsError::UnbridgedHole(layer))? {
                let ring = keyhole(outline, &holes).ok_or(GdsError::UnbridgedHole(layer))?;
                boundaries.push(PreparedBoundary {
                    gds_layer: gds_layer as i16,
                    datatype: datatype as i16,
                    xy: closed_xy(layer, &ring, scale)?,
                });
            }
        }

        stats.structures += 1;
        stats.boundaries += boundaries.len();
        Ok(PreparedStructure { name, boundaries })
    }

    fn write_structure(&mut self, structure: &PreparedStructure<'_>) -> Result<(), GdsError> {
        self.write_i16_record(record_type::BGNSTR, &TIMESTAMP)?;
        self.write_string_record(record_type::STRNAME, structure.name)?;
        for boundary in &structure.boundaries {
            self.write_record(record_type::BOUNDARY, &[])?;
            self.write_i16_record(record_type::LAYER, &[boundary.gds_layer])?;
            self.write_i16_record(record_type::DATATYPE, &[boundary.datatype])?;
            self.write_i32_record(record_type::XY, &boundary.xy)?;
            self.write_record(record_type::ENDEL, &[])?;
        }
        self.write_record(record_type::ENDSTR, &[])
    }
}

struct PreparedBoundary {
    gds_layer: i16,
    datatype: i16,
    xy: Vec<i32>,
}

struct PreparedStructure<'a> {
    name: &'a str,
    boundaries: Vec<PreparedBoundary>,
}

/// Groups a layer's rings into outlines with the holes that follow them.
/// `None` if a hole comes before any outline.
fn pieces(rings: &[ExportRing]) -> Option<Vec<(&[Point], Vec<Vec<Point>>)>> {
    let mut grouped: Vec<(&[Point], Vec<Vec<Point>>)> = Vec::new();
    for ring in rings {
        if ring.hole {
            grouped.last_mut()?.1.push(ring.points.clone());
        } else {
            grouped.push((&ring.points, Vec::new()));
        }
    }
    Some(grouped)
}

/// Closed XY payload in database units.
fn closed_xy(layer: LayerId, ring: &[Point], scale: f64) -> Result<Vec<i32>, GdsError> {
    let closed_len = ring.len() + 1;
    if closed_len > MAX_BOUNDARY_POINTS {
        return Err(GdsError::TooManyPoints {
            layer,
            points: ring.len(),
        });
    }
    let mut coords = Vec::with_capacity(closed_len * 2);
    for p in ring.iter().chain(ring.first()) {
        coords.push(to_db(p.x, scale)?);
        coords.push(to_db(p.y, scale)?);
    }
    Ok(coords)
}

fn to_db(value: f64, scale: f64) -> Result<i32, GdsError> {
    let scaled = (value * scale).round();
    if !scaled.is_finite() || scaled < i32::MIN as f64 || scaled > i32::MAX as f64 {
        return Err(GdsError::CoordinateOverflow { value });
    }
    Ok(scaled as i32)
}

impl<W: Write> ExportSink for GdsWriter<W> {
    type Error = GdsError;

    fn write_view(&mut self, name: &str, view: &ExportView) -> Result<(), GdsError> {
        self.write_library(&[(name, view)]).map(|_| ())
    }
}
