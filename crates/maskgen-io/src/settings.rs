use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid units: database unit {db_unit_in_m} m, user unit {user_unit_in_m} m")]
    InvalidUnits { db_unit_in_m: f64, user_unit_in_m: f64 },
}

/// Settings for writing healed devices to a CAD stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub library_name: String,
    /// Size of one device coordinate unit in meters.
    pub user_unit_in_m: f64,
    /// Size of one database grid step in meters.
    pub db_unit_in_m: f64,
    /// Drop layer 0 when the target format reserves it.
    pub skip_reserved_layer: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            library_name: "MASKGEN".to_string(),
            user_unit_in_m: 1e-6, // coordinates in µm
            db_unit_in_m: 1e-9,   // 1nm grid
            skip_reserved_layer: false,
        }
    }
}

impl ExportSettings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(self.user_unit_in_m) || !valid(self.db_unit_in_m) {
            return Err(SettingsError::InvalidUnits {
                db_unit_in_m: self.db_unit_in_m,
                user_unit_in_m: self.user_unit_in_m,
            });
        }
        Ok(())
    }

    /// Database grid steps per device coordinate unit.
    pub fn db_per_user_unit(&self) -> f64 {
        self.user_unit_in_m / self.db_unit_in_m
    }
}
