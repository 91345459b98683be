use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classes::ClassLimits;
use crate::error::{Result, WindClassError};
use crate::extrapolation::ExtrapolationMethod;
use crate::overlap::OverlapProjections;
use crate::power_curve::PowerCurveProfile;
use crate::spatial::Srid;

/// Run parameters shared by the production and classification stages.
/// Every field has a default, so a config file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Name of the region geometry source, default "nuts2006".
    pub region_table: String,
    /// Name of the grid geometry source, default "merra_grid".
    pub grid_table: String,
    /// Projection areas are measured in, default EPSG:3035.
    pub region_srid: Srid,
    /// Projection of grid coordinates, default EPSG:4326.
    pub grid_srid: Srid,
    /// Administrative level selected from the region source, default 2.
    pub region_level: u8,
    /// Hub height above ground in metres, default 100.
    pub hub_height: f64,
    pub extrapolation: ExtrapolationMethod,
    pub power_curve: PowerCurveProfile,
    pub class_limits: ClassLimits,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            region_table: "nuts2006".into(),
            grid_table: "merra_grid".into(),
            region_srid: Srid::EtrsLaea,
            grid_srid: Srid::Wgs84,
            region_level: 2,
            hub_height: 100.0,
            extrapolation: ExtrapolationMethod::PowerLaw,
            power_curve: PowerCurveProfile::Lowland,
            class_limits: ClassLimits::default(),
        }
    }
}

impl RunConfig {
    /// Read a JSON config file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            WindClassError::InvalidConfig(format!("reading {}: {e}", path.display()))
        })?;
        Self::from_json(&text).map_err(|e| match e {
            WindClassError::InvalidConfig(msg) => {
                WindClassError::InvalidConfig(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Parse and validate a JSON config. Projection codes are checked before
    /// the rest, so an unknown SRID reports as a spatial error.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| WindClassError::InvalidConfig(format!("parsing: {e}")))?;
        for key in ["region_srid", "grid_srid"] {
            let Some(raw) = value.get(key) else { continue };
            let code = raw
                .as_u64()
                .and_then(|c| u32::try_from(c).ok())
                .ok_or_else(|| {
                    WindClassError::InvalidConfig(format!("{key} must be an EPSG code, got {raw}"))
                })?;
            Srid::from_code(code)?;
        }
        let cfg: RunConfig = serde_json::from_value(value)
            .map_err(|e| WindClassError::InvalidConfig(format!("parsing: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.hub_height.is_finite() && self.hub_height > 0.0) {
            return Err(WindClassError::InvalidConfig(format!(
                "hub height must be positive, got {}",
                self.hub_height
            )));
        }
        if self.region_table.trim().is_empty() || self.grid_table.trim().is_empty() {
            return Err(WindClassError::InvalidConfig("table names must not be empty".into()));
        }
        Ok(())
    }

    pub fn projections(&self) -> OverlapProjections {
        OverlapProjections {
            area_srid: self.region_srid,
            grid_srid: self.grid_srid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.region_srid.code(), 3035);
        assert_eq!(cfg.grid_srid.code(), 4326);
        assert_eq!(cfg.hub_height, 100.0);
        assert_eq!(
            cfg.class_limits.as_slice(),
            &[0.35, 0.3, 0.25, 0.2, 0.175, 0.15, 0.125, 0.1]
        );
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: RunConfig = serde_json::from_str(
            r#"{"hub_height": 80, "extrapolation": "loglaw", "power_curve": "offshore"}"#,
        )
        .unwrap();
        assert_eq!(cfg.hub_height, 80.0);
        assert_eq!(cfg.extrapolation, ExtrapolationMethod::LogLaw);
        assert_eq!(cfg.power_curve, PowerCurveProfile::Offshore);
        assert_eq!(cfg.region_table, "nuts2006");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cfg = RunConfig { hub_height: -5.0, ..RunConfig::default() };
        assert!(matches!(cfg.validate(), Err(WindClassError::InvalidConfig(_))));
        assert!(serde_json::from_str::<RunConfig>(r#"{"region_srid": 27700}"#).is_err());
        assert!(serde_json::from_str::<RunConfig>(r#"{"class_limits": [0.1, 0.3]}"#).is_err());
        assert!(matches!(
            RunConfig::from_json(r#"{"class_limits": [0.1, 0.3]}"#),
            Err(WindClassError::InvalidConfig(_))
        ));
        assert!(matches!(
            RunConfig::from_json(r#"{"hub_height": 0}"#),
            Err(WindClassError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unsupported_srid_is_a_spatial_error() {
        let err = RunConfig::from_json(r#"{"region_srid": 27700}"#).unwrap_err();
        match err {
            WindClassError::SpatialQuery { context, .. } => assert!(context.contains("27700"), "{context}"),
            other => panic!("expected SpatialQuery, got {other:?}"),
        }
        let err = RunConfig::from_json(r#"{"grid_srid": 900913, "hub_height": 80}"#).unwrap_err();
        assert!(matches!(err, WindClassError::SpatialQuery { .. }), "{err:?}");
        assert!(matches!(
            RunConfig::from_json(r#"{"grid_srid": "wgs84"}"#),
            Err(WindClassError::InvalidConfig(_))
        ));
    }

    #[test]
    fn from_json_accepts_supported_srids() {
        let cfg = RunConfig::from_json(r#"{"region_srid": 3035, "grid_srid": 4326, "hub_height": 120.5}"#)
            .unwrap();
        assert_eq!(cfg.projections().area_srid, Srid::EtrsLaea);
        assert_eq!(cfg.hub_height, 120.5);
        assert_eq!(RunConfig::from_json("{}").unwrap(), RunConfig::default());
    }
}
