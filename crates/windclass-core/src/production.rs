//! Wind power production for one reanalysis unit (one source file / year).
//!
//! Per unit: wind components → speed magnitude → hub-height extrapolation →
//! power curve. Units are independent; [`run_batch`] processes a sorted list
//! of them one at a time, handing each output on as soon as it is produced
//! and logging and skipping units that fail.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::error::{Result, WindClassError};
use crate::extrapolation::{extrapolate_reanalysis, wind_speed, ExtrapolationMethod};
use crate::grid::GridShape;
use crate::power_curve::PowerCurveProfile;

/// Data source tag used in artifact names.
pub const SOURCE_TAG: &str = "merra";

/// Gridded reanalysis fields for one unit. Field arrays are row-major
/// `[time][latitude][longitude]`, so each time slice flattens to cell ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReanalysisUnit {
    pub latitude: Vec<f64>,
    pub longitude: Vec<f64>,
    pub time: Vec<f64>,
    /// Displacement height (m).
    #[serde(with = "null_as_nan")]
    pub disph: Vec<f64>,
    /// Eastward / northward wind 10 m above displacement height.
    #[serde(with = "null_as_nan")]
    pub u10m: Vec<f64>,
    #[serde(with = "null_as_nan")]
    pub v10m: Vec<f64>,
    /// Eastward / northward wind 50 m above ground.
    #[serde(with = "null_as_nan")]
    pub u50m: Vec<f64>,
    #[serde(with = "null_as_nan")]
    pub v50m: Vec<f64>,
}

impl ReanalysisUnit {
    pub fn num_cells(&self) -> usize {
        self.latitude.len() * self.longitude.len()
    }

    fn check_shapes(&self) -> Result<()> {
        let expected = self.time.len() * self.num_cells();
        for (what, field) in [
            ("disph", &self.disph),
            ("u10m", &self.u10m),
            ("v10m", &self.v10m),
            ("u50m", &self.u50m),
            ("v50m", &self.v50m),
        ] {
            if field.len() != expected {
                return Err(WindClassError::ShapeMismatch {
                    what,
                    expected: format!(
                        "{expected} ({} times × {} lat × {} lon)",
                        self.time.len(),
                        self.latitude.len(),
                        self.longitude.len()
                    ),
                    found: field.len().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Extrapolated wind speed and power output for one unit, tagged with the
/// parameters that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionOutput {
    pub year: String,
    pub method: ExtrapolationMethod,
    pub hub_height: f64,
    pub power_curve: PowerCurveProfile,
    pub latitude: Vec<f64>,
    pub longitude: Vec<f64>,
    pub time: Vec<f64>,
    /// Wind speed at hub height, `[time][lat][lon]`.
    #[serde(with = "null_as_nan")]
    pub wind_speed: Vec<f64>,
    /// Power output fraction, `[time][lat][lon]`.
    #[serde(with = "null_as_nan")]
    pub power_output: Vec<f64>,
    /// Number of samples where extrapolation was undefined.
    pub undefined_samples: usize,
}

impl ProductionOutput {
    pub fn num_cells(&self) -> usize {
        self.latitude.len() * self.longitude.len()
    }

    /// Time-mean power output per cell, indexed by cell id. Undefined
    /// samples are skipped; a cell with no defined sample is `NaN`.
    pub fn mean_utilization(&self) -> Vec<f64> {
        let n = self.num_cells();
        let mut sum = vec![0.0f64; n];
        let mut count = vec![0usize; n];
        if n > 0 {
            for slice in self.power_output.chunks_exact(n) {
                for (i, &p) in slice.iter().enumerate() {
                    if p.is_finite() {
                        sum[i] += p;
                        count[i] += 1;
                    }
                }
            }
        }
        sum.iter()
            .zip(&count)
            .map(|(&s, &c)| if c > 0 { s / c as f64 } else { f64::NAN })
            .collect()
    }

    pub fn artifact_name(&self) -> String {
        artifact_name(self.method, self.hub_height, self.power_curve, &self.year)
    }

    pub fn grid_shape(&self) -> GridShape {
        GridShape {
            nrows: self.latitude.len(),
            ncols: self.longitude.len(),
        }
    }

    /// [`Self::mean_utilization`] for cell ids of a grid with shape `grid`.
    /// Equal cell counts are not enough: a transposed grid would pair every
    /// cell with the wrong value, so the shapes must match exactly.
    pub fn utilization_on(&self, grid: GridShape) -> Result<Vec<f64>> {
        let own = self.grid_shape();
        if own != grid {
            return Err(WindClassError::ShapeMismatch {
                what: "production grid vs area index grid",
                expected: grid.to_string(),
                found: own.to_string(),
            });
        }
        Ok(self.mean_utilization())
    }
}

/// `windpower_output.merra.{method}.{hub}m.{profile}.{year}.json`; every
/// parameter that changes the output is part of the name. The hub height is
/// written in shortest round-trip form: `100m`, `100.7m`.
pub fn artifact_name(
    method: ExtrapolationMethod,
    hub_height: f64,
    profile: PowerCurveProfile,
    year: &str,
) -> String {
    format!("windpower_output.{SOURCE_TAG}.{method}.{hub_height}m.{profile}.{year}.json")
}

/// Compute production for one unit.
pub fn produce(unit: &ReanalysisUnit, year: &str, cfg: &RunConfig) -> Result<ProductionOutput> {
    unit.check_shapes()?;
    tracing::info!(year, samples = unit.disph.len(), "calculating and extrapolating");

    let ws10 = wind_speed(&unit.u10m, &unit.v10m)?;
    let ws50 = wind_speed(&unit.u50m, &unit.v50m)?;
    let report = extrapolate_reanalysis(cfg.extrapolation, cfg.hub_height, &unit.disph, &ws10, &ws50)?;

    tracing::info!(year, profile = %cfg.power_curve, "applying power curve");
    let power_output = cfg.power_curve.apply(&report.values);

    Ok(ProductionOutput {
        year: year.to_string(),
        method: cfg.extrapolation,
        hub_height: cfg.hub_height,
        power_curve: cfg.power_curve,
        latitude: unit.latitude.clone(),
        longitude: unit.longitude.clone(),
        time: unit.time.clone(),
        undefined_samples: report.undefined.len(),
        wind_speed: report.values,
        power_output,
    })
}

/// Sample arrays carry `NaN` for undefined values; JSON has no NaN, so they
/// are written as `null` and read back as `NaN`.
mod null_as_nan {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(values.len()))?;
        for v in values {
            seq.serialize_element(&Some(*v).filter(|v| v.is_finite()))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        let values: Vec<Option<f64>> = Vec::deserialize(d)?;
        Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

// ── Batch over source files ───────────────────────────────────────────────────

/// A source file and the year parsed from its name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    pub path: PathBuf,
    pub year: String,
}

/// Year from a `<name>.<YYYY>.<ext>` file name.
pub fn parse_year(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let mut parts = name.split('.');
    let _stem = parts.next().filter(|s| !s.is_empty())?;
    let year = parts.next()?;
    parts.next()?;
    (year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit())).then(|| year.to_string())
}

/// Sort candidate paths and keep those whose name carries a year.
pub fn discover_sources<I>(paths: I) -> Vec<SourceFile>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut paths: Vec<PathBuf> = paths.into_iter().collect();
    paths.sort();
    if paths.is_empty() {
        tracing::warn!(kind = "MissingSourceDataWarning", "no source files found");
    }
    paths
        .into_iter()
        .filter_map(|path| match parse_year(&path) {
            Some(year) => Some(SourceFile { path, year }),
            None => {
                tracing::warn!(
                    kind = "MissingSourceDataWarning",
                    path = %path.display(),
                    "could not extract year from file name, skipping"
                );
                None
            }
        })
        .collect()
}

/// Load, process and hand each unit's output to `sink` as soon as it is
/// ready; nothing is kept once the sink returns. A unit that fails to load,
/// compute or sink is logged and skipped without affecting the others.
/// Returns the sources whose output reached the sink, in `sources` order.
pub fn run_batch<L, E, S, W>(sources: &[SourceFile], cfg: &RunConfig, load: L, sink: S) -> Vec<SourceFile>
where
    L: Fn(&Path) -> std::result::Result<ReanalysisUnit, E> + Sync,
    E: Display,
    S: Fn(&SourceFile, &ProductionOutput) -> std::result::Result<(), W> + Sync,
    W: Display,
{
    let skip = |src: &SourceFile, error: &dyn Display, msg: &str| {
        tracing::warn!(
            kind = "MissingSourceDataWarning",
            path = %src.path.display(),
            year = %src.year,
            error = %error,
            "{msg}, skipping"
        );
    };

    let process = |src: &SourceFile| -> bool {
        let unit = match load(&src.path) {
            Ok(unit) => unit,
            Err(e) => {
                skip(src, &e, "could not read source unit");
                return false;
            }
        };
        let output = match produce(&unit, &src.year, cfg) {
            Ok(out) => out,
            Err(e) => {
                skip(src, &e, "source unit rejected");
                return false;
            }
        };
        drop(unit);
        match sink(src, &output) {
            Ok(()) => true,
            Err(e) => {
                skip(src, &e, "could not store production output");
                false
            }
        }
    };

    #[cfg(feature = "threading")]
    let delivered: Vec<bool> = {
        use rayon::prelude::*;
        sources.par_iter().map(process).collect()
    };
    #[cfg(not(feature = "threading"))]
    let delivered: Vec<bool> = sources.iter().map(process).collect();

    sources
        .iter()
        .zip(delivered)
        .filter_map(|(src, ok)| ok.then(|| src.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// 2 times × 1 lat × 2 lon, constant displacement height 0.
    fn unit() -> ReanalysisUnit {
        ReanalysisUnit {
            latitude: vec![55.0],
            longitude: vec![8.0, 8.625],
            time: vec![0.0, 60.0],
            disph: vec![0.0; 4],
            u10m: vec![3.0, 6.0, 3.0, 6.0],
            v10m: vec![4.0, 0.0, 4.0, 0.0],
            u50m: vec![7.0, 6.0, 7.0, 6.0],
            v50m: vec![0.0, 0.0, 0.0, 0.0],
        }
    }

    #[test]
    fn produce_tags_and_bounds_output() {
        let cfg = RunConfig::default();
        let out = produce(&unit(), "2012", &cfg).unwrap();
        assert_eq!(out.wind_speed.len(), 4);
        assert!(out.power_output.iter().all(|p| (0.0..=1.0).contains(p)));
        assert_eq!(out.undefined_samples, 0);
        assert_eq!(out.artifact_name(), "windpower_output.merra.powerlaw.100m.lowland.2012.json");
        // 5 → 7 m/s between 10 and 50 m gives > 7 m/s at 100 m.
        assert!(out.wind_speed[0] > 7.0);
    }

    #[test]
    fn log_law_equal_speeds_are_counted_not_fatal() {
        let cfg = RunConfig {
            extrapolation: ExtrapolationMethod::LogLaw,
            ..RunConfig::default()
        };
        let out = produce(&unit(), "2013", &cfg).unwrap();
        // Second cell has 6 m/s at both heights.
        assert_eq!(out.undefined_samples, 2);
        assert!(out.wind_speed[1].is_nan() && out.power_output[1].is_nan());
        let mean = out.mean_utilization();
        assert!(mean[0].is_finite());
        assert!(mean[1].is_nan(), "cell without defined samples has no utilization");
    }

    #[test]
    fn mean_utilization_skips_undefined_samples() {
        let out = ProductionOutput {
            year: "2000".into(),
            method: ExtrapolationMethod::PowerLaw,
            hub_height: 100.0,
            power_curve: PowerCurveProfile::Lowland,
            latitude: vec![0.0],
            longitude: vec![0.0, 1.0],
            time: vec![0.0, 1.0, 2.0],
            wind_speed: vec![0.0; 6],
            power_output: vec![0.2, 0.5, f64::NAN, 0.7, 0.4, 0.9],
            undefined_samples: 1,
        };
        let mean = out.mean_utilization();
        assert!((mean[0] - 0.3).abs() < 1e-12);
        assert!((mean[1] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn undefined_samples_survive_json() {
        let cfg = RunConfig {
            extrapolation: ExtrapolationMethod::LogLaw,
            ..RunConfig::default()
        };
        let out = produce(&unit(), "2013", &cfg).unwrap();
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("null"), "NaN should be written as null");
        let back: ProductionOutput = serde_json::from_str(&json).unwrap();
        assert!(back.power_output[1].is_nan());
        assert!((back.power_output[0] - out.power_output[0]).abs() < 1e-12);
    }

    #[test]
    fn utilization_requires_the_same_grid_shape() {
        let out = ProductionOutput {
            year: "2000".into(),
            method: ExtrapolationMethod::PowerLaw,
            hub_height: 100.0,
            power_curve: PowerCurveProfile::Lowland,
            latitude: vec![50.0, 50.5, 51.0],
            longitude: vec![8.0, 8.625, 9.25, 9.875],
            time: vec![0.0],
            wind_speed: vec![0.0; 12],
            power_output: (0..12).map(|i| i as f64 / 12.0).collect(),
            undefined_samples: 0,
        };
        let same = out.utilization_on(GridShape { nrows: 3, ncols: 4 }).unwrap();
        assert_eq!(same.len(), 12);

        // Same cell count, transposed: ids would silently point at other cells.
        let err = out.utilization_on(GridShape { nrows: 4, ncols: 3 }).unwrap_err();
        assert!(matches!(err, WindClassError::ShapeMismatch { .. }), "got {err:?}");
    }

    #[test]
    fn shape_mismatch_names_the_field() {
        let mut u = unit();
        u.v50m.pop();
        let err = produce(&u, "2012", &RunConfig::default()).unwrap_err();
        assert!(err.to_string().contains("v50m"), "{err}");
    }

    #[test]
    fn artifact_names_differ_by_parameters() {
        let a = artifact_name(ExtrapolationMethod::PowerLaw, 100.0, PowerCurveProfile::Lowland, "2012");
        let b = artifact_name(ExtrapolationMethod::LogLaw, 100.0, PowerCurveProfile::Lowland, "2012");
        let c = artifact_name(ExtrapolationMethod::PowerLaw, 80.0, PowerCurveProfile::Offshore, "2012");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(c, "windpower_output.merra.powerlaw.80m.offshore.2012.json");
    }

    #[test]
    fn fractional_hub_heights_do_not_collide() {
        let whole = artifact_name(ExtrapolationMethod::PowerLaw, 100.0, PowerCurveProfile::Lowland, "2012");
        let frac = artifact_name(ExtrapolationMethod::PowerLaw, 100.7, PowerCurveProfile::Lowland, "2012");
        assert_ne!(whole, frac, "hub heights 100 and 100.7 must be tagged differently");
        assert_eq!(whole, "windpower_output.merra.powerlaw.100m.lowland.2012.json");
        assert_eq!(frac, "windpower_output.merra.powerlaw.100.7m.lowland.2012.json");
    }

    #[test]
    fn year_is_parsed_from_file_name() {
        assert_eq!(parse_year(Path::new("/data/merra.2012.json")), Some("2012".into()));
        assert_eq!(parse_year(Path::new("MERRA300.1999.hdf")), Some("1999".into()));
        assert_eq!(parse_year(Path::new("merra.json")), None);
        assert_eq!(parse_year(Path::new("merra.12.json")), None);
    }

    #[test]
    fn batch_skips_bad_units_and_keeps_order() {
        let sources = discover_sources(vec![
            PathBuf::from("b.2013.json"),
            PathBuf::from("a.2012.json"),
            PathBuf::from("noyear.json"),
            PathBuf::from("c.2014.json"),
        ]);
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].year, "2012");

        let written = Mutex::new(Vec::new());
        let out = run_batch(
            &sources,
            &RunConfig::default(),
            |p: &Path| {
                if p.ends_with("b.2013.json") {
                    Err("corrupt file")
                } else {
                    Ok(unit())
                }
            },
            |src: &SourceFile, output: &ProductionOutput| -> std::result::Result<(), String> {
                written.lock().unwrap().push(format!("{}:{}", src.year, output.artifact_name()));
                Ok(())
            },
        );
        let years: Vec<&str> = out.iter().map(|s| s.year.as_str()).collect();
        assert_eq!(years, vec!["2012", "2014"]);
        assert_eq!(written.into_inner().unwrap().len(), 2);
    }

    #[test]
    fn failing_sink_skips_only_that_unit() {
        let sources = discover_sources(vec![
            PathBuf::from("m.2012.json"),
            PathBuf::from("m.2013.json"),
            PathBuf::from("m.2014.json"),
        ]);
        let written = Mutex::new(Vec::new());
        let out = run_batch(
            &sources,
            &RunConfig::default(),
            |_: &Path| -> std::result::Result<ReanalysisUnit, String> { Ok(unit()) },
            |src: &SourceFile, _: &ProductionOutput| {
                if src.year == "2013" {
                    return Err("disk full");
                }
                written.lock().unwrap().push(src.year.clone());
                Ok(())
            },
        );
        let years: Vec<&str> = out.iter().map(|s| s.year.as_str()).collect();
        assert_eq!(years, vec!["2012", "2014"], "units after a failed write must still be stored");
        let mut stored = written.into_inner().unwrap();
        stored.sort();
        assert_eq!(stored, vec!["2012", "2014"]);
    }
}
