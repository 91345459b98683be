//! Vertical wind-speed extrapolation to hub height.
//!
//! Both laws take a target height `z` above ground, a displacement height
//! `h`, and two reference points `(h_i, v_i)` where `h_i` is measured above
//! the displacement height:
//!
//!   power law:  alpha = ln(v2/v1) / ln(h2/h1),   v(z) = v2 · ((z−h)/h2)^alpha
//!   log law:    z0 = exp((v1·ln h2 − v2·ln h1) / (v1 − v2)),
//!               A  = v2 / ln(h2/z0),              v(z) = A · ln((z−h)/z0)
//!
//! Degenerate inputs (equal speeds in the log law, non-positive speeds or
//! heights) yield non-finite values. The element-wise entry points map those
//! to `NaN`, record the cell indices and emit one warning per call; callers
//! treat `NaN` as "extrapolation undefined at this cell".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WindClassError};

/// Height above displacement height of the lower MERRA-style reference wind.
pub const REANALYSIS_LOWER_HEIGHT: f64 = 10.0;
/// Height above ground of the upper MERRA-style reference wind.
pub const REANALYSIS_UPPER_HEIGHT: f64 = 50.0;

/// Number of offending cells quoted in a warning.
const WARN_SAMPLE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtrapolationMethod {
    #[serde(rename = "powerlaw", alias = "power-law")]
    PowerLaw,
    #[serde(rename = "loglaw", alias = "log-law")]
    LogLaw,
}

impl ExtrapolationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtrapolationMethod::PowerLaw => "powerlaw",
            ExtrapolationMethod::LogLaw => "loglaw",
        }
    }

    /// Scalar extrapolation; may return a non-finite value.
    pub fn apply(self, z: f64, h: f64, hv1: HeightSpeed, hv2: HeightSpeed) -> f64 {
        match self {
            ExtrapolationMethod::PowerLaw => power_law(z, h, hv1, hv2),
            ExtrapolationMethod::LogLaw => log_law(z, h, hv1, hv2),
        }
    }
}

impl fmt::Display for ExtrapolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtrapolationMethod {
    type Err = WindClassError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "powerlaw" | "power-law" | "power_law" => Ok(ExtrapolationMethod::PowerLaw),
            "loglaw" | "log-law" | "log_law" => Ok(ExtrapolationMethod::LogLaw),
            _ => Err(WindClassError::UnknownMethod(s.to_string())),
        }
    }
}

/// A reference measurement: height above displacement height and wind speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightSpeed {
    pub height: f64,
    pub speed: f64,
}

impl HeightSpeed {
    pub fn new(height: f64, speed: f64) -> Self {
        Self { height, speed }
    }
}

pub fn power_law(z: f64, h: f64, hv1: HeightSpeed, hv2: HeightSpeed) -> f64 {
    let alpha = (hv2.speed.ln() - hv1.speed.ln()) / (hv2.height.ln() - hv1.height.ln());
    hv2.speed * ((z - h) / hv2.height).powf(alpha)
}

pub fn log_law(z: f64, h: f64, hv1: HeightSpeed, hv2: HeightSpeed) -> f64 {
    let HeightSpeed { height: h1, speed: v1 } = hv1;
    let HeightSpeed { height: h2, speed: v2 } = hv2;
    let z0 = ((v1 * h2.ln() - v2 * h1.ln()) / (v1 - v2)).exp();
    let a = v2 / (h2 / z0).ln();
    a * ((z - h) / z0).ln()
}

/// Element-wise extrapolation result.
#[derive(Debug, Clone, Default)]
pub struct ExtrapolationReport {
    /// Extrapolated speeds; `NaN` where the law is undefined.
    pub values: Vec<f64>,
    /// Indices whose result was non-finite.
    pub undefined: Vec<usize>,
}

impl ExtrapolationReport {
    pub fn is_clean(&self) -> bool {
        self.undefined.is_empty()
    }
}

/// Extrapolate every element from explicit reference pairs.
pub fn extrapolate(
    method: ExtrapolationMethod,
    z: f64,
    disph: &[f64],
    lower: &[HeightSpeed],
    upper: &[HeightSpeed],
) -> Result<ExtrapolationReport> {
    check_len("reference winds (lower)", disph.len(), lower.len())?;
    check_len("reference winds (upper)", disph.len(), upper.len())?;
    Ok(run(method, z, disph.len(), |i| (disph[i], lower[i], upper[i])))
}

/// Extrapolate reanalysis winds given 10 m above displacement height and
/// 50 m above ground, i.e. reference pairs `(10, v10)` and `(50 − h, v50)`.
pub fn extrapolate_reanalysis(
    method: ExtrapolationMethod,
    z: f64,
    disph: &[f64],
    ws10: &[f64],
    ws50: &[f64],
) -> Result<ExtrapolationReport> {
    check_len("10 m wind speed", disph.len(), ws10.len())?;
    check_len("50 m wind speed", disph.len(), ws50.len())?;
    Ok(run(method, z, disph.len(), |i| {
        let h = disph[i];
        (
            h,
            HeightSpeed::new(REANALYSIS_LOWER_HEIGHT, ws10[i]),
            HeightSpeed::new(REANALYSIS_UPPER_HEIGHT - h, ws50[i]),
        )
    }))
}

/// Horizontal wind speed from eastward and northward components.
pub fn wind_speed(u: &[f64], v: &[f64]) -> Result<Vec<f64>> {
    check_len("wind components", u.len(), v.len())?;
    Ok(u.iter().zip(v).map(|(a, b)| a.hypot(*b)).collect())
}

fn run<F>(method: ExtrapolationMethod, z: f64, n: usize, sample: F) -> ExtrapolationReport
where
    F: Fn(usize) -> (f64, HeightSpeed, HeightSpeed),
{
    let mut values = Vec::with_capacity(n);
    let mut undefined = Vec::new();
    for i in 0..n {
        let (h, hv1, hv2) = sample(i);
        let v = method.apply(z, h, hv1, hv2);
        if v.is_finite() {
            values.push(v);
        } else {
            values.push(f64::NAN);
            undefined.push(i);
        }
    }

    if !undefined.is_empty() {
        tracing::warn!(
            kind = "ExtrapolationWarning",
            %method,
            hub_height = z,
            count = undefined.len(),
            total = n,
            first = ?&undefined[..undefined.len().min(WARN_SAMPLE)],
            "extrapolation undefined at some cells, set to NaN"
        );
    }

    ExtrapolationReport { values, undefined }
}

fn check_len(what: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(WindClassError::ShapeMismatch {
            what,
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn power_law_recovers_upper_reference() {
        let hv1 = HeightSpeed::new(10.0, 5.0);
        let hv2 = HeightSpeed::new(50.0, 7.0);
        assert_relative_eq!(power_law(50.0, 0.0, hv1, hv2), 7.0, epsilon = 1e-12);
        assert_relative_eq!(power_law(10.0, 0.0, hv1, hv2), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn power_law_with_known_alpha() {
        let alpha = 1.0 / 7.0;
        let v = |z: f64| 6.0 * (z / 10.0).powf(alpha);
        let hv1 = HeightSpeed::new(10.0, v(10.0));
        let hv2 = HeightSpeed::new(40.0, v(40.0));
        // Displacement height shifts the evaluation point only.
        assert_relative_eq!(power_law(102.0, 2.0, hv1, hv2), v(100.0), max_relative = 1e-12);
    }

    #[test]
    fn log_law_recovers_upper_reference_above_displacement() {
        let h = 3.0;
        let hv1 = HeightSpeed::new(10.0, 5.0);
        let hv2 = HeightSpeed::new(47.0, 7.5);
        assert_relative_eq!(log_law(47.0 + h, h, hv1, hv2), 7.5, max_relative = 1e-12);
    }

    #[test]
    fn log_law_with_known_roughness() {
        let z0: f64 = 0.05;
        let a = 0.9;
        let v = |z: f64| a * (z / z0).ln();
        let hv1 = HeightSpeed::new(10.0, v(10.0));
        let hv2 = HeightSpeed::new(50.0, v(50.0));
        assert_relative_eq!(log_law(100.0, 0.0, hv1, hv2), v(100.0), max_relative = 1e-9);
    }

    #[test]
    fn equal_speeds_make_log_law_undefined_not_fatal() {
        let disph = [0.0, 0.0, 0.0];
        let lower = [HeightSpeed::new(10.0, 5.0), HeightSpeed::new(10.0, 6.0), HeightSpeed::new(10.0, 4.0)];
        let upper = [HeightSpeed::new(50.0, 7.0), HeightSpeed::new(50.0, 6.0), HeightSpeed::new(50.0, 6.0)];
        let report = extrapolate(ExtrapolationMethod::LogLaw, 100.0, &disph, &lower, &upper).unwrap();
        assert_eq!(report.undefined, vec![1]);
        assert!(report.values[1].is_nan());
        assert!(report.values[0].is_finite() && report.values[2].is_finite());
        assert!(!report.is_clean());
    }

    #[test]
    fn reanalysis_pairs_use_ground_referenced_upper_height() {
        let h = [5.0];
        let report =
            extrapolate_reanalysis(ExtrapolationMethod::PowerLaw, 50.0, &h, &[4.0], &[6.0]).unwrap();
        // z = 50 above ground is exactly the upper reference (45 m above h).
        assert_relative_eq!(report.values[0], 6.0, epsilon = 1e-12);
        assert!(report.is_clean());
    }

    #[test]
    fn mismatched_lengths_are_shape_errors() {
        let err = extrapolate_reanalysis(ExtrapolationMethod::LogLaw, 100.0, &[0.0, 0.0], &[1.0], &[2.0, 3.0])
            .unwrap_err();
        assert!(matches!(err, WindClassError::ShapeMismatch { .. }));
    }

    #[test]
    fn wind_speed_is_component_magnitude() {
        let s = wind_speed(&[3.0, 0.0, -6.0], &[4.0, 2.0, 8.0]).unwrap();
        assert_eq!(s, vec![5.0, 2.0, 10.0]);
    }

    #[test]
    fn method_names_roundtrip() {
        for m in [ExtrapolationMethod::PowerLaw, ExtrapolationMethod::LogLaw] {
            assert_eq!(m.to_string().parse::<ExtrapolationMethod>().unwrap(), m);
        }
        assert_eq!("log-law".parse::<ExtrapolationMethod>().unwrap(), ExtrapolationMethod::LogLaw);
        assert!("cubic".parse::<ExtrapolationMethod>().is_err());
        let m: ExtrapolationMethod = serde_json::from_str("\"power-law\"").unwrap();
        assert_eq!(m, ExtrapolationMethod::PowerLaw);
    }
}
