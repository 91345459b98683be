//! Wind classes: area-weighted binning of cell utilisation per region.
//!
//! Class limits are lower utilisation bounds in descending order, padded with
//! an upper sentinel 1.0 and a lower sentinel 0.0. Class `k` covers
//! `[lower_k, upper_k)`, and the top class also includes 1.0: a value equal to
//! a limit belongs to the class whose lower bound it is.
//!
//! For each region the classifier produces, per class:
//!   area        Σ area over qualifying cells
//!   utilisation Σ(area · u) / Σ area   (NaN when the class is empty)
//!   fractions   area / class area for each contributing cell
//!
//! A cell qualifies when its overlap area is positive and it has a finite
//! utilisation in [0, 1].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::area_index::{AreaIndex, RegionId};
use crate::error::{Result, WindClassError};
use crate::grid::CellId;

/// Default lower bounds of the wind classes.
pub const DEFAULT_CLASS_LIMITS: [f64; 8] = [0.35, 0.3, 0.25, 0.2, 0.175, 0.15, 0.125, 0.1];

/// Tolerance when looking up a class by its lower bound.
const BOUND_EPS: f64 = 1e-12;

// ── Class limits ──────────────────────────────────────────────────────────────

/// Strictly descending utilisation thresholds inside (0, 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct ClassLimits(Vec<f64>);

impl ClassLimits {
    pub fn new(limits: Vec<f64>) -> Result<Self> {
        if let Some(bad) = limits.iter().find(|&&l| !(l > 0.0 && l < 1.0)) {
            return Err(WindClassError::InvalidConfig(format!(
                "class limit {bad} outside the open interval (0, 1)"
            )));
        }
        if let Some(w) = limits.windows(2).find(|w| w[0] <= w[1]) {
            return Err(WindClassError::InvalidConfig(format!(
                "class limits must be strictly descending, found {} before {}",
                w[0], w[1]
            )));
        }
        Ok(Self(limits))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn num_classes(&self) -> usize {
        self.0.len() + 1
    }

    /// `[1.0, limits.., 0.0]`.
    pub fn padded(&self) -> Vec<f64> {
        let mut p = Vec::with_capacity(self.0.len() + 2);
        p.push(1.0);
        p.extend_from_slice(&self.0);
        p.push(0.0);
        p
    }

    /// Classes from highest to lowest utilisation.
    pub fn classes(&self) -> Vec<WindClass> {
        self.padded()
            .windows(2)
            .map(|w| WindClass { upper: w[0], lower: w[1] })
            .collect()
    }

    /// Lower bounds, which label the class columns.
    pub fn lower_bounds(&self) -> Vec<f64> {
        self.classes().iter().map(|c| c.lower).collect()
    }

    /// Index of the class containing `u`, or `None` outside [0, 1].
    pub fn class_of(&self, u: f64) -> Option<usize> {
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        // Descending limits: the first limit ≤ u opens the class.
        Some(self.0.iter().position(|&l| u >= l).unwrap_or(self.0.len()))
    }
}

impl Default for ClassLimits {
    fn default() -> Self {
        Self(DEFAULT_CLASS_LIMITS.to_vec())
    }
}

impl TryFrom<Vec<f64>> for ClassLimits {
    type Error = WindClassError;

    fn try_from(v: Vec<f64>) -> Result<Self> {
        ClassLimits::new(v)
    }
}

impl From<ClassLimits> for Vec<f64> {
    fn from(l: ClassLimits) -> Vec<f64> {
        l.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindClass {
    pub lower: f64,
    pub upper: f64,
}

// ── Class tables ──────────────────────────────────────────────────────────────

/// Per-cell share of each class area within one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSiteFractions {
    /// Cells overlapping the region, ascending.
    pub cells: Vec<CellId>,
    /// `fractions[cell_idx][class_idx]`; 0 where the cell does not contribute.
    pub fractions: Vec<Vec<f64>>,
}

/// Classifier output. Rows are regions, columns are classes labelled by
/// their lower bound; `areas`, `utilizations` and `site_fractions` share the
/// same row and column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassTables {
    pub regions: Vec<RegionId>,
    pub classes: Vec<f64>,
    pub areas: Vec<Vec<f64>>,
    pub utilizations: Vec<Vec<f64>>,
    pub site_fractions: Vec<RegionSiteFractions>,
}

impl ClassTables {
    fn region_idx(&self, region: &str) -> Option<usize> {
        self.regions.iter().position(|r| r == region)
    }

    fn class_idx(&self, lower: f64) -> Option<usize> {
        self.classes.iter().position(|&c| (c - lower).abs() < BOUND_EPS)
    }

    /// Area of the class with lower bound `lower` in `region`.
    pub fn area(&self, region: &str, lower: f64) -> Option<f64> {
        self.areas.get(self.region_idx(region)?)?.get(self.class_idx(lower)?).copied()
    }

    pub fn utilization(&self, region: &str, lower: f64) -> Option<f64> {
        self.utilizations.get(self.region_idx(region)?)?.get(self.class_idx(lower)?).copied()
    }

    pub fn site_fraction(&self, region: &str, cell: CellId, lower: f64) -> Option<f64> {
        let sf = self.site_fractions.get(self.region_idx(region)?)?;
        let ci = sf.cells.binary_search(&cell).ok()?;
        sf.fractions.get(ci)?.get(self.class_idx(lower)?).copied()
    }

    /// Class areas divided by each region's total overlap area. Display-only;
    /// the canonical output is the raw `areas` table.
    pub fn area_shares(&self, areas: &AreaIndex) -> Vec<Vec<f64>> {
        self.regions
            .iter()
            .zip(&self.areas)
            .map(|(region, row)| {
                let total = areas.region_area(region);
                row.iter().map(|a| a / total).collect()
            })
            .collect()
    }

    /// Verify that area and utilisation tables (and the site fractions) cover
    /// the same regions and classes in the same order.
    pub fn check_alignment(&self) -> Result<()> {
        let n_regions = self.regions.len();
        let n_classes = self.classes.len();
        let shape = |rows: &[Vec<f64>]| -> (usize, Vec<usize>) {
            (rows.len(), rows.iter().map(|r| r.len()).collect())
        };

        let (area_rows, area_cols) = shape(&self.areas);
        let (util_rows, util_cols) = shape(&self.utilizations);
        if area_rows != util_rows || area_cols != util_cols {
            return Err(WindClassError::ShapeMismatch {
                what: "class areas vs class utilizations",
                expected: format!("{area_rows} rows {area_cols:?}"),
                found: format!("{util_rows} rows {util_cols:?}"),
            });
        }
        if area_rows != n_regions || area_cols.iter().any(|&c| c != n_classes) {
            return Err(WindClassError::ShapeMismatch {
                what: "class tables vs region/class index",
                expected: format!("{n_regions} regions × {n_classes} classes"),
                found: format!("{area_rows} rows {area_cols:?}"),
            });
        }
        if self.site_fractions.len() != n_regions {
            return Err(WindClassError::ShapeMismatch {
                what: "site fractions vs regions",
                expected: n_regions.to_string(),
                found: self.site_fractions.len().to_string(),
            });
        }
        for (region, sf) in self.regions.iter().zip(&self.site_fractions) {
            if sf.fractions.len() != sf.cells.len() || sf.fractions.iter().any(|f| f.len() != n_classes) {
                return Err(WindClassError::ShapeMismatch {
                    what: "site fractions",
                    expected: format!("region {region}: {} cells × {n_classes} classes", sf.cells.len()),
                    found: format!("{} rows", sf.fractions.len()),
                });
            }
        }
        Ok(())
    }
}

// ── Classification ────────────────────────────────────────────────────────────

/// Utilisation of `cell`, or `None` when missing or outside [0, 1].
fn cell_utilization(utilization: &[f64], cell: CellId) -> Option<f64> {
    utilization.get(cell).copied().filter(|u| (0.0..=1.0).contains(u))
}

/// Bin cells into utilisation classes for every region in `areas`.
///
/// `utilization` is indexed by [`CellId`]; `NaN` or an index past its end
/// marks the cell as missing.
pub fn classify(areas: &AreaIndex, utilization: &[f64], limits: &ClassLimits) -> Result<ClassTables> {
    let n_classes = limits.num_classes();
    let classes = limits.lower_bounds();
    tracing::info!(
        regions = areas.num_regions(),
        classes = n_classes,
        "calculating areas in each class for each region"
    );

    let mut tables = ClassTables {
        regions: Vec::with_capacity(areas.num_regions()),
        classes,
        areas: Vec::with_capacity(areas.num_regions()),
        utilizations: Vec::with_capacity(areas.num_regions()),
        site_fractions: Vec::with_capacity(areas.num_regions()),
    };

    let mut out_of_range = 0usize;
    for (region, cells) in areas.iter() {
        let mut class_area = vec![0.0f64; n_classes];
        let mut weighted = vec![0.0f64; n_classes];
        let mut membership: Vec<Option<usize>> = Vec::with_capacity(cells.len());
        let mut excluded = 0usize;

        for (&cell, &area) in cells {
            if cell >= utilization.len() {
                out_of_range += 1;
            }
            let class = match cell_utilization(utilization, cell) {
                Some(u) if area > 0.0 => limits.class_of(u).map(|k| (k, u)),
                _ => None,
            };
            match class {
                Some((k, u)) => {
                    class_area[k] += area;
                    weighted[k] += area * u;
                    membership.push(Some(k));
                }
                None => {
                    excluded += 1;
                    membership.push(None);
                }
            }
        }

        let class_util: Vec<f64> = class_area
            .iter()
            .zip(&weighted)
            .map(|(&a, &w)| if a > 0.0 { w / a } else { f64::NAN })
            .collect();

        let fractions: Vec<Vec<f64>> = cells
            .values()
            .zip(&membership)
            .map(|(&area, member)| {
                let mut row = vec![0.0f64; n_classes];
                if let Some(k) = *member {
                    row[k] = area / class_area[k];
                }
                row
            })
            .collect();

        tracing::debug!(
            region = %region,
            cells = cells.len(),
            excluded,
            "classified region"
        );

        tables.regions.push(region.clone());
        tables.areas.push(class_area);
        tables.utilizations.push(class_util);
        tables.site_fractions.push(RegionSiteFractions {
            cells: cells.keys().copied().collect(),
            fractions,
        });
    }

    if out_of_range > 0 {
        tracing::warn!(
            count = out_of_range,
            utilization_len = utilization.len(),
            "area index references cells beyond the utilization vector; treated as missing"
        );
    }

    tables.check_alignment()?;
    Ok(tables)
}

// ── Area / fraction (no classing) ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteShare {
    pub cell: CellId,
    pub area: f64,
    /// `area / Σ area` over the region's cells.
    pub fraction: f64,
}

/// Per-region cell areas and each cell's share of the region's total.
pub fn site_areas_fractions(areas: &AreaIndex) -> BTreeMap<RegionId, Vec<SiteShare>> {
    areas
        .iter()
        .map(|(region, cells)| {
            let total: f64 = cells.values().sum();
            let shares = cells
                .iter()
                .map(|(&cell, &area)| SiteShare {
                    cell,
                    area,
                    fraction: area / total,
                })
                .collect();
            (region.clone(), shares)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn index(entries: &[(&str, CellId, f64)]) -> AreaIndex {
        let mut idx = AreaIndex::new();
        for &(r, c, a) in entries {
            idx.insert(r, c, a).unwrap();
        }
        idx
    }

    /// Deterministic LCG in [0, 1).
    fn lcg(state: &mut u64) -> f64 {
        *state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (*state >> 11) as f64 / (1u64 << 53) as f64
    }

    #[test]
    fn three_cell_scenario() {
        let areas = index(&[("R", 0, 10.0), ("R", 1, 20.0), ("R", 2, 30.0)]);
        let util = [0.5, 0.2, 0.12];
        let limits = ClassLimits::new(vec![0.3, 0.15]).unwrap();
        let t = classify(&areas, &util, &limits).unwrap();

        assert_eq!(t.classes, vec![0.3, 0.15, 0.0]);
        assert_eq!(t.area("R", 0.3), Some(10.0));
        assert_eq!(t.area("R", 0.15), Some(20.0));
        assert_eq!(t.area("R", 0.0), Some(30.0));
        assert_relative_eq!(t.utilization("R", 0.3).unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(t.utilization("R", 0.15).unwrap(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(t.utilization("R", 0.0).unwrap(), 0.12, epsilon = 1e-12);
        assert_eq!(t.site_fraction("R", 0, 0.3), Some(1.0));
        assert_eq!(t.site_fraction("R", 1, 0.15), Some(1.0));
        assert_eq!(t.site_fraction("R", 2, 0.0), Some(1.0));
        assert_eq!(t.site_fraction("R", 0, 0.0), Some(0.0));
    }

    #[test]
    fn utilization_is_area_weighted() {
        let areas = index(&[("R", 0, 1.0), ("R", 1, 3.0)]);
        let t = classify(&areas, &[0.4, 0.8], &ClassLimits::new(vec![0.35]).unwrap()).unwrap();
        let u = t.utilization("R", 0.35).unwrap();
        assert!((u - 0.7).abs() < 1e-12, "area-weighted mean should be 0.7, got {u}");
        assert!((t.site_fraction("R", 1, 0.35).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn empty_class_has_zero_area_and_nan_utilization() {
        let areas = index(&[("R", 0, 5.0)]);
        let t = classify(&areas, &[0.9], &ClassLimits::default()).unwrap();
        assert_eq!(t.area("R", 0.1), Some(0.0));
        assert!(t.utilization("R", 0.1).unwrap().is_nan());
        assert_eq!(t.area("R", 0.35), Some(5.0));
    }

    #[test]
    fn boundary_value_belongs_to_class_it_opens() {
        let limits = ClassLimits::new(vec![0.3, 0.15]).unwrap();
        assert_eq!(limits.class_of(0.3), Some(0));
        assert_eq!(limits.class_of(0.15), Some(1));
        assert_eq!(limits.class_of(1.0), Some(0));
        assert_eq!(limits.class_of(0.0), Some(2));
        assert_eq!(limits.class_of(0.2999), Some(1));
        assert_eq!(limits.class_of(1.01), None);
        assert_eq!(limits.class_of(f64::NAN), None);
    }

    #[test]
    fn non_qualifying_cells_are_excluded() {
        // cell 0: zero area, cell 1: NaN utilisation, cell 7: beyond vector.
        let areas = index(&[("R", 0, 0.0), ("R", 1, 4.0), ("R", 2, 6.0), ("R", 7, 9.0)]);
        let util = [0.5, f64::NAN, 0.5];
        let t = classify(&areas, &util, &ClassLimits::default()).unwrap();
        let total: f64 = t.areas[0].iter().sum();
        assert_eq!(total, 6.0);
        assert_eq!(t.site_fraction("R", 2, 0.35), Some(1.0));
        for cell in [0, 1, 7] {
            for &lower in &t.classes {
                assert_eq!(
                    t.site_fraction("R", cell, lower),
                    Some(0.0),
                    "excluded cell {cell} must not contribute to class {lower}"
                );
            }
        }
    }

    #[test]
    fn conservation_fractions_and_bounds_hold_on_random_data() {
        let mut s = 7u64;
        let n_cells = 200;
        let util: Vec<f64> = (0..n_cells).map(|_| lcg(&mut s) * 0.5).collect();
        let mut areas = AreaIndex::new();
        for r in 0..5 {
            for c in 0..n_cells {
                if lcg(&mut s) < 0.4 {
                    areas.insert(&format!("R{r}"), c, lcg(&mut s) * 1e6).unwrap();
                }
            }
        }
        let limits = ClassLimits::default();
        let t = classify(&areas, &util, &limits).unwrap();
        let classes = limits.classes();

        for (ri, region) in t.regions.iter().enumerate() {
            let cells = areas.cells(region).unwrap();
            let qualifying: f64 = cells.values().filter(|&&a| a > 0.0).sum();
            let classed: f64 = t.areas[ri].iter().sum();
            assert!(
                (classed - qualifying).abs() <= 1e-9 * qualifying,
                "{region}: classed {classed} vs qualifying {qualifying}"
            );

            for (k, class) in classes.iter().enumerate() {
                let sf = &t.site_fractions[ri];
                let sum: f64 = sf.fractions.iter().map(|row| row[k]).sum();
                if t.areas[ri][k] > 0.0 {
                    assert!((sum - 1.0).abs() < 1e-9, "{region} class {}: fractions sum {sum}", class.lower);

                    let members: Vec<f64> = sf
                        .cells
                        .iter()
                        .zip(&sf.fractions)
                        .filter(|(_, row)| row[k] > 0.0)
                        .map(|(&c, _)| util[c])
                        .collect();
                    let lo = members.iter().cloned().fold(f64::INFINITY, f64::min);
                    let hi = members.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                    let u = t.utilizations[ri][k];
                    assert!(u >= lo - 1e-12 && u <= hi + 1e-12, "class util {u} outside [{lo}, {hi}]");
                    assert!(lo >= class.lower && hi <= class.upper);
                } else {
                    assert_eq!(sum, 0.0);
                    assert!(t.utilizations[ri][k].is_nan());
                }
            }
        }
    }

    #[test]
    fn drifted_tables_are_shape_mismatch() {
        let areas = index(&[("A", 0, 1.0), ("B", 1, 1.0)]);
        let mut t = classify(&areas, &[0.2, 0.3], &ClassLimits::default()).unwrap();
        t.utilizations[1].pop();
        let err = t.check_alignment().unwrap_err();
        assert!(matches!(err, WindClassError::ShapeMismatch { .. }), "got {err:?}");

        let mut t = classify(&areas, &[0.2, 0.3], &ClassLimits::default()).unwrap();
        t.areas.pop();
        t.utilizations.pop();
        assert!(t.check_alignment().is_err(), "dropping a region row must be detected");
    }

    #[test]
    fn class_limits_are_validated() {
        assert!(ClassLimits::new(vec![0.3, 0.3]).is_err());
        assert!(ClassLimits::new(vec![0.2, 0.3]).is_err());
        assert!(ClassLimits::new(vec![1.0, 0.3]).is_err());
        assert!(ClassLimits::new(vec![0.3, 0.0]).is_err());
        assert!(ClassLimits::new(vec![]).is_ok());
        assert_eq!(ClassLimits::default().num_classes(), 9);
        assert!(serde_json::from_str::<ClassLimits>("[0.1, 0.2]").is_err());
    }

    #[test]
    fn area_shares_normalise_by_region_area() {
        let areas = index(&[("R", 0, 10.0), ("R", 1, 30.0)]);
        let t = classify(&areas, &[0.5, 0.05], &ClassLimits::new(vec![0.3]).unwrap()).unwrap();
        let shares = t.area_shares(&areas);
        assert_eq!(shares[0], vec![0.25, 0.75]);
    }

    #[test]
    fn site_fractions_sum_to_one_per_region() {
        let areas = index(&[("A", 0, 1.0), ("A", 1, 3.0), ("B", 1, 2.0)]);
        let out = site_areas_fractions(&areas);
        let a = &out["A"];
        assert_eq!(a.len(), 2);
        assert_eq!(a[0], SiteShare { cell: 0, area: 1.0, fraction: 0.25 });
        assert_eq!(a[1].fraction, 0.75);
        assert_eq!(out["B"][0].fraction, 1.0);
    }
}
