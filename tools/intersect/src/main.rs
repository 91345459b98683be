/// Intersect tool: overlap areas between a regular reanalysis grid and
/// administrative regions, written as a sparse region → cell → area index with the grid shape.
///
/// Grid file:    {"x": [lon...], "y": [lat...]}   (cell centres, uniform spacing)
/// Regions file: [{"code": "DE11", "level": 2, "srid": 3035,
///                 "polygons": [[[[x, y], ...], <holes>...], ...]}, ...]
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use geo::{LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use windclass_core::area_index::GriddedAreas;
use windclass_core::config::RunConfig;
use windclass_core::grid::build_grid;
use windclass_core::overlap::{compute_overlaps, level_filter, Region};
use windclass_core::spatial::{GeoEngine, Srid};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "intersect", about = "Compute grid-cell / region overlap areas")]
struct Args {
    /// Grid coordinate vectors (JSON); defaults to `<data-dir>/<grid_table>.json`
    #[arg(long)]
    grid: Option<PathBuf>,

    /// Region polygons (JSON); defaults to `<data-dir>/<region_table>.json`
    #[arg(long)]
    regions: Option<PathBuf>,

    /// Directory holding the configured grid and region tables
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Output path for the area index
    #[arg(short, long, default_value = "areas.json")]
    output: PathBuf,

    /// JSON run configuration (projections, region level)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Administrative level to keep; overrides the configuration
    #[arg(long)]
    level: Option<u8>,

    /// Log debug-level events
    #[arg(long)]
    debug: bool,
}

// ── JSON schema ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct GridFile {
    x: Vec<f64>,
    y: Vec<f64>,
}

#[derive(Deserialize)]
struct RegionDef {
    code: String,
    level: u8,
    srid: Srid,
    /// Polygons as lists of rings; the first ring is the exterior.
    polygons: Vec<Vec<Vec<[f64; 2]>>>,
}

impl RegionDef {
    fn into_region(self) -> Region {
        let polygons = self
            .polygons
            .into_iter()
            .filter_map(|rings| {
                let mut rings = rings.into_iter().map(LineString::from);
                let exterior = rings.next()?;
                Some(Polygon::new(exterior, rings.collect()))
            })
            .collect();
        Region {
            code: self.code,
            level: self.level,
            srid: self.srid,
            geometry: MultiPolygon::new(polygons),
        }
    }
}

fn init_logging(debug: bool) {
    let level = if debug { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let cfg = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    let level = args.level.unwrap_or(cfg.region_level);
    let grid_path = args
        .grid
        .clone()
        .unwrap_or_else(|| args.data_dir.join(format!("{}.json", cfg.grid_table)));
    let regions_path = args
        .regions
        .clone()
        .unwrap_or_else(|| args.data_dir.join(format!("{}.json", cfg.region_table)));

    let grid_text = fs::read_to_string(&grid_path)
        .with_context(|| format!("Cannot read {}", grid_path.display()))?;
    let grid_file: GridFile = serde_json::from_str(&grid_text)
        .with_context(|| format!("Failed to parse {}", grid_path.display()))?;
    let grid = build_grid(&grid_file.x, &grid_file.y).context("Grid coordinates rejected")?;

    let regions_text = fs::read_to_string(&regions_path)
        .with_context(|| format!("Cannot read {}", regions_path.display()))?;
    let defs: Vec<RegionDef> = serde_json::from_str(&regions_text)
        .with_context(|| format!("Failed to parse {}", regions_path.display()))?;
    let regions: Vec<Region> = defs.into_iter().map(RegionDef::into_region).collect();

    tracing::info!(
        grid = %grid_path.display(),
        regions = %regions_path.display(),
        cells = grid.len(),
        region_count = regions.len(),
        level,
        "intersecting"
    );

    let areas = compute_overlaps(&GeoEngine, &regions, level_filter(level), &grid, cfg.projections())
        .context("Overlap computation failed")?;

    let stored = GriddedAreas {
        grid: grid.shape(),
        areas,
    };
    let json = serde_json::to_string_pretty(&stored)?;
    fs::write(&args.output, json)
        .with_context(|| format!("Cannot write {}", args.output.display()))?;
    tracing::info!(
        regions = stored.areas.num_regions(),
        path = %args.output.display(),
        "wrote area index"
    );
    Ok(())
}
