/// Classes tool: groups per-cell utilisation into classes per region.
///
/// Reads an area index (from `intersect`) and a production output (from
/// `production`), averages power output over time per cell and writes the
/// class area, class utilisation and site fraction tables. With
/// `--areas-only` it writes the per-region cell areas and area fractions.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use windclass_core::area_index::GriddedAreas;
use windclass_core::classes::{classify, site_areas_fractions, ClassLimits, ClassTables};
use windclass_core::config::RunConfig;
use windclass_core::production::ProductionOutput;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "classes", about = "Area-weighted wind utilisation classes per region")]
struct Args {
    /// Area index JSON written by `intersect`
    #[arg(long)]
    areas: PathBuf,

    /// Production output JSON written by `production`
    #[arg(long, required_unless_present = "areas_only")]
    production: Option<PathBuf>,

    /// Output path
    #[arg(short, long, default_value = "classes.json")]
    output: PathBuf,

    /// JSON run configuration (class limits)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write only cell areas and area fractions per region
    #[arg(long)]
    areas_only: bool,

    /// Log debug-level events
    #[arg(long)]
    debug: bool,
}

/// Class tables plus the display-only normalised class areas.
#[derive(Serialize)]
struct ClassReport<'a> {
    limits: &'a ClassLimits,
    year: &'a str,
    #[serde(flatten)]
    tables: &'a ClassTables,
    area_shares: Vec<Vec<f64>>,
}

fn init_logging(debug: bool) {
    let level = if debug { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let cfg = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    let stored: GriddedAreas = read_json(&args.areas)?;
    let areas = &stored.areas;
    if areas.is_empty() {
        tracing::warn!(path = %args.areas.display(), "area index has no regions");
    }

    let json = if args.areas_only {
        serde_json::to_string_pretty(&site_areas_fractions(areas))?
    } else {
        let Some(production_path) = &args.production else {
            bail!("--production is required unless --areas-only is given");
        };
        let output: ProductionOutput = read_json(production_path)?;
        let utilization = output
            .utilization_on(stored.grid)
            .with_context(|| format!("{} does not match {}", production_path.display(), args.areas.display()))?;

        let tables = classify(areas, &utilization, &cfg.class_limits).context("Classification failed")?;
        let report = ClassReport {
            limits: &cfg.class_limits,
            year: &output.year,
            area_shares: tables.area_shares(areas),
            tables: &tables,
        };
        serde_json::to_string_pretty(&report)?
    };

    fs::write(&args.output, json).with_context(|| format!("Cannot write {}", args.output.display()))?;
    tracing::info!(path = %args.output.display(), "wrote class tables");
    Ok(())
}
