/// Production tool: reads reanalysis units (`<name>.<YYYY>.json`) from a
/// source directory, extrapolates winds to hub height, applies a power curve
/// and writes one tagged output file per unit.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use windclass_core::config::RunConfig;
use windclass_core::extrapolation::ExtrapolationMethod;
use windclass_core::power_curve::PowerCurveProfile;
use windclass_core::production::{discover_sources, run_batch, ProductionOutput, ReanalysisUnit, SourceFile};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "production",
    about = "Extrapolate reanalysis winds to hub height and compute power output"
)]
struct Args {
    /// Directory containing reanalysis units (*.YYYY.json)
    source: PathBuf,

    /// Output directory (created if absent)
    dest: PathBuf,

    /// Power curve profile: lowland, upland/highland, offshore (tw_ prefix accepted)
    #[arg(short, long)]
    powercurve: Option<PowerCurveProfile>,

    /// Extrapolation method: powerlaw or loglaw
    #[arg(short = 'm', long)]
    extrap_method: Option<ExtrapolationMethod>,

    /// Hub height above ground in metres
    #[arg(long)]
    hubheight: Option<f64>,

    /// JSON run configuration; command-line options override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log debug-level events
    #[arg(long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    let level = if debug { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn load_unit(path: &Path) -> Result<ReanalysisUnit> {
    let text = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write one unit's output; errors are reported per unit by the batch.
fn write_output(dest: &Path, src: &SourceFile, output: &ProductionOutput) -> Result<()> {
    let out_path = dest.join(output.artifact_name());
    let json = serde_json::to_string(output)?;
    fs::write(&out_path, json).with_context(|| format!("Cannot write {}", out_path.display()))?;
    tracing::info!(
        year = %src.year,
        path = %out_path.display(),
        undefined = output.undefined_samples,
        "wrote production output"
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let mut cfg = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if let Some(p) = args.powercurve {
        cfg.power_curve = p;
    }
    if let Some(m) = args.extrap_method {
        cfg.extrapolation = m;
    }
    if let Some(h) = args.hubheight {
        cfg.hub_height = h;
    }
    cfg.validate()?;

    tracing::info!(
        source = %args.source.display(),
        method = %cfg.extrapolation,
        hub_height = cfg.hub_height,
        profile = %cfg.power_curve,
        "starting production run"
    );

    let entries = fs::read_dir(&args.source)
        .with_context(|| format!("Cannot list {}", args.source.display()))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "json") {
            paths.push(path);
        }
    }
    let sources = discover_sources(paths);

    fs::create_dir_all(&args.dest)
        .with_context(|| format!("Cannot create {}", args.dest.display()))?;

    let written = run_batch(&sources, &cfg, load_unit, |src: &SourceFile, output: &ProductionOutput| {
        write_output(&args.dest, src, output)
    });

    tracing::info!(written = written.len(), skipped = sources.len() - written.len(), "done");
    Ok(())
}
