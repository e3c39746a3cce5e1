//! benthic - bathymetric derivatives and benthic zone classification

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use benthic_terrain::algebra::statistics;
use benthic_terrain::engine::{Compression, EngineConfig, RasterEngine};
use benthic_terrain::pipeline::{self, PipelineConfig};
use benthic_terrain::table::{read_classification_table, write_zone_table};
use benthic_terrain::ruggedness::vrm_from_bathymetry;
use benthic_terrain::{acr, bpi, classify, stdbpi, Raster, RasterElement};

#[derive(Parser)]
#[command(name = "benthic")]
#[command(
    author,
    version,
    about = "Bathymetric derivatives and benthic zone classification",
    long_about = None
)]
struct Cli {
    /// Debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Compression for written rasters [default: lzw, or the pipeline config's]
    #[arg(long, global = true, value_enum)]
    compression: Option<CompressionArg>,

    /// Skip the .stats.json sidecars
    #[arg(long, global = true)]
    no_stats: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum CompressionArg {
    None,
    Lzw,
    Deflate,
}

impl From<CompressionArg> for Compression {
    fn from(c: CompressionArg) -> Self {
        match c {
            CompressionArg::None => Compression::None,
            CompressionArg::Lzw => Compression::Lzw,
            CompressionArg::Deflate => Compression::Deflate,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full classification described by a JSON config file
    Pipeline {
        config: PathBuf,
    },
    /// Bathymetric position index
    Bpi {
        /// Input bathymetry
        input: PathBuf,
        /// Output BPI raster
        output: PathBuf,
        /// Inner annulus radius in cells
        #[arg(short, long)]
        inner: usize,
        /// Outer annulus radius in cells
        #[arg(short, long)]
        outer: usize,
        /// Also write the standardised BPI here
        #[arg(short, long)]
        standardised: Option<PathBuf>,
    },
    /// Vector ruggedness measure
    Vrm {
        input: PathBuf,
        output: PathBuf,
        /// Odd window side in cells
        #[arg(short = 'n', long, default_value = "3")]
        neighborhood: usize,
    },
    /// Arc-chord ratio rugosity of the whole raster, printed as JSON
    Acr {
        input: PathBuf,
    },
    /// Classify precomputed derivatives with a classification table
    Classify {
        #[arg(long)]
        bathymetry: PathBuf,
        #[arg(long)]
        slope: PathBuf,
        /// Standardised fine BPI
        #[arg(long)]
        fine: PathBuf,
        /// Standardised broad BPI
        #[arg(long)]
        broad: PathBuf,
        /// Classification table (CSV)
        #[arg(long)]
        table: PathBuf,
        output: PathBuf,
    },
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Command line flags take precedence over the engine settings from a file.
fn apply_overrides(engine: &mut EngineConfig, compression: Option<CompressionArg>, no_stats: bool) {
    if let Some(c) = compression {
        engine.compression = c.into();
    }
    if no_stats {
        engine.compute_statistics = false;
    }
}

fn load<T: RasterElement>(engine: &RasterEngine, path: &Path) -> Result<Raster<T>> {
    engine
        .load(path)
        .with_context(|| format!("failed to read {}", path.display()))
}

fn save<T: RasterElement>(engine: &RasterEngine, raster: &Raster<T>, path: &Path) -> Result<()> {
    engine
        .save(raster, path)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut engine_config = EngineConfig::default();
    apply_overrides(&mut engine_config, cli.compression, cli.no_stats);
    let engine = RasterEngine::new(engine_config);

    match cli.command {
        Commands::Pipeline { config } => {
            let mut config = PipelineConfig::from_path(&config)
                .with_context(|| format!("failed to load {}", config.display()))?;
            apply_overrides(&mut config.engine, cli.compression, cli.no_stats);
            let outputs = pipeline::run(&config).context("classification pipeline failed")?;
            for zone in &outputs.zones {
                println!("{:>6}  {:<24} {}", zone.value, zone.zone, zone.count);
            }
            if let Some(dir) = outputs.intermediates {
                println!("intermediate masks kept in {}", dir.display());
            }
        }
        Commands::Bpi { input, output, inner, outer, standardised } => {
            let bathy: Raster<f64> = load(&engine, &input)?;
            let raw = bpi(&bathy, inner, outer)?;
            save(&engine, &raw, &output)?;
            if let Some(std_path) = standardised {
                save(&engine, &stdbpi(&raw)?, &std_path)?;
            }
        }
        Commands::Vrm { input, output, neighborhood } => {
            let bathy: Raster<f64> = load(&engine, &input)?;
            let rug = vrm_from_bathymetry(&bathy, neighborhood)?;
            if let Some(stats) = statistics(&rug) {
                info!(min = stats.min, max = stats.max, mean = stats.mean, "VRM");
            }
            save(&engine, &rug, &output)?;
        }
        Commands::Acr { input } => {
            let bathy: Raster<f64> = load(&engine, &input)?;
            let result = acr(&bathy)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Classify { bathymetry, slope, fine, broad, table, output } => {
            let rules = read_classification_table(&table)
                .with_context(|| format!("failed to read {}", table.display()))?;
            let bathy: Raster<f64> = load(&engine, &bathymetry)?;
            let slope: Raster<f64> = load(&engine, &slope)?;
            let fine: Raster<i32> = load(&engine, &fine)?;
            let broad: Raster<i32> = load(&engine, &broad)?;
            let zones = classify(&rules, &bathy, &slope, &fine, &broad)?;
            save(&engine, &zones.raster, &output)?;
            let table_path = output.with_extension("zones.csv");
            write_zone_table(std::fs::File::create(&table_path)?, &zones.zone_table())?;
            info!(path = %table_path.display(), "wrote zone table");
        }
    }

    Ok(())
}
