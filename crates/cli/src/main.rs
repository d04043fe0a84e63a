#![deny(unsafe_code)]
//! CLI binary for gauss-grid, a generator of Gaussian test grids with a
//! known power spectrum.
//!
//! Subcommands:
//! - `generate`: generate one grid per seed, measure and store its spectrum, plot
//! - `measure <grid.npy>`: measure the spectrum of a stored grid
//! - `list`: print available spectrum models

mod error;

use std::f64::consts::PI;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use error::CliError;
use gauss_grid_core::{GridError, MeasuredSpectrum, RunConfig, ShellBinning, SpectrumEstimator};
use gauss_grid_fixtures::pipeline::VALIDATION_SIGMA;
use gauss_grid_fixtures::{load_grid, load_grid_with_metadata, save_spectrum, Pipeline, RunReport};
use gauss_grid_models::SpectrumKind;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "gauss-grid", about = "Gaussian random field test grids with a known power spectrum")]
struct Cli {
    /// Output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate one grid per seed, measure its spectrum and write a comparison plot.
    Generate {
        /// JSON run configuration; flags below override its entries.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory receiving grids, spectra and the plot.
        #[arg(short, long, env = "GAUSS_GRID_DIR")]
        output_dir: Option<PathBuf>,

        /// Box side length in Mpc/h.
        #[arg(short = 'L', long)]
        box_size: Option<f64>,

        /// Cells per side.
        #[arg(short = 'N', long)]
        grid_size: Option<usize>,

        /// Comma-separated seeds, one realization each.
        #[arg(short, long, value_delimiter = ',')]
        seeds: Option<Vec<u64>>,

        /// Redshift for cosmological models.
        #[arg(short, long)]
        redshift: Option<f64>,

        /// Spectrum model name (see `list`).
        #[arg(long)]
        spectrum: Option<String>,

        /// Spectrum model parameters as a JSON string.
        #[arg(long)]
        params: Option<String>,

        /// File name prefix (default `test_grid_<N>_`).
        #[arg(long)]
        prefix: Option<String>,

        /// Shell width in h/Mpc (default 2π/L).
        #[arg(long)]
        dk: Option<f64>,

        /// Lower edge of the first shell (default dk/2).
        #[arg(long)]
        kmin: Option<f64>,

        /// Fix amplitudes to sqrt(P/V) and randomize phases only.
        #[arg(long)]
        unitary: bool,

        /// Negate every Fourier amplitude.
        #[arg(long)]
        inverted: bool,

        /// Skip the comparison plot.
        #[arg(long)]
        no_plot: bool,

        /// Record failed seeds and continue with the rest.
        #[arg(long)]
        keep_going: bool,
    },
    /// Measure the shell-averaged power spectrum of a stored grid.
    Measure {
        /// Grid file (`.npy`), with its `.json` sidecar unless --box-size is given.
        grid: PathBuf,

        /// Box side length in Mpc/h; overrides the sidecar.
        #[arg(short = 'L', long)]
        box_size: Option<f64>,

        /// Shell width in h/Mpc (default 2π/L).
        #[arg(long)]
        dk: Option<f64>,

        /// Lower edge of the first shell (default dk/2).
        #[arg(long)]
        kmin: Option<f64>,

        /// Also write the spectrum as JSON to this path.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List available spectrum models.
    List,
}

fn parse_params(text: &str) -> Result<serde_json::Value, CliError> {
    let params: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| CliError::Flag(format!("invalid --params JSON: {e}")))?;
    if !params.is_object() {
        return Err(CliError::Flag("--params must be a JSON object".into()));
    }
    Ok(params)
}

fn binning_for(box_size: f64, dk: Option<f64>, kmin: Option<f64>) -> Result<ShellBinning, GridError> {
    let dk = dk.unwrap_or(2.0 * PI / box_size);
    ShellBinning::new(dk, kmin.unwrap_or(0.5 * dk))
}

fn print_spectrum(spectrum: &MeasuredSpectrum) {
    println!("{:>12} {:>12} {:>14} {:>8}", "k", "k_mean", "power", "modes");
    for bin in spectrum.bins() {
        println!(
            "{:>12.6} {:>12.6} {:>14.6e} {:>8}",
            bin.k, bin.k_mean, bin.power, bin.modes
        );
    }
}

fn print_report(report: &RunReport) {
    for record in &report.records {
        println!(
            "seed {:>6}: {} (mean {:.3e}, variance {:.4e}, {} shells)",
            record.seed,
            record.grid_path.display(),
            record.stats.mean,
            record.stats.variance,
            record.spectrum.len()
        );
    }
    for failure in &report.failures {
        println!("seed {:>6}: FAILED: {}", failure.seed, failure.error);
    }
    if let Some(validation) = &report.validation {
        println!(
            "mean spectrum: {}/{} shells within {}σ of the input model",
            validation.bins.len() - validation.failures().count(),
            validation.bins.len(),
            validation.n_sigma
        );
    }
    if let Some(path) = &report.plot_path {
        println!("plot: {}", path.display());
    }
    if let Some(reason) = &report.plot_error {
        println!("plot: not written ({reason})");
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::List => {
            let models = SpectrumKind::list_models();
            if cli.json {
                let info = serde_json::json!({ "models": models });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("Spectrum models:");
                for name in models {
                    println!("  {name}");
                }
            }
        }
        Command::Generate {
            config,
            output_dir,
            box_size,
            grid_size,
            seeds,
            redshift,
            spectrum,
            params,
            prefix,
            dk,
            kmin,
            unitary,
            inverted,
            no_plot,
            keep_going,
        } => {
            let mut cfg = match (config, output_dir.clone()) {
                (Some(path), _) => {
                    RunConfig::from_json_file(&path).map_err(|e| CliError::config(&path, e))?
                }
                (None, Some(dir)) => RunConfig::new(dir),
                (None, None) => {
                    return Err(CliError::Flag(
                        "no output directory: pass --output-dir or set GAUSS_GRID_DIR".into(),
                    ))
                }
            };
            if let Some(dir) = output_dir {
                cfg.output_dir = dir;
            }
            if let Some(v) = box_size {
                cfg.box_size = v;
            }
            if let Some(v) = grid_size {
                cfg.grid_size = v;
            }
            if let Some(v) = seeds {
                cfg.seeds = v;
            }
            if let Some(v) = redshift {
                cfg.redshift = v;
            }
            if let Some(v) = spectrum {
                cfg.spectrum = v;
            }
            if let Some(text) = params {
                cfg.spectrum_params = parse_params(&text)?;
            }
            if prefix.is_some() {
                cfg.prefix = prefix;
            }
            if dk.is_some() {
                cfg.dk = dk;
            }
            if kmin.is_some() {
                cfg.kmin = kmin;
            }
            cfg.options.unitary_amplitude |= unitary;
            cfg.options.inverted_phase |= inverted;
            cfg.plot &= !no_plot;
            cfg.keep_going |= keep_going;

            let pipeline = Pipeline::new(cfg)?;
            let report = pipeline.run()?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Command::Measure {
            grid,
            box_size,
            dk,
            kmin,
            output,
        } => {
            let (field, meta) = match box_size {
                Some(l) => (load_grid(&grid, l)?, None),
                None => {
                    let (field, meta) =
                        load_grid_with_metadata(&grid).map_err(|e| CliError::sidecar(&grid, e))?;
                    (field, Some(meta))
                }
            };
            let binning = binning_for(field.box_size(), dk, kmin)?;
            let spectrum = SpectrumEstimator::new(binning)?.measure(&field)?;
            info!(path = %grid.display(), shells = spectrum.len(), "measured grid");

            // Compare against the generating model when the sidecar names one.
            let validation = match &meta {
                Some(m) => {
                    let model = SpectrumKind::from_name(&m.spectrum, m.redshift, &m.spectrum_params)
                        .map_err(|e| CliError::sidecar(&grid, e))?;
                    Some(spectrum.validate_against(&model, VALIDATION_SIGMA))
                }
                None => None,
            };

            if let Some(path) = &output {
                save_spectrum(&spectrum, path)?;
            }

            if cli.json {
                let info = serde_json::json!({
                    "grid": grid.display().to_string(),
                    "spectrum": spectrum,
                    "validation": validation,
                });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_spectrum(&spectrum);
                if let Some(v) = validation {
                    println!(
                        "{}/{} shells within {}σ of {}",
                        v.bins.len() - v.failures().count(),
                        v.bins.len(),
                        v.n_sigma,
                        meta.as_ref().map_or("the model", |m| m.spectrum.as_str())
                    );
                }
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "gauss_grid_cli=info,gauss_grid_fixtures=info,gauss_grid_models=info,gauss_grid_core=info"
                .into()
        }))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(fmt::time::uptime()),
        )
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let json_mode = cli.json;
    if let Err(e) = run(cli) {
        if json_mode {
            let j = serde_json::json!({
                "error": e.to_string(),
                "kind": e.kind(),
                "exit_code": e.exit_code(),
            });
            eprintln!("{}", serde_json::to_string_pretty(&j).unwrap_or_default());
        } else {
            eprintln!("error: {e}");
        }
        process::exit(e.exit_code());
    }
}
