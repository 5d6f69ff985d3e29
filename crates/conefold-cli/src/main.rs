//! ConeFold CLI - run a 2D wave simulation and dump the final layer.
//!
//! # Examples
//!
//! ```bash
//! # Reference run: 128x128 Z-order domain, 100 steps, written to out.txt
//! conefold out.txt
//!
//! # Same run on 8 pool workers, chained dispatch, logging to run.log
//! conefold out.txt run.log --execution pool --workers 8 --dispatch chained
//!
//! # Time five runs of a config file without dumping
//! conefold --config sim.toml --bench --runs 5
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use conefold::{
    CosineHat, Dispatch, ExecutionKind, Gaussian, LayoutKind, RunReport, SimulationConfig,
    TilingKind, WaveKind,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

mod error;

use error::{CliError, CliResult};

/// ConeFold - cache-oblivious wave equation solver
#[derive(Parser, Debug)]
#[command(name = "conefold")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File receiving the final layer (stdout when omitted)
    outfile: Option<PathBuf>,

    /// File receiving the log (stderr when omitted)
    logfile: Option<PathBuf>,

    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log2 of the side of a square domain
    #[arg(short, long)]
    rank: Option<u32>,

    /// Log2 of the domain width
    #[arg(long)]
    rank_x: Option<u32>,

    /// Log2 of the domain height
    #[arg(long)]
    rank_y: Option<u32>,

    /// Log2 of the ConeFold batch length
    #[arg(short, long)]
    tile_rank: Option<u32>,

    /// Log2 of the grid node size
    #[arg(long)]
    cell_rank: Option<u32>,

    /// Number of time steps
    #[arg(short = 'n', long)]
    steps: Option<usize>,

    /// Physical domain length
    #[arg(long)]
    length: Option<f64>,

    /// Time step
    #[arg(long)]
    dt: Option<f64>,

    /// Memory layout (linear, zorder)
    #[arg(short, long)]
    layout: Option<String>,

    /// Sequential tiling (conefold, regular)
    #[arg(long)]
    tiling: Option<String>,

    /// Solver family (tiling, pool, wavefront)
    #[arg(short, long)]
    execution: Option<String>,

    /// Worker threads for the parallel solvers
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Task packaging for the pool solver (per-node, chained)
    #[arg(long)]
    dispatch: Option<String>,

    /// Initial wave (cosine-hat, gaussian)
    #[arg(short, long)]
    wave: Option<String>,

    /// Wave amplitude
    #[arg(long)]
    amplitude: Option<f64>,

    /// Cosine hat frequency
    #[arg(long)]
    frequency: Option<f64>,

    /// Gaussian sweep
    #[arg(long)]
    sweep: Option<f64>,

    /// Time the solver without dumping
    #[arg(long)]
    bench: bool,

    /// Number of timed runs in bench mode
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    runs: u32,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    show_config: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn setup_logging(verbose: bool, quiet: bool, logfile: Option<&Path>) -> CliResult<()> {
    let filter = if quiet {
        EnvFilter::new("conefold=error")
    } else if verbose {
        EnvFilter::new("conefold=debug")
    } else {
        EnvFilter::new("conefold=info")
    };

    match logfile {
        Some(path) => {
            let file = File::create(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .init();
        }
    }
    Ok(())
}

/// Start from the config file (or defaults) and apply every flag given.
fn build_config(cli: &Cli) -> CliResult<SimulationConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| CliError::ConfigFile {
                path: path.display().to_string(),
                source,
            })?;
            SimulationConfig::from_toml_str(&text)?
        }
        None => SimulationConfig::default(),
    };

    if let Some(rank) = cli.rank {
        config = config.with_rank(rank);
    }
    if let Some(rank_x) = cli.rank_x {
        config.rank_x = rank_x;
    }
    if let Some(rank_y) = cli.rank_y {
        config.rank_y = rank_y;
    }
    if let Some(tile_rank) = cli.tile_rank {
        config = config.with_tile_rank(tile_rank);
    }
    if let Some(cell_rank) = cli.cell_rank {
        config = config.with_cell_rank(cell_rank);
    }
    if let Some(steps) = cli.steps {
        config = config.with_steps(steps);
    }
    if let Some(length) = cli.length {
        config = config.with_length(length);
    }
    if let Some(dt) = cli.dt {
        config = config.with_time_step(dt);
    }
    if let Some(layout) = &cli.layout {
        config = config.with_layout(LayoutKind::parse(layout)?);
    }
    if let Some(tiling) = &cli.tiling {
        config = config.with_tiling(TilingKind::parse(tiling)?);
    }
    if let Some(execution) = &cli.execution {
        config = config.with_execution(ExecutionKind::parse(execution)?);
    }
    if let Some(workers) = cli.workers {
        config = config.with_workers(workers);
    }
    if let Some(dispatch) = &cli.dispatch {
        config = config.with_dispatch(Dispatch::parse(dispatch)?);
    }

    let wave = build_wave(cli, config.wave)?;
    Ok(config.with_wave(wave))
}

fn build_wave(cli: &Cli, current: WaveKind) -> CliResult<WaveKind> {
    let mut wave = match cli.wave.as_deref().map(str::to_lowercase).as_deref() {
        None => current,
        Some("cosine-hat" | "cosine" | "hat") => WaveKind::CosineHat(CosineHat::default()),
        Some("gaussian" | "gauss") => WaveKind::Gaussian(Gaussian::default()),
        Some(other) => {
            return Err(CliError::InvalidArgument(format!(
                "unknown wave '{}'. Valid options: cosine-hat, gaussian",
                other
            )))
        }
    };

    match &mut wave {
        WaveKind::CosineHat(hat) => {
            if cli.sweep.is_some() {
                return Err(CliError::InvalidArgument(
                    "--sweep applies to the gaussian wave".to_string(),
                ));
            }
            if let Some(amplitude) = cli.amplitude {
                hat.amplitude = amplitude;
            }
            if let Some(frequency) = cli.frequency {
                hat.frequency = frequency;
            }
        }
        WaveKind::Gaussian(gauss) => {
            if cli.frequency.is_some() {
                return Err(CliError::InvalidArgument(
                    "--frequency applies to the cosine-hat wave".to_string(),
                ));
            }
            if let Some(amplitude) = cli.amplitude {
                gauss.amplitude = amplitude;
            }
            if let Some(sweep) = cli.sweep {
                gauss.sweep = sweep;
            }
        }
    }
    Ok(wave)
}

fn progress_bar(steps: usize, quiet: bool) -> CliResult<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(steps as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} steps ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn simulate(config: &SimulationConfig, quiet: bool) -> CliResult<RunReport> {
    let pb = progress_bar(config.steps, quiet)?;
    let report = conefold::run_with_progress(config, |done, total| {
        pb.set_length(total);
        pb.set_position(done);
    })?;
    pb.finish_and_clear();
    Ok(report)
}

fn describe(config: &SimulationConfig) {
    let (sx, sy) = config.dimensions();
    eprintln!(
        "{} {}x{} {} domain, {} steps, {} via {}",
        "Simulating".bright_cyan().bold(),
        sx,
        sy,
        config.layout,
        config.steps,
        config.wave,
        config.execution,
    );
}

fn bench(config: &SimulationConfig, runs: u32, quiet: bool) -> CliResult<()> {

    let mut total = Duration::ZERO;
    for run in 1..=runs {
        let report = simulate(config, quiet)?;
        total += report.elapsed;
        if !quiet {
            eprintln!(
                "  {} {:>3}: {:>10.3?}  {:.2} Mcell/s",
                "run".bright_white(),
                run,
                report.elapsed,
                report.throughput() / 1e6
            );
        }
    }

    let mean = total / runs;
    println!(
        "{} mean {:.3?} over {} run(s)",
        "Bench".green().bold(),
        mean,
        runs
    );
    Ok(())
}

fn dump(report: &RunReport, outfile: Option<&Path>) -> CliResult<()> {
    match outfile {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            report.dump(&mut out)?;
            out.flush()?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            report.dump(&mut out)?;
            out.flush()?;
        }
    }
    Ok(())
}

fn execute(cli: &Cli) -> CliResult<()> {
    let config = build_config(cli)?;
    config.validate()?;
    tracing::debug!(?config, "Effective configuration");

    if cli.show_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    if !cli.quiet {
        describe(&config);
    }

    if cli.bench {
        return bench(&config, cli.runs, cli.quiet);
    }

    let report = simulate(&config, cli.quiet)?;
    dump(&report, cli.outfile.as_deref())?;

    if !cli.quiet {
        eprintln!(
            "{} {} steps in {:.3?} ({:.2} Mcell/s)",
            "Done".green().bold(),
            report.steps,
            report.elapsed,
            report.throughput() / 1e6
        );
        if let Some(path) = &cli.outfile {
            eprintln!("  {} {}", "Wrote".bright_white(), path.display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(cli.verbose, cli.quiet, cli.logfile.as_deref()) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        return ExitCode::FAILURE;
    }

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["conefold"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn test_defaults_match_library() {
        let cli = parse(&[]);
        assert_eq!(build_config(&cli).unwrap(), SimulationConfig::default());
    }

    #[test]
    fn test_flags_override() {
        let cli = parse(&[
            "out.txt",
            "-r",
            "5",
            "-t",
            "2",
            "-n",
            "12",
            "--layout",
            "linear",
            "--execution",
            "pool",
            "-j",
            "3",
            "--dispatch",
            "chained",
        ]);
        assert_eq!(cli.outfile.as_deref(), Some(Path::new("out.txt")));
        let config = build_config(&cli).unwrap();
        assert_eq!((config.rank_x, config.rank_y), (5, 5));
        assert_eq!(config.tile_rank, 2);
        assert_eq!(config.steps, 12);
        assert_eq!(config.layout, LayoutKind::Linear);
        assert_eq!(config.execution, ExecutionKind::Pool);
        assert_eq!(config.workers, Some(3));
        assert_eq!(config.dispatch, Dispatch::Chained);
    }

    #[test]
    fn test_wave_flags() {
        let cli = parse(&["--wave", "gaussian", "--amplitude", "2", "--sweep", "0.5"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(
            config.wave,
            WaveKind::Gaussian(Gaussian {
                amplitude: 2.0,
                sweep: 0.5
            })
        );

        let cli = parse(&["--frequency", "0.25"]);
        match build_config(&cli).unwrap().wave {
            WaveKind::CosineHat(hat) => assert_eq!(hat.frequency, 0.25),
            other => panic!("unexpected wave {}", other),
        }

        let cli = parse(&["--wave", "gaussian", "--frequency", "1"]);
        assert!(matches!(build_config(&cli), Err(CliError::InvalidArgument(_))));
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        assert!(matches!(build_config(&parse(&["--layout", "hilbert"])), Err(CliError::Fold(_))));
        assert!(matches!(build_config(&parse(&["--wave", "square"])), Err(CliError::InvalidArgument(_))));
    }

    #[test]
    fn test_missing_config_file() {
        let cli = parse(&["--config", "/nonexistent/conefold.toml"]);
        assert!(matches!(build_config(&cli), Err(CliError::ConfigFile { .. })));
    }

    #[test]
    fn test_runs_must_fit_and_be_positive() {
        assert_eq!(parse(&["--bench", "--runs", "5"]).runs, 5);
        assert_eq!(parse(&["--bench"]).runs, 1);
        let full = |runs: &str| Cli::try_parse_from(["conefold", "--bench", "--runs", runs]);
        assert!(full("0").is_err());
        assert!(full("4294967296").is_err());
    }
}
