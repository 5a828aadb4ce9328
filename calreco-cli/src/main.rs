//! calreco CLI
//!
//! Reconstructs calorimeter hits from JSON event files.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::redundant_closure_for_method_calls,
    clippy::manual_let_else,
    clippy::too_many_lines
)]

use calreco_algorithms::{
    parse_hbhe_algorithm, parse_hf_algorithm, BatchReconstructor, BatchStatistics,
    DetectorConditions, HfSimpleTimeCheck, NoiseFilter, NoiseFilterConfig, SimpleHbheAlgo,
    SimpleHbheConfig,
};
use calreco_core::{CalibrationTable, ChannelWaveform, RunContext};
use calreco_io::{
    load_calibrations, load_parameter_set, EventFileReader, HitFileWriter, OutputFormat,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    CalrecoIo(#[from] calreco_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] calreco_core::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] calreco_core::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("{0} events had missing inputs")]
    IncompleteEvents(usize),
}

/// Hit output format.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// Comma-separated values with a header line
    Csv,
    /// One JSON object per line
    Jsonl,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => OutputFormat::Csv,
            Format::Jsonl => OutputFormat::JsonLines,
        }
    }
}

/// Calorimeter channel reconstruction.
#[derive(Parser)]
#[command(name = "calreco")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct hits from an event file
    Reconstruct {
        /// Input event file (JSON)
        events: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Channel calibration file; unit gains and zero pedestals if absent
        #[arg(short, long)]
        calibrations: Option<PathBuf>,

        /// Barrel/endcap algorithm description
        #[arg(long)]
        config: Option<PathBuf>,

        /// Forward algorithm description
        #[arg(long)]
        hf_config: Option<PathBuf>,

        /// Noise filter parameters; events failing the filter are not written
        #[arg(long)]
        noise_filter: Option<PathBuf>,

        /// Output format (guessed from the output extension by default)
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// Reconstruct channels of each event in parallel
        #[arg(short, long)]
        parallel: bool,

        /// Number of worker threads
        #[arg(long)]
        threads: Option<usize>,

        /// Exit successfully even if some events lack required inputs
        #[arg(long)]
        allow_missing: bool,
    },

    /// Show information about an event file
    Info {
        /// Input event file (JSON)
        events: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Benchmark sequential against parallel reconstruction
    Benchmark {
        /// Input event file (JSON)
        events: PathBuf,

        /// Channel calibration file
        #[arg(short, long)]
        calibrations: Option<PathBuf>,

        /// Barrel/endcap algorithm description
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of iterations
        #[arg(short, long, default_value = "3")]
        iterations: usize,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn load_table(path: Option<&Path>) -> Result<CalibrationTable> {
    match path {
        Some(path) => Ok(load_calibrations(path)?),
        None => Ok(CalibrationTable::new()),
    }
}

fn load_hbhe(path: Option<&Path>) -> Result<SimpleHbheAlgo> {
    match path {
        Some(path) => Ok(parse_hbhe_algorithm(&load_parameter_set(path)?)?),
        None => Ok(SimpleHbheAlgo::new(SimpleHbheConfig::default())?),
    }
}

fn load_hf(path: Option<&Path>) -> Result<HfSimpleTimeCheck> {
    match path {
        Some(path) => Ok(parse_hf_algorithm(&load_parameter_set(path)?)?),
        None => Ok(HfSimpleTimeCheck::default()),
    }
}

fn load_noise_filter(path: &Path) -> Result<NoiseFilter> {
    let ps = load_parameter_set(path)?;
    Ok(NoiseFilter::new(NoiseFilterConfig::from_parameter_set(&ps)?))
}

/// Fails when events were skipped for missing inputs, unless allowed.
fn check_incomplete(incomplete: usize, allow_missing: bool) -> Result<()> {
    if incomplete > 0 && !allow_missing {
        return Err(CliError::IncompleteEvents(incomplete));
    }
    Ok(())
}

fn print_stats(label: &str, stats: &BatchStatistics) {
    println!(
        "{}: {} channels, {} dropped, {} rejected, {} hits",
        label, stats.inputs, stats.dropped, stats.rejected, stats.produced
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let verbose = cli.verbose;

    match cli.command {
        Commands::Reconstruct {
            events,
            output,
            calibrations,
            config,
            hf_config,
            noise_filter,
            format,
            parallel,
            threads,
            allow_missing,
        } => {
            if let Some(threads) = threads {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build_global()?;
            }

            let reader = EventFileReader::open(&events)?;
            let table = load_table(calibrations.as_deref())?;
            let mut hbhe = load_hbhe(config.as_deref())?;
            let hf = load_hf(hf_config.as_deref())?;
            let filter = noise_filter.as_deref().map(load_noise_filter).transpose()?;
            let format = format.map_or_else(|| OutputFormat::from_path(&output), Into::into);

            if verbose {
                eprintln!("Events: {} ({})", reader.len(), events.display());
                eprintln!("Calibrated channels: {}", table.len());
                eprintln!("Method 0: {:?}", hbhe.config());
                eprintln!("Output: {} ({:?})", output.display(), format);
            }

            let start = Instant::now();
            let mut writer = HitFileWriter::create(&output, format)?;
            let mut hbhe_stats = BatchStatistics::default();
            let mut hf_stats = BatchStatistics::default();
            let mut current_run: Option<u32> = None;
            let mut noisy = 0usize;
            let mut incomplete = 0usize;

            for event in reader.events() {
                if current_run != Some(event.run) {
                    if current_run.is_some() {
                        hbhe.end_run();
                    }
                    let conditions =
                        DetectorConditions::default().with_tag(format!("run {}", event.run));
                    hbhe.begin_run(&conditions);
                    log::info!("begin run {}", event.run);
                    current_run = Some(event.run);
                }

                if let Some(filter) = &filter {
                    match filter.passes(event.noise_summary.as_ref(), event.jets.as_deref()) {
                        Ok(true) => {}
                        Ok(false) => {
                            noisy += 1;
                            continue;
                        }
                        Err(err) => {
                            log::warn!("event {}: {}", event.event, err);
                            incomplete += 1;
                            continue;
                        }
                    }
                }

                let run = event.run_context();
                let waveforms = event.waveforms(&table);
                let batch = BatchReconstructor::new(&hbhe, &table);
                match batch.reconstruct_event(waveforms.as_deref(), &run, parallel) {
                    Ok(out) => {
                        writer.write_hits(event.event, &out.hits)?;
                        hbhe_stats.merge(&out.stats);
                    }
                    Err(err) => {
                        log::warn!("event {}: {}", event.event, err);
                        incomplete += 1;
                    }
                }

                // Forward pre-hits are optional in event files.
                if let Some(forward) = event.forward.as_deref() {
                    let out = BatchReconstructor::new(&hf, &table).reconstruct_event(
                        Some(forward),
                        &run,
                        parallel,
                    )?;
                    writer.write_hits(event.event, &out.hits)?;
                    hf_stats.merge(&out.stats);
                }
            }
            if current_run.is_some() {
                hbhe.end_run();
            }
            writer.flush()?;

            let elapsed = start.elapsed();
            println!(
                "Processed {} events in {:.2}s",
                reader.len(),
                elapsed.as_secs_f64()
            );
            print_stats("Barrel/endcap", &hbhe_stats);
            print_stats("Forward", &hf_stats);
            if filter.is_some() {
                println!("Rejected as noise: {}", noisy);
            }
            if incomplete > 0 {
                println!("Events with missing inputs: {}", incomplete);
            }
            println!("Hits written: {}", writer.hits_written());
            check_incomplete(incomplete, allow_missing)?;
        }

        Commands::Info { events, json } => {
            let reader = EventFileReader::open(&events)?;
            let records = reader.events();

            let data_events = records.iter().filter(|e| e.is_data).count();
            let missing = records.iter().filter(|e| e.channels.is_none()).count();
            let frames = records
                .iter()
                .filter_map(|e| e.channels.as_ref())
                .flatten()
                .collect::<Vec<_>>();
            let dropped = frames.iter().filter(|f| f.dropped).count();
            let max_samples = frames.iter().map(|f| f.samples.len()).max().unwrap_or(0);
            let forward = records
                .iter()
                .filter_map(|e| e.forward.as_ref())
                .map(|f| f.len())
                .sum::<usize>();
            let summaries = records.iter().filter(|e| e.noise_summary.is_some()).count();

            if json {
                let summary = serde_json::json!({
                    "file": events.display().to_string(),
                    "events": reader.len(),
                    "runs": reader.runs(),
                    "data_events": data_events,
                    "events_without_channels": missing,
                    "channel_frames": frames.len(),
                    "dropped_frames": dropped,
                    "max_samples": max_samples,
                    "forward_prehits": forward,
                    "noise_summaries": summaries,
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("File: {}", events.display());
                println!(
                    "Events: {} ({} data, {} simulation)",
                    reader.len(),
                    data_events,
                    reader.len() - data_events
                );
                println!("Runs: {:?}", reader.runs());
                println!("Channel frames: {} ({} dropped)", frames.len(), dropped);
                println!("Events without channel collection: {}", missing);
                println!("Max samples per frame: {}", max_samples);
                println!("Forward pre-hits: {}", forward);
                println!("Events with noise summary: {}", summaries);
            }
        }

        Commands::Benchmark {
            events,
            calibrations,
            config,
            iterations,
        } => {
            let reader = EventFileReader::open(&events)?;
            let table = load_table(calibrations.as_deref())?;
            let mut algo = load_hbhe(config.as_deref())?;
            algo.begin_run(&DetectorConditions::default());

            let inputs: Vec<(RunContext, Vec<ChannelWaveform>)> = reader
                .events()
                .iter()
                .filter_map(|e| e.waveforms(&table).map(|w| (e.run_context(), w)))
                .collect();
            let channels = inputs.iter().map(|(_, w)| w.len()).sum::<usize>();

            println!(
                "Benchmarking with {} events, {} channels, {} iterations",
                inputs.len(),
                channels,
                iterations
            );
            println!(
                "{:<10} | {:<15} | {:<15} | {:<15}",
                "Mode", "Mean Time (ms)", "Min Time (ms)", "Max Time (ms)"
            );
            println!("{:-<65}", "");

            let batch = BatchReconstructor::new(&algo, &table);
            for (name, parallel) in [("Sequential", false), ("Parallel", true)] {
                let run_all = || {
                    inputs
                        .iter()
                        .map(|(run, waveforms)| {
                            if parallel {
                                batch.reconstruct_all_parallel(waveforms, run).hits.len()
                            } else {
                                batch.reconstruct_all(waveforms, run).hits.len()
                            }
                        })
                        .sum::<usize>()
                };

                // Warmup fills the containment cache.
                let hits = run_all();

                let mut times = Vec::with_capacity(iterations);
                for _ in 0..iterations {
                    let start = Instant::now();
                    run_all();
                    times.push(start.elapsed().as_secs_f64() * 1000.0);
                }

                let min_time = times.iter().fold(f64::INFINITY, |a, &b| a.min(b));
                let max_time = times.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
                let mean_time = times.iter().sum::<f64>() / times.len().max(1) as f64;

                println!(
                    "{:<10} | {:<15.2} | {:<15.2} | {:<15.2}",
                    name, mean_time, min_time, max_time
                );
                log::debug!("{} produced {} hits", name, hits);
            }
            log::debug!(
                "containment cache holds {} channels",
                algo.containment().cached_channels()
            );
        }
    }

    Ok(())
}
