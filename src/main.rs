use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracereplay::config::{write_example_config, Overrides};
use tracereplay::generate::generate_file;
use tracereplay::trace::{convert, DEFAULT_GRANULARITY};
use tracereplay::util::{init_data_dir, log_file_path};
use tracereplay::{Config, ExpansionStrategy, GenerateOptions, Replayer, TraceFormat, TraceStats};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tracereplay",
    version,
    about = "Replay captured storage traces against a live backend at their original timing"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log to a file instead of stderr; bare flag uses <data dir>/logs/tracereplay.log
    #[arg(long, global = true, value_name = "PATH", num_args = 0..=1)]
    log_file: Option<Option<PathBuf>>,

    /// Data directory for config and logs (default: ~/.tracereplay)
    #[arg(long, global = true, value_name = "PATH")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a trace and print the report
    Run {
        /// Config file (default: ~/.tracereplay/config.toml if present)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Trace file to replay
        #[arg(long, value_name = "PATH")]
        trace: Option<PathBuf>,

        /// Trace format: monitor or jsonl
        #[arg(long)]
        format: Option<String>,

        /// Number of concurrent lanes
        #[arg(long)]
        lanes: Option<usize>,

        /// Backend: redis, http or noop
        #[arg(long)]
        backend: Option<String>,

        /// Lane setup failure policy: abort, skip or orphan
        #[arg(long)]
        on_lane_failure: Option<String>,

        /// Keep counters only, no latency statistics
        #[arg(long)]
        counting: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-encode a trace in another format
    Convert {
        #[arg(long, value_name = "PATH")]
        input: PathBuf,

        /// Format of the input trace
        #[arg(long, default_value = "monitor")]
        format: String,

        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Format of the output trace
        #[arg(long, default_value = "jsonl")]
        to: String,

        /// Timestamp decimals in MONITOR output
        #[arg(long, default_value_t = DEFAULT_GRANULARITY)]
        granularity: usize,
    },
    /// Characterize a trace and write a synthetic one with the same shape
    Generate {
        #[arg(long, value_name = "PATH")]
        input: PathBuf,

        /// Format of the input trace
        #[arg(long, default_value = "jsonl")]
        format: String,

        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Format of the synthetic trace
        #[arg(long, default_value = "monitor")]
        to: String,

        /// Length of the synthetic trace in seconds
        #[arg(long, default_value_t = 30.0)]
        duration: f64,

        /// Characterization interval, in percent of the source span
        #[arg(long, default_value_t = 5.0)]
        interval: f64,

        /// Expansion strategy: cyclic or stretch
        #[arg(long, default_value = "cyclic")]
        strategy: String,

        /// RNG seed (default: random, printed after the run)
        #[arg(long)]
        seed: Option<u64>,

        /// Upper bound on generated records
        #[arg(long, default_value_t = 1_000_000)]
        max_records: usize,

        /// Timestamp decimals in MONITOR output
        #[arg(long, default_value_t = DEFAULT_GRANULARITY)]
        granularity: usize,
    },
    /// Print duration, throughput, command mix and inter-arrival statistics
    Analyze {
        /// Trace files to analyze
        #[arg(required = true, value_name = "TRACE")]
        traces: Vec<PathBuf>,

        /// Format of the traces
        #[arg(long, default_value = "monitor")]
        format: String,

        /// Print the statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the example config file
    Init {
        /// Destination (default: ~/.tracereplay/config.toml)
        #[arg(long, value_name = "PATH")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(file)
                .with_ansi(false) // Disable ANSI colors in log file
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(dir) = cli.data_dir {
        init_data_dir(dir);
    }
    let log_file = cli.log_file.map(|path| path.unwrap_or_else(log_file_path));
    init_logging(log_file.as_ref())?;

    match cli.command {
        Commands::Run {
            config,
            trace,
            format,
            lanes,
            backend,
            on_lane_failure,
            counting,
            json,
        } => {
            let mut settings = Config::load_or_default(config.as_deref())?;
            settings.apply_overrides(&Overrides {
                trace,
                format,
                lanes,
                backend,
                on_lane_failure,
                counting,
            })?;
            let trace_path = settings.replay.trace_path()?.to_path_buf();

            let replayer = Replayer::new(settings.replay.options(), Arc::new(settings.backend));
            let report = replayer
                .run_file(&trace_path, settings.replay.format)
                .await?;

            if json {
                println!("{}", report.to_json()?);
            } else {
                print!("{report}");
            }
        }
        Commands::Convert {
            input,
            format,
            output,
            to,
            granularity,
        } => {
            let parser = TraceFormat::parse(&format)?.parser();
            let to = TraceFormat::parse(&to)?;
            let summary = convert(&input, parser.as_ref(), &output, to, granularity)?;
            println!(
                "wrote {} records to {} ({} skipped)",
                summary.written,
                output.display(),
                summary.skipped
            );
        }
        Commands::Generate {
            input,
            format,
            output,
            to,
            duration,
            interval,
            strategy,
            seed,
            max_records,
            granularity,
        } => {
            let parser = TraceFormat::parse(&format)?.parser();
            let to = TraceFormat::parse(&to)?;
            let mut options = GenerateOptions::default()
                .with_duration(duration)
                .with_interval(interval)
                .with_strategy(ExpansionStrategy::parse(&strategy)?)
                .with_max_records(max_records);
            if let Some(seed) = seed {
                options = options.with_seed(seed);
            }

            let summary =
                generate_file(&input, parser.as_ref(), &output, to, granularity, &options)?;
            println!(
                "wrote {} records to {} (seed {}, {} source records, {} skipped)",
                summary.generated,
                output.display(),
                summary.seed,
                summary.source_records,
                summary.skipped
            );
        }
        Commands::Analyze {
            traces,
            format,
            json,
        } => {
            let parser = TraceFormat::parse(&format)?.parser();
            let mut analyzed = Vec::with_capacity(traces.len());
            for path in traces {
                let stats = TraceStats::from_file(&path, parser.as_ref())?;
                analyzed.push((path, stats));
            }

            if json {
                let out: Vec<_> = analyzed
                    .iter()
                    .map(|(path, stats)| serde_json::json!({ "trace": path, "stats": stats }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                for (path, stats) in &analyzed {
                    println!("{}", path.display());
                    print!("{stats}");
                }
            }
        }
        Commands::Init { path, force } => {
            let written = write_example_config(path.as_deref(), force)?;
            println!("wrote {}", written.display());
        }
    }

    Ok(())
}
