//! Segments CLI - Command-line interface for Sensor Segments
//!
//! Commands:
//! - segment: Segment a sensor log and write the segmentation report
//! - matrix: Dump the learned transition matrix
//! - dataset: Build labeled sequences from a segmented log
//! - stats: Print segmented log statistics
//! - doctor: Diagnose configuration and environment

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use sensor_segments::config::SegmentationConfig;
use sensor_segments::dataset::{DatasetBuilder, SequenceDataset, DEFAULT_LABEL};
use sensor_segments::encoder::ReportEncoder;
use sensor_segments::pipeline::SegmentationProcessor;
use sensor_segments::{SegmentError, PRODUCER_NAME, SEGMENTS_VERSION};

/// Segments - activity segmentation for ambient sensor logs
#[derive(Parser)]
#[command(name = "segments")]
#[command(version = SEGMENTS_VERSION)]
#[command(about = "Mine activity segments from sensor activation logs", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that reads a log
#[derive(Args)]
struct LogArgs {
    /// Input log path (use - for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Load base configuration from a JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum transition probability for two activations to be compatible
    #[arg(long)]
    compat_threshold: Option<f64>,

    /// Minimum segment length to retain
    #[arg(long)]
    noise_threshold: Option<usize>,

    /// Zero-based position of the sensor id field
    #[arg(long)]
    sensor_field: Option<usize>,

    /// Field delimiter (defaults to tab)
    #[arg(long)]
    delimiter: Option<char>,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment a sensor log and write the segmentation report
    Segment {
        #[command(flatten)]
        log: LogArgs,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Dump the learned transition matrix as JSON
    Matrix {
        #[command(flatten)]
        log: LogArgs,

        /// Print the 0/1 matrix obtained with this threshold
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Build labeled sequences from a segmented log
    Dataset {
        #[command(flatten)]
        log: LogArgs,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Label assigned to every sequence
        #[arg(long, default_value = DEFAULT_LABEL)]
        label: String,

        /// Drop sequences shorter than this
        #[arg(long)]
        min_length: Option<usize>,

        /// Emit B-step continuations instead of segments
        #[arg(long)]
        validation: bool,
    },

    /// Print segmented log statistics
    Stats {
        #[command(flatten)]
        log: LogArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// One JSON object per segment
    Ndjson,
    /// Compact JSON report
    Json,
    /// Pretty-printed JSON report
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::new(format!("sensor_segments={level},segments={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), SegmentsCliError> {
    match cli.command {
        Commands::Segment {
            log,
            output,
            output_format,
        } => cmd_segment(&log, &output, output_format),

        Commands::Matrix { log, threshold } => cmd_matrix(&log, threshold),

        Commands::Dataset {
            log,
            output,
            label,
            min_length,
            validation,
        } => cmd_dataset(&log, &output, label, min_length, validation),

        Commands::Stats { log, json } => cmd_stats(&log, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn cmd_segment(
    args: &LogArgs,
    output: &Path,
    output_format: OutputFormat,
) -> Result<(), SegmentsCliError> {
    let processor = load_processor(args)?;
    let log = processor.segment()?;

    let encoder = ReportEncoder::new().with_source(args.input.to_string_lossy());
    let report = processor.report(&log, &encoder);

    let output_data = match output_format {
        OutputFormat::Ndjson => {
            let mut lines = String::new();
            for segment in &report.segments {
                lines.push_str(&serde_json::to_string(segment)?);
                lines.push('\n');
            }
            lines
        }
        OutputFormat::Json => serde_json::to_string(&report)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&report)?,
    };

    write_output(output, &output_data)
}

fn cmd_matrix(args: &LogArgs, threshold: Option<f64>) -> Result<(), SegmentsCliError> {
    let processor = load_processor(args)?;
    let model = processor.model();

    let json = match threshold {
        Some(t) => serde_json::to_string_pretty(&model.deterministic_view(t)?.to_nested_map())?,
        None => serde_json::to_string_pretty(&model.to_nested_map())?,
    };
    println!("{}", json);
    Ok(())
}

fn cmd_dataset(
    args: &LogArgs,
    output: &Path,
    label: String,
    min_length: Option<usize>,
    validation: bool,
) -> Result<(), SegmentsCliError> {
    let processor = load_processor(args)?;
    let log = processor.segment()?;

    let builder = DatasetBuilder::new(label);
    let mut dataset: SequenceDataset = if validation {
        builder.validation_set(&log)?
    } else {
        builder.training_set(&log)?
    };

    if let Some(min) = min_length {
        dataset.retain_min_length(min);
    }

    if dataset.is_empty() {
        tracing::warn!("dataset is empty");
    }

    write_output(output, &dataset.to_ndjson()?)
}

fn cmd_stats(args: &LogArgs, json: bool) -> Result<(), SegmentsCliError> {
    let processor = load_processor(args)?;
    let stats = processor.segment()?.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Segmentation Statistics");
        println!("=======================");
        println!("{}", stats);

        if !stats.length_distribution.is_empty() {
            println!("\nLength distribution:");
            for (length, count) in &stats.length_distribution {
                println!("  {:>4}: {}", length, count);
            }
        }
    }

    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), SegmentsCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} version {}", PRODUCER_NAME, SEGMENTS_VERSION),
    });

    if let Some(config_path) = config {
        if config_path.exists() {
            let check = match fs::read_to_string(config_path) {
                Ok(content) => match SegmentationConfig::from_json(&content) {
                    Ok(cfg) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Config valid (compat_threshold={}, noise_threshold={}, sensor_field={})",
                            cfg.compat_threshold, cfg.noise_threshold, cfg.sensor_id_position
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Invalid config: {}", e),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read config file: {}", e),
                },
            };
            checks.push(check);
        } else {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist".to_string(),
            });
        }
    } else {
        let defaults = SegmentationConfig::default();
        checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Using defaults (compat_threshold={}, noise_threshold={})",
                defaults.compat_threshold, defaults.noise_threshold
            ),
        });
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass --input <file>)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (--input - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: SEGMENTS_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Segments Doctor Report");
        println!("======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(SegmentsCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn load_config(args: &LogArgs) -> Result<SegmentationConfig, SegmentsCliError> {
    let mut config = match &args.config {
        Some(path) => SegmentationConfig::from_json(&fs::read_to_string(path)?)?,
        None => SegmentationConfig::default(),
    };

    if let Some(t) = args.compat_threshold {
        config.compat_threshold = t;
    }
    if let Some(n) = args.noise_threshold {
        config.noise_threshold = n;
    }
    if let Some(pos) = args.sensor_field {
        config.sensor_id_position = pos;
    }
    if let Some(d) = args.delimiter {
        config.delimiter = d;
    }

    config.validate()?;
    Ok(config)
}

fn load_processor(args: &LogArgs) -> Result<SegmentationProcessor, SegmentsCliError> {
    let config = load_config(args)?;

    let processor = if args.input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            tracing::warn!("reading sensor log from an interactive terminal");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        SegmentationProcessor::from_log_str(&buffer, config)?
    } else {
        SegmentationProcessor::from_path(&args.input, config)?
    };

    if processor.events().is_empty() {
        return Err(SegmentsCliError::NoEvents);
    }

    tracing::debug!(
        events = processor.events().len(),
        sensors = processor.model().len(),
        "loaded sensor log"
    );
    Ok(processor)
}

fn write_output(output: &Path, data: &str) -> Result<(), SegmentsCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum SegmentsCliError {
    Io(io::Error),
    Segment(SegmentError),
    Json(serde_json::Error),
    NoEvents,
    DoctorFailed,
}

impl From<io::Error> for SegmentsCliError {
    fn from(e: io::Error) -> Self {
        SegmentsCliError::Io(e)
    }
}

impl From<SegmentError> for SegmentsCliError {
    fn from(e: SegmentError) -> Self {
        SegmentsCliError::Segment(e)
    }
}

impl From<serde_json::Error> for SegmentsCliError {
    fn from(e: serde_json::Error) -> Self {
        SegmentsCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<SegmentsCliError> for CliError {
    fn from(e: SegmentsCliError) -> Self {
        match e {
            SegmentsCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            SegmentsCliError::Segment(e) => {
                let (code, hint) = match &e {
                    SegmentError::InvalidArgument(_) => (
                        "INVALID_ARGUMENT",
                        "Thresholds must lie in [0, 1] and noise threshold must be at least 1",
                    ),
                    SegmentError::UnknownSensor(_) => (
                        "UNKNOWN_SENSOR",
                        "The log contains a sensor the transition model has never seen",
                    ),
                    SegmentError::MissingField { .. } => (
                        "MISSING_FIELD",
                        "Check --sensor-field and --delimiter against the log layout",
                    ),
                    SegmentError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                    SegmentError::ParseError(_) | SegmentError::JsonError(_) => {
                        ("PARSE_ERROR", "Check input format")
                    }
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            SegmentsCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            SegmentsCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            SegmentsCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
