//! Carewatch CLI - Command-line interface for Carewatch
//!
//! Commands:
//! - aggregate: Build a dense vitals series for one device and window
//! - geofence: Evaluate configured perimeters and print transition alerts
//! - validate: Validate telemetry records
//! - doctor: Diagnose configuration and time-zone health

use chrono::{NaiveDateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use carewatch::encoder::SeriesEncoder;
use carewatch::schema::{RecordAdapter, TelemetryRecord, SCHEMA_VERSION};
use carewatch::types::SeriesRequest;
use carewatch::{
    compute_series, EngineError, Metric, MonitorConfig, MonitorProcessor, Period,
    PerimeterStateStore, SystemTimeZones, TimeZoneConverter, CAREWATCH_VERSION, PRODUCER_NAME,
};

/// Carewatch - Vitals aggregation and geofencing for elder-care wearables
#[derive(Parser)]
#[command(name = "carewatch")]
#[command(version = CAREWATCH_VERSION)]
#[command(about = "Aggregate wearable telemetry into time-zone aware series", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a dense series for one device, metric and window
    Aggregate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Device address the series is built for
        #[arg(long)]
        device: String,

        /// Metric (heart_rate, spo2, steps, distance, falls)
        #[arg(long)]
        metric: Metric,

        /// Window length (hour, day, week)
        #[arg(long, default_value = "day")]
        period: Period,

        /// Local reference time, e.g. 2024-01-17T10:00:00 (defaults to now)
        #[arg(long)]
        reference: Option<NaiveDateTime>,

        /// Subject time zone (IANA or Windows id, e.g. "America/New_York")
        #[arg(long, default_value = "UTC")]
        timezone: String,
    },

    /// Evaluate perimeters for all configured subjects
    Geofence {
        /// Monitor configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format for alerts
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Load perimeter states from file
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save perimeter states to file after evaluation
        #[arg(long)]
        save_state: Option<PathBuf>,
    },

    /// Validate telemetry records
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and time-zone health
    Doctor {
        /// Time zone to check
        #[arg(long, default_value = "UTC")]
        timezone: String,

        /// Check a monitor configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a perimeter state file
        #[arg(long)]
        state: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON
    Ndjson,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable
fn init_logging() {
    let filter = EnvFilter::try_from_env("CAREWATCH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CarewatchCliError> {
    match cli.command {
        Commands::Aggregate {
            input,
            output,
            input_format,
            output_format,
            device,
            metric,
            period,
            reference,
            timezone,
        } => cmd_aggregate(
            &input,
            &output,
            input_format,
            output_format,
            SeriesQuery {
                device,
                metric,
                period,
                reference,
                timezone,
            },
        ),

        Commands::Geofence {
            config,
            input,
            input_format,
            output_format,
            load_state,
            save_state,
        } => cmd_geofence(
            &config,
            &input,
            input_format,
            output_format,
            load_state.as_deref(),
            save_state.as_deref(),
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor {
            timezone,
            config,
            state,
            json,
        } => cmd_doctor(&timezone, config.as_deref(), state.as_deref(), json),
    }
}

struct SeriesQuery {
    device: String,
    metric: Metric,
    period: Period,
    reference: Option<NaiveDateTime>,
    timezone: String,
}

fn cmd_aggregate(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    query: SeriesQuery,
) -> Result<(), CarewatchCliError> {
    let records = read_records(input, &input_format)?;
    let converter = SystemTimeZones;

    let reference = match query.reference {
        Some(reference) => reference,
        None => converter
            .utc_to_local(&query.timezone, Utc::now())?
            .naive_local(),
    };

    let request = SeriesRequest {
        device_address: query.device,
        metric: query.metric,
        period: query.period,
        reference,
        timezone: query.timezone,
    };

    let payload = compute_series(&records, &request, &converter, &SeriesEncoder::new())?;
    let output_data = format_output(std::slice::from_ref(&payload), &output_format)?;
    write_output(output, &output_data)
}

fn cmd_geofence(
    config: &Path,
    input: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    load_state: Option<&Path>,
    save_state: Option<&Path>,
) -> Result<(), CarewatchCliError> {
    let config = MonitorConfig::from_file(config)?;
    let mut monitor = MonitorProcessor::new(config)?;

    if let Some(state_path) = load_state {
        let state_json = fs::read_to_string(state_path)?;
        monitor.load_states(&state_json)?;
    }

    let records = read_records(input, &input_format)?;
    let alerts = monitor.tick(&records, Utc::now());

    if let Some(state_path) = save_state {
        fs::write(state_path, monitor.save_states()?)?;
    }

    if !alerts.is_empty() {
        print!("{}", format_output(&alerts, &output_format)?);
    }

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), CarewatchCliError> {
    let records = read_records(input, &input_format)?;
    let results = RecordAdapter::validate_records(&records);

    let report = ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - results.len(),
        invalid_records: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                record_id: r.record_id.clone(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Record {} (index {}): {}",
                    err.record_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        Err(CarewatchCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(
    timezone: &str,
    config: Option<&Path>,
    state: Option<&Path>,
    json: bool,
) -> Result<(), CarewatchCliError> {
    let converter = SystemTimeZones;
    let mut checks: Vec<DoctorCheck> = vec![
        DoctorCheck::ok("carewatch_version", format!("Carewatch version {}", CAREWATCH_VERSION)),
        DoctorCheck::ok("schema_version", format!("Input schema: {}", SCHEMA_VERSION)),
    ];

    checks.push(match converter.utc_to_local(timezone, Utc::now()) {
        Ok(local) => DoctorCheck::ok(
            "timezone",
            format!("{} resolves (current offset {})", timezone, local.offset()),
        ),
        Err(e) => DoctorCheck::error("timezone", e.to_string()),
    });

    if let Some(config_path) = config {
        checks.push(
            match MonitorConfig::from_file(config_path).and_then(|c| {
                c.validate(&converter)?;
                Ok(c)
            }) {
                Ok(c) => DoctorCheck::ok(
                    "config",
                    format!("Config valid ({} subjects)", c.subjects.len()),
                ),
                Err(e) => DoctorCheck::error("config", e.to_string()),
            },
        );
    }

    if let Some(state_path) = state {
        let check = if !state_path.exists() {
            DoctorCheck::warning("state", "State file does not exist".to_string())
        } else {
            match fs::read_to_string(state_path) {
                Ok(content) => match PerimeterStateStore::from_json(&content) {
                    Ok(store) => DoctorCheck::ok(
                        "state",
                        format!(
                            "State file valid ({} subjects, {} outside)",
                            store.len(),
                            store.outside().count()
                        ),
                    ),
                    Err(e) => DoctorCheck::error("state", format!("Invalid state JSON: {}", e)),
                },
                Err(e) => DoctorCheck::error("state", format!("Cannot read state file: {}", e)),
            }
        };
        checks.push(check);
    }

    checks.push(if atty::is(atty::Stream::Stdin) {
        DoctorCheck::ok("stdin", "stdin is a TTY (interactive mode)".to_string())
    } else {
        DoctorCheck::ok("stdin", "stdin is a pipe (ready for records)".to_string())
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: CAREWATCH_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Carewatch Doctor Report");
        println!("=======================");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CarewatchCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn read_records(input: &Path, input_format: &InputFormat) -> Result<Vec<TelemetryRecord>, CarewatchCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let records = match input_format {
        InputFormat::Ndjson => RecordAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => RecordAdapter::parse_array(&input_data)?,
    };
    Ok(records)
}

fn write_output(output: &Path, data: &str) -> Result<(), CarewatchCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn format_output<T: Serialize>(items: &[T], format: &OutputFormat) -> Result<String, CarewatchCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for item in items {
                lines.push(serde_json::to_string(item)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(items)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(items)?),
    }
}

// Error types

#[derive(Debug)]
enum CarewatchCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for CarewatchCliError {
    fn from(e: io::Error) -> Self {
        CarewatchCliError::Io(e)
    }
}

impl From<EngineError> for CarewatchCliError {
    fn from(e: EngineError) -> Self {
        CarewatchCliError::Engine(e)
    }
}

impl From<serde_json::Error> for CarewatchCliError {
    fn from(e: serde_json::Error) -> Self {
        CarewatchCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CarewatchCliError> for CliError {
    fn from(e: CarewatchCliError) -> Self {
        match e {
            CarewatchCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CarewatchCliError::Engine(e) => {
                let hint = match &e {
                    EngineError::InvalidTimezone(_) => "Use an IANA id such as Europe/London or a Windows zone id",
                    EngineError::InvalidPeriod(_) => "Period must be hour, day or week",
                    EngineError::InvalidCoordinate(_) => "Check perimeter and location values",
                    _ => "Ensure input matches the carewatch.telemetry.v1 schema",
                };
                CliError {
                    code: "ENGINE_ERROR".to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            CarewatchCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CarewatchCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            CarewatchCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(Serialize)]
struct ValidationErrorDetail {
    index: usize,
    record_id: Option<String>,
    error: String,
}

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

impl DoctorCheck {
    fn ok(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message,
        }
    }

    fn warning(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message,
        }
    }

    fn error(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message,
        }
    }
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
