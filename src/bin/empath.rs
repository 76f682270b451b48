//! Empath CLI - Command-line interface for the Empath engine
//!
//! Commands:
//! - run: Process streaming cycle inputs from stdin (streaming mode)
//! - transform: Process a file of cycle inputs into cycle records (batch mode)
//! - validate: Validate cycle inputs and their readings
//! - doctor: Diagnose configuration and environment
//! - schema: Print schema information

use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use empath_core::schema::{CycleInput, CycleInputAdapter, CycleRecord, CycleRecordEncoder, SCHEMA_VERSION};
use empath_core::{EmpathEngine, EngineConfig, EngineError, ENGINE_VERSION, PRODUCER_NAME};

/// Empath - On-device fusion and orchestration engine for cognitive state signals
#[derive(Parser)]
#[command(name = "empath")]
#[command(author = "EmpathOS Contributors")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Fuse detector readings into emotional state and actions", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process streaming cycle inputs from stdin (streaming mode)
    Run {
        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Transform cycle inputs into cycle records (batch mode)
    Transform {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Validate cycle inputs and their readings
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

    /// Diagnose configuration and environment
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one cycle input per line)
    Ndjson,
    /// JSON array of cycle inputs
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one cycle record per line)
    Ndjson,
    /// JSON array of cycle records
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (empath.cycle.v1)
    Input,
    /// Output record
    Output,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

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

fn run(cli: Cli) -> Result<(), EmpathCliError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run { flush } => cmd_run(config_path, flush),

        Commands::Transform {
            input,
            output,
            input_format,
            output_format,
        } => cmd_transform(config_path, &input, &output, input_format, output_format),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { json } => cmd_doctor(config_path, json),

        Commands::Schema { schema_type } => cmd_schema(schema_type),
    }
}

fn build_engine(config_path: Option<&Path>) -> Result<EmpathEngine, EmpathCliError> {
    let config = match config_path {
        Some(path) => {
            info!("Loading engine configuration from {}", path.display());
            EngineConfig::from_json(&fs::read_to_string(path)?)?
        }
        None => EngineConfig::default(),
    };

    Ok(EmpathEngine::with_config(config)?)
}

fn read_input(input: &Path) -> Result<String, EmpathCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_inputs(data: &str, format: &InputFormat) -> Result<Vec<CycleInput>, EmpathCliError> {
    let inputs = match format {
        InputFormat::Ndjson => CycleInputAdapter::parse_ndjson(data)?,
        InputFormat::Json => CycleInputAdapter::parse_array(data)?,
    };
    Ok(inputs)
}

fn cmd_run(config_path: Option<&Path>, flush: bool) -> Result<(), EmpathCliError> {
    let engine = build_engine(config_path)?;
    let encoder = CycleRecordEncoder::new();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for (line_num, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let input: CycleInput = serde_json::from_str(trimmed).map_err(|e| {
            EmpathCliError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
        })?;

        let outcome = engine.process_input(&input)?;
        debug!(
            "Line {}: {} action(s), {} rejected reading(s)",
            line_num + 1,
            outcome.actions.len(),
            outcome.rejected.len()
        );

        writeln!(stdout, "{}", encoder.encode_to_json(outcome)?)?;
        if flush {
            stdout.flush()?;
        }
    }

    stdout.flush()?;
    Ok(())
}

fn cmd_transform(
    config_path: Option<&Path>,
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
) -> Result<(), EmpathCliError> {
    let input_data = read_input(input)?;
    let inputs = parse_inputs(&input_data, &input_format)?;

    if inputs.is_empty() {
        return Err(EmpathCliError::NoCycles);
    }

    let engine = build_engine(config_path)?;
    let encoder = CycleRecordEncoder::new();

    let mut records: Vec<CycleRecord> = Vec::with_capacity(inputs.len());
    for cycle in &inputs {
        records.push(encoder.encode(engine.process_input(cycle)?));
    }

    let output_data = format_output(&records, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    info!("Processed {} cycle(s)", records.len());
    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), EmpathCliError> {
    let input_data = read_input(input)?;
    let inputs = parse_inputs(&input_data, &input_format)?;

    let results = CycleInputAdapter::validate_inputs(&inputs);

    let report = ValidationReport {
        total_cycles: inputs.len(),
        total_readings: inputs.iter().map(|c| c.readings.len()).sum(),
        problems: results.len(),
        errors: results
            .into_iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                reading_index: r.reading_index,
                error: r.error,
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Cycles:   {}", report.total_cycles);
        println!("Readings: {}", report.total_readings);
        println!("Problems: {}", report.problems);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                match err.reading_index {
                    Some(reading) => println!(
                        "  - Cycle {} reading {}: {}",
                        err.index, reading, err.error
                    ),
                    None => println!("  - Cycle {}: {}", err.index, err.error),
                }
            }
        }
    }

    if report.problems > 0 {
        Err(EmpathCliError::ValidationFailed(report.problems))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<(), EmpathCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Empath version {}", ENGINE_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    checks.push(config_check(config_path));

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    checks.push(match std::env::var("RUST_LOG") {
        Ok(filter) => DoctorCheck {
            name: "logging".to_string(),
            status: CheckStatus::Ok,
            message: format!("RUST_LOG={}", filter),
        },
        Err(_) => DoctorCheck {
            name: "logging".to_string(),
            status: CheckStatus::Warning,
            message: "RUST_LOG not set, only warnings are logged".to_string(),
        },
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Empath Doctor Report");
        println!("====================");
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
        Err(EmpathCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn config_check(config_path: Option<&Path>) -> DoctorCheck {
    let Some(path) = config_path else {
        return DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "No config file, using defaults".to_string(),
        };
    };

    if !path.exists() {
        return DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: format!("Config file {} does not exist", path.display()),
        };
    }

    let loaded = fs::read_to_string(path)
        .map_err(EmpathCliError::from)
        .and_then(|content| EngineConfig::from_json(&content).map_err(EmpathCliError::from));

    match loaded {
        Ok(config) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Config valid (history {}, actions {}, high_stress {})",
                config.history_capacity, config.action_history_capacity, config.thresholds.high_stress
            ),
        },
        Err(e) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: CliError::from(e).message,
        },
    }
}

fn cmd_schema(schema_type: SchemaType) -> Result<(), EmpathCliError> {
    match schema_type {
        SchemaType::Input => {
            println!("Input Schema: {}", SCHEMA_VERSION);
            println!();
            println!("- schema_version: optional, must equal {}", SCHEMA_VERSION);
            println!("- timestamp: optional RFC 3339 cycle time (defaults to now)");
            println!("- context: optional free-text tag");
            println!("- readings: array of readings tagged by \"source\":");
            println!("  - facial: confidence, emotions {{ neutral, happy, sad, angry, fearful, disgusted, surprised }}, gaze {{ x, y }}?");
            println!("  - vocal: confidence, pitch, energy, speech_rate, emotion (calm|excited|stressed|neutral)");
            println!("  - behavioral: confidence, typing_speed, error_rate, mouse_movements, click_rate, pause_duration");
            println!("  - wearable: confidence, heart_rate?, heart_rate_variability?, skin_temperature?, accelerometer?");
            println!();
            println!("Readings that fail to decode or validate are reported and skipped.");
        }
        SchemaType::Output => {
            println!("Output Record");
            println!();
            println!("- schema_version, producer {{ name, version, instance_id }}, computed_at");
            println!("- model: {{ focus, stress, confusion, flow, confidence, sources }}");
            println!("- state: {{ timestamp, focus, stress, confusion, flow, valence, arousal, context? }}");
            println!("- actions: [{{ id, type, priority, rule, payload, triggered_by, timestamp }}]");
            println!("- rejected: [{{ source?, reason }}] (omitted when empty)");
        }
    }

    Ok(())
}

fn format_output(records: &[CycleRecord], format: &OutputFormat) -> Result<String, EmpathCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for record in records {
                lines.push(serde_json::to_string(record)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)?),
    }
}

// Error types

#[derive(Debug)]
enum EmpathCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    NoCycles,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for EmpathCliError {
    fn from(e: io::Error) -> Self {
        EmpathCliError::Io(e)
    }
}

impl From<EngineError> for EmpathCliError {
    fn from(e: EngineError) -> Self {
        EmpathCliError::Engine(e)
    }
}

impl From<serde_json::Error> for EmpathCliError {
    fn from(e: serde_json::Error) -> Self {
        EmpathCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<EmpathCliError> for CliError {
    fn from(e: EmpathCliError) -> Self {
        match e {
            EmpathCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            EmpathCliError::Engine(EngineError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'empath doctor --config <file>' for details".to_string()),
            },
            EmpathCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches {} schema", SCHEMA_VERSION)),
            },
            EmpathCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            EmpathCliError::NoCycles => CliError {
                code: "NO_CYCLES".to_string(),
                message: "No cycle inputs found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            EmpathCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} problem(s) found", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            EmpathCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            EmpathCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_cycles: usize,
    total_readings: usize,
    problems: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    reading_index: Option<usize>,
    error: String,
}

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
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
