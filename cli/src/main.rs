use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use matter_model_core::{
    ConformanceContext, ConstraintContext, ContextValue, DataType, Diagnostic, TargetSchema,
    parse_conformance, parse_constraint,
};
use matter_model_db::{ModelConfig, ModelError, ModelStore};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Schema conventions selectable on the command line.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliSchema {
    Legacy,
    DataModel,
}

impl From<CliSchema> for TargetSchema {
    fn from(schema: CliSchema) -> Self {
        match schema {
            CliSchema::Legacy => Self::Legacy,
            CliSchema::DataModel => Self::DataModel,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "matter-model")]
#[command(about = "Matter cluster model resolution and inspection")]
struct Cli {
    /// Log debug output to stderr (overrides RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve and validate model files or directories.
    Validate(ValidateArgs),
    /// Resolve inheritance and write the completed package.
    Resolve(ResolveArgs),
    /// Parse a constraint and print its bounds.
    Constraint(ConstraintArgs),
    /// Parse a conformance and evaluate it against enabled features.
    Conformance(ConformanceArgs),
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Model files (JSON/YAML) and/or directories of model files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Resolution config YAML applied to every input.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of inputs processed in parallel.
    #[arg(long, default_value_t = 4)]
    jobs: usize,
}

#[derive(Debug, Args)]
struct ResolveArgs {
    /// Model file or directory.
    input: PathBuf,
    /// Output package path; the extension selects JSON or YAML.
    #[arg(long)]
    output: PathBuf,
    /// Resolution config YAML.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ConstraintArgs {
    /// Constraint text, e.g. "1 to 254" or "max 4[max 32]".
    text: String,
    /// Data type used for null sentinels and hex width (e.g. uint16).
    #[arg(long = "type")]
    data_type: Option<String>,
    /// Schema conventions used to render bounds; overrides the config.
    #[arg(long, value_enum)]
    schema: Option<CliSchema>,
    /// Resolution config YAML whose `target_schema` applies when --schema is absent.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "text")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct ConformanceArgs {
    /// Conformance text, e.g. "LT & !BT" or "[LT].a+".
    text: String,
    /// Comma-separated identifiers that evaluate to true.
    #[arg(long)]
    features: Option<String>,
    #[arg(long, value_enum, default_value = "text")]
    format: CliOutputFormat,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Validate(args) => run_validate(args),
        Command::Resolve(args) => run_resolve(args),
        Command::Constraint(args) => run_constraint(args),
        Command::Conformance(args) => run_conformance(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ModelConfig, String> {
    match path {
        Some(path) => ModelConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display())),
        None => Ok(ModelConfig::default()),
    }
}

fn load_store(path: &Path) -> Result<ModelStore, ModelError> {
    if path.is_dir() {
        ModelStore::from_dir(path)
    } else {
        ModelStore::from_file(path)
    }
}

// ---------------------------------------------------------------------------
// validate command
// ---------------------------------------------------------------------------

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    use rayon::prelude::*;

    let config = load_config(args.config.as_deref())?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs)
        .build()
        .map_err(|e| format!("Failed to create thread pool: {e}"))?;

    struct ValidationOutcome {
        input: PathBuf,
        clusters: usize,
        result: Result<Vec<Diagnostic>, String>,
    }

    let outcomes: Vec<ValidationOutcome> = pool.install(|| {
        args.inputs
            .par_iter()
            .map(|input| {
                let mut store = match load_store(input) {
                    Ok(store) => store,
                    Err(e) => {
                        return ValidationOutcome {
                            input: input.clone(),
                            clusters: 0,
                            result: Err(e.to_string()),
                        };
                    }
                };
                let result = match store.resolve(&config) {
                    Ok(diagnostics) | Err(ModelError::Validation(diagnostics)) => Ok(diagnostics),
                    Err(e) => Err(e.to_string()),
                };
                ValidationOutcome {
                    input: input.clone(),
                    clusters: store.len(),
                    result,
                }
            })
            .collect()
    });

    let mut problems = 0usize;
    let mut clusters = 0usize;
    for outcome in &outcomes {
        clusters += outcome.clusters;
        match &outcome.result {
            Ok(diagnostics) => {
                for diagnostic in diagnostics {
                    eprintln!("{}: {diagnostic}", outcome.input.display());
                }
                problems += diagnostics.len();
            }
            Err(e) => {
                eprintln!("{}: {e}", outcome.input.display());
                problems += 1;
            }
        }
    }

    if problems > 0 {
        return Err(format!(
            "{problems} problem(s) found in {} input(s)",
            outcomes.len()
        ));
    }
    println!(
        "Validated {} input(s) with {clusters} cluster(s).",
        outcomes.len()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// resolve command
// ---------------------------------------------------------------------------

fn run_resolve(args: ResolveArgs) -> Result<(), String> {
    let config = load_config(args.config.as_deref())?;
    let mut store = load_store(&args.input)
        .map_err(|e| format!("Failed to load '{}': {e}", args.input.display()))?;
    let diagnostics = store.resolve(&config).map_err(|e| e.to_string())?;
    for diagnostic in &diagnostics {
        eprintln!("warning: {diagnostic}");
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "Failed to create output directory '{}': {err}",
                    parent.display()
                )
            })?;
        }
    }
    store
        .write_package(&args.output)
        .map_err(|err| format!("Failed to write '{}': {err}", args.output.display()))?;

    println!(
        "Resolved {} cluster(s) into '{}'.",
        store.len(),
        args.output.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// constraint command
// ---------------------------------------------------------------------------

fn run_constraint(args: ConstraintArgs) -> Result<(), String> {
    let constraint = parse_constraint(&args.text);
    let data_type = args.data_type.as_deref().map(DataType::new);
    let schema = match args.schema {
        Some(schema) => TargetSchema::from(schema),
        None => load_config(args.config.as_deref())?.target_schema,
    };
    let cx = ConstraintContext::new(None, &[]);

    let min = constraint.min(&cx).format_for(schema, data_type.as_ref());
    let max = constraint.max(&cx).format_for(schema, data_type.as_ref());
    let default = constraint.default(&cx).format_for(schema, data_type.as_ref());

    match args.format {
        CliOutputFormat::Text => {
            println!("constraint: {constraint}");
            println!("min: {min}");
            println!("max: {max}");
            println!("default: {default}");
        }
        CliOutputFormat::Json => {
            let value = serde_json::json!({
                "constraint": constraint.to_string(),
                "length": constraint.is_length(),
                "min": min,
                "max": max,
                "default": default,
            });
            let raw = serde_json::to_string_pretty(&value)
                .map_err(|err| format!("Failed to serialize bounds: {err}"))?;
            println!("{raw}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// conformance command
// ---------------------------------------------------------------------------

fn run_conformance(args: ConformanceArgs) -> Result<(), String> {
    let conformance = parse_conformance(&args.text);
    let cx = parse_csv_list(args.features)
        .into_iter()
        .fold(ConformanceContext::new(), |cx, id| {
            cx.with(id, ContextValue::Bool(true))
        });

    let allowed = conformance.eval(&cx).map_err(|e| e.to_string())?;
    let state = conformance.classify(&cx).map_err(|e| e.to_string())?;

    match args.format {
        CliOutputFormat::Text => {
            println!("conformance: {conformance}");
            println!("allowed: {allowed}");
            println!("state: {state:?}");
        }
        CliOutputFormat::Json => {
            let value = serde_json::json!({
                "conformance": conformance.to_string(),
                "identifiers": conformance.identifiers(),
                "allowed": allowed,
                "state": state,
            });
            let raw = serde_json::to_string_pretty(&value)
                .map_err(|err| format!("Failed to serialize result: {err}"))?;
            println!("{raw}");
        }
    }
    Ok(())
}

fn parse_csv_list(raw: Option<String>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    })
    .unwrap_or_default()
}
