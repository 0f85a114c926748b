//! Schema Defaults CLI
//!
//! Command-line interface for applying JSON Schema defaults and validating payloads.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use schema_defaults::{
    apply_defaults_with_options, load_document, load_schema_auto, ApplyOptions, Schema,
    ValidateError, DEFAULT_MAX_DEPTH,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-defaults")]
#[command(about = "Apply JSON Schema default values to JSON documents")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(long, short, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply schema defaults to a payload
    Apply {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Payload source: file path, URL, or - for stdin
        payload: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Validate the result after applying defaults
        #[arg(long)]
        validate: bool,

        /// Maximum recursion depth
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,
    },

    /// Validate a payload against a schema
    Validate {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Payload source: file path, URL, or - for stdin
        payload: String,

        /// Apply schema defaults before validating
        #[arg(long)]
        apply_defaults: bool,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Apply {
            schema,
            payload,
            output,
            pretty,
            validate,
            max_depth,
        } => run_apply(ApplyArgs {
            schema,
            payload,
            output,
            pretty,
            validate,
            max_depth,
        }),

        Commands::Validate {
            schema,
            payload,
            apply_defaults,
            json,
        } => run_validate(&schema, &payload, apply_defaults, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Log to stderr so stdout stays clean JSON.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

struct ApplyArgs {
    schema: String,
    payload: String,
    output: Option<PathBuf>,
    pretty: bool,
    validate: bool,
    max_depth: usize,
}

fn run_apply(args: ApplyArgs) -> Result<(), u8> {
    let (schema, payload) = load_inputs(&args.schema, &args.payload, |msg| {
        eprintln!("Error: {}", msg)
    })?;

    let options = ApplyOptions::new().max_depth(args.max_depth);
    let result = apply_defaults_with_options(&payload, &schema, &options);

    if args.validate {
        if let Err(e) = schema.validate(&result) {
            report_validation_failure(false, e);
            return Err(1);
        }
    }

    let json_output = if args.pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_validate(
    schema_source: &str,
    payload_source: &str,
    apply_defaults: bool,
    json_output: bool,
) -> Result<(), u8> {
    let (schema, payload) = load_inputs(schema_source, payload_source, |msg| {
        report_error(json_output, msg)
    })?;

    let payload = if apply_defaults {
        schema.apply_defaults(&payload)
    } else {
        payload
    };

    match schema.validate(&payload) {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(e) => {
            let code = e.exit_code() as u8;
            report_validation_failure(json_output, e);
            Err(code)
        }
    }
}

/// Load and compile the schema, then load the payload.
fn load_inputs(
    schema_source: &str,
    payload_source: &str,
    report: impl Fn(&str),
) -> Result<(Schema, Value), u8> {
    let document = load_schema_auto(schema_source).map_err(|e| {
        report(&format!("loading schema: {}", e));
        e.exit_code() as u8
    })?;

    let schema = Schema::compile(&document).map_err(|e| {
        report(&format!("compiling schema: {}", e));
        e.exit_code() as u8
    })?;

    let payload = load_document(payload_source).map_err(|e| {
        report(&format!("loading payload: {}", e));
        e.exit_code() as u8
    })?;

    Ok((schema, payload))
}

fn report_validation_failure(json_output: bool, error: ValidateError) {
    let ValidateError::Invalid { errors } = error;
    if json_output {
        let output = serde_json::json!({
            "valid": false,
            "errors": errors
        });
        println!("{}", output);
    } else {
        eprintln!("Validation failed:");
        for error in errors {
            eprintln!("  {}", error);
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}
