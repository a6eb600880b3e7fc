use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use exdef_core::{
    backend, def_fingerprint, normalize, verify, ExecutionDefinition, ExecutionResult,
    NormalizationState, NormalizeOptions,
};

/// exdef: execution definition normalizer
///
/// Normalize analytical execution definitions, denormalize backend results,
/// compute fingerprints and check referential integrity.
#[derive(Parser)]
#[command(name = "exdef", version, about, long_about = None)]
struct Cli {
    /// Log normalization passes to stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress human-readable output on success
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize an execution definition
    Normalize {
        /// Path to execution definition (.json)
        file: PathBuf,
        /// Keep alias, title and format
        #[arg(long)]
        keep_removable: bool,
        /// Print the whole normalization state instead of the normalized definition
        #[arg(long)]
        state: bool,
    },

    /// Restore original ids and display text in a backend result
    Denormalize {
        /// Normalization state produced by `normalize --state`
        #[arg(long)]
        state: PathBuf,
        /// Backend result (.json) computed for the normalized definition
        result: PathBuf,
    },

    /// Compute the fingerprint (SHA-256) of an execution definition
    Fingerprint {
        /// Path to execution definition (.json)
        file: PathBuf,
    },

    /// Check referential integrity of an execution definition
    Validate {
        /// Path to execution definition (.json)
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

/// Failure of a command, mapped to the process exit code
enum Failure {
    /// Definition or state is inconsistent (exit 1)
    Invalid(String),
    /// File cannot be read or parsed (exit 2)
    Input(String),
}

impl Failure {
    fn exit_code(&self) -> i32 {
        match self {
            Failure::Invalid(_) => 1,
            Failure::Input(_) => 2,
        }
    }

    fn message(&self) -> &str {
        match self {
            Failure::Invalid(m) | Failure::Input(m) => m,
        }
    }
}

impl From<exdef_core::Error> for Failure {
    fn from(err: exdef_core::Error) -> Self {
        match err {
            exdef_core::Error::Serialization(_) => Failure::Input(err.to_string()),
            other => Failure::Invalid(other.to_string()),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match cli.command {
        Commands::Normalize {
            file,
            keep_removable,
            state,
        } => cmd_normalize(&file, keep_removable, state),
        Commands::Denormalize { state, result } => cmd_denormalize(&state, &result),
        Commands::Fingerprint { file } => cmd_fingerprint(&file),
        Commands::Validate { file, json } => cmd_validate(&file, json, cli.quiet),
        Commands::Version => {
            println!(
                "exdef {} (exdef-core {})",
                env!("CARGO_PKG_VERSION"),
                exdef_core::VERSION
            );
            Ok(0)
        }
    };

    let exit_code = match outcome {
        Ok(code) => code,
        Err(failure) => {
            eprintln!("{} {}", "error:".red().bold(), failure.message());
            failure.exit_code()
        }
    };

    process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ── Commands ──────────────────────────────────────────────

fn cmd_normalize(file: &Path, keep_removable: bool, print_state: bool) -> Result<i32, Failure> {
    let definition: ExecutionDefinition = load(file)?;
    let options = NormalizeOptions {
        keep_removable_properties: keep_removable,
    };

    let state = normalize(&definition, options)?;
    if print_state {
        print_json(&state)?;
    } else {
        print_json(state.normalized())?;
    }
    Ok(0)
}

fn cmd_denormalize(state_file: &Path, result_file: &Path) -> Result<i32, Failure> {
    let state: NormalizationState = load(state_file)?;
    let result: ExecutionResult = load(result_file)?;

    let denormalized = backend::replay(&state, &result)?;
    print_json(&denormalized)?;
    Ok(0)
}

fn cmd_fingerprint(file: &Path) -> Result<i32, Failure> {
    let definition: ExecutionDefinition = load(file)?;
    println!("{}", def_fingerprint(&definition)?);
    Ok(0)
}

fn cmd_validate(file: &Path, json: bool, quiet: bool) -> Result<i32, Failure> {
    let definition: ExecutionDefinition = load(file)?;
    let result = verify(&definition);
    let code = if result.is_valid() { 0 } else { 1 };

    if json {
        let report = serde_json::json!({
            "valid": result.is_valid(),
            "errors": result.errors().len(),
            "warnings": result.warnings().len(),
            "diagnostics": result.diagnostics,
        });
        print_json(&report)?;
        return Ok(code);
    }

    for diagnostic in &result.diagnostics {
        let line = diagnostic.to_string();
        if diagnostic.severity == exdef_core::verifier::Severity::Error {
            eprintln!("{}", line.red());
        } else {
            eprintln!("{}", line.yellow());
        }
    }

    if result.is_valid() {
        if !quiet {
            println!("{} {} is valid", "✓".green(), file.display());
        }
    } else {
        eprintln!(
            "{} {} has {} error(s)",
            "✗".red(),
            file.display(),
            result.errors().len()
        );
    }
    Ok(code)
}

// ── Helpers ───────────────────────────────────────────────

fn load<T: DeserializeOwned>(path: &Path) -> Result<T, Failure> {
    tracing::debug!(path = %path.display(), "loading");
    let content = std::fs::read_to_string(path)
        .map_err(|e| Failure::Input(format!("cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| Failure::Input(format!("cannot parse {}: {}", path.display(), e)))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Failure> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| Failure::Input(format!("cannot serialize output: {}", e)))?;
    println!("{}", out);
    Ok(())
}
