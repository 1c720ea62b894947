use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing::{debug, error, info};

use compatkit::coding::CodingOptions;
use compatkit::settings::Settings;
use compatkit::{CompatError, MixedTypeField, OrderedDictionary, from_mixed_with, telemetry, to_mixed_with};

/// Reads a JSON document, passes it through the mixed value tree and prints the result.
#[derive(Parser, Debug)]
#[command(name = "compatkit", version)]
struct Cli {
    /// JSON input file; stdin when omitted
    input: Option<PathBuf>,
    /// Print a top-level object as an ordered flat `[key, value, ...]` stream
    #[arg(long)]
    flat: bool,
    #[arg(long)]
    pretty: bool,
    /// Settings file used instead of ./compatkit.*
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Compat(#[from] CompatError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("compatkit: {}", e);
            return ExitCode::FAILURE;
        }
    };
    telemetry::init_tracing(&settings.log.filter);

    match run(&cli, settings.coding_options()) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "compatkit failed");
            eprintln!("compatkit: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, options: CodingOptions) -> Result<String, CliError> {
    let text = match &cli.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        }
    };
    // parsed straight into the tree so object member order survives
    let document: MixedTypeField = serde_json::from_str(&text)?;
    info!(kind = document.type_name(), bytes = text.len(), "document read");

    let output = if cli.flat {
        flatten(&document, options)?
    } else {
        to_mixed_with(&document, options)?
    };
    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    Ok(rendered)
}

// Re-encodes a top-level object through OrderedDictionary and checks that the
// flat stream decodes back to the same entries.
fn flatten(document: &MixedTypeField, options: CodingOptions) -> Result<MixedTypeField, CompatError> {
    let fields = document.as_dictionary().ok_or_else(|| CompatError::TypeMismatch {
        expected: "dictionary".to_string(),
        found: document.type_name().to_string(),
        path: "<root>".to_string(),
    })?;
    let entries: OrderedDictionary<String, MixedTypeField> = fields
        .iter()
        .map(|(key, slot)| (key.clone(), slot.clone().unwrap_or(MixedTypeField::Null)))
        .collect();
    let flat = to_mixed_with(&entries, options)?;
    let decoded: OrderedDictionary<String, MixedTypeField> = from_mixed_with(&flat, options)?;
    if decoded != entries {
        return Err(CompatError::corruption("flat stream did not decode back to the same entries"));
    }
    debug!(entries = entries.len(), "flat stream verified");
    Ok(flat)
}
