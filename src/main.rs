//! maidkit - Dataset tooling for maid-style persona fine-tuning
//!
//! `maidkit validate` checks a chat dataset and prints a JSON summary;
//! `maidkit build` expands a seed dataset into a tagged training file.

use anyhow::{Context, Result};
use argh::FromArgs;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use maidkit::builder::{category_counts, write_jsonl, BuildConfig, Builder};
use maidkit::data::format_size;
use maidkit::{Dataset, DatasetError, Validator};

/// maidkit - validate and expand persona chat datasets
#[derive(FromArgs)]
struct Args {
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Validate(ValidateArgs),
    Build(BuildArgs),
}

/// validate a JSONL or JSON-array dataset and print a summary
#[derive(FromArgs)]
#[argh(subcommand, name = "validate")]
struct ValidateArgs {
    /// path to the dataset ("-" reads stdin)
    #[argh(positional)]
    file: String,

    /// print the summary on one line
    #[argh(switch)]
    compact: bool,
}

/// expand a seed dataset with categories and style markers
#[derive(FromArgs)]
#[argh(subcommand, name = "build")]
struct BuildArgs {
    /// source dataset (JSONL or JSON array)
    #[argh(option, default = "String::from(\"data/style_maid_100.jsonl\")")]
    src: String,

    /// output JSONL path
    #[argh(option, default = "String::from(\"data/style_maid_200.jsonl\")")]
    dst: String,

    /// minimum number of output records
    #[argh(option, default = "200")]
    target: usize,

    /// style name for the `style` field and system marker
    #[argh(option, default = "String::from(\"maid\")")]
    style: String,
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();

    // validate keeps stderr quiet so stdout can be piped as JSON
    let default_level = match args.command {
        Command::Validate(_) => "warn",
        Command::Build(_) => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match &args.command {
        Command::Validate(cmd) => run_validate(cmd),
        Command::Build(cmd) => run_build(cmd),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("[ERR] {:#}", err);
            let code = err
                .downcast_ref::<DatasetError>()
                .map_or(1, DatasetError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn open_dataset(file: &str) -> maidkit::Result<Dataset> {
    if file == "-" {
        Dataset::from_stdin()
    } else {
        Dataset::open(file)
    }
}

/// Run validation and print the summary to stdout
fn run_validate(args: &ValidateArgs) -> Result<()> {
    let dataset = open_dataset(&args.file)?;
    let summary = Validator::new().validate(&dataset)?;

    let json = if args.compact {
        serde_json::to_string(&summary)
    } else {
        serde_json::to_string_pretty(&summary)
    }
    .context("Failed to serialize summary")?;
    println!("{}", json);

    Ok(())
}

/// Run the builder (headless) and report what was written
fn run_build(args: &BuildArgs) -> Result<()> {
    let dataset = open_dataset(&args.src)?;
    let records = dataset.load_all()?;

    let builder = Builder::new(BuildConfig {
        target: args.target,
        style: args.style.clone(),
    });
    let out = builder.build(&records)?;

    let written = write_jsonl(&out, &args.dst)?;

    let written_size = std::fs::metadata(&args.dst)
        .map(|m| format_size(m.len()))
        .with_context(|| format!("Failed to stat output file: {}", args.dst))?;

    eprintln!("\n📊 Build Summary:");
    eprintln!(
        "   Source records:  {} ({})",
        records.len(),
        dataset.size_human()
    );
    eprintln!("   Written records: {} ({})", written, written_size);
    for (category, count) in category_counts(&out) {
        eprintln!("   {:<14} x{}", category, count);
    }
    eprintln!("\nwrote {} lines to {}", written, args.dst);

    Ok(())
}
