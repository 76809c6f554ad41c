//! Command-line converter: JATS article XML in, document graph JSON out.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use docgraph::{ImportOptions, Importer};

#[derive(Parser)]
#[command(name = "docgraph", version, about = "Convert JATS article XML into a document graph")]
struct Args {
    /// Input article XML file.
    input: PathBuf,

    /// Write JSON output here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Base URL for resolving relative media references.
    #[arg(long)]
    base_url: Option<String>,

    /// Keep source whitespace instead of normalizing it.
    #[arg(long)]
    keep_whitespace: bool,

    /// Show conversion diagnostics.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let _ = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );

    let options = ImportOptions {
        base_url: args.base_url,
        trim_whitespace: !args.keep_whitespace,
        remove_inner_ws: !args.keep_whitespace,
        ..Default::default()
    };

    let xml = match std::fs::read_to_string(&args.input) {
        Ok(xml) => xml,
        Err(err) => {
            eprintln!("error: cannot read {}: {}", args.input.display(), err);
            return ExitCode::FAILURE;
        }
    };

    let graph = match Importer::with_options(options).import(&xml) {
        Ok(graph) => graph,
        Err(err) => {
            eprintln!("error: import failed: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let json = match serde_json::to_string_pretty(&graph) {
        Ok(json) => json,
        Err(err) => {
            eprintln!("error: serialization failed: {}", err);
            return ExitCode::FAILURE;
        }
    };

    match args.output {
        Some(path) => {
            if let Err(err) = std::fs::write(&path, json) {
                eprintln!("error: cannot write {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        }
        None => println!("{}", json),
    }

    ExitCode::SUCCESS
}
