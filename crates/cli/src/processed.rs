use std::path::PathBuf;
use clap::Parser;
use recwatch::{MarkOutcome, ProcessedStore};

mod common;

/// Mark one recording as processed
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Filename to record as processed
    #[arg(allow_hyphen_values = true)]
    filename: String,

    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args: Args = common::parse_args();
    common::init_logging(args.verbose);

    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let cfg = common::load_config(args.config.as_deref())?;
    let store = ProcessedStore::new(cfg.processed_store_path());

    match store.mark_processed(&args.filename)? {
        MarkOutcome::Marked => {
            println!("File '{}' has been marked as processed.", args.filename)
        }
        MarkOutcome::AlreadyMarked => {
            println!("File '{}' is already marked as processed.", args.filename)
        }
    }
    Ok(())
}
