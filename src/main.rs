// Command-line front end: scan one passport or ID card image (or PDF) and
// print the result envelope as JSON

use clap::Parser;
use log::info;
use mrzscan::processing::TesseractDecoder;
use mrzscan::{DocumentScanner, ScanConfig};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "mrzscan")]
#[command(about = "Extract the machine-readable zone from a passport or ID card")]
struct Args {
    /// Image (PNG, JPEG, ...) or PDF to scan
    file: PathBuf,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Early-exit confidence score (0-100)
    #[arg(long)]
    threshold: Option<u8>,

    /// Wall-clock budget for the variant search, in milliseconds
    #[arg(long = "time-budget-ms")]
    time_budget_ms: Option<u64>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Log progress to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };
    info!("Using configuration {:?}", config);

    let scanner = DocumentScanner::new(TesseractDecoder::new(&config.decoder), config);
    let envelope = scanner.scan_file(&args.file);
    println!("{}", envelope.to_json(args.pretty));

    if envelope.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn load_config(args: &Args) -> Result<ScanConfig, mrzscan::ScanError> {
    let mut config = match &args.config {
        Some(path) => ScanConfig::from_file(path)?,
        None => ScanConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.search.early_exit_score = threshold;
    }
    if let Some(budget) = args.time_budget_ms {
        config.search.time_budget_ms = Some(budget);
    }
    config.validate()?;
    Ok(config)
}
