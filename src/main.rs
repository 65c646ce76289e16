use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

use abi_admissions_pipeline::config::Config;
use abi_admissions_pipeline::dataset::DatasetStore;
use abi_admissions_pipeline::pipeline;
use abi_admissions_pipeline::report::RunReport;

#[derive(Parser)]
#[command(name = "abi-pipeline")]
#[command(about = "Build the England ABI admissions tables from regional workbooks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory of raw regional workbooks
    #[arg(long, env = "RAW_DATA_DIR", global = true)]
    raw_dir: Option<PathBuf>,

    /// Output directory for year-files, regional tables and the master
    #[arg(long, env = "PROCESSED_DATA_DIR", global = true)]
    processed_dir: Option<PathBuf>,

    /// File stem of the master table
    #[arg(long, env = "MASTER_NAME", global = true)]
    master_name: Option<String>,

    /// Print run reports as JSON instead of a text summary
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Split each workbook's regional sheet into per-year CSV files
    Extract,
    /// Rewrite year-files with standardized headers and metadata columns
    Normalize,
    /// Merge year-files into regional tables and the master table
    Combine,
    /// Extract, normalize and combine in order
    Run,
    /// Load the master table and print its data-quality summary
    Inspect,
}

impl Command {
    fn label(self) -> &'static str {
        match self {
            Command::Extract => "Extracting workbooks...",
            Command::Normalize => "Normalizing year-files...",
            Command::Combine => "Combining regional tables...",
            Command::Run => "Running extract, normalize and combine...",
            Command::Inspect => "Loading master table...",
        }
    }
}

fn build_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let defaults = Config::from_env()?;
    let config = Config::new(
        cli.raw_dir.clone().unwrap_or(defaults.raw_data_dir),
        cli.processed_dir.clone().unwrap_or(defaults.processed_data_dir),
        cli.master_name.clone().unwrap_or(defaults.master_name),
    )?;
    Ok(config)
}

fn print_reports(reports: &[RunReport], json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(reports)?);
    } else {
        for report in reports {
            println!("\n{report}");
        }
    }
    Ok(())
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    info!("Using config: {:?}", config);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(cli.command.label());

    let reports = match cli.command {
        Command::Extract => vec![pipeline::run_extract(&config)],
        Command::Normalize => vec![pipeline::run_normalize(&config)],
        Command::Combine => vec![pipeline::run_combine(&config)],
        Command::Run => pipeline::run_all(&config),
        Command::Inspect => vec![pipeline::inspect(&config, &DatasetStore::new())],
    };

    let failed = reports.iter().any(RunReport::has_failures);
    if failed {
        pb.finish_with_message("✗ Finished with failures");
    } else {
        pb.finish_with_message("✓ Done");
    }

    print_reports(&reports, cli.json)?;

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}
