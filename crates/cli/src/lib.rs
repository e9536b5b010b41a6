pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use skinmatch_core::config::{AppConfig, ConfigOverrides, LogFormat};

use commands::cluster::ClusterArgs;
use commands::recommend::RecommendArgs;
use commands::RuntimeOptions;

#[derive(Debug, Parser)]
#[command(
    name = "skinmatch",
    about = "Skincare catalog clustering and recommendation CLI",
    long_about = "Encode product ingredient lists, pick a cluster count with the elbow method, cluster the catalog, and recommend formulation peers.",
    after_help = "Examples:\n  skinmatch --dataset data/cosmetics.csv stats\n  skinmatch select-k\n  skinmatch cluster --k 6 --output clusters.json\n  skinmatch recommend \"Ultra Facial Cream\" --brand KIEHL'S --output peers.csv"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to the product dataset CSV")]
    dataset: Option<PathBuf>,
    #[arg(long, global = true, help = "Random seed for every clustering run")]
    seed: Option<u64>,
    #[arg(long, global = true, help = "Explicit config file; must exist when given")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Category summary, price outliers and most common ingredients")]
    Stats,
    #[command(name = "select-k", about = "Run the elbow search and report the inertia curve")]
    SelectK,
    #[command(about = "Cluster the catalog and report assignments")]
    Cluster(ClusterArgs),
    #[command(about = "Recommend price-ordered formulation peers for a product")]
    Recommend(RecommendArgs),
}

impl Cli {
    fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            config_path: self.config.clone(),
            overrides: ConfigOverrides {
                dataset_path: self.dataset.clone(),
                seed: self.seed,
                ..ConfigOverrides::default()
            },
        }
    }
}

/// Installs the global subscriber. Output goes to stderr so stdout carries
/// only command payloads.
pub fn init_logging(config: &AppConfig) -> anyhow::Result<()> {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt().with_target(false).with_max_level(log_level).with_writer(std::io::stderr);

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|error| anyhow::anyhow!("could not install tracing subscriber: {error}"))
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.runtime_options();

    // Invalid config is reported by the command itself.
    if let Ok(config) = options.load_config() {
        if let Err(error) = init_logging(&config) {
            eprintln!("{error:#}");
        }
    }

    let result = match &cli.command {
        Command::Config => commands::config::run(&options),
        Command::Stats => commands::stats::run(&options),
        Command::SelectK => commands::select_k::run(&options),
        Command::Cluster(args) => commands::cluster::run(&options, args),
        Command::Recommend(args) => commands::recommend::run(&options, args),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
