use clap::{Parser, Subcommand};
use std::error::Error as _;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// rgc - Registry Garbage Collector
///
/// Scans a v1 Docker registry stored in an S3-compatible bucket and
/// computes which image layers are safe to delete.
#[derive(Parser, Debug)]
#[command(name = "rgc")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Load a previously saved graph instead of scanning
    #[arg(long, global = true, value_name = "FILE")]
    graph: Option<PathBuf>,

    /// Save the scanned graph to a file
    #[arg(long, global = true, value_name = "FILE")]
    save: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Emit the set of layers unreferenced for longer than the minimum age
    Sweep {
        /// Minimum unreferenced age, e.g. 12h or 2w (default: 1d)
        #[arg(long)]
        age: Option<String>,
    },
    /// Print the ordered history of an image layer
    History {
        /// Layer id to report on
        image: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    std::process::exit(run(cli).await);
}

async fn run(cli: Cli) -> i32 {
    let result = match &cli.command {
        Commands::Sweep { age } => {
            commands::sweep::run(
                cli.config.as_deref(),
                cli.graph.as_deref(),
                cli.save.as_deref(),
                age.as_deref(),
            )
            .await
        }
        Commands::History { image } => {
            commands::history::run(
                cli.config.as_deref(),
                cli.graph.as_deref(),
                cli.save.as_deref(),
                image,
            )
            .await
        }
    };

    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            if cli.verbose {
                let mut source = e.source();
                while let Some(cause) = source {
                    eprintln!("  caused by: {}", cause);
                    source = cause.source();
                }
            }
            commands::exit_code(&e)
        }
    }
}
