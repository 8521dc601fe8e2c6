//! dirwatch CLI - dw command

use clap::{Parser, Subcommand};
use anyhow::Result;
use dirwatch::ChangeKind;
use std::path::PathBuf;

mod cmd;
mod output;
mod util;

/// dirwatch - file system changes with reliable directory flags
#[derive(Parser)]
#[command(name = "dw")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch directories and print each change
    Watch {
        /// Directories to watch
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Config file (default: ./dirwatch.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Watch only the given directories, not their subtrees
        #[arg(long)]
        no_recursive: bool,

        /// Kinds of change to print, comma separated (default: all)
        #[arg(long, value_delimiter = ',')]
        kinds: Vec<ChangeKind>,

        /// Exit after printing this many events
        #[arg(long)]
        count: Option<usize>,
    },
    /// Print the effective configuration as TOML
    Config {
        /// Config file (default: ./dirwatch.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only events
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { paths, config, no_recursive, kinds, count } => {
            let options = cmd::watch::WatchOptions { paths, config, no_recursive, kinds, count };
            cmd::watch::run(options).await
        }
        Commands::Config { config } => cmd::config::run(config.as_deref()).await,
    }
}
