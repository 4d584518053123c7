mod config_cmd;
mod partners_cmd;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use wor_config::{config_dir, config_file_path, load_with_overrides};
use wor_logging::init_logger;

use config_cmd::ConfigCommands;
use partners_cmd::PartnersCommands;

#[derive(Parser)]
#[command(name = "wor")]
#[command(about = "Web of registries: manage federation partners of a registry instance")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.wor/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// User id the operation is performed as (defaults to $USER)
    #[arg(long, global = true, env = "WOR_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add, rotate, inspect and remove partners
    #[command(subcommand)]
    Partners(PartnersCommands),
    /// Inspect and write the instance configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { config, user, command } = Cli::parse();

    let path = config.unwrap_or_else(|| config_file_path(&config_dir()));
    let config = load_with_overrides(&path).await?;

    init_logger(&config.logging.dir, &config.logging.level);

    match command {
        Commands::Partners(cmd) => {
            let user = match user {
                Some(user) => user,
                None => std::env::var("USER").context("No acting user: pass --user or set WOR_USER")?,
            };
            partners_cmd::run(cmd, &config, &user).await
        }
        Commands::Config(cmd) => config_cmd::run(cmd, &config, &path).await,
    }
}
