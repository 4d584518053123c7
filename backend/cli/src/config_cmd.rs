//! CLI config subcommands.

use std::path::Path;

use anyhow::{bail, Result};
use clap::Subcommand;

use wor_config::{check_and_log, write_config, WorConfig};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate the effective configuration (file plus WOR_* overrides)
    Check,
    /// Print the effective configuration as YAML
    Show,
    /// Write the effective configuration to the config file
    Init {
        /// Overwrite an existing file (the old one is kept as .bak)
        #[arg(long)]
        force: bool,
    },
}

pub async fn run(cmd: ConfigCommands, config: &WorConfig, path: &Path) -> Result<()> {
    match cmd {
        ConfigCommands::Check => {
            let report = check_and_log(config);
            for warning in &report.warnings {
                println!("warning: {}: {}", warning.path, warning.message);
            }
            for error in &report.errors {
                println!("error:   {}: {}", error.path, error.message);
            }
            if !report.is_valid() {
                bail!("{} config error(s) in {}", report.errors.len(), path.display());
            }
            println!("Config OK ({})", path.display());
        }
        ConfigCommands::Show => {
            print!("{}", serde_yaml::to_string(config)?);
        }
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists; pass --force to overwrite", path.display());
            }
            write_config(config, path).await?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let config = WorConfig::default();

        run(ConfigCommands::Init { force: false }, &config, &path).await.unwrap();
        assert!(path.exists());
        assert!(run(ConfigCommands::Init { force: false }, &config, &path).await.is_err());
        run(ConfigCommands::Init { force: true }, &config, &path).await.unwrap();
        assert!(path.with_extension("yaml.bak").exists());
    }

    #[tokio::test]
    async fn test_check_rejects_zero_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = WorConfig::default();
        config.federation.contact_timeout_secs = 0;
        let err = run(ConfigCommands::Check, &config, &dir.path().join("config.yaml"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("config error"));
    }
}
