//! Configuration view and validation commands — `stemsplit config`.

use std::path::Path;

use anyhow::{Context, Result};

use super::super::ConfigCommands;
use stemsplit::config::StemsplitConfig;

pub fn cmd_config(
    config_path: &Path,
    explicit: bool,
    command: Option<ConfigCommands>,
) -> Result<()> {
    if explicit && !config_path.exists() && !matches!(command, Some(ConfigCommands::Init)) {
        anyhow::bail!("Config file not found: {}", config_path.display());
    }

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Stemsplit Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No config file at {}; using defaults.", config_path.display());
            }
            println!();

            let config = StemsplitConfig::load_or_default(config_path)?;
            println!("Effective values (with env overrides):");
            println!();
            print!("{}", config.to_toml());
            println!();
            println!(
                "Separation phases: {} (model {})",
                config.separator.phases(),
                config.separator.model
            );

            print_warnings(&config.validate());
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No config file found. Using defaults (valid).");
                return Ok(());
            }

            let config = StemsplitConfig::load_or_default(config_path)?;
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                print_warnings(&warnings);
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("{} already exists.", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if let Some(parent) = config_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(config_path, StemsplitConfig::default().to_toml())
                .with_context(|| format!("Failed to write {}", config_path.display()))?;

            println!("Created {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [separator] program, args, model, bitrate");
            println!("  - [server] host, port, storage_dir, tmp_dir");
            println!();
        }
    }

    Ok(())
}

fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!();
    println!("Configuration warnings:");
    for warning in warnings {
        println!("  - {}", warning);
    }
}
