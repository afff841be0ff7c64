//! Config command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use winnote_core::Config;

use crate::output::{Output, OutputFormat};

fn effective_path(config_path: Option<&PathBuf>) -> PathBuf {
    config_path.cloned().unwrap_or_else(Config::config_file_path)
}

fn or_unset(value: Option<String>) -> String {
    value.unwrap_or_else(|| "(not set)".to_string())
}

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => output.print_json(&config),
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:         {}", config.data_dir.display());
            println!("  backend:          {}", config.backend);
            println!("  prefix:           {}", config.prefix);
            println!("  database_name:    {}", config.database_name);
            println!("  database_version: {}", config.database_version);
            println!("  data_version:     {}", config.data_version);
            println!("  auto_save:        {}", config.auto_save);
            println!(
                "  save_interval_ms: {}",
                or_unset(config.save_interval_ms.map(|ms| ms.to_string()))
            );
            println!("  periodic_save:    {}", config.periodic_save);
            println!(
                "  log_file:         {}",
                or_unset(config.log_file.as_ref().map(|p| p.display().to_string()))
            );
            println!();
            println!("Config file: {}", effective_path(config_path).display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    config.set_value(&key, &value)?;

    let path = effective_path(config_path);
    config
        .save_to_path(&path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

/// Print where the configuration file lives
pub fn path(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let path = effective_path(config_path);

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({"path": path, "exists": path.exists()})
            );
        }
        _ => println!("{}", path.display()),
    }

    Ok(())
}
