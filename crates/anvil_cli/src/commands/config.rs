use std::path::Path;

use anvil_core::Settings;
use anvil_core::config;
use miette::{IntoDiagnostic, Result};
use owo_colors::OwoColorize;

use crate::output::Output;

/// Show the effective settings; the token is never printed
pub async fn show(settings: &Settings) -> Result<()> {
    let output = Output::new();

    let mut shown = settings.clone();
    if shown.general.token.is_some() {
        shown.general.token = Some("<redacted>".to_string());
    }

    output.section("Current Settings");
    println!();
    let toml_str = toml::to_string_pretty(&shown).into_diagnostic()?;
    println!("{}", toml_str);

    Ok(())
}

/// Write a default settings file
pub async fn init(path: &Path) -> Result<()> {
    let output = Output::new();

    if path.exists() {
        output.error(&format!("{} already exists", path.display()));
        return Ok(());
    }

    output.info("Writing:", &path.display().to_string());
    config::save_settings(&Settings::default(), path).await?;

    output.success("Settings written");
    println!();
    println!("Edit the owner id and prefixes, then run:");
    println!("  {} --config {} run", "anvil".bright_green(), path.display());

    Ok(())
}
