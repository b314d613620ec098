// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use booner_core::domain::config::{OrchestratorConfigManifest, CONFIG_PATH_ENV, LOCAL_CONFIG_FILE};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./booner-config.yaml)
        #[arg(short, long, default_value = "./booner-config.yaml")]
        output: PathBuf,

        /// Include backend examples and comments
        #[arg(long)]
        examples: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate {
            output,
            examples,
            force,
        } => generate(&output, examples, force),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config =
        OrchestratorConfigManifest::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./{}", LOCAL_CONFIG_FILE);
        match dirs::config_dir() {
            Some(dir) => println!("  4. {}", dir.join("booner").join("config.yaml").display()),
            None => println!("  4. {}", "(no user config directory)".dimmed()),
        }
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Node:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  ID: {}", spec.node.id);
    println!();

    println!("{}", "Gateway:".bold());
    println!("  Endpoint: {}", spec.gateway.endpoint);
    println!("  Model: {} (embeddings: {})", spec.gateway.llm_model, spec.gateway.embed_model);
    println!("  Timeout: {}", duration(spec.gateway.timeout));
    println!();

    println!("{}", "Coordination:".bold());
    println!("  Mode: {:?}", spec.coordination.mode);
    if let Some(url) = &spec.coordination.url {
        println!("  URL: {}", url);
    }
    println!("  API key: {}", redacted(spec.coordination.api_key.as_deref()));
    println!(
        "  Lock TTL: {} (wait {})",
        duration(spec.coordination.lock_ttl),
        duration(spec.coordination.lock_wait)
    );
    println!("  Session: {}", spec.coordination.session_id);
    println!();

    println!("{}", "Backends:".bold());
    match &spec.backends.opnsense {
        Some(opnsense) => println!("  OPNsense: {} (key {})", opnsense.url, redacted(Some(&opnsense.api_key))),
        None => println!("  OPNsense: {}", "(not configured)".dimmed()),
    }
    match &spec.backends.deployment {
        Some(deployment) => println!(
            "  Deployment: {}{}",
            deployment.url,
            deployment
                .host
                .as_deref()
                .map(|h| format!(" (host {})", h))
                .unwrap_or_default()
        ),
        None => println!("  Deployment: {}", "(not configured)".dimmed()),
    }
    println!();

    println!("{}", "API:".bold());
    println!("  Listen: {}:{}", spec.api.bind_address, spec.api.port);
    println!("  API key: {}", redacted(spec.api.api_key.as_deref()));
    if let Some(metrics) = &spec.observability.metrics_bind {
        println!("  Metrics: {}", metrics);
    }
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = OrchestratorConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn generate(output: &Path, with_examples: bool, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
    }

    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(output, sample).with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

fn duration(d: std::time::Duration) -> String {
    format!("{:?}", d)
}

/// Secrets are shown only as their `env:` reference.
fn redacted(value: Option<&str>) -> String {
    match value {
        None => "(not set)".to_string(),
        Some(v) if v.starts_with("env:") => v.to_string(),
        Some(_) => "****".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_templates_validate() {
        let dir = tempfile::tempdir().unwrap();
        for examples in [false, true] {
            let path = dir.path().join(format!("booner-{}.yaml", examples));
            generate(&path, examples, false).unwrap();
            let manifest = OrchestratorConfigManifest::from_yaml_file(&path).unwrap();
            manifest.validate().unwrap();
        }
    }

    #[test]
    fn test_generate_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("booner-config.yaml");
        std::fs::write(&path, "keep me").unwrap();

        assert!(generate(&path, false, false).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");

        generate(&path, false, true).unwrap();
        assert_ne!(std::fs::read_to_string(&path).unwrap(), "keep me");
    }

    #[test]
    fn test_redacted_keeps_env_references() {
        assert_eq!(redacted(Some("env:MCP_API_KEY")), "env:MCP_API_KEY");
        assert_eq!(redacted(Some("hunter2")), "****");
        assert_eq!(redacted(None), "(not set)");
    }
}
