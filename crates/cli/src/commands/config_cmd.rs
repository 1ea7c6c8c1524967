//! `docforge config`: configuration management commands.

use docforge_config::PipelineConfig;
use std::path::Path;

use super::load_config;

pub async fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match load_config(config_path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if config.tiers.len() < 2 {
                warnings.push("Only one tier configured; truncation can never escalate");
            }

            if config.escalation.max_attempts < 2 {
                warnings.push("max_attempts = 1 disables retries and escalation");
            }

            if config.tiers.iter().any(|t| t.input_per_m == 0.0 && t.output_per_m == 0.0) {
                warnings.push("One or more tiers have no pricing; cost estimates will be zero");
            }

            if config.validation.min_artifact_units == 0 {
                warnings.push("min_artifact_units = 0 accepts any reply with a start marker");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Tiers:        {}", config.tiers.len());
            println!("   Max attempts: {}", config.escalation.max_attempts);
            println!("   Merge:        {:?}", config.merge);
            println!(
                "   Ratios:       truncated < {} ≤ possibly incomplete < {}",
                config.validation.truncated_ratio, config.validation.complete_ratio
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn default() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", PipelineConfig::default_toml());
    Ok(())
}

pub async fn path(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PipelineConfig::config_dir().join("config.toml"));
    println!("{}", config_path.display());
    Ok(())
}
