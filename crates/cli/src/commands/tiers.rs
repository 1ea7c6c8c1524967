//! `docforge tiers`: list the configured tier ladder.

use std::path::Path;

use super::load_config;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let ladder = config.ladder();

    println!("🪜 Tier Ladder (cheapest first, prices per 1M tokens)");
    println!("─────────────────────────────────────────────────────────────────────");
    println!(
        "{:<4} {:<12} {:<32} {:>8} {:>8} {:>8}",
        "Rank", "Tier", "Model", "MaxOut", "Input", "Output"
    );
    for (rank, tier) in ladder.iter().enumerate() {
        println!(
            "{:<4} {:<12} {:<32} {:>8} ${:>7.3} ${:>7.3}",
            rank, tier.id, tier.model, tier.max_output_tokens, tier.input_per_m, tier.output_per_m
        );
    }

    println!();
    println!("  Max attempts per task:    {}", config.escalation.max_attempts);
    println!(
        "  Modify on top tier when:  prior artifact > {} chars",
        config.escalation.preescalate_prior_units
    );
    println!(
        "  Reinforce on retry:       {}",
        if config.escalation.reinforce_on_retry { "yes" } else { "no" }
    );

    Ok(())
}
