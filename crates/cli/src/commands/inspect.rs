//! `docforge inspect`: judge a captured reply without calling any provider.
//!
//! Useful for tuning the validation thresholds against real output.

use clap::{Args, ValueEnum};
use docforge_core::{FinishReason, GenerationMode, MergeMode, ValidationOutcome, units};
use docforge_pipeline::{AssessContext, Assessor, strategy_for};
use std::path::{Path, PathBuf};

use super::load_config;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Summary,
    Json,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// File holding the raw reply text
    pub response: PathBuf,

    /// Prior artifact; judges the reply as a modification of it
    #[arg(short, long)]
    pub prior: Option<PathBuf>,

    /// The reply ended at the output limit
    #[arg(long)]
    pub length_limited: bool,

    /// How to print the outcome
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
    pub format: OutputFormat,

    /// Print the extracted artifact after the summary
    #[arg(long)]
    pub show_artifact: bool,
}

pub async fn run(
    config_path: Option<&Path>,
    args: InspectArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let text = std::fs::read_to_string(&args.response)?;
    let prior = args
        .prior
        .as_deref()
        .map(std::fs::read_to_string)
        .transpose()?;

    let outcome = inspect(
        &Assessor::from_config(&config),
        &text,
        prior.as_deref(),
        args.length_limited,
        config.merge,
    );

    if args.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let verdict = if outcome.completeness.is_acceptable() {
        "✅ accepted"
    } else {
        "❌ rejected"
    };
    println!("🔍 {}", args.response.display());
    println!("   Verdict:        {verdict}");
    println!("   Classification: {}", outcome.classification);
    println!("   Completeness:   {}", outcome.completeness);
    println!("   Reply units:    {}", units(&text));
    if let Some(artifact) = &outcome.extracted_artifact {
        println!("   Artifact units: {}", units(artifact));
    }
    if let Some(prior) = &prior {
        println!("   Prior units:    {}", units(prior));
    }
    for issue in &outcome.issues {
        println!("   ⚠️  {issue}");
    }

    if args.show_artifact {
        if let Some(artifact) = &outcome.extracted_artifact {
            println!();
            println!("{artifact}");
        }
    }

    Ok(())
}

fn inspect(
    assessor: &Assessor,
    text: &str,
    prior: Option<&str>,
    length_limited: bool,
    merge: MergeMode,
) -> ValidationOutcome {
    let ctx = AssessContext {
        mode: if prior.is_some() {
            GenerationMode::Modify
        } else {
            GenerationMode::Generate
        },
        prior_artifact: prior,
        finish_reason: if length_limited {
            FinishReason::LengthLimited
        } else {
            FinishReason::NaturalStop
        },
    };
    assessor.assess(text, ctx, strategy_for(merge).as_ref())
}
