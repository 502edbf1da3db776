//! Status command - show the freshness of both candidate artifacts

use crate::assistant::ArtifactAssistant;
use crate::candidate::CandidateKind;
use crate::cli::args::{OutputFormat, StatusArgs};
use crate::cli::commands::open_assistant;
use crate::config::Config;
use crate::error::GovernorResult;
use crate::freshness::FreshnessStatus;
use console::{style, Emoji};
use serde_json::json;

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "[STALE] ");
static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");

const CANDIDATES: [CandidateKind; 2] = [CandidateKind::CoLocated, CandidateKind::Cache];

/// Execute the status command
pub async fn execute(args: StatusArgs, config: &Config) -> GovernorResult<()> {
    let mut assistant = open_assistant(&args.source, config)?;

    match args.format {
        OutputFormat::Text => print_text(&mut assistant),
        OutputFormat::Json => print_json(&mut assistant)?,
    }

    Ok(())
}

fn print_text(assistant: &mut ArtifactAssistant) {
    println!(
        "{} {} ({})",
        style("Source:").bold(),
        assistant.source_location().display(),
        assistant.isa()
    );
    if assistant.is_in_boot_class_path() {
        println!("  {} in boot class path", WARN);
    }
    if !assistant.has_original_source() {
        println!("  {} original source content unavailable", WARN);
    }
    if !assistant.is_source_dir_writable() {
        println!("  {} source directory is not writable", WARN);
    }
    println!();

    for kind in CANDIDATES {
        let status = assistant.candidate_status(kind);
        let candidate = assistant.candidate(kind);
        let path = candidate
            .path()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "(unresolved)".to_string());
        let filter = candidate
            .compiler_filter()
            .map(|filter| filter.to_string())
            .unwrap_or_else(|| "-".to_string());

        let marker = match status {
            FreshnessStatus::UpToDate => style(format!("{}{}", CHECK, status)).green(),
            FreshnessStatus::NeedsRelocation => style(format!("{}{}", WARN, status)).yellow(),
            _ => style(format!("{}{}", CROSS, status)).red(),
        };
        println!(
            "  {} {} {}",
            style(format!("{:<11}", kind.to_string())).bold(),
            marker,
            style(filter).dim()
        );
        println!("  {:<11} {}", "", style(path).dim());
    }

    println!();
    let best = assistant.best_candidate_kind();
    if assistant.is_up_to_date() {
        println!("{} {} artifact is up to date", CHECK, best);
    } else {
        println!(
            "{} {} artifact is not up to date, run {}",
            CROSS,
            best,
            style("aotguard update").cyan()
        );
    }
}

fn print_json(assistant: &mut ArtifactAssistant) -> GovernorResult<()> {
    let mut candidates = Vec::new();
    for kind in CANDIDATES {
        let status = assistant.candidate_status(kind);
        let candidate = assistant.candidate(kind);
        candidates.push(json!({
            "kind": candidate.kind().to_string(),
            "path": candidate.path(),
            "status": status.to_string(),
            "compiler_filter": candidate.compiler_filter(),
        }));
    }

    let best = assistant.best_candidate_kind();
    let output = json!({
        "source": assistant.source_location(),
        "isa": assistant.isa(),
        "has_original_source": assistant.has_original_source(),
        "in_boot_class_path": assistant.is_in_boot_class_path(),
        "source_dir_writable": assistant.is_source_dir_writable(),
        "candidates": candidates,
        "best": best.to_string(),
        "up_to_date": assistant.is_up_to_date(),
        "dump": assistant.status_dump(),
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
