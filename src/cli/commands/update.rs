//! Update command - regenerate the best artifact if needed
//!
//! An up-to-date artifact is reported without touching the filesystem. Only
//! when compilation is needed are the cache directory and lock file created,
//! and the plan is then recomputed under the lock.

use crate::assistant::{ArtifactAssistant, RegenerationPlan};
use crate::cli::args::PlanArgs;
use crate::cli::commands::{open_assistant, resolve_filter, resolve_isa};
use crate::config::{Config, ConfigManager};
use crate::error::{GovernorResult, UpdateResult};
use console::{style, Emoji};
use tracing::{debug, info};

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");

/// Execute the update command
pub async fn execute(args: PlanArgs, config: &Config) -> GovernorResult<()> {
    let target = resolve_filter(args.filter, config)?;

    let mut assistant = open_assistant(&args.source, config)?;
    let plan = assistant.regeneration_plan(target, args.profile_changed);
    if !plan.needs_compilation() {
        report(&plan, &artifact_path(&assistant, &plan));
        return Ok(());
    }

    let isa = resolve_isa(&args.source)?;
    let cache_dir = ConfigManager::ensure_cache_dir(config, isa).await?;
    debug!("Using cache directory {}", cache_dir.display());

    // Another process may have regenerated while we waited, so start afresh.
    let mut assistant = open_assistant(&args.source, config)?;
    let lock = assistant.lock()?;
    debug!("Holding {}", lock.path().display());

    let outcome = assistant.update_to(target, args.profile_changed).await;
    info!("Update {}", UpdateResult::of(&outcome));
    let plan = outcome?;

    report(&plan, &artifact_path(&assistant, &plan));
    Ok(())
}

fn artifact_path(assistant: &ArtifactAssistant, plan: &RegenerationPlan) -> String {
    assistant
        .candidate(plan.target)
        .path()
        .map(|path| path.display().to_string())
        .unwrap_or_default()
}

fn report(plan: &RegenerationPlan, path: &str) {
    if plan.needs_compilation() {
        println!(
            "{} Regenerated {} artifact ({}) {}",
            CHECK,
            plan.target,
            plan.decision,
            style(path).dim()
        );
    } else {
        println!(
            "{} {} artifact is up to date {}",
            CHECK,
            plan.target,
            style(path).dim()
        );
    }
}
