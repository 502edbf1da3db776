//! Plan command - show what regeneration the best artifact needs

use crate::cli::args::PlanArgs;
use crate::cli::commands::{open_assistant, resolve_filter};
use crate::config::Config;
use crate::error::GovernorResult;
use console::style;

/// Execute the plan command
pub async fn execute(args: PlanArgs, config: &Config) -> GovernorResult<()> {
    let target = resolve_filter(args.filter, config)?;
    let mut assistant = open_assistant(&args.source, config)?;
    let plan = assistant.regeneration_plan(target, args.profile_changed);

    let path = assistant
        .candidate(plan.target)
        .path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "(unresolved)".to_string());

    println!("{} {}", style("Decision:").bold(), plan.decision);
    println!("{} {} {}", style("Target:").bold(), plan.target, style(path).dim());
    println!("{} {}", style("Filter:").bold(), target);

    if plan.needs_compilation() {
        println!();
        println!("Run {} to regenerate", style("aotguard update").cyan());
    }

    Ok(())
}
