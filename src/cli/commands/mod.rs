//! CLI command implementations

pub mod config;
pub mod plan;
pub mod status;
pub mod update;

pub use config::execute as config;
pub use plan::execute as plan;
pub use status::execute as status;
pub use update::execute as update;

use crate::assistant::ArtifactAssistant;
use crate::cli::args::SourceArgs;
use crate::config::Config;
use crate::error::{GovernorError, GovernorResult};
use crate::filter::CompilerFilter;
use crate::isa::InstructionSet;

/// Instruction set requested on the command line, or the host's
fn resolve_isa(args: &SourceArgs) -> GovernorResult<InstructionSet> {
    match args.isa {
        Some(isa) => Ok(isa),
        None => InstructionSet::runtime()
            .ok_or_else(|| GovernorError::UnknownInstructionSet(std::env::consts::ARCH.to_string())),
    }
}

/// Build an assistant for the source named on the command line
///
/// Artifacts are never opened executable from the CLI.
fn open_assistant(args: &SourceArgs, config: &Config) -> GovernorResult<ArtifactAssistant> {
    let isa = resolve_isa(args)?;
    Ok(ArtifactAssistant::new(&args.source, isa, false, config.clone()))
}

/// Target filter from the command line, or from the configured compiler options
fn resolve_filter(filter: Option<CompilerFilter>, config: &Config) -> GovernorResult<CompilerFilter> {
    match filter {
        Some(filter) => Ok(filter),
        None => CompilerFilter::from_compiler_options(&config.runtime.compiler_options),
    }
}
