//! aotguard - Freshness governor for ahead-of-time compiled artifacts
//!
//! Decides whether a previously compiled artifact for a bytecode source is
//! still valid to use and, when it is not, regenerates it through an external
//! compiler without ever exposing a partially written output.

#[cfg(not(unix))]
compile_error!("aotguard relies on unix file descriptors and permissions");

pub mod artifact;
pub mod assistant;
pub mod boot_image;
pub mod candidate;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod error;
pub mod filter;
pub mod freshness;
pub mod isa;
pub mod lazy;
pub mod location;
pub mod lock;
pub mod regenerate;
pub mod source;

pub use assistant::{ArtifactAssistant, Collaborators, RegenerationPlan};
pub use candidate::CandidateKind;
pub use error::{GovernorError, GovernorResult, UpdateResult};
pub use filter::CompilerFilter;
pub use freshness::{FreshnessStatus, RegenerationDecision};
pub use isa::InstructionSet;
