//! Error types for aotguard
//!
//! All modules use `GovernorResult<T>` as their return type. Errors raised
//! while evaluating freshness are recoverable: they downgrade a status or a
//! decision and are logged. Errors raised while regenerating map onto a
//! coarse [`UpdateResult`] through [`GovernorError::update_result`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for aotguard operations
pub type GovernorResult<T> = Result<T, GovernorError>;

/// Coarse outcome of an attempt to bring an artifact up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    /// Preconditions were not met; nothing on disk was touched
    NotAttempted,
    /// The compiler ran (or was about to) and its outputs were discarded
    Failed,
    /// The artifact is now up to date
    Succeeded,
}

impl UpdateResult {
    /// Coarse result of an update outcome
    pub fn of<T>(outcome: &GovernorResult<T>) -> Self {
        match outcome {
            Ok(_) => Self::Succeeded,
            Err(e) => e.update_result(),
        }
    }
}

impl std::fmt::Display for UpdateResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAttempted => write!(f, "not attempted"),
            Self::Failed => write!(f, "failed"),
            Self::Succeeded => write!(f, "succeeded"),
        }
    }
}

/// All errors that can occur in aotguard
#[derive(Error, Debug)]
pub enum GovernorError {
    // Location errors
    #[error("Cannot derive artifact path for {location}: {reason}")]
    PathResolution { location: PathBuf, reason: String },

    #[error("Unknown instruction set: {0}")]
    UnknownInstructionSet(String),

    // Freshness errors
    #[error("Source {location} is unavailable: {reason}")]
    SourceUnavailable { location: PathBuf, reason: String },

    #[error("Checksum does not match for {unit}. Expected: {expected:#010x}, actual: {actual:#010x}")]
    ChecksumMismatch {
        unit: String,
        expected: u32,
        actual: u32,
    },

    #[error("Expected {expected} source units but found {actual}")]
    UnitCountMismatch { expected: usize, actual: usize },

    #[error("Artifact is incompatible with the running configuration: {0}")]
    FormatIncompatible(String),

    #[error("Malformed artifact {path}: {reason}")]
    ArtifactFormat { path: PathBuf, reason: String },

    // Regeneration errors
    #[error("Generation of artifact for {0} not attempted because compilation is disabled")]
    CompilationDisabled(PathBuf),

    #[error("Unknown compiler filter: {0}")]
    UnknownCompilerFilter(String),

    #[error("Compiler failed: {command}: {detail}")]
    SubprocessFailure { command: String, detail: String },

    #[error("Unable to close {path}: {source}")]
    CloseFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("Filesystem error: {context}")]
    Filesystem {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl GovernorError {
    /// Create a filesystem error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Filesystem {
            context: context.into(),
            source,
        }
    }

    /// Create a path resolution error
    pub fn path_resolution(location: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::PathResolution {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// Create a subprocess failure error
    pub fn subprocess(command: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::SubprocessFailure {
            command: command.into(),
            detail: detail.into(),
        }
    }

    /// Coarse update result this error corresponds to
    ///
    /// Only compiler and close failures count as a failed attempt; everything
    /// else is rejected before any output is produced.
    pub fn update_result(&self) -> UpdateResult {
        match self {
            Self::SubprocessFailure { .. } | Self::CloseFailure { .. } => UpdateResult::Failed,
            _ => UpdateResult::NotAttempted,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CompilationDisabled(_) => {
                Some("Set runtime.compilation_enabled = true in the config file")
            }
            Self::UnknownCompilerFilter(_) => {
                Some("Valid filters: assume-verified, extract, verify, quicken, space-profile, space, speed-profile, speed, everything-profile, everything")
            }
            Self::PathResolution { .. } => {
                Some("Source locations must be absolute and carry a file extension")
            }
            _ => None,
        }
    }
}
