//! Target instruction sets
//!
//! Artifacts are compiled per architecture; the architecture name keys both
//! the co-located `oat/<arch>/` directory and the cache subdirectory.

use crate::error::{GovernorError, GovernorResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported instruction sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionSet {
    Arm,
    Arm64,
    X86,
    X86_64,
    Mips,
    Mips64,
}

impl InstructionSet {
    /// The instruction set of the running process, if it is a supported one
    pub fn runtime() -> Option<Self> {
        match std::env::consts::ARCH {
            "arm" => Some(Self::Arm),
            "aarch64" => Some(Self::Arm64),
            "x86" => Some(Self::X86),
            "x86_64" => Some(Self::X86_64),
            "mips" => Some(Self::Mips),
            "mips64" => Some(Self::Mips64),
            _ => None,
        }
    }

    /// Directory name used in artifact layouts
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arm => "arm",
            Self::Arm64 => "arm64",
            Self::X86 => "x86",
            Self::X86_64 => "x86_64",
            Self::Mips => "mips",
            Self::Mips64 => "mips64",
        }
    }

    /// Whether this is the instruction set of the running process
    pub fn is_runtime(&self) -> bool {
        Self::runtime() == Some(*self)
    }
}

impl fmt::Display for InstructionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InstructionSet {
    type Err = GovernorError;

    fn from_str(s: &str) -> GovernorResult<Self> {
        match s {
            "arm" => Ok(Self::Arm),
            "arm64" => Ok(Self::Arm64),
            "x86" => Ok(Self::X86),
            "x86_64" => Ok(Self::X86_64),
            "mips" => Ok(Self::Mips),
            "mips64" => Ok(Self::Mips64),
            other => Err(GovernorError::UnknownInstructionSet(other.to_string())),
        }
    }
}
