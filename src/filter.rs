//! Compiler filters
//!
//! A filter names how aggressively a source is compiled. Filters are totally
//! ordered by capability; the order also decides which freshness checks an
//! artifact compiled with that filter is subject to.

use crate::error::{GovernorError, GovernorResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Compiler filter, declared from least to most capable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompilerFilter {
    /// Skip verification, keep bytecode as is
    AssumeVerified,
    /// Extract bytecode only
    Extract,
    /// Verify only
    Verify,
    /// Verify and apply bytecode rewrites
    Quicken,
    /// Compile profiled methods for size
    SpaceProfile,
    /// Compile everything for size
    Space,
    /// Compile profiled methods for speed
    SpeedProfile,
    /// Compile everything for speed
    Speed,
    /// Compile every method in the profile, including trivial ones
    EverythingProfile,
    /// Compile every method
    Everything,
}

/// Filter used when nothing is configured
pub const DEFAULT_FILTER: CompilerFilter = CompilerFilter::Quicken;

impl CompilerFilter {
    /// Whether artifacts compiled with this filter contain native code
    pub fn is_aot_compilation_enabled(&self) -> bool {
        *self >= Self::SpaceProfile
    }

    /// Whether the artifact embeds the boot image checksum it was built against
    pub fn depends_on_image_checksum(&self) -> bool {
        self.is_aot_compilation_enabled()
    }

    /// Whether the filter only compiles what a profile selected
    pub fn depends_on_profile(&self) -> bool {
        matches!(
            self,
            Self::SpaceProfile | Self::SpeedProfile | Self::EverythingProfile
        )
    }

    /// Whether an artifact compiled with `self` satisfies a request for `target`
    pub fn is_as_good_as(&self, target: CompilerFilter) -> bool {
        *self >= target
    }

    /// Canonical name as understood by the compiler
    pub fn name(&self) -> &'static str {
        match self {
            Self::AssumeVerified => "assume-verified",
            Self::Extract => "extract",
            Self::Verify => "verify",
            Self::Quicken => "quicken",
            Self::SpaceProfile => "space-profile",
            Self::Space => "space",
            Self::SpeedProfile => "speed-profile",
            Self::Speed => "speed",
            Self::EverythingProfile => "everything-profile",
            Self::Everything => "everything",
        }
    }

    /// Find the last `--compiler-filter=` entry in a list of compiler options
    pub fn from_compiler_options(options: &[String]) -> GovernorResult<Self> {
        let mut filter = DEFAULT_FILTER;
        for option in options {
            if let Some(name) = option.strip_prefix("--compiler-filter=") {
                filter = name.parse()?;
            }
        }
        Ok(filter)
    }
}

impl fmt::Display for CompilerFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for CompilerFilter {
    type Err = GovernorError;

    fn from_str(s: &str) -> GovernorResult<Self> {
        match s {
            "assume-verified" => Ok(Self::AssumeVerified),
            "extract" => Ok(Self::Extract),
            "verify" => Ok(Self::Verify),
            "quicken" => Ok(Self::Quicken),
            "space-profile" => Ok(Self::SpaceProfile),
            "space" => Ok(Self::Space),
            "speed-profile" => Ok(Self::SpeedProfile),
            "speed" => Ok(Self::Speed),
            "everything-profile" => Ok(Self::EverythingProfile),
            "everything" => Ok(Self::Everything),
            other => Err(GovernorError::UnknownCompilerFilter(other.to_string())),
        }
    }
}

// Serialized by name so artifact headers stay readable.
impl Serialize for CompilerFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for CompilerFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
