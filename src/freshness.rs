//! Freshness evaluation
//!
//! Decides whether one candidate artifact may be used for a source, and what
//! kind of regeneration would bring it up to date. Evaluation is a pure
//! function of the artifact header and an [`EvaluationContext`]; the caching
//! of inputs and results lives in the assistant.
//!
//! # Gates
//!
//! | Order | Gate | Failure status |
//! |-------|------|----------------|
//! | 1 | concurrent-copying flag matches runtime | `CannotOpen` |
//! | 2 | unit count and checksums match source | `SourceOutOfDate` |
//! | 3 | boot image checksum (image-dependent filters) | `BootImageOutOfDate` |
//! | 4 | base address and patch delta (non-PIC native code) | `NeedsRelocation` |

use crate::artifact::{ArtifactHeader, MetadataHeader};
use crate::boot_image::BootImageInfo;
use crate::error::{GovernorError, GovernorResult};
use crate::filter::CompilerFilter;
use crate::source::unit_location;
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Freshness of one candidate artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FreshnessStatus {
    /// Neither the artifact nor its metadata can be used at all
    CannotOpen,
    /// Compiled from different source content
    SourceOutOfDate,
    /// Compiled against a different boot image
    BootImageOutOfDate,
    /// Valid, but native code must be relocated before it can run
    NeedsRelocation,
    /// Valid as is
    UpToDate,
}

impl FreshnessStatus {
    /// Whether the artifact can be loaded, possibly without running its code
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::NeedsRelocation | Self::UpToDate)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::CannotOpen => 0,
            Self::SourceOutOfDate | Self::BootImageOutOfDate => 1,
            Self::NeedsRelocation => 2,
            Self::UpToDate => 3,
        }
    }
}

// The two out-of-date states are incomparable.
impl PartialOrd for FreshnessStatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => None,
            ordering => Some(ordering),
        }
    }
}

impl fmt::Display for FreshnessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CannotOpen => "cannot-open",
            Self::SourceOutOfDate => "source-out-of-date",
            Self::BootImageOutOfDate => "boot-image-out-of-date",
            Self::NeedsRelocation => "needs-relocation",
            Self::UpToDate => "up-to-date",
        };
        write!(f, "{}", name)
    }
}

/// Checksums every candidate is compared against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredChecksums {
    /// Per-unit checksums in unit order
    pub checksums: Vec<u32>,
    /// Read from the source itself rather than recovered from an artifact
    pub from_original_source: bool,
}

/// Shared inputs of an evaluation
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub source_location: &'a Path,
    pub required_checksums: Option<&'a RequiredChecksums>,
    pub boot_image: Option<&'a BootImageInfo>,
    pub runtime_concurrent_copying: bool,
    pub accept_unvalidated_without_source: bool,
}

impl EvaluationContext<'_> {
    /// Whether the authoritative source content was readable
    pub fn has_original_source(&self) -> bool {
        self.required_checksums
            .is_some_and(|required| required.from_original_source)
    }
}

/// Compare a candidate's unit checksums against the required ones
///
/// Unknown required checksums are treated as matching.
pub fn verify_checksums(
    source_location: &Path,
    required: Option<&RequiredChecksums>,
    actual: &[u32],
) -> GovernorResult<()> {
    let Some(required) = required else {
        warn!("Required checksums not found. Assuming checksums are up to date.");
        return Ok(());
    };

    if required.checksums.len() != actual.len() {
        return Err(GovernorError::UnitCountMismatch {
            expected: required.checksums.len(),
            actual: actual.len(),
        });
    }

    for (index, (&expected, &actual)) in required.checksums.iter().zip(actual).enumerate() {
        if expected != actual {
            return Err(GovernorError::ChecksumMismatch {
                unit: unit_location(index, source_location).display().to_string(),
                expected,
                actual,
            });
        }
    }
    Ok(())
}

/// Evaluate an opened artifact
pub fn evaluate_artifact(header: &ArtifactHeader, ctx: &EvaluationContext<'_>) -> FreshnessStatus {
    if header.concurrent_copying != ctx.runtime_concurrent_copying {
        let err = GovernorError::FormatIncompatible(format!(
            "artifact concurrent-copying={}, runtime concurrent-copying={}",
            header.concurrent_copying, ctx.runtime_concurrent_copying
        ));
        debug!("{}", err);
        return FreshnessStatus::CannotOpen;
    }

    if let Err(e) = verify_checksums(
        ctx.source_location,
        ctx.required_checksums,
        &header.unit_checksums,
    ) {
        warn!("{}", e);
        return FreshnessStatus::SourceOutOfDate;
    }

    let filter = header.compiler_filter;

    if filter.depends_on_image_checksum() {
        match ctx.boot_image {
            None => {
                debug!("No boot image for artifact image checksum to match against");
                if ctx.has_original_source() || !ctx.accept_unvalidated_without_source {
                    return FreshnessStatus::BootImageOutOfDate;
                }
                // Nothing better can ever be produced for this source, so the
                // artifact is accepted without image validation.
                warn!(
                    "Source {} does not seem to include any units. Allowing unvalidated artifact use.",
                    ctx.source_location.display()
                );
            }
            Some(image) if header.boot_image_checksum != image.checksum => {
                debug!(
                    "Artifact image checksum {:#010x} does not match boot image checksum {:#010x}",
                    header.boot_image_checksum, image.checksum
                );
                return FreshnessStatus::BootImageOutOfDate;
            }
            Some(_) => {}
        }
    } else {
        debug!("Image checksum test skipped for compiler filter {}", filter);
    }

    if filter.is_aot_compilation_enabled() {
        if header.position_independent {
            debug!("Relocation test skipped for position-independent artifact");
        } else {
            let Some(image) = ctx.boot_image else {
                debug!("No boot image to check relocation against");
                return FreshnessStatus::NeedsRelocation;
            };

            if header.boot_image_base_address != image.base_address {
                debug!(
                    "Artifact image base address ({:#x}) does not match actual image base address ({:#x})",
                    header.boot_image_base_address, image.base_address
                );
                return FreshnessStatus::NeedsRelocation;
            }

            if header.boot_image_patch_delta != image.patch_delta {
                debug!(
                    "Artifact image patch delta ({}) does not match actual image patch delta ({})",
                    header.boot_image_patch_delta, image.patch_delta
                );
                return FreshnessStatus::NeedsRelocation;
            }
        }
    } else {
        debug!("Relocation test skipped for compiler filter {}", filter);
    }

    FreshnessStatus::UpToDate
}

/// Evaluate a candidate whose artifact could not be opened, from its metadata
pub fn evaluate_metadata(
    metadata: GovernorResult<MetadataHeader>,
    ctx: &EvaluationContext<'_>,
) -> FreshnessStatus {
    let metadata = match metadata {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!("Unable to open metadata: {}", e);
            return FreshnessStatus::CannotOpen;
        }
    };

    match verify_checksums(
        ctx.source_location,
        ctx.required_checksums,
        &metadata.unit_checksums,
    ) {
        // Metadata alone cannot prove boot image compatibility.
        Ok(()) => FreshnessStatus::BootImageOutOfDate,
        Err(e) => {
            debug!("{}", e);
            FreshnessStatus::SourceOutOfDate
        }
    }
}

/// What it takes to bring a candidate up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegenerationDecision {
    /// Usable as is, or nothing better can be produced
    NoOpNeeded,
    /// Compile from the original source
    FromScratch,
    /// Recompile against the current boot image
    ForBootImage,
    /// Relocate existing native code
    ForRelocation,
    /// Recompile with a more capable filter
    ForFilter,
}

impl RegenerationDecision {
    /// Whether the decision requires running the compiler
    pub fn needs_compilation(&self) -> bool {
        !matches!(self, Self::NoOpNeeded)
    }
}

impl fmt::Display for RegenerationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoOpNeeded => "no-op-needed",
            Self::FromScratch => "from-scratch",
            Self::ForBootImage => "for-boot-image",
            Self::ForRelocation => "for-relocation",
            Self::ForFilter => "for-filter",
        };
        write!(f, "{}", name)
    }
}

/// Whether a candidate compiled with `current` satisfies a request for `target`
///
/// A candidate that could not be opened never does.
pub fn filter_is_okay(
    current: Option<CompilerFilter>,
    target: CompilerFilter,
    profile_changed: bool,
) -> bool {
    let Some(current) = current else {
        return false;
    };

    if profile_changed && current.depends_on_profile() {
        debug!("Compiler filter not okay because profile changed");
        return false;
    }
    current.is_as_good_as(target)
}

/// Decide the regeneration a candidate needs
pub fn decide(
    status: FreshnessStatus,
    filter_okay: bool,
    target: CompilerFilter,
    has_original_source: bool,
) -> RegenerationDecision {
    let compilation_desired = target.is_aot_compilation_enabled();

    if filter_okay && status == FreshnessStatus::UpToDate {
        return RegenerationDecision::NoOpNeeded;
    }

    // Without native code wanted, relocation is irrelevant.
    if filter_okay && !compilation_desired && status == FreshnessStatus::NeedsRelocation {
        return RegenerationDecision::NoOpNeeded;
    }

    if filter_okay && status == FreshnessStatus::NeedsRelocation {
        return RegenerationDecision::ForRelocation;
    }

    if status.is_usable() {
        return RegenerationDecision::ForFilter;
    }

    if status == FreshnessStatus::BootImageOutOfDate {
        return RegenerationDecision::ForBootImage;
    }

    if has_original_source {
        RegenerationDecision::FromScratch
    } else {
        RegenerationDecision::NoOpNeeded
    }
}
