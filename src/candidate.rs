//! Candidate artifacts
//!
//! A candidate owns only its own path, lazily opened artifact and cached
//! status. Everything shared between candidates (source location, checksums,
//! boot image) is passed in by the assistant when a status is computed.

use crate::artifact::{ArtifactReader, CompiledArtifact};
use crate::filter::CompilerFilter;
use crate::freshness::FreshnessStatus;
use crate::lazy::Cached;
use crate::location::metadata_path;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which of the two artifact locations a candidate lives at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateKind {
    /// Beside the source, under `oat/<arch>/`
    CoLocated,
    /// Under the per-architecture cache directory
    Cache,
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CoLocated => write!(f, "co-located"),
            Self::Cache => write!(f, "cache"),
        }
    }
}

/// One possible artifact for a source
#[derive(Debug)]
pub struct Candidate {
    kind: CandidateKind,
    path: Option<PathBuf>,
    artifact: Cached<CompiledArtifact>,
    status: Cached<FreshnessStatus>,
    released: bool,
}

impl Candidate {
    /// Create a candidate; `path` is `None` when it could not be resolved
    pub fn new(kind: CandidateKind, path: Option<PathBuf>) -> Self {
        Self {
            kind,
            path,
            artifact: Cached::NotComputed,
            status: Cached::NotComputed,
            released: false,
        }
    }

    pub fn kind(&self) -> CandidateKind {
        self.kind
    }

    /// Resolved artifact path
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Resolved metadata companion path
    pub fn metadata_path(&self) -> Option<PathBuf> {
        self.path.as_deref().map(metadata_path)
    }

    /// Open the artifact on first use
    ///
    /// # Panics
    ///
    /// Panics if the artifact has already been released to a caller.
    pub fn load(
        &mut self,
        reader: &dyn ArtifactReader,
        executable: bool,
    ) -> Option<&CompiledArtifact> {
        self.assert_not_released();
        let path = self.path.as_deref();
        self.artifact.get_or_compute(|| {
            let path = path?;
            match reader.open_artifact(path, executable) {
                Ok(artifact) => Some(artifact),
                Err(e) => {
                    debug!("Existing artifact test for {}: {}", path.display(), e);
                    None
                }
            }
        })
    }

    /// The artifact if it has already been opened
    pub fn loaded(&self) -> Option<&CompiledArtifact> {
        self.assert_not_released();
        self.artifact.get()
    }

    /// Filter of the opened artifact
    pub fn compiler_filter(&self) -> Option<CompilerFilter> {
        self.loaded().map(|artifact| artifact.header().compiler_filter)
    }

    /// Status computed since the last reset
    pub fn cached_status(&self) -> Option<FreshnessStatus> {
        self.assert_not_released();
        self.status.get().copied()
    }

    pub(crate) fn record_status(&mut self, status: FreshnessStatus) {
        self.status = Cached::Computed(status);
    }

    /// Drop the opened artifact and status so both are re-derived from disk
    pub fn reset(&mut self) {
        self.artifact.invalidate();
        self.status.invalidate();
    }

    /// Hand the opened artifact over to the caller
    ///
    /// The candidate must not be queried afterwards.
    pub fn release(&mut self) -> Option<CompiledArtifact> {
        self.assert_not_released();
        self.released = true;
        self.artifact.take()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn assert_not_released(&self) {
        assert!(
            !self.released,
            "{} artifact accessed after it was released for use",
            self.kind
        );
    }
}
