//! Artifact assistant
//!
//! [`ArtifactAssistant`] answers, for one source and instruction set, which
//! compiled artifact should be used and what it would take to bring it up to
//! date, and performs that regeneration on request.
//!
//! Every expensive input is computed lazily and at most once:
//!
//! - the two candidate paths are resolved at construction
//! - required checksums and boot image info on first use
//! - each candidate's artifact handle and status on first query, until the
//!   candidate is reset by a regeneration
//!
//! An assistant is confined to one task; all lazy queries take `&mut self`.

use crate::artifact::{ArtifactReader, CompiledArtifact, JsonArtifactReader};
use crate::boot_image::{BootImageInfo, BootImageProvider, FileBootImageProvider};
use crate::candidate::{Candidate, CandidateKind};
use crate::compiler::{Compiler, ExternalCompiler};
use crate::config::Config;
use crate::error::{GovernorError, GovernorResult};
use crate::filter::CompilerFilter;
use crate::freshness::{
    decide, evaluate_artifact, evaluate_metadata, filter_is_okay, EvaluationContext,
    FreshnessStatus, RegenerationDecision, RequiredChecksums,
};
use crate::isa::InstructionSet;
use crate::lazy::Cached;
use crate::location::{lock_path, ResolvedLocations};
use crate::lock::AdvisoryLock;
use crate::regenerate::{regenerate, RegenerationRequest};
use crate::source::{FileSourceReader, SourceReader};
use std::ffi::CString;
use std::fmt;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// External collaborators of an assistant
pub struct Collaborators {
    pub source_reader: Box<dyn SourceReader>,
    pub artifact_reader: Box<dyn ArtifactReader>,
    pub boot_image: Box<dyn BootImageProvider>,
    pub compiler: Box<dyn Compiler>,
}

impl Collaborators {
    /// File-backed collaborators and the external compiler
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_reader: Box::new(FileSourceReader),
            artifact_reader: Box::new(JsonArtifactReader),
            boot_image: Box::new(FileBootImageProvider::new(
                config.boot_image.location.clone(),
            )),
            compiler: Box::new(ExternalCompiler),
        }
    }
}

/// A regeneration decision and the candidate it applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegenerationPlan {
    pub decision: RegenerationDecision,
    pub target: CandidateKind,
}

impl RegenerationPlan {
    pub fn needs_compilation(&self) -> bool {
        self.decision.needs_compilation()
    }
}

impl fmt::Display for RegenerationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.decision, self.target)
    }
}

/// Whether the current process may create entries in `dir`
fn is_writable_dir(dir: &Path) -> bool {
    let Ok(raw) = CString::new(dir.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: `raw` is a valid NUL-terminated string for the whole call.
    unsafe { libc::access(raw.as_ptr(), libc::W_OK) == 0 }
}

/// Freshness governor for one source and instruction set
pub struct ArtifactAssistant {
    source_location: PathBuf,
    isa: InstructionSet,
    load_executable: bool,
    config: Config,
    collaborators: Collaborators,
    source_dir_writable: bool,
    co_located: Candidate,
    cache: Candidate,
    required_checksums: Cached<RequiredChecksums>,
    boot_image: Cached<BootImageInfo>,
    lock: Option<AdvisoryLock>,
}

impl ArtifactAssistant {
    /// Create an assistant using the file-backed collaborators
    pub fn new(
        source_location: impl AsRef<Path>,
        isa: InstructionSet,
        load_executable: bool,
        config: Config,
    ) -> Self {
        let collaborators = Collaborators::from_config(&config);
        Self::with_collaborators(source_location, isa, load_executable, config, collaborators)
    }

    /// Create an assistant with explicit collaborators
    pub fn with_collaborators(
        source_location: impl AsRef<Path>,
        isa: InstructionSet,
        load_executable: bool,
        config: Config,
        collaborators: Collaborators,
    ) -> Self {
        let given = source_location.as_ref();
        let source_location = match fs::canonicalize(given) {
            Ok(path) => path,
            Err(e) => {
                warn!("Failed to resolve source location {}: {}", given.display(), e);
                given.to_path_buf()
            }
        };

        let load_executable = if load_executable && !isa.is_runtime() {
            warn!(
                "Artifacts for {} cannot be executed by this process; loading non-executable",
                isa
            );
            false
        } else {
            load_executable
        };

        let locations = ResolvedLocations::resolve(&source_location, &config.cache.root, isa);
        let source_dir_writable = source_location.parent().is_some_and(is_writable_dir);
        debug!(
            "Assistant for {} ({}): co-located={:?} cache={:?} writable={}",
            source_location.display(),
            isa,
            locations.co_located,
            locations.cache,
            source_dir_writable
        );

        Self {
            source_location,
            isa,
            load_executable,
            config,
            collaborators,
            source_dir_writable,
            co_located: Candidate::new(CandidateKind::CoLocated, locations.co_located),
            cache: Candidate::new(CandidateKind::Cache, locations.cache),
            required_checksums: Cached::NotComputed,
            boot_image: Cached::NotComputed,
            lock: None,
        }
    }

    /// Source location, canonicalised when possible
    pub fn source_location(&self) -> &Path {
        &self.source_location
    }

    pub fn isa(&self) -> InstructionSet {
        self.isa
    }

    /// Whether artifacts are opened for executing their compiled code
    pub fn load_executable(&self) -> bool {
        self.load_executable
    }

    /// Whether the directory containing the source is writable
    pub fn is_source_dir_writable(&self) -> bool {
        self.source_dir_writable
    }

    pub fn candidate(&self, kind: CandidateKind) -> &Candidate {
        match kind {
            CandidateKind::CoLocated => &self.co_located,
            CandidateKind::Cache => &self.cache,
        }
    }

    fn candidate_mut(&mut self, kind: CandidateKind) -> &mut Candidate {
        match kind {
            CandidateKind::CoLocated => &mut self.co_located,
            CandidateKind::Cache => &mut self.cache,
        }
    }

    /// Acquire the cross-process regeneration lock for this source
    ///
    /// The lock is held until the assistant is dropped.
    ///
    /// # Panics
    ///
    /// Panics if the lock is already held by this assistant.
    pub fn lock(&mut self) -> GovernorResult<&AdvisoryLock> {
        assert!(self.lock.is_none(), "assistant lock acquired twice");
        let lock = AdvisoryLock::acquire(&lock_path(&self.source_location, self.isa))?;
        Ok(self.lock.insert(lock))
    }

    /// Whether the source is loaded through the boot class path
    pub fn is_in_boot_class_path(&self) -> bool {
        let found = self.config.runtime.boot_class_path.iter().any(|entry| {
            entry == &self.source_location
                || fs::canonicalize(entry).is_ok_and(|entry| entry == self.source_location)
        });
        if found {
            debug!("{} is in the boot class path", self.source_location.display());
        }
        found
    }

    /// Checksums every candidate must match
    ///
    /// Read from the source when possible, otherwise recovered from the
    /// co-located artifact. `None` if neither is available.
    pub fn required_checksums(&mut self) -> Option<&RequiredChecksums> {
        let Self {
            required_checksums,
            collaborators,
            source_location,
            co_located,
            load_executable,
            ..
        } = self;

        required_checksums.get_or_compute(|| {
            match collaborators.source_reader.unit_checksums(source_location.as_path()) {
                Ok(checksums) => {
                    return Some(RequiredChecksums {
                        checksums,
                        from_original_source: true,
                    })
                }
                Err(e) => debug!("{}", e),
            }

            let artifact = co_located.load(collaborators.artifact_reader.as_ref(), *load_executable)?;
            debug!(
                "Recovered unit checksums from {}",
                artifact.path().display()
            );
            Some(RequiredChecksums {
                checksums: artifact.header().unit_checksums.clone(),
                from_original_source: false,
            })
        })
    }

    /// Whether the source content itself could be read
    pub fn has_original_source(&mut self) -> bool {
        self.required_checksums()
            .is_some_and(|required| required.from_original_source)
    }

    /// Header of the active boot image, loaded once
    pub fn boot_image_info(&mut self) -> Option<&BootImageInfo> {
        let Self {
            boot_image,
            collaborators,
            isa,
            ..
        } = self;

        boot_image.get_or_compute(|| match collaborators.boot_image.load(*isa) {
            Ok(info) => Some(info),
            Err(e) => {
                warn!("Unable to get boot image info: {}", e);
                None
            }
        })
    }

    /// Freshness of one candidate, computed once until it is reset
    pub fn candidate_status(&mut self, kind: CandidateKind) -> FreshnessStatus {
        if let Some(status) = self.candidate(kind).cached_status() {
            return status;
        }

        let executable = self.load_executable;
        let filter = {
            let reader = self.collaborators.artifact_reader.as_ref();
            let candidate = match kind {
                CandidateKind::CoLocated => &mut self.co_located,
                CandidateKind::Cache => &mut self.cache,
            };
            candidate
                .load(reader, executable)
                .map(|artifact| artifact.header().compiler_filter)
        };

        self.required_checksums();
        if filter.is_some_and(|f| f.depends_on_image_checksum() || f.is_aot_compilation_enabled()) {
            self.boot_image_info();
        }

        let ctx = EvaluationContext {
            source_location: &self.source_location,
            required_checksums: self.required_checksums.get(),
            boot_image: self.boot_image.get(),
            runtime_concurrent_copying: self.config.runtime.concurrent_copying,
            accept_unvalidated_without_source: self
                .config
                .runtime
                .accept_unvalidated_without_source,
        };
        let candidate = match kind {
            CandidateKind::CoLocated => &mut self.co_located,
            CandidateKind::Cache => &mut self.cache,
        };

        let status = match candidate.loaded() {
            Some(artifact) => evaluate_artifact(artifact.header(), &ctx),
            None => match candidate.metadata_path() {
                Some(path) => evaluate_metadata(
                    self.collaborators.artifact_reader.open_metadata(&path),
                    &ctx,
                ),
                None => FreshnessStatus::CannotOpen,
            },
        };

        debug!("{} artifact status: {}", kind, status);
        candidate.record_status(status);
        status
    }

    pub fn co_located_status(&mut self) -> FreshnessStatus {
        self.candidate_status(CandidateKind::CoLocated)
    }

    pub fn cache_status(&mut self) -> FreshnessStatus {
        self.candidate_status(CandidateKind::Cache)
    }

    /// The candidate that should be used, or regenerated, for this source
    pub fn best_candidate_kind(&mut self) -> CandidateKind {
        // A writable source directory means the co-located artifact can
        // always be (re)created.
        if self.source_dir_writable {
            return CandidateKind::CoLocated;
        }

        if self.cache_status().is_usable() {
            return CandidateKind::Cache;
        }

        let co_located = self.co_located_status();
        if co_located == FreshnessStatus::UpToDate {
            return CandidateKind::CoLocated;
        }

        if self.has_original_source() {
            return CandidateKind::Cache;
        }

        // Without the source, keep whichever artifact at least exists.
        if co_located != FreshnessStatus::CannotOpen {
            CandidateKind::CoLocated
        } else {
            CandidateKind::Cache
        }
    }

    /// What it would take to satisfy `target` with the best candidate
    pub fn regeneration_plan(
        &mut self,
        target: CompilerFilter,
        profile_changed: bool,
    ) -> RegenerationPlan {
        let kind = self.best_candidate_kind();
        let status = self.candidate_status(kind);
        let current = self.candidate(kind).compiler_filter();
        let filter_okay = filter_is_okay(current, target, profile_changed);
        let has_original_source = self.has_original_source();

        let plan = RegenerationPlan {
            decision: decide(status, filter_okay, target, has_original_source),
            target: kind,
        };
        debug!(
            "Plan for {} with target {}: {}",
            self.source_location.display(),
            target,
            plan
        );
        plan
    }

    /// Whether the best candidate can be used as is
    pub fn is_up_to_date(&mut self) -> bool {
        let kind = self.best_candidate_kind();
        self.candidate_status(kind) == FreshnessStatus::UpToDate
    }

    /// Bring the best candidate up to date for the configured target filter
    ///
    /// The target is the last `--compiler-filter=` among the configured
    /// compiler options.
    pub async fn make_up_to_date(
        &mut self,
        profile_changed: bool,
    ) -> GovernorResult<RegenerationPlan> {
        let target = CompilerFilter::from_compiler_options(&self.config.runtime.compiler_options)?;
        self.update_to(target, profile_changed).await
    }

    /// Bring the best candidate up to date for `target`
    ///
    /// Returns the plan that was carried out. A plan that needs no
    /// compilation succeeds without touching the filesystem. Callers sharing
    /// the source with other processes should hold [`Self::lock`].
    pub async fn update_to(
        &mut self,
        target: CompilerFilter,
        profile_changed: bool,
    ) -> GovernorResult<RegenerationPlan> {
        let plan = self.regeneration_plan(target, profile_changed);
        if !plan.needs_compilation() {
            debug!("{} is up to date", self.source_location.display());
            return Ok(plan);
        }

        let artifact_path = self
            .candidate(plan.target)
            .path()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                GovernorError::path_resolution(
                    &self.source_location,
                    format!("no {} artifact location", plan.target),
                )
            })?;

        let boot_image_location = self
            .boot_image_info()
            .map(|info| info.location.clone())
            .unwrap_or_default();

        info!(
            "Regenerating {} artifact for {}: {}",
            plan.target,
            self.source_location.display(),
            plan.decision
        );

        let request = RegenerationRequest {
            source_location: &self.source_location,
            isa: self.isa,
            target: plan.target,
            artifact_path: &artifact_path,
            filter: target,
        };
        let result = regenerate(
            &request,
            &self.config.runtime,
            &boot_image_location,
            self.collaborators.compiler.as_ref(),
        )
        .await;

        // Whatever happened, the cached handle no longer reflects the disk.
        self.candidate_mut(plan.target).reset();
        result.map(|()| plan)
    }

    /// Hand the best candidate's artifact over for use
    ///
    /// An artifact that needs relocation is reopened non-executable so its
    /// unrelocated code is never run. Returns `None` if no usable artifact
    /// exists. The released candidate must not be queried afterwards.
    pub fn release_best_artifact(&mut self) -> Option<CompiledArtifact> {
        let kind = self.best_candidate_kind();
        match self.candidate_status(kind) {
            FreshnessStatus::UpToDate => self.candidate_mut(kind).release(),
            FreshnessStatus::NeedsRelocation => {
                debug!(
                    "No relocated {} artifact found, falling back to interpreting it",
                    kind
                );
                self.load_executable = false;
                self.candidate_mut(kind).reset();
                if !self.candidate_status(kind).is_usable() {
                    return None;
                }
                self.candidate_mut(kind).release()
            }
            _ => None,
        }
    }

    /// One-line description of both candidates for diagnostics
    ///
    /// Format: `<path>[status=<status>, compilation_filter=<filter>]` per
    /// openable candidate, cache first; `invalid[]` when neither opens.
    pub fn status_dump(&mut self) -> String {
        let mut entries = Vec::new();
        for kind in [CandidateKind::Cache, CandidateKind::CoLocated] {
            let status = self.candidate_status(kind);
            if status == FreshnessStatus::CannotOpen {
                continue;
            }
            let candidate = self.candidate(kind);
            let path = candidate
                .path()
                .map(|path| path.display().to_string())
                .unwrap_or_default();
            let detail = match candidate.compiler_filter() {
                Some(filter) => format!("compilation_filter={}", filter),
                // Only the metadata companion could be read.
                None => "metadata-only".to_string(),
            };
            entries.push(format!("{}[status={}, {}", path, status, detail));
        }

        if entries.is_empty() {
            "invalid[]".to_string()
        } else {
            format!("{}]", entries.join("] "))
        }
    }
}
