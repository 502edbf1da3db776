//! Artifact regeneration
//!
//! Outputs are written in place under their final names. Until the compiler
//! has succeeded and both files have been flushed and closed, they are owned
//! by [`PendingFile`] guards that remove them on drop, so a failed run never
//! leaves a partial artifact or metadata file behind.

use crate::candidate::CandidateKind;
use crate::compiler::{CompileTarget, Compiler, CompilerInvocation};
use crate::config::RuntimeConfig;
use crate::error::{GovernorError, GovernorResult};
use crate::filter::CompilerFilter;
use crate::isa::InstructionSet;
use crate::location::{co_located_layout, metadata_path};
use std::fs::{self, File, OpenOptions, Permissions};
use std::io;
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Mode of directories created beside the source
pub const CO_LOCATED_DIR_MODE: u32 = 0o711;

/// Owner read/write, plus the source's group and other read bits
pub fn output_mode(source_mode: u32) -> u32 {
    0o600 | (source_mode & 0o044)
}

/// Flushes an output to disk before it is closed
pub(crate) type Flush = fn(&File) -> io::Result<()>;

/// One regeneration run
#[derive(Debug, Clone, Copy)]
pub struct RegenerationRequest<'a> {
    pub source_location: &'a Path,
    pub isa: InstructionSet,
    pub target: CandidateKind,
    pub artifact_path: &'a Path,
    pub filter: CompilerFilter,
}

/// Create `dir` with [`CO_LOCATED_DIR_MODE`] unless it already exists
pub fn prepare_directory(dir: &Path) -> GovernorResult<()> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => {
            return Err(GovernorError::io(
                format!("preparing directory {}", dir.display()),
                io::Error::other("path exists and is not a directory"),
            ))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(GovernorError::io(
                format!("checking directory {}", dir.display()),
                e,
            ))
        }
    }

    fs::create_dir(dir)
        .map_err(|e| GovernorError::io(format!("creating directory {}", dir.display()), e))?;
    // mkdir honours the umask, so the mode is applied separately.
    fs::set_permissions(dir, Permissions::from_mode(CO_LOCATED_DIR_MODE))
        .map_err(|e| GovernorError::io(format!("setting mode of {}", dir.display()), e))?;

    debug!("Created directory {}", dir.display());
    Ok(())
}

/// An output file that is removed on drop unless kept
#[derive(Debug)]
struct PendingFile {
    path: PathBuf,
    file: Option<File>,
    keep: bool,
}

impl PendingFile {
    fn create(path: &Path, mode: u32) -> GovernorResult<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(path)
            .map_err(|e| GovernorError::io(format!("creating {}", path.display()), e))?;

        let pending = Self {
            path: path.to_path_buf(),
            file: Some(file),
            keep: false,
        };
        if let Some(file) = &pending.file {
            file.set_permissions(Permissions::from_mode(mode))
                .map_err(|e| GovernorError::io(format!("setting mode of {}", path.display()), e))?;
        }
        Ok(pending)
    }

    fn raw_fd(&self) -> RawFd {
        self.file.as_ref().map_or(-1, AsRawFd::as_raw_fd)
    }

    /// Flush and close, reporting errors the implicit close on drop would hide
    fn close(&mut self, flush: Flush) -> GovernorResult<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let close_failure = |source: io::Error| GovernorError::CloseFailure {
            path: self.path.clone(),
            source,
        };

        flush(&file).map_err(close_failure)?;
        let fd = file.into_raw_fd();
        // SAFETY: `fd` was just released by `into_raw_fd` and is closed once.
        if unsafe { libc::close(fd) } != 0 {
            return Err(close_failure(io::Error::last_os_error()));
        }
        Ok(())
    }

    fn keep(&mut self) {
        self.keep = true;
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        drop(self.file.take());
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial output {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

/// Compile a fresh artifact and metadata companion for `request`
///
/// Errors before the compiler is invoked leave the filesystem untouched apart
/// from prepared directories; see [`GovernorError::update_result`].
pub async fn regenerate(
    request: &RegenerationRequest<'_>,
    runtime: &RuntimeConfig,
    boot_image_location: &Path,
    compiler: &dyn Compiler,
) -> GovernorResult<()> {
    regenerate_with(request, runtime, boot_image_location, compiler, File::sync_all).await
}

pub(crate) async fn regenerate_with(
    request: &RegenerationRequest<'_>,
    runtime: &RuntimeConfig,
    boot_image_location: &Path,
    compiler: &dyn Compiler,
    flush: Flush,
) -> GovernorResult<()> {
    if !runtime.compilation_enabled {
        return Err(GovernorError::CompilationDisabled(
            request.source_location.to_path_buf(),
        ));
    }

    let source_meta = fs::metadata(request.source_location).map_err(|e| {
        GovernorError::io(
            format!("reading status of {}", request.source_location.display()),
            e,
        )
    })?;

    if request.target == CandidateKind::CoLocated {
        let layout = co_located_layout(request.source_location, request.isa)?;
        prepare_directory(&layout.oat_dir)?;
        prepare_directory(&layout.isa_dir)?;
    }

    let mode = output_mode(source_meta.permissions().mode());
    let meta_path = metadata_path(request.artifact_path);
    let mut metadata = PendingFile::create(&meta_path, mode)?;
    let mut artifact = PendingFile::create(request.artifact_path, mode)?;

    let invocation = CompilerInvocation::build(
        runtime,
        boot_image_location,
        request.isa,
        &CompileTarget {
            source_location: request.source_location,
            artifact_location: request.artifact_path,
            metadata_fd: metadata.raw_fd(),
            artifact_fd: artifact.raw_fd(),
            filter: request.filter,
        },
    )?;

    info!(
        "Compiling {} to {} ({})",
        request.source_location.display(),
        request.artifact_path.display(),
        request.filter
    );
    compiler.compile(&invocation).await?;

    metadata.close(flush)?;
    artifact.close(flush)?;
    metadata.keep();
    artifact.keep();

    info!("Generated {}", request.artifact_path.display());
    Ok(())
}
