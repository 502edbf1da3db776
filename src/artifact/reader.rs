//! Artifact readers

use crate::artifact::header::{ArtifactHeader, CompiledArtifact, MetadataHeader};
use crate::error::{GovernorError, GovernorResult};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Opens artifacts and their metadata companions
pub trait ArtifactReader: Send + Sync {
    /// Open an artifact, keeping its file handle
    fn open_artifact(&self, path: &Path, executable: bool) -> GovernorResult<CompiledArtifact>;

    /// Read a metadata companion's header
    fn open_metadata(&self, path: &Path) -> GovernorResult<MetadataHeader>;
}

/// Reads artifacts whose headers are stored as JSON documents
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonArtifactReader;

impl JsonArtifactReader {
    fn read_header<T: DeserializeOwned>(path: &Path, file: &mut File) -> GovernorResult<T> {
        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| GovernorError::io(format!("reading {}", path.display()), e))?;

        serde_json::from_str(&content).map_err(|e| GovernorError::ArtifactFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl ArtifactReader for JsonArtifactReader {
    fn open_artifact(&self, path: &Path, executable: bool) -> GovernorResult<CompiledArtifact> {
        let mut file = File::open(path)
            .map_err(|e| GovernorError::io(format!("opening artifact {}", path.display()), e))?;
        let header: ArtifactHeader = Self::read_header(path, &mut file)?;

        debug!(
            "Opened artifact {} ({} unit(s), filter {})",
            path.display(),
            header.unit_count(),
            header.compiler_filter
        );
        Ok(CompiledArtifact::new(
            path.to_path_buf(),
            header,
            executable,
            file,
        ))
    }

    fn open_metadata(&self, path: &Path) -> GovernorResult<MetadataHeader> {
        let mut file = File::open(path)
            .map_err(|e| GovernorError::io(format!("opening metadata {}", path.display()), e))?;
        Self::read_header(path, &mut file)
    }
}
