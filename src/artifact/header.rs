//! Artifact and metadata headers

use crate::filter::CompilerFilter;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Header fields of a compiled artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Built for a runtime using the concurrent copying collector
    pub concurrent_copying: bool,

    /// Checksums of the source units the artifact was compiled from
    pub unit_checksums: Vec<u32>,

    /// Filter the artifact was compiled with
    pub compiler_filter: CompilerFilter,

    /// Checksum of the boot image the artifact was compiled against
    pub boot_image_checksum: u32,

    /// Boot image base address baked into the compiled code
    pub boot_image_base_address: u64,

    /// Boot image patch delta baked into the compiled code
    pub boot_image_patch_delta: i32,

    /// Compiled as position-independent code
    #[serde(default)]
    pub position_independent: bool,
}

impl ArtifactHeader {
    /// Number of source units recorded in the header
    pub fn unit_count(&self) -> usize {
        self.unit_checksums.len()
    }
}

/// Header of a metadata companion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataHeader {
    /// Checksums of the source units
    pub unit_checksums: Vec<u32>,
}

impl MetadataHeader {
    /// Number of source units recorded in the companion
    pub fn unit_count(&self) -> usize {
        self.unit_checksums.len()
    }
}

/// An opened artifact, holding its file exclusively until dropped
#[derive(Debug)]
pub struct CompiledArtifact {
    path: PathBuf,
    header: ArtifactHeader,
    executable: bool,
    file: File,
}

impl CompiledArtifact {
    /// Wrap an opened artifact file
    pub fn new(path: PathBuf, header: ArtifactHeader, executable: bool, file: File) -> Self {
        Self {
            path,
            header,
            executable,
            file,
        }
    }

    /// Where the artifact was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed header fields
    pub fn header(&self) -> &ArtifactHeader {
        &self.header
    }

    /// Whether the artifact was opened for executing its compiled code
    pub fn is_executable(&self) -> bool {
        self.executable
    }

    /// The underlying file handle
    pub fn file(&self) -> &File {
        &self.file
    }
}
