//! Boot image information
//!
//! Artifacts compiled with native code embed the checksum and load address of
//! the boot image they were built against. The header of the active image is
//! read once per assistant and compared against those fields.

use crate::error::{GovernorError, GovernorResult};
use crate::isa::InstructionSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Snapshot of the active boot image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootImageInfo {
    /// Configured image location (not arch-qualified)
    pub location: PathBuf,
    /// Checksum of the image's compiled code
    pub checksum: u32,
    /// Address the image's compiled code is mapped at
    pub base_address: u64,
    /// Relocation applied to the image
    pub patch_delta: i32,
}

/// Loads the active boot image's header
pub trait BootImageProvider: Send + Sync {
    fn load(&self, isa: InstructionSet) -> GovernorResult<BootImageInfo>;
}

/// On-disk layout of a boot image header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootImageHeader {
    pub checksum: u32,
    pub base_address: u64,
    #[serde(default)]
    pub patch_delta: i32,
}

/// Arch-qualified location of an image: `<dir>/<name>` becomes `<dir>/<arch>/<name>`
pub fn image_path_for_isa(location: &Path, isa: InstructionSet) -> PathBuf {
    match (location.parent(), location.file_name()) {
        (Some(dir), Some(name)) => dir.join(isa.as_str()).join(name),
        _ => location.to_path_buf(),
    }
}

/// Reads boot image headers stored as JSON next to the image
#[derive(Debug, Clone)]
pub struct FileBootImageProvider {
    location: PathBuf,
}

impl FileBootImageProvider {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

impl BootImageProvider for FileBootImageProvider {
    fn load(&self, isa: InstructionSet) -> GovernorResult<BootImageInfo> {
        let path = image_path_for_isa(&self.location, isa);
        let content = fs::read_to_string(&path).map_err(|e| {
            GovernorError::io(format!("reading boot image header {}", path.display()), e)
        })?;
        let header: BootImageHeader = serde_json::from_str(&content)?;

        Ok(BootImageInfo {
            location: self.location.clone(),
            checksum: header.checksum,
            base_address: header.base_address,
            patch_delta: header.patch_delta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn arch_qualified_path() {
        assert_eq!(
            image_path_for_isa(Path::new("/system/framework/boot.art"), InstructionSet::Arm64),
            PathBuf::from("/system/framework/arm64/boot.art")
        );
    }

    #[test]
    fn loads_header() {
        let dir = TempDir::new().unwrap();
        let location = dir.path().join("boot.art");
        fs::create_dir(dir.path().join("x86")).unwrap();
        fs::write(
            dir.path().join("x86/boot.art"),
            r#"{"checksum": 7, "base_address": 1879048192, "patch_delta": -4096}"#,
        )
        .unwrap();

        let info = FileBootImageProvider::new(&location)
            .load(InstructionSet::X86)
            .unwrap();
        assert_eq!(info.location, location);
        assert_eq!(info.checksum, 7);
        assert_eq!(info.base_address, 0x7000_0000);
        assert_eq!(info.patch_delta, -4096);
    }

    #[test]
    fn missing_header_fails() {
        let dir = TempDir::new().unwrap();
        let provider = FileBootImageProvider::new(dir.path().join("boot.art"));
        assert!(provider.load(InstructionSet::Arm).is_err());
    }
}
