//! Source unit checksums
//!
//! A source location names one logical bytecode module which may be split into
//! several units. The primary unit lives at the location itself; secondary
//! units follow the naming convention `<location>!classes<N>.dex` for
//! `N = 2, 3, ...` and are enumerated until the first missing part.

use crate::error::{GovernorError, GovernorResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads the authoritative per-unit checksums of a source
pub trait SourceReader: Send + Sync {
    /// Ordered checksums of every unit, or an error if the source is
    /// unreadable or carries no units
    fn unit_checksums(&self, location: &Path) -> GovernorResult<Vec<u32>>;
}

/// Location of the unit at `index` under `location`
pub fn unit_location(index: usize, location: &Path) -> PathBuf {
    if index == 0 {
        return location.to_path_buf();
    }
    let mut raw = location.as_os_str().to_os_string();
    raw.push(format!("!classes{}.dex", index + 1));
    PathBuf::from(raw)
}

/// Checksum of a unit's content: the leading four bytes of its SHA-256 digest
pub fn content_checksum(contents: &[u8]) -> u32 {
    let digest = Sha256::digest(contents);
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Reads units straight from the filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSourceReader;

impl FileSourceReader {
    fn read_unit(path: &Path) -> GovernorResult<Vec<u8>> {
        fs::read(path).map_err(|e| GovernorError::io(format!("reading {}", path.display()), e))
    }
}

impl SourceReader for FileSourceReader {
    fn unit_checksums(&self, location: &Path) -> GovernorResult<Vec<u32>> {
        let primary = Self::read_unit(location).map_err(|e| GovernorError::SourceUnavailable {
            location: location.to_path_buf(),
            reason: e.to_string(),
        })?;

        // A zero-length container has been stripped of its bytecode.
        if primary.is_empty() {
            return Err(GovernorError::SourceUnavailable {
                location: location.to_path_buf(),
                reason: "source contains no units".to_string(),
            });
        }

        let mut checksums = vec![content_checksum(&primary)];
        for index in 1.. {
            let path = unit_location(index, location);
            if !path.is_file() {
                break;
            }
            checksums.push(content_checksum(&Self::read_unit(&path)?));
        }

        debug!(
            "Read {} unit checksum(s) from {}",
            checksums.len(),
            location.display()
        );
        Ok(checksums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn unit_location_naming() {
        let base = Path::new("/data/app/base.jar");
        assert_eq!(unit_location(0, base), PathBuf::from("/data/app/base.jar"));
        assert_eq!(
            unit_location(1, base),
            PathBuf::from("/data/app/base.jar!classes2.dex")
        );
        assert_eq!(
            unit_location(2, base),
            PathBuf::from("/data/app/base.jar!classes3.dex")
        );
    }

    #[test]
    fn checksum_deterministic() {
        assert_eq!(content_checksum(b"unit"), content_checksum(b"unit"));
        assert_ne!(content_checksum(b"unit one"), content_checksum(b"unit two"));
    }

    #[test]
    fn reads_primary_and_secondary_units() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("app.jar");
        fs::write(&source, b"primary").unwrap();
        fs::write(unit_location(1, &source), b"second").unwrap();
        fs::write(unit_location(2, &source), b"third").unwrap();
        // Gap: a fifth part without a fourth is never reached.
        fs::write(unit_location(4, &source), b"orphan").unwrap();

        let checksums = FileSourceReader.unit_checksums(&source).unwrap();
        assert_eq!(
            checksums,
            vec![
                content_checksum(b"primary"),
                content_checksum(b"second"),
                content_checksum(b"third"),
            ]
        );
    }

    #[test]
    fn stripped_source_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("app.jar");
        fs::write(&source, b"").unwrap();

        let err = FileSourceReader.unit_checksums(&source).unwrap_err();
        assert!(matches!(err, GovernorError::SourceUnavailable { .. }));
    }

    #[test]
    fn missing_source_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let err = FileSourceReader
            .unit_checksums(&dir.path().join("gone.jar"))
            .unwrap_err();
        assert!(matches!(err, GovernorError::SourceUnavailable { .. }));
    }
}
