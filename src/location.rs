//! Artifact location resolution
//!
//! Every source has two candidate artifact locations:
//!
//! | Candidate | Path |
//! |-----------|------|
//! | co-located | `<source-dir>/oat/<arch>/<stem>.aot` |
//! | cache | `<cache-root>/<arch>/<escaped-source-path>` |
//!
//! Each artifact is paired with a metadata companion carrying the same path
//! with a `.meta` extension.

use crate::error::{GovernorError, GovernorResult};
use crate::isa::InstructionSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Extension of compiled artifacts stored beside their source
pub const ARTIFACT_EXT: &str = "aot";

/// Extension of metadata companions
pub const METADATA_EXT: &str = "meta";

/// Name of the directory inserted beside the source
pub const CO_LOCATED_DIR: &str = "oat";

/// Paths making up the co-located layout for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoLocatedLayout {
    /// `<source-dir>/oat`
    pub oat_dir: PathBuf,
    /// `<source-dir>/oat/<arch>`
    pub isa_dir: PathBuf,
    /// `<source-dir>/oat/<arch>/<stem>.aot`
    pub artifact: PathBuf,
}

fn location_str(location: &Path) -> GovernorResult<&str> {
    location
        .to_str()
        .ok_or_else(|| GovernorError::path_resolution(location, "location is not valid UTF-8"))
}

/// Derive the co-located layout for a source location
///
/// For example `/foo/bar/baz.jar` on arm64 resolves to
/// `/foo/bar/oat/arm64/baz.aot`.
pub fn co_located_layout(location: &Path, isa: InstructionSet) -> GovernorResult<CoLocatedLayout> {
    let raw = location_str(location)?;

    let pos = raw
        .rfind('/')
        .ok_or_else(|| GovernorError::path_resolution(location, "location has no directory"))?;
    let (dir, file) = (&raw[..=pos], &raw[pos + 1..]);

    let stem = match file.rfind('.') {
        Some(dot) => &file[..dot],
        None => {
            return Err(GovernorError::path_resolution(
                location,
                "location has no extension",
            ))
        }
    };

    let oat_dir = PathBuf::from(format!("{dir}{CO_LOCATED_DIR}"));
    let isa_dir = oat_dir.join(isa.as_str());
    let artifact = isa_dir.join(format!("{stem}.{ARTIFACT_EXT}"));

    Ok(CoLocatedLayout {
        oat_dir,
        isa_dir,
        artifact,
    })
}

/// Escape an absolute source location into a single cache file name
///
/// The leading `/` is dropped and the remaining separators become `@`.
/// Locations that are not already a bytecode or artifact file get
/// `@classes.dex` appended.
pub fn escape_cache_name(location: &Path) -> GovernorResult<String> {
    let raw = location_str(location)?;
    let relative = raw
        .strip_prefix('/')
        .ok_or_else(|| GovernorError::path_resolution(location, "location is not absolute"))?;

    let mut name = relative.to_string();
    let already_compiled = [".dex", ".art", ".aot"]
        .iter()
        .any(|suffix| name.ends_with(suffix));
    if !already_compiled {
        name.push_str("/classes.dex");
    }
    Ok(name.replace('/', "@"))
}

/// Derive the cache artifact path for a source location
///
/// The per-architecture cache directory must already exist.
pub fn cache_artifact_path(
    location: &Path,
    cache_root: &Path,
    isa: InstructionSet,
) -> GovernorResult<PathBuf> {
    let cache_dir = cache_root.join(isa.as_str());
    if !cache_dir.is_dir() {
        return Err(GovernorError::path_resolution(
            location,
            format!("cache directory {} does not exist", cache_dir.display()),
        ));
    }
    Ok(cache_dir.join(escape_cache_name(location)?))
}

/// Path of the metadata companion of an artifact
pub fn metadata_path(artifact: &Path) -> PathBuf {
    artifact.with_extension(METADATA_EXT)
}

/// Path of the advisory lock file guarding regeneration
pub fn lock_path(location: &Path, isa: InstructionSet) -> PathBuf {
    let mut raw = location.as_os_str().to_os_string();
    raw.push(format!(".{}.flock", isa.as_str()));
    PathBuf::from(raw)
}

/// Both candidate paths for a source, resolved once
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedLocations {
    pub co_located: Option<PathBuf>,
    pub cache: Option<PathBuf>,
}

impl ResolvedLocations {
    /// Resolve both candidates, logging rather than failing on errors
    pub fn resolve(location: &Path, cache_root: &Path, isa: InstructionSet) -> Self {
        let co_located = match co_located_layout(location, isa) {
            Ok(layout) => Some(layout.artifact),
            Err(e) => {
                warn!("Failed to determine co-located artifact path: {}", e);
                None
            }
        };

        let cache = match cache_artifact_path(location, cache_root, isa) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Failed to determine cache artifact path: {}", e);
                None
            }
        };

        Self { co_located, cache }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn co_located_inserts_arch_dir() {
        let layout =
            co_located_layout(Path::new("/foo/bar/baz.jar"), InstructionSet::Arm64).unwrap();
        assert_eq!(layout.oat_dir, PathBuf::from("/foo/bar/oat"));
        assert_eq!(layout.isa_dir, PathBuf::from("/foo/bar/oat/arm64"));
        assert_eq!(layout.artifact, PathBuf::from("/foo/bar/oat/arm64/baz.aot"));
    }

    #[test]
    fn co_located_keeps_inner_dots() {
        let layout =
            co_located_layout(Path::new("/foo/bar.v2/baz.core.jar"), InstructionSet::X86).unwrap();
        assert_eq!(
            layout.artifact,
            PathBuf::from("/foo/bar.v2/oat/x86/baz.core.aot")
        );
    }

    #[test]
    fn co_located_requires_directory() {
        let err = co_located_layout(Path::new("baz.jar"), InstructionSet::Arm).unwrap_err();
        assert!(matches!(err, GovernorError::PathResolution { .. }));
    }

    #[test]
    fn co_located_requires_extension() {
        let err = co_located_layout(Path::new("/foo/bar/baz"), InstructionSet::Arm).unwrap_err();
        assert!(err.to_string().contains("no extension"));
    }

    #[test]
    fn escape_appends_classes_for_containers() {
        assert_eq!(
            escape_cache_name(Path::new("/data/app/foo.jar")).unwrap(),
            "data@app@foo.jar@classes.dex"
        );
        assert_eq!(
            escape_cache_name(Path::new("/data/app/foo.dex")).unwrap(),
            "data@app@foo.dex"
        );
    }

    #[test]
    fn escape_requires_absolute() {
        assert!(escape_cache_name(Path::new("data/app/foo.jar")).is_err());
    }

    #[test]
    fn cache_path_requires_existing_dir() {
        let root = TempDir::new().unwrap();
        let location = Path::new("/data/app/foo.jar");

        assert!(cache_artifact_path(location, root.path(), InstructionSet::Arm64).is_err());

        std::fs::create_dir(root.path().join("arm64")).unwrap();
        let path = cache_artifact_path(location, root.path(), InstructionSet::Arm64).unwrap();
        assert_eq!(path, root.path().join("arm64/data@app@foo.jar@classes.dex"));
    }

    #[test]
    fn metadata_and_lock_paths() {
        assert_eq!(
            metadata_path(Path::new("/foo/oat/arm/baz.aot")),
            PathBuf::from("/foo/oat/arm/baz.meta")
        );
        assert_eq!(
            lock_path(Path::new("/foo/baz.jar"), InstructionSet::Arm),
            PathBuf::from("/foo/baz.jar.arm.flock")
        );
    }

    #[test]
    fn resolve_tolerates_missing_cache() {
        let root = TempDir::new().unwrap();
        let resolved = ResolvedLocations::resolve(
            Path::new("/foo/baz.jar"),
            root.path(),
            InstructionSet::X86_64,
        );
        assert_eq!(
            resolved.co_located,
            Some(PathBuf::from("/foo/oat/x86_64/baz.aot"))
        );
        assert!(resolved.cache.is_none());
    }
}
