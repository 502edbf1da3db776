//! Compiled artifact access
//!
//! Only the header of an artifact is interpreted here; its compiled body is
//! opaque. Every artifact has a metadata companion that carries the unit
//! checksums on their own, so freshness can be partially judged even when the
//! artifact itself cannot be opened.

pub mod header;
pub mod reader;

pub use header::{ArtifactHeader, CompiledArtifact, MetadataHeader};
pub use reader::{ArtifactReader, JsonArtifactReader};
