//! Configuration schema for aotguard
//!
//! Configuration is stored at `~/.config/aotguard/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Runtime and compiler settings
    pub runtime: RuntimeConfig,

    /// Boot image settings
    pub boot_image: BootImageConfig,

    /// Artifact cache settings
    pub cache: CacheConfig,
}

/// Settings describing the runtime artifacts are compiled for
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Allow invoking the external compiler
    pub compilation_enabled: bool,

    /// Compiler executable to invoke
    pub compiler_executable: String,

    /// Class path passed to the compiler (empty = shared library marker)
    pub classpath: String,

    /// Compile debuggable code
    pub debuggable: bool,

    /// Verify bytecode while compiling
    pub verification_enabled: bool,

    /// Relocate compiled code when possible
    pub relocate: bool,

    /// Compile for a host rather than a device
    pub host: bool,

    /// The runtime uses the concurrent copying collector
    pub concurrent_copying: bool,

    /// Extra compiler options; the last `--compiler-filter=` picks the target
    pub compiler_options: Vec<String>,

    /// Source locations loaded by the boot class path
    pub boot_class_path: Vec<PathBuf>,

    /// Accept artifacts that cannot be validated against the boot image when
    /// the original source content is gone
    pub accept_unvalidated_without_source: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            compilation_enabled: true,
            compiler_executable: "dex2aot".to_string(),
            classpath: String::new(),
            debuggable: false,
            verification_enabled: true,
            relocate: true,
            host: true,
            concurrent_copying: true,
            compiler_options: vec![],
            boot_class_path: vec![],
            accept_unvalidated_without_source: true,
        }
    }
}

/// Boot image configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootImageConfig {
    /// Image location; the header is read from `<dir>/<arch>/<name>`
    pub location: PathBuf,
}

impl Default for BootImageConfig {
    fn default() -> Self {
        Self {
            location: PathBuf::from("/system/framework/boot.art"),
        }
    }
}

/// Artifact cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root; artifacts live under `<root>/<arch>/`
    pub root: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("aotguard"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[runtime]"));
        assert!(toml.contains("[boot_image]"));
        assert!(toml.contains("[cache]"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.runtime.compilation_enabled);
        assert!(config.runtime.accept_unvalidated_without_source);
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [runtime]
            compiler_executable = "/usr/bin/fake-compiler"
            compiler_options = ["--compiler-filter=speed"]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.runtime.compiler_executable, "/usr/bin/fake-compiler");
        assert_eq!(config.runtime.compiler_options, vec!["--compiler-filter=speed"]);
        assert!(config.runtime.relocate); // default preserved
        assert_eq!(
            config.boot_image.location,
            PathBuf::from("/system/framework/boot.art")
        );
    }
}
