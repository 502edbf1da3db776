//! Integration tests for aotguard

mod cli_tests {
    use aotguard::artifact::{ArtifactHeader, MetadataHeader};
    use aotguard::config::Config;
    use aotguard::filter::CompilerFilter;
    use aotguard::source::content_checksum;
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const SOURCE_CONTENT: &[u8] = b"integration bytecode";
    const IMAGE_CHECKSUM: u32 = 0x1234_5678;
    const IMAGE_BASE: u64 = 0x7000_0000;

    fn aotguard() -> Command {
        let mut cmd = cargo_bin_cmd!("aotguard");
        cmd.env_remove("AOTGUARD_CONFIG");
        cmd
    }

    /// A source, boot image and cache laid out under one temporary directory
    struct Workspace {
        dir: TempDir,
        source: PathBuf,
        config_path: PathBuf,
        config: Config,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let app = dir.path().join("app");
            fs::create_dir(&app).unwrap();
            fs::write(app.join("base.jar"), SOURCE_CONTENT).unwrap();
            let source = fs::canonicalize(app.join("base.jar")).unwrap();

            let image_dir = dir.path().join("framework").join("x86");
            fs::create_dir_all(&image_dir).unwrap();
            fs::write(
                image_dir.join("boot.art"),
                format!(
                    r#"{{"checksum": {}, "base_address": {}}}"#,
                    IMAGE_CHECKSUM, IMAGE_BASE
                ),
            )
            .unwrap();

            let mut config = Config::default();
            config.boot_image.location = dir.path().join("framework").join("boot.art");
            config.cache.root = dir.path().join("cache");

            let workspace = Self {
                config_path: dir.path().join("config.toml"),
                dir,
                source,
                config,
            };
            workspace.save_config();
            workspace
        }

        fn save_config(&self) {
            fs::write(&self.config_path, toml::to_string_pretty(&self.config).unwrap()).unwrap();
        }

        fn header(&self, filter: CompilerFilter) -> ArtifactHeader {
            ArtifactHeader {
                concurrent_copying: true,
                unit_checksums: vec![content_checksum(SOURCE_CONTENT)],
                compiler_filter: filter,
                boot_image_checksum: IMAGE_CHECKSUM,
                boot_image_base_address: IMAGE_BASE,
                boot_image_patch_delta: 0,
                position_independent: false,
            }
        }

        fn co_located_artifact(&self) -> PathBuf {
            self.source.parent().unwrap().join("oat/x86/base.aot")
        }

        fn write_co_located(&self, header: &ArtifactHeader) {
            let path = self.co_located_artifact();
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, serde_json::to_string(header).unwrap()).unwrap();
            let metadata = MetadataHeader {
                unit_checksums: header.unit_checksums.clone(),
            };
            fs::write(
                path.with_extension("meta"),
                serde_json::to_string(&metadata).unwrap(),
            )
            .unwrap();
        }

        /// Install a compiler script writing `header` to the artifact descriptor
        fn install_compiler(&mut self, header: &ArtifactHeader) {
            let metadata = MetadataHeader {
                unit_checksums: header.unit_checksums.clone(),
            };
            let script = self.dir.path().join("dex2aot");
            let body = format!(
                r#"#!/bin/sh
for arg in "$@"; do
  case "$arg" in
    --metadata-fd=*) mfd="${{arg#--metadata-fd=}}" ;;
    --artifact-fd=*) afd="${{arg#--artifact-fd=}}" ;;
  esac
done
printf '%s' '{}' > "/dev/fd/$mfd" || exit 2
printf '%s' '{}' > "/dev/fd/$afd" || exit 2
"#,
                serde_json::to_string(&metadata).unwrap(),
                serde_json::to_string(header).unwrap()
            );
            fs::write(&script, body).unwrap();
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

            self.config.runtime.compiler_executable = script.display().to_string();
            self.save_config();
        }

        fn run(&self, args: &[&str]) -> assert_cmd::assert::Assert {
            aotguard()
                .arg("-c")
                .arg(&self.config_path)
                .args(args)
                .arg(&self.source)
                .args(["--isa", "x86"])
                .assert()
        }
    }

    fn exists(path: &Path) -> bool {
        path.exists()
    }

    #[test]
    fn help_displays() {
        aotguard()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Freshness governor"));
    }

    #[test]
    fn version_displays() {
        aotguard()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("aotguard"));
    }

    #[test]
    fn config_path_honours_flag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        aotguard()
            .arg("-c")
            .arg(&path)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_path_honours_env() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("from-env.toml");
        aotguard()
            .env("AOTGUARD_CONFIG", &path)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("from-env.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let dir = TempDir::new().unwrap();
        aotguard()
            .arg("-c")
            .arg(dir.path().join("missing.toml"))
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[runtime]"))
            .stdout(predicate::str::contains("compiler_executable = \"dex2aot\""));
    }

    #[test]
    fn config_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        aotguard()
            .arg("-c")
            .arg(&path)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(path.exists());

        aotguard()
            .arg("-c")
            .arg(&path)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        aotguard()
            .arg("-c")
            .arg(&path)
            .args(["config", "init", "--force"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[runtime]\ncompilation_enabled = \"sometimes\"\n").unwrap();

        aotguard()
            .arg("-c")
            .arg(&path)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn status_reports_up_to_date_artifact() {
        let ws = Workspace::new();
        ws.write_co_located(&ws.header(CompilerFilter::Speed));

        ws.run(&["status"])
            .success()
            .stdout(predicate::str::contains("up-to-date"))
            .stdout(predicate::str::contains("co-located artifact is up to date"));
    }

    #[test]
    fn status_json_reports_candidates() {
        let ws = Workspace::new();
        ws.write_co_located(&ws.header(CompilerFilter::Verify));

        let output = ws.run(&["status", "--format", "json"]).success();
        let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();

        assert_eq!(value["up_to_date"], true);
        assert_eq!(value["best"], "co-located");
        assert_eq!(value["has_original_source"], true);
        assert_eq!(value["source_dir_writable"], true);
        assert_eq!(value["candidates"][0]["kind"], "co-located");
        assert_eq!(value["candidates"][1]["kind"], "cache");
        assert_eq!(value["candidates"][0]["compiler_filter"], "verify");
        assert_eq!(value["candidates"][1]["status"], "cannot-open");
    }

    #[test]
    fn plan_for_missing_artifact_is_from_scratch() {
        let ws = Workspace::new();
        ws.run(&["plan", "--filter", "speed"])
            .success()
            .stdout(predicate::str::contains("from-scratch"))
            .stdout(predicate::str::contains("aotguard update"));
    }

    #[test]
    fn plan_for_stale_image_is_for_boot_image() {
        let ws = Workspace::new();
        let mut header = ws.header(CompilerFilter::Speed);
        header.boot_image_checksum = 1;
        ws.write_co_located(&header);

        ws.run(&["plan", "--filter", "speed"])
            .success()
            .stdout(predicate::str::contains("for-boot-image"));
    }

    #[test]
    fn plan_rejects_unknown_filter() {
        let ws = Workspace::new();
        ws.run(&["plan", "--filter", "fastest"]).failure();
    }

    #[test]
    fn update_regenerates_and_status_follows() {
        let mut ws = Workspace::new();
        let header = ws.header(CompilerFilter::Speed);
        ws.install_compiler(&header);

        ws.run(&["update", "--filter", "speed"])
            .success()
            .stdout(predicate::str::contains("Regenerated co-located artifact"));

        assert!(exists(&ws.co_located_artifact()));
        assert!(exists(&ws.co_located_artifact().with_extension("meta")));
        assert!(!exists(&PathBuf::from(format!(
            "{}.x86.flock",
            ws.source.display()
        ))));

        ws.run(&["plan", "--filter", "speed"])
            .success()
            .stdout(predicate::str::contains("no-op-needed"));
    }

    #[test]
    fn update_of_fresh_artifact_is_noop() {
        let ws = Workspace::new();
        ws.write_co_located(&ws.header(CompilerFilter::Speed));

        ws.run(&["update"])
            .success()
            .stdout(predicate::str::contains("is up to date"));

        assert!(!exists(&ws.config.cache.root));
        assert!(!exists(&PathBuf::from(format!(
            "{}.x86.flock",
            ws.source.display()
        ))));
    }

    #[test]
    fn failed_compiler_leaves_no_outputs() {
        let mut ws = Workspace::new();
        ws.config.runtime.compiler_executable = "/bin/false".to_string();
        ws.save_config();

        ws.run(&["update", "--filter", "speed"])
            .failure()
            .stderr(predicate::str::contains("Compiler failed"));

        assert!(!exists(&ws.co_located_artifact()));
        assert!(!exists(&ws.co_located_artifact().with_extension("meta")));
    }

    #[test]
    fn disabled_compilation_has_hint() {
        let mut ws = Workspace::new();
        ws.config.runtime.compilation_enabled = false;
        ws.save_config();

        ws.run(&["update", "--filter", "speed"])
            .failure()
            .stderr(predicate::str::contains("compilation is disabled"))
            .stderr(predicate::str::contains("Hint:"));
    }
}
