//! External compiler invocation
//!
//! The compiler is an opaque subprocess. Output files are created by the
//! caller and handed to the child as inherited descriptors; the compiler only
//! reports success or failure through its exit status.

use crate::config::RuntimeConfig;
use crate::error::{GovernorError, GovernorResult};
use crate::filter::CompilerFilter;
use crate::isa::InstructionSet;
use async_trait::async_trait;
use std::os::fd::RawFd;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Class path marker passed when the runtime has no class path
pub const SHARED_LIBRARY_MARKER: &str = "&";

/// Max number of output lines to include in compiler error messages.
const ERROR_TAIL_LINES: usize = 50;

/// Per-run inputs of a compilation
#[derive(Debug, Clone, Copy)]
pub struct CompileTarget<'a> {
    pub source_location: &'a Path,
    pub artifact_location: &'a Path,
    pub metadata_fd: RawFd,
    pub artifact_fd: RawFd,
    pub filter: CompilerFilter,
}

/// A fully assembled compiler command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerInvocation {
    /// Executable to run
    pub executable: String,
    /// Arguments, excluding the executable
    pub args: Vec<String>,
    /// Descriptors the child must inherit
    pub inherited_fds: Vec<RawFd>,
}

impl CompilerInvocation {
    /// Assemble the command line from runtime settings and the run's target
    pub fn build(
        runtime: &RuntimeConfig,
        boot_image_location: &Path,
        isa: InstructionSet,
        target: &CompileTarget<'_>,
    ) -> GovernorResult<Self> {
        if boot_image_location.as_os_str().is_empty() {
            return Err(GovernorError::subprocess(
                &runtime.compiler_executable,
                "no boot image location found",
            ));
        }

        let classpath = if runtime.classpath.is_empty() {
            SHARED_LIBRARY_MARKER
        } else {
            runtime.classpath.as_str()
        };

        let mut args = vec![
            "--runtime-arg".to_string(),
            "-classpath".to_string(),
            "--runtime-arg".to_string(),
            classpath.to_string(),
        ];

        if runtime.debuggable {
            args.push("--debuggable".to_string());
        }

        args.push(format!("--instruction-set={}", isa));

        if !runtime.verification_enabled {
            args.push(format!(
                "--compiler-filter={}",
                CompilerFilter::AssumeVerified
            ));
        }

        args.push("--runtime-arg".to_string());
        args.push(if runtime.relocate {
            "-Xrelocate".to_string()
        } else {
            "-Xnorelocate".to_string()
        });

        if runtime.host {
            args.push("--host".to_string());
        }

        args.push(format!("--boot-image={}", boot_image_location.display()));
        args.extend(runtime.compiler_options.iter().cloned());

        args.push(format!("--source={}", target.source_location.display()));
        args.push(format!("--metadata-fd={}", target.metadata_fd));
        args.push(format!("--artifact-fd={}", target.artifact_fd));
        args.push(format!(
            "--artifact-location={}",
            target.artifact_location.display()
        ));
        args.push(format!("--compiler-filter={}", target.filter));

        Ok(Self {
            executable: runtime.compiler_executable.clone(),
            args,
            inherited_fds: vec![target.metadata_fd, target.artifact_fd],
        })
    }

    /// Command line for diagnostics
    pub fn command_line(&self) -> String {
        std::iter::once(self.executable.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs a compiler invocation to completion
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, invocation: &CompilerInvocation) -> GovernorResult<()>;
}

/// Spawns the compiler as a child process
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalCompiler;

/// Extract the useful tail of compiler output for error diagnostics.
pub(crate) fn compiler_error_output(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let total = lines.len();
    let tail: Vec<&str> = if total > ERROR_TAIL_LINES {
        lines[total - ERROR_TAIL_LINES..].to_vec()
    } else {
        lines
    };
    tail.join("\n")
}

#[async_trait]
impl Compiler for ExternalCompiler {
    async fn compile(&self, invocation: &CompilerInvocation) -> GovernorResult<()> {
        let command_line = invocation.command_line();
        debug!("Executing: {}", command_line);

        let mut command = Command::new(&invocation.executable);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let fds = invocation.inherited_fds.clone();
        // SAFETY: the closure only calls fcntl, which is async-signal-safe,
        // and does not allocate.
        unsafe {
            command.pre_exec(move || {
                for &fd in &fds {
                    if libc::fcntl(fd, libc::F_SETFD, 0) == -1 {
                        return Err(std::io::Error::last_os_error());
                    }
                }
                Ok(())
            });
        }

        let output = command
            .output()
            .await
            .map_err(|e| GovernorError::subprocess(&command_line, e.to_string()))?;

        if output.status.success() {
            info!("Compiler finished: {}", invocation.executable);
            return Ok(());
        }

        let status = match output.status.code() {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        let tail = compiler_error_output(
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        );
        let detail = if tail.is_empty() {
            status
        } else {
            format!("{}\n{}", status, tail)
        };
        Err(GovernorError::subprocess(command_line, detail))
    }
}
