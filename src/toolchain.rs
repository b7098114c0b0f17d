use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

use crate::config::{INPUT_PLACEHOLDER, ToolchainConfig};
use crate::error::ToolchainError;
use crate::workspace::Workspace;

/// External language toolchain invoked for every job.
///
/// Two commands are run in sequence: a best-effort dependency tidy inside the
/// job's directory, and the run command against the job's source file.
#[derive(Debug, Clone)]
pub struct Toolchain {
    config: ToolchainConfig,
}

/// Captured streams of one toolchain invocation
#[derive(Debug)]
pub struct RunOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl RunOutput {
    /// Response body for the run: stderr first, then stdout.
    ///
    /// Any captured output counts as a result, whatever the exit status. Only
    /// a failed process that printed nothing is an error.
    pub fn into_body(self) -> Result<Vec<u8>, ToolchainError> {
        if self.stdout.is_empty() && self.stderr.is_empty() && !self.status.success() {
            return Err(ToolchainError::Failed(self.status));
        }

        let mut body = self.stderr;
        body.extend_from_slice(&self.stdout);
        Ok(body)
    }
}

impl Toolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    pub fn extension(&self) -> &str {
        &self.config.extension
    }

    /// Runs the tidy command inside the job's directory. Failures are logged only.
    pub async fn resolve_dependencies(&self, workspace: &Workspace) {
        let output = run_captured(&self.config.tidy_command, Some(workspace.dir())).await;
        let output = match output {
            Ok(output) => output,
            Err(e) => {
                log::warn!("Dependency tidy for {} failed: {e}", workspace.file_name());
                return;
            }
        };

        if !output.status.success() {
            log::warn!(
                "Dependency tidy for {} exited with {}",
                workspace.file_name(),
                output.status
            );
        }
        if !output.stderr.is_empty() {
            log::warn!("tidy stderr:\n{}", String::from_utf8_lossy(&output.stderr));
        }
        if !output.stdout.is_empty() {
            log::debug!("tidy stdout:\n{}", String::from_utf8_lossy(&output.stdout));
        }
    }

    /// Runs the job's source file, capturing both streams
    pub async fn execute(&self, workspace: &Workspace) -> Result<RunOutput, ToolchainError> {
        let source = workspace.file().to_string_lossy();
        let command = expand_command(&self.config.run_command, &source);
        let output = run_captured(&command, None).await?;

        if !output.status.success() {
            log::info!(
                "Run of {} exited with {}",
                workspace.file_name(),
                output.status
            );
        }
        if !output.stderr.is_empty() {
            log::debug!("run stderr:\n{}", String::from_utf8_lossy(&output.stderr));
        }
        if !output.stdout.is_empty() {
            log::debug!("run stdout:\n{}", String::from_utf8_lossy(&output.stdout));
        }

        Ok(output)
    }
}

/// Substitutes the source path into a command template
fn expand_command(template: &[String], source: &str) -> Vec<String> {
    template
        .iter()
        .map(|arg| arg.replace(INPUT_PLACEHOLDER, source))
        .collect()
}

async fn run_captured(command: &[String], cwd: Option<&Path>) -> Result<RunOutput, ToolchainError> {
    let (program, args) = command.split_first().ok_or(ToolchainError::EmptyCommand)?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = cmd.output().await.map_err(|e| ToolchainError::Spawn {
        program: program.clone(),
        source: e,
    })?;

    Ok(RunOutput {
        status: output.status,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}
