//! External process execution

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

/// Outcome of one external command: combined stdout/stderr text and a
/// success flag derived from the exit status (zero = success). Spawn errors
/// and timeouts are captured as failed results, never panics.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub output: String,
    pub success: bool,
}

impl ProcessResult {
    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
        }
    }

    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
        }
    }
}

/// Seam for invoking external binaries, so the deploy pipeline can be
/// exercised without touching git or knife.
pub trait CommandRunner {
    fn run(
        &self,
        program: &Path,
        args: &[&OsStr],
        timeout: Duration,
    ) -> impl Future<Output = ProcessResult> + Send;
}

/// Runs commands via `tokio::process` with explicit argument vectors;
/// nothing is ever passed through a shell.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, program: &Path, args: &[&OsStr], timeout: Duration) -> ProcessResult {
        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);

        match tokio::time::timeout(timeout, command.output()).await {
            Err(_) => ProcessResult::failed(format!(
                "{} timed out after {}s",
                program.display(),
                timeout.as_secs()
            )),
            Ok(Err(e)) => {
                ProcessResult::failed(format!("failed to start {}: {}", program.display(), e))
            }
            Ok(Ok(output)) => {
                let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));
                ProcessResult {
                    output: combined,
                    success: output.status.success(),
                }
            }
        }
    }
}
