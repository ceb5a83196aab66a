//! Package management through the editor's command-line executable.
//!
//! Each call spawns the executable, waits for it up to a deadline and
//! reports the outcome as a [`ProcessOutput`] instead of an error.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::domain::{AppError, PackageManager};

/// Default deadline for one invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// The process ran to completion with a zero exit status.
    pub ok: bool,
    /// Captured standard output.
    pub output: String,
    /// Captured standard error, or a description of why the run failed.
    pub error: String,
}

impl ProcessOutput {
    fn failed(error: &AppError) -> Self {
        Self {
            ok: false,
            output: String::new(),
            error: error.to_string(),
        }
    }
}

/// Whether a successful `--install-extension` run changed anything.
#[must_use]
pub fn install_changed(out: &ProcessOutput) -> bool {
    out.ok && !out.output.to_lowercase().contains("already installed")
}

/// Whether a successful `--uninstall-extension` run changed anything.
#[must_use]
pub fn uninstall_changed(out: &ProcessOutput) -> bool {
    let text = format!("{}{}", out.output, out.error).to_lowercase();
    out.ok && !text.contains("is not installed")
}

/// The editor executable.
#[derive(Debug, Clone)]
pub struct EditorCli {
    executable: PathBuf,
    timeout: Duration,
}

impl EditorCli {
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            timeout,
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        // The editor ships a .cmd shim on Windows, which needs the shell
        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&self.executable);
            cmd
        } else {
            Command::new(&self.executable)
        };
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Run the executable with `args`.
    #[must_use]
    pub fn run(&self, args: &[&str]) -> ProcessOutput {
        tracing::debug!(executable = %self.executable.display(), ?args, "Invoking editor");

        let mut child = match self.command(args).spawn() {
            Ok(child) => child,
            Err(e) => {
                let err = AppError::io(
                    format!("Failed to start {}", self.executable.display()),
                    e,
                );
                tracing::error!(executable = %self.executable.display(), ?args, error = %err, "Spawn failed");
                return ProcessOutput::failed(&err);
            }
        };

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match wait_with_deadline(&mut child, self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let err = AppError::PackageManager {
                    message: format!(
                        "package manager unresponsive after {}s",
                        self.timeout.as_secs()
                    ),
                };
                tracing::error!(executable = %self.executable.display(), ?args, "Invocation timed out");
                return ProcessOutput::failed(&err);
            }
            Err(e) => {
                let err = AppError::io("Failed to wait for editor process", e);
                tracing::error!(executable = %self.executable.display(), ?args, error = %err, "Wait failed");
                return ProcessOutput::failed(&err);
            }
        };

        let out = ProcessOutput {
            ok: status.success(),
            output: stdout.join().unwrap_or_default(),
            error: stderr.join().unwrap_or_default(),
        };

        if !out.ok {
            tracing::error!(
                executable = %self.executable.display(),
                ?args,
                status = %status,
                stderr = %out.error.trim(),
                "Editor exited with failure"
            );
        }

        out
    }
}

/// Read a pipe to completion on a helper thread so the child never blocks on it.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut pipe) = pipe {
            let mut bytes = Vec::new();
            if pipe.read_to_end(&mut bytes).is_ok() {
                text = String::from_utf8_lossy(&bytes).into_owned();
            }
        }
        text
    })
}

/// Wait for `child`, killing it once `timeout` has passed. `None` means it was killed.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            child.kill()?;
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

impl PackageManager for EditorCli {
    fn install(&self, id: &str) -> bool {
        let out = self.run(&["--install-extension", id]);
        let changed = install_changed(&out);
        tracing::info!(id, ok = out.ok, changed, "Install extension");
        changed
    }

    fn uninstall(&self, id: &str) -> bool {
        let out = self.run(&["--uninstall-extension", id]);
        let changed = uninstall_changed(&out);
        tracing::info!(id, ok = out.ok, changed, "Uninstall extension");
        changed
    }

    fn is_reachable(&self) -> bool {
        let out = self.run(&["--version"]);
        if !out.ok {
            tracing::warn!(executable = %self.executable.display(), "Editor executable not reachable");
        }
        out.ok
    }
}
