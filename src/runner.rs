//! Subprocess seam shared by the installer, the engine invoker and the inspector.
//!
//! Everything that launches an external binary goes through [`ProcessRunner`], so the
//! install chains, engine invocations and probes can be exercised against a scripted
//! runner instead of real tools.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::errors::{AppError, Result};

/// How long to keep listening for a Ctrl+C after a child exits non-zero.
/// The terminal delivers SIGINT to the child and to us at the same time.
const INTERRUPT_GRACE: Duration = Duration::from_millis(150);

/// A program plus its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

#[cfg(test)]
impl CommandLine {
    /// Number of times `token` appears in the argument vector.
    pub fn count(&self, token: &str) -> usize {
        self.args.iter().filter(|a| a.as_str() == token).count()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.count(token) > 0
    }

    /// The value following `flag`, if present.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(' ') {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Directories prepended to the executable search path for children of this session.
///
/// The real process environment is never modified; the value is handed to each
/// spawned child explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    prepended: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts `dir` in front of everything already on the path.
    pub fn prepend(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        self.prepended.retain(|d| d != &dir);
        self.prepended.insert(0, dir);
    }

    pub fn prepended(&self) -> &[PathBuf] {
        &self.prepended
    }

    pub fn is_default(&self) -> bool {
        self.prepended.is_empty()
    }

    /// The `PATH` value children should see, or `None` to inherit unchanged.
    pub fn to_env_value(&self) -> Option<OsString> {
        if self.prepended.is_empty() {
            return None;
        }
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let dirs = self
            .prepended
            .iter()
            .cloned()
            .chain(std::env::split_paths(&inherited));
        std::env::join_paths(dirs).ok()
    }

    /// Resolves `program` against this path. Falls back to the bare name so the
    /// spawn error reports what was missing.
    pub fn resolve(&self, program: &str) -> PathBuf {
        if self.is_default() {
            return PathBuf::from(program);
        }
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        which::which_in(program, self.to_env_value(), cwd).unwrap_or_else(|_| PathBuf::from(program))
    }

    /// Whether `program` can be found on this path.
    pub fn has_program(&self, program: &str) -> bool {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let paths = self
            .to_env_value()
            .or_else(|| std::env::var_os("PATH"));
        which::which_in(program, paths, cwd).is_ok()
    }
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    Exited(i32),
    /// Killed by a signal other than an interrupt (no exit code).
    Killed,
    TimedOut,
    Interrupted,
}

impl ExitState {
    pub fn success(&self) -> bool {
        matches!(self, ExitState::Exited(0))
    }
}

/// Result of a run whose output was captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub state: ExitState,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.state.success()
    }

    /// Last few stderr lines, falling back to stdout, for diagnostics.
    pub fn diagnostic_tail(&self, lines: usize) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let collected: Vec<&str> = source.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = collected.len().saturating_sub(lines);
        collected[start..].join("\n")
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs `command` with stdout/stderr captured, killing it after `timeout`.
    /// A missing executable is an `Err`, every other ending is an [`ExitState`].
    async fn run_captured(
        &self,
        command: &CommandLine,
        timeout: Option<Duration>,
        search_path: &SearchPath,
    ) -> Result<CapturedOutput>;

    /// Runs `command` with the terminal's stdio inherited and no timeout.
    async fn run_inherited(&self, command: &CommandLine, search_path: &SearchPath) -> Result<ExitState>;
}

/// Spawns real child processes through tokio.
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn build(command: &CommandLine, search_path: &SearchPath) -> Command {
        let mut cmd = Command::new(search_path.resolve(&command.program));
        cmd.args(&command.args).kill_on_drop(true);
        if let Some(path) = search_path.to_env_value() {
            cmd.env("PATH", path);
        }
        cmd
    }

    fn spawn_error(command: &CommandLine, e: std::io::Error) -> AppError {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::ToolNotFound(command.program.clone())
        } else {
            AppError::Io(e)
        }
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run_captured(
        &self,
        command: &CommandLine,
        timeout: Option<Duration>,
        search_path: &SearchPath,
    ) -> Result<CapturedOutput> {
        log::debug!("⚙️ [RUNNER] Capturing: {}", command);
        let child = Self::build(command, search_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_error(command, e))?;

        // Dropping the future drops the child, and kill_on_drop reaps it.
        let wait = child.wait_with_output();
        tokio::pin!(wait);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let deadline = async {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = &mut ctrl_c => {
                log::debug!("⚠️ [RUNNER] Interrupted: {}", command.program);
                Ok(CapturedOutput { state: ExitState::Interrupted, stdout: String::new(), stderr: String::new() })
            }
            output = &mut wait => {
                let output = output?;
                Ok(CapturedOutput {
                    state: classify(output.status),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            _ = deadline => {
                log::debug!("⏱️ [RUNNER] Timed out after {:?}: {}", timeout, command.program);
                Ok(CapturedOutput { state: ExitState::TimedOut, stdout: String::new(), stderr: String::new() })
            }
        }
    }

    async fn run_inherited(&self, command: &CommandLine, search_path: &SearchPath) -> Result<ExitState> {
        log::debug!("⚙️ [RUNNER] Running: {}", command);
        let mut child = Self::build(command, search_path)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Self::spawn_error(command, e))?;

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let finished = tokio::select! {
            biased;
            _ = &mut ctrl_c => None,
            status = child.wait() => Some(status?),
        };
        let Some(status) = finished else {
            log::debug!("⚠️ [RUNNER] Interrupted: {}", command.program);
            let _ = child.kill().await;
            return Ok(ExitState::Interrupted);
        };

        let state = classify(status);
        if !state.success() && tokio::time::timeout(INTERRUPT_GRACE, &mut ctrl_c).await.is_ok() {
            return Ok(ExitState::Interrupted);
        }
        Ok(state)
    }
}

fn classify(status: ExitStatus) -> ExitState {
    if let Some(code) = status.code() {
        return ExitState::Exited(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if status.signal() == Some(2) {
            return ExitState::Interrupted;
        }
    }
    ExitState::Killed
}
