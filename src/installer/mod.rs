//! Detects the external tools and installs missing ones through ordered,
//! platform-specific fallback chains.

pub mod archive;
pub mod fetch;
pub mod tools;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::AppError;
use crate::runner::{CommandLine, ExitState, ProcessRunner, SearchPath};

pub use fetch::{ArchiveFetcher, HttpFetcher};

/// Diagnostic lines kept from a failed attempt.
const DIAGNOSTIC_LINES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
    Unsupported,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Unsupported
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::Linux => "Linux",
            Platform::MacOs => "macOS",
            Platform::Unsupported => std::env::consts::OS,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallAttempt {
    /// Run a command; `requires` names a package manager that must be on the path first.
    Command {
        command: CommandLine,
        timeout: Duration,
        requires: Option<&'static str>,
    },
    /// Fetch a prebuilt archive, unpack it and put the directory holding `binary` on the path.
    ArchiveDownload { url: String, binary: &'static str },
}

impl InstallAttempt {
    pub fn describe(&self) -> String {
        match self {
            InstallAttempt::Command { command, .. } => command.to_string(),
            InstallAttempt::ArchiveDownload { url, .. } => format!("download {}", url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallStrategy {
    pub platform: Platform,
    pub attempts: Vec<InstallAttempt>,
}

impl InstallStrategy {
    pub fn new(platform: Platform, attempts: Vec<InstallAttempt>) -> Self {
        Self { platform, attempts }
    }
}

/// An external tool: how to detect it, how to install it, what to tell the user.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub probe: CommandLine,
    pub strategies: Vec<InstallStrategy>,
    /// Manual commands per platform; `None` applies to any platform without its own entry.
    pub remedies: Vec<(Option<Platform>, Vec<&'static str>)>,
}

impl ToolSpec {
    pub fn strategy_for(&self, platform: Platform) -> Option<&InstallStrategy> {
        self.strategies.iter().find(|s| s.platform == platform)
    }

    pub fn remedies_for(&self, platform: Platform) -> &[&'static str] {
        self.remedies
            .iter()
            .find(|(p, _)| *p == Some(platform))
            .or_else(|| self.remedies.iter().find(|(p, _)| p.is_none()))
            .map(|(_, commands)| commands.as_slice())
            .unwrap_or(&[])
    }
}

/// How one attempt in a chain went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Succeeded,
    Failed(String),
    /// A required package manager is missing; the chain stops here.
    PreconditionMissing(&'static str),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallReport {
    /// The tool answers its probe.
    Verified,
    /// An attempt claimed success but the probe still fails. Usually a fresh
    /// terminal (PATH refresh) fixes it.
    Unverified,
    /// Chain exhausted or not applicable; carries the last diagnostic.
    Failed(String),
    Cancelled,
}

impl InstallReport {
    pub fn is_usable(&self) -> bool {
        matches!(self, InstallReport::Verified | InstallReport::Unverified)
    }
}

pub struct DependencyInstaller {
    runner: Arc<dyn ProcessRunner>,
    fetcher: Arc<dyn ArchiveFetcher>,
    tools_dir: PathBuf,
    probe_timeout: Duration,
}

impl DependencyInstaller {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        fetcher: Arc<dyn ArchiveFetcher>,
        tools_dir: PathBuf,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            runner,
            fetcher,
            tools_dir,
            probe_timeout,
        }
    }

    /// True iff the probe launched and exited 0 within the timeout.
    pub async fn is_present(&self, tool: &ToolSpec, search_path: &SearchPath) -> bool {
        match self
            .runner
            .run_captured(&tool.probe, Some(self.probe_timeout), search_path)
            .await
        {
            Ok(output) => {
                log::debug!("🔍 [INSTALL] Probe {} -> {:?}", tool.probe, output.state);
                output.success()
            }
            Err(e) => {
                log::debug!("🔍 [INSTALL] Probe {} failed: {}", tool.probe, e);
                false
            }
        }
    }

    /// Makes `tool` available, trying the platform's chain if it is missing.
    pub async fn install(&self, tool: &ToolSpec, platform: Platform, search_path: &mut SearchPath) -> InstallReport {
        if self.is_present(tool, search_path).await {
            log::info!("✅ [INSTALL] {} already present", tool.name);
            return InstallReport::Verified;
        }
        self.run_chain(tool, platform, search_path).await
    }

    /// Runs the chain even when the tool is already present.
    pub async fn update(&self, tool: &ToolSpec, platform: Platform, search_path: &mut SearchPath) -> InstallReport {
        self.run_chain(tool, platform, search_path).await
    }

    async fn run_chain(&self, tool: &ToolSpec, platform: Platform, search_path: &mut SearchPath) -> InstallReport {
        let Some(strategy) = tool.strategy_for(platform) else {
            log::warn!("❌ [INSTALL] No install strategy for {} on {}", tool.name, platform);
            return InstallReport::Failed(format!(
                "Automatic installation of {} is not supported on {}",
                tool.name, platform
            ));
        };

        let total = strategy.attempts.len();
        let mut last_failure = String::new();

        for (index, attempt) in strategy.attempts.iter().enumerate() {
            let is_last = index + 1 == total;
            println!("   ↳ [{}/{}] {}", index + 1, total, attempt.describe());
            log::info!("🔧 [INSTALL] {} attempt {}/{}: {}", tool.name, index + 1, total, attempt.describe());

            match self.run_attempt(attempt, search_path).await {
                AttemptResult::Succeeded => {
                    return if self.is_present(tool, search_path).await {
                        log::info!("✅ [INSTALL] {} verified", tool.name);
                        InstallReport::Verified
                    } else {
                        log::warn!("⚠️ [INSTALL] {} installed but probe still fails", tool.name);
                        InstallReport::Unverified
                    };
                }
                AttemptResult::Cancelled => {
                    log::warn!("⚠️ [INSTALL] {} install cancelled", tool.name);
                    return InstallReport::Cancelled;
                }
                AttemptResult::PreconditionMissing(manager) => {
                    log::warn!("❌ [INSTALL] {} requires {}", tool.name, manager);
                    return InstallReport::Failed(format!(
                        "{} is required to install {} on {}",
                        manager, tool.name, platform
                    ));
                }
                AttemptResult::Failed(diagnostic) => {
                    if is_last {
                        log::warn!("❌ [INSTALL] {} failed: {}", attempt.describe(), diagnostic);
                    } else {
                        log::debug!("⚠️ [INSTALL] {} failed, trying next", attempt.describe());
                    }
                    last_failure = diagnostic;
                }
            }
        }

        InstallReport::Failed(last_failure)
    }

    async fn run_attempt(&self, attempt: &InstallAttempt, search_path: &mut SearchPath) -> AttemptResult {
        match attempt {
            InstallAttempt::Command { command, timeout, requires } => {
                if let Some(manager) = requires {
                    if !search_path.has_program(manager) {
                        return AttemptResult::PreconditionMissing(*manager);
                    }
                }
                self.run_command(command, *timeout, search_path).await
            }
            InstallAttempt::ArchiveDownload { url, binary } => {
                match archive::install_from_archive(self.fetcher.as_ref(), url, &self.tools_dir, binary).await {
                    Ok(bin_dir) => {
                        search_path.prepend(bin_dir);
                        log::debug!("🔧 [INSTALL] Search path additions: {:?}", search_path.prepended());
                        AttemptResult::Succeeded
                    }
                    Err(AppError::Interrupted) => AttemptResult::Cancelled,
                    Err(e) => AttemptResult::Failed(e.to_string()),
                }
            }
        }
    }

    async fn run_command(&self, command: &CommandLine, timeout: Duration, search_path: &SearchPath) -> AttemptResult {
        let output = match self.runner.run_captured(command, Some(timeout), search_path).await {
            Ok(output) => output,
            Err(AppError::Interrupted) => return AttemptResult::Cancelled,
            Err(e) => return AttemptResult::Failed(e.to_string()),
        };

        match output.state {
            ExitState::Exited(0) => AttemptResult::Succeeded,
            ExitState::Interrupted => AttemptResult::Cancelled,
            ExitState::TimedOut => AttemptResult::Failed(format!("{} timed out after {:?}", command.program, timeout)),
            ExitState::Killed => AttemptResult::Failed(format!("{} was killed", command.program)),
            ExitState::Exited(code) => {
                let tail = output.diagnostic_tail(DIAGNOSTIC_LINES);
                if tail.is_empty() {
                    AttemptResult::Failed(format!("{} exited with code {}", command.program, code))
                } else {
                    AttemptResult::Failed(format!("{} exited with code {}:\n{}", command.program, code, tail))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::installer::archive::test_support::write_zip;
    use crate::installer::fetch::fake::{FakeFetcher, FetchReply};
    use crate::runner::fake::{Reply, ScriptedRunner};

    fn installer(runner: ScriptedRunner, fetcher: FakeFetcher, tools_dir: PathBuf) -> (Arc<ScriptedRunner>, DependencyInstaller) {
        let runner = Arc::new(runner);
        let installer = DependencyInstaller::new(
            runner.clone(),
            Arc::new(fetcher),
            tools_dir,
            Duration::from_secs(10),
        );
        (runner, installer)
    }

    fn no_fetch() -> FakeFetcher {
        FakeFetcher::new(FetchReply::Interrupted)
    }

    fn failure(stderr: &str) -> Reply {
        Reply::ExitWith {
            code: 100,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[tokio::test]
    async fn present_tool_needs_no_attempts() {
        let (runner, installer) = installer(
            ScriptedRunner::new().on("ffmpeg", Some("-version"), vec![Reply::Exit(0)]),
            no_fetch(),
            PathBuf::from("unused"),
        );
        let tool = tools::ffmpeg(&AppConfig::default());
        let mut path = SearchPath::new();

        assert_eq!(installer.install(&tool, Platform::Linux, &mut path).await, InstallReport::Verified);
        assert_eq!(runner.programs(), vec!["ffmpeg -version"]);
    }

    #[tokio::test]
    async fn probe_timeout_and_failure_mean_absent() {
        let (_, installer) = installer(
            ScriptedRunner::new().on("ffmpeg", None, vec![Reply::TimedOut, Reply::Exit(1), Reply::Missing]),
            no_fetch(),
            PathBuf::from("unused"),
        );
        let tool = tools::ffmpeg(&AppConfig::default());
        let path = SearchPath::new();

        assert!(!installer.is_present(&tool, &path).await);
        assert!(!installer.is_present(&tool, &path).await);
        assert!(!installer.is_present(&tool, &path).await);
    }

    #[tokio::test]
    async fn linux_falls_back_to_dnf_and_reprobes() {
        let (runner, installer) = installer(
            ScriptedRunner::new()
                .on("ffmpeg", None, vec![Reply::Missing, Reply::Exit(0)])
                .on("sudo", Some("apt-get"), vec![failure("sudo: apt-get: command not found")])
                .on("sudo", Some("dnf"), vec![Reply::Exit(0)]),
            no_fetch(),
            PathBuf::from("unused"),
        );
        let tool = tools::ffmpeg(&AppConfig::default());
        let mut path = SearchPath::new();

        assert_eq!(installer.install(&tool, Platform::Linux, &mut path).await, InstallReport::Verified);
        assert_eq!(
            runner.programs(),
            vec![
                "ffmpeg -version",
                "sudo apt-get install -y ffmpeg",
                "sudo dnf install -y ffmpeg",
                "ffmpeg -version"
            ]
        );
    }

    #[tokio::test]
    async fn claimed_success_without_probe_is_unverified() {
        let (_, installer) = installer(
            ScriptedRunner::new()
                .on("spotdl", None, vec![Reply::Missing, Reply::Missing])
                .on("python3", None, vec![Reply::Exit(0)]),
            no_fetch(),
            PathBuf::from("unused"),
        );
        let tool = tools::spotdl(&AppConfig::default());
        let mut path = SearchPath::new();

        let report = installer.install(&tool, Platform::Linux, &mut path).await;
        assert_eq!(report, InstallReport::Unverified);
        assert!(report.is_usable());
    }

    #[tokio::test]
    async fn exhausted_chain_reports_last_diagnostic() {
        let (runner, installer) = installer(
            ScriptedRunner::new()
                .on("ffmpeg", None, vec![Reply::Missing])
                .on("sudo", Some("apt-get"), vec![failure("E: first failure")])
                .on("sudo", Some("dnf"), vec![failure("Error: second failure")]),
            no_fetch(),
            PathBuf::from("unused"),
        );
        let tool = tools::ffmpeg(&AppConfig::default());
        let mut path = SearchPath::new();

        match installer.install(&tool, Platform::Linux, &mut path).await {
            InstallReport::Failed(diagnostic) => {
                assert!(diagnostic.contains("second failure"));
                assert!(!diagnostic.contains("first failure"));
            }
            other => panic!("unexpected report: {:?}", other),
        }
        assert_eq!(runner.programs().len(), 3);
    }

    #[tokio::test]
    async fn unsupported_platform_makes_no_attempts() {
        let (runner, installer) = installer(
            ScriptedRunner::new().on("ffmpeg", None, vec![Reply::Missing]),
            no_fetch(),
            PathBuf::from("unused"),
        );
        let tool = tools::ffmpeg(&AppConfig::default());
        let mut path = SearchPath::new();

        let report = installer.install(&tool, Platform::Unsupported, &mut path).await;
        assert!(matches!(report, InstallReport::Failed(_)));
        assert_eq!(runner.programs(), vec!["ffmpeg -version"]);
    }

    #[tokio::test]
    async fn missing_homebrew_stops_the_chain() {
        let (runner, installer) = installer(
            ScriptedRunner::new().on("ffmpeg", None, vec![Reply::Missing]),
            no_fetch(),
            PathBuf::from("unused"),
        );
        let mut tool = tools::ffmpeg(&AppConfig::default());
        if let Some(strategy) = tool.strategies.iter_mut().find(|s| s.platform == Platform::MacOs) {
            if let InstallAttempt::Command { requires, .. } = &mut strategy.attempts[0] {
                *requires = Some("definitely-not-a-package-manager-umd");
            }
        }
        let mut path = SearchPath::new();

        match installer.install(&tool, Platform::MacOs, &mut path).await {
            InstallReport::Failed(message) => assert!(message.contains("definitely-not-a-package-manager-umd")),
            other => panic!("unexpected report: {:?}", other),
        }
        assert_eq!(runner.programs(), vec!["ffmpeg -version"]);
    }

    #[tokio::test]
    async fn interrupt_cancels_the_chain() {
        let (runner, installer) = installer(
            ScriptedRunner::new()
                .on("ffmpeg", None, vec![Reply::Missing])
                .on("sudo", Some("apt-get"), vec![Reply::Interrupted]),
            no_fetch(),
            PathBuf::from("unused"),
        );
        let tool = tools::ffmpeg(&AppConfig::default());
        let mut path = SearchPath::new();

        assert_eq!(installer.install(&tool, Platform::Linux, &mut path).await, InstallReport::Cancelled);
        assert!(!runner.programs().iter().any(|p| p.contains("dnf")));
    }

    #[tokio::test]
    async fn windows_archive_fallback_extends_search_path() {
        let source_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("build.zip");
        write_zip(&source, &[("ffmpeg-master-latest-win64-gpl/bin/ffmpeg.exe", "bin")]);

        let tools_dir = tempfile::tempdir().unwrap();
        let tools_path = tools_dir.path().to_path_buf();
        let expected_bin = tools_path.join("ffmpeg-master-latest-win64-gpl").join("bin");

        let (runner, installer) = installer(
            ScriptedRunner::new()
                .on("winget", None, vec![Reply::TimedOut])
                .on("ffmpeg", None, vec![Reply::Missing, Reply::Missing]),
            FakeFetcher::new(FetchReply::CopyFrom(source)),
            tools_path.clone(),
        );
        let tool = tools::ffmpeg(&AppConfig::default());
        let mut path = SearchPath::new();

        let report = installer.install(&tool, Platform::Windows, &mut path).await;

        assert_eq!(report, InstallReport::Unverified);
        assert_eq!(path.prepended(), &[expected_bin.clone()]);
        assert!(!tools_path.join("ffmpeg.zip").exists());

        let calls = runner.calls.lock().unwrap();
        let (last_probe, probe_path) = calls.last().unwrap();
        assert_eq!(last_probe.program, "ffmpeg");
        assert_eq!(probe_path.prepended(), &[expected_bin]);
    }

    #[tokio::test]
    async fn interrupted_archive_fetch_cancels() {
        let tools_dir = tempfile::tempdir().unwrap();
        let (_, installer) = installer(
            ScriptedRunner::new()
                .on("ffmpeg", None, vec![Reply::Missing])
                .on("winget", None, vec![Reply::Exit(1)]),
            FakeFetcher::new(FetchReply::Interrupted),
            tools_dir.path().to_path_buf(),
        );
        let tool = tools::ffmpeg(&AppConfig::default());
        let mut path = SearchPath::new();

        assert_eq!(installer.install(&tool, Platform::Windows, &mut path).await, InstallReport::Cancelled);
        assert!(path.is_default());
        assert!(!tools_dir.path().join("ffmpeg.zip").exists());
    }

    #[tokio::test]
    async fn update_runs_chain_even_when_present() {
        let (runner, installer) = installer(
            ScriptedRunner::new()
                .on("yt-dlp", None, vec![Reply::Exit(0)])
                .on("python3", None, vec![Reply::Exit(0)]),
            no_fetch(),
            PathBuf::from("unused"),
        );
        let tool = tools::yt_dlp(&AppConfig::default());
        let mut path = SearchPath::new();

        assert_eq!(installer.update(&tool, Platform::Linux, &mut path).await, InstallReport::Verified);
        assert_eq!(
            runner.programs(),
            vec!["python3 -m pip install --upgrade yt-dlp", "yt-dlp --version"]
        );
    }
}
