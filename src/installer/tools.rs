//! The three external tools this program depends on and how each gets installed.

use crate::config::AppConfig;
use crate::installer::{InstallAttempt, InstallStrategy, Platform, ToolSpec};
use crate::runner::CommandLine;

pub const FFMPEG_DOWNLOAD_PAGE: &str = "https://ffmpeg.org/download.html";

fn pip_install(python: &str, package: &str) -> CommandLine {
    CommandLine::new(python).args(["-m", "pip", "install", "--upgrade", package])
}

/// pip chains shared by both engines.
fn pip_strategies(package: &str, config: &AppConfig) -> Vec<InstallStrategy> {
    let timeout = config.install_timeout();
    let attempts = |pythons: [&str; 2]| {
        pythons
            .iter()
            .map(|python| InstallAttempt::Command {
                command: pip_install(python, package),
                timeout,
                requires: None,
            })
            .collect::<Vec<_>>()
    };

    vec![
        InstallStrategy::new(Platform::Windows, attempts(["python", "py"])),
        InstallStrategy::new(Platform::Linux, attempts(["python3", "python"])),
        InstallStrategy::new(Platform::MacOs, attempts(["python3", "python"])),
    ]
}

pub fn spotdl(config: &AppConfig) -> ToolSpec {
    ToolSpec {
        name: "spotdl",
        probe: CommandLine::new("spotdl").arg("--version"),
        strategies: pip_strategies("spotdl", config),
        remedies: vec![(None, vec!["pip install spotdl"])],
    }
}

pub fn yt_dlp(config: &AppConfig) -> ToolSpec {
    ToolSpec {
        name: "yt-dlp",
        probe: CommandLine::new("yt-dlp").arg("--version"),
        strategies: pip_strategies("yt-dlp", config),
        remedies: vec![(None, vec!["pip install --upgrade yt-dlp"])],
    }
}

pub fn ffmpeg(config: &AppConfig) -> ToolSpec {
    let timeout = config.install_timeout();
    let system = |program: &str, args: &[&str]| InstallAttempt::Command {
        command: CommandLine::new(program).args(args.iter().copied()),
        timeout,
        requires: None,
    };

    ToolSpec {
        name: "ffmpeg",
        probe: CommandLine::new("ffmpeg").arg("-version"),
        strategies: vec![
            InstallStrategy::new(
                Platform::Windows,
                vec![
                    InstallAttempt::Command {
                        command: CommandLine::new("winget").args(["install", "FFmpeg", "--silent"]),
                        timeout: config.winget_timeout(),
                        requires: None,
                    },
                    InstallAttempt::ArchiveDownload {
                        url: config.ffmpeg_archive_url.clone(),
                        binary: "ffmpeg.exe",
                    },
                ],
            ),
            InstallStrategy::new(
                Platform::Linux,
                vec![
                    system("sudo", &["apt-get", "install", "-y", "ffmpeg"]),
                    system("sudo", &["dnf", "install", "-y", "ffmpeg"]),
                ],
            ),
            InstallStrategy::new(
                Platform::MacOs,
                vec![InstallAttempt::Command {
                    command: CommandLine::new("brew").args(["install", "ffmpeg"]),
                    timeout,
                    requires: Some("brew"),
                }],
            ),
        ],
        remedies: vec![
            (Some(Platform::Windows), vec!["winget install FFmpeg", FFMPEG_DOWNLOAD_PAGE]),
            (Some(Platform::Linux), vec!["sudo apt install ffmpeg", "sudo dnf install ffmpeg"]),
            (Some(Platform::MacOs), vec!["brew install ffmpeg"]),
            (None, vec![FFMPEG_DOWNLOAD_PAGE]),
        ],
    }
}
