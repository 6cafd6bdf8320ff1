//! Direct and interactive flows composing the installer, the engines and the inspector.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::cli::Args;
use crate::config::AppConfig;
use crate::downloader::strategies::engine_for;
use crate::downloader::{
    AudioBitrate, AudioFormat, DownloadOutcome, DownloadRequest, EngineInvoker, MediaEngine, MediaSelection,
    SourcePlatform, VideoFormat, VideoQuality,
};
use crate::errors::{AppError, Result};
use crate::installer::{tools, ArchiveFetcher, DependencyInstaller, HttpFetcher, InstallReport, Platform, ToolSpec};
use crate::metadata::{MediaSummary, ResultInspector};
use crate::prompt;
use crate::runner::{ProcessRunner, SearchPath, SystemRunner};
use crate::security::InputValidator;
use crate::utils::{format_duration, format_file_size, truncate};

const TAG_DISPLAY_WIDTH: usize = 40;

/// How a flow ended, mapped onto the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Failed,
}

impl From<RunStatus> for ExitCode {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Completed => ExitCode::SUCCESS,
            RunStatus::Failed => ExitCode::from(1),
        }
    }
}

/// State shared by one program run. The search path only grows when an
/// installer unpacks a tool outside the system path.
pub struct Session {
    config: AppConfig,
    platform: Platform,
    search_path: SearchPath,
    runner: Arc<dyn ProcessRunner>,
    installer: DependencyInstaller,
}

impl Session {
    pub fn new(
        config: AppConfig,
        platform: Platform,
        runner: Arc<dyn ProcessRunner>,
        fetcher: Arc<dyn ArchiveFetcher>,
    ) -> Self {
        let installer = DependencyInstaller::new(runner.clone(), fetcher, config.tools_dir(), config.probe_timeout());
        Self {
            config,
            platform,
            search_path: SearchPath::new(),
            runner,
            installer,
        }
    }

    /// Real processes and a real HTTP client for the current platform.
    pub fn system(config: AppConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.fetch_idle_timeout(), config.proxy.as_deref())?;
        Ok(Self::new(config, Platform::current(), Arc::new(SystemRunner::new()), Arc::new(fetcher)))
    }

    fn invoker(&self) -> EngineInvoker {
        EngineInvoker::new(self.runner.clone(), self.search_path.clone())
    }

    fn inspector(&self) -> ResultInspector {
        ResultInspector::new(self.runner.clone(), self.search_path.clone(), self.config.inspect_timeout())
    }

    fn engine_tool(&self, platform: SourcePlatform) -> Option<ToolSpec> {
        match platform {
            SourcePlatform::Spotify => Some(tools::spotdl(&self.config)),
            SourcePlatform::YouTube => Some(tools::yt_dlp(&self.config)),
            SourcePlatform::Unknown => None,
        }
    }

    /// Non-interactive run driven entirely by the command line.
    pub async fn run_direct(&mut self, args: &Args) -> Result<RunStatus> {
        let ffmpeg = tools::ffmpeg(&self.config);
        if !self.installer.is_present(&ffmpeg, &self.search_path).await {
            println!("FFmpeg not found. Use -i for automatic installation.\n");
        }

        print_banner();

        let url = args.url.as_deref().unwrap_or_default();
        let platform = args.platform.resolve(url);
        let (Some(engine), Some(tool)) = (engine_for(platform, self.config.concurrency), self.engine_tool(platform))
        else {
            eprintln!("❌ Invalid URL or platform!");
            return Ok(RunStatus::Failed);
        };
        println!("✓ {} mode{}\n", platform.display_name(), link_kind(url));

        if !self.installer.is_present(&tool, &self.search_path).await {
            log::warn!("🔍 [INSTALL] {} missing, direct mode does not install", tool.name);
            eprintln!("❌ {} is not installed! Please install it: {}", tool.name, remedy_line(&tool, self.platform));
            return Ok(RunStatus::Failed);
        }

        let media = match platform {
            SourcePlatform::Spotify => MediaSelection::Audio {
                bitrate: Some(AudioBitrate::Kbps320),
                format: AudioFormat::Mp3,
            },
            _ if args.audio => MediaSelection::Audio { bitrate: None, format: AudioFormat::Mp3 },
            _ => MediaSelection::Video {
                quality: VideoQuality::Best,
                format: VideoFormat::Mp4,
            },
        };
        let output = args.output.clone().unwrap_or_else(|| self.config.download_path.clone());

        let request = match DownloadRequest::new(url, output, platform, media) {
            Ok(request) => request,
            Err(e) => {
                eprintln!("❌ {}", e);
                return Ok(RunStatus::Failed);
            }
        };

        match self.download_and_report(engine.as_ref(), &request).await? {
            DownloadOutcome::Success | DownloadOutcome::Cancelled => Ok(RunStatus::Completed),
            // Scripts calling direct mode need to tell a failed download from a finished one.
            DownloadOutcome::ToolFailure(_) => Ok(RunStatus::Failed),
        }
    }

    /// Menu-driven run. Soft failures end the flow with a message and exit status 0.
    pub async fn run_interactive(&mut self, args: &Args) -> Result<RunStatus> {
        print_banner();
        self.offer_ffmpeg().await?;
        print_platform_table();

        let url = prompt::ask_text("Enter the URL (Spotify or YouTube link, detected automatically)", None).await?;
        if url.is_empty() {
            eprintln!("❌ URL is required!");
            return Ok(RunStatus::Completed);
        }
        println!();

        let platform = args.platform.resolve(&url);
        let (Some(engine), Some(tool)) = (engine_for(platform, self.config.concurrency), self.engine_tool(platform))
        else {
            eprintln!("❌ Invalid URL! Enter a Spotify or YouTube link.");
            return Ok(RunStatus::Completed);
        };
        println!("✓ {} link detected!{}\n", platform.display_name(), link_kind(&url));

        if !self.ensure_engine(&tool).await? {
            return Ok(RunStatus::Completed);
        }

        let media = match platform {
            SourcePlatform::Spotify => ask_spotify_selection().await?,
            _ => ask_youtube_selection().await?,
        };

        let default_output = args.output.clone().unwrap_or_else(|| self.config.download_path.clone());
        let output = if prompt::confirm("Use a custom output directory?", false).await? {
            let default = default_output.to_string_lossy().into_owned();
            PathBuf::from(prompt::ask_text("Output directory", Some(default.as_str())).await?)
        } else {
            default_output
        };
        println!();

        let request = match DownloadRequest::new(&url, output, platform, media) {
            Ok(request) => request,
            Err(e) => {
                eprintln!("❌ {}", e);
                return Ok(RunStatus::Completed);
            }
        };

        self.download_and_report(engine.as_ref(), &request).await?;
        Ok(RunStatus::Completed)
    }

    /// FFmpeg menu: automatic install, manual instructions, or skip.
    async fn offer_ffmpeg(&mut self) -> Result<()> {
        let ffmpeg = tools::ffmpeg(&self.config);
        if self.installer.is_present(&ffmpeg, &self.search_path).await {
            return Ok(());
        }

        println!("⚠ FFmpeg not found");
        println!("FFmpeg is required for audio/video conversion.\n");
        println!("  1  Automatic installation (recommended)");
        println!("  2  Show manual installation instructions");
        println!("  3  Skip for now (some features may not work)\n");

        match prompt::ask_choice("Your choice", 1..=3, 1).await? {
            1 => {
                println!("\nInstalling FFmpeg for {}...", self.platform);
                let report = self.installer.install(&ffmpeg, self.platform, &mut self.search_path).await;
                report_install(&ffmpeg, &report, self.platform);
            }
            2 => {
                print_manual_ffmpeg_instructions();
                prompt::pause("Press Enter to continue...").await?;
                println!();
            }
            _ => {
                println!("Continuing without FFmpeg.");
                println!("Note: some format conversions may not work.\n");
            }
        }
        Ok(())
    }

    /// Installs the engine on request, or offers to update yt-dlp when it is present.
    /// Returns false when the flow cannot continue.
    async fn ensure_engine(&mut self, tool: &ToolSpec) -> Result<bool> {
        if self.installer.is_present(tool, &self.search_path).await {
            if tool.name == "yt-dlp" && prompt::confirm("Update yt-dlp? (recommended)", true).await? {
                println!("Updating yt-dlp...");
                let report = self.installer.update(tool, self.platform, &mut self.search_path).await;
                report_install(tool, &report, self.platform);
            }
            return Ok(true);
        }

        if !prompt::confirm(&format!("{} is not installed. Install it now?", tool.name), false).await? {
            eprintln!("❌ {} is required. Exiting.", tool.name);
            return Ok(false);
        }

        println!("Installing {}...", tool.name);
        let report = self.installer.install(tool, self.platform, &mut self.search_path).await;
        report_install(tool, &report, self.platform);
        if !report.is_usable() {
            eprintln!("❌ Exiting.");
        }
        Ok(report.is_usable())
    }

    async fn download_and_report(&self, engine: &dyn MediaEngine, request: &DownloadRequest) -> Result<DownloadOutcome> {
        println!(
            "→ Starting {} download, {} ({} parallel)...\n",
            engine.name(),
            request.media(),
            self.config.concurrency.max(1)
        );

        let outcome = match self.invoker().download(engine, request).await {
            Ok(outcome) => outcome,
            Err(AppError::ToolNotFound(name)) => {
                eprintln!("\n❌ {} could not be started. Install it with: {}", name, engine.failure_hint());
                return Ok(DownloadOutcome::ToolFailure(-1));
            }
            Err(e) => return Err(e),
        };

        match outcome {
            DownloadOutcome::Success => {
                println!("\n✓ Download complete!");
                println!("Location: {}", request.output_directory().display());
                self.show_summary(request.output_directory(), &request.media()).await;
            }
            DownloadOutcome::ToolFailure(code) => {
                eprintln!("\n❌ An error occurred during the download (exit code {}).", code);
                eprintln!("Try updating {}: {}", engine.name(), engine.failure_hint());
            }
            DownloadOutcome::Cancelled => {
                println!("\nDownload cancelled.");
            }
        }
        Ok(outcome)
    }

    async fn show_summary(&self, directory: &Path, media: &MediaSelection) {
        let summaries = match self.inspector().inspect(directory, media, self.config.summary_limit).await {
            Ok(summaries) => summaries,
            Err(e) => {
                log::debug!("📂 [INSPECT] Could not inspect {:?}: {}", directory, e);
                return;
            }
        };
        if summaries.is_empty() {
            return;
        }

        println!("\nDownloaded files:");
        for summary in &summaries {
            for line in summary_lines(summary) {
                println!("{}", line);
            }
        }
        println!();
    }
}

async fn ask_spotify_selection() -> Result<MediaSelection> {
    print_choices(&AudioBitrate::CHOICES);
    let bitrate = AudioBitrate::from_choice(prompt::ask_choice("Select quality", 1..=4, 1).await?);

    print_choices(&AudioFormat::CHOICES);
    let format = AudioFormat::from_choice(prompt::ask_choice("Select format", 1..=3, 1).await?)
        .unwrap_or(AudioFormat::Mp3);

    Ok(MediaSelection::Audio { bitrate, format })
}

async fn ask_youtube_selection() -> Result<MediaSelection> {
    if prompt::confirm("Download audio only (MP3)?", false).await? {
        return Ok(MediaSelection::Audio { bitrate: None, format: AudioFormat::Mp3 });
    }

    print_choices(&VideoQuality::CHOICES);
    let quality = VideoQuality::from_choice(prompt::ask_choice("Select quality", 1..=3, 1).await?)
        .unwrap_or(VideoQuality::Best);

    print_choices(&VideoFormat::CHOICES);
    let format = VideoFormat::from_choice(prompt::ask_choice("Select format", 1..=3, 1).await?)
        .unwrap_or(VideoFormat::Mp4);

    Ok(MediaSelection::Video { quality, format })
}

fn print_choices<T>(choices: &[(u8, T, &str)]) {
    for (number, _, label) in choices {
        println!("  {}  {}", number, label);
    }
}

fn print_banner() {
    println!("╔══════════════════════════════════════╗");
    println!("║   🎵 Universal Media Downloader 🎵   ║");
    println!("║     Spotify & YouTube Downloader     ║");
    println!("╚══════════════════════════════════════╝\n");
}

fn print_platform_table() {
    println!("  Platform     Supported");
    println!("  ♫ Spotify    Track, Album, Playlist, Artist");
    println!("  ▶ YouTube    Video, Playlist, Live stream\n");
}

fn print_manual_ffmpeg_instructions() {
    println!("Manual installation:\n");
    println!("Windows:");
    println!("  1. Open a terminal (CMD or PowerShell)");
    println!("  2. Run: winget install FFmpeg");
    println!("  3. Or download from {}\n", tools::FFMPEG_DOWNLOAD_PAGE);
    println!("Linux:");
    println!("  Ubuntu/Debian: sudo apt install ffmpeg");
    println!("  Fedora: sudo dnf install ffmpeg\n");
    println!("macOS:");
    println!("  brew install ffmpeg\n");
}

/// " (playlist)" and friends for Spotify links, empty otherwise.
fn link_kind(url: &str) -> String {
    InputValidator::new()
        .parse_spotify_url(url)
        .map(|(kind, _)| format!(" ({})", kind.as_str()))
        .unwrap_or_default()
}

fn remedy_line(tool: &ToolSpec, platform: Platform) -> String {
    tool.remedies_for(platform).join(" or ")
}

fn report_install(tool: &ToolSpec, report: &InstallReport, platform: Platform) {
    match report {
        InstallReport::Verified => println!("✓ {} is ready.\n", tool.name),
        InstallReport::Unverified => {
            println!("⚠ {} was installed but could not be found yet.", tool.name);
            println!("You may need to restart your terminal so the PATH change takes effect.\n");
        }
        InstallReport::Cancelled => println!("Installation cancelled.\n"),
        InstallReport::Failed(diagnostic) => {
            eprintln!("❌ Automatic installation of {} failed.", tool.name);
            if !diagnostic.is_empty() {
                eprintln!("{}", diagnostic);
            }
            eprintln!("Manual installation:");
            for remedy in tool.remedies_for(platform) {
                eprintln!("  {}", remedy);
            }
            eprintln!();
        }
    }
}

/// Display lines for one downloaded file: name, size, then tag pairs.
fn summary_lines(summary: &MediaSummary) -> Vec<String> {
    let mut lines = vec![
        format!("\n✓ {}", summary.filename),
        format!("  Size: {}", format_file_size(summary.size_bytes)),
    ];

    let mut parts = Vec::new();
    if let Some(title) = &summary.title {
        parts.push(format!("Title: {}", truncate(title, TAG_DISPLAY_WIDTH)));
    }
    if let Some(artist) = &summary.artist {
        parts.push(format!("Artist: {}", truncate(artist, TAG_DISPLAY_WIDTH)));
    }
    if let Some(duration) = summary.duration_seconds {
        parts.push(format!("Duration: {}", format_duration(duration)));
    }
    if let Some(bitrate) = summary.bitrate_kbps {
        parts.push(format!("Bitrate: {} kbps", bitrate));
    }
    for pair in parts.chunks(2) {
        lines.push(format!("  {}", pair.join(" | ")));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::fetch::fake::{FakeFetcher, FetchReply};
    use crate::runner::fake::{Reply, ScriptedRunner};
    use clap::Parser;

    fn session(runner: ScriptedRunner) -> (Arc<ScriptedRunner>, Session) {
        let runner = Arc::new(runner);
        let session = Session::new(
            AppConfig::default(),
            Platform::Linux,
            runner.clone(),
            Arc::new(FakeFetcher::new(FetchReply::Interrupted)),
        );
        (runner, session)
    }

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["universal-downloader"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    async fn direct_mode_rejects_unknown_platform() {
        let (runner, mut session) = session(ScriptedRunner::new().on("ffmpeg", None, vec![Reply::Exit(0)]));

        let status = session.run_direct(&args(&["-u", "https://example.com/video"])).await.unwrap();

        assert_eq!(status, RunStatus::Failed);
        assert_eq!(runner.programs(), vec!["ffmpeg -version"]);
    }

    #[tokio::test]
    async fn direct_mode_fails_when_engine_missing() {
        let (runner, mut session) = session(ScriptedRunner::new().on("ffmpeg", None, vec![Reply::Missing]));

        let status = session
            .run_direct(&args(&["-u", "https://open.spotify.com/track/abc"]))
            .await
            .unwrap();

        assert_eq!(status, RunStatus::Failed);
        assert_eq!(runner.programs(), vec!["ffmpeg -version", "spotdl --version"]);
    }

    #[tokio::test]
    async fn direct_youtube_audio_downloads_and_summarizes() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");
        let output_for_engine = output.clone();

        let (runner, mut session) = session(
            ScriptedRunner::new()
                .on("ffmpeg", None, vec![Reply::Exit(0)])
                .on("yt-dlp", Some("--version"), vec![Reply::Exit(0)])
                .on_each(
                    |c| c.program == "yt-dlp" && c.contains("-x"),
                    move |_| {
                        std::fs::write(output_for_engine.join("Song.mp3"), b"audio").unwrap();
                        Reply::Exit(0)
                    },
                )
                .on(
                    "ffprobe",
                    None,
                    vec![Reply::ExitWith {
                        code: 0,
                        stdout: r#"{"format": {"tags": {"title": "Song"}}}"#.to_string(),
                        stderr: String::new(),
                    }],
                ),
        );

        let status = session
            .run_direct(&args(&[
                "-u",
                "https://www.youtube.com/watch?v=abc",
                "--audio",
                "-o",
                output.to_str().unwrap(),
            ]))
            .await
            .unwrap();

        assert_eq!(status, RunStatus::Completed);
        let programs: Vec<String> = runner.calls.lock().unwrap().iter().map(|(c, _)| c.program.clone()).collect();
        assert_eq!(programs, vec!["ffmpeg", "yt-dlp", "yt-dlp", "ffprobe"]);
    }

    #[tokio::test]
    async fn direct_engine_failure_exits_non_zero() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut session) = session(
            ScriptedRunner::new()
                .on("ffmpeg", None, vec![Reply::Exit(0)])
                .on("spotdl", Some("--version"), vec![Reply::Exit(0)])
                .on("spotdl", Some("download"), vec![Reply::Exit(1)]),
        );

        let status = session
            .run_direct(&args(&[
                "-u",
                "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M",
                "-o",
                dir.path().to_str().unwrap(),
            ]))
            .await
            .unwrap();
        assert_eq!(status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn direct_cancel_is_a_graceful_exit() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, mut session) = session(
            ScriptedRunner::new()
                .on("ffmpeg", None, vec![Reply::Exit(0)])
                .on("yt-dlp", Some("--version"), vec![Reply::Exit(0)])
                .on("yt-dlp", None, vec![Reply::Interrupted]),
        );

        let status = session
            .run_direct(&args(&["-u", "https://youtu.be/abc", "-o", dir.path().to_str().unwrap()]))
            .await
            .unwrap();

        assert_eq!(status, RunStatus::Completed);
        assert!(!runner.programs().iter().any(|p| p.starts_with("ffprobe")));
    }

    #[test]
    fn spotify_links_name_their_kind() {
        assert_eq!(link_kind("https://open.spotify.com/album/1A2GTWGtFfWp7KSQTwWOyo"), " (album)");
        assert_eq!(link_kind("https://youtu.be/abc"), "");
    }

    #[test]
    fn summary_lines_pair_tags() {
        let summary = MediaSummary {
            filename: "Band - Song.mp3".to_string(),
            size_bytes: 5 * 1024 * 1024,
            title: Some("Song".to_string()),
            artist: Some("Band".to_string()),
            duration_seconds: Some(215.4),
            bitrate_kbps: Some(320),
        };
        assert_eq!(
            summary_lines(&summary),
            vec![
                "\n✓ Band - Song.mp3".to_string(),
                "  Size: 5.00 MB".to_string(),
                "  Title: Song | Artist: Band".to_string(),
                "  Duration: 3:35 | Bitrate: 320 kbps".to_string(),
            ]
        );
    }

    #[test]
    fn summary_lines_without_tags() {
        let summary = MediaSummary {
            filename: "clip.webm".to_string(),
            size_bytes: 0,
            title: None,
            artist: None,
            duration_seconds: Some(61.0),
            bitrate_kbps: None,
        };
        assert_eq!(summary_lines(&summary).last().map(String::as_str), Some("  Duration: 1:01"));
    }

    #[test]
    fn exit_status_maps_to_codes() {
        assert_eq!(format!("{:?}", ExitCode::from(RunStatus::Completed)), format!("{:?}", ExitCode::SUCCESS));
        assert_eq!(format!("{:?}", ExitCode::from(RunStatus::Failed)), format!("{:?}", ExitCode::from(1)));
    }
}
