pub mod invoker;
pub mod strategies;

use std::fmt;
use std::path::PathBuf;

use crate::errors::{AppError, Result};
use crate::runner::CommandLine;
use crate::security::InputValidator;

pub use invoker::EngineInvoker;

/// Where a URL points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePlatform {
    Spotify,
    YouTube,
    Unknown,
}

impl SourcePlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcePlatform::Spotify => "spotify",
            SourcePlatform::YouTube => "youtube",
            SourcePlatform::Unknown => "unknown",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SourcePlatform::Spotify => "Spotify",
            SourcePlatform::YouTube => "YouTube",
            SourcePlatform::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for SourcePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioBitrate {
    Kbps320,
    Kbps256,
    Kbps192,
    Kbps128,
}

impl AudioBitrate {
    pub const CHOICES: [(u8, AudioBitrate, &'static str); 4] = [
        (1, AudioBitrate::Kbps320, "Best quality (320kbps)"),
        (2, AudioBitrate::Kbps256, "High quality (256kbps)"),
        (3, AudioBitrate::Kbps192, "Normal quality (192kbps)"),
        (4, AudioBitrate::Kbps128, "Low quality (128kbps)"),
    ];

    pub fn from_choice(choice: u8) -> Option<Self> {
        Self::CHOICES.iter().find(|(c, _, _)| *c == choice).map(|(_, b, _)| *b)
    }

    pub fn token(&self) -> &'static str {
        match self {
            AudioBitrate::Kbps320 => "320k",
            AudioBitrate::Kbps256 => "256k",
            AudioBitrate::Kbps192 => "192k",
            AudioBitrate::Kbps128 => "128k",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    M4a,
    Flac,
}

impl AudioFormat {
    pub const CHOICES: [(u8, AudioFormat, &'static str); 3] = [
        (1, AudioFormat::Mp3, "MP3 (recommended)"),
        (2, AudioFormat::M4a, "M4A"),
        (3, AudioFormat::Flac, "FLAC (lossless)"),
    ];

    pub fn from_choice(choice: u8) -> Option<Self> {
        Self::CHOICES.iter().find(|(c, _, _)| *c == choice).map(|(_, f, _)| *f)
    }

    pub fn token(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Flac => "flac",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoQuality {
    Best,
    P720,
    P480,
}

impl VideoQuality {
    pub const CHOICES: [(u8, VideoQuality, &'static str); 3] = [
        (1, VideoQuality::Best, "Best quality (1080p+)"),
        (2, VideoQuality::P720, "High quality (720p)"),
        (3, VideoQuality::P480, "Normal quality (480p)"),
    ];

    pub fn from_choice(choice: u8) -> Option<Self> {
        Self::CHOICES.iter().find(|(c, _, _)| *c == choice).map(|(_, q, _)| *q)
    }

    pub fn token(&self) -> &'static str {
        match self {
            VideoQuality::Best => "best",
            VideoQuality::P720 => "720",
            VideoQuality::P480 => "480",
        }
    }

    /// Maximum frame height, `None` for no limit.
    pub fn max_height(&self) -> Option<u32> {
        match self {
            VideoQuality::Best => None,
            VideoQuality::P720 => Some(720),
            VideoQuality::P480 => Some(480),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFormat {
    Mp4,
    Mkv,
    Webm,
}

impl VideoFormat {
    pub const CHOICES: [(u8, VideoFormat, &'static str); 3] = [
        (1, VideoFormat::Mp4, "MP4 (recommended)"),
        (2, VideoFormat::Mkv, "MKV"),
        (3, VideoFormat::Webm, "WEBM"),
    ];

    pub const ALL: [VideoFormat; 3] = [VideoFormat::Mp4, VideoFormat::Mkv, VideoFormat::Webm];

    pub fn from_choice(choice: u8) -> Option<Self> {
        Self::CHOICES.iter().find(|(c, _, _)| *c == choice).map(|(_, f, _)| *f)
    }

    pub fn token(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Mkv => "mkv",
            VideoFormat::Webm => "webm",
        }
    }
}

/// What the user asked the engine to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSelection {
    /// `bitrate: None` leaves the choice to the engine (best available).
    Audio { bitrate: Option<AudioBitrate>, format: AudioFormat },
    Video { quality: VideoQuality, format: VideoFormat },
}

impl MediaSelection {
    pub fn is_audio_only(&self) -> bool {
        matches!(self, MediaSelection::Audio { .. })
    }

    /// Extensions a finished download of this kind leaves in the output directory.
    pub fn output_extensions(&self) -> Vec<&'static str> {
        match self {
            MediaSelection::Audio { format, .. } => vec![format.token()],
            MediaSelection::Video { .. } => VideoFormat::ALL.iter().map(|f| f.token()).collect(),
        }
    }
}

impl fmt::Display for MediaSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSelection::Audio { bitrate: Some(bitrate), format } => {
                write!(f, "audio {} @ {}", format.token(), bitrate.token())
            }
            MediaSelection::Audio { bitrate: None, format } => write!(f, "audio {} @ best", format.token()),
            MediaSelection::Video { quality, format } => write!(f, "video {} @ {}", format.token(), quality.token()),
        }
    }
}

/// One validated download, owned by the invocation that built it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    url: String,
    output_directory: PathBuf,
    platform: SourcePlatform,
    media: MediaSelection,
}

impl DownloadRequest {
    pub fn new(
        url: &str,
        output_directory: impl Into<PathBuf>,
        platform: SourcePlatform,
        media: MediaSelection,
    ) -> Result<Self> {
        InputValidator::new().validate_url(url, platform)?;
        if platform == SourcePlatform::Spotify && !media.is_audio_only() {
            return Err(AppError::Validation("Spotify downloads are audio only".to_string()));
        }
        Ok(Self {
            url: url.trim().to_string(),
            output_directory: output_directory.into(),
            platform,
            media,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn output_directory(&self) -> &PathBuf {
        &self.output_directory
    }

    pub fn platform(&self) -> SourcePlatform {
        self.platform
    }

    pub fn media(&self) -> MediaSelection {
        self.media
    }

    pub fn is_playlist(&self) -> bool {
        InputValidator::new().is_playlist_url(&self.url)
    }
}

/// Terminal classification of one engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Success,
    ToolFailure(i32),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    NotStarted,
    Running,
    Succeeded,
    ToolFailed(i32),
    Cancelled,
}

impl DownloadState {
    /// `NotStarted → Running`; any other call leaves the state unchanged.
    pub fn start(self) -> Self {
        match self {
            DownloadState::NotStarted => DownloadState::Running,
            other => other,
        }
    }

    /// `Running → terminal`; terminal states never change again.
    pub fn finish(self, outcome: DownloadOutcome) -> Self {
        match self {
            DownloadState::Running => match outcome {
                DownloadOutcome::Success => DownloadState::Succeeded,
                DownloadOutcome::ToolFailure(code) => DownloadState::ToolFailed(code),
                DownloadOutcome::Cancelled => DownloadState::Cancelled,
            },
            other => other,
        }
    }
}

/// An external download engine and how to drive it.
pub trait MediaEngine: Send + Sync {
    /// Name of the engine binary.
    fn name(&self) -> &'static str;

    fn platform(&self) -> SourcePlatform;

    /// Pure mapping from a request to the engine's command line.
    fn build_arguments(&self, request: &DownloadRequest) -> CommandLine;

    /// Command the user can run when the engine reports an error.
    fn failure_hint(&self) -> &'static str;
}
