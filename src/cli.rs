use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::downloader::SourcePlatform;
use crate::security::InputValidator;

/// Download music from Spotify and videos or audio from YouTube
#[derive(Parser, Debug)]
#[command(name = "universal-downloader", author, version, about)]
pub struct Args {
    /// Spotify or YouTube URL; prompts interactively when omitted
    #[arg(short, long)]
    pub url: Option<String>,

    /// Output directory [default: download_path from the config file]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Source platform
    #[arg(short, long, value_enum, default_value_t = PlatformArg::Auto)]
    pub platform: PlatformArg,

    /// Download audio only (YouTube)
    #[arg(long)]
    pub audio: bool,

    /// Force interactive mode
    #[arg(short, long)]
    pub interactive: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    Spotify,
    Youtube,
    Auto,
}

impl PlatformArg {
    /// `Auto` defers to URL detection.
    pub fn resolve(self, url: &str) -> SourcePlatform {
        match self {
            PlatformArg::Spotify => SourcePlatform::Spotify,
            PlatformArg::Youtube => SourcePlatform::YouTube,
            PlatformArg::Auto => InputValidator::new().detect_platform(url),
        }
    }
}

impl Args {
    /// Direct mode needs a URL and no `--interactive`.
    pub fn is_direct(&self) -> bool {
        self.url.is_some() && !self.interactive
    }
}
