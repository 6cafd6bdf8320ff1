use crate::downloader::SourcePlatform;
use crate::errors::{AppError, Result};
use url::Url;

const SPOTIFY_DOMAINS: &[&str] = &["spotify.com"];
const YOUTUBE_DOMAINS: &[&str] = &["youtube.com", "youtu.be"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotifyUrlType {
    Track,
    Album,
    Playlist,
    Artist,
}

impl SpotifyUrlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpotifyUrlType::Track => "track",
            SpotifyUrlType::Album => "album",
            SpotifyUrlType::Playlist => "playlist",
            SpotifyUrlType::Artist => "artist",
        }
    }
}

pub struct InputValidator;

impl InputValidator {
    pub fn new() -> Self {
        Self
    }

    /// Substring match on the known domain tokens, mirroring how users paste links.
    pub fn detect_platform(&self, url: &str) -> SourcePlatform {
        if SPOTIFY_DOMAINS.iter().any(|d| url.contains(d)) {
            SourcePlatform::Spotify
        } else if YOUTUBE_DOMAINS.iter().any(|d| url.contains(d)) {
            SourcePlatform::YouTube
        } else {
            SourcePlatform::Unknown
        }
    }

    /// Checks that `url` parses and its host belongs to `platform`.
    pub fn validate_url(&self, url: &str, platform: SourcePlatform) -> Result<()> {
        if url.trim().is_empty() {
            return Err(AppError::Validation("URL cannot be empty".to_string()));
        }

        let parsed_url = Url::parse(url.trim())
            .map_err(|e| AppError::Validation(format!("Invalid URL: {}", e)))?;

        if !matches!(parsed_url.scheme(), "http" | "https") {
            return Err(AppError::Validation(format!(
                "Unsupported URL scheme: {}",
                parsed_url.scheme()
            )));
        }

        let host = parsed_url.host_str()
            .ok_or_else(|| AppError::Validation("URL must have a host".to_string()))?;

        let supported_domains = match platform {
            SourcePlatform::Spotify => SPOTIFY_DOMAINS,
            SourcePlatform::YouTube => YOUTUBE_DOMAINS,
            SourcePlatform::Unknown => {
                return Err(AppError::Validation(format!(
                    "Unsupported platform: {}. Supported platforms: Spotify, YouTube",
                    host
                )));
            }
        };

        let is_supported = supported_domains.iter().any(|domain| {
            host == *domain || host.ends_with(&format!(".{}", domain))
        });

        if !is_supported {
            return Err(AppError::Validation(format!(
                "{} is not a {} address",
                host,
                platform.display_name()
            )));
        }

        Ok(())
    }

    /// Playlist mode is selected from the URL text alone.
    pub fn is_playlist_url(&self, url: &str) -> bool {
        url.to_lowercase().contains("playlist")
    }

    /// Parses links like `https://open.spotify.com/intl-tr/album/1A2GTWGtFfWp7KSQTwWOyo`.
    pub fn parse_spotify_url(&self, url: &str) -> Option<(SpotifyUrlType, String)> {
        let regex = regex::Regex::new(
            r"spotify\.com/(?:intl-[a-zA-Z-]+/)?(track|album|playlist|artist)/([a-zA-Z0-9]+)",
        )
        .ok()?;
        let captures = regex.captures(url)?;

        let url_type = match &captures[1] {
            "track" => SpotifyUrlType::Track,
            "album" => SpotifyUrlType::Album,
            "playlist" => SpotifyUrlType::Playlist,
            "artist" => SpotifyUrlType::Artist,
            _ => return None,
        };
        Some((url_type, captures[2].to_string()))
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}
