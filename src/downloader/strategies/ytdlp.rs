use crate::downloader::{DownloadRequest, MediaEngine, MediaSelection, SourcePlatform, VideoFormat, VideoQuality};
use crate::runner::CommandLine;

const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Player clients that avoid the SABR-only web formats YouTube serves to bots.
const PLAYER_CLIENT_ARGS: &str = "youtube:player_client=android,web";

/// Drives `yt-dlp` for YouTube videos and playlists.
pub struct YtDlpEngine {
    concurrent_fragments: u8,
}

impl YtDlpEngine {
    pub fn new(concurrent_fragments: u8) -> Self {
        Self {
            concurrent_fragments: concurrent_fragments.max(1),
        }
    }

    /// `-f` selector preferring streams already in the target container.
    fn format_selector(quality: VideoQuality, format: VideoFormat) -> String {
        let height = quality
            .max_height()
            .map(|h| format!("[height<={}]", h))
            .unwrap_or_default();
        let ext = format.token();
        format!(
            "bestvideo{height}[ext={ext}]+bestaudio/best{height}[ext={ext}]/best{height}",
            height = height,
            ext = ext
        )
    }
}

impl MediaEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn platform(&self) -> SourcePlatform {
        SourcePlatform::YouTube
    }

    fn build_arguments(&self, request: &DownloadRequest) -> CommandLine {
        let output = request.output_directory().join(OUTPUT_TEMPLATE);
        let playlist_flag = if request.is_playlist() {
            "--yes-playlist"
        } else {
            "--no-playlist"
        };

        let cmd = CommandLine::new(self.name())
            .arg("--concurrent-fragments")
            .arg(self.concurrent_fragments.to_string())
            .args(["--no-mtime", playlist_flag])
            .args(["--extractor-args", PLAYER_CLIENT_ARGS])
            .args(["--no-warnings", "--quiet", "--progress"])
            // Metadata: title, uploader as artist, jpg cover
            .args(["--embed-metadata", "--embed-thumbnail", "--convert-thumbnails", "jpg", "--add-metadata"])
            .args(["--parse-metadata", "title:%(title)s"])
            .args(["--parse-metadata", "uploader:%(artist)s"])
            .arg("-o")
            .arg(output.to_string_lossy());

        let cmd = match request.media() {
            MediaSelection::Audio { bitrate, format } => cmd
                .arg("-x")
                .args(["--audio-format", format.token()])
                .arg("--audio-quality")
                .arg(bitrate.map(|b| b.token()).unwrap_or("0"))
                // "Artist - Title" uploads override the uploader guess
                .args(["--parse-metadata", "title:%(artist)s - %(title)s"]),
            MediaSelection::Video { quality, format } => cmd
                .arg("-f")
                .arg(Self::format_selector(quality, format))
                .args(["--merge-output-format", format.token()]),
        };

        cmd.arg(request.url())
    }

    fn failure_hint(&self) -> &'static str {
        "pip install --upgrade yt-dlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::{AudioBitrate, AudioFormat};

    fn request(url: &str, media: MediaSelection) -> DownloadRequest {
        DownloadRequest::new(url, "downloads", SourcePlatform::YouTube, media).unwrap()
    }

    #[test]
    fn audio_only_with_bitrate_choice_two() {
        let media = MediaSelection::Audio {
            bitrate: AudioBitrate::from_choice(2),
            format: AudioFormat::from_choice(1).unwrap(),
        };
        let cmd = YtDlpEngine::new(4).build_arguments(&request("https://www.youtube.com/watch?v=abc", media));

        assert_eq!(cmd.count("256k"), 1);
        assert_eq!(cmd.count("mp3"), 1);
        assert_eq!(cmd.count("-x"), 1);
        assert_eq!(cmd.count("--embed-thumbnail"), 1);
        assert_eq!(cmd.value_of("--audio-format"), Some("mp3"));
        assert!(!cmd.contains("-f"));
        assert!(cmd.contains("title:%(artist)s - %(title)s"));
    }

    #[test]
    fn audio_only_defaults_to_best_quality() {
        let media = MediaSelection::Audio { bitrate: None, format: AudioFormat::Mp3 };
        let cmd = YtDlpEngine::new(4).build_arguments(&request("https://youtu.be/abc", media));
        assert_eq!(cmd.value_of("--audio-quality"), Some("0"));
    }

    #[test]
    fn playlist_marker_selects_playlist_mode() {
        let media = MediaSelection::Video { quality: VideoQuality::Best, format: VideoFormat::Mp4 };
        let engine = YtDlpEngine::new(4);

        let playlist = engine.build_arguments(&request("https://www.youtube.com/playlist?list=PL1", media));
        assert!(playlist.contains("--yes-playlist"));
        assert!(!playlist.contains("--no-playlist"));

        let single = engine.build_arguments(&request("https://www.youtube.com/watch?v=abc", media));
        assert!(single.contains("--no-playlist"));
        assert!(!single.contains("--yes-playlist"));
    }

    #[test]
    fn video_arguments_carry_format_and_quality() {
        let media = MediaSelection::Video { quality: VideoQuality::P720, format: VideoFormat::Mkv };
        let cmd = YtDlpEngine::new(8).build_arguments(&request("https://www.youtube.com/watch?v=abc", media));

        assert_eq!(cmd.program, "yt-dlp");
        assert_eq!(cmd.value_of("--concurrent-fragments"), Some("8"));
        assert_eq!(cmd.value_of("--extractor-args"), Some("youtube:player_client=android,web"));
        assert_eq!(cmd.value_of("--convert-thumbnails"), Some("jpg"));
        assert_eq!(cmd.value_of("--merge-output-format"), Some("mkv"));
        assert_eq!(
            cmd.value_of("-f"),
            Some("bestvideo[height<=720][ext=mkv]+bestaudio/best[height<=720][ext=mkv]/best[height<=720]")
        );
        assert!(cmd.contains("uploader:%(artist)s"));
        assert!(!cmd.contains("-x"));
        assert_eq!(cmd.args.last().map(String::as_str), Some("https://www.youtube.com/watch?v=abc"));
        assert!(cmd.value_of("-o").unwrap().ends_with("%(title)s.%(ext)s"));
    }

    #[test]
    fn best_quality_has_no_height_filter() {
        assert_eq!(
            YtDlpEngine::format_selector(VideoQuality::Best, VideoFormat::Mp4),
            "bestvideo[ext=mp4]+bestaudio/best[ext=mp4]/best"
        );
    }
}
