use crate::downloader::{DownloadRequest, MediaEngine, MediaSelection, SourcePlatform};
use crate::runner::CommandLine;

/// File name pattern handed to spotdl; placeholders are expanded by spotdl itself.
const OUTPUT_TEMPLATE: &str = "{artists} - {title}.{output-ext}";

/// Drives `spotdl` for Spotify tracks, albums, playlists and artists.
pub struct SpotDlEngine {
    threads: u8,
}

impl SpotDlEngine {
    pub fn new(threads: u8) -> Self {
        Self { threads: threads.max(1) }
    }
}

impl MediaEngine for SpotDlEngine {
    fn name(&self) -> &'static str {
        "spotdl"
    }

    fn platform(&self) -> SourcePlatform {
        SourcePlatform::Spotify
    }

    fn build_arguments(&self, request: &DownloadRequest) -> CommandLine {
        let output = request.output_directory().join(OUTPUT_TEMPLATE);
        let mut cmd = CommandLine::new(self.name())
            .arg("download")
            .arg(request.url())
            .arg("--output")
            .arg(output.to_string_lossy());

        if let MediaSelection::Audio { bitrate, format } = request.media() {
            cmd = cmd.arg("--format").arg(format.token());
            if let Some(bitrate) = bitrate {
                cmd = cmd.arg("--bitrate").arg(bitrate.token());
            }
        }

        cmd.arg("--threads").arg(self.threads.to_string())
    }

    fn failure_hint(&self) -> &'static str {
        "pip install --upgrade spotdl"
    }
}
