//! Post-download inspection: find what the engine wrote and read its tags back.

pub mod probe;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::downloader::MediaSelection;
use crate::errors::{AppError, Result};
use crate::runner::{ProcessRunner, SearchPath};

pub use probe::ProbedTags;

/// One file from the output directory, as shown after a download.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSummary {
    pub filename: String,
    pub size_bytes: u64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub duration_seconds: Option<f64>,
    pub bitrate_kbps: Option<u64>,
}

impl MediaSummary {
    fn bare(filename: String, size_bytes: u64) -> Self {
        Self {
            filename,
            size_bytes,
            title: None,
            artist: None,
            duration_seconds: None,
            bitrate_kbps: None,
        }
    }
}

pub struct ResultInspector {
    runner: Arc<dyn ProcessRunner>,
    search_path: SearchPath,
    probe_timeout: Duration,
}

impl ResultInspector {
    pub fn new(runner: Arc<dyn ProcessRunner>, search_path: SearchPath, probe_timeout: Duration) -> Self {
        Self {
            runner,
            search_path,
            probe_timeout,
        }
    }

    /// Files directly inside `directory` whose extension is one of `extensions`
    /// (case-insensitive). A missing directory yields an empty list.
    pub async fn scan(directory: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
        if !directory.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let matches = path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .is_some_and(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(&ext)));
            if matches {
                files.push(path);
            }
        }

        log::debug!("📂 [INSPECT] {} matching file(s) in {:?}", files.len(), directory);
        Ok(files)
    }

    /// Newest `limit` files by modification time, each probed for tags.
    ///
    /// Probe failures only drop the tags; filename and size are always kept.
    pub async fn summarize(&self, files: &[PathBuf], limit: usize) -> Vec<MediaSummary> {
        let mut dated = Vec::with_capacity(files.len());
        for path in files {
            match tokio::fs::metadata(path).await {
                Ok(meta) => {
                    let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                    dated.push((path, modified, meta.len()));
                }
                Err(e) => log::debug!("📂 [INSPECT] Skipping {:?}: {}", path, e),
            }
        }
        dated.sort_by(|a, b| b.1.cmp(&a.1));
        dated.truncate(limit);

        let mut summaries = Vec::with_capacity(dated.len());
        for (path, _, size) in dated {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned());
            let mut summary = MediaSummary::bare(filename, size);

            match self.probe(path).await {
                Ok(tags) => {
                    summary.title = tags.title;
                    summary.artist = tags.artist;
                    summary.duration_seconds = tags.duration_seconds;
                    summary.bitrate_kbps = tags.bitrate_kbps;
                }
                Err(e) => log::debug!("🔍 [PROBE] {:?}: {}", path, e),
            }
            summaries.push(summary);
        }
        summaries
    }

    /// Scans `directory` for what `media` produces and summarizes the newest files.
    pub async fn inspect(&self, directory: &Path, media: &MediaSelection, limit: usize) -> Result<Vec<MediaSummary>> {
        let files = Self::scan(directory, &media.output_extensions()).await?;
        Ok(self.summarize(&files, limit).await)
    }

    async fn probe(&self, file: &Path) -> Result<ProbedTags> {
        let command = probe::probe_command(file);
        let output = self
            .runner
            .run_captured(&command, Some(self.probe_timeout), &self.search_path)
            .await?;
        if !output.success() {
            return Err(AppError::Probe(format!("ffprobe ended with {:?}", output.state)));
        }
        probe::parse_probe_output(&output.stdout)
    }
}
