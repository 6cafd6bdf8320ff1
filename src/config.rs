use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use crate::errors::{AppError, Result};

pub const DEFAULT_FFMPEG_ARCHIVE_URL: &str =
    "https://github.com/BtbN/FFmpeg-Builds/releases/download/latest/ffmpeg-master-latest-win64-gpl.zip";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub download_path: PathBuf,
    /// Parallel fragment/track fetches requested from the engines.
    pub concurrency: u8,
    pub probe_timeout_secs: u64,
    pub inspect_timeout_secs: u64,
    pub winget_timeout_secs: u64,
    pub install_timeout_secs: u64,
    /// Longest silence tolerated while fetching the FFmpeg archive.
    pub fetch_idle_timeout_secs: u64,
    pub summary_limit: usize,
    /// Where the Windows FFmpeg archive is unpacked. Defaults to `~/.noradownloader/ffmpeg`.
    pub tools_dir: Option<PathBuf>,
    pub ffmpeg_archive_url: String,
    pub proxy: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            download_path: PathBuf::from("downloads"),
            concurrency: 4,
            probe_timeout_secs: 10,
            inspect_timeout_secs: 5,
            winget_timeout_secs: 60,
            install_timeout_secs: 600,
            fetch_idle_timeout_secs: 60,
            summary_limit: 5,
            tools_dir: None,
            ffmpeg_archive_url: DEFAULT_FFMPEG_ARCHIVE_URL.to_string(),
            proxy: None,
        }
    }
}

impl AppConfig {
    /// Defaults, then the optional JSON file, then `UMD_*` environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(config_path)
    }

    pub fn load_from(config_path: PathBuf) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::File::from(config_path)
                    .format(config::FileFormat::Json)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix("UMD").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::Config(config::ConfigError::Message("Could not find config directory".to_string())))?;

        Ok(config_dir.join("universal-downloader").join("config.json"))
    }

    pub fn tools_dir(&self) -> PathBuf {
        self.tools_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".noradownloader")
                .join("ffmpeg")
        })
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn inspect_timeout(&self) -> Duration {
        Duration::from_secs(self.inspect_timeout_secs)
    }

    pub fn winget_timeout(&self) -> Duration {
        Duration::from_secs(self.winget_timeout_secs)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    pub fn fetch_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_idle_timeout_secs)
    }
}
