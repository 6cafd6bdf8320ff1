use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, ClientBuilder, Proxy};
use tokio::io::AsyncWriteExt;

use crate::errors::{AppError, Result};

const USER_AGENT: &str = concat!("universal-downloader/", env!("CARGO_PKG_VERSION"));

/// Fetches an archive to a local file.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Streams `url` into `destination`. Returns `AppError::Interrupted` on Ctrl+C.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64>;
}

/// Streams archives over HTTP with a terminal progress bar.
pub struct HttpFetcher {
    client: Client,
    /// Longest wait for the response headers or for the next body chunk.
    idle_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(idle_timeout: Duration, proxy: Option<&str>) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .gzip(true)
            .brotli(true)
            .tcp_keepalive(Duration::from_secs(60));

        if let Some(proxy_url) = proxy {
            log::debug!("🌐 [HTTP] Using proxy {}", proxy_url);
            builder = builder.proxy(Proxy::all(proxy_url)?);
        }

        Ok(Self {
            client: builder.build()?,
            idle_timeout,
        })
    }

    fn progress_bar(total_size: u64) -> ProgressBar {
        if total_size == 0 {
            return ProgressBar::new_spinner();
        }
        let pb = ProgressBar::new(total_size);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }

    /// Awaits `step`, failing if nothing arrives within the idle timeout.
    async fn within_idle<T>(&self, url: &str, step: impl std::future::Future<Output = T>) -> Result<T> {
        tokio::time::timeout(self.idle_timeout, step).await.map_err(|_| {
            AppError::Download(format!("No data from {} for {:?}", url, self.idle_timeout))
        })
    }

    async fn stream_to_file(&self, url: &str, destination: &Path) -> Result<u64> {
        let response = self.within_idle(url, self.client.get(url).send()).await??;
        if !response.status().is_success() {
            return Err(AppError::Download(format!("HTTP error: {}", response.status())));
        }

        let total_size = response.content_length().unwrap_or(0);
        let pb = Self::progress_bar(total_size);
        let mut file = tokio::fs::File::create(destination).await?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = self.within_idle(url, stream.next()).await? {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }
        file.flush().await?;
        pb.finish_and_clear();

        Ok(downloaded)
    }
}

#[async_trait]
impl ArchiveFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64> {
        log::info!("🌐 [HTTP] Fetching {} -> {:?}", url, destination);

        let transfer = self.stream_to_file(url, destination);
        tokio::pin!(transfer);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        tokio::select! {
            biased;
            _ = &mut ctrl_c => {
                log::warn!("⚠️ [HTTP] Fetch interrupted: {}", url);
                Err(AppError::Interrupted)
            }
            result = &mut transfer => {
                if let Ok(bytes) = &result {
                    log::info!("✅ [HTTP] Received {} bytes", bytes);
                }
                result
            }
        }
    }
}

#[cfg(test)]
pub mod fake {
    //! Fetcher that copies a prepared archive instead of hitting the network.

    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    pub enum FetchReply {
        CopyFrom(PathBuf),
        /// Writes some bytes then fails, leaving a partial file.
        Partial,
        Interrupted,
    }

    pub struct FakeFetcher {
        reply: FetchReply,
        pub requested: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn new(reply: FetchReply) -> Self {
            Self {
                reply,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ArchiveFetcher for FakeFetcher {
        async fn fetch(&self, url: &str, destination: &Path) -> Result<u64> {
            self.requested.lock().unwrap().push(url.to_string());
            match &self.reply {
                FetchReply::CopyFrom(source) => Ok(tokio::fs::copy(source, destination).await?),
                FetchReply::Partial => {
                    tokio::fs::write(destination, b"PK\x03\x04truncated").await?;
                    Err(AppError::Download("connection reset".to_string()))
                }
                FetchReply::Interrupted => Err(AppError::Interrupted),
            }
        }
    }
}
