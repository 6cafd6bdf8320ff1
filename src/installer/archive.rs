use std::fs::File;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::{AppError, Result};
use crate::installer::fetch::ArchiveFetcher;
use crate::utils::ensure_dir_exists;

const ARCHIVE_NAME: &str = "ffmpeg.zip";

/// Unpacks `archive` into `destination`, keeping the archive's own layout.
pub fn extract(archive: &Path, destination: &Path) -> Result<()> {
    let file = File::open(archive)?;
    let mut reader = zip::ZipArchive::new(file)?;
    log::debug!("📦 [INSTALL] Extracting {} entries into {:?}", reader.len(), destination);
    reader.extract(destination)?;
    Ok(())
}

/// First file named `binary` anywhere below `root`, compared case-insensitively.
pub fn find_binary(root: &Path, binary: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| entry.file_name().to_string_lossy().eq_ignore_ascii_case(binary))
        .map(|entry| entry.into_path())
}

/// Downloads the archive at `url` into `tools_dir`, unpacks it there and returns
/// the directory holding `binary`. The archive file is removed whether or not
/// the install worked.
pub async fn install_from_archive(
    fetcher: &dyn ArchiveFetcher,
    url: &str,
    tools_dir: &Path,
    binary: &str,
) -> Result<PathBuf> {
    ensure_dir_exists(tools_dir).await?;
    let archive_path = tools_dir.join(ARCHIVE_NAME);

    let result = unpack(fetcher, url, &archive_path, tools_dir, binary).await;

    if archive_path.exists() {
        if let Err(e) = tokio::fs::remove_file(&archive_path).await {
            log::warn!("⚠️ [INSTALL] Could not remove {:?}: {}", archive_path, e);
        }
    }
    result
}

async fn unpack(
    fetcher: &dyn ArchiveFetcher,
    url: &str,
    archive_path: &Path,
    tools_dir: &Path,
    binary: &str,
) -> Result<PathBuf> {
    fetcher.fetch(url, archive_path).await?;

    let archive = archive_path.to_path_buf();
    let root = tools_dir.to_path_buf();
    let name = binary.to_string();
    let located = tokio::task::spawn_blocking(move || -> Result<Option<PathBuf>> {
        extract(&archive, &root)?;
        Ok(find_binary(&root, &name))
    })
    .await
    .map_err(|e| AppError::Install(format!("Extraction task failed: {}", e)))??;

    let binary_path = located.ok_or_else(|| {
        AppError::Install(format!("{} not found in extracted archive", binary))
    })?;
    let bin_dir = binary_path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| AppError::Install(format!("{:?} has no parent directory", binary_path)))?;

    log::info!("✅ [INSTALL] Found {} in {:?}", binary, bin_dir);
    Ok(bin_dir)
}
