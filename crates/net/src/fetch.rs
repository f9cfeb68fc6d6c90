//! Download and archive-extraction helpers

use crate::NetClient;
use futures::StreamExt;
use relcheck_errors::{Error, NetworkError, PackError};
use relcheck_types::ReleaseVersion;
use std::path::Path;
use tar::Archive;
use tracing::debug;

/// Resolve the latest published release version from `<upstream>/latest`.
///
/// # Errors
///
/// Returns an error if the request fails or the body is not a version
/// number.
pub async fn latest_version(client: &NetClient, upstream_url: &str) -> Result<ReleaseVersion, Error> {
    let url = format!("{upstream_url}/latest");
    let body = client.get(&url).await?.text().await.map_err(|e| {
        NetworkError::InvalidBody {
            url: url.clone(),
            message: e.to_string(),
        }
    })?;

    body.trim()
        .parse()
        .map_err(|_| {
            NetworkError::InvalidBody {
                url,
                message: format!("not a version number: {body:?}"),
            }
            .into()
        })
}

impl NetClient {
    /// Download `url` to `dest`.
    ///
    /// Streams into a dotfile next to `dest` and renames on completion,
    /// so an aborted download never leaves a truncated file behind.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the file cannot be
    /// written.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<(), Error> {
        let response = self.get(url).await?;

        let file_name = dest
            .file_name()
            .ok_or_else(|| NetworkError::InvalidUrl(format!("no file name in {}", dest.display())))?
            .to_string_lossy();
        let tmp = dest.with_file_name(format!(".dl.{file_name}"));

        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| Error::io_with_path(&e, &tmp))?;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| NetworkError::DownloadFailed(e.to_string()))?;
            tokio::io::AsyncWriteExt::write_all(&mut file, &chunk)
                .await
                .map_err(|e| Error::io_with_path(&e, &tmp))?;
        }
        drop(file);

        tokio::fs::rename(&tmp, dest)
            .await
            .map_err(|e| Error::io_with_path(&e, dest))?;

        debug!(url, dest = %dest.display(), "download complete");
        Ok(())
    }

    /// Download a tar archive from `url` and extract it into `dest_dir`.
    ///
    /// The archive itself is removed after extraction.
    ///
    /// # Errors
    ///
    /// Returns an error if the download fails or the archive cannot be
    /// extracted.
    pub async fn fetch_tar(&self, url: &str, dest_dir: &Path) -> Result<(), Error> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| Error::io_with_path(&e, dest_dir))?;

        let archive_path = dest_dir.join(".fetch.tar");
        self.download(url, &archive_path).await?;

        let result = extract_tar(&archive_path, dest_dir).await;
        let _ = tokio::fs::remove_file(&archive_path).await;
        result
    }
}

/// Extract a tar archive into `dest`, rejecting path traversal.
async fn extract_tar(archive_path: &Path, dest: &Path) -> Result<(), Error> {
    let archive_path = archive_path.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&archive_path)?;
        let mut archive = Archive::new(file);
        archive.set_preserve_permissions(true);
        archive.set_unpack_xattrs(false);

        for entry in archive.entries().map_err(|e| extract_err(&archive_path, &e))? {
            let mut entry = entry.map_err(|e| extract_err(&archive_path, &e))?;
            let path = entry.path().map_err(|e| extract_err(&archive_path, &e))?;

            if path
                .components()
                .any(|c| c == std::path::Component::ParentDir)
            {
                return Err(PackError::PathTraversal {
                    path: path.display().to_string(),
                }
                .into());
            }

            entry
                .unpack_in(&dest)
                .map_err(|e| extract_err(&archive_path, &e))?;
        }

        Ok::<(), Error>(())
    })
    .await
    .map_err(|e| Error::internal(format!("extract task failed: {e}")))?
}

fn extract_err(path: &Path, err: &std::io::Error) -> Error {
    PackError::ExtractFailed {
        path: path.display().to_string(),
        message: err.to_string(),
    }
    .into()
}
