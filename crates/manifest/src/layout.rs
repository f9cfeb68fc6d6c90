//! Local cache directory layout
//!
//! The external fetch step populates a read-only tree under the cache
//! root: `update/<version>/Manifest.<name>` for manifests and
//! `update/<version>/files/<hash>` for file blobs. relcheck only ever
//! reads from it.

use relcheck_hash::ContentHash;
use relcheck_types::ReleaseVersion;
use std::path::{Path, PathBuf};

/// Path builder for the local content cache
#[derive(Debug, Clone)]
pub struct CacheLayout {
    update_root: PathBuf,
}

impl CacheLayout {
    /// Create a layout rooted at the cache directory
    #[must_use]
    pub fn new(cache_root: &Path) -> Self {
        Self {
            update_root: cache_root.join("update"),
        }
    }

    /// Path of the manifest for `name` published at `version`
    #[must_use]
    pub fn manifest_path(&self, version: ReleaseVersion, name: &str) -> PathBuf {
        self.update_root
            .join(version.to_string())
            .join(format!("Manifest.{name}"))
    }

    /// Path of the blob stored under (`version`, `hash`)
    #[must_use]
    pub fn blob_path(&self, version: ReleaseVersion, hash: &ContentHash) -> PathBuf {
        self.update_root
            .join(version.to_string())
            .join("files")
            .join(hash.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_and_blob_paths() {
        let layout = CacheLayout::new(Path::new("/var/cache/relcheck"));
        assert_eq!(
            layout.manifest_path(100, "os-core"),
            Path::new("/var/cache/relcheck/update/100/Manifest.os-core")
        );

        let hash = ContentHash::from_data(b"x");
        assert_eq!(
            layout.blob_path(90, &hash),
            Path::new("/var/cache/relcheck/update/90/files").join(hash.to_hex())
        );
    }
}
