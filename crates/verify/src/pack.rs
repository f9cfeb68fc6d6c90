//! Shared pack plumbing: deterministic archive naming, scratch
//! directories, and staged-area hashing.

use relcheck_errors::{Error, PackError};
use relcheck_hash::ContentHash;
use relcheck_types::ReleaseVersion;
use std::path::Path;
use tempfile::TempDir;

/// URL of the pack archive upgrading `bundle` from `from` to `to`.
/// Zero packs use `from == 0`.
pub(crate) fn pack_url(
    upstream: &str,
    bundle: &str,
    to: ReleaseVersion,
    from: ReleaseVersion,
) -> String {
    format!("{upstream}/update/{to}/pack-{bundle}-from-{from}.tar")
}

/// URL of the single-file archive holding the blob at (`version`, `hash`)
pub(crate) fn blob_url(upstream: &str, version: ReleaseVersion, hash: &ContentHash) -> String {
    format!("{upstream}/update/{version}/files/{hash}.tar")
}

/// Create a private extraction directory for one pack check.
///
/// Dropping the returned guard removes the directory and everything
/// extracted into it, on success and failure alike.
pub(crate) fn scratch_dir(
    kind: &str,
    bundle: &str,
    version: ReleaseVersion,
) -> Result<TempDir, Error> {
    tempfile::Builder::new()
        .prefix(&format!("relcheck-{kind}-{bundle}-{version}-"))
        .tempdir()
        .map_err(|e| {
            PackError::Scratch {
                message: e.to_string(),
            }
            .into()
        })
}

/// Result of looking for a full copy of an entry in a pack's staged area
pub(crate) enum StagedStatus {
    /// Full copy exists and hashes to the recorded value
    Ok,
    /// No file under the entry's hash
    Missing,
    /// File exists but its content does not match
    Mismatch { actual: ContentHash },
}

/// Check the staged area for a full copy of the entry named by `hash`
pub(crate) async fn staged_status(staged_dir: &Path, hash: &ContentHash) -> StagedStatus {
    let path = staged_dir.join(hash.to_hex());
    match ContentHash::hash_file(&path).await {
        Ok(actual) if actual == *hash => StagedStatus::Ok,
        Ok(actual) => StagedStatus::Mismatch { actual },
        Err(_) => StagedStatus::Missing,
    }
}
