//! File blob verification
//!
//! Confirms every present file entry of every referenced sub-manifest
//! has a blob in the local cache hashing to the recorded value.

use crate::{FILE_WORKERS, MANIFEST_WORKERS};
use relcheck_hash::ContentHash;
use relcheck_manifest::{CacheLayout, FileEntry, Manifest};
use relcheck_types::{Check, CheckStatus, VersionFloor};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

/// Verify file blobs for every sub-manifest at or above the floor.
///
/// Produces one aggregate check per sub-manifest with a diagnostic
/// naming each mismatching path. A sub-manifest that cannot be parsed
/// fails its own check; siblings are unaffected.
pub(crate) async fn check_file_hashes(
    layout: &CacheLayout,
    mom: &Arc<Manifest>,
    floor: VersionFloor,
) -> Vec<Check> {
    let mut tasks: JoinSet<Check> = JoinSet::new();
    let semaphore = Arc::new(Semaphore::new(MANIFEST_WORKERS));

    for entry in &mom.files {
        if entry.version < floor {
            continue;
        }

        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let layout = layout.clone();
        let bundle = entry.name.clone();
        let version = entry.version;

        tasks.spawn(async move {
            let _permit = permit;
            let description = format!("file hashes for {bundle} match hashes in manifest");

            let manifest = match Manifest::load(&layout, version, &bundle).await {
                Ok(m) => m,
                Err(e) => {
                    return Check {
                        name: "File hashes".to_string(),
                        description,
                        status: CheckStatus::Fail,
                        diagnostic: Some(format!("manifest load failed: {e}")),
                    }
                }
            };

            let failures = check_bundle_blobs(&layout, &manifest, floor).await;
            Check {
                name: "File hashes".to_string(),
                description,
                status: if failures.is_empty() {
                    CheckStatus::Pass
                } else {
                    CheckStatus::Fail
                },
                diagnostic: (!failures.is_empty())
                    .then(|| format!("mismatched hashes:\n{}", failures.join("\n"))),
            }
        });
    }

    let mut checks = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        if let Ok(check) = joined {
            checks.push(check);
        }
    }
    checks
}

/// Hash every present entry of one manifest against its recorded hash.
///
/// Returns the sorted list of failing path names. A missing blob is a
/// failure for that path, not an error: the report should name it
/// alongside any mismatches.
async fn check_bundle_blobs(
    layout: &CacheLayout,
    manifest: &Manifest,
    floor: VersionFloor,
) -> Vec<String> {
    let mut tasks: JoinSet<Option<String>> = JoinSet::new();
    let semaphore = Arc::new(Semaphore::new(FILE_WORKERS));

    for entry in &manifest.files {
        if !entry.is_present() || entry.version < floor {
            continue;
        }

        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let path = layout.blob_path(entry.version, &entry.hash);
        let FileEntry { name, hash, .. } = entry.clone();

        tasks.spawn(async move {
            let _permit = permit;
            match ContentHash::hash_file(&path).await {
                Ok(actual) if actual == hash => None,
                Ok(actual) => {
                    debug!(path = %path.display(), expected = %hash, %actual, "blob hash mismatch");
                    Some(name)
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "blob unreadable");
                    Some(name)
                }
            }
        });
    }

    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        if let Ok(Some(name)) = joined {
            failures.push(name);
        }
    }
    failures.sort_unstable();
    failures
}
