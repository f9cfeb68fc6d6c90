//! Zero-pack verification
//!
//! A zero pack is the from-scratch archive for one bundle: its staged
//! area must carry a full, correct copy of every present entry in the
//! bundle's manifest.

use crate::pack::{self, StagedStatus};
use crate::FILE_WORKERS;
use relcheck_errors::Error;
use relcheck_manifest::Manifest;
use relcheck_net::NetClient;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

/// Fetch the bundle's zero pack and hash every staged member against
/// the manifest.
///
/// Returns the sorted list of failure descriptions, one per entry whose
/// staged copy is missing or mismatched.
///
/// # Errors
///
/// Returns an error if the pack cannot be fetched or extracted. Every
/// published bundle must carry a zero pack, so absence is not a skip.
pub(crate) async fn check_zero_pack(
    client: &NetClient,
    upstream: &str,
    manifest: &Manifest,
) -> Result<Vec<String>, Error> {
    let version = manifest.header.version;
    let scratch = pack::scratch_dir("zero", &manifest.name, version)?;
    let url = pack::pack_url(upstream, &manifest.name, version, 0);

    debug!(bundle = manifest.name, version, url, "fetching zero pack");
    client.fetch_tar(&url, scratch.path()).await?;

    let staged = Arc::new(scratch.path().join("staged"));
    let mut tasks: JoinSet<Option<String>> = JoinSet::new();
    let semaphore = Arc::new(Semaphore::new(FILE_WORKERS));

    for entry in &manifest.files {
        if !entry.is_present() {
            continue;
        }

        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let staged = Arc::clone(&staged);
        let bundle = manifest.name.clone();
        let name = entry.name.clone();
        let hash = entry.hash;

        tasks.spawn(async move {
            let _permit = permit;
            match pack::staged_status(&staged, &hash).await {
                StagedStatus::Ok => None,
                StagedStatus::Missing => {
                    Some(format!("{name} missing from zero pack for {bundle}"))
                }
                StagedStatus::Mismatch { actual } => Some(format!(
                    "{} hash did not match hash listed in {bundle} for {name} (computed {actual})",
                    staged.join(hash.to_hex()).display()
                )),
            }
        });
    }

    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        if let Ok(Some(failure)) = joined {
            failures.push(failure);
        }
    }
    failures.sort_unstable();

    // scratch dropped here, removing the extracted tree
    Ok(failures)
}
