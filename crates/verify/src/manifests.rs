//! Manifest index verification
//!
//! Confirms every sub-manifest referenced by the root index hashes to
//! the value the index records for it.

use relcheck_errors::Error;
use relcheck_hash::ContentHash;
use relcheck_manifest::{CacheLayout, Manifest};
use relcheck_types::{Check, CheckStatus, VersionFloor};
use tracing::debug;

/// Compare each referenced manifest's hash against the hash listed in
/// the MoM.
///
/// Hash mismatches become failed checks and verification continues; a
/// manifest file missing from the cache is structural and aborts the
/// stage, since the fetch step guarantees it should be there.
///
/// # Errors
///
/// Returns an error if a referenced manifest file cannot be read.
pub(crate) async fn check_manifest_hashes(
    layout: &CacheLayout,
    mom: &Manifest,
    floor: VersionFloor,
) -> Result<Vec<Check>, Error> {
    let mut checks = Vec::new();

    for entry in &mom.files {
        if entry.version < floor {
            continue;
        }

        let path = layout.manifest_path(entry.version, &entry.name);
        let hash = ContentHash::hash_file(&path).await?;

        let ok = hash == entry.hash;
        if !ok {
            debug!(
                bundle = entry.name,
                expected = %entry.hash,
                actual = %hash,
                "manifest hash mismatch"
            );
        }
        checks.push(Check {
            name: "Manifest hashes".to_string(),
            description: format!("Manifest.{} hash matches hash in MoM", entry.name),
            status: if ok {
                CheckStatus::Pass
            } else {
                CheckStatus::Fail
            },
            diagnostic: (!ok).then(|| {
                format!(
                    "{} hash did not match hash listed in MoM\nexpected: {}\ncomputed: {}",
                    path.display(),
                    entry.hash,
                    hash
                )
            }),
        });
    }

    Ok(checks)
}
