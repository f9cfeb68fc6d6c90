//! Delta-pack verification
//!
//! A delta pack upgrades a bundle from an older release. Each current
//! entry must either appear fully in the pack's staged area or be
//! reconstructible by applying one of the pack's bsdiff deltas to the
//! old blob it names. Publishing delta packs is optional, so a pack
//! that simply is not there counts as absent, not broken.

use crate::pack::{self, StagedStatus};
use crate::patch::PatchApplier;
use crate::FILE_WORKERS;
use relcheck_errors::{Error, PackError};
use relcheck_hash::ContentHash;
use relcheck_manifest::Manifest;
use relcheck_net::NetClient;
use relcheck_types::ReleaseVersion;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

/// Aggregate result of one bundle's delta-pack sweep
#[derive(Debug, Default)]
pub struct DeltaOutcome {
    /// Number of delta packs that existed and were examined
    pub packs_checked: usize,
    /// Failure descriptions across all examined packs, sorted
    pub failures: Vec<String>,
}

enum PackResult {
    Absent,
    Checked(Vec<String>),
}

/// Check every delta pack published for this bundle at its current
/// version, one per older release the manifest still references.
///
/// # Errors
///
/// Returns an error if a scratch directory cannot be created or a pack
/// fetch fails for any reason other than the origin reporting it
/// absent. Only a 404 means "never published".
pub(crate) async fn check_delta_packs(
    client: &NetClient,
    upstream: &str,
    patcher: &PatchApplier,
    manifest: &Arc<Manifest>,
) -> Result<DeltaOutcome, Error> {
    let mut tasks: JoinSet<Result<PackResult, Error>> = JoinSet::new();
    let semaphore = Arc::new(Semaphore::new(FILE_WORKERS));

    for from in manifest.referenced_versions() {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let client = client.clone();
        let upstream = upstream.to_string();
        let patcher = patcher.clone();
        let manifest = Arc::clone(manifest);

        tasks.spawn(async move {
            let _permit = permit;
            check_one_pack(&client, &upstream, &patcher, &manifest, from).await
        });
    }

    let mut outcome = DeltaOutcome::default();
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(PackResult::Absent)) => {}
            Ok(Ok(PackResult::Checked(failures))) => {
                outcome.packs_checked += 1;
                outcome.failures.extend(failures);
            }
            Ok(Err(e)) => first_error = first_error.or(Some(e)),
            Err(_) => {}
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    outcome.failures.sort_unstable();
    Ok(outcome)
}

async fn check_one_pack(
    client: &NetClient,
    upstream: &str,
    patcher: &PatchApplier,
    manifest: &Manifest,
    from: ReleaseVersion,
) -> Result<PackResult, Error> {
    let to = manifest.header.version;
    let scratch = pack::scratch_dir("delta", &manifest.name, from)?;
    let url = pack::pack_url(upstream, &manifest.name, to, from);

    if let Err(e) = client.fetch_tar(&url, scratch.path()).await {
        // only an origin 404 means the pack was never published;
        // transport and extraction failures are real defects
        if let Error::Network(net) = &e {
            if net.is_not_found() {
                debug!(bundle = manifest.name, from, to, "no delta pack for this from version");
                return Ok(PackResult::Absent);
            }
        }
        return Err(e);
    }

    let failures = examine_pack(client, upstream, patcher, manifest, scratch.path()).await;
    Ok(PackResult::Checked(failures))
}

/// Audit one extracted delta pack against the manifest's current
/// entries. Entries satisfied by the staged area are done; the rest
/// must reconstruct correctly through a delta.
async fn examine_pack(
    client: &NetClient,
    upstream: &str,
    patcher: &PatchApplier,
    manifest: &Manifest,
    dir: &Path,
) -> Vec<String> {
    let staged = dir.join("staged");
    let mut failures = Vec::new();
    let mut needed = Vec::new();

    for entry in &manifest.files {
        if entry.version != manifest.header.version || !entry.is_present() {
            continue;
        }
        match pack::staged_status(&staged, &entry.hash).await {
            StagedStatus::Ok => {}
            StagedStatus::Mismatch { actual } => failures.push(format!(
                "{} hash did not match hash listed in {} for {} (computed {actual})",
                staged.join(entry.hash.to_hex()).display(),
                manifest.name,
                entry.name
            )),
            StagedStatus::Missing => needed.push(entry.hash),
        }
    }

    if needed.is_empty() {
        return failures;
    }

    let delta_dir = dir.join("delta");
    let deltas = match index_delta_dir(&delta_dir).await {
        Ok(map) => map,
        Err(_) => {
            failures.push(
                PackError::MissingDeltaDir {
                    dir: delta_dir.display().to_string(),
                }
                .to_string(),
            );
            return failures;
        }
    };

    for to_hash in needed {
        match deltas.get(&to_hash.to_hex()) {
            None => failures.push(format!(
                "could not find {to_hash} in delta pack at {}",
                dir.display()
            )),
            Some(file_name) => {
                if let Err(msg) =
                    verify_delta(client, upstream, patcher, dir, file_name, &to_hash).await
                {
                    failures.push(msg);
                }
            }
        }
    }

    failures
}

/// Map each delta file to the target hash encoded in its name, keyed by
/// the hash's hex form
async fn index_delta_dir(delta_dir: &Path) -> Result<HashMap<String, String>, std::io::Error> {
    let mut map = HashMap::new();
    let mut entries = tokio::fs::read_dir(delta_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if let Some((_, _, _, to_hex)) = parse_delta_name(&file_name) {
            map.insert(to_hex.to_string(), file_name);
        }
    }
    Ok(map)
}

/// Split a `<fromVer>-<toVer>-<fromHash>-<toHash>` delta file name
fn parse_delta_name(name: &str) -> Option<(ReleaseVersion, ReleaseVersion, &str, &str)> {
    let mut parts = name.split('-');
    let from_ver = parts.next()?.parse().ok()?;
    let to_ver = parts.next()?.parse().ok()?;
    let from_hex = parts.next()?;
    let to_hex = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((from_ver, to_ver, from_hex, to_hex))
}

/// Reconstruct one entry from its delta and confirm the result hashes
/// to the target. Failures come back as report diagnostics, not errors,
/// so one bad delta never hides its neighbors.
async fn verify_delta(
    client: &NetClient,
    upstream: &str,
    patcher: &PatchApplier,
    dir: &Path,
    file_name: &str,
    to_hash: &ContentHash,
) -> Result<(), String> {
    let malformed = || {
        PackError::MalformedDeltaName {
            name: file_name.to_string(),
        }
        .to_string()
    };
    let (from_ver, _, from_hex, _) = parse_delta_name(file_name).ok_or_else(malformed)?;
    let from_hash = ContentHash::from_hex(from_hex).map_err(|_| malformed())?;

    // old blob ships as a single-member tar named by its hash
    let url = pack::blob_url(upstream, from_ver, &from_hash);
    client
        .fetch_tar(&url, dir)
        .await
        .map_err(|e| format!("could not fetch delta source {url}: {e}"))?;

    let source = dir.join(from_hash.to_hex());
    let patch = dir.join("delta").join(file_name);
    let output = dir.join(format!("{}.patched", to_hash.to_hex()));
    patcher
        .apply(&source, &output, &patch)
        .await
        .map_err(|e| e.to_string())?;

    let actual = ContentHash::hash_file(&output)
        .await
        .map_err(|e| format!("could not read patched output for {file_name}: {e}"))?;
    if actual == *to_hash {
        Ok(())
    } else {
        Err(format!(
            "delta {file_name} produced incorrect content\nexpected: {to_hash}\ncomputed: {actual}"
        ))
    }
}
