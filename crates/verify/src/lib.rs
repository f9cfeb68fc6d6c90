#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Content integrity verification engine
//!
//! Audits one published release of the update stream: manifests against
//! the root index, file blobs against manifest hashes, and zero/delta
//! pack archives against the content they promise to reconstruct. Every
//! stage collects its failures instead of aborting, so a run always
//! yields the complete defect report.

mod blobs;
mod delta;
mod manifests;
mod pack;
mod patch;
mod zero;

pub use delta::DeltaOutcome;
pub use patch::PatchApplier;

use relcheck_manifest::{CacheLayout, Manifest};
use relcheck_net::NetClient;
use relcheck_types::{Check, CheckStatus, ReleaseVersion, Report, VersionFloor};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Concurrent sub-manifest checks per stage
const MANIFEST_WORKERS: usize = 8;

/// Concurrent file hashes within one manifest or extracted pack.
/// Each worker holds an open file handle; keep this small so deep
/// recursive runs stay under the file-descriptor limit.
const FILE_WORKERS: usize = 4;

/// Settings for one verification run
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// Base URL of the origin content archive
    pub upstream_url: String,
    /// Root of the local content cache
    pub cache_root: PathBuf,
    /// Binary invoked to apply bsdiff patches
    pub patch_command: PathBuf,
}

impl VerifyConfig {
    #[must_use]
    pub fn new(upstream_url: impl Into<String>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            upstream_url: upstream_url.into(),
            cache_root: cache_root.into(),
            patch_command: PathBuf::from("bspatch"),
        }
    }
}

/// Verification orchestrator
///
/// Sequences the manifest index, file blob, zero-pack, and delta-pack
/// verifiers over one release and aggregates their outcomes.
pub struct Verifier {
    config: VerifyConfig,
    client: NetClient,
    layout: CacheLayout,
    patcher: PatchApplier,
}

impl Verifier {
    #[must_use]
    pub fn new(config: VerifyConfig, client: NetClient) -> Self {
        let layout = CacheLayout::new(&config.cache_root);
        let patcher = PatchApplier::new(&config.patch_command);
        Self {
            config,
            client,
            layout,
            patcher,
        }
    }

    /// Verify the release at `version`.
    ///
    /// With `recursive` set, every historical version reachable through
    /// the root index is checked; otherwise only entries that changed at
    /// exactly this release. The report always covers every check that
    /// could be attempted: a failing check never suppresses its
    /// siblings, and structural errors fail only their own scope.
    pub async fn run(&self, version: ReleaseVersion, recursive: bool) -> Report {
        let floor: VersionFloor = if recursive { 0 } else { version };
        info!(version, floor, "starting update content verification");

        let mut report = Report::new(
            "updatecontent",
            format!("update content checks for version {version}"),
        );

        let mom = match Manifest::load_mom(&self.layout, version).await {
            Ok(mom) => Arc::new(mom),
            Err(e) => {
                report.fail_with(
                    "Root index",
                    format!("load Manifest.MoM for version {version}"),
                    e.to_string(),
                );
                return report;
            }
        };

        match manifests::check_manifest_hashes(&self.layout, &mom, floor).await {
            Ok(checks) => extend_report(&mut report, checks),
            Err(e) => report.fail_with(
                "Manifest hashes",
                "check manifest hashes match hashes listed in MoM",
                e.to_string(),
            ),
        }

        extend_report(
            &mut report,
            blobs::check_file_hashes(&self.layout, &mom, floor).await,
        );

        let (zero_checks, delta_checks) = self.check_packs(&mom, floor).await;
        extend_report(&mut report, zero_checks);
        extend_report(&mut report, delta_checks);

        info!(
            passed = report.passed,
            failed = report.failed,
            skipped = report.skipped,
            "verification complete"
        );
        report
    }

    /// Run zero- and delta-pack verification for every sub-manifest the
    /// root index references at or above the floor.
    async fn check_packs(
        &self,
        mom: &Arc<Manifest>,
        floor: VersionFloor,
    ) -> (Vec<Check>, Vec<Check>) {
        let mut tasks: JoinSet<(Vec<Check>, Vec<Check>)> = JoinSet::new();
        let semaphore = Arc::new(Semaphore::new(FILE_WORKERS));

        for entry in &mom.files {
            if entry.version < floor {
                continue;
            }

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let layout = self.layout.clone();
            let client = self.client.clone();
            let upstream = self.config.upstream_url.clone();
            let patcher = self.patcher.clone();
            let bundle = entry.name.clone();
            let version = entry.version;

            tasks.spawn(async move {
                let _permit = permit;

                let manifest = match Manifest::load(&layout, version, &bundle).await {
                    Ok(m) => Arc::new(m),
                    Err(e) => {
                        debug!(bundle, version, error = %e, "skipping packs, manifest unusable");
                        let diag = format!("manifest load failed: {e}");
                        return (
                            vec![fail_check(
                                "Zero packs",
                                format!("zero pack content correct for {bundle}"),
                                diag.clone(),
                            )],
                            vec![fail_check(
                                "Delta packs",
                                format!("delta pack content correct for {bundle}"),
                                diag,
                            )],
                        );
                    }
                };

                let zero = zero_check_for(&client, &upstream, &manifest).await;
                let delta = delta_check_for(&client, &upstream, &patcher, &manifest).await;
                (vec![zero], vec![delta])
            });
        }

        let mut zero_checks = Vec::new();
        let mut delta_checks = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            if let Ok((zero, delta)) = joined {
                zero_checks.extend(zero);
                delta_checks.extend(delta);
            }
        }

        (zero_checks, delta_checks)
    }
}

async fn zero_check_for(client: &NetClient, upstream: &str, manifest: &Manifest) -> Check {
    let description = format!("zero pack content correct for {}", manifest.name);
    match zero::check_zero_pack(client, upstream, manifest).await {
        Ok(failures) if failures.is_empty() => pass_check("Zero packs", description),
        Ok(failures) => fail_check(
            "Zero packs",
            description,
            format!("pack issues:\n{}", failures.join("\n")),
        ),
        // every bundle must publish a zero pack, a fetch failure is a defect
        Err(e) => fail_check("Zero packs", description, e.to_string()),
    }
}

async fn delta_check_for(
    client: &NetClient,
    upstream: &str,
    patcher: &PatchApplier,
    manifest: &Arc<Manifest>,
) -> Check {
    let description = format!("delta pack content correct for {}", manifest.name);
    match delta::check_delta_packs(client, upstream, patcher, manifest).await {
        Ok(outcome) if outcome.packs_checked == 0 => Check {
            name: "Delta packs".to_string(),
            description,
            status: CheckStatus::Skip,
            diagnostic: Some("no delta packs published".to_string()),
        },
        Ok(outcome) if outcome.failures.is_empty() => pass_check("Delta packs", description),
        Ok(outcome) => fail_check(
            "Delta packs",
            description,
            format!("pack issues:\n{}", outcome.failures.join("\n")),
        ),
        Err(e) => fail_check("Delta packs", description, e.to_string()),
    }
}

fn pass_check(name: &str, description: String) -> Check {
    Check {
        name: name.to_string(),
        description,
        status: CheckStatus::Pass,
        diagnostic: None,
    }
}

fn fail_check(name: &str, description: String, diagnostic: String) -> Check {
    Check {
        name: name.to_string(),
        description,
        status: CheckStatus::Fail,
        diagnostic: Some(diagnostic),
    }
}

/// Append stage checks in bundle-name order so reports are
/// deterministic regardless of completion order.
fn extend_report(report: &mut Report, mut checks: Vec<Check>) {
    checks.sort_by(|a, b| a.description.cmp(&b.description));
    for check in checks {
        report.add(check);
    }
}
