//! End-to-end verification runs against a mock origin and an on-disk
//! content cache.

use httpmock::prelude::*;
use relcheck_hash::ContentHash;
use relcheck_net::NetClient;
use relcheck_types::{CheckStatus, Report};
use relcheck_verify::{Verifier, VerifyConfig};
use std::path::Path;

const VERSION: u32 = 100;

struct Fixture {
    cache: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            cache: tempfile::tempdir().unwrap(),
        }
    }

    fn root(&self) -> &Path {
        self.cache.path()
    }

    fn write_manifest(&self, version: u32, name: &str, content: &str) {
        let dir = self.root().join("update").join(version.to_string());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("Manifest.{name}")), content).unwrap();
    }

    fn write_blob(&self, version: u32, data: &[u8]) -> ContentHash {
        let hash = ContentHash::from_data(data);
        let dir = self
            .root()
            .join("update")
            .join(version.to_string())
            .join("files");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(hash.to_hex()), data).unwrap();
        hash
    }

    /// Write a bundle manifest plus the MoM referencing it, with the
    /// MoM hash taken from the manifest bytes actually on disk.
    fn publish_bundles(&self, bundles: &[(&str, String)]) {
        let mut mom = manifest_header(VERSION);
        for (name, content) in bundles {
            self.write_manifest(VERSION, name, content);
            let hash = ContentHash::from_data(content.as_bytes());
            mom.push_str(&format!("M...\t{hash}\t{VERSION}\t{name}\n"));
        }
        self.write_manifest(VERSION, "MoM", &mom);
    }
}

fn manifest_header(version: u32) -> String {
    format!(
        "MANIFEST\t1\nversion:\t{version}\nprevious:\t{}\nfilecount:\t0\n\
         timestamp:\t1700000000\ncontentsize:\t0\nminversion:\t0\n\n",
        version.saturating_sub(10)
    )
}

fn bundle_manifest(version: u32, entries: &[(ContentHash, u32, &str)]) -> String {
    let mut out = manifest_header(version);
    for (hash, ver, name) in entries {
        out.push_str(&format!("F...\t{hash}\t{ver}\t{name}\n"));
    }
    out
}

fn tar_bytes(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, data.as_slice())
            .unwrap();
    }
    builder.into_inner().unwrap()
}

fn staged_tar(contents: &[&[u8]]) -> Vec<u8> {
    let entries: Vec<(String, Vec<u8>)> = contents
        .iter()
        .map(|data| {
            let hash = ContentHash::from_data(data);
            (format!("staged/{hash}"), data.to_vec())
        })
        .collect();
    tar_bytes(&entries)
}

fn mock_zero_pack(server: &MockServer, bundle: &str, body: Vec<u8>) {
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("/update/{VERSION}/pack-{bundle}-from-0.tar"));
        then.status(200).body(body);
    });
}

async fn run(server: &MockServer, fixture: &Fixture) -> Report {
    run_with(server, fixture, None, false).await
}

async fn run_with(
    server: &MockServer,
    fixture: &Fixture,
    patch_command: Option<&Path>,
    recursive: bool,
) -> Report {
    let mut config = VerifyConfig::new(server.base_url(), fixture.root());
    if let Some(cmd) = patch_command {
        config.patch_command = cmd.to_path_buf();
    }
    let verifier = Verifier::new(config, NetClient::with_defaults().unwrap());
    verifier.run(VERSION, recursive).await
}

fn checks_named<'a>(report: &'a Report, name: &str) -> Vec<&'a relcheck_types::Check> {
    report.checks.iter().filter(|c| c.name == name).collect()
}

#[tokio::test]
async fn clean_release_reports_all_passes() {
    let server = MockServer::start();
    let fixture = Fixture::new();

    let tool = b"tool binary contents".as_slice();
    let lib = b"shared library contents".as_slice();
    let hash_tool = fixture.write_blob(VERSION, tool);
    let hash_lib = fixture.write_blob(VERSION, lib);

    let manifest = bundle_manifest(
        VERSION,
        &[
            (hash_tool, VERSION, "/usr/bin/tool"),
            (hash_lib, VERSION, "/usr/lib/libtool.so"),
        ],
    );
    fixture.publish_bundles(&[("os-core", manifest)]);
    mock_zero_pack(&server, "os-core", staged_tar(&[tool, lib]));

    let report = run(&server, &fixture).await;

    assert_eq!(report.failed, 0, "{}", report.render_text());
    assert_eq!(report.passed, 3);
    // no delta packs were published, so that check is a skip
    assert_eq!(report.skipped, 1);
    assert_eq!(
        checks_named(&report, "Delta packs")[0].status,
        CheckStatus::Skip
    );
}

#[tokio::test]
async fn corrupted_blobs_fail_only_their_bundles() {
    let server = MockServer::start();
    let fixture = Fixture::new();

    let mut bundles = Vec::new();
    for i in 0..10 {
        let content = format!("payload for bundle {i}").into_bytes();
        let hash = fixture.write_blob(VERSION, &content);

        // tamper with two of the ten blobs after recording their hashes
        if i == 3 || i == 7 {
            let path = fixture
                .root()
                .join("update")
                .join(VERSION.to_string())
                .join("files")
                .join(hash.to_hex());
            std::fs::write(path, format!("tampered payload {i}")).unwrap();
        }

        let name = format!("bundle-{i}");
        let manifest = bundle_manifest(VERSION, &[(hash, VERSION, "/usr/bin/prog")]);
        mock_zero_pack(&server, &name, staged_tar(&[&content]));
        bundles.push((name, manifest));
    }
    let refs: Vec<(&str, String)> = bundles
        .iter()
        .map(|(n, m)| (n.as_str(), m.clone()))
        .collect();
    fixture.publish_bundles(&refs);

    let report = run(&server, &fixture).await;

    let file_checks = checks_named(&report, "File hashes");
    assert_eq!(file_checks.len(), 10);
    let failed: Vec<&str> = file_checks
        .iter()
        .filter(|c| c.status == CheckStatus::Fail)
        .map(|c| c.description.as_str())
        .collect();
    assert_eq!(
        failed,
        vec![
            "file hashes for bundle-3 match hashes in manifest",
            "file hashes for bundle-7 match hashes in manifest",
        ]
    );
    // everything except the two tampered blobs still passes
    assert!(checks_named(&report, "Manifest hashes")
        .iter()
        .all(|c| c.status == CheckStatus::Pass));
    assert!(checks_named(&report, "Zero packs")
        .iter()
        .all(|c| c.status == CheckStatus::Pass));
    assert_eq!(report.failed, 2);
}

#[tokio::test]
async fn root_index_hash_mismatch_is_reported() {
    let server = MockServer::start();
    let fixture = Fixture::new();

    let content = b"file contents".as_slice();
    let hash = fixture.write_blob(VERSION, content);
    let manifest = bundle_manifest(VERSION, &[(hash, VERSION, "/usr/bin/tool")]);
    fixture.write_manifest(VERSION, "os-core", &manifest);

    // MoM records a hash that is not the manifest's actual hash
    let wrong = ContentHash::from_data(b"something else entirely");
    let mom = format!("{}M...\t{wrong}\t{VERSION}\tos-core\n", manifest_header(VERSION));
    fixture.write_manifest(VERSION, "MoM", &mom);
    mock_zero_pack(&server, "os-core", staged_tar(&[content]));

    let report = run(&server, &fixture).await;

    let manifest_checks = checks_named(&report, "Manifest hashes");
    assert_eq!(manifest_checks.len(), 1);
    assert_eq!(manifest_checks[0].status, CheckStatus::Fail);
    let diag = manifest_checks[0].diagnostic.as_deref().unwrap();
    assert!(diag.contains("did not match hash listed in MoM"));

    // the manifest itself still parses, so downstream checks run and pass
    assert_eq!(report.failed, 1);
    assert!(checks_named(&report, "File hashes")
        .iter()
        .all(|c| c.status == CheckStatus::Pass));
}

#[tokio::test]
async fn missing_root_index_fails_fast() {
    let server = MockServer::start();
    let fixture = Fixture::new();

    let report = run(&server, &fixture).await;

    assert_eq!(report.total, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.checks[0].name, "Root index");
}

#[tokio::test]
async fn missing_zero_pack_is_a_failure() {
    let server = MockServer::start();
    let fixture = Fixture::new();

    let content = b"tool".as_slice();
    let hash = fixture.write_blob(VERSION, content);
    let manifest = bundle_manifest(VERSION, &[(hash, VERSION, "/usr/bin/tool")]);
    fixture.publish_bundles(&[("os-core", manifest)]);
    // no pack mock: the origin replies 404

    let report = run(&server, &fixture).await;

    let zero = checks_named(&report, "Zero packs");
    assert_eq!(zero.len(), 1);
    assert_eq!(zero[0].status, CheckStatus::Fail);
}

#[tokio::test]
async fn tampered_zero_pack_member_is_reported() {
    let server = MockServer::start();
    let fixture = Fixture::new();

    let content = b"real contents".as_slice();
    let hash = fixture.write_blob(VERSION, content);
    let manifest = bundle_manifest(VERSION, &[(hash, VERSION, "/usr/bin/tool")]);
    fixture.publish_bundles(&[("os-core", manifest)]);

    // pack stages the member under the right name but with wrong bytes
    let pack = tar_bytes(&[(format!("staged/{hash}"), b"forged contents".to_vec())]);
    mock_zero_pack(&server, "os-core", pack);

    let report = run(&server, &fixture).await;

    let zero = checks_named(&report, "Zero packs");
    assert_eq!(zero[0].status, CheckStatus::Fail);
    let diag = zero[0].diagnostic.as_deref().unwrap();
    assert!(diag.contains("/usr/bin/tool"), "{diag}");
    assert!(diag.contains("did not match"), "{diag}");
}

fn write_stub_patcher(dir: &Path) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    // stands in for bspatch: "applies" the patch by copying its bytes
    // to the output, so a patch file is simply the target content
    let path = dir.join("stub-bspatch");
    std::fs::write(&path, "#!/bin/sh\ncp \"$3\" \"$2\"\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
async fn delta_pack_reconstruction_passes() {
    let server = MockServer::start();
    let fixture = Fixture::new();

    let old = b"version 90 contents".as_slice();
    let new = b"version 100 contents".as_slice();
    let unchanged = b"unchanged since 90".as_slice();

    let old_hash = ContentHash::from_data(old);
    let new_hash = fixture.write_blob(VERSION, new);
    let unchanged_hash = fixture.write_blob(90, unchanged);

    let manifest = bundle_manifest(
        VERSION,
        &[
            (new_hash, VERSION, "/usr/bin/tool"),
            (unchanged_hash, 90, "/usr/share/data"),
        ],
    );
    fixture.publish_bundles(&[("os-core", manifest)]);
    mock_zero_pack(&server, "os-core", staged_tar(&[new, unchanged]));

    // the from-90 delta pack carries a patch for the changed entry
    let delta_name = format!("90-{VERSION}-{old_hash}-{new_hash}");
    let delta_pack = tar_bytes(&[(format!("delta/{delta_name}"), new.to_vec())]);
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("/update/{VERSION}/pack-os-core-from-90.tar"));
        then.status(200).body(delta_pack);
    });
    // old blob ships as a single-member archive named by its hash
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("/update/90/files/{old_hash}.tar"));
        then.status(200)
            .body(tar_bytes(&[(old_hash.to_hex(), old.to_vec())]));
    });

    let patcher = write_stub_patcher(fixture.root());
    let report = run_with(&server, &fixture, Some(&patcher), false).await;

    let delta = checks_named(&report, "Delta packs");
    assert_eq!(delta.len(), 1);
    assert_eq!(
        delta[0].status,
        CheckStatus::Pass,
        "{}",
        report.render_text()
    );
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn corrupted_delta_patch_fails_naming_the_delta() {
    let server = MockServer::start();
    let fixture = Fixture::new();

    let old = b"version 90 contents".as_slice();
    let new = b"version 100 contents".as_slice();
    let unchanged = b"unchanged since 90".as_slice();

    let old_hash = ContentHash::from_data(old);
    let new_hash = fixture.write_blob(VERSION, new);
    let unchanged_hash = fixture.write_blob(90, unchanged);

    let manifest = bundle_manifest(
        VERSION,
        &[
            (new_hash, VERSION, "/usr/bin/tool"),
            (unchanged_hash, 90, "/usr/share/data"),
        ],
    );
    fixture.publish_bundles(&[("os-core", manifest)]);
    mock_zero_pack(&server, "os-core", staged_tar(&[new, unchanged]));

    // the patch reconstructs the wrong bytes: the stub copies the patch
    // file to the output, so garbage patch content means a bad result
    let delta_name = format!("90-{VERSION}-{old_hash}-{new_hash}");
    let delta_pack = tar_bytes(&[(format!("delta/{delta_name}"), b"garbage patch".to_vec())]);
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("/update/{VERSION}/pack-os-core-from-90.tar"));
        then.status(200).body(delta_pack);
    });
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("/update/90/files/{old_hash}.tar"));
        then.status(200)
            .body(tar_bytes(&[(old_hash.to_hex(), old.to_vec())]));
    });

    let patcher = write_stub_patcher(fixture.root());
    let report = run_with(&server, &fixture, Some(&patcher), false).await;

    assert_eq!(report.failed, 1, "{}", report.render_text());
    let delta = checks_named(&report, "Delta packs");
    assert_eq!(delta[0].status, CheckStatus::Fail);
    let diag = delta[0].diagnostic.as_deref().unwrap();
    assert!(diag.contains(&delta_name), "{diag}");
    assert!(diag.contains("produced incorrect content"), "{diag}");
}

#[tokio::test]
async fn delta_pack_transport_error_is_a_failure() {
    let server = MockServer::start();
    let fixture = Fixture::new();

    let content = b"current contents".as_slice();
    let hash = fixture.write_blob(VERSION, content);
    let manifest = bundle_manifest(
        VERSION,
        &[
            (hash, VERSION, "/usr/bin/tool"),
            (ContentHash::from_data(b"stale"), 90, "/usr/share/data"),
        ],
    );
    fixture.publish_bundles(&[("os-core", manifest)]);
    mock_zero_pack(
        &server,
        "os-core",
        staged_tar(&[content, b"stale".as_slice()]),
    );

    // only a 404 means "never published"; a broken origin is a defect
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("/update/{VERSION}/pack-os-core-from-90.tar"));
        then.status(500);
    });

    let report = run(&server, &fixture).await;

    let delta = checks_named(&report, "Delta packs");
    assert_eq!(delta[0].status, CheckStatus::Fail);
    assert!(delta[0].diagnostic.as_deref().unwrap().contains("500"));
    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn delta_pack_without_target_is_a_failure() {
    let server = MockServer::start();
    let fixture = Fixture::new();

    let content = b"current contents".as_slice();
    let hash = fixture.write_blob(VERSION, content);
    let manifest = bundle_manifest(
        VERSION,
        &[
            (hash, VERSION, "/usr/bin/tool"),
            (ContentHash::from_data(b"stale"), 90, "/usr/share/data"),
        ],
    );
    fixture.publish_bundles(&[("os-core", manifest)]);
    mock_zero_pack(
        &server,
        "os-core",
        staged_tar(&[content, b"stale".as_slice()]),
    );

    // the pack exists but covers some other target hash entirely
    let other = ContentHash::from_data(b"unrelated");
    let delta_pack = tar_bytes(&[(
        format!("delta/90-{VERSION}-{other}-{other}"),
        b"noise".to_vec(),
    )]);
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("/update/{VERSION}/pack-os-core-from-90.tar"));
        then.status(200).body(delta_pack);
    });

    let report = run(&server, &fixture).await;

    let delta = checks_named(&report, "Delta packs");
    assert_eq!(delta[0].status, CheckStatus::Fail);
    let diag = delta[0].diagnostic.as_deref().unwrap();
    assert!(diag.contains(&format!("could not find {hash}")), "{diag}");
}

#[tokio::test]
async fn older_bundles_are_skipped_unless_recursive() {
    let server = MockServer::start();
    let fixture = Fixture::new();

    let current = b"current tool".as_slice();
    let legacy = b"legacy tool".as_slice();
    let current_hash = fixture.write_blob(VERSION, current);
    let legacy_hash = fixture.write_blob(90, legacy);

    let core = bundle_manifest(VERSION, &[(current_hash, VERSION, "/usr/bin/tool")]);
    let old = bundle_manifest(90, &[(legacy_hash, 90, "/usr/bin/legacy")]);
    fixture.write_manifest(VERSION, "os-core", &core);
    fixture.write_manifest(90, "legacy", &old);

    // the root index carries each bundle at the version it last changed
    let mut mom = manifest_header(VERSION);
    mom.push_str(&format!(
        "M...\t{}\t{VERSION}\tos-core\n",
        ContentHash::from_data(core.as_bytes())
    ));
    mom.push_str(&format!(
        "M...\t{}\t90\tlegacy\n",
        ContentHash::from_data(old.as_bytes())
    ));
    fixture.write_manifest(VERSION, "MoM", &mom);

    mock_zero_pack(&server, "os-core", staged_tar(&[current]));
    server.mock(|when, then| {
        when.method(GET).path("/update/90/pack-legacy-from-0.tar");
        then.status(200).body(staged_tar(&[legacy]));
    });

    // not recursive: the bundle last changed at 90 is out of scope
    let report = run(&server, &fixture).await;
    assert_eq!(report.failed, 0, "{}", report.render_text());
    assert_eq!(report.passed, 3);
    assert!(report.checks.iter().all(|c| !c.description.contains("legacy")));

    // recursive: everything reachable from the root index is checked
    let report = run_with(&server, &fixture, None, true).await;
    assert_eq!(report.failed, 0, "{}", report.render_text());
    assert_eq!(report.passed, 6);
    assert!(report.checks.iter().any(|c| c.description.contains("legacy")));
}

#[tokio::test]
async fn repeated_runs_produce_identical_reports() {
    let server = MockServer::start();
    let fixture = Fixture::new();

    let mut bundles = Vec::new();
    for i in 0..5 {
        let content = format!("bundle {i} payload").into_bytes();
        let hash = fixture.write_blob(VERSION, &content);
        let name = format!("bundle-{i}");
        let manifest = bundle_manifest(VERSION, &[(hash, VERSION, "/usr/bin/prog")]);
        mock_zero_pack(&server, &name, staged_tar(&[&content]));
        bundles.push((name, manifest));
    }
    let refs: Vec<(&str, String)> = bundles
        .iter()
        .map(|(n, m)| (n.as_str(), m.clone()))
        .collect();
    fixture.publish_bundles(&refs);

    let first = run(&server, &fixture).await;
    let second = run(&server, &fixture).await;

    assert_eq!(first.render_json().unwrap(), second.render_json().unwrap());
}
