//! Drives the `veritas` binary end to end: compile a shard from a source
//! document and a candidate stream, verify it against its own publisher key,
//! register it in a registry, then mount it and run a read-only query.

use std::path::{Path, PathBuf};
use std::process::Command;

use veritas_registry::Registry;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/tourniquet").join(name)
}

fn veritas_bin() -> PathBuf {
    if let Ok(p) = std::env::var("VERITAS_BIN") {
        return PathBuf::from(p);
    }
    PathBuf::from(env!("CARGO_BIN_EXE_veritas"))
}

fn run(args: &[&str]) -> std::process::Output {
    Command::new(veritas_bin())
        .args(args)
        .output()
        .expect("failed to spawn veritas")
}

#[test]
fn compile_then_verify_then_mount_roundtrips_a_claim() {
    let tmp = tempfile::tempdir().unwrap();
    let shard_out = tmp.path().join("shard");
    let store = tmp.path().join("shards");
    let registry_path = tmp.path().join("registry/artifacts.json");

    let compile_out = run(&[
        "compile",
        fixture("source.txt").to_str().unwrap(),
        "--candidates",
        fixture("candidates.jsonl").to_str().unwrap(),
        "--out",
        shard_out.to_str().unwrap(),
        "--namespace",
        "fm21-11",
        "--publisher-id",
        "pub-1",
        "--publisher-name",
        "Field Manual Publisher",
        "--created-at",
        "2026-01-01T00:00:00Z",
    ]);
    assert!(compile_out.status.success(), "compile failed: {}", String::from_utf8_lossy(&compile_out.stderr));

    let compile_json: serde_json::Value = serde_json::from_slice(&compile_out.stdout).expect("compile output is JSON");
    let shard_id = compile_json["shard_id"].as_str().expect("shard_id present").to_string();
    assert_eq!(compile_json["claims"], 2);

    let trusted_key = shard_out.join("sig/publisher.pub");
    let verify_out = run(&["verify", "shard", shard_out.to_str().unwrap(), "--trusted-key", trusted_key.to_str().unwrap()]);
    assert!(verify_out.status.success(), "verify failed: {}", String::from_utf8_lossy(&verify_out.stderr));
    let verify_json: serde_json::Value = serde_json::from_slice(&verify_out.stdout).expect("verify output is JSON");
    assert_eq!(verify_json["status"], "PASS");

    std::fs::create_dir_all(&store).unwrap();
    copy_dir(&shard_out, &store.join(&shard_id));

    let mut reg = Registry::open(&registry_path).unwrap();
    reg.add_artifact("fm21-11/hemorrhage", &shard_id, "initial compile", vec![], vec![], None, None, None)
        .unwrap();

    let resolve_out = run(&["resolve", "fm21-11/hemorrhage", "--registry", registry_path.to_str().unwrap()]);
    assert!(resolve_out.status.success());
    let resolve_json: serde_json::Value = serde_json::from_slice(&resolve_out.stdout).unwrap();
    assert_eq!(resolve_json["shard_id"], shard_id.as_str());

    let mount_args = [
        "mount",
        "fm21-11/hemorrhage",
        "--registry",
        registry_path.to_str().unwrap(),
        "--store",
        store.to_str().unwrap(),
        "--trusted-key",
        trusted_key.to_str().unwrap(),
    ];
    let mount_out = run(&mount_args);
    assert!(mount_out.status.success(), "mount failed: {}", String::from_utf8_lossy(&mount_out.stderr));
    let mount_json: serde_json::Value = serde_json::from_slice(&mount_out.stdout).expect("mount output is JSON");

    let tables = mount_json["tables"].as_array().expect("tables list present");
    let claims_view = tables
        .iter()
        .map(|t| t.as_str().unwrap())
        .find(|t| t.starts_with("claims_"))
        .expect("a claims_* view was registered");

    let query_out = run(&[
        "mount",
        "fm21-11/hemorrhage",
        "--registry",
        registry_path.to_str().unwrap(),
        "--store",
        store.to_str().unwrap(),
        "--trusted-key",
        trusted_key.to_str().unwrap(),
        "--query",
        &format!("SELECT count(*) AS n FROM {claims_view}"),
    ]);
    assert!(query_out.status.success(), "mount query failed: {}", String::from_utf8_lossy(&query_out.stderr));
    let query_json: serde_json::Value = serde_json::from_slice(&query_out.stdout).expect("query output is JSON");
    assert_eq!(query_json["rows"][0]["n"], 2);
}

fn copy_dir(src: &Path, dst: &Path) {
    std::fs::create_dir_all(dst).unwrap();
    for entry in walkdir::WalkDir::new(src) {
        let entry = entry.unwrap();
        let rel = entry.path().strip_prefix(src).unwrap();
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).unwrap();
        } else {
            std::fs::copy(entry.path(), &target).unwrap();
        }
    }
}
