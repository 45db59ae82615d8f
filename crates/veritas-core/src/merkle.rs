//! Merkle tree builder.
//!
//! Hashes a shard directory under one of two suites into a 32-byte root.
//! `manifest.json` and everything under `sig/` are excluded; symlinks are
//! rejected; remaining files are sorted by UTF-8 byte order of their
//! shard-relative path before hashing.

use std::fs;
use std::io::Read;
use std::path::Path;

use crate::errors::{VeritasError, VeritasResult};
use crate::model::Suite;

/// Per-file hash chunk size (§5 resource model: bounded-memory file hashing).
pub const HASH_CHUNK_BYTES: usize = 64 * 1024;

/// Default per-file size limit enforced before a file enters the tree.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 512 * 1024 * 1024;
/// Default total-size limit across all hashed files.
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 2 * 1024 * 1024 * 1024;
/// Default file-count limit.
pub const DEFAULT_MAX_FILES: usize = 100_000;

/// Frozen empty-tree root for the `axm-blake3-mldsa44` suite: `BLAKE3(0x01)`.
pub const EMPTY_ROOT_MLDSA44_HEX: &str =
    "48fc721fbbc172e0925fa27af1671de225ba927134802998b10a1568a188652b";

#[derive(Debug, Clone, Copy)]
pub struct MerkleLimits {
    pub max_file_bytes: u64,
    pub max_total_bytes: u64,
    pub max_files: usize,
}

impl Default for MerkleLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

/// Collect the shard-relative files participating in the Merkle tree:
/// excludes `manifest.json` and `sig/*`, rejects symlinks, enforces limits,
/// and sorts by UTF-8 byte order of the relative path.
pub fn collect_merkle_files(shard_root: &Path, limits: MerkleLimits) -> VeritasResult<Vec<(String, std::path::PathBuf)>> {
    let mut files = Vec::new();
    let mut total_bytes: u64 = 0;

    for entry in walkdir_no_follow(shard_root)? {
        let entry = entry?;
        let path = entry.path.clone();
        let rel = path
            .strip_prefix(shard_root)
            .map_err(|_| VeritasError::invariant("file escaped shard root"))?
            .to_str()
            .ok_or_else(|| VeritasError::invalid_argument("non-UTF-8 path in shard"))?
            .replace('\\', "/");

        if rel == "manifest.json" || rel.starts_with("sig/") {
            continue;
        }
        if entry.is_symlink {
            return Err(VeritasError::new(
                crate::errors::VeritasErrorCode::LayoutSymlink,
                format!("symlink not allowed in shard: {rel}"),
            ));
        }
        if !entry.is_file {
            continue;
        }

        let size = fs::metadata(&path)?.len();
        if size > limits.max_file_bytes {
            return Err(VeritasError::new(
                crate::errors::VeritasErrorCode::LimitExceeded,
                format!("file exceeds size limit: {rel} ({size} bytes)"),
            ));
        }
        total_bytes += size;
        if total_bytes > limits.max_total_bytes {
            return Err(VeritasError::new(
                crate::errors::VeritasErrorCode::LimitExceeded,
                format!("shard exceeds total size limit: {total_bytes} bytes"),
            ));
        }
        files.push((rel, path));
        if files.len() > limits.max_files {
            return Err(VeritasError::new(
                crate::errors::VeritasErrorCode::LimitExceeded,
                format!("shard exceeds file count limit: {}", files.len()),
            ));
        }
    }

    files.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    Ok(files)
}

struct DirEntry {
    path: std::path::PathBuf,
    is_file: bool,
    is_symlink: bool,
}

fn walkdir_no_follow(root: &Path) -> VeritasResult<Vec<VeritasResult<DirEntry>>> {
    let mut out = Vec::new();
    walk_inner(root, &mut out)?;
    Ok(out)
}

fn walk_inner(dir: &Path, out: &mut Vec<VeritasResult<DirEntry>>) -> VeritasResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_symlink() {
            out.push(Ok(DirEntry {
                path,
                is_file: false,
                is_symlink: true,
            }));
            continue;
        }
        if file_type.is_dir() {
            walk_inner(&path, out)?;
        } else {
            out.push(Ok(DirEntry {
                path,
                is_file: true,
                is_symlink: false,
            }));
        }
    }
    Ok(())
}

fn hash_file_chunked(hasher: &mut blake3::Hasher, path: &Path) -> VeritasResult<()> {
    let mut f = fs::File::open(path)?;
    let mut buf = vec![0u8; HASH_CHUNK_BYTES];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(())
}

fn leaf_legacy(rel: &str, path: &Path) -> VeritasResult<[u8; 32]> {
    let mut h = blake3::Hasher::new();
    h.update(rel.as_bytes());
    h.update(&[0x00]);
    hash_file_chunked(&mut h, path)?;
    Ok(*h.finalize().as_bytes())
}

fn leaf_mldsa44(rel: &str, path: &Path) -> VeritasResult<[u8; 32]> {
    let mut h = blake3::Hasher::new();
    h.update(&[0x00]);
    h.update(rel.as_bytes());
    h.update(&[0x00]);
    hash_file_chunked(&mut h, path)?;
    Ok(*h.finalize().as_bytes())
}

fn tree_legacy(leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return *blake3::hash(b"").as_bytes();
    }
    let mut level = leaves;
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut i = 0;
        while i < level.len() {
            let left = level[i];
            let right = if i + 1 < level.len() { level[i + 1] } else { left };
            let mut h = blake3::Hasher::new();
            h.update(&left);
            h.update(&right);
            next.push(*h.finalize().as_bytes());
            i += 2;
        }
        level = next;
    }
    level[0]
}

fn tree_mldsa44(leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        let mut out = [0u8; 32];
        hex::decode_to_slice(EMPTY_ROOT_MLDSA44_HEX, &mut out).expect("frozen constant is valid hex");
        return out;
    }
    if leaves.len() == 1 {
        return leaves[0];
    }
    let mut level = leaves;
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut i = 0;
        while i + 1 < level.len() {
            let mut h = blake3::Hasher::new();
            h.update(&[0x01]);
            h.update(&level[i]);
            h.update(&level[i + 1]);
            next.push(*h.finalize().as_bytes());
            i += 2;
        }
        if i < level.len() {
            next.push(level[i]);
        }
        level = next;
    }
    level[0]
}

/// Compute the Merkle root of `shard_root` under `suite`, returning lowercase hex.
pub fn compute_merkle_root(shard_root: &Path, suite: Suite, limits: MerkleLimits) -> VeritasResult<String> {
    let files = collect_merkle_files(shard_root, limits)?;
    let root = match suite {
        Suite::Ed25519 => {
            let mut leaves = Vec::with_capacity(files.len());
            for (rel, path) in &files {
                leaves.push(leaf_legacy(rel, path)?);
            }
            tree_legacy(leaves)
        }
        Suite::Mldsa44 => {
            let mut leaves = Vec::with_capacity(files.len());
            for (rel, path) in &files {
                leaves.push(leaf_mldsa44(rel, path)?);
            }
            tree_mldsa44(leaves)
        }
    };
    Ok(hex::encode(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn empty_tree_roots_match_frozen_values() {
        assert_eq!(tree_legacy(vec![]), *blake3::hash(b"").as_bytes());
        assert_eq!(hex::encode(tree_mldsa44(vec![])), EMPTY_ROOT_MLDSA44_HEX);
    }

    #[test]
    fn legacy_and_pq_roots_differ_for_same_content() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("content")).unwrap();
        fs::write(dir.path().join("content/source.txt"), b"hello\n").unwrap();

        let legacy = compute_merkle_root(dir.path(), Suite::Ed25519, MerkleLimits::default()).unwrap();
        let pq = compute_merkle_root(dir.path(), Suite::Mldsa44, MerkleLimits::default()).unwrap();
        assert_ne!(legacy, pq);
    }

    #[test]
    fn excludes_manifest_and_sig() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sig")).unwrap();
        fs::create_dir_all(dir.path().join("content")).unwrap();
        fs::write(dir.path().join("content/source.txt"), b"hello\n").unwrap();
        fs::write(dir.path().join("manifest.json"), b"{}").unwrap();
        fs::write(dir.path().join("sig/manifest.sig"), b"sig").unwrap();
        fs::write(dir.path().join("sig/publisher.pub"), b"pub").unwrap();

        let with_extras = compute_merkle_root(dir.path(), Suite::Ed25519, MerkleLimits::default()).unwrap();

        let dir2 = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir2.path().join("content")).unwrap();
        fs::write(dir2.path().join("content/source.txt"), b"hello\n").unwrap();
        let without_extras = compute_merkle_root(dir2.path(), Suite::Ed25519, MerkleLimits::default()).unwrap();

        assert_eq!(with_extras, without_extras);
    }

    #[test]
    fn tamper_detected() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("content")).unwrap();
        fs::write(dir.path().join("content/source.txt"), b"hello\n").unwrap();
        let before = compute_merkle_root(dir.path(), Suite::Ed25519, MerkleLimits::default()).unwrap();

        fs::write(dir.path().join("content/source.txt"), b"hello!\n").unwrap();
        let after = compute_merkle_root(dir.path(), Suite::Ed25519, MerkleLimits::default()).unwrap();

        assert_ne!(before, after);
    }
}
