//! Dependency cache with content-addressed storage.
//!
//! Cache entries are stored at `<cache_dir>/<manifest_hash>/`, where the hash
//! is derived from the dependency manifest's bytes. Changing the manifest
//! changes the key, so a stale cache is simply never hit. Restore is a
//! best-effort optimization: a miss (or a broken store) must never fail the
//! run.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

/// Compute the cache key for a dependency manifest.
pub fn manifest_key(manifest: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(manifest);
    let result = hasher.finalize();
    hex::encode(&result[..8]) // First 8 bytes = 16 hex chars
}

/// Content-addressed store for installed-dependency caches (pip cache dirs).
#[derive(Debug, Clone)]
pub struct DepCache {
    root: PathBuf,
}

impl DepCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the store entry for a key.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Copy the cached entry for `key` into `target`.
    ///
    /// Returns `Ok(false)` on a miss. `target` is created either way so the
    /// install step always has a cache directory to point at.
    pub fn restore(&self, key: &str, target: &Path) -> Result<bool> {
        fs::create_dir_all(target)
            .with_context(|| format!("create cache target {}", target.display()))?;
        let entry = self.entry_path(key);
        if !entry.is_dir() {
            debug!(key, "cache miss");
            return Ok(false);
        }
        debug!(key, entry = %entry.display(), "restoring cache entry");
        copy_dir_recursive(&entry, target)?;
        Ok(true)
    }

    /// Store `source` under `key`, replacing any previous entry.
    ///
    /// Writes to a sibling temp directory first so a crash mid-copy never
    /// leaves a half-written entry under the real key.
    pub fn save(&self, key: &str, source: &Path) -> Result<()> {
        let entry = self.entry_path(key);
        let tmp = self.root.join(format!("{key}.tmp"));
        if tmp.exists() {
            fs::remove_dir_all(&tmp)
                .with_context(|| format!("remove stale temp entry {}", tmp.display()))?;
        }
        fs::create_dir_all(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        copy_dir_recursive(source, &tmp)?;
        if entry.exists() {
            fs::remove_dir_all(&entry)
                .with_context(|| format!("remove old entry {}", entry.display()))?;
        }
        fs::rename(&tmp, &entry)
            .with_context(|| format!("move cache entry into place {}", entry.display()))?;
        debug!(key, entry = %entry.display(), "saved cache entry");
        Ok(())
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.with_context(|| format!("walk {}", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("strip prefix {}", src.display()))?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("create {}", target.display()))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            fs::copy(entry.path(), &target).with_context(|| {
                format!("copy {} -> {}", entry.path().display(), target.display())
            })?;
        }
        // Symlinks inside a pip cache are not expected; skip anything else.
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_key_is_deterministic() {
        let a = manifest_key(b"requests==2.32.0\n");
        let b = manifest_key(b"requests==2.32.0\n");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16); // 8 bytes = 16 hex chars
    }

    #[test]
    fn manifest_key_changes_with_content() {
        assert_ne!(manifest_key(b"lxml==5.0"), manifest_key(b"lxml==5.1"));
    }

    #[test]
    fn restore_miss_returns_false_and_creates_target() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cache = DepCache::new(temp.path().join("store"));
        let target = temp.path().join("pip-cache");
        let hit = cache.restore("deadbeef", &target).expect("restore");
        assert!(!hit);
        assert!(target.is_dir());
    }

    #[test]
    fn save_then_restore_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cache = DepCache::new(temp.path().join("store"));

        let source = temp.path().join("pip-cache");
        fs::create_dir_all(source.join("wheels")).expect("mkdir");
        fs::write(source.join("wheels/pkg.whl"), b"wheel-bytes").expect("write");
        cache.save("abc123", &source).expect("save");

        let target = temp.path().join("restored");
        let hit = cache.restore("abc123", &target).expect("restore");
        assert!(hit);
        let restored = fs::read(target.join("wheels/pkg.whl")).expect("read");
        assert_eq!(restored, b"wheel-bytes");
    }

    #[test]
    fn save_replaces_previous_entry() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cache = DepCache::new(temp.path().join("store"));

        let v1 = temp.path().join("v1");
        fs::create_dir_all(&v1).expect("mkdir");
        fs::write(v1.join("old.txt"), b"old").expect("write");
        cache.save("k", &v1).expect("save v1");

        let v2 = temp.path().join("v2");
        fs::create_dir_all(&v2).expect("mkdir");
        fs::write(v2.join("new.txt"), b"new").expect("write");
        cache.save("k", &v2).expect("save v2");

        let target = temp.path().join("restored");
        cache.restore("k", &target).expect("restore");
        assert!(target.join("new.txt").exists());
        assert!(!target.join("old.txt").exists());
    }
}
