//! Storage backend abstraction for the pipeline's inputs and outputs.
//!
//! The contract is object-storage flavored: flat keys, whole-object reads
//! and writes, prefix listing and prefix deletion. The ETL overwrites each
//! output table wholesale, so no conditional-write machinery is needed.
//!
//! Two backends ship with the crate:
//! - [`MemoryBackend`] for tests
//! - [`LocalFsBackend`] for local directory trees

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::{CoreError, Result};

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Object path (key), relative to the backend root.
    pub path: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification timestamp, if the backend tracks one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Storage backend trait for pipeline input and output locations.
///
/// Keys use `/` separators regardless of platform.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads an entire object.
    ///
    /// Returns [`CoreError::NotFound`] if the object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes an object, replacing any previous contents.
    async fn put(&self, path: &str, data: Bytes) -> Result<()>;

    /// Lists objects under the given prefix.
    ///
    /// Returns an empty vec if nothing matches. Ordering is unspecified;
    /// callers requiring determinism should sort by `path`.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Deletes every object under the given prefix.
    ///
    /// Succeeds even if the prefix is empty (idempotent). There is no
    /// atomicity guarantee: a failure partway through leaves some objects
    /// deleted and others not.
    async fn delete_prefix(&self, prefix: &str) -> Result<()>;
}

/// In-memory storage backend for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| CoreError::Internal {
            message: "lock poisoned".into(),
        })?;

        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| CoreError::NotFound(format!("object not found: {path}")))
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| CoreError::Internal {
            message: "lock poisoned".into(),
        })?;

        objects.insert(
            path.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| CoreError::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(path, obj)| ObjectMeta {
                path: path.clone(),
                size: obj.data.len() as u64,
                last_modified: Some(obj.last_modified),
            })
            .collect())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| CoreError::Internal {
            message: "lock poisoned".into(),
        })?;

        objects.retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }
}

/// Local filesystem backend rooted at a directory.
///
/// Object keys map to paths beneath the root; `put` creates missing parent
/// directories, `delete_prefix` removes matching files (and empties are left
/// to the filesystem).
#[derive(Debug)]
pub struct LocalFsBackend {
    root: PathBuf,
}

impl LocalFsBackend {
    /// Creates a backend rooted at `root`. The directory itself need not
    /// exist yet for writes; reads against a missing root fail.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let segments: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(segments.join("/"))
    }

    fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                Self::walk(&path, out)?;
            } else {
                out.push(path);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalFsBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let resolved = self.resolve(path);
        match std::fs::read(&resolved) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CoreError::NotFound(format!("object not found: {path}")))
            }
            Err(e) => Err(CoreError::storage_with_source(
                format!("read failed: {path}"),
                e,
            )),
        }
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let resolved = self.resolve(path);
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CoreError::storage_with_source(format!("mkdir failed: {}", parent.display()), e)
            })?;
        }
        std::fs::write(&resolved, &data)
            .map_err(|e| CoreError::storage_with_source(format!("write failed: {path}"), e))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let base = self.resolve(prefix);
        // A prefix may name a directory or a key prefix within one; walking
        // the nearest existing directory covers both.
        let walk_root = if base.is_dir() {
            base.clone()
        } else {
            match base.parent() {
                Some(p) if p.is_dir() => p.to_path_buf(),
                _ => return Err(CoreError::NotFound(format!("prefix not found: {prefix}"))),
            }
        };

        let mut files = Vec::new();
        Self::walk(&walk_root, &mut files).map_err(|e| {
            CoreError::storage_with_source(format!("list failed: {prefix}"), e)
        })?;

        let mut out = Vec::new();
        for file in files {
            let Some(key) = self.key_for(&file) else {
                continue;
            };
            if !key.starts_with(prefix.trim_start_matches('/')) {
                continue;
            }
            let meta = std::fs::metadata(&file).map_err(|e| {
                CoreError::storage_with_source(format!("stat failed: {key}"), e)
            })?;
            out.push(ObjectMeta {
                path: key,
                size: meta.len(),
                last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
            });
        }
        Ok(out)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let base = self.resolve(prefix);
        if base.is_dir() {
            std::fs::remove_dir_all(&base).map_err(|e| {
                CoreError::storage_with_source(format!("delete failed: {prefix}"), e)
            })?;
        } else if base.is_file() {
            std::fs::remove_file(&base).map_err(|e| {
                CoreError::storage_with_source(format!("delete failed: {prefix}"), e)
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_roundtrip() {
        let backend = MemoryBackend::new();
        let data = Bytes::from("hello world");

        backend
            .put("test/file.txt", data.clone())
            .await
            .expect("put should succeed");

        let retrieved = backend
            .get("test/file.txt")
            .await
            .expect("get should succeed");
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn memory_backend_get_missing_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.get("nope").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn memory_backend_list_with_prefix() {
        let backend = MemoryBackend::new();
        backend.put("a/1.json", Bytes::from("a1")).await.unwrap();
        backend.put("a/2.json", Bytes::from("a2")).await.unwrap();
        backend.put("b/1.json", Bytes::from("b1")).await.unwrap();

        let list_a = backend.list("a/").await.expect("should succeed");
        assert_eq!(list_a.len(), 2);

        let list_b = backend.list("b/").await.expect("should succeed");
        assert_eq!(list_b.len(), 1);
    }

    #[tokio::test]
    async fn memory_backend_delete_prefix_is_idempotent() {
        let backend = MemoryBackend::new();
        backend.put("t/x/1.parquet", Bytes::from("x")).await.unwrap();
        backend.put("t/y/1.parquet", Bytes::from("y")).await.unwrap();
        backend.put("u/1.parquet", Bytes::from("u")).await.unwrap();

        backend.delete_prefix("t/").await.expect("should succeed");
        assert!(backend.list("t/").await.unwrap().is_empty());
        assert_eq!(backend.list("u/").await.unwrap().len(), 1);

        // Deleting again is a no-op, not an error.
        backend.delete_prefix("t/").await.expect("should succeed");
    }

    #[tokio::test]
    async fn local_fs_backend_roundtrip_and_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = LocalFsBackend::new(dir.path());

        backend
            .put("song_data/A/B/C/one.json", Bytes::from("{}"))
            .await
            .expect("put should succeed");
        backend
            .put("song_data/A/B/D/two.json", Bytes::from("{}"))
            .await
            .expect("put should succeed");

        let listed = backend.list("song_data/").await.expect("list");
        assert_eq!(listed.len(), 2);

        let data = backend.get("song_data/A/B/C/one.json").await.expect("get");
        assert_eq!(data, Bytes::from("{}"));
    }

    #[tokio::test]
    async fn local_fs_backend_list_missing_prefix_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = LocalFsBackend::new(dir.path().join("absent"));

        let err = backend.list("song_data/").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn local_fs_backend_delete_prefix_removes_tree() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = LocalFsBackend::new(dir.path());

        backend
            .put("songs/year=2001/part-00000.parquet", Bytes::from("p"))
            .await
            .unwrap();
        backend.delete_prefix("songs").await.expect("delete");
        assert!(!dir.path().join("songs").exists());

        // Idempotent on a now-missing prefix.
        backend.delete_prefix("songs").await.expect("delete again");
    }
}
