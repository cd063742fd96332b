//! Artifact storage backends.
//!
//! [`FsArtifactStore`] keeps one file per artifact directly under a root
//! directory. Writes go to a hidden temporary file in the same directory and
//! are renamed into place, so readers never observe a partial PDF.

use std::{
    fs, io,
    io::Write,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tempfile::Builder as TempFileBuilder;

use crate::{
    application::storage::{ArtifactStore, StorageError},
    domain::filename::SanitizedFilename,
};

const PARTIAL_PREFIX: &str = ".md2pdf-";
const PARTIAL_SUFFIX: &str = ".partial";

/// Filesystem-backed artifact storage.
#[derive(Debug)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, io::Error> {
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of an artifact. Always a direct child of the root.
    pub fn path_of(&self, name: &SanitizedFilename) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// Remove temporary files left behind by a write that never completed,
    /// e.g. after a crash. Returns how many were removed.
    pub fn sweep_partials(&self) -> Result<usize, io::Error> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if is_partial_name(name) && entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, name: &SanitizedFilename, bytes: Bytes) -> Result<(), StorageError> {
        if bytes.is_empty() {
            return Err(StorageError::EmptyArtifact);
        }

        let root = self.root.clone();
        let target = self.path_of(name);
        tokio::task::spawn_blocking(move || write_atomic(&root, &target, &bytes))
            .await
            .map_err(|err| StorageError::Task(err.to_string()))??;
        Ok(())
    }

    async fn get(&self, name: &SanitizedFilename) -> Result<Bytes, StorageError> {
        match tokio::fs::read(self.path_of(name)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

/// Write `bytes` to `target` through a temporary file created in `dir`.
///
/// `dir` must be on the same filesystem as `target` for the final rename to
/// be atomic. The temporary file removes itself if any step fails.
pub fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> Result<(), io::Error> {
    let mut partial = TempFileBuilder::new()
        .prefix(PARTIAL_PREFIX)
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(dir)?;
    partial.write_all(bytes)?;
    partial.as_file().sync_all()?;
    partial.persist(target).map_err(|err| err.error)?;
    Ok(())
}

fn is_partial_name(name: &str) -> bool {
    name.starts_with(PARTIAL_PREFIX) && name.ends_with(PARTIAL_SUFFIX)
}

/// In-memory artifact storage for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: DashMap<String, Bytes>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, name: &SanitizedFilename, bytes: Bytes) -> Result<(), StorageError> {
        if bytes.is_empty() {
            return Err(StorageError::EmptyArtifact);
        }
        self.artifacts.insert(name.as_str().to_string(), bytes);
        Ok(())
    }

    async fn get(&self, name: &SanitizedFilename) -> Result<Bytes, StorageError> {
        self.artifacts
            .get(name.as_str())
            .map(|entry| entry.value().clone())
            .ok_or(StorageError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn name(value: &str) -> SanitizedFilename {
        SanitizedFilename::from_requested(value).expect("valid name")
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read dir")
            .map(|entry| {
                entry
                    .expect("entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn creates_missing_root() {
        let dir = TempDir::new().expect("temp dir");
        let root = dir.path().join("nested").join("pdfs");
        let store = FsArtifactStore::new(root.clone()).expect("store");
        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
    }

    #[tokio::test]
    async fn put_then_get_returns_bytes() {
        let dir = TempDir::new().expect("temp dir");
        let store = FsArtifactStore::new(dir.path().to_path_buf()).expect("store");

        store
            .put(&name("a"), Bytes::from_static(b"%PDF-1.7 a"))
            .await
            .expect("put");

        let bytes = store.get(&name("a")).await.expect("get");
        assert_eq!(&bytes[..], b"%PDF-1.7 a");
        assert_eq!(entries(dir.path()), vec!["a.pdf".to_string()]);
    }

    #[tokio::test]
    async fn second_put_overwrites_first() {
        let dir = TempDir::new().expect("temp dir");
        let store = FsArtifactStore::new(dir.path().to_path_buf()).expect("store");

        store
            .put(&name("same.pdf"), Bytes::from_static(b"first, and longer"))
            .await
            .expect("first put");
        store
            .put(&name("same.pdf"), Bytes::from_static(b"second"))
            .await
            .expect("second put");

        let bytes = store.get(&name("same.pdf")).await.expect("get");
        assert_eq!(&bytes[..], b"second");
        assert_eq!(entries(dir.path()), vec!["same.pdf".to_string()]);
    }

    #[tokio::test]
    async fn missing_artifact_is_not_found() {
        let dir = TempDir::new().expect("temp dir");
        let store = FsArtifactStore::new(dir.path().to_path_buf()).expect("store");
        let err = store.get(&name("ghost")).await.expect_err("missing");
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn empty_artifacts_are_refused() {
        let dir = TempDir::new().expect("temp dir");
        let store = FsArtifactStore::new(dir.path().to_path_buf()).expect("store");
        let err = store.put(&name("empty"), Bytes::new()).await.expect_err("empty");
        assert!(matches!(err, StorageError::EmptyArtifact));
        assert!(entries(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_rename_leaves_no_partial_file() {
        let dir = TempDir::new().expect("temp dir");
        let store = FsArtifactStore::new(dir.path().to_path_buf()).expect("store");
        fs::create_dir(dir.path().join("blocked.pdf")).expect("blocking dir");

        let err = store
            .put(&name("blocked.pdf"), Bytes::from_static(b"%PDF-1.7"))
            .await
            .expect_err("rename onto a directory fails");
        assert!(matches!(err, StorageError::Io(_)));
        assert_eq!(entries(dir.path()), vec!["blocked.pdf".to_string()]);
    }

    #[test]
    fn sweep_removes_only_partials() {
        let dir = TempDir::new().expect("temp dir");
        let store = FsArtifactStore::new(dir.path().to_path_buf()).expect("store");
        fs::write(dir.path().join(".md2pdf-abc123.partial"), b"half").expect("partial");
        fs::write(dir.path().join("kept.pdf"), b"%PDF-").expect("artifact");
        fs::write(dir.path().join(".other"), b"x").expect("other hidden file");

        let removed = store.sweep_partials().expect("sweep");
        assert_eq!(removed, 1);
        assert_eq!(
            entries(dir.path()),
            vec![".other".to_string(), "kept.pdf".to_string()]
        );
    }

    #[tokio::test]
    async fn memory_store_overwrites_and_reports_missing() {
        let store = MemoryArtifactStore::new();
        assert!(store.is_empty());
        store
            .put(&name("m"), Bytes::from_static(b"one"))
            .await
            .expect("put");
        store
            .put(&name("m"), Bytes::from_static(b"two"))
            .await
            .expect("put");
        assert_eq!(store.len(), 1);
        assert_eq!(&store.get(&name("m")).await.expect("get")[..], b"two");
        assert!(matches!(
            store.get(&name("other")).await,
            Err(StorageError::NotFound)
        ));
    }
}
