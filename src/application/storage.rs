//! Artifact storage interface.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::filename::SanitizedFilename;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("artifact not found")]
    NotFound,
    #[error("refusing to store an empty artifact")]
    EmptyArtifact,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("storage task failed: {0}")]
    Task(String),
}

/// Flat key-value store of rendered artifacts keyed by file name.
///
/// `put` must be atomic: a concurrent `get` sees either the previous artifact
/// or the new one, never a partial write. Repeated `put` for the same name
/// replaces the artifact (last write wins).
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, name: &SanitizedFilename, bytes: Bytes) -> Result<(), StorageError>;

    async fn get(&self, name: &SanitizedFilename) -> Result<Bytes, StorageError>;
}
