//! Object storage abstraction for the archive target.
//!
//! The service talks to storage through the [`ObjectStore`] trait so the
//! HTTP handlers never hold a concrete S3 client. The real implementation is
//! [`s3::S3ObjectStore`]; tests substitute an in-memory fake.

pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error as ThisError;

use crate::config::{StorageConfig, TargetStorageClass};

/// Errors from the storage backend.
#[derive(ThisError, Debug)]
pub enum StorageError {
    #[error("failed to upload object '{key}': {message}")]
    Upload { key: String, message: String },

    #[error("failed to apply lifecycle policy for '{key}': {message}")]
    Lifecycle { key: String, message: String },
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage-class transition request for an uploaded object: move it to the
/// target class once it has been stored for `transition_days` days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    pub transition_days: i32,
    pub target_class: TargetStorageClass,
}

impl From<&StorageConfig> for LifecyclePolicy {
    fn from(config: &StorageConfig) -> Self {
        Self {
            transition_days: config.transition_days,
            target_class: config.target_storage_class,
        }
    }
}

/// Interface to the object-storage service.
///
/// Implementations hold their own bucket handle; keys are the client-supplied
/// filenames, unsanitized. A put to an existing key silently replaces the
/// prior object (last write wins, no versioning).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload raw bytes under `key`.
    async fn put_object(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Request a storage-class transition for the object stored under `key`.
    ///
    /// Best-effort metadata: callers must only invoke this after a successful
    /// [`put_object`](ObjectStore::put_object) for the same key. If it fails,
    /// the object remains stored untransitioned.
    async fn apply_lifecycle(&self, key: &str, policy: &LifecyclePolicy) -> StorageResult<()>;
}
