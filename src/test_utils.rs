//! Test utilities for integration testing (available with `test-utils` feature).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::AppState;
use crate::config::Config;
use crate::storage::{LifecyclePolicy, ObjectStore, StorageError, StorageResult};

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Config::default()
    }
}

/// In-memory [`ObjectStore`] fake.
///
/// Records uploaded objects and applied lifecycle policies so tests can
/// assert on exactly what reached storage, and can be programmed to fail
/// either operation.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    fail_uploads: AtomicBool,
    fail_lifecycle: AtomicBool,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<String, Bytes>,
    policies: HashMap<String, LifecyclePolicy>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Bytes stored under `key`, if any
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.inner.lock().unwrap().objects.get(key).cloned()
    }

    /// Lifecycle policy applied to `key`, if any
    pub fn policy(&self, key: &str) -> Option<LifecyclePolicy> {
        self.inner.lock().unwrap().policies.get(key).copied()
    }

    pub fn object_count(&self) -> usize {
        self.inner.lock().unwrap().objects.len()
    }

    /// Make subsequent `put_object` calls fail
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `apply_lifecycle` calls fail
    pub fn set_fail_lifecycle(&self, fail: bool) {
        self.fail_lifecycle.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn put_object(&self, key: &str, data: Bytes) -> StorageResult<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Upload {
                key: key.to_string(),
                message: "simulated upload failure".to_string(),
            });
        }

        // Last write wins, matching S3 semantics
        self.inner.lock().unwrap().objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn apply_lifecycle(&self, key: &str, policy: &LifecyclePolicy) -> StorageResult<()> {
        if self.fail_lifecycle.load(Ordering::SeqCst) {
            return Err(StorageError::Lifecycle {
                key: key.to_string(),
                message: "simulated lifecycle failure".to_string(),
            });
        }

        self.inner.lock().unwrap().policies.insert(key.to_string(), *policy);
        Ok(())
    }
}

/// Build a test server over the full application router with an injected store.
pub fn create_test_app(store: Arc<dyn ObjectStore>) -> (axum_test::TestServer, Config) {
    let config = create_test_config();
    let state = AppState {
        store,
        config: config.clone(),
    };
    let router = crate::build_router(state);
    let server = axum_test::TestServer::new(router).expect("Failed to create test server");
    (server, config)
}
