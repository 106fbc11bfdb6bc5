//! Routes of the worker service.
//!
//! ## Structure
//! - `GET  /healthz`, `GET /readyz`: probes
//! - `GET  /metadata/{*path}`: decoded metadata of an object
//! - `POST /compress/{*path}`: compress an object in place
//! - `POST /decompress/{*path}`: decompress an object in place
//!
//! The wildcard `*path` is the object's logical path without its leading
//! slash, e.g. `/compress/zone/home/coll/a.fastq`.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        transcode_handlers::{compress_object, decompress_object, object_metadata},
    },
    models::staging::{Retention, StagingConfig},
    services::pipeline::Transcoder,
};
use axum::{
    Router,
    routing::{get, post},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::sync::{OwnedMutexGuard, Semaphore};
use tokio_util::sync::CancellationToken;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub transcoder: Transcoder,
    pub staging: StagingConfig,
    pub retention: Retention,
    pub required_extension: Option<String>,
    /// Bounds how many pipelines run at once.
    pub slots: Arc<Semaphore>,
    pub paths: PathLocks,
    /// Cancelled on shutdown; in-flight runs stop at their next state.
    pub cancel: CancellationToken,
}

impl AppState {
    pub fn new(
        transcoder: Transcoder,
        staging: StagingConfig,
        retention: Retention,
        workers: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transcoder,
            staging,
            retention,
            required_extension: None,
            slots: Arc::new(Semaphore::new(workers.max(1))),
            paths: PathLocks::default(),
            cancel,
        }
    }

    pub fn with_required_extension(mut self, extension: Option<String>) -> Self {
        self.required_extension = extension;
        self
    }

    pub fn accepts(&self, path: &str) -> bool {
        self.required_extension
            .as_deref()
            .is_none_or(|ext| path.ends_with(ext))
    }
}

/// One async mutex per object path, so two requests for the same object run
/// one after the other. Entries are dropped once nobody holds or awaits them.
#[derive(Clone, Default)]
pub struct PathLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

pub struct PathGuard {
    path: String,
    locks: PathLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PathLocks {
    pub async fn lock(&self, path: &str) -> PathGuard {
        let mutex = match self.inner.lock() {
            Ok(mut map) => map.entry(path.to_string()).or_default().clone(),
            Err(poisoned) => poisoned
                .into_inner()
                .entry(path.to_string())
                .or_default()
                .clone(),
        };
        let guard = mutex.lock_owned().await;
        PathGuard {
            path: path.to_string(),
            locks: self.clone(),
            guard: Some(guard),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        if let Ok(mut map) = self.locks.inner.lock() {
            // Only the map's own reference left.
            if map
                .get(&self.path)
                .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
            {
                map.remove(&self.path);
            }
        }
    }
}

/// Build the router of the worker service.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metadata/{*path}", get(object_metadata))
        .route("/compress/{*path}", post(compress_object))
        .route("/decompress/{*path}", post(decompress_object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_path_is_serialized() {
        let locks = PathLocks::default();
        let first = locks.lock("/c/a.fastq").await;

        let waiting = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _second = locks.lock("/c/a.fastq").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        // Other paths are independent.
        drop(locks.lock("/c/b.fastq").await);

        drop(first);
        waiting.await.unwrap();
        assert!(locks.is_empty());
    }
}
