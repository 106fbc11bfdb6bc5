//! Staging locations used while an object is being transcoded.

use chrono::DateTime;
use serde::Serialize;
use std::{
    path::PathBuf,
    sync::atomic::{AtomicI64, Ordering},
};

/// Where staged copies live during a run.
#[derive(Clone, Debug)]
pub struct StagingConfig {
    /// Remote collection holding staged objects.
    pub remote_dir: String,
    /// Local scratch directory holding fetched copies.
    pub local_dir: PathBuf,
}

/// Which staging artifacts survive a successful run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Retention {
    pub keep_remote: bool,
    pub keep_local: bool,
}

impl Retention {
    pub fn keep_all() -> Self {
        Self {
            keep_remote: true,
            keep_local: true,
        }
    }

    pub fn delete_all() -> Self {
        Self::default()
    }
}

/// Staging paths for one compress/decompress invocation.
///
/// Every path carries the same timestamp token as a prefix, so repeated runs
/// on the same basename never collide.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct StagingPlan {
    pub canonical: String,
    pub token: String,
    pub remote_staged: String,
    pub remote_staged_compressed: String,
    pub local_staged: PathBuf,
    pub local_staged_compressed: PathBuf,
}

impl StagingPlan {
    /// Build a plan with a fresh token. Returns `None` when `canonical` has no
    /// basename to stage under.
    pub fn new(canonical: &str, config: &StagingConfig, suffix: &str) -> Option<Self> {
        Self::with_token(canonical, config, suffix, next_token())
    }

    pub fn with_token(
        canonical: &str,
        config: &StagingConfig,
        suffix: &str,
        token: String,
    ) -> Option<Self> {
        let basename = canonical.rsplit('/').next().filter(|b| !b.is_empty())?;
        let staged_name = format!("{}_{}", token, basename);
        let compressed_name = format!("{}{}", staged_name, suffix);

        Some(Self {
            canonical: canonical.to_string(),
            remote_staged: join_remote(&config.remote_dir, &staged_name),
            remote_staged_compressed: join_remote(&config.remote_dir, &compressed_name),
            local_staged: config.local_dir.join(&staged_name),
            local_staged_compressed: config.local_dir.join(&compressed_name),
            token,
        })
    }
}

/// Join a remote collection and a name with exactly one `/`.
pub fn join_remote(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

static LAST_TOKEN_MICROS: AtomicI64 = AtomicI64::new(0);

/// Produce a compact ISO-8601 timestamp token (`20261016T143012.123456Z`).
///
/// Tokens are strictly increasing within a process: two calls in the same
/// microsecond get consecutive microsecond values.
pub fn next_token() -> String {
    let now = chrono::Utc::now().timestamp_micros();
    let mut last = LAST_TOKEN_MICROS.load(Ordering::Relaxed);
    let micros = loop {
        let candidate = now.max(last + 1);
        match LAST_TOKEN_MICROS.compare_exchange_weak(
            last,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break candidate,
            Err(actual) => last = actual,
        }
    };

    DateTime::from_timestamp_micros(micros)
        .map(|ts| ts.format("%Y%m%dT%H%M%S%.6fZ").to_string())
        .unwrap_or_else(|| micros.to_string())
}
