//! Compress / decompress state machines.
//!
//! One run moves an object through:
//!
//! ```text
//! Init → DecideAction → NoOp
//!                     ↘ Staged → Fetched → Verified/Transcoded → StagedRemote
//!                       → Committed → MetadataWritten → CleanedUp
//! ```
//!
//! Every step depends on the one before it, so a run is strictly sequential.
//! Failures before `MetadataWritten` never touch metadata: the object stays in
//! the last staging location it reached and a retry re-decides from metadata.

use crate::models::{
    attribute::{Attribute, TypedValue},
    compression::{
        CompressionState, IntegrityRecord, LOCK_EXPIRES, LOCK_OWNER, STATUS_COMPLETE,
        STATUS_PENDING, TRANSCODE_STATUS, carried_attributes,
    },
    metadata::{MetadataError, ObjectMetadata, decode_text},
    staging::{Retention, StagingConfig, StagingPlan},
};
use crate::services::{
    codec::{Codec, CodecError},
    digest::{DigestAlgorithm, DigestError, measure_async},
    observer::{TranscodeEvent, TranscodeObserver},
    store::{ObjectStore, StoreError},
};
use chrono::Utc;
use serde::Serialize;
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Compress,
    Decompress,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Compress => f.write_str("compress"),
            Action::Decompress => f.write_str("decompress"),
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TranscodeState {
    Init,
    DecideAction,
    NoOp,
    Staged,
    Fetched,
    Verified,
    Transcoded,
    StagedRemote,
    Committed,
    MetadataWritten,
    CleanedUp,
}

/// What to do when decompressed content does not match its recorded size or
/// digest.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityPolicy {
    /// Report the mismatch and commit anyway.
    #[default]
    Warn,
    /// Stop before uploading the decompressed content.
    Abort,
}

/// Advisory single-writer lease kept in the object's own metadata.
#[derive(Clone, Debug)]
pub struct LeaseConfig {
    pub owner: String,
    pub ttl: Duration,
}

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("invalid object path `{0}`")]
    InvalidPath(String),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Digest(#[from] DigestError),
    #[error("{operation} failed during {state:?}: {source}")]
    Store {
        state: TranscodeState,
        operation: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("codec failed: {0}")]
    Codec(#[from] CodecError),
    #[error("`{path}` is compressed with unsupported method `{method}`")]
    UnsupportedMethod { path: String, method: String },
    #[error(
        "integrity mismatch for `{path}`: expected {expected_size:?} bytes / {expected_digest:?}, \
         got {actual_size} bytes / {actual_digest}"
    )]
    IntegrityMismatch {
        path: String,
        expected_size: Option<u64>,
        expected_digest: Option<String>,
        actual_size: u64,
        actual_digest: String,
    },
    #[error("`{path}` is leased by `{owner}` until {expires}")]
    Locked {
        path: String,
        owner: String,
        expires: i64,
    },
    #[error("cancelled before entering {0:?}")]
    Cancelled(TranscodeState),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type TranscodeResult<T> = Result<T, TranscodeError>;

/// Result of a completed run.
#[derive(Serialize, Clone, Debug)]
pub struct TranscodeOutcome {
    pub path: String,
    pub action: Action,
    pub final_state: TranscodeState,
    pub plan: Option<StagingPlan>,
    /// Uncompressed size and digest: measured before compression, or after
    /// decompression.
    pub integrity: Option<IntegrityRecord>,
    /// Whether decompressed content matched the recorded integrity values.
    /// `None` when nothing was compared.
    pub integrity_verified: Option<bool>,
}

/// Drives compress/decompress runs against one store with one codec.
#[derive(Clone)]
pub struct Transcoder {
    store: Arc<dyn ObjectStore>,
    codec: Arc<dyn Codec>,
    digest: DigestAlgorithm,
    integrity: IntegrityPolicy,
    lease: Option<LeaseConfig>,
}

struct Lease {
    owner: String,
    expires: i64,
    /// Store paths carrying the lease attributes. They travel with an object
    /// when it is moved.
    locations: Vec<String>,
}

impl Lease {
    fn moved(&mut self, from: &str, to: &str) {
        for location in self.locations.iter_mut().filter(|l| l.as_str() == from) {
            *location = to.to_string();
        }
    }

    fn attributes(&self) -> [Attribute; 2] {
        [
            Attribute::new(LOCK_OWNER, self.owner.clone(), ""),
            Attribute::new(LOCK_EXPIRES, self.expires.to_string(), "bytes"),
        ]
    }
}

/// Per-run bookkeeping: current state, observer, cancellation.
struct Run<'a> {
    path: &'a str,
    action: Action,
    state: TranscodeState,
    observer: &'a dyn TranscodeObserver,
    cancel: &'a CancellationToken,
    lease: Option<Lease>,
}

impl Run<'_> {
    fn enter(&mut self, state: TranscodeState) -> TranscodeResult<()> {
        if self.cancel.is_cancelled() {
            return Err(TranscodeError::Cancelled(state));
        }
        self.state = state;
        self.emit(TranscodeEvent::StateEntered {
            path: self.path.to_string(),
            action: self.action,
            state,
        });
        Ok(())
    }

    fn emit(&self, event: TranscodeEvent) {
        self.observer.on_event(&event);
    }

    fn decided(&self, proceed: bool, reason: &str) {
        self.emit(TranscodeEvent::Decided {
            path: self.path.to_string(),
            action: self.action,
            proceed,
            reason: reason.to_string(),
        });
    }

    fn remote(&self, operation: &'static str) -> impl FnOnce(StoreError) -> TranscodeError {
        let state = self.state;
        move |source| TranscodeError::Store {
            state,
            operation,
            source,
        }
    }

    fn outcome(&self, plan: Option<StagingPlan>) -> TranscodeOutcome {
        TranscodeOutcome {
            path: self.path.to_string(),
            action: self.action,
            final_state: self.state,
            plan,
            integrity: None,
            integrity_verified: None,
        }
    }
}

impl Transcoder {
    pub fn new(store: Arc<dyn ObjectStore>, codec: Arc<dyn Codec>) -> Self {
        Self {
            store,
            codec,
            digest: DigestAlgorithm::Sha1,
            integrity: IntegrityPolicy::default(),
            lease: None,
        }
    }

    pub fn with_digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    pub fn with_integrity_policy(mut self, policy: IntegrityPolicy) -> Self {
        self.integrity = policy;
        self
    }

    pub fn with_lease(mut self, lease: Option<LeaseConfig>) -> Self {
        self.lease = lease;
        self
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Make sure both staging locations exist.
    pub async fn prepare_staging(&self, staging: &StagingConfig) -> TranscodeResult<()> {
        self.store
            .make_directory(&staging.remote_dir)
            .await
            .map_err(|source| TranscodeError::Store {
                state: TranscodeState::Init,
                operation: "make_directory",
                source,
            })?;
        tokio::fs::create_dir_all(&staging.local_dir)
            .await
            .map_err(|err| TranscodeError::Store {
                state: TranscodeState::Init,
                operation: "create local staging directory",
                source: StoreError::Io(err),
            })?;
        Ok(())
    }

    /// Read and decode an object's metadata.
    pub async fn metadata(&self, path: &str) -> TranscodeResult<ObjectMetadata> {
        let text = self
            .store
            .metadata_text(path)
            .await
            .map_err(|source| TranscodeError::Store {
                state: TranscodeState::DecideAction,
                operation: "metadata_text",
                source,
            })?;
        Ok(decode_text(&text)?)
    }

    /// Replace the object at `path` with its compressed form, unless its
    /// metadata says it is already compressed.
    pub async fn compress(
        &self,
        path: &str,
        staging: &StagingConfig,
        retention: Retention,
        observer: &dyn TranscodeObserver,
        cancel: &CancellationToken,
    ) -> TranscodeResult<TranscodeOutcome> {
        let mut run = Run {
            path,
            action: Action::Compress,
            state: TranscodeState::Init,
            observer,
            cancel,
            lease: None,
        };
        let result = self.compress_run(&mut run, staging, retention).await;
        self.finish(run, result).await
    }

    /// Replace the object at `path` with its decompressed form, if its
    /// metadata says it is compressed.
    pub async fn decompress(
        &self,
        path: &str,
        staging: &StagingConfig,
        retention: Retention,
        observer: &dyn TranscodeObserver,
        cancel: &CancellationToken,
    ) -> TranscodeResult<TranscodeOutcome> {
        let mut run = Run {
            path,
            action: Action::Decompress,
            state: TranscodeState::Init,
            observer,
            cancel,
            lease: None,
        };
        let result = self.decompress_run(&mut run, staging, retention).await;
        self.finish(run, result).await
    }

    /// Dispatch on `action`.
    pub async fn run(
        &self,
        action: Action,
        path: &str,
        staging: &StagingConfig,
        retention: Retention,
        observer: &dyn TranscodeObserver,
        cancel: &CancellationToken,
    ) -> TranscodeResult<TranscodeOutcome> {
        match action {
            Action::Compress => {
                self.compress(path, staging, retention, observer, cancel)
                    .await
            }
            Action::Decompress => {
                self.decompress(path, staging, retention, observer, cancel)
                    .await
            }
        }
    }

    async fn compress_run(
        &self,
        run: &mut Run<'_>,
        staging: &StagingConfig,
        retention: Retention,
    ) -> TranscodeResult<TranscodeOutcome> {
        let path = run.path;
        let plan = StagingPlan::new(path, staging, self.codec.suffix())
            .ok_or_else(|| TranscodeError::InvalidPath(path.to_string()))?;

        run.enter(TranscodeState::Init)?;
        self.store.list(path).await.map_err(run.remote("list"))?;

        run.enter(TranscodeState::DecideAction)?;
        let metadata = self.metadata(path).await?;
        if CompressionState::from_metadata(&metadata).is_compressed {
            run.decided(false, "already compressed");
            run.enter(TranscodeState::NoOp)?;
            return Ok(run.outcome(None));
        }
        run.decided(true, "not compressed");
        self.acquire_lease(run, &metadata).await?;

        run.enter(TranscodeState::Staged)?;
        self.store
            .move_object(path, &plan.remote_staged)
            .await
            .map_err(run.remote("move"))?;
        if let Some(lease) = run.lease.as_mut() {
            lease.moved(path, &plan.remote_staged);
        }

        run.enter(TranscodeState::Fetched)?;
        self.store
            .get(&plan.remote_staged, &plan.local_staged)
            .await
            .map_err(run.remote("get"))?;

        run.enter(TranscodeState::Verified)?;
        let record = measure_async(plan.local_staged.clone(), self.digest).await?;

        run.enter(TranscodeState::Transcoded)?;
        let compressed = self.transcode(Action::Compress, &plan.local_staged).await?;

        run.enter(TranscodeState::StagedRemote)?;
        self.store
            .put(&compressed, &plan.remote_staged_compressed)
            .await
            .map_err(run.remote("put"))?;

        run.enter(TranscodeState::Committed)?;
        self.commit_content(run, &plan.remote_staged_compressed, retention)
            .await?;

        run.enter(TranscodeState::MetadataWritten)?;
        let mut attributes = carried_attributes(&metadata);
        attributes.extend(CompressionState::compressed_attributes(
            self.codec.method(),
            &record,
            &plan.remote_staged,
        ));
        self.write_metadata(run, attributes).await?;

        run.enter(TranscodeState::CleanedUp)?;
        self.clean_up(run, &plan, retention, &plan.remote_staged)
            .await;

        let mut outcome = run.outcome(Some(plan));
        outcome.integrity = Some(record);
        Ok(outcome)
    }

    async fn decompress_run(
        &self,
        run: &mut Run<'_>,
        staging: &StagingConfig,
        retention: Retention,
    ) -> TranscodeResult<TranscodeOutcome> {
        let path = run.path;
        let plan = StagingPlan::new(path, staging, self.codec.suffix())
            .ok_or_else(|| TranscodeError::InvalidPath(path.to_string()))?;

        run.enter(TranscodeState::Init)?;
        self.store.list(path).await.map_err(run.remote("list"))?;

        run.enter(TranscodeState::DecideAction)?;
        let metadata = self.metadata(path).await?;
        let state = CompressionState::from_metadata(&metadata);
        if !state.is_compressed {
            run.decided(false, "not compressed");
            run.enter(TranscodeState::NoOp)?;
            return Ok(run.outcome(None));
        }
        if let Some(method) = state.method.as_deref() {
            if !method.eq_ignore_ascii_case(self.codec.method()) {
                return Err(TranscodeError::UnsupportedMethod {
                    path: path.to_string(),
                    method: method.to_string(),
                });
            }
        }
        let algorithm = match state.hash_method.as_deref() {
            Some(name) => name.parse::<DigestAlgorithm>()?,
            None => self.digest,
        };
        run.decided(true, "compressed");
        self.acquire_lease(run, &metadata).await?;

        run.enter(TranscodeState::Staged)?;
        self.store
            .move_object(path, &plan.remote_staged_compressed)
            .await
            .map_err(run.remote("move"))?;
        if let Some(lease) = run.lease.as_mut() {
            lease.moved(path, &plan.remote_staged_compressed);
        }

        run.enter(TranscodeState::Fetched)?;
        self.store
            .get(&plan.remote_staged_compressed, &plan.local_staged_compressed)
            .await
            .map_err(run.remote("get"))?;

        run.enter(TranscodeState::Transcoded)?;
        let restored = self
            .transcode(Action::Decompress, &plan.local_staged_compressed)
            .await?;

        run.enter(TranscodeState::Verified)?;
        let record = measure_async(restored.clone(), algorithm).await?;
        let verified = self.verify(run, &state, &record)?;

        run.enter(TranscodeState::StagedRemote)?;
        self.store
            .put(&restored, &plan.remote_staged)
            .await
            .map_err(run.remote("put"))?;

        run.enter(TranscodeState::Committed)?;
        self.commit_content(run, &plan.remote_staged, retention)
            .await?;

        run.enter(TranscodeState::MetadataWritten)?;
        let mut attributes = carried_attributes(&metadata);
        attributes.extend(CompressionState::uncompressed_attributes(
            &record,
            &plan.remote_staged_compressed,
        ));
        self.write_metadata(run, attributes).await?;

        run.enter(TranscodeState::CleanedUp)?;
        self.clean_up(run, &plan, retention, &plan.remote_staged_compressed)
            .await;

        let mut outcome = run.outcome(Some(plan));
        outcome.integrity = Some(record);
        outcome.integrity_verified = verified;
        Ok(outcome)
    }

    /// Report the end of a run and drop the lease, unless the run was
    /// cancelled: cancellation makes no further remote calls.
    async fn finish(
        &self,
        mut run: Run<'_>,
        result: TranscodeResult<TranscodeOutcome>,
    ) -> TranscodeResult<TranscodeOutcome> {
        let cancelled = matches!(result, Err(TranscodeError::Cancelled(_)));
        if !cancelled {
            if let Some(lease) = run.lease.take() {
                self.release_lease(&run, lease).await;
            }
        }

        match &result {
            Ok(outcome) => run.emit(TranscodeEvent::Finished {
                path: run.path.to_string(),
                action: run.action,
                state: outcome.final_state,
            }),
            Err(err) => run.emit(TranscodeEvent::Failed {
                path: run.path.to_string(),
                action: run.action,
                state: run.state,
                error: err.to_string(),
            }),
        }
        result
    }

    async fn transcode(&self, action: Action, input: &Path) -> TranscodeResult<PathBuf> {
        let codec = self.codec.clone();
        let input = input.to_path_buf();
        let output = tokio::task::spawn_blocking(move || match action {
            Action::Compress => codec.compress_file(&input),
            Action::Decompress => codec.decompress_file(&input),
        })
        .await??;
        Ok(output)
    }

    /// Compare decompressed content against the recorded values.
    ///
    /// Returns `None` when metadata recorded nothing to compare against.
    fn verify(
        &self,
        run: &Run<'_>,
        state: &CompressionState,
        actual: &IntegrityRecord,
    ) -> TranscodeResult<Option<bool>> {
        if state.uncompressed_size.is_none() && state.uncompressed_hash.is_none() {
            return Ok(None);
        }
        let size_ok = state
            .uncompressed_size
            .is_none_or(|size| size == actual.size_bytes);
        let digest_ok = state
            .uncompressed_hash
            .as_deref()
            .is_none_or(|digest| digest.eq_ignore_ascii_case(&actual.digest));
        if size_ok && digest_ok {
            return Ok(Some(true));
        }

        run.emit(TranscodeEvent::IntegrityMismatch {
            path: run.path.to_string(),
            expected_size: state.uncompressed_size,
            expected_digest: state.uncompressed_hash.clone(),
            actual: actual.clone(),
        });
        match self.integrity {
            IntegrityPolicy::Warn => Ok(Some(false)),
            IntegrityPolicy::Abort => Err(TranscodeError::IntegrityMismatch {
                path: run.path.to_string(),
                expected_size: state.uncompressed_size,
                expected_digest: state.uncompressed_hash.clone(),
                actual_size: actual.size_bytes,
                actual_digest: actual.digest.clone(),
            }),
        }
    }

    /// Put the staged transcoded object on the canonical path. A copy keeps
    /// the staged object as a trail when remote staging is retained.
    ///
    /// A held lease is on the canonical object from the moment it appears
    /// there, so no other worker picks it up before its metadata is written.
    async fn commit_content(
        &self,
        run: &mut Run<'_>,
        staged: &str,
        retention: Retention,
    ) -> TranscodeResult<()> {
        let path = run.path;
        if retention.keep_remote {
            self.store
                .copy_object(staged, path)
                .await
                .map_err(run.remote("copy"))?;
            self.stamp_lease(run, path).await?;
        } else {
            self.stamp_lease(run, staged).await?;
            self.store
                .move_object(staged, path)
                .await
                .map_err(run.remote("move"))?;
            if let Some(lease) = run.lease.as_mut() {
                lease.moved(staged, path);
            }
        }
        Ok(())
    }

    /// Write the held lease, if any, onto `location`.
    async fn stamp_lease(&self, run: &mut Run<'_>, location: &str) -> TranscodeResult<()> {
        let Some(lease) = run.lease.as_ref() else {
            return Ok(());
        };
        self.store
            .set_metadata_batch(location, &lease.attributes())
            .await
            .map_err(run.remote("set_metadata"))?;
        if let Some(lease) = run.lease.as_mut() {
            lease.locations.push(location.to_string());
        }
        Ok(())
    }

    /// Write the new compression state. Stores without atomic batches get a
    /// `PENDING` marker first and `COMPLETE` last so a half-written set is
    /// recognisable.
    async fn write_metadata(
        &self,
        run: &Run<'_>,
        mut attributes: Vec<Attribute>,
    ) -> TranscodeResult<()> {
        let atomic = self.store.atomic_batches();
        if !atomic {
            attributes.insert(0, Attribute::new(TRANSCODE_STATUS, STATUS_PENDING, ""));
        }
        attributes.push(Attribute::new(TRANSCODE_STATUS, STATUS_COMPLETE, ""));

        self.store
            .set_metadata_batch(run.path, &attributes)
            .await
            .map_err(run.remote("set_metadata"))?;

        run.emit(TranscodeEvent::MetadataWritten {
            path: run.path.to_string(),
            attributes: attributes.len(),
            atomic,
        });
        Ok(())
    }

    /// Remove staging artifacts the retention flags do not keep. Never fails.
    async fn clean_up(
        &self,
        run: &mut Run<'_>,
        plan: &StagingPlan,
        retention: Retention,
        remote_leftover: &str,
    ) {
        if !retention.keep_remote {
            match self.store.remove(remote_leftover).await {
                Ok(()) => {
                    if let Some(lease) = run.lease.as_mut() {
                        lease.locations.retain(|l| l != remote_leftover);
                    }
                }
                Err(err) => run.emit(TranscodeEvent::CleanupFailed {
                    artifact: remote_leftover.to_string(),
                    error: err.to_string(),
                }),
            }
        }
        if !retention.keep_local {
            for local in [&plan.local_staged, &plan.local_staged_compressed] {
                match tokio::fs::remove_file(local).await {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => run.emit(TranscodeEvent::CleanupFailed {
                        artifact: local.display().to_string(),
                        error: err.to_string(),
                    }),
                }
            }
        }
    }

    /// Take the advisory lease on `run.path`, or fail with `Locked` when
    /// another live owner holds it. Lease attributes missing an expiry are
    /// treated as stale.
    async fn acquire_lease(
        &self,
        run: &mut Run<'_>,
        metadata: &ObjectMetadata,
    ) -> TranscodeResult<()> {
        let Some(config) = &self.lease else {
            return Ok(());
        };
        let now = Utc::now().timestamp();
        if let Some((owner, expires)) = current_lease(metadata) {
            if owner != config.owner && expires > now {
                return Err(TranscodeError::Locked {
                    path: run.path.to_string(),
                    owner,
                    expires,
                });
            }
        }

        let lease = Lease {
            owner: config.owner.clone(),
            expires: now.saturating_add(config.ttl.as_secs() as i64),
            locations: vec![run.path.to_string()],
        };
        self.store
            .set_metadata_batch(run.path, &lease.attributes())
            .await
            .map_err(run.remote("set_metadata"))?;
        run.lease = Some(lease);

        // A concurrent writer may have overwritten our attributes.
        let confirmed = self.metadata(run.path).await?;
        match current_lease(&confirmed) {
            Some((owner, _)) if owner == config.owner => Ok(()),
            Some((owner, expires)) => {
                run.lease = None;
                Err(TranscodeError::Locked {
                    path: run.path.to_string(),
                    owner,
                    expires,
                })
            }
            None => {
                run.lease = None;
                Err(TranscodeError::Locked {
                    path: run.path.to_string(),
                    owner: "<unknown>".into(),
                    expires: 0,
                })
            }
        }
    }

    async fn release_lease(&self, run: &Run<'_>, lease: Lease) {
        for location in &lease.locations {
            for name in [LOCK_OWNER, LOCK_EXPIRES] {
                match self.store.remove_metadata(location, name).await {
                    Ok(()) | Err(StoreError::NotFound(_)) => {}
                    Err(err) => run.emit(TranscodeEvent::LeaseReleaseFailed {
                        path: location.clone(),
                        error: format!("{} (owner {}): {}", name, lease.owner, err),
                    }),
                }
            }
        }
    }
}

fn current_lease(metadata: &ObjectMetadata) -> Option<(String, i64)> {
    let owner = match metadata.value(LOCK_OWNER)? {
        TypedValue::None => return None,
        other => other.to_string(),
    };
    let expires = metadata
        .value(LOCK_EXPIRES)
        .and_then(TypedValue::as_bytes)
        .map(|secs| secs as i64)
        .unwrap_or(0);
    Some((owner, expires))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metadata::decode_text;

    #[test]
    fn lease_without_expiry_is_stale() {
        let md = decode_text("attribute: LOCK_OWNER\nvalue: worker-1\nunits:\n").unwrap();
        assert_eq!(current_lease(&md), Some(("worker-1".into(), 0)));
    }

    #[test]
    fn lease_reads_owner_and_expiry() {
        let md = decode_text(
            "attribute: LOCK_OWNER\nvalue: worker-1\nunits:\n\
             attribute: LOCK_EXPIRES\nvalue: 1700000000\nunits: bytes\n",
        )
        .unwrap();
        assert_eq!(current_lease(&md), Some(("worker-1".into(), 1_700_000_000)));
        assert_eq!(current_lease(&ObjectMetadata::new()), None);
    }

    #[test]
    fn action_and_state_names() {
        assert_eq!(Action::Compress.to_string(), "compress");
        assert_eq!(
            serde_json::to_value(TranscodeState::StagedRemote).unwrap(),
            "staged_remote"
        );
        assert_eq!(
            serde_json::to_value(IntegrityPolicy::default()).unwrap(),
            "warn"
        );
    }
}
