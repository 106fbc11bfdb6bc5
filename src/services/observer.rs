//! Structured events emitted by a pipeline run.
//!
//! Each run is handed its own observer, so the caller decides where progress
//! goes: `tracing` for the CLI, a recorder for HTTP responses and tests.

use crate::models::compression::IntegrityRecord;
use crate::services::pipeline::{Action, TranscodeState};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TranscodeEvent {
    StateEntered {
        path: String,
        action: Action,
        state: TranscodeState,
    },
    Decided {
        path: String,
        action: Action,
        proceed: bool,
        reason: String,
    },
    IntegrityMismatch {
        path: String,
        expected_size: Option<u64>,
        expected_digest: Option<String>,
        actual: IntegrityRecord,
    },
    MetadataWritten {
        path: String,
        attributes: usize,
        atomic: bool,
    },
    CleanupFailed {
        artifact: String,
        error: String,
    },
    LeaseReleaseFailed {
        path: String,
        error: String,
    },
    Finished {
        path: String,
        action: Action,
        state: TranscodeState,
    },
    Failed {
        path: String,
        action: Action,
        state: TranscodeState,
        error: String,
    },
}

pub trait TranscodeObserver: Send + Sync {
    fn on_event(&self, event: &TranscodeEvent);
}

/// Forwards events to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl TranscodeObserver for TracingObserver {
    fn on_event(&self, event: &TranscodeEvent) {
        match event {
            TranscodeEvent::StateEntered {
                path,
                action,
                state,
            } => debug!(%path, %action, ?state, "entering state"),
            TranscodeEvent::Decided {
                path,
                action,
                proceed,
                reason,
            } => info!(%path, %action, proceed, "{}", reason),
            TranscodeEvent::IntegrityMismatch {
                path,
                expected_size,
                expected_digest,
                actual,
            } => error!(
                %path,
                ?expected_size,
                ?expected_digest,
                actual_size = actual.size_bytes,
                actual_digest = %actual.digest,
                algorithm = %actual.algorithm,
                "integrity mismatch after decompression"
            ),
            TranscodeEvent::MetadataWritten {
                path,
                attributes,
                atomic,
            } => debug!(%path, attributes, atomic, "metadata written"),
            TranscodeEvent::CleanupFailed { artifact, error } => {
                warn!(%artifact, %error, "failed to remove staging artifact")
            }
            TranscodeEvent::LeaseReleaseFailed { path, error } => {
                warn!(%path, %error, "failed to release lease")
            }
            TranscodeEvent::Finished {
                path,
                action,
                state,
            } => info!(%path, %action, ?state, "finished"),
            TranscodeEvent::Failed {
                path,
                action,
                state,
                error,
            } => error!(%path, %action, ?state, %error, "failed"),
        }
    }
}

/// Keeps every event it sees, optionally passing them on to another observer.
#[derive(Default)]
pub struct RecordingObserver {
    inner: Option<Arc<dyn TranscodeObserver>>,
    events: Mutex<Vec<TranscodeEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forwarding(inner: Arc<dyn TranscodeObserver>) -> Self {
        Self {
            inner: Some(inner),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<TranscodeEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// States entered so far, in order.
    pub fn states(&self) -> Vec<TranscodeState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TranscodeEvent::StateEntered { state, .. } => Some(state),
                _ => None,
            })
            .collect()
    }
}

impl TranscodeObserver for RecordingObserver {
    fn on_event(&self, event: &TranscodeEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        if let Some(inner) = &self.inner {
            inner.on_event(event);
        }
    }
}
