//! Catalog row for an object held by the local store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A data object in the local store.
///
/// The payload lives on disk under a path derived from `id`, so renaming an
/// object only rewrites `path` and its attributes stay attached to `id`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct StoredObject {
    /// UUID naming the payload file.
    pub id: String,

    /// Logical store path (e.g. `/zone/home/coll/a.fastq`).
    pub path: String,

    /// Size in bytes.
    pub size_bytes: i64,

    /// MD5 of the payload, computed while it was written.
    pub checksum: String,

    /// When the payload was last written or the object renamed.
    pub last_modified: DateTime<Utc>,
}
