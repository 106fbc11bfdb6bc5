//! The object store seam.
//!
//! The pipeline only ever talks to a store through [`ObjectStore`]; concrete
//! backends are the iRODS icommands ([`crate::services::irods_store`]) and a
//! directory-plus-SQLite store ([`crate::services::local_store`]).

use crate::models::attribute::Attribute;
use async_trait::async_trait;
use std::{io, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("`{0}` does not exist or is not accessible")]
    NotFound(String),
    #[error("`{0}` already exists")]
    AlreadyExists(String),
    #[error("invalid store path `{0}`")]
    InvalidPath(String),
    #[error("`{command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Operations the pipeline needs from a remote, metadata-tagged object store.
///
/// Paths are store-logical (`/zone/home/coll/a.fastq`); local paths are only
/// used as the other end of `get`/`put`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Succeeds when `path` exists and is readable, `NotFound` otherwise.
    async fn list(&self, path: &str) -> StoreResult<()>;

    /// Rename `src` to `dst`. Metadata moves with the object.
    async fn move_object(&self, src: &str, dst: &str) -> StoreResult<()>;

    /// Copy content of `src` to `dst`. Metadata is not copied.
    async fn copy_object(&self, src: &str, dst: &str) -> StoreResult<()>;

    /// Delete an object together with its metadata.
    async fn remove(&self, path: &str) -> StoreResult<()>;

    /// Download `remote` to `local`, overwriting it.
    async fn get(&self, remote: &str, local: &Path) -> StoreResult<()>;

    /// Upload `local` to `remote`, overwriting it.
    async fn put(&self, local: &Path, remote: &str) -> StoreResult<()>;

    /// Create a collection and any missing parents.
    async fn make_directory(&self, path: &str) -> StoreResult<()>;

    /// Raw attribute/value/units listing for an object.
    async fn metadata_text(&self, path: &str) -> StoreResult<String>;

    /// Set one attribute, replacing any previous values of that name.
    async fn set_metadata(
        &self,
        path: &str,
        name: &str,
        value: &str,
        units: &str,
    ) -> StoreResult<()>;

    /// Remove every value of the named attribute. Absent attributes are fine.
    async fn remove_metadata(&self, path: &str, name: &str) -> StoreResult<()>;

    /// Whether [`ObjectStore::set_metadata_batch`] applies all-or-nothing.
    fn atomic_batches(&self) -> bool {
        false
    }

    /// Set several attributes. The default writes them one call at a time and
    /// stops at the first failure, leaving earlier writes in place.
    async fn set_metadata_batch(&self, path: &str, attributes: &[Attribute]) -> StoreResult<()> {
        for attribute in attributes {
            self.set_metadata(path, &attribute.name, &attribute.value, &attribute.units)
                .await?;
        }
        Ok(())
    }
}
