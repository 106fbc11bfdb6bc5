//! src/services/local_store.rs
//!
//! An [`ObjectStore`] backed by SQLite for the catalog (objects,
//! collections, attribute/value/units triplets) and local disk for payloads
//! sharded beneath `base_path/{shard}/{shard}/{object id}`.
//!
//! It mirrors the iRODS semantics the pipeline relies on: parents must exist,
//! metadata follows an object when it is moved, copies start without
//! metadata, and removing an object drops its metadata.

use crate::models::{attribute::Attribute, object::StoredObject};
use crate::services::store::{ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use sqlx::{
    Executor, SqlitePool,
    sqlite::{Sqlite, SqliteConnectOptions, SqlitePoolOptions},
};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

const MAX_PATH_LEN: usize = 1024;
const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Clone)]
pub struct LocalStore {
    /// Shared SQLite connection pool holding the catalog.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where payloads are stored.
    pub base_path: PathBuf,
}

/// Apply the embedded schema. Statements are idempotent.
pub async fn run_migrations(db: &SqlitePool) -> Result<usize, sqlx::Error> {
    let statements = SCHEMA
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    for stmt in &statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }
    Ok(statements.len())
}

impl LocalStore {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    /// Connect to (creating if needed) the catalog at `database_url`, apply
    /// the schema and make sure the payload directory exists.
    pub async fn open(database_url: &str, base_path: impl Into<PathBuf>) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self::new(Arc::new(pool), base_path);
        fs::create_dir_all(&store.base_path).await?;
        run_migrations(&store.db).await?;
        Ok(store)
    }

    /// Reject paths that are relative, contain `..` segments or control bytes.
    fn ensure_path_safe(&self, path: &str) -> StoreResult<()> {
        let invalid = || StoreError::InvalidPath(path.to_string());
        if path.is_empty() || path.len() > MAX_PATH_LEN || !path.starts_with('/') {
            return Err(invalid());
        }
        if path.split('/').any(|segment| segment == "..") {
            return Err(invalid());
        }
        if path
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(invalid());
        }
        Ok(())
    }

    /// Two-level shard identifiers for a payload, from MD5 of its id.
    fn payload_shards(id: &str) -> (String, String) {
        let digest = md5::compute(id);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn payload_path(&self, id: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::payload_shards(id);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(id);
        path
    }

    async fn fetch_object(&self, path: &str) -> StoreResult<Option<StoredObject>> {
        let row = sqlx::query_as::<_, StoredObject>(
            "SELECT id, path, size_bytes, checksum, last_modified FROM objects WHERE path = ?",
        )
        .bind(normalize(path))
        .fetch_optional(&*self.db)
        .await?;
        Ok(row)
    }

    async fn require_object(&self, path: &str) -> StoreResult<StoredObject> {
        self.ensure_path_safe(path)?;
        self.fetch_object(path)
            .await?
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn collection_exists(&self, path: &str) -> StoreResult<bool> {
        let path = normalize(path);
        if path == "/" {
            return Ok(true);
        }
        let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM collections WHERE path = ?")
            .bind(path)
            .fetch_optional(&*self.db)
            .await?;
        Ok(found.is_some())
    }

    /// Destination checks shared by move, copy and put.
    async fn require_parent(&self, path: &str) -> StoreResult<()> {
        self.ensure_path_safe(path)?;
        let parent = parent_of(path);
        if !self.collection_exists(&parent).await? {
            return Err(StoreError::NotFound(parent));
        }
        if self.collection_exists(path).await? {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        Ok(())
    }

    async fn require_absent(&self, path: &str) -> StoreResult<()> {
        if self.fetch_object(path).await?.is_some() {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        Ok(())
    }

    /// Stream a payload to disk under `id`.
    ///
    /// - Writes bytes incrementally to a temporary file.
    /// - Computes MD5 and size while streaming.
    /// - Syncs, then renames into the final location.
    ///
    /// The temporary file is removed on any error.
    async fn write_payload<S>(&self, id: &str, stream: S) -> StoreResult<(i64, String)>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let file_path = self.payload_path(id);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::new(
                ErrorKind::Other,
                "payload path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StoreError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }

        Ok((size_bytes, format!("{:x}", digest.compute())))
    }

    /// Recursively remove empty shard directories up to `base_path`.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base_path) && current != self.base_path {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }

    /// Catalog rows for every stored object, ordered by path.
    pub async fn objects(&self) -> StoreResult<Vec<StoredObject>> {
        let rows = sqlx::query_as::<_, StoredObject>(
            "SELECT id, path, size_bytes, checksum, last_modified FROM objects ORDER BY path ASC",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }
}

async fn upsert_avu<'e, E>(executor: E, object_id: &str, attribute: &Attribute) -> StoreResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    if attribute.name.trim().is_empty() {
        return Err(StoreError::InvalidPath(format!(
            "empty attribute name on object {}",
            object_id
        )));
    }
    sqlx::query(
        "INSERT INTO avus (object_id, attribute, value, units, seq)
         VALUES (?, ?, ?, ?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM avus WHERE object_id = ?))
         ON CONFLICT(object_id, attribute) DO UPDATE SET
             value = excluded.value,
             units = excluded.units",
    )
    .bind(object_id.to_owned())
    .bind(attribute.name.clone())
    .bind(attribute.value.clone())
    .bind(attribute.units.clone())
    .bind(object_id.to_owned())
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn list(&self, path: &str) -> StoreResult<()> {
        self.ensure_path_safe(path)?;
        if self.fetch_object(path).await?.is_some() || self.collection_exists(path).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound(path.to_string()))
        }
    }

    async fn move_object(&self, src: &str, dst: &str) -> StoreResult<()> {
        let object = self.require_object(src).await?;
        self.require_parent(dst).await?;
        self.require_absent(dst).await?;

        sqlx::query("UPDATE objects SET path = ?, last_modified = ? WHERE id = ?")
            .bind(normalize(dst))
            .bind(Utc::now())
            .bind(&object.id)
            .execute(&*self.db)
            .await?;
        debug!("moved {} -> {}", src, dst);
        Ok(())
    }

    async fn copy_object(&self, src: &str, dst: &str) -> StoreResult<()> {
        let object = self.require_object(src).await?;
        self.require_parent(dst).await?;
        self.require_absent(dst).await?;

        let id = Uuid::new_v4().to_string();
        let target = self.payload_path(&id);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(self.payload_path(&object.id), &target).await?;

        let inserted = sqlx::query(
            "INSERT INTO objects (id, path, size_bytes, checksum, last_modified)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(normalize(dst))
        .bind(object.size_bytes)
        .bind(&object.checksum)
        .bind(Utc::now())
        .execute(&*self.db)
        .await;

        if let Err(err) = inserted {
            let _ = fs::remove_file(&target).await;
            return Err(StoreError::Sqlx(err));
        }
        Ok(())
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        let object = self.require_object(path).await?;

        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM avus WHERE object_id = ?")
            .bind(&object.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM objects WHERE id = ?")
            .bind(&object.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let file_path = self.payload_path(&object.id);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed payload {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("payload {} already missing", file_path.display());
            }
            Err(err) => return Err(StoreError::Io(err)),
        }
        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    async fn get(&self, remote: &str, local: &Path) -> StoreResult<()> {
        let object = self.require_object(remote).await?;
        fs::copy(self.payload_path(&object.id), local).await?;
        Ok(())
    }

    async fn put(&self, local: &Path, remote: &str) -> StoreResult<()> {
        self.require_parent(remote).await?;
        let existing = self.fetch_object(remote).await?;
        let id = existing
            .as_ref()
            .map(|object| object.id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let file = File::open(local).await?;
        let (size_bytes, checksum) = self.write_payload(&id, ReaderStream::new(file)).await?;

        let upsert = sqlx::query(
            "INSERT INTO objects (id, path, size_bytes, checksum, last_modified)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(path) DO UPDATE SET
                 size_bytes = excluded.size_bytes,
                 checksum = excluded.checksum,
                 last_modified = excluded.last_modified",
        )
        .bind(&id)
        .bind(normalize(remote))
        .bind(size_bytes)
        .bind(&checksum)
        .bind(Utc::now())
        .execute(&*self.db)
        .await;

        match upsert {
            Ok(_) => Ok(()),
            Err(err) => {
                if existing.is_none() {
                    let _ = fs::remove_file(self.payload_path(&id)).await;
                }
                Err(StoreError::Sqlx(err))
            }
        }
    }

    async fn make_directory(&self, path: &str) -> StoreResult<()> {
        self.ensure_path_safe(path)?;
        let path = normalize(path);
        let mut chain = Vec::new();
        let mut current = path.clone();
        while current != "/" {
            chain.push(current.clone());
            current = parent_of(&current);
        }

        let now = Utc::now();
        for collection in chain.into_iter().rev() {
            if self.fetch_object(&collection).await?.is_some() {
                return Err(StoreError::AlreadyExists(collection));
            }
            sqlx::query("INSERT OR IGNORE INTO collections (path, created_at) VALUES (?, ?)")
                .bind(&collection)
                .bind(now)
                .execute(&*self.db)
                .await?;
        }
        Ok(())
    }

    async fn metadata_text(&self, path: &str) -> StoreResult<String> {
        let object = self.require_object(path).await?;
        let rows = sqlx::query_as::<_, (String, String, String)>(
            "SELECT attribute, value, units FROM avus WHERE object_id = ? ORDER BY seq ASC",
        )
        .bind(&object.id)
        .fetch_all(&*self.db)
        .await?;

        let mut text = format!("AVUs defined for dataObj {}:\n", object.path);
        if rows.is_empty() {
            text.push_str("None\n");
        }
        for (index, (attribute, value, units)) in rows.iter().enumerate() {
            if index > 0 {
                text.push_str("----\n");
            }
            text.push_str(&format!(
                "attribute: {}\nvalue: {}\nunits: {}\n",
                attribute, value, units
            ));
        }
        Ok(text)
    }

    async fn set_metadata(
        &self,
        path: &str,
        name: &str,
        value: &str,
        units: &str,
    ) -> StoreResult<()> {
        let object = self.require_object(path).await?;
        upsert_avu(&*self.db, &object.id, &Attribute::new(name, value, units)).await
    }

    async fn remove_metadata(&self, path: &str, name: &str) -> StoreResult<()> {
        let object = self.require_object(path).await?;
        sqlx::query("DELETE FROM avus WHERE object_id = ? AND attribute = ?")
            .bind(&object.id)
            .bind(name)
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    fn atomic_batches(&self) -> bool {
        true
    }

    /// All attributes are written in one SQLite transaction.
    async fn set_metadata_batch(&self, path: &str, attributes: &[Attribute]) -> StoreResult<()> {
        let object = self.require_object(path).await?;
        let mut tx = self.db.begin().await?;
        for attribute in attributes {
            upsert_avu(&mut *tx, &object.id, attribute).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Drop trailing slashes, keeping the root as `/`.
fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn parent_of(path: &str) -> String {
    let path = normalize(path);
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(pos) => path[..pos].to_string(),
    }
}
