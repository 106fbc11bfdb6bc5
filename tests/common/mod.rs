//! In-memory [`ObjectStore`] for pipeline tests.
#![allow(dead_code)]

use async_trait::async_trait;
use object_transcoder::{
    models::{attribute::Attribute, staging::StagingConfig},
    services::{
        codec::GzipCodec,
        pipeline::Transcoder,
        store::{ObjectStore, StoreError, StoreResult},
    },
};
use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{Arc, Mutex},
};

#[derive(Default)]
struct State {
    objects: HashMap<String, Vec<u8>>,
    metadata: HashMap<String, Vec<Attribute>>,
    collections: HashSet<String>,
    calls: Vec<String>,
    failing: HashSet<&'static str>,
}

/// Objects, their attributes and a log of every call made.
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<State>,
    atomic: bool,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose metadata batches apply all-or-nothing.
    pub fn atomic() -> Self {
        Self {
            atomic: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, path: &str, content: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.objects.insert(path.to_string(), content.to_vec());
        state.metadata.entry(path.to_string()).or_default();
    }

    pub fn tag(&self, path: &str, name: &str, value: &str, units: &str) {
        let mut state = self.state.lock().unwrap();
        set_attribute(
            state.metadata.entry(path.to_string()).or_default(),
            Attribute::new(name, value, units),
        );
    }

    /// Make every call of `operation` (`"move"`, `"put"`, `"set_metadata"`, ...)
    /// fail from now on.
    pub fn fail(&self, operation: &'static str) {
        self.state.lock().unwrap().failing.insert(operation);
    }

    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().objects.get(path).cloned()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state.lock().unwrap().objects.contains_key(path)
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.state.lock().unwrap().objects.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn attributes(&self, path: &str) -> Vec<Attribute> {
        self.state
            .lock()
            .unwrap()
            .metadata
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn attribute(&self, path: &str, name: &str) -> Option<String> {
        self.attributes(path)
            .into_iter()
            .find(|a| a.name == name)
            .map(|a| a.value)
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls whose first word is `operation`.
    pub fn calls_of(&self, operation: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.split(' ').next() == Some(operation))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn begin(&self, operation: &'static str, detail: String) -> StoreResult<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{} {}", operation, detail));
        if state.failing.contains(operation) {
            return Err(StoreError::Command {
                command: format!("{} {}", operation, detail),
                status: "exit status: 1".into(),
                stderr: "injected failure".into(),
            });
        }
        Ok(state)
    }
}

fn set_attribute(list: &mut Vec<Attribute>, attribute: Attribute) {
    match list.iter_mut().find(|a| a.name == attribute.name) {
        Some(existing) => *existing = attribute,
        None => list.push(attribute),
    }
}

fn missing(path: &str) -> StoreError {
    StoreError::NotFound(path.to_string())
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn list(&self, path: &str) -> StoreResult<()> {
        let state = self.begin("list", path.to_string())?;
        if state.objects.contains_key(path) || state.collections.contains(path) {
            Ok(())
        } else {
            Err(missing(path))
        }
    }

    async fn move_object(&self, src: &str, dst: &str) -> StoreResult<()> {
        let mut state = self.begin("move", format!("{} {}", src, dst))?;
        let content = state.objects.remove(src).ok_or_else(|| missing(src))?;
        let metadata = state.metadata.remove(src).unwrap_or_default();
        state.objects.insert(dst.to_string(), content);
        state.metadata.insert(dst.to_string(), metadata);
        Ok(())
    }

    async fn copy_object(&self, src: &str, dst: &str) -> StoreResult<()> {
        let mut state = self.begin("copy", format!("{} {}", src, dst))?;
        let content = state.objects.get(src).cloned().ok_or_else(|| missing(src))?;
        state.objects.insert(dst.to_string(), content);
        state.metadata.insert(dst.to_string(), Vec::new());
        Ok(())
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        let mut state = self.begin("remove", path.to_string())?;
        state.objects.remove(path).ok_or_else(|| missing(path))?;
        state.metadata.remove(path);
        Ok(())
    }

    async fn get(&self, remote: &str, local: &Path) -> StoreResult<()> {
        let content = {
            let state = self.begin("get", format!("{} {}", remote, local.display()))?;
            state.objects.get(remote).cloned().ok_or_else(|| missing(remote))?
        };
        tokio::fs::write(local, content).await?;
        Ok(())
    }

    async fn put(&self, local: &Path, remote: &str) -> StoreResult<()> {
        drop(self.begin("put", format!("{} {}", local.display(), remote))?);
        let content = tokio::fs::read(local).await?;
        let mut state = self.state.lock().unwrap();
        state.objects.insert(remote.to_string(), content);
        state.metadata.insert(remote.to_string(), Vec::new());
        Ok(())
    }

    async fn make_directory(&self, path: &str) -> StoreResult<()> {
        let mut state = self.begin("mkdir", path.to_string())?;
        state.collections.insert(path.to_string());
        Ok(())
    }

    async fn metadata_text(&self, path: &str) -> StoreResult<String> {
        let state = self.begin("meta_ls", path.to_string())?;
        let attributes = state.metadata.get(path).ok_or_else(|| missing(path))?;
        let mut text = format!("AVUs defined for dataObj {}:\n", path);
        if attributes.is_empty() {
            text.push_str("None\n");
        }
        for (i, attribute) in attributes.iter().enumerate() {
            if i > 0 {
                text.push_str("----\n");
            }
            text.push_str(&format!(
                "attribute: {}\nvalue: {}\nunits: {}\n",
                attribute.name, attribute.value, attribute.units
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
        let mut state = self.begin("set_metadata", format!("{} {}={}", path, name, value))?;
        if !state.objects.contains_key(path) {
            return Err(missing(path));
        }
        set_attribute(
            state.metadata.entry(path.to_string()).or_default(),
            Attribute::new(name, value, units),
        );
        Ok(())
    }

    async fn remove_metadata(&self, path: &str, name: &str) -> StoreResult<()> {
        let mut state = self.begin("remove_metadata", format!("{} {}", path, name))?;
        let list = state.metadata.get_mut(path).ok_or_else(|| missing(path))?;
        list.retain(|a| a.name != name);
        Ok(())
    }

    fn atomic_batches(&self) -> bool {
        self.atomic
    }

    async fn set_metadata_batch(&self, path: &str, attributes: &[Attribute]) -> StoreResult<()> {
        if !self.atomic {
            for attribute in attributes {
                self.set_metadata(path, &attribute.name, &attribute.value, &attribute.units)
                    .await?;
            }
            return Ok(());
        }
        let mut state = self.begin("set_metadata_batch", format!("{} {}", path, attributes.len()))?;
        if !state.objects.contains_key(path) {
            return Err(missing(path));
        }
        let list = state.metadata.entry(path.to_string()).or_default();
        for attribute in attributes {
            set_attribute(list, attribute.clone());
        }
        Ok(())
    }
}

/// Remote and local staging under a scratch directory.
pub fn staging(dir: &Path) -> StagingConfig {
    StagingConfig {
        remote_dir: "/zone/itmp".into(),
        local_dir: dir.to_path_buf(),
    }
}

pub fn transcoder(store: Arc<FakeStore>) -> Transcoder {
    Transcoder::new(store, Arc::new(GzipCodec::default()))
}

/// A few FASTQ records.
pub fn fastq() -> Vec<u8> {
    b"@read1\nACGTACGTACGT\n+\nIIIIIIIIIIII\n@read2\nTTTTGGGGCCCC\n+\nIIIIIIIIIIII\n"
        .repeat(64)
}
