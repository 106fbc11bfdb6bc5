//! [`ObjectStore`] over the iRODS icommands.
//!
//! Each operation shells out to the matching icommand (`imv`, `iget`,
//! `imeta`, ...) and maps a non-zero exit status to [`StoreError::Command`].
//! Timeouts and retries belong to the icommands environment, not to us.

use crate::services::store::{ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};
use tokio::process::Command;
use tracing::debug;

/// `imeta` reports this when a removal matched nothing.
const NO_ROWS_FOUND: &str = "CAT_SUCCESS_BUT_WITH_NO_INFO";

#[derive(Clone, Debug, Default)]
pub struct IrodsStore {
    /// Directory holding the icommands; `None` resolves them through `PATH`.
    bin_dir: Option<PathBuf>,
}

impl IrodsStore {
    pub fn new(bin_dir: Option<PathBuf>) -> Self {
        Self { bin_dir }
    }

    fn program(&self, name: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    /// Run an icommand and return its stdout.
    async fn run(&self, name: &str, args: Vec<OsString>) -> StoreResult<String> {
        let command_line = format!(
            "{} {}",
            name,
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );
        debug!("running {}", command_line);

        let output = Command::new(self.program(name))
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(StoreError::Command {
                command: command_line,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

fn args<I, S>(items: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    items.into_iter().map(Into::into).collect()
}

/// `imeta set` arguments; iRODS rejects an empty units argument, so it is
/// left off instead.
fn imeta_set_args(path: &str, name: &str, value: &str, units: &str) -> Vec<OsString> {
    let mut list = args(["set", "-d", path, name, value]);
    if !units.is_empty() {
        list.push(units.into());
    }
    list
}

#[async_trait]
impl ObjectStore for IrodsStore {
    async fn list(&self, path: &str) -> StoreResult<()> {
        match self.run("ils", args([path])).await {
            Ok(_) => Ok(()),
            Err(StoreError::Command { .. }) => Err(StoreError::NotFound(path.to_string())),
            Err(err) => Err(err),
        }
    }

    async fn move_object(&self, src: &str, dst: &str) -> StoreResult<()> {
        self.run("imv", args([src, dst])).await.map(drop)
    }

    async fn copy_object(&self, src: &str, dst: &str) -> StoreResult<()> {
        self.run("icp", args([src, dst])).await.map(drop)
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        self.run("irm", args(["-f", path])).await.map(drop)
    }

    async fn get(&self, remote: &str, local: &Path) -> StoreResult<()> {
        let mut list = args(["-f", remote]);
        list.push(local.as_os_str().to_owned());
        self.run("iget", list).await.map(drop)
    }

    async fn put(&self, local: &Path, remote: &str) -> StoreResult<()> {
        let mut list = args(["-f"]);
        list.push(local.as_os_str().to_owned());
        list.push(remote.into());
        self.run("iput", list).await.map(drop)
    }

    async fn make_directory(&self, path: &str) -> StoreResult<()> {
        self.run("imkdir", args(["-p", path])).await.map(drop)
    }

    async fn metadata_text(&self, path: &str) -> StoreResult<String> {
        self.run("imeta", args(["ls", "-d", path])).await
    }

    async fn set_metadata(
        &self,
        path: &str,
        name: &str,
        value: &str,
        units: &str,
    ) -> StoreResult<()> {
        self.run("imeta", imeta_set_args(path, name, value, units))
            .await
            .map(drop)
    }

    async fn remove_metadata(&self, path: &str, name: &str) -> StoreResult<()> {
        match self.run("imeta", args(["rmw", "-d", path, name, "%"])).await {
            Ok(_) => Ok(()),
            Err(StoreError::Command { stderr, .. }) if stderr.contains(NO_ROWS_FOUND) => Ok(()),
            Err(err) => Err(err),
        }
    }
}
