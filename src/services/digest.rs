//! Streaming content digests of local files.
//!
//! Files are read in fixed 64 KiB blocks and fed to an incremental hasher, so
//! memory use stays flat however large the staged object is.

use crate::models::compression::IntegrityRecord;
use serde::{Serialize, Serializer};
use sha2::Digest;
use std::{
    fmt,
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;

pub const BLOCK_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("unsupported digest algorithm `{0}` (supported: md5, sha1, sha256, sha512)")]
    UnsupportedAlgorithm(String),
    #[error("reading `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type DigestResult<T> = Result<T, DigestError>;

/// Whitelisted digest algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    fn hasher(self) -> Hasher {
        match self {
            DigestAlgorithm::Md5 => Hasher::Md5(md5::Context::new()),
            DigestAlgorithm::Sha1 => Hasher::Sha1(sha1::Sha1::new()),
            DigestAlgorithm::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
            DigestAlgorithm::Sha512 => Hasher::Sha512(sha2::Sha512::new()),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = DigestError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(DigestAlgorithm::Md5),
            "sha1" => Ok(DigestAlgorithm::Sha1),
            "sha256" => Ok(DigestAlgorithm::Sha256),
            "sha512" => Ok(DigestAlgorithm::Sha512),
            _ => Err(DigestError::UnsupportedAlgorithm(name.to_string())),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for DigestAlgorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

enum Hasher {
    Md5(md5::Context),
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Sha512(sha2::Sha512),
}

impl Hasher {
    fn update(&mut self, block: &[u8]) {
        match self {
            Hasher::Md5(ctx) => ctx.consume(block),
            Hasher::Sha1(h) => h.update(block),
            Hasher::Sha256(h) => h.update(block),
            Hasher::Sha512(h) => h.update(block),
        }
    }

    fn finish(self) -> String {
        match self {
            Hasher::Md5(ctx) => format!("{:x}", ctx.compute()),
            Hasher::Sha1(h) => format!("{:x}", h.finalize()),
            Hasher::Sha256(h) => format!("{:x}", h.finalize()),
            Hasher::Sha512(h) => format!("{:x}", h.finalize()),
        }
    }
}

/// Lower-case hex digest of the file at `path`, algorithm named by `algorithm`.
pub fn digest_file(path: &Path, algorithm: &str) -> DigestResult<String> {
    let algorithm = algorithm.parse::<DigestAlgorithm>()?;
    Ok(measure(path, algorithm)?.digest)
}

/// Size and digest of a file in a single streaming pass.
pub fn measure(path: &Path, algorithm: DigestAlgorithm) -> DigestResult<IntegrityRecord> {
    let io_err = |source| DigestError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(io_err)?;
    let mut hasher = algorithm.hasher();
    let mut block = vec![0u8; BLOCK_SIZE];
    let mut size_bytes = 0u64;

    loop {
        let n = match file.read(&mut block) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_err(err)),
        };
        size_bytes += n as u64;
        hasher.update(&block[..n]);
    }

    Ok(IntegrityRecord {
        size_bytes,
        digest: hasher.finish(),
        algorithm,
    })
}

/// [`measure`] on the blocking pool, for use from async code.
pub async fn measure_async(
    path: PathBuf,
    algorithm: DigestAlgorithm,
) -> DigestResult<IntegrityRecord> {
    let joined_path = path.clone();
    tokio::task::spawn_blocking(move || measure(&path, algorithm))
        .await
        .map_err(|err| DigestError::Io {
            path: joined_path,
            source: io::Error::other(err),
        })?
}
