//! File-to-file compression codecs.
//!
//! Codecs never touch their input: compressing `x` writes `x.gz` next to it,
//! decompressing `x.gz` writes `x`. The staged original therefore survives a
//! failure in any later step.

use flate2::{Compression, read::MultiGzDecoder, write::GzEncoder};
use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("`{}` does not end with the `{suffix}` suffix", .path.display())]
    MissingSuffix { path: PathBuf, suffix: &'static str },
    #[error("{action} `{}`: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type CodecResult<T> = Result<T, CodecError>;

/// A single compression method operating on whole files.
pub trait Codec: Send + Sync {
    /// Name recorded in `COMPRESSION_METHOD`.
    fn method(&self) -> &'static str;

    /// Suffix appended to compressed file names, including the dot.
    fn suffix(&self) -> &'static str;

    /// Compress `path` into `path + suffix`, returning the new path.
    fn compress_file(&self, path: &Path) -> CodecResult<PathBuf>;

    /// Decompress `path` (which must carry the suffix) into the unsuffixed path.
    fn decompress_file(&self, path: &Path) -> CodecResult<PathBuf>;
}

/// gzip via `flate2`. Defaults to the fastest level, like `gzip --fast`.
#[derive(Clone, Copy, Debug)]
pub struct GzipCodec {
    level: Compression,
}

impl GzipCodec {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self {
            level: Compression::fast(),
        }
    }
}

impl Codec for GzipCodec {
    fn method(&self) -> &'static str {
        "gzip"
    }

    fn suffix(&self) -> &'static str {
        ".gz"
    }

    fn compress_file(&self, path: &Path) -> CodecResult<PathBuf> {
        let mut target = path.as_os_str().to_owned();
        target.push(self.suffix());
        let target = PathBuf::from(target);

        let result: CodecResult<()> = (|| {
            let mut input = BufReader::new(File::open(path).map_err(io_error("opening", path))?);
            let output = File::create(&target).map_err(io_error("creating", &target))?;
            let mut encoder = GzEncoder::new(BufWriter::new(output), self.level);
            io::copy(&mut input, &mut encoder).map_err(io_error("compressing", path))?;
            let mut writer = encoder.finish().map_err(io_error("finishing", &target))?;
            writer.flush().map_err(io_error("flushing", &target))?;
            Ok(())
        })();

        finish(result, target)
    }

    fn decompress_file(&self, path: &Path) -> CodecResult<PathBuf> {
        let target = strip_suffix(path, self.suffix()).ok_or_else(|| CodecError::MissingSuffix {
            path: path.to_path_buf(),
            suffix: self.suffix(),
        })?;

        let result: CodecResult<()> = (|| {
            let input = File::open(path).map_err(io_error("opening", path))?;
            let mut decoder = MultiGzDecoder::new(BufReader::new(input));
            let output = File::create(&target).map_err(io_error("creating", &target))?;
            let mut writer = BufWriter::new(output);
            io::copy(&mut decoder, &mut writer).map_err(io_error("decompressing", path))?;
            writer.flush().map_err(io_error("flushing", &target))?;
            Ok(())
        })();

        finish(result, target)
    }
}

fn io_error(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> CodecError {
    let path = path.to_path_buf();
    move |source| CodecError::Io {
        action,
        path,
        source,
    }
}

/// Drop a half-written output so a retry never mistakes it for a result.
fn finish(result: CodecResult<()>, target: PathBuf) -> CodecResult<PathBuf> {
    match result {
        Ok(()) => Ok(target),
        Err(err) => {
            let _ = fs::remove_file(&target);
            Err(err)
        }
    }
}

fn strip_suffix(path: &Path, suffix: &str) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(suffix).filter(|s| !s.is_empty())?;
    Some(path.with_file_name(stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_then_decompress_restores_content_and_keeps_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("reads.fastq");
        let contents = b"@r1\nACGT\n+\nIIII\n".repeat(5000);
        fs::write(&original, &contents).unwrap();

        let codec = GzipCodec::default();
        let compressed = codec.compress_file(&original).unwrap();
        assert_eq!(compressed, dir.path().join("reads.fastq.gz"));
        assert!(original.exists());
        assert!(fs::metadata(&compressed).unwrap().len() < contents.len() as u64);

        fs::remove_file(&original).unwrap();
        let restored = codec.decompress_file(&compressed).unwrap();
        assert_eq!(restored, original);
        assert!(compressed.exists());
        assert_eq!(fs::read(&restored).unwrap(), contents);
    }

    #[test]
    fn decompress_requires_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("reads.fastq");
        fs::write(&plain, b"x").unwrap();
        let err = GzipCodec::default().decompress_file(&plain).unwrap_err();
        assert!(matches!(err, CodecError::MissingSuffix { .. }));
    }

    #[test]
    fn corrupt_input_leaves_no_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("reads.fastq.gz");
        fs::write(&bogus, b"definitely not gzip").unwrap();
        let err = GzipCodec::default().decompress_file(&bogus).unwrap_err();
        assert!(matches!(err, CodecError::Io { .. }));
        assert!(!dir.path().join("reads.fastq").exists());
    }

    #[test]
    fn missing_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = GzipCodec::new(6)
            .compress_file(&dir.path().join("nothing"))
            .unwrap_err();
        assert!(matches!(err, CodecError::Io { action: "opening", .. }));
        assert!(!dir.path().join("nothing.gz").exists());
    }
}
