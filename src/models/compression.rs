//! The compression state an object advertises through its metadata.

use crate::models::{
    attribute::{Attribute, TypedValue},
    metadata::ObjectMetadata,
};
use crate::services::digest::DigestAlgorithm;
use serde::Serialize;

pub const IS_COMPRESSED: &str = "IS_COMPRESSED";
pub const COMPRESSION_METHOD: &str = "COMPRESSION_METHOD";
pub const UNCOMPRESSED_SIZE: &str = "UNCOMPRESSED_SIZE";
pub const UNCOMPRESSED_HASH: &str = "UNCOMPRESSED_HASH";
pub const HASH_METHOD: &str = "HASH_METHOD";
pub const PARENT_FILE: &str = "PARENT_FILE";

/// Older objects were tagged with these names before the current ones.
pub const LEGACY_UNCOMPRESSED_CHECKSUM: &str = "UNCOMPRESSED_CHECKSUM";
pub const LEGACY_ORIGINAL_FILE: &str = "ORIGINAL_FILE";

/// Marks whether the last metadata commit ran to completion.
pub const TRANSCODE_STATUS: &str = "TRANSCODE_STATUS";
pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_COMPLETE: &str = "COMPLETE";

pub const LOCK_OWNER: &str = "LOCK_OWNER";
pub const LOCK_EXPIRES: &str = "LOCK_EXPIRES";

/// Value written to `COMPRESSION_METHOD` once an object is stored plain.
pub const METHOD_NONE: &str = "none";

/// Size and digest of the uncompressed form of an object.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct IntegrityRecord {
    pub size_bytes: u64,
    pub digest: String,
    pub algorithm: DigestAlgorithm,
}

/// Snapshot of the compression-related attributes of an object.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct CompressionState {
    pub is_compressed: bool,
    pub method: Option<String>,
    pub uncompressed_size: Option<u64>,
    pub uncompressed_hash: Option<String>,
    pub hash_method: Option<String>,
    pub parent_file: Option<String>,
}

impl CompressionState {
    /// Read the state out of decoded metadata. A missing `IS_COMPRESSED`
    /// means the object is stored uncompressed.
    pub fn from_metadata(metadata: &ObjectMetadata) -> Self {
        let is_compressed = match metadata.value(IS_COMPRESSED) {
            Some(TypedValue::Bool(b)) => *b,
            Some(TypedValue::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        };

        Self {
            is_compressed,
            method: string_value(metadata, COMPRESSION_METHOD),
            uncompressed_size: metadata
                .value(UNCOMPRESSED_SIZE)
                .and_then(TypedValue::as_bytes),
            uncompressed_hash: string_value(metadata, UNCOMPRESSED_HASH)
                .or_else(|| string_value(metadata, LEGACY_UNCOMPRESSED_CHECKSUM)),
            hash_method: string_value(metadata, HASH_METHOD),
            parent_file: string_value(metadata, PARENT_FILE)
                .or_else(|| string_value(metadata, LEGACY_ORIGINAL_FILE)),
        }
    }

    /// Attributes describing an object that now holds compressed content.
    pub fn compressed_attributes(
        method: &str,
        record: &IntegrityRecord,
        parent_file: &str,
    ) -> Vec<Attribute> {
        vec![
            Attribute::new(IS_COMPRESSED, "true", "bool"),
            Attribute::new(COMPRESSION_METHOD, method, ""),
            Attribute::new(UNCOMPRESSED_SIZE, record.size_bytes.to_string(), "bytes"),
            Attribute::new(UNCOMPRESSED_HASH, record.digest.clone(), ""),
            Attribute::new(HASH_METHOD, record.algorithm.name(), ""),
            Attribute::new(PARENT_FILE, parent_file, ""),
        ]
    }

    /// Attributes describing an object restored to its uncompressed content.
    pub fn uncompressed_attributes(record: &IntegrityRecord, parent_file: &str) -> Vec<Attribute> {
        vec![
            Attribute::new(IS_COMPRESSED, "false", "bool"),
            Attribute::new(COMPRESSION_METHOD, METHOD_NONE, ""),
            Attribute::new(UNCOMPRESSED_SIZE, record.size_bytes.to_string(), "bytes"),
            Attribute::new(UNCOMPRESSED_HASH, record.digest.clone(), ""),
            Attribute::new(HASH_METHOD, record.algorithm.name(), ""),
            Attribute::new(PARENT_FILE, parent_file, ""),
        ]
    }
}

/// Whether `name` is written or managed by the pipeline itself.
pub fn is_pipeline_attribute(name: &str) -> bool {
    matches!(
        name,
        IS_COMPRESSED
            | COMPRESSION_METHOD
            | UNCOMPRESSED_SIZE
            | UNCOMPRESSED_HASH
            | HASH_METHOD
            | PARENT_FILE
            | LEGACY_UNCOMPRESSED_CHECKSUM
            | LEGACY_ORIGINAL_FILE
            | TRANSCODE_STATUS
            | LOCK_OWNER
            | LOCK_EXPIRES
    )
}

/// Every attribute of `metadata` the pipeline does not own, as listed.
/// These follow the content onto the replacement object.
pub fn carried_attributes(metadata: &ObjectMetadata) -> Vec<Attribute> {
    metadata
        .iter()
        .filter(|(name, _)| !is_pipeline_attribute(name))
        .map(|(name, entry)| Attribute::new(name, entry.raw.clone(), entry.units.clone()))
        .collect()
}

fn string_value(metadata: &ObjectMetadata, name: &str) -> Option<String> {
    match metadata.value(name)? {
        TypedValue::None => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metadata::decode_text;

    #[test]
    fn missing_flag_means_uncompressed() {
        let state = CompressionState::from_metadata(&ObjectMetadata::new());
        assert!(!state.is_compressed);
        assert_eq!(state, CompressionState::default());
    }

    #[test]
    fn reads_full_compressed_state() {
        let md = decode_text(
            "attribute: IS_COMPRESSED\nvalue: true\nunits: bool\n\
             attribute: COMPRESSION_METHOD\nvalue: gzip\nunits:\n\
             attribute: UNCOMPRESSED_SIZE\nvalue: 100.0\nunits: bytes\n\
             attribute: UNCOMPRESSED_HASH\nvalue: abc123\nunits:\n\
             attribute: HASH_METHOD\nvalue: sha1\nunits:\n\
             attribute: PARENT_FILE\nvalue: /tmp/x\nunits:\n",
        )
        .unwrap();
        let state = CompressionState::from_metadata(&md);
        assert!(state.is_compressed);
        assert_eq!(state.method.as_deref(), Some("gzip"));
        assert_eq!(state.uncompressed_size, Some(100));
        assert_eq!(state.uncompressed_hash.as_deref(), Some("abc123"));
        assert_eq!(state.hash_method.as_deref(), Some("sha1"));
        assert_eq!(state.parent_file.as_deref(), Some("/tmp/x"));
    }

    #[test]
    fn legacy_names_are_honoured() {
        let md = decode_text(
            "attribute: UNCOMPRESSED_CHECKSUM\nvalue: 12345\nunits:\n\
             attribute: ORIGINAL_FILE\nvalue: itmp/a.fastq\nunits:\n",
        )
        .unwrap();
        let state = CompressionState::from_metadata(&md);
        assert_eq!(state.uncompressed_hash.as_deref(), Some("12345"));
        assert_eq!(state.parent_file.as_deref(), Some("itmp/a.fastq"));
    }

    #[test]
    fn method_none_reads_as_absent() {
        let md = decode_text("attribute: COMPRESSION_METHOD\nvalue: none\nunits:\n").unwrap();
        assert_eq!(CompressionState::from_metadata(&md).method, None);
    }

    #[test]
    fn user_attributes_are_carried_verbatim() {
        let md = decode_text(
            "attribute: SAMPLE\nvalue: s1\nunits:\n\
             attribute: IS_COMPRESSED\nvalue: true\nunits: bool\n\
             attribute: READS\nvalue: 1.5e3\nunits: bytes\n\
             attribute: LOCK_OWNER\nvalue: worker-1\nunits:\n\
             attribute: ORIGINAL_FILE\nvalue: itmp/a\nunits:\n",
        )
        .unwrap();
        assert_eq!(
            carried_attributes(&md),
            vec![
                Attribute::new("SAMPLE", "s1", ""),
                Attribute::new("READS", "1.5e3", "bytes"),
            ]
        );
    }

    #[test]
    fn untyped_true_flag_counts_as_compressed() {
        let md = decode_text("attribute: IS_COMPRESSED\nvalue: True\nunits:\n").unwrap();
        assert!(CompressionState::from_metadata(&md).is_compressed);
    }
}
